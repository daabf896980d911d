//! drivepull core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Entry`, `EntryId`, `EntryRef`, `Task`, `TaskFailure`
//! - **Error categories** - `ApiError` for remote calls, `TaskError` for task execution
//! - **Port definitions** - Traits for adapters: `SourceApi`, `DestinationApi`, `CredentialStore`
//! - **Configuration** - YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! The sync engine depends only on the port traits defined here. Adapter
//! crates provide the HTTP clients and the credential file store.

pub mod config;
pub mod domain;
pub mod ports;
