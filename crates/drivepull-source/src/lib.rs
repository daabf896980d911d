//! drivepull source adapter
//!
//! Implements the [`SourceApi`](drivepull_core::ports::SourceApi) port over
//! the read-only attribute/listing HTTP API. Every request is a `GET` on one
//! base URL, selected by query parameters:
//!
//! - `?id={id}&method=attr` / `?path={path}&method=attr` - entry attributes
//! - `?id={id}&method=list` / `?path={path}&method=list` - directory listing
//!
//! File content is fetched from the `url` field of file entries, with an
//! optional `Range` header.

pub mod client;

pub use client::SourceClient;
