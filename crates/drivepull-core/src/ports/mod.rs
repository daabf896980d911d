//! Port definitions (hexagonal architecture interfaces)
//!
//! The sync engine depends only on these traits; the HTTP adapters and the
//! file-backed credential store live in their own crates.
//!
//! ## Ports Overview
//!
//! - [`SourceApi`] - Read-only attribute/listing API of the source tree
//! - [`DestinationApi`] - Authenticated cloud filesystem receiving the tree
//! - [`CredentialStore`] - Persistence of the destination credentials

pub mod credentials;
pub mod destination;
pub mod source;

pub use credentials::{CredentialStore, CredentialVersion, Credentials};
pub use destination::{
    DestinationApi, NegotiationOutcome, RangeReader, UploadNegotiation, UploadRequest,
};
pub use source::{ByteStream, SourceApi};
