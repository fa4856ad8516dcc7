//! KMS activation core - wire codec and response policy for a volume-license
//! activation service
//!
//! This library decodes activation requests, decides how to answer them and
//! encodes the reply byte-for-byte in the layout clients expect. Transport and
//! the per-version cryptographic transforms are plugged in by the caller.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kms_core::service::{Dispatcher, KmsService, MemoryStore, Reply, RequestContext, ServerConfig};
//!
//! let service = KmsService::builder(ServerConfig::default())
//!     .store(Arc::new(MemoryStore::new()))
//!     .build();
//! let dispatcher = Dispatcher::plaintext(Arc::new(service));
//!
//! # let message: Vec<u8> = Vec::new();
//! match dispatcher.dispatch(&message, &RequestContext::default())? {
//!     Reply::Respond(_bytes) => { /* write the bytes to the peer */ }
//!     Reply::Close => { /* drop the connection without answering */ }
//! }
//! # Ok::<(), kms_core::service::ServiceError>(())
//! ```
//!
//! # Features
//!
//! - **Declarative layouts** - one generic codec drives every record
//! - **Little-endian GUIDs** - Windows byte order for all identifiers
//! - **Pluggable collaborators** - catalog, EPID generator, client store, transforms
//! - **SQLite client tracking** - behind the default `sqlite` feature

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod service;

pub use protocol::{
    Error, ErrorCode, GenericHeader, KmsRequest, KmsResponse, LicenseStatus, Result, padding,
};
pub use service::{Dispatcher, KmsService, Reply, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default KMS port
pub const DEFAULT_PORT: u16 = 1688;
