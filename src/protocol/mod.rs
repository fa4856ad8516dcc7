//! KMS wire format
//!
//! This module provides the record codec, the request/response layouts, the
//! generic header parser and the RPC padding arithmetic.

pub mod codec;
mod error;
pub mod framing;
pub mod guid;
mod header;
mod message;
mod types;

pub use codec::{FieldKind, FieldSpec, Layout, Record, Value};
pub use error::{Error, Result};
pub use framing::padding;
pub use header::GenericHeader;
pub use message::{
    EPID_TERMINATOR_LEN, KmsRequest, KmsResponse, MACHINE_NAME_REGION, REQUEST_LAYOUT,
    RESPONSE_LAYOUT,
};
pub use types::{ErrorCode, LicenseStatus};
