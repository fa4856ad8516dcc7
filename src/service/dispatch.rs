//! Version dispatch
//!
//! The header's major version picks the handler. Versions 4, 5 and 6 each
//! own a [`VersionTransform`] that unwraps the request body and wraps the
//! encoded response; every other version gets the fixed unknown-version
//! reply.

use std::fmt;
use std::sync::Arc;

use bytes::BufMut;
use tracing::{debug, info, instrument};

use super::error::{ServiceError, TransformError};
use super::metrics::Metrics;
use super::policy::{Decision, KmsService, RequestContext};
use super::unknown;
use crate::protocol::{GenericHeader, KmsRequest, framing};

/// Major protocol versions the server distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Windows Vista / Server 2008 era
    V4,
    /// Windows 7 / Server 2008 R2 era
    V5,
    /// Windows 8 and later
    V6,
    /// Anything else
    Unknown(u16),
}

impl ProtocolVersion {
    /// Map a header major version
    #[must_use]
    pub const fn from_major(major: u16) -> Self {
        match major {
            4 => Self::V4,
            5 => Self::V5,
            6 => Self::V6,
            other => Self::Unknown(other),
        }
    }

    /// Wire value
    #[must_use]
    pub const fn major(self) -> u16 {
        match self {
            Self::V4 => 4,
            Self::V5 => 5,
            Self::V6 => 6,
            Self::Unknown(major) => major,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.major())
    }
}

/// Version-specific request unwrapping and response wrapping
///
/// Implementations hold whatever keys and hashing the version needs.
pub trait VersionTransform: Send + Sync {
    /// Extract the request body (starting at its version fields) from a raw message
    fn open_request(&self, version: ProtocolVersion, message: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Wrap an encoded response body for the wire
    fn seal_response(
        &self,
        version: ProtocolVersion,
        request: &KmsRequest,
        body: &[u8],
    ) -> Result<Vec<u8>, TransformError>;
}

/// Transform that applies no cryptography
///
/// Strips the two body-length words from the request and frames the
/// response as `[len u32][len u32] body padding`. Useful for diagnostics and
/// tests; real clients expect the version's encryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextTransform;

impl PlaintextTransform {
    const PREFIX: usize = 8;
}

impl VersionTransform for PlaintextTransform {
    fn open_request(&self, version: ProtocolVersion, message: &[u8]) -> Result<Vec<u8>, TransformError> {
        match message.get(Self::PREFIX..) {
            Some(body) => Ok(body.to_vec()),
            None => Err(TransformError::TooShort {
                version,
                needed: Self::PREFIX,
                got: message.len(),
            }),
        }
    }

    fn seal_response(
        &self,
        version: ProtocolVersion,
        _request: &KmsRequest,
        body: &[u8],
    ) -> Result<Vec<u8>, TransformError> {
        let len = u32::try_from(body.len())
            .map_err(|_| TransformError::BodyTooLarge { version, len: body.len() })?;

        let mut out = Vec::with_capacity(Self::PREFIX + body.len() + 7);
        out.put_u32_le(len);
        out.put_u32_le(len);
        out.put_slice(body);
        framing::pad_body(&mut out);
        Ok(out)
    }
}

/// What to send back on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send these bytes
    Respond(Vec<u8>),
    /// Close without sending anything
    Close,
}

/// Handler for one supported protocol version
pub struct VersionHandler {
    version: ProtocolVersion,
    transform: Box<dyn VersionTransform>,
}

impl VersionHandler {
    /// Handler for `version` using `transform`
    #[must_use]
    pub fn new(version: ProtocolVersion, transform: Box<dyn VersionTransform>) -> Self {
        Self { version, transform }
    }

    /// Version served
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Unwrap, apply the policy, and wrap the reply
    pub fn handle(
        &self,
        service: &KmsService,
        message: &[u8],
        ctx: &RequestContext,
    ) -> Result<Reply, ServiceError> {
        let body = self.transform.open_request(self.version, message)?;
        let request = KmsRequest::decode(&body)?;
        debug!(version = %self.version, machine_name = %request.machine_name, "Decoded request");

        match service.handle_request(&request, ctx) {
            Decision::Close => Ok(Reply::Close),
            Decision::Respond(response) => {
                let encoded = response.encode()?;
                let sealed = self.transform.seal_response(self.version, &request, &encoded)?;
                Ok(Reply::Respond(sealed))
            }
        }
    }
}

impl fmt::Debug for VersionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionHandler")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Routes raw messages to the handler for their version
#[derive(Debug)]
pub struct Dispatcher {
    service: Arc<KmsService>,
    v4: VersionHandler,
    v5: VersionHandler,
    v6: VersionHandler,
}

impl Dispatcher {
    /// Dispatcher with one transform per supported version
    #[must_use]
    pub fn new(
        service: Arc<KmsService>,
        v4: Box<dyn VersionTransform>,
        v5: Box<dyn VersionTransform>,
        v6: Box<dyn VersionTransform>,
    ) -> Self {
        Self {
            service,
            v4: VersionHandler::new(ProtocolVersion::V4, v4),
            v5: VersionHandler::new(ProtocolVersion::V5, v5),
            v6: VersionHandler::new(ProtocolVersion::V6, v6),
        }
    }

    /// Dispatcher using [`PlaintextTransform`] for every version
    #[must_use]
    pub fn plaintext(service: Arc<KmsService>) -> Self {
        Self::new(
            service,
            Box::new(PlaintextTransform),
            Box::new(PlaintextTransform),
            Box::new(PlaintextTransform),
        )
    }

    /// Policy engine behind this dispatcher
    #[must_use]
    pub fn service(&self) -> &Arc<KmsService> {
        &self.service
    }

    /// Handle one raw message
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Format`] for a message shorter than the
    /// generic header or a body that does not decode, and
    /// [`ServiceError::Transform`] when the version transform fails. The
    /// caller should drop the connection in either case.
    #[instrument(level = "debug", skip(self, message), fields(len = message.len(), peer = ?ctx.peer))]
    pub fn dispatch(&self, message: &[u8], ctx: &RequestContext) -> Result<Reply, ServiceError> {
        let header = GenericHeader::parse(message).inspect_err(|_| Metrics::record_format_error())?;
        let version = ProtocolVersion::from_major(header.version_major());
        Metrics::record_request(version);

        let handler = match version {
            ProtocolVersion::V4 => &self.v4,
            ProtocolVersion::V5 => &self.v5,
            ProtocolVersion::V6 => &self.v6,
            ProtocolVersion::Unknown(major) => {
                info!(version_major = major, version_minor = header.version_minor(), "Unhandled KMS version");
                return Ok(Reply::Respond(unknown::respond().to_vec()));
            }
        };

        info!("Received {version} request");
        let result = handler.handle(&self.service, message, ctx);
        if let Err(ServiceError::Format(_)) = &result {
            Metrics::record_format_error();
        }
        result
    }
}
