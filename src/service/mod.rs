//! Activation service
//!
//! The policy engine ([`KmsService`]), its collaborators, and the
//! [`Dispatcher`] that routes raw messages by protocol version.

pub mod catalog;
mod config;
mod dispatch;
mod error;
pub mod metrics;
pub mod pid;
mod policy;
mod response;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod store;
pub mod time;
pub mod unknown;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{CatalogEntry, SkuCatalog, StaticCatalog};
pub use config::{
    DEFAULT_ACTIVATION_INTERVAL, DEFAULT_CLIENT_COUNT, DEFAULT_LCID, DEFAULT_RENEWAL_INTERVAL,
    ServerConfig,
};
pub use dispatch::{
    Dispatcher, PlaintextTransform, ProtocolVersion, Reply, VersionHandler, VersionTransform,
};
pub use error::{ServiceError, StoreError, StoreResult, TransformError};
pub use metrics::{MetricsSnapshot, snapshot as metrics_snapshot};
pub use pid::{DefaultPidGenerator, PidGenerator};
pub use policy::{
    ADMITTED_HOST_PREFIXES, DEFAULT_ACTIVATION_THRESHOLD, Decision, FAILED_LICENSE_STATUS,
    KmsService, KmsServiceBuilder, RequestContext, current_client_count, is_admitted_host,
};
pub use response::ResponseBuilder;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{ClientKey, ClientRecord, ClientStore, ClientUpdate, MemoryStore, NoopStore};
pub use time::{TimeConverter, UtcTimeConverter};
