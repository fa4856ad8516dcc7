//! Per-request activation policy
//!
//! Decides, for one decoded request, whether the client gets a response and
//! what client count it sees. Every sighting is recorded in the client store,
//! including rejected ones.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::catalog::{SkuCatalog, StaticCatalog};
use super::config::ServerConfig;
use super::metrics::Metrics;
use super::pid::{DefaultPidGenerator, PidGenerator};
use super::response::ResponseBuilder;
use super::store::{ClientKey, ClientStore, ClientUpdate, NoopStore};
use super::time::{self, TimeConverter, UtcTimeConverter};
use crate::protocol::{KmsRequest, KmsResponse};

/// Host name prefixes allowed to activate
pub const ADMITTED_HOST_PREFIXES: [&str; 3] = ["AC-", "MC-", "PC-"];

/// Activation threshold used when the catalog has no count policy
pub const DEFAULT_ACTIVATION_THRESHOLD: u32 = 25;

/// License status recorded for rejected hosts
pub const FAILED_LICENSE_STATUS: &str = "FAILED";

/// Client count to report for a SKU
///
/// A configured count at or below the threshold is lifted to one past it so
/// the client always sees enough peers to activate.
#[must_use]
pub const fn current_client_count(configured: u32, threshold: u32) -> u32 {
    if configured <= threshold {
        threshold.saturating_add(1)
    } else {
        configured
    }
}

/// Whether a host name passes the admission gate
#[must_use]
pub fn is_admitted_host(machine_name: &str) -> bool {
    ADMITTED_HOST_PREFIXES
        .iter()
        .any(|prefix| machine_name.starts_with(prefix))
}

/// Transport-level facts about a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Peer address, when known
    pub peer: Option<IpAddr>,
}

impl RequestContext {
    /// Context for a request from `peer`
    #[must_use]
    pub const fn from_peer(peer: IpAddr) -> Self {
        Self { peer: Some(peer) }
    }
}

/// Outcome of the policy for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Send this response
    Respond(KmsResponse),
    /// Close the session without sending anything
    Close,
}

/// Activation policy engine
///
/// Cheap to share: wrap in an `Arc` and hand to every connection.
pub struct KmsService {
    config: ServerConfig,
    catalog: Arc<dyn SkuCatalog>,
    pid_generator: Arc<dyn PidGenerator>,
    store: Arc<dyn ClientStore>,
    time_converter: Arc<dyn TimeConverter>,
}

impl fmt::Debug for KmsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsService")
            .field("config", &self.config)
            .field("persistent_store", &self.store.is_persistent())
            .finish_non_exhaustive()
    }
}

impl KmsService {
    /// Service with an empty catalog, the default EPID generator and no
    /// client tracking
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building a service
    #[must_use]
    pub fn builder(config: ServerConfig) -> KmsServiceBuilder {
        KmsServiceBuilder {
            config,
            catalog: None,
            pid_generator: None,
            store: None,
            time_converter: None,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Client store in use
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ClientStore> {
        &self.store
    }

    /// Apply the activation policy to a decoded request
    pub fn handle_request(&self, request: &KmsRequest, ctx: &RequestContext) -> Decision {
        let entry = self.catalog.lookup(&request.application_id, &request.sku_id);
        let application = entry
            .app_name
            .unwrap_or_else(|| request.application_id.to_string());
        let sku = entry.sku_name.unwrap_or_else(|| request.sku_id.to_string());
        let threshold = entry.count_policy.unwrap_or(DEFAULT_ACTIVATION_THRESHOLD);
        let client_count = current_client_count(self.config.client_count, threshold);

        let request_time = self
            .time_converter
            .convert_filetime(request.request_time)
            .map_or_else(|| request.request_time.to_string(), |t| time::readable(&t));
        let machine_ip = ctx.peer.map(|ip| ip.to_string());

        info!(
            machine_name = %request.machine_name,
            machine_ip = machine_ip.as_deref().unwrap_or("-"),
            client_machine_id = %request.client_machine_id,
            application = %application,
            sku = %sku,
            license_status = %request.license_status,
            request_time = %request_time,
            "KMS request"
        );

        let admitted = is_admitted_host(&request.machine_name);
        let license_status = if admitted {
            request.license_status.name().to_owned()
        } else {
            FAILED_LICENSE_STATUS.to_owned()
        };

        let key = ClientKey::new(request.client_machine_id, request.sku_id);
        if self.store.is_persistent() {
            let update = ClientUpdate {
                machine_name: request.machine_name.clone(),
                machine_ip,
                application,
                license_status,
                last_request_time: Utc::now().timestamp(),
                last_request_time_readable: request_time,
            };
            if let Err(err) = self.store.upsert(&key, &update) {
                warn!(error = %err, client_machine_id = %key.client_machine_id, "Failed to record client");
                Metrics::record_store_error();
            }
        }

        if !admitted {
            info!(
                machine_name = %request.machine_name,
                license_status = FAILED_LICENSE_STATUS,
                "Illegal hostname detected, closing connection"
            );
            Metrics::record_close();
            return Decision::Close;
        }

        let response = ResponseBuilder::new(&self.config, self.pid_generator.as_ref(), self.store.as_ref())
            .build(request, &key, client_count);
        info!(
            kms_epid = %response.kms_epid,
            current_client_count = response.current_client_count,
            "KMS response"
        );
        Metrics::record_response();
        Decision::Respond(response)
    }
}

/// Builder for [`KmsService`]
///
/// Collaborators left unset fall back to [`StaticCatalog`] (empty),
/// [`DefaultPidGenerator`], [`NoopStore`] and [`UtcTimeConverter`].
pub struct KmsServiceBuilder {
    config: ServerConfig,
    catalog: Option<Arc<dyn SkuCatalog>>,
    pid_generator: Option<Arc<dyn PidGenerator>>,
    store: Option<Arc<dyn ClientStore>>,
    time_converter: Option<Arc<dyn TimeConverter>>,
}

impl KmsServiceBuilder {
    /// Set the product catalog
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn SkuCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the EPID generator
    #[must_use]
    pub fn pid_generator(mut self, generator: Arc<dyn PidGenerator>) -> Self {
        self.pid_generator = Some(generator);
        self
    }

    /// Set the client store
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ClientStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the FILETIME converter
    #[must_use]
    pub fn time_converter(mut self, converter: Arc<dyn TimeConverter>) -> Self {
        self.time_converter = Some(converter);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> KmsService {
        KmsService {
            config: self.config,
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(StaticCatalog::new())),
            pid_generator: self
                .pid_generator
                .unwrap_or_else(|| Arc::new(DefaultPidGenerator)),
            store: self.store.unwrap_or_else(|| Arc::new(NoopStore)),
            time_converter: self
                .time_converter
                .unwrap_or_else(|| Arc::new(UtcTimeConverter)),
        }
    }
}
