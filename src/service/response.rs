//! Response construction and EPID resolution

use tracing::{debug, warn};

use super::config::ServerConfig;
use super::metrics::Metrics;
use super::pid::PidGenerator;
use super::store::{ClientKey, ClientStore};
use crate::protocol::{KmsRequest, KmsResponse};

/// Builds the response for an admitted request
///
/// EPID priority: the configured fixed EPID, then the one stored for the
/// client/SKU pair, then a freshly generated one that is stored for next
/// time. A store failure falls back to a generated EPID for this response
/// only.
pub struct ResponseBuilder<'a> {
    config: &'a ServerConfig,
    pid_generator: &'a dyn PidGenerator,
    store: &'a dyn ClientStore,
}

impl<'a> ResponseBuilder<'a> {
    /// Borrow the collaborators for one response
    #[must_use]
    pub fn new(
        config: &'a ServerConfig,
        pid_generator: &'a dyn PidGenerator,
        store: &'a dyn ClientStore,
    ) -> Self {
        Self {
            config,
            pid_generator,
            store,
        }
    }

    /// Build the response for `request`
    #[must_use]
    pub fn build(&self, request: &KmsRequest, key: &ClientKey, client_count: u32) -> KmsResponse {
        KmsResponse {
            version_minor: request.version_minor,
            version_major: request.version_major,
            kms_epid: self.resolve_epid(request, key),
            client_machine_id: request.client_machine_id,
            response_time: request.request_time,
            current_client_count: client_count,
            vl_activation_interval: self.config.activation_interval,
            vl_renewal_interval: self.config.renewal_interval,
        }
    }

    fn resolve_epid(&self, request: &KmsRequest, key: &ClientKey) -> String {
        // an empty configured EPID counts as unset
        if let Some(epid) = self.config.epid.as_deref().filter(|epid| !epid.is_empty()) {
            return epid.to_owned();
        }

        let generate = || {
            self.pid_generator
                .generate(&request.kms_counted_id, request.version_major, self.config.lcid)
        };

        let mut generated = None;
        let result = self.store.get_or_assign_epid(key, &mut || {
            let epid = generate();
            generated = Some(epid.clone());
            epid
        });

        match result {
            Ok(epid) => {
                if generated.is_some() {
                    Metrics::record_epid_generated();
                    debug!(client_machine_id = %key.client_machine_id, epid = %epid, "Assigned new EPID");
                }
                epid
            }
            Err(err) => {
                warn!(error = %err, client_machine_id = %key.client_machine_id, "EPID lookup failed, using generated EPID");
                Metrics::record_store_error();
                generated.unwrap_or_else(generate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::store::{ClientUpdate, MemoryStore, NoopStore};
    use crate::service::testing::{CountingPidGenerator, FailingStore, sample_request};

    fn seed(store: &MemoryStore, request: &KmsRequest) -> ClientKey {
        let key = ClientKey::new(request.client_machine_id, request.sku_id);
        let update = ClientUpdate {
            machine_name: request.machine_name.clone(),
            machine_ip: None,
            application: "Windows".to_owned(),
            license_status: "Grace Period".to_owned(),
            last_request_time: 0,
            last_request_time_readable: String::new(),
        };
        store.upsert(&key, &update).unwrap();
        key
    }

    #[test]
    fn test_mirrors_request_fields() {
        let config = ServerConfig::default();
        let pids = CountingPidGenerator::default();
        let request = sample_request("AC-DESKTOP1");
        let key = ClientKey::new(request.client_machine_id, request.sku_id);

        let response = ResponseBuilder::new(&config, &pids, &NoopStore).build(&request, &key, 26);
        assert_eq!(response.version_minor, request.version_minor);
        assert_eq!(response.version_major, request.version_major);
        assert_eq!(response.client_machine_id, request.client_machine_id);
        assert_eq!(response.response_time, request.request_time);
        assert_eq!(response.current_client_count, 26);
        assert_eq!(response.vl_activation_interval, 120);
        assert_eq!(response.vl_renewal_interval, 10_080);
        let text_len = crate::protocol::codec::utf16_len(&response.kms_epid);
        assert_eq!(response.epid_len() as usize, text_len + 2);
    }

    #[test]
    fn test_fixed_epid_wins() {
        let config = ServerConfig::default().with_epid("FIXED-EPID");
        let pids = CountingPidGenerator::default();
        let store = MemoryStore::new();
        let request = sample_request("AC-DESKTOP1");
        let key = seed(&store, &request);
        store.set_epid(&key, "STORED").unwrap();

        let response = ResponseBuilder::new(&config, &pids, &store).build(&request, &key, 26);
        assert_eq!(response.kms_epid, "FIXED-EPID");
        assert_eq!(pids.calls(), 0);
    }

    #[test]
    fn test_empty_fixed_epid_is_ignored() {
        let config = ServerConfig::default().with_epid("");
        let pids = CountingPidGenerator::default();
        let store = MemoryStore::new();
        let request = sample_request("AC-1");
        let key = seed(&store, &request);

        let builder = ResponseBuilder::new(&config, &pids, &store);
        let first = builder.build(&request, &key, 26);
        assert_eq!(first.kms_epid, "EPID-1");
        assert_eq!(pids.calls(), 1);

        let second = builder.build(&request, &key, 26);
        assert_eq!(second.kms_epid, "EPID-1");
        assert_eq!(pids.calls(), 1);
    }

    #[test]
    fn test_epid_stable_per_key() {
        let config = ServerConfig::default();
        let pids = CountingPidGenerator::default();
        let store = MemoryStore::new();
        let request = sample_request("AC-DESKTOP1");
        let key = seed(&store, &request);

        let builder = ResponseBuilder::new(&config, &pids, &store);
        let first = builder.build(&request, &key, 26);
        let second = builder.build(&request, &key, 26);

        assert_eq!(first.kms_epid, second.kms_epid);
        assert_eq!(pids.calls(), 1);
    }

    #[test]
    fn test_store_failure_falls_back_to_generated() {
        let config = ServerConfig::default();
        let pids = CountingPidGenerator::default();
        let request = sample_request("AC-DESKTOP1");
        let key = ClientKey::new(request.client_machine_id, request.sku_id);

        let response = ResponseBuilder::new(&config, &pids, &FailingStore).build(&request, &key, 26);
        assert_eq!(response.kms_epid, "EPID-1");
        assert_eq!(pids.calls(), 1);
    }
}
