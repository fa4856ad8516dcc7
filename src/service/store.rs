//! Client-tracking store
//!
//! One record per `(client machine id, SKU id)` pair. Backends implement
//! [`ClientStore`]; [`NoopStore`] stands in when tracking is disabled so the
//! policy engine always talks to the same interface.
//!
//! Each method is a single atomic unit against its key. Errors are returned
//! per call and the policy engine logs them and carries on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{StoreError, StoreResult};

/// Store key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Client machine id
    pub client_machine_id: Uuid,
    /// SKU id
    pub sku_id: Uuid,
}

impl ClientKey {
    /// Create a key
    #[must_use]
    pub const fn new(client_machine_id: Uuid, sku_id: Uuid) -> Self {
        Self {
            client_machine_id,
            sku_id,
        }
    }
}

/// Field values observed on one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUpdate {
    /// Client host name
    pub machine_name: String,
    /// Peer address, when the transport knows it
    pub machine_ip: Option<String>,
    /// Application display name (or raw id)
    pub application: String,
    /// License status name, or `FAILED` for rejected hosts
    pub license_status: String,
    /// Server receive time, Unix seconds
    pub last_request_time: i64,
    /// Client request time in readable form
    pub last_request_time_readable: String,
}

/// Persisted client row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Record key
    pub key: ClientKey,
    /// Client host name
    pub machine_name: String,
    /// Peer address
    pub machine_ip: Option<String>,
    /// Application display name (or raw id)
    pub application: String,
    /// License status name
    pub license_status: String,
    /// Server receive time of the last request, Unix seconds
    pub last_request_time: i64,
    /// Client request time of the last request in readable form
    pub last_request_time_readable: String,
    /// EPID issued to this client/SKU pair
    pub kms_epid: Option<String>,
    /// Requests seen for this key
    pub request_count: u64,
}

impl ClientRecord {
    /// Record for a key seen for the first time
    #[must_use]
    pub fn first_sighting(key: ClientKey, update: &ClientUpdate) -> Self {
        Self {
            key,
            machine_name: update.machine_name.clone(),
            machine_ip: update.machine_ip.clone(),
            application: update.application.clone(),
            license_status: update.license_status.clone(),
            last_request_time: update.last_request_time,
            last_request_time_readable: update.last_request_time_readable.clone(),
            kms_epid: None,
            request_count: 1,
        }
    }

    /// Apply a later sighting: take the new field values, bump the count
    pub fn apply(&mut self, update: &ClientUpdate) {
        if self.machine_name != update.machine_name {
            self.machine_name.clone_from(&update.machine_name);
        }
        if self.machine_ip != update.machine_ip {
            self.machine_ip.clone_from(&update.machine_ip);
        }
        if self.application != update.application {
            self.application.clone_from(&update.application);
        }
        if self.license_status != update.license_status {
            self.license_status.clone_from(&update.license_status);
        }
        if self.last_request_time != update.last_request_time {
            self.last_request_time = update.last_request_time;
            self.last_request_time_readable
                .clone_from(&update.last_request_time_readable);
        }
        self.request_count = self.request_count.saturating_add(1);
    }
}

/// Client-tracking backend
pub trait ClientStore: Send + Sync {
    /// Whether records survive this call at all
    fn is_persistent(&self) -> bool;

    /// Create or update the record for `key`, returning the previous state
    fn upsert(&self, key: &ClientKey, update: &ClientUpdate) -> StoreResult<Option<ClientRecord>>;

    /// Fetch a record
    fn get(&self, key: &ClientKey) -> StoreResult<Option<ClientRecord>>;

    /// EPID stored for `key`
    fn get_epid(&self, key: &ClientKey) -> StoreResult<Option<String>>;

    /// Store an EPID for an existing record; a missing record is left alone
    fn set_epid(&self, key: &ClientKey, epid: &str) -> StoreResult<()>;

    /// Return the stored EPID, or generate one and store it
    ///
    /// Backends shared between threads override this so the read and the
    /// write happen under one lock or transaction.
    fn get_or_assign_epid(
        &self,
        key: &ClientKey,
        generate: &mut dyn FnMut() -> String,
    ) -> StoreResult<String> {
        if let Some(epid) = self.get_epid(key)? {
            return Ok(epid);
        }
        let epid = generate();
        self.set_epid(key, &epid)?;
        Ok(epid)
    }
}

/// Store used when client tracking is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl ClientStore for NoopStore {
    fn is_persistent(&self) -> bool {
        false
    }

    fn upsert(&self, _key: &ClientKey, _update: &ClientUpdate) -> StoreResult<Option<ClientRecord>> {
        Ok(None)
    }

    fn get(&self, _key: &ClientKey) -> StoreResult<Option<ClientRecord>> {
        Ok(None)
    }

    fn get_epid(&self, _key: &ClientKey) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn set_epid(&self, _key: &ClientKey, _epid: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// Process-local store
///
/// Thread-safe via one `Mutex` over the whole map, so every operation is
/// serialized against every key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<ClientKey, ClientRecord>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked clients
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether no client has been seen yet
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<ClientKey, ClientRecord>>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ClientStore for MemoryStore {
    fn is_persistent(&self) -> bool {
        true
    }

    fn upsert(&self, key: &ClientKey, update: &ClientUpdate) -> StoreResult<Option<ClientRecord>> {
        let mut records = self.lock()?;
        match records.get_mut(key) {
            Some(record) => {
                let previous = record.clone();
                record.apply(update);
                Ok(Some(previous))
            }
            None => {
                records.insert(*key, ClientRecord::first_sighting(*key, update));
                Ok(None)
            }
        }
    }

    fn get(&self, key: &ClientKey) -> StoreResult<Option<ClientRecord>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn get_epid(&self, key: &ClientKey) -> StoreResult<Option<String>> {
        Ok(self
            .lock()?
            .get(key)
            .and_then(|record| record.kms_epid.clone()))
    }

    fn set_epid(&self, key: &ClientKey, epid: &str) -> StoreResult<()> {
        if let Some(record) = self.lock()?.get_mut(key) {
            record.kms_epid = Some(epid.to_owned());
        }
        Ok(())
    }

    fn get_or_assign_epid(
        &self,
        key: &ClientKey,
        generate: &mut dyn FnMut() -> String,
    ) -> StoreResult<String> {
        let mut records = self.lock()?;
        match records.get_mut(key) {
            Some(record) => match &record.kms_epid {
                Some(epid) => Ok(epid.clone()),
                None => {
                    let epid = generate();
                    record.kms_epid = Some(epid.clone());
                    Ok(epid)
                }
            },
            None => Ok(generate()),
        }
    }
}
