//! Test doubles shared by the service unit tests

use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use super::pid::PidGenerator;
use super::store::{ClientKey, ClientRecord, ClientStore, ClientUpdate};
use super::{StoreError, StoreResult};
use crate::protocol::{KmsRequest, LicenseStatus};

/// Generator returning `EPID-1`, `EPID-2`, ... and counting calls
#[derive(Debug, Default)]
pub(crate) struct CountingPidGenerator {
    calls: AtomicUsize,
}

impl CountingPidGenerator {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PidGenerator for CountingPidGenerator {
    fn generate(&self, _kms_counted_id: &Uuid, _version_major: u16, _lcid: u32) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        format!("EPID-{n}")
    }
}

/// Store whose every call fails
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

impl ClientStore for FailingStore {
    fn is_persistent(&self) -> bool {
        true
    }

    fn upsert(&self, _key: &ClientKey, _update: &ClientUpdate) -> StoreResult<Option<ClientRecord>> {
        Err(StoreError::Backend("disk full".to_owned()))
    }

    fn get(&self, _key: &ClientKey) -> StoreResult<Option<ClientRecord>> {
        Err(StoreError::Backend("disk full".to_owned()))
    }

    fn get_epid(&self, _key: &ClientKey) -> StoreResult<Option<String>> {
        Err(StoreError::Backend("disk full".to_owned()))
    }

    fn set_epid(&self, _key: &ClientKey, _epid: &str) -> StoreResult<()> {
        Err(StoreError::Backend("disk full".to_owned()))
    }
}

pub(crate) fn sample_request(machine_name: &str) -> KmsRequest {
    KmsRequest {
        version_minor: 0,
        version_major: 6,
        is_client_vm: 0,
        license_status: LicenseStatus::GracePeriod,
        grace_time: 43_200,
        application_id: Uuid::from_u128(0x55c9_2734_d682_4d71_983e_d6ec_3f16_059f),
        sku_id: Uuid::from_u128(0x7311_1121_5638_40f6_bc11_f1d7_b0d6_4300),
        kms_counted_id: Uuid::from_u128(0x58e2_134f_8e11_4d17_9cb2_9106_9c15_1148),
        client_machine_id: Uuid::from_u128(0xd8f2_a1b4_55c7_4a7e_b1a3_6f0c_9e2d_4b11),
        required_client_count: 25,
        request_time: 132_537_600_000_000_000,
        previous_client_machine_id: Uuid::nil(),
        machine_name: machine_name.to_owned(),
    }
}
