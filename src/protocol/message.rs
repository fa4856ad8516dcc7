//! KMS request and response records

use uuid::Uuid;

use super::codec::{FieldKind, FieldSpec, Layout, Record, utf16_len};
use super::{LicenseStatus, Result};

/// Bytes reserved for the machine name (text + zero padding)
pub const MACHINE_NAME_REGION: usize = 126;

/// Bytes `epidLen` counts beyond the EPID text (its UTF-16 terminator)
pub const EPID_TERMINATOR_LEN: u32 = 2;

/// Request body layout
pub static REQUEST_LAYOUT: Layout = Layout::new(
    "KmsRequest",
    &[
        FieldSpec::new("versionMinor", FieldKind::U16),
        FieldSpec::new("versionMajor", FieldKind::U16),
        FieldSpec::new("isClientVm", FieldKind::U32),
        FieldSpec::new("licenseStatus", FieldKind::U32),
        FieldSpec::new("graceTime", FieldKind::U32),
        FieldSpec::new("applicationId", FieldKind::Guid),
        FieldSpec::new("skuId", FieldKind::Guid),
        FieldSpec::new("kmsCountedId", FieldKind::Guid),
        FieldSpec::new("clientMachineId", FieldKind::Guid),
        FieldSpec::new("requiredClientCount", FieldKind::U32),
        FieldSpec::new("requestTime", FieldKind::U64),
        FieldSpec::new("previousClientMachineId", FieldKind::Guid),
        FieldSpec::new(
            "machineName",
            FieldKind::Utf16Region {
                size: MACHINE_NAME_REGION,
            },
        ),
    ],
);

/// Response body layout
pub static RESPONSE_LAYOUT: Layout = Layout::new(
    "KmsResponse",
    &[
        FieldSpec::new("versionMinor", FieldKind::U16),
        FieldSpec::new("versionMajor", FieldKind::U16),
        FieldSpec::new(
            "epidLen",
            FieldKind::LengthOf {
                target: "kmsEpid",
                extra: EPID_TERMINATOR_LEN,
            },
        ),
        FieldSpec::new(
            "kmsEpid",
            FieldKind::Utf16Sized {
                length_field: "epidLen",
                overhead: EPID_TERMINATOR_LEN,
            },
        ),
        FieldSpec::new("kmsEpidEnd", FieldKind::ZeroPad(EPID_TERMINATOR_LEN as usize)),
        FieldSpec::new("clientMachineId", FieldKind::Guid),
        FieldSpec::new("responseTime", FieldKind::U64),
        FieldSpec::new("currentClientCount", FieldKind::U32),
        FieldSpec::new("vLActivationInterval", FieldKind::U32),
        FieldSpec::new("vLRenewalInterval", FieldKind::U32),
    ],
);

/// Decoded activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsRequest {
    /// Minor protocol version
    pub version_minor: u16,
    /// Major protocol version
    pub version_major: u16,
    /// Non-zero when the client runs in a virtual machine
    pub is_client_vm: u32,
    /// Client license status
    pub license_status: LicenseStatus,
    /// Remaining grace time in minutes
    pub grace_time: u32,
    /// Application (product family) id
    pub application_id: Uuid,
    /// Product SKU id
    pub sku_id: Uuid,
    /// KMS counted id, used for EPID generation
    pub kms_counted_id: Uuid,
    /// Client machine id (CMID)
    pub client_machine_id: Uuid,
    /// Minimum client count the client needs to see
    pub required_client_count: u32,
    /// Client time as FILETIME ticks
    pub request_time: u64,
    /// CMID the client used before, if it changed
    pub previous_client_machine_id: Uuid,
    /// Client host name
    pub machine_name: String,
}

impl KmsRequest {
    /// Decode a request from the start of a plaintext body
    ///
    /// Bytes after the record (hashes, padding) are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (record, _) = REQUEST_LAYOUT.decode_prefix(bytes)?;
        Self::from_record(&record)
    }

    /// Encode to the wire layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.to_record()?.encode()
    }

    /// Read from a [`REQUEST_LAYOUT`] record
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            version_minor: record.u16("versionMinor")?,
            version_major: record.u16("versionMajor")?,
            is_client_vm: record.u32("isClientVm")?,
            license_status: LicenseStatus::from_u32(record.u32("licenseStatus")?),
            grace_time: record.u32("graceTime")?,
            application_id: record.guid("applicationId")?,
            sku_id: record.guid("skuId")?,
            kms_counted_id: record.guid("kmsCountedId")?,
            client_machine_id: record.guid("clientMachineId")?,
            required_client_count: record.u32("requiredClientCount")?,
            request_time: record.u64("requestTime")?,
            previous_client_machine_id: record.guid("previousClientMachineId")?,
            machine_name: record.text("machineName")?.to_owned(),
        })
    }

    /// Build a [`REQUEST_LAYOUT`] record
    pub fn to_record(&self) -> Result<Record> {
        Record::new(&REQUEST_LAYOUT)
            .with("versionMinor", self.version_minor)?
            .with("versionMajor", self.version_major)?
            .with("isClientVm", self.is_client_vm)?
            .with("licenseStatus", self.license_status.as_u32())?
            .with("graceTime", self.grace_time)?
            .with("applicationId", self.application_id)?
            .with("skuId", self.sku_id)?
            .with("kmsCountedId", self.kms_counted_id)?
            .with("clientMachineId", self.client_machine_id)?
            .with("requiredClientCount", self.required_client_count)?
            .with("requestTime", self.request_time)?
            .with("previousClientMachineId", self.previous_client_machine_id)?
            .with("machineName", self.machine_name.as_str())
    }
}

/// Activation response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsResponse {
    /// Minor protocol version, mirrored from the request
    pub version_minor: u16,
    /// Major protocol version, mirrored from the request
    pub version_major: u16,
    /// Extended product id issued to the client
    pub kms_epid: String,
    /// Client machine id, mirrored from the request
    pub client_machine_id: Uuid,
    /// Request FILETIME, mirrored back
    pub response_time: u64,
    /// Client count the host reports
    pub current_client_count: u32,
    /// Activation retry interval in minutes
    pub vl_activation_interval: u32,
    /// Renewal interval in minutes
    pub vl_renewal_interval: u32,
}

impl KmsResponse {
    /// Value the `epidLen` field takes on the wire
    #[must_use]
    pub fn epid_len(&self) -> u32 {
        // EPIDs are short ASCII strings; saturate rather than wrap
        u32::try_from(utf16_len(&self.kms_epid))
            .unwrap_or(u32::MAX - EPID_TERMINATOR_LEN)
            .saturating_add(EPID_TERMINATOR_LEN)
    }

    /// Decode a complete response body
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let record = RESPONSE_LAYOUT.decode(bytes)?;
        Self::from_record(&record)
    }

    /// Encode to the wire layout
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.to_record()?.encode()
    }

    /// Read from a [`RESPONSE_LAYOUT`] record
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            version_minor: record.u16("versionMinor")?,
            version_major: record.u16("versionMajor")?,
            kms_epid: record.text("kmsEpid")?.to_owned(),
            client_machine_id: record.guid("clientMachineId")?,
            response_time: record.u64("responseTime")?,
            current_client_count: record.u32("currentClientCount")?,
            vl_activation_interval: record.u32("vLActivationInterval")?,
            vl_renewal_interval: record.u32("vLRenewalInterval")?,
        })
    }

    /// Build a [`RESPONSE_LAYOUT`] record; `epidLen` is left to the encoder
    pub fn to_record(&self) -> Result<Record> {
        Record::new(&RESPONSE_LAYOUT)
            .with("versionMinor", self.version_minor)?
            .with("versionMajor", self.version_major)?
            .with("kmsEpid", self.kms_epid.as_str())?
            .with("clientMachineId", self.client_machine_id)?
            .with("responseTime", self.response_time)?
            .with("currentClientCount", self.current_client_count)?
            .with("vLActivationInterval", self.vl_activation_interval)?
            .with("vLRenewalInterval", self.vl_renewal_interval)
    }
}
