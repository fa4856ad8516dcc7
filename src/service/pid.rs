//! Extended product id (EPID) generation

use chrono::{Datelike, Utc};
use uuid::Uuid;

/// Produces EPIDs for clients that do not have one yet
pub trait PidGenerator: Send + Sync {
    /// Generate an EPID for a KMS counted id, protocol version and locale
    fn generate(&self, kms_counted_id: &Uuid, version_major: u16, lcid: u32) -> String;
}

/// Host platform id and OS build advertised for each protocol version
const fn host_profile(version_major: u16) -> (u32, u32) {
    match version_major {
        4 => (3612, 7601),
        5 => (5426, 9200),
        _ => (6401, 9600),
    }
}

/// EPID generator producing the standard dashed layout
///
/// ```text
/// PPPPP-GGGGG-KKK-SSSSSS-03-LCID-BUILD.0000-DDDYYYY
/// ```
///
/// The group and key fields are derived from the counted id, the serial is
/// random, and the trailing date is the current UTC day of year.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPidGenerator;

impl PidGenerator for DefaultPidGenerator {
    fn generate(&self, kms_counted_id: &Uuid, version_major: u16, lcid: u32) -> String {
        let (platform, build) = host_profile(version_major);
        let counted = kms_counted_id.as_u128();
        let group = counted % 100_000;
        let key_id = (counted >> 20) % 1_000;
        let serial = Uuid::new_v4().as_u128() % 1_000_000;
        let today = Utc::now();

        format!(
            "{platform:05}-{group:05}-{key_id:03}-{serial:06}-03-{lcid}-{build}.0000-{day:03}{year:04}",
            day = today.ordinal(),
            year = today.year(),
        )
    }
}
