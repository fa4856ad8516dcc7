//! Process-wide service counters

use std::sync::atomic::{AtomicU64, Ordering};

use super::dispatch::ProtocolVersion;

/// Track activation service metrics without external dependencies.
pub(crate) struct Metrics;

static RESPONSES: AtomicU64 = AtomicU64::new(0);
static CLOSED: AtomicU64 = AtomicU64::new(0);
static FORMAT_ERRORS: AtomicU64 = AtomicU64::new(0);
static STORE_ERRORS: AtomicU64 = AtomicU64::new(0);
static EPIDS_GENERATED: AtomicU64 = AtomicU64::new(0);

struct VersionCounters {
    v4: AtomicU64,
    v5: AtomicU64,
    v6: AtomicU64,
    unknown: AtomicU64,
}

static VERSION_COUNTERS: VersionCounters = VersionCounters::new();

impl VersionCounters {
    const fn new() -> Self {
        Self {
            v4: AtomicU64::new(0),
            v5: AtomicU64::new(0),
            v6: AtomicU64::new(0),
            unknown: AtomicU64::new(0),
        }
    }

    fn increment(&self, version: ProtocolVersion) {
        let counter = match version {
            ProtocolVersion::V4 => &self.v4,
            ProtocolVersion::V5 => &self.v5,
            ProtocolVersion::V6 => &self.v6,
            ProtocolVersion::Unknown(_) => &self.unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Metrics {
    #[inline]
    pub(crate) fn record_request(version: ProtocolVersion) {
        VERSION_COUNTERS.increment(version);
    }

    #[inline]
    pub(crate) fn record_response() {
        RESPONSES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_close() {
        CLOSED.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_format_error() {
        FORMAT_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_store_error() {
        STORE_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_epid_generated() {
        EPIDS_GENERATED.fetch_add(1, Ordering::Relaxed);
    }
}

/// Current process-wide counters.
#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        v4_requests: VERSION_COUNTERS.v4.load(Ordering::Relaxed),
        v5_requests: VERSION_COUNTERS.v5.load(Ordering::Relaxed),
        v6_requests: VERSION_COUNTERS.v6.load(Ordering::Relaxed),
        unknown_requests: VERSION_COUNTERS.unknown.load(Ordering::Relaxed),
        responses: RESPONSES.load(Ordering::Relaxed),
        closed: CLOSED.load(Ordering::Relaxed),
        format_errors: FORMAT_ERRORS.load(Ordering::Relaxed),
        store_errors: STORE_ERRORS.load(Ordering::Relaxed),
        epids_generated: EPIDS_GENERATED.load(Ordering::Relaxed),
    }
}

/// Lightweight snapshot of service counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub v4_requests: u64,
    pub v5_requests: u64,
    pub v6_requests: u64,
    pub unknown_requests: u64,
    pub responses: u64,
    pub closed: u64,
    pub format_errors: u64,
    pub store_errors: u64,
    pub epids_generated: u64,
}

impl MetricsSnapshot {
    /// Requests seen across every version.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.v4_requests + self.v5_requests + self.v6_requests + self.unknown_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are shared with every other test in the process, so only
    // check that they move forward.
    #[test]
    fn test_counters_increase() {
        let before = snapshot();
        Metrics::record_request(ProtocolVersion::V6);
        Metrics::record_request(ProtocolVersion::Unknown(99));
        Metrics::record_response();
        Metrics::record_close();
        Metrics::record_format_error();
        Metrics::record_store_error();
        Metrics::record_epid_generated();
        let after = snapshot();

        assert!(after.v6_requests > before.v6_requests);
        assert!(after.unknown_requests > before.unknown_requests);
        assert!(after.total_requests() >= before.total_requests() + 2);
        assert!(after.responses > before.responses);
        assert!(after.closed > before.closed);
        assert!(after.format_errors > before.format_errors);
        assert!(after.store_errors > before.store_errors);
        assert!(after.epids_generated > before.epids_generated);
    }
}
