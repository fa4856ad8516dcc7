//! Server configuration

/// Default locale id used for generated EPIDs (en-US)
pub const DEFAULT_LCID: u32 = 1033;

/// Default client count reported to clients
pub const DEFAULT_CLIENT_COUNT: u32 = 26;

/// Default activation retry interval (2 hours, in minutes)
pub const DEFAULT_ACTIVATION_INTERVAL: u32 = 120;

/// Default renewal interval (7 days, in minutes)
pub const DEFAULT_RENEWAL_INTERVAL: u32 = 7 * 24 * 60;

/// Operator settings consumed by the response policy
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ServerConfig {
    /// Fixed EPID returned to every client, overriding stored and generated ones
    pub epid: Option<String>,
    /// Locale id passed to the EPID generator
    pub lcid: u32,
    /// Client count to report; raised to threshold + 1 when not above it
    pub client_count: u32,
    /// Activation retry interval in minutes
    pub activation_interval: u32,
    /// Renewal interval in minutes
    pub renewal_interval: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            epid: None,
            lcid: DEFAULT_LCID,
            client_count: DEFAULT_CLIENT_COUNT,
            activation_interval: DEFAULT_ACTIVATION_INTERVAL,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Use a fixed EPID for every response
    #[must_use]
    pub fn with_epid(mut self, epid: impl Into<String>) -> Self {
        self.epid = Some(epid.into());
        self
    }

    /// Set the locale id for generated EPIDs
    #[must_use]
    pub fn with_lcid(mut self, lcid: u32) -> Self {
        self.lcid = lcid;
        self
    }

    /// Set the configured client count
    #[must_use]
    pub fn with_client_count(mut self, count: u32) -> Self {
        self.client_count = count;
        self
    }

    /// Set the activation and renewal intervals, in minutes
    #[must_use]
    pub fn with_intervals(mut self, activation: u32, renewal: u32) -> Self {
        self.activation_interval = activation;
        self.renewal_interval = renewal;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.epid, None);
        assert_eq!(config.lcid, 1033);
        assert_eq!(config.client_count, 26);
        assert_eq!(config.activation_interval, 120);
        assert_eq!(config.renewal_interval, 10_080);
    }

    #[test]
    fn test_builder_methods() {
        let config = ServerConfig::default()
            .with_epid("EPID")
            .with_lcid(1031)
            .with_client_count(50)
            .with_intervals(60, 1440);
        assert_eq!(config.epid.as_deref(), Some("EPID"));
        assert_eq!(config.lcid, 1031);
        assert_eq!(config.client_count, 50);
        assert_eq!(config.activation_interval, 60);
        assert_eq!(config.renewal_interval, 1440);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"client_count": 40}"#).unwrap();
        assert_eq!(config.client_count, 40);
        assert_eq!(config.lcid, DEFAULT_LCID);
    }
}
