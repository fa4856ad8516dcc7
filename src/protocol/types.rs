//! KMS license states and status codes

use std::fmt;

/// Client license status reported in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseStatus {
    /// Not activated
    Unlicensed,
    /// Activated
    Activated,
    /// Out-of-box grace period
    GracePeriod,
    /// Out-of-tolerance grace period
    OutOfToleranceGrace,
    /// Non-genuine grace period
    NonGenuineGrace,
    /// Notifications mode
    Notifications,
    /// Extended grace period
    ExtendedGrace,
    /// Code outside the known set
    Unknown(u32),
}

impl LicenseStatus {
    /// Convert from the wire code
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Unlicensed,
            1 => Self::Activated,
            2 => Self::GracePeriod,
            3 => Self::OutOfToleranceGrace,
            4 => Self::NonGenuineGrace,
            5 => Self::Notifications,
            6 => Self::ExtendedGrace,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the wire code
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Unlicensed => 0,
            Self::Activated => 1,
            Self::GracePeriod => 2,
            Self::OutOfToleranceGrace => 3,
            Self::NonGenuineGrace => 4,
            Self::Notifications => 5,
            Self::ExtendedGrace => 6,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable name, as stored for each client
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unlicensed => "Unlicensed",
            Self::Activated => "Activated",
            Self::GracePeriod => "Grace Period",
            Self::OutOfToleranceGrace => "Out-of-Tolerance Grace Period",
            Self::NonGenuineGrace => "Non-Genuine Grace Period",
            Self::Notifications => "Notifications Mode",
            Self::ExtendedGrace => "Extended Grace Period",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl From<u32> for LicenseStatus {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Licensing status codes (NTSTATUS-style) used in KMS replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// The product is not a volume-licensed edition
    NotWindowsSlp = 0xC004_F035,
    /// The KMS host does not have enough clients
    NotEnoughCount = 0xC004_F038,
    /// The binding service is not enabled
    BindingServiceNotEnabled = 0xC004_F039,
    /// Informational: product user right
    InfoProductUserRight = 0x4004_F040,
    /// Informational: no binding server registration
    OobNoBindingServerRegistration = 0x4004_F041,
    /// The KMS host does not handle the requested protocol
    KeyManagementServiceIdMismatch = 0xC004_F042,
    /// The machine is not bound
    MachineNotBound = 0xC004_F056,
}

impl ErrorCode {
    /// Every known code
    pub const ALL: [Self; 7] = [
        Self::NotWindowsSlp,
        Self::NotEnoughCount,
        Self::BindingServiceNotEnabled,
        Self::InfoProductUserRight,
        Self::OobNoBindingServerRegistration,
        Self::KeyManagementServiceIdMismatch,
        Self::MachineNotBound,
    ];

    /// Raw 32-bit value
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Look up a raw value
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u32() == value)
    }

    /// Vendor symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::NotWindowsSlp => "SL_E_VL_NOT_WINDOWS_SLP",
            Self::NotEnoughCount => "SL_E_VL_NOT_ENOUGH_COUNT",
            Self::BindingServiceNotEnabled => "SL_E_VL_BINDING_SERVICE_NOT_ENABLED",
            Self::InfoProductUserRight => "SL_E_VL_INFO_PRODUCT_USER_RIGHT",
            Self::OobNoBindingServerRegistration => "SL_I_VL_OOB_NO_BINDING_SERVER_REGISTRATION",
            Self::KeyManagementServiceIdMismatch => "SL_E_VL_KEY_MANAGEMENT_SERVICE_ID_MISMATCH",
            Self::MachineNotBound => "SL_E_VL_MACHINE_NOT_BOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010X})", self.symbol(), self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_status_roundtrip() {
        for code in 0..=6 {
            let status = LicenseStatus::from_u32(code);
            assert!(!matches!(status, LicenseStatus::Unknown(_)));
            assert_eq!(status.as_u32(), code);
        }
    }

    #[test]
    fn test_unknown_license_status_is_sentinel() {
        let status = LicenseStatus::from(42);
        assert_eq!(status, LicenseStatus::Unknown(42));
        assert_eq!(status.to_string(), "Unknown");
        assert_eq!(status.as_u32(), 42);
    }

    #[test]
    fn test_license_status_names() {
        assert_eq!(LicenseStatus::GracePeriod.to_string(), "Grace Period");
        assert_eq!(
            LicenseStatus::OutOfToleranceGrace.name(),
            "Out-of-Tolerance Grace Period"
        );
    }

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::NotWindowsSlp.as_u32(), 0xC004_F035);
        assert_eq!(ErrorCode::NotEnoughCount.as_u32(), 0xC004_F038);
        assert_eq!(ErrorCode::BindingServiceNotEnabled.as_u32(), 0xC004_F039);
        assert_eq!(ErrorCode::InfoProductUserRight.as_u32(), 0x4004_F040);
        assert_eq!(ErrorCode::OobNoBindingServerRegistration.as_u32(), 0x4004_F041);
        assert_eq!(ErrorCode::KeyManagementServiceIdMismatch.as_u32(), 0xC004_F042);
        assert_eq!(ErrorCode::MachineNotBound.as_u32(), 0xC004_F056);
    }

    #[test]
    fn test_error_code_lookup_and_display() {
        let code = ErrorCode::from_u32(0xC004_F042).unwrap();
        assert_eq!(code, ErrorCode::KeyManagementServiceIdMismatch);
        assert_eq!(
            code.to_string(),
            "SL_E_VL_KEY_MANAGEMENT_SERVICE_ID_MISMATCH (0xC004F042)"
        );
        assert_eq!(ErrorCode::from_u32(0), None);
    }
}
