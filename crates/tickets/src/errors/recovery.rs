use super::types::{RecoveryHint, RegistryError};

impl RegistryError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::Corruption { recovery_hint, .. }
            | Self::VersionMismatch { recovery_hint, .. }
            | Self::SignatureVerification { recovery_hint, .. }
            | Self::Cryptographic { recovery_hint, .. }
            | Self::InvalidEntry { recovery_hint, .. }
            | Self::StoreUnavailable { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Whether the stored entry should be treated as missing and evicted
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corruption { .. }
                | Self::VersionMismatch { .. }
                | Self::SignatureVerification { .. }
        )
    }
}
