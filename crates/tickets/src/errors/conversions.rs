use super::types::{RecoveryHint, RegistryError, SerializationOp};
use std::path::PathBuf;

impl From<std::io::Error> for RegistryError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let recovery_hint = match error.kind() {
            ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                path: PathBuf::from("."),
            },
            ErrorKind::NotFound => RecoveryHint::Recreate,
            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                RecoveryHint::Retry {
                    after: std::time::Duration::from_millis(100),
                }
            }
            _ => RecoveryHint::Manual {
                instructions: "inspect the ticket store directory".to_string(),
            },
        };

        Self::Io {
            path: PathBuf::from("."),
            operation: "unknown",
            source: error,
            recovery_hint,
        }
    }
}

impl From<bincode::Error> for RegistryError {
    fn from(error: bincode::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: error,
            recovery_hint: RecoveryHint::Evict,
        }
    }
}

/// Convert store errors to core errors
impl From<RegistryError> for cas_core::Error {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Configuration { message, .. } => cas_core::Error::configuration(message),
            RegistryError::Cryptographic { .. } | RegistryError::SignatureVerification { .. } => {
                cas_core::Error::security(error.to_string())
            }
            RegistryError::Io { path, operation, source, .. } => {
                cas_core::Error::file_system(path, operation, source)
            }
            other => cas_core::Error::storage("ticket registry", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_transient() {
        let error: RegistryError =
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk").into();
        assert!(matches!(error.recovery_hint(), RecoveryHint::Retry { .. }));
        assert!(!error.is_corruption());
    }

    #[test]
    fn test_conversion_into_core_error() {
        let error = RegistryError::Corruption {
            key: "ST-1".to_string(),
            reason: "bad crc".to_string(),
            recovery_hint: RecoveryHint::Evict,
        };
        let core: cas_core::Error = error.into();
        assert!(matches!(core, cas_core::Error::Storage { .. }));
        assert!(core.to_string().contains("bad crc"));
    }
}
