use super::types::RegistryError;
use std::fmt;

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "failed to {operation:?} ticket '{key}': {source}"),
            Self::Corruption { key, reason, .. } => {
                write!(f, "stored ticket '{key}' is corrupt: {reason}")
            }
            Self::VersionMismatch {
                key,
                expected_version,
                actual_version,
                ..
            } => write!(
                f,
                "stored ticket '{key}' has format version {actual_version}, expected at most {expected_version}"
            ),
            Self::SignatureVerification { key, reason, .. } => {
                write!(f, "signature of stored ticket '{key}' did not verify: {reason}")
            }
            Self::Cryptographic {
                operation, details, ..
            } => write!(f, "ticket {operation} failed: {details}"),
            Self::InvalidEntry { key, reason, .. } => {
                write!(f, "invalid entry for '{key}': {reason}")
            }
            Self::StoreUnavailable { store, reason, .. } => {
                write!(f, "ticket store '{store}' unavailable: {reason}")
            }
            Self::Configuration { message, .. } => {
                write!(f, "ticket registry configuration error: {message}")
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
