//! Error types raised below the ticket registry API

use std::path::PathBuf;
use std::time::Duration;

/// Result type for store, transcoder and cipher operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Failures of a ticket store or of the encoding layers in front of it
#[derive(Debug)]
pub enum RegistryError {
    /// I/O errors in a file-backed store
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Ticket could not be encoded or decoded
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Stored bytes failed structural or checksum validation
    Corruption {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Stored bytes were written by a newer format
    VersionMismatch {
        key: String,
        expected_version: u16,
        actual_version: u16,
        recovery_hint: RecoveryHint,
    },

    /// Signature over an encrypted ticket did not verify
    SignatureVerification {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Encryption, decryption or key handling failed
    Cryptographic {
        operation: &'static str,
        details: String,
        recovery_hint: RecoveryHint,
    },

    /// Store received an entry it cannot hold
    InvalidEntry {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Backing store cannot serve requests
    StoreUnavailable {
        store: &'static str,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Invalid store or cipher configuration
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Drop the stored entry; the ticket is unusable
    Evict,

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Recreate the store directory
    Recreate,

    /// Check that every node shares the same ticket keys
    CheckKeys,

    /// No automated recovery possible
    Manual { instructions: String },
}

/// Direction of a failed serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}
