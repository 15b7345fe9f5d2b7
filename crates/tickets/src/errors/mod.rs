//! Storage-level errors for ticket stores, the transcoder and the cipher

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::{RecoveryHint, RegistryError, Result, SerializationOp};
