//! Shared utilities for the CAS workspace
//!
//! Logging initialisation, XDG-style default locations and crash-safe file
//! writes used by the file-backed ticket store and the JSON service registry.

pub mod atomic_file;
pub mod sharding;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use sharding::*;
pub use xdg::*;
