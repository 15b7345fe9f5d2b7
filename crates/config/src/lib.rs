//! Configuration properties and loading for the CAS workspace
//!
//! Properties are plain serde structs whose `Default` carries the stock CAS
//! values. [`CasConfigurationLoader`] layers a JSON file and `CAS_*`
//! environment variables over those defaults.

pub mod loader;
pub mod properties;
mod validation;


pub use loader::{CasConfiguration, CasConfigurationLoader, ConfigSource};
pub use properties::*;
