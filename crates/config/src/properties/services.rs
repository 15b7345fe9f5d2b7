use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `cas.serviceRegistry.*`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceRegistryProperties {
    pub json: JsonServiceRegistryProperties,
}

/// Directory of `*.json` service definitions; in-memory registry when unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonServiceRegistryProperties {
    pub location: Option<PathBuf>,
}
