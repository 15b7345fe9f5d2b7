//! Property tree mirroring the `cas.*` configuration namespace

mod authn;
mod services;
mod ticket;

pub use authn::*;
pub use services::*;
pub use ticket::*;

use serde::{Deserialize, Serialize};

/// Root of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CasProperties {
    pub host: HostProperties,
    pub ticket: TicketProperties,
    pub authn: AuthenticationProperties,
    pub service_registry: ServiceRegistryProperties,
    pub audit: AuditProperties,
}

/// Identity of this node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostProperties {
    /// Appended to generated ticket ids so a ticket can be traced to its node
    pub name: Option<String>,
}
