//! Persistence of registered service definitions

mod json;
mod memory;

pub use json::JsonServiceRegistry;
pub use memory::InMemoryServiceRegistry;

use crate::registered_service::{RegisteredService, UNASSIGNED_SERVICE_ID};
use async_trait::async_trait;
use cas_core::Result;

/// Storage of registered services
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    /// Insert or replace, assigning an id to new services
    async fn save(&self, service: RegisteredService) -> Result<RegisteredService>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Every valid definition, ordered by evaluation order
    async fn load(&self) -> Result<Vec<RegisteredService>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<RegisteredService>>;

    async fn size(&self) -> Result<usize>;
}

/// Sort key shared by registries and the services manager
pub(crate) fn sort_services(services: &mut [RegisteredService]) {
    services.sort_by(|a, b| {
        a.evaluation_order
            .cmp(&b.evaluation_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Give `service` the next free id when it has none
pub(crate) fn assign_id<'a>(
    service: &mut RegisteredService,
    existing: impl Iterator<Item = &'a i64>,
) {
    if service.id == UNASSIGNED_SERVICE_ID {
        service.id = existing.copied().max().unwrap_or(0).max(0) + 1;
    }
}
