use super::{assign_id, sort_services, ServiceRegistry};
use crate::registered_service::RegisteredService;
use async_trait::async_trait;
use cas_core::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Registry held in memory, optionally seeded at construction
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    services: RwLock<BTreeMap<i64, RegisteredService>>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(services: impl IntoIterator<Item = RegisteredService>) -> Self {
        let registry = Self::new();
        {
            let mut map = registry.services.write();
            for mut service in services {
                assign_id(&mut service, map.keys());
                map.insert(service.id, service);
            }
        }
        registry
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryServiceRegistry {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, mut service: RegisteredService) -> Result<RegisteredService> {
        let mut services = self.services.write();
        assign_id(&mut service, services.keys());
        services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.services.write().remove(&id).is_some())
    }

    async fn load(&self) -> Result<Vec<RegisteredService>> {
        let mut services: Vec<RegisteredService> = self
            .services
            .read()
            .values()
            .filter(|service| service.is_complete())
            .cloned()
            .collect();
        sort_services(&mut services);
        Ok(services)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RegisteredService>> {
        Ok(self.services.read().get(&id).cloned())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.services.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let registry = InMemoryServiceRegistry::new();
        let first = registry.save(RegisteredService::new("a", ".*")).await.unwrap();
        let second = registry.save(RegisteredService::new("b", ".*")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(registry.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_sorts_and_drops_incomplete() {
        let registry = InMemoryServiceRegistry::with_services([
            RegisteredService::new("late", ".*").with_evaluation_order(10),
            RegisteredService::new("early", ".*").with_evaluation_order(1),
            RegisteredService::new("", ".*"),
        ]);
        let names: Vec<String> = registry
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }
}
