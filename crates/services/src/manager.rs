use crate::registered_service::RegisteredService;
use crate::registry::{sort_services, InMemoryServiceRegistry, JsonServiceRegistry, ServiceRegistry};
use cas_config::ServiceRegistryProperties;
use cas_core::{Result, Service};
use cas_tickets::{LogoutType, LogoutTypeResolver};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Cached, ordered view of a service registry used to match requests
pub struct ServicesManager {
    registry: Arc<dyn ServiceRegistry>,
    services: RwLock<Vec<RegisteredService>>,
}

impl std::fmt::Debug for ServicesManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesManager")
            .field("registry", &self.registry.name())
            .field("services", &self.services.read().len())
            .finish()
    }
}

impl ServicesManager {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            registry,
            services: RwLock::new(Vec::new()),
        }
    }

    /// JSON directory registry when a location is configured, memory otherwise
    pub fn from_properties(properties: &ServiceRegistryProperties) -> Self {
        let registry: Arc<dyn ServiceRegistry> = match &properties.json.location {
            Some(location) => Arc::new(JsonServiceRegistry::new(location.clone())),
            None => Arc::new(InMemoryServiceRegistry::new()),
        };
        Self::new(registry)
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Reload every definition from the registry, returning how many were loaded
    pub async fn load(&self) -> Result<usize> {
        let services = self.registry.load().await?;
        let count = services.len();
        *self.services.write() = services;
        info!(count, registry = self.registry.name(), "loaded registered services");
        Ok(count)
    }

    pub async fn save(&self, service: RegisteredService) -> Result<RegisteredService> {
        let saved = self.registry.save(service).await?;
        {
            let mut services = self.services.write();
            services.retain(|existing| existing.id != saved.id);
            services.push(saved.clone());
            sort_services(&mut services);
        }
        debug!(id = saved.id, name = %saved.name, "saved registered service");
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> Result<Option<RegisteredService>> {
        let existing = self.find_service_by_id(id);
        if existing.is_some() && self.registry.delete(id).await? {
            self.services.write().retain(|service| service.id != id);
            return Ok(existing);
        }
        Ok(None)
    }

    /// First service, in evaluation order, whose pattern matches
    pub fn find_service_by(&self, service: &Service) -> Option<RegisteredService> {
        self.services
            .read()
            .iter()
            .find(|registered| registered.matches(service))
            .cloned()
    }

    pub fn find_service_by_id(&self, id: i64) -> Option<RegisteredService> {
        self.services
            .read()
            .iter()
            .find(|service| service.id == id)
            .cloned()
    }

    pub fn find_service_by_name(&self, name: &str) -> Option<RegisteredService> {
        self.services
            .read()
            .iter()
            .find(|service| service.name == name)
            .cloned()
    }

    pub fn matches_existing_service(&self, service: &Service) -> bool {
        self.find_service_by(service).is_some()
    }

    pub fn all_services(&self) -> Vec<RegisteredService> {
        self.services.read().clone()
    }

    pub fn count(&self) -> usize {
        self.services.read().len()
    }
}

/// Unregistered services get no logout message
impl LogoutTypeResolver for ServicesManager {
    fn logout_type(&self, service: &Service) -> LogoutType {
        self.find_service_by(service)
            .map_or(LogoutType::None, |registered| registered.logout_type)
    }
}
