//! Registered services and the registries that hold them.
//!
//! A [`RegisteredService`] is matched against incoming service URLs by the
//! [`ServicesManager`], which keeps an ordered in-memory copy of a
//! [`ServiceRegistry`]. The [`access`] module carries the checks applied
//! before tickets are issued to a service.

pub mod access;
pub mod attributes;
mod manager;
pub mod registered_service;
pub mod registry;

pub use access::{
    ensure_principal_access_allowed, ensure_service_access_allowed, ServiceAccessStrategy,
};
pub use attributes::AttributeReleasePolicy;
pub use manager::ServicesManager;
pub use registered_service::{
    ProxyPolicy, RegisteredService, ServiceAuthenticationPolicy, UsernameAttributeProvider,
    UNASSIGNED_SERVICE_ID,
};
pub use registry::{InMemoryServiceRegistry, JsonServiceRegistry, ServiceRegistry};
