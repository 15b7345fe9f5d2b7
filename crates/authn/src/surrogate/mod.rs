//! Surrogate (impersonation) authentication.
//!
//! A user signs in as `surrogate+primary`; the primary account is
//! authenticated and, when allowed, the resulting authentication is swapped
//! to the surrogate principal while remembering who is acting.

mod json;
mod processor;
mod simple;

pub use json::JsonSurrogateAuthenticationService;
pub use processor::SurrogateAuthenticationPostProcessor;
pub use simple::SimpleSurrogateAuthenticationService;

use async_trait::async_trait;
use cas_config::SurrogateProperties;
use cas_core::{Principal, Result, Service};
use std::sync::Arc;

/// Accounts a principal may act as
pub const WILDCARD_ACCOUNT: &str = "*";

#[async_trait]
pub trait SurrogateAuthenticationService: Send + Sync {
    /// Whether `principal` may authenticate as `surrogate` for the service
    async fn can_impersonate(
        &self,
        surrogate: &str,
        principal: &Principal,
        service: Option<&Service>,
    ) -> Result<bool>;

    /// Accounts `principal` may select from
    async fn eligible_accounts(&self, principal: &str) -> Result<Vec<String>>;
}

/// Build the surrogate service described by the properties; a JSON file wins
/// over the inline account map
pub fn surrogate_service_from_properties(
    properties: &SurrogateProperties,
) -> Result<Arc<dyn SurrogateAuthenticationService>> {
    match &properties.json {
        Some(path) => Ok(Arc::new(JsonSurrogateAuthenticationService::load(path)?)),
        None => Ok(Arc::new(SimpleSurrogateAuthenticationService::new(
            properties.simple.clone(),
        ))),
    }
}
