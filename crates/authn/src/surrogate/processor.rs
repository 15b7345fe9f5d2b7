use super::SurrogateAuthenticationService;
use crate::processor::AuthenticationPostProcessor;
use crate::transaction::AuthenticationTransaction;
use async_trait::async_trait;
use cas_core::{
    AuthenticationBuilder, Error, Principal, Result, SURROGATE_ENABLED_ATTRIBUTE,
    SURROGATE_PRINCIPAL_ATTRIBUTE, SURROGATE_USER_ATTRIBUTE,
};
use cas_services::ServicesManager;
use std::sync::Arc;
use tracing::{info, warn};

/// Swaps the authenticated principal for the requested surrogate account
pub struct SurrogateAuthenticationPostProcessor {
    surrogates: Arc<dyn SurrogateAuthenticationService>,
    services: Option<Arc<ServicesManager>>,
}

impl SurrogateAuthenticationPostProcessor {
    pub fn new(surrogates: Arc<dyn SurrogateAuthenticationService>) -> Self {
        Self {
            surrogates,
            services: None,
        }
    }

    /// Also honour the `surrogate_enabled` flag of registered services
    #[must_use]
    pub fn with_services(mut self, services: Arc<ServicesManager>) -> Self {
        self.services = Some(services);
        self
    }

    fn service_allows_surrogates(&self, transaction: &AuthenticationTransaction) -> bool {
        let (Some(services), Some(service)) = (&self.services, transaction.service()) else {
            return true;
        };
        services
            .find_service_by(service)
            .map_or(true, |registered| registered.surrogate_enabled)
    }
}

#[async_trait]
impl AuthenticationPostProcessor for SurrogateAuthenticationPostProcessor {
    fn supports(&self, transaction: &AuthenticationTransaction) -> bool {
        transaction.surrogate().is_some()
    }

    async fn process(
        &self,
        builder: AuthenticationBuilder,
        transaction: &AuthenticationTransaction,
    ) -> Result<AuthenticationBuilder> {
        let Some(surrogate) = transaction.surrogate() else {
            return Ok(builder);
        };
        let primary = builder.principal().clone();
        let denied = || Error::SurrogateDenied {
            surrogate: surrogate.to_string(),
            principal: primary.id().to_string(),
        };

        if !self.service_allows_surrogates(transaction) {
            warn!(surrogate, principal = %primary, "service does not allow surrogate authentication");
            return Err(denied());
        }
        if !self
            .surrogates
            .can_impersonate(surrogate, &primary, transaction.service())
            .await?
        {
            warn!(surrogate, principal = %primary, "principal may not act as surrogate");
            return Err(denied());
        }

        info!(surrogate, principal = %primary, "authenticated as surrogate");
        Ok(builder
            .set_principal(Principal::new(surrogate))
            .set_attribute(SURROGATE_ENABLED_ATTRIBUTE, vec!["true".to_string()])
            .set_attribute(SURROGATE_PRINCIPAL_ATTRIBUTE, vec![primary.id().to_string()])
            .set_attribute(SURROGATE_USER_ATTRIBUTE, vec![surrogate.to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surrogate::SimpleSurrogateAuthenticationService;
    use cas_core::{Credential, Service};
    use cas_services::{InMemoryServiceRegistry, RegisteredService};
    use std::collections::BTreeMap;

    fn processor() -> SurrogateAuthenticationPostProcessor {
        SurrogateAuthenticationPostProcessor::new(Arc::new(
            SimpleSurrogateAuthenticationService::new(BTreeMap::from([(
                "casuser".to_string(),
                vec!["banderson".to_string()],
            )])),
        ))
    }

    fn transaction(username: &str, service: Option<Service>) -> AuthenticationTransaction {
        AuthenticationTransaction::new(service, vec![Credential::username_password(username, "Mellon")])
            .with_surrogate_separator("+")
    }

    #[tokio::test]
    async fn test_principal_is_swapped() {
        let tx = transaction("banderson+casuser", None);
        assert!(processor().supports(&tx));

        let authentication = processor()
            .process(AuthenticationBuilder::new(Principal::new("casuser")), &tx)
            .await
            .unwrap()
            .build();
        assert_eq!(authentication.principal().id(), "banderson");
        assert_eq!(authentication.attribute(SURROGATE_PRINCIPAL_ATTRIBUTE), Some("casuser"));
        assert_eq!(authentication.attribute(SURROGATE_USER_ATTRIBUTE), Some("banderson"));
        assert_eq!(authentication.attribute(SURROGATE_ENABLED_ATTRIBUTE), Some("true"));
    }

    #[tokio::test]
    async fn test_unlisted_account_is_denied() {
        let tx = transaction("jsmith+casuser", None);
        let result = processor()
            .process(AuthenticationBuilder::new(Principal::new("casuser")), &tx)
            .await;
        assert!(matches!(result, Err(Error::SurrogateDenied { .. })));
    }

    #[tokio::test]
    async fn test_service_can_disable_surrogates() {
        let mut registered = RegisteredService::new("app", "https://app\\.example\\.org/.*").with_id(1);
        registered.surrogate_enabled = false;
        let services = Arc::new(ServicesManager::new(Arc::new(
            InMemoryServiceRegistry::with_services(vec![registered]),
        )));
        services.load().await.unwrap();

        let tx = transaction(
            "banderson+casuser",
            Some(Service::new("https://app.example.org/home")),
        );
        let result = processor()
            .with_services(services)
            .process(AuthenticationBuilder::new(Principal::new("casuser")), &tx)
            .await;
        assert!(matches!(result, Err(Error::SurrogateDenied { .. })));
    }

    #[test]
    fn test_plain_login_is_not_supported() {
        assert!(!processor().supports(&transaction("casuser", None)));
    }
}
