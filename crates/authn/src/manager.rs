//! Runs an authentication transaction through the execution plan

use crate::handler::{AcceptUsersAuthenticationHandler, AuthenticationHandler};
use crate::plan::AuthenticationEventExecutionPlan;
use crate::policy::policy_from_properties;
use crate::processor::RememberMeAuthenticationPostProcessor;
use crate::resolver::{
    ByCredentialSourceAuthenticationHandlerResolver, RegisteredServiceAuthenticationHandlerResolver,
};
use crate::surrogate::{surrogate_service_from_properties, SurrogateAuthenticationPostProcessor};
use crate::transaction::AuthenticationTransaction;
use cas_config::AuthenticationProperties;
use cas_core::{Authentication, AuthenticationBuilder, Error, HandlerResult, Result};
use cas_services::ServicesManager;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authenticates credentials with the plan's handlers and accepts the
/// outcome only when every policy is satisfied
#[derive(Debug, Clone)]
pub struct PolicyBasedAuthenticationManager {
    plan: AuthenticationEventExecutionPlan,
}

impl PolicyBasedAuthenticationManager {
    pub fn new(plan: AuthenticationEventExecutionPlan) -> Self {
        Self { plan }
    }

    /// Manager wired from `cas.authn.*`: the accept-users handler, the
    /// configured policy, remember-me and surrogate post-processing, and
    /// handler resolution by credential source and registered service
    pub fn from_properties(
        properties: &AuthenticationProperties,
        services: Arc<ServicesManager>,
    ) -> Result<Self> {
        let mut plan = AuthenticationEventExecutionPlan::new();
        if properties.accept.enabled {
            plan.register_handler(Arc::new(AcceptUsersAuthenticationHandler::from_properties(
                &properties.accept,
            )));
        }
        plan.register_policy(policy_from_properties(&properties.policy)?);
        plan.register_resolver(Arc::new(ByCredentialSourceAuthenticationHandlerResolver));
        plan.register_resolver(Arc::new(RegisteredServiceAuthenticationHandlerResolver::new(
            services.clone(),
        )));
        plan.register_post_processor(Arc::new(RememberMeAuthenticationPostProcessor));
        let surrogates = surrogate_service_from_properties(&properties.surrogate)?;
        plan.register_post_processor(Arc::new(
            SurrogateAuthenticationPostProcessor::new(surrogates).with_services(services),
        ));
        Ok(Self::new(plan))
    }

    pub fn plan(&self) -> &AuthenticationEventExecutionPlan {
        &self.plan
    }

    pub async fn authenticate(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Result<Authentication> {
        if transaction.credentials().is_empty() {
            return Err(Error::authentication("no credentials were provided"));
        }
        let handlers = self.plan.resolve_handlers(transaction)?;

        let mut successes: Vec<HandlerResult> = Vec::new();
        let mut failures: Vec<(String, String)> = Vec::new();
        for credential in transaction.credentials() {
            let mut validated = false;
            for handler in handlers.iter().filter(|h| h.supports(credential)) {
                match handler.authenticate(credential).await {
                    Ok(result) => {
                        debug!(
                            handler = handler.name(),
                            principal = %result.principal,
                            "credential validated"
                        );
                        successes.push(result);
                        validated = true;
                        // Later handlers only run while the policies still need them.
                        if self.policies_satisfied(&successes, &failures, &handlers) {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(handler = handler.name(), error = %e, "handler rejected credential");
                        failures.push((handler.name().to_string(), e.to_string()));
                    }
                }
            }
            if !validated {
                warn!(
                    credential = credential.id(),
                    "no handler could validate the credential"
                );
            }
        }

        let Some(mut builder) = collect_results(&successes, &failures) else {
            return Err(Error::authentication_with_failures(
                "authentication failed for all credentials",
                failures,
            ));
        };
        builder = builder.with_standard_metadata();

        for processor in self.plan.post_processors() {
            if processor.supports(transaction) {
                builder = processor.process(builder, transaction).await?;
            }
        }
        let authentication = builder.build();

        for policy in self.plan.policies() {
            if !policy.is_satisfied_by(&authentication, &handlers) {
                let failures = authentication
                    .failures()
                    .iter()
                    .map(|(handler, message)| (handler.clone(), message.clone()))
                    .collect();
                return Err(Error::authentication_with_failures(
                    format!("authentication policy {} was not satisfied", policy.name()),
                    failures,
                ));
            }
        }

        info!(principal = %authentication.principal(), "authentication succeeded");
        Ok(authentication)
    }

    fn policies_satisfied(
        &self,
        successes: &[HandlerResult],
        failures: &[(String, String)],
        handlers: &[Arc<dyn AuthenticationHandler>],
    ) -> bool {
        let Some(builder) = collect_results(successes, failures) else {
            return false;
        };
        let authentication = builder.build();
        self.plan
            .policies()
            .iter()
            .all(|policy| policy.is_satisfied_by(&authentication, handlers))
    }
}

/// Builder over the handler outcomes so far, principal taken from the last
/// success; `None` until a handler has succeeded
fn collect_results(
    successes: &[HandlerResult],
    failures: &[(String, String)],
) -> Option<AuthenticationBuilder> {
    let principal = successes.last()?.principal.clone();
    let mut builder = AuthenticationBuilder::new(principal);
    for result in successes {
        builder = builder.add_success(result.clone());
    }
    for (handler, message) in failures {
        builder = builder.add_failure(handler.clone(), message.clone());
    }
    Some(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::AuthenticationHandler;
    use crate::policy::{
        AllAuthenticationHandlersSucceededAuthenticationPolicy, AuthenticationPolicy,
        RequiredHandlerAuthenticationPolicy,
    };
    use cas_core::{Credential, UsernamePasswordCredential, REMEMBER_ME_ATTRIBUTE};
    use cas_services::InMemoryServiceRegistry;
    use std::collections::BTreeMap;

    fn accept(name: &str, user: &str) -> Arc<dyn AuthenticationHandler> {
        Arc::new(AcceptUsersAuthenticationHandler::new(
            name,
            BTreeMap::from([(user.to_string(), "Mellon".to_string())]),
        ))
    }

    fn manager() -> PolicyBasedAuthenticationManager {
        let mut plan = AuthenticationEventExecutionPlan::new();
        plan.register_handler(accept("ldap", "casuser"));
        plan.register_handler(accept("jdbc", "jsmith"));
        plan.register_post_processor(Arc::new(RememberMeAuthenticationPostProcessor));
        PolicyBasedAuthenticationManager::new(plan)
    }

    #[tokio::test]
    async fn test_first_successful_handler_wins() {
        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::username_password("jsmith", "Mellon")],
        );
        let authentication = manager().authenticate(&tx).await.unwrap();
        assert_eq!(authentication.principal().id(), "jsmith");
        assert!(authentication.successes().contains_key("jdbc"));
        assert!(authentication.failures().contains_key("ldap"));
    }

    fn both_accept(policy: Option<Arc<dyn AuthenticationPolicy>>) -> PolicyBasedAuthenticationManager {
        let mut plan = AuthenticationEventExecutionPlan::new();
        let first = AcceptUsersAuthenticationHandler::new(
            "first",
            BTreeMap::from([("casuser".to_string(), "Mellon".to_string())]),
        )
        .with_order(1);
        let second = AcceptUsersAuthenticationHandler::new(
            "second",
            BTreeMap::from([("casuser".to_string(), "Mellon".to_string())]),
        )
        .with_order(2);
        plan.register_handler(Arc::new(first));
        plan.register_handler(Arc::new(second));
        if let Some(policy) = policy {
            plan.register_policy(policy);
        }
        PolicyBasedAuthenticationManager::new(plan)
    }

    fn casuser() -> AuthenticationTransaction {
        AuthenticationTransaction::new(None, vec![Credential::username_password("casuser", "Mellon")])
    }

    #[tokio::test]
    async fn test_satisfied_policy_stops_at_first_success() {
        let authentication = both_accept(None).authenticate(&casuser()).await.unwrap();
        assert!(authentication.successes().contains_key("first"));
        assert!(!authentication.successes().contains_key("second"));
    }

    #[tokio::test]
    async fn test_required_later_handler_is_still_attempted() {
        let manager = both_accept(Some(Arc::new(RequiredHandlerAuthenticationPolicy::new("second"))));
        let authentication = manager.authenticate(&casuser()).await.unwrap();
        assert!(authentication.successes().contains_key("first"));
        assert!(authentication.successes().contains_key("second"));
    }

    #[tokio::test]
    async fn test_all_handlers_policy_runs_every_supporting_handler() {
        let manager = both_accept(Some(Arc::new(AllAuthenticationHandlersSucceededAuthenticationPolicy)));
        let authentication = manager.authenticate(&casuser()).await.unwrap();
        assert_eq!(authentication.successes().len(), 2);
        assert_eq!(authentication.principal().id(), "casuser");
    }

    #[tokio::test]
    async fn test_failures_are_reported() {
        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::username_password("casuser", "wrong")],
        );
        match manager().authenticate(&tx).await {
            Err(Error::Authentication { failures, .. }) => assert_eq!(failures.len(), 2),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_transaction_is_rejected() {
        let tx = AuthenticationTransaction::new(None, Vec::new());
        assert!(manager().authenticate(&tx).await.is_err());
    }

    #[tokio::test]
    async fn test_remember_me_is_recorded() {
        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::UsernamePassword(
                UsernamePasswordCredential::new("casuser", "Mellon").with_remember_me(true),
            )],
        );
        let authentication = manager().authenticate(&tx).await.unwrap();
        assert!(authentication.is_remember_me());
        assert_eq!(authentication.attribute(REMEMBER_ME_ATTRIBUTE), Some("true"));
    }

    #[tokio::test]
    async fn test_policy_rejects_partial_success() {
        let mut plan = manager().plan().clone();
        plan.register_policy(Arc::new(AllAuthenticationHandlersSucceededAuthenticationPolicy));
        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::username_password("casuser", "Mellon")],
        );
        let result = PolicyBasedAuthenticationManager::new(plan).authenticate(&tx).await;
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }

    #[tokio::test]
    async fn test_from_properties_supports_surrogates() {
        let mut properties = AuthenticationProperties::default();
        properties
            .surrogate
            .simple
            .insert("casuser".to_string(), vec!["banderson".to_string()]);
        let services = Arc::new(ServicesManager::new(Arc::new(InMemoryServiceRegistry::new())));
        let manager = PolicyBasedAuthenticationManager::from_properties(&properties, services).unwrap();

        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::username_password("banderson+casuser", "Mellon")],
        )
        .with_surrogate_separator(&properties.surrogate.separator);
        let authentication = manager.authenticate(&tx).await.unwrap();
        assert_eq!(authentication.principal().id(), "banderson");
    }
}
