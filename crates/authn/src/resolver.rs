//! Selection of the handlers that take part in a transaction

use crate::handler::AuthenticationHandler;
use crate::transaction::AuthenticationTransaction;
use cas_core::Result;
use cas_services::ServicesManager;
use std::sync::Arc;
use tracing::debug;

pub type HandlerList = Vec<Arc<dyn AuthenticationHandler>>;

/// Narrows the candidate handlers for a transaction
pub trait AuthenticationHandlerResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first
    fn order(&self) -> i32 {
        0
    }

    fn supports(&self, handlers: &[Arc<dyn AuthenticationHandler>], transaction: &AuthenticationTransaction) -> bool;

    fn resolve(&self, handlers: HandlerList, transaction: &AuthenticationTransaction) -> Result<HandlerList>;
}

/// Every handler that supports at least one submitted credential
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAuthenticationHandlerResolver;

impl AuthenticationHandlerResolver for DefaultAuthenticationHandlerResolver {
    fn name(&self) -> &str {
        "DefaultAuthenticationHandlerResolver"
    }

    fn supports(&self, _handlers: &[Arc<dyn AuthenticationHandler>], _transaction: &AuthenticationTransaction) -> bool {
        true
    }

    fn resolve(&self, handlers: HandlerList, transaction: &AuthenticationTransaction) -> Result<HandlerList> {
        Ok(handlers
            .into_iter()
            .filter(|handler| transaction.credentials().iter().any(|c| handler.supports(c)))
            .collect())
    }
}

/// Applies when the transaction carries one of the listed credential types
#[derive(Debug, Clone)]
pub struct ByCredentialTypeAuthenticationHandlerResolver {
    credential_types: Vec<String>,
}

impl ByCredentialTypeAuthenticationHandlerResolver {
    pub fn new(credential_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            credential_types: credential_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthenticationHandlerResolver for ByCredentialTypeAuthenticationHandlerResolver {
    fn name(&self) -> &str {
        "ByCredentialTypeAuthenticationHandlerResolver"
    }

    fn supports(&self, _handlers: &[Arc<dyn AuthenticationHandler>], transaction: &AuthenticationTransaction) -> bool {
        self.credential_types
            .iter()
            .any(|t| transaction.has_credential_of_type(t))
    }

    fn resolve(&self, handlers: HandlerList, transaction: &AuthenticationTransaction) -> Result<HandlerList> {
        let matching: Vec<_> = transaction
            .credentials()
            .iter()
            .filter(|c| self.credential_types.iter().any(|t| t == c.credential_type()))
            .collect();
        Ok(handlers
            .into_iter()
            .filter(|handler| matching.iter().any(|c| handler.supports(c)))
            .collect())
    }
}

/// Routes a credential to the handler named by its `source`
#[derive(Debug, Default, Clone, Copy)]
pub struct ByCredentialSourceAuthenticationHandlerResolver;

impl AuthenticationHandlerResolver for ByCredentialSourceAuthenticationHandlerResolver {
    fn name(&self) -> &str {
        "ByCredentialSourceAuthenticationHandlerResolver"
    }

    fn supports(&self, _handlers: &[Arc<dyn AuthenticationHandler>], transaction: &AuthenticationTransaction) -> bool {
        transaction.credentials().iter().any(|c| c.source().is_some())
    }

    fn resolve(&self, handlers: HandlerList, transaction: &AuthenticationTransaction) -> Result<HandlerList> {
        let sources: Vec<&str> = transaction
            .credentials()
            .iter()
            .filter_map(|c| c.source())
            .collect();
        Ok(handlers
            .into_iter()
            .filter(|handler| {
                sources
                    .iter()
                    .any(|source| source.eq_ignore_ascii_case(handler.name()))
            })
            .collect())
    }
}

/// Applies the required and excluded handlers of the registered service
#[derive(Debug, Clone)]
pub struct RegisteredServiceAuthenticationHandlerResolver {
    services: Arc<ServicesManager>,
}

impl RegisteredServiceAuthenticationHandlerResolver {
    pub fn new(services: Arc<ServicesManager>) -> Self {
        Self { services }
    }
}

impl AuthenticationHandlerResolver for RegisteredServiceAuthenticationHandlerResolver {
    fn name(&self) -> &str {
        "RegisteredServiceAuthenticationHandlerResolver"
    }

    fn supports(&self, _handlers: &[Arc<dyn AuthenticationHandler>], transaction: &AuthenticationTransaction) -> bool {
        transaction
            .service()
            .and_then(|service| self.services.find_service_by(service))
            .is_some_and(|registered| !registered.authentication_policy.is_empty())
    }

    fn resolve(&self, handlers: HandlerList, transaction: &AuthenticationTransaction) -> Result<HandlerList> {
        let Some(registered) = transaction
            .service()
            .and_then(|service| self.services.find_service_by(service))
        else {
            return Ok(handlers);
        };
        let policy = &registered.authentication_policy;
        let resolved: HandlerList = handlers
            .into_iter()
            .filter(|handler| {
                policy.required_authentication_handlers.is_empty()
                    || policy.required_authentication_handlers.contains(handler.name())
            })
            .filter(|handler| !policy.excluded_authentication_handlers.contains(handler.name()))
            .collect();
        debug!(
            service = %registered.name,
            handlers = resolved.len(),
            "resolved handlers from the service authentication policy"
        );
        Ok(resolved)
    }
}
