//! Conditions an authentication must meet to be accepted

use crate::handler::AuthenticationHandler;
use cas_config::{AuthenticationPolicyKind, AuthenticationPolicyProperties};
use cas_core::{Authentication, Error, Result};
use std::sync::Arc;

pub trait AuthenticationPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `handlers` are the handlers that were attempted
    fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        handlers: &[Arc<dyn AuthenticationHandler>],
    ) -> bool;
}

/// At least one credential was validated; with `try_all`, every credential
#[derive(Debug, Default, Clone, Copy)]
pub struct AtLeastOneCredentialValidatedAuthenticationPolicy {
    pub try_all: bool,
}

impl AuthenticationPolicy for AtLeastOneCredentialValidatedAuthenticationPolicy {
    fn name(&self) -> &str {
        "AtLeastOneCredentialValidatedAuthenticationPolicy"
    }

    fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        _handlers: &[Arc<dyn AuthenticationHandler>],
    ) -> bool {
        if authentication.successes().is_empty() {
            return false;
        }
        if self.try_all {
            let validated = authentication
                .successes()
                .values()
                .map(|result| &result.credential_meta_data)
                .collect::<Vec<_>>();
            return authentication
                .credentials()
                .iter()
                .all(|credential| validated.contains(&credential));
        }
        true
    }
}

/// Every attempted handler succeeded
#[derive(Debug, Default, Clone, Copy)]
pub struct AllAuthenticationHandlersSucceededAuthenticationPolicy;

impl AuthenticationPolicy for AllAuthenticationHandlersSucceededAuthenticationPolicy {
    fn name(&self) -> &str {
        "AllAuthenticationHandlersSucceededAuthenticationPolicy"
    }

    fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        handlers: &[Arc<dyn AuthenticationHandler>],
    ) -> bool {
        !handlers.is_empty()
            && handlers
                .iter()
                .all(|handler| authentication.successes().contains_key(handler.name()))
    }
}

/// The named handler succeeded
#[derive(Debug, Clone)]
pub struct RequiredHandlerAuthenticationPolicy {
    required_handler_name: String,
}

impl RequiredHandlerAuthenticationPolicy {
    pub fn new(required_handler_name: impl Into<String>) -> Self {
        Self {
            required_handler_name: required_handler_name.into(),
        }
    }
}

impl AuthenticationPolicy for RequiredHandlerAuthenticationPolicy {
    fn name(&self) -> &str {
        "RequiredHandlerAuthenticationPolicy"
    }

    fn is_satisfied_by(
        &self,
        authentication: &Authentication,
        _handlers: &[Arc<dyn AuthenticationHandler>],
    ) -> bool {
        authentication
            .successes()
            .contains_key(&self.required_handler_name)
    }
}

pub fn policy_from_properties(
    properties: &AuthenticationPolicyProperties,
) -> Result<Arc<dyn AuthenticationPolicy>> {
    Ok(match properties.kind {
        AuthenticationPolicyKind::AtLeastOne => {
            Arc::new(AtLeastOneCredentialValidatedAuthenticationPolicy::default())
        }
        AuthenticationPolicyKind::All => {
            Arc::new(AllAuthenticationHandlersSucceededAuthenticationPolicy)
        }
        AuthenticationPolicyKind::RequiredHandler => {
            let name = properties.required_handler_name.as_deref().ok_or_else(|| {
                Error::configuration("required handler policy needs requiredHandlerName")
            })?;
            Arc::new(RequiredHandlerAuthenticationPolicy::new(name))
        }
    })
}
