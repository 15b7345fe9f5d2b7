use crate::transaction::AuthenticationTransaction;
use async_trait::async_trait;
use cas_core::{AuthenticationBuilder, Result, REMEMBER_ME_ATTRIBUTE};

/// Adjusts an authentication after the handlers ran and before policies apply
#[async_trait]
pub trait AuthenticationPostProcessor: Send + Sync {
    fn supports(&self, _transaction: &AuthenticationTransaction) -> bool {
        true
    }

    async fn process(
        &self,
        builder: AuthenticationBuilder,
        transaction: &AuthenticationTransaction,
    ) -> Result<AuthenticationBuilder>;
}

/// Flags the authentication as long-term when a credential asked for it
#[derive(Debug, Default, Clone, Copy)]
pub struct RememberMeAuthenticationPostProcessor;

#[async_trait]
impl AuthenticationPostProcessor for RememberMeAuthenticationPostProcessor {
    fn supports(&self, transaction: &AuthenticationTransaction) -> bool {
        transaction.credentials().iter().any(|c| c.is_remember_me())
    }

    async fn process(
        &self,
        builder: AuthenticationBuilder,
        _transaction: &AuthenticationTransaction,
    ) -> Result<AuthenticationBuilder> {
        Ok(builder.set_attribute(REMEMBER_ME_ATTRIBUTE, vec!["true".to_string()]))
    }
}
