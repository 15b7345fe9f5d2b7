use crate::handler::AuthenticationHandler;
use crate::policy::{AtLeastOneCredentialValidatedAuthenticationPolicy, AuthenticationPolicy};
use crate::processor::AuthenticationPostProcessor;
use crate::resolver::{
    AuthenticationHandlerResolver, DefaultAuthenticationHandlerResolver, HandlerList,
};
use crate::transaction::AuthenticationTransaction;
use cas_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Handlers, resolvers, post-processors and policies of the authentication
/// manager, registered at startup
#[derive(Default, Clone)]
pub struct AuthenticationEventExecutionPlan {
    handlers: HandlerList,
    resolvers: Vec<Arc<dyn AuthenticationHandlerResolver>>,
    post_processors: Vec<Arc<dyn AuthenticationPostProcessor>>,
    policies: Vec<Arc<dyn AuthenticationPolicy>>,
}

impl std::fmt::Debug for AuthenticationEventExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationEventExecutionPlan")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("post_processors", &self.post_processors.len())
            .field(
                "policies",
                &self.policies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AuthenticationEventExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, handler: Arc<dyn AuthenticationHandler>) {
        debug!(handler = handler.name(), "registering authentication handler");
        self.handlers.push(handler);
        self.handlers.sort_by_key(|h| h.order());
    }

    pub fn register_resolver(&mut self, resolver: Arc<dyn AuthenticationHandlerResolver>) {
        self.resolvers.push(resolver);
        self.resolvers.sort_by_key(|r| r.order());
    }

    pub fn register_post_processor(&mut self, processor: Arc<dyn AuthenticationPostProcessor>) {
        self.post_processors.push(processor);
    }

    pub fn register_policy(&mut self, policy: Arc<dyn AuthenticationPolicy>) {
        self.policies.push(policy);
    }

    pub fn handlers(&self) -> &[Arc<dyn AuthenticationHandler>] {
        &self.handlers
    }

    pub fn post_processors(&self) -> &[Arc<dyn AuthenticationPostProcessor>] {
        &self.post_processors
    }

    /// Registered policies, or at-least-one-credential when none are
    pub fn policies(&self) -> Vec<Arc<dyn AuthenticationPolicy>> {
        if self.policies.is_empty() {
            return vec![Arc::new(
                AtLeastOneCredentialValidatedAuthenticationPolicy::default(),
            )];
        }
        self.policies.clone()
    }

    /// Handlers for the transaction after every supporting resolver narrowed
    /// the set, in order; the default resolver applies when none supports it
    pub fn resolve_handlers(&self, transaction: &AuthenticationTransaction) -> Result<HandlerList> {
        let mut handlers = self.handlers.clone();
        let mut resolved_by_any = false;
        for resolver in &self.resolvers {
            if resolver.supports(&handlers, transaction) {
                handlers = resolver.resolve(handlers, transaction)?;
                resolved_by_any = true;
                debug!(
                    resolver = resolver.name(),
                    remaining = handlers.len(),
                    "applied authentication handler resolver"
                );
            }
        }
        if !resolved_by_any {
            handlers = DefaultAuthenticationHandlerResolver.resolve(handlers, transaction)?;
        }
        if handlers.is_empty() {
            return Err(Error::authentication(
                "no authentication handlers are available for the submitted credentials",
            ));
        }
        Ok(handlers)
    }
}
