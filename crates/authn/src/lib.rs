//! Authentication for the CAS session core.
//!
//! A [`PolicyBasedAuthenticationManager`] runs an
//! [`AuthenticationTransaction`] through the handlers selected by its
//! [`AuthenticationEventExecutionPlan`], applies post-processors such as
//! surrogate authentication, and accepts the result only when every
//! [`AuthenticationPolicy`] is satisfied. Login throttling and the audit
//! trail sit in front of the manager.

pub mod audit;
pub mod handler;
mod manager;
pub mod plan;
pub mod policy;
pub mod processor;
pub mod resolver;
pub mod surrogate;
pub mod throttle;
pub mod transaction;

pub use audit::{AuditActionContext, AuditTrailManager, InMemoryAuditTrailManager};
pub use handler::{AcceptUsersAuthenticationHandler, AuthenticationHandler};
pub use manager::PolicyBasedAuthenticationManager;
pub use plan::AuthenticationEventExecutionPlan;
pub use policy::{
    policy_from_properties, AllAuthenticationHandlersSucceededAuthenticationPolicy,
    AtLeastOneCredentialValidatedAuthenticationPolicy, AuthenticationPolicy,
    RequiredHandlerAuthenticationPolicy,
};
pub use processor::{AuthenticationPostProcessor, RememberMeAuthenticationPostProcessor};
pub use resolver::{
    AuthenticationHandlerResolver, ByCredentialSourceAuthenticationHandlerResolver,
    ByCredentialTypeAuthenticationHandlerResolver, DefaultAuthenticationHandlerResolver,
    HandlerList, RegisteredServiceAuthenticationHandlerResolver,
};
pub use surrogate::{
    surrogate_service_from_properties, JsonSurrogateAuthenticationService,
    SimpleSurrogateAuthenticationService, SurrogateAuthenticationPostProcessor,
    SurrogateAuthenticationService,
};
pub use throttle::{
    spawn_release_task, throttle_from_properties, AuditLogThrottledSubmissionHandler,
    InMemoryThrottledSubmissionHandler, LoginAttempt, ThrottleKey, ThrottleThreshold,
    ThrottledSubmissionHandler,
};
pub use transaction::{AuthenticationTransaction, ClientInfo};
