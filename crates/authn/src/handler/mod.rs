//! Authentication handlers validate one credential each

mod accept;

pub use accept::AcceptUsersAuthenticationHandler;

use async_trait::async_trait;
use cas_core::{Credential, HandlerResult, Result};

#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    /// Unique name, used by policies and resolvers
    fn name(&self) -> &str;

    /// Lower runs first
    fn order(&self) -> i32 {
        0
    }

    fn supports(&self, credential: &Credential) -> bool;

    /// Validate the credential and identify its principal
    async fn authenticate(&self, credential: &Credential) -> Result<HandlerResult>;
}
