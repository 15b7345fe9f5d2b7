use super::AuthenticationHandler;
use async_trait::async_trait;
use cas_config::AcceptAuthenticationProperties;
use cas_core::{Credential, Error, HandlerResult, Principal, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Accepts a fixed set of username and password pairs
#[derive(Debug, Clone)]
pub struct AcceptUsersAuthenticationHandler {
    name: String,
    order: i32,
    users: BTreeMap<String, String>,
}

impl AcceptUsersAuthenticationHandler {
    pub fn new(name: impl Into<String>, users: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            users,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn from_properties(properties: &AcceptAuthenticationProperties) -> Self {
        Self::new(properties.name.clone(), properties.user_map()).with_order(properties.order)
    }
}

#[async_trait]
impl AuthenticationHandler for AcceptUsersAuthenticationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword(_))
    }

    async fn authenticate(&self, credential: &Credential) -> Result<HandlerResult> {
        let Credential::UsernamePassword(upc) = credential else {
            return Err(Error::authentication(format!(
                "{} does not support {}",
                self.name,
                credential.credential_type()
            )));
        };
        if upc.username.is_empty() {
            return Err(Error::authentication("username is blank"));
        }
        match self.users.get(&upc.username) {
            None => Err(Error::authentication(format!(
                "account '{}' is not found",
                upc.username
            ))),
            Some(expected) if *expected != upc.password => {
                debug!(username = %upc.username, "password mismatch");
                Err(Error::authentication("password does not match"))
            }
            Some(_) => Ok(HandlerResult::new(
                &self.name,
                credential,
                Principal::new(&upc.username),
            )),
        }
    }
}
