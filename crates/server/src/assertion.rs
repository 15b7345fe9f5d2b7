use cas_core::{AttributeMap, Authentication, Principal, Service};
use serde::{Deserialize, Serialize};

/// Outcome of a successful service ticket validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    primary_authentication: Authentication,
    chained_authentications: Vec<Authentication>,
    service: Service,
    from_new_login: bool,
}

impl Assertion {
    pub fn new(
        primary_authentication: Authentication,
        chained_authentications: Vec<Authentication>,
        service: Service,
        from_new_login: bool,
    ) -> Self {
        Self {
            primary_authentication,
            chained_authentications,
            service,
            from_new_login,
        }
    }

    /// Authentication of the root session, with the principal as released
    /// to the service
    pub fn primary_authentication(&self) -> &Authentication {
        &self.primary_authentication
    }

    /// Nearest first; more than one entry means the ticket was proxied
    pub fn chained_authentications(&self) -> &[Authentication] {
        &self.chained_authentications
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn is_from_new_login(&self) -> bool {
        self.from_new_login
    }

    pub fn principal(&self) -> &Principal {
        self.primary_authentication.principal()
    }

    pub fn attributes(&self) -> &AttributeMap {
        self.principal().attributes()
    }

    /// Number of proxying services between the root session and the ticket
    pub fn proxies(&self) -> usize {
        self.chained_authentications.len().saturating_sub(1)
    }
}
