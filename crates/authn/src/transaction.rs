use cas_core::{Credential, Service};
use serde::{Deserialize, Serialize};

/// Network origin of a login request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_ip: String,
    pub server_ip: String,
}

impl ClientInfo {
    pub fn new(client_ip: impl Into<String>, server_ip: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            server_ip: server_ip.into(),
        }
    }
}

/// Credentials submitted in one login attempt, with the service being accessed
#[derive(Debug, Clone)]
pub struct AuthenticationTransaction {
    service: Option<Service>,
    credentials: Vec<Credential>,
    /// Account the user asked to act as
    surrogate: Option<String>,
    client_info: Option<ClientInfo>,
}

impl AuthenticationTransaction {
    pub fn new(service: Option<Service>, credentials: Vec<Credential>) -> Self {
        Self {
            service,
            credentials,
            surrogate: None,
            client_info: None,
        }
    }

    /// Split `surrogate<separator>primary` usernames.
    ///
    /// The credential handed to handlers carries the primary username; the
    /// surrogate account is kept on the transaction.
    pub fn with_surrogate_separator(mut self, separator: &str) -> Self {
        if separator.is_empty() {
            return self;
        }
        for credential in &mut self.credentials {
            let Credential::UsernamePassword(upc) = credential else {
                continue;
            };
            let Some((surrogate, primary)) = upc.username.split_once(separator) else {
                continue;
            };
            if surrogate.is_empty() || primary.is_empty() {
                continue;
            }
            let (surrogate, primary) = (surrogate.to_string(), primary.to_string());
            upc.username = primary;
            self.surrogate = Some(surrogate);
        }
        self
    }

    #[must_use]
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = Some(client_info);
        self
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn primary_credential(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    pub fn surrogate(&self) -> Option<&str> {
        self.surrogate.as_deref()
    }

    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    pub fn has_credential_of_type(&self, credential_type: &str) -> bool {
        self.credentials
            .iter()
            .any(|c| c.credential_type() == credential_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surrogate_username_is_split() {
        let tx = AuthenticationTransaction::new(
            None,
            vec![Credential::username_password("user3+casuser", "Mellon")],
        )
        .with_surrogate_separator("+");
        assert_eq!(tx.surrogate(), Some("user3"));
        assert_eq!(tx.primary_credential().map(Credential::id), Some("casuser"));
    }

    #[test]
    fn test_plain_username_is_untouched() {
        for username in ["casuser", "+casuser", "user3+"] {
            let tx = AuthenticationTransaction::new(
                None,
                vec![Credential::username_password(username, "Mellon")],
            )
            .with_surrogate_separator("+");
            assert_eq!(tx.surrogate(), None, "{username}");
            assert_eq!(tx.primary_credential().map(Credential::id), Some(username));
        }
    }
}
