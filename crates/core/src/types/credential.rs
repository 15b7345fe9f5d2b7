use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password credential with optional routing source and remember-me flag
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernamePasswordCredential {
    pub username: String,
    pub password: String,
    /// Name of the authentication handler the user selected, if any
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

impl UsernamePasswordCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            source: None,
            remember_me: false,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

// Passwords never reach logs.
impl fmt::Debug for UsernamePasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePasswordCredential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("source", &self.source)
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Credentials accepted by authentication handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credential {
    UsernamePassword(UsernamePasswordCredential),
    /// Proxy callback URL presented when requesting a proxy-granting ticket
    HttpBasedService { callback_url: String },
    OneTimeToken { id: String, token: String },
}

impl Credential {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::UsernamePassword(UsernamePasswordCredential::new(username, password))
    }

    /// Identifier of the credential (username, callback URL or token owner)
    pub fn id(&self) -> &str {
        match self {
            Credential::UsernamePassword(c) => &c.username,
            Credential::HttpBasedService { callback_url } => callback_url,
            Credential::OneTimeToken { id, .. } => id,
        }
    }

    pub fn credential_type(&self) -> &'static str {
        match self {
            Credential::UsernamePassword(_) => "UsernamePasswordCredential",
            Credential::HttpBasedService { .. } => "HttpBasedServiceCredential",
            Credential::OneTimeToken { .. } => "OneTimeTokenCredential",
        }
    }

    /// Handler name the credential asks to be routed to
    pub fn source(&self) -> Option<&str> {
        match self {
            Credential::UsernamePassword(c) => c.source.as_deref(),
            _ => None,
        }
    }

    pub fn is_remember_me(&self) -> bool {
        matches!(self, Credential::UsernamePassword(c) if c.remember_me)
    }

    pub fn meta_data(&self) -> CredentialMetaData {
        CredentialMetaData {
            id: self.id().to_string(),
            credential_type: self.credential_type().to_string(),
        }
    }
}

/// Non-sensitive description of a credential kept on the authentication record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMetaData {
    pub id: String,
    pub credential_type: String,
}
