use crate::access::ServiceAccessStrategy;
use crate::attributes::AttributeReleasePolicy;
use cas_core::{Principal, Service};
use cas_tickets::LogoutType;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::warn;

/// Id of a service that has not been saved yet
pub const UNASSIGNED_SERVICE_ID: i64 = 0;

/// Authentication handlers a service requires or refuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceAuthenticationPolicy {
    pub required_authentication_handlers: BTreeSet<String>,
    pub excluded_authentication_handlers: BTreeSet<String>,
}

impl ServiceAuthenticationPolicy {
    pub fn is_empty(&self) -> bool {
        self.required_authentication_handlers.is_empty()
            && self.excluded_authentication_handlers.is_empty()
    }
}

/// Whether the service may obtain proxy-granting tickets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyPolicy {
    #[default]
    Refuse,
    /// Proxy callbacks must match the pattern
    Regex { pattern: String },
}

impl ProxyPolicy {
    pub fn is_allowed_to_proxy(&self) -> bool {
        matches!(self, ProxyPolicy::Regex { .. })
    }

    pub fn is_allowed_proxy_callback_url(&self, url: &str) -> bool {
        match self {
            ProxyPolicy::Refuse => false,
            ProxyPolicy::Regex { pattern } => compile_full_match(pattern)
                .map(|regex| regex.is_match(url))
                .unwrap_or(false),
        }
    }
}

/// How the principal id handed to a service is derived
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsernameAttributeProvider {
    /// The authenticated principal id
    #[default]
    Default,
    /// Opaque per-service identifier that does not reveal the principal
    Anonymous { salt: String },
    /// Value of a principal attribute, falling back to the principal id
    PrincipalAttribute { attribute: String },
}

impl UsernameAttributeProvider {
    pub fn resolve_username(&self, principal: &Principal, service: &Service) -> String {
        match self {
            UsernameAttributeProvider::Default => principal.id().to_string(),
            UsernameAttributeProvider::Anonymous { salt } => {
                let mut hasher = Sha256::new();
                hasher.update(service.id().as_bytes());
                hasher.update(b"!");
                hasher.update(principal.id().as_bytes());
                hasher.update(b"!");
                hasher.update(salt.as_bytes());
                hex::encode(hasher.finalize())
            }
            UsernameAttributeProvider::PrincipalAttribute { attribute } => principal
                .attribute(attribute)
                .unwrap_or_else(|| principal.id())
                .to_string(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, UsernameAttributeProvider::Anonymous { .. })
    }
}

/// A relying party registered with the server.
///
/// `service_id` is a regular expression matched case-insensitively against
/// the whole service URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredService {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_order: i32,
    #[serde(default)]
    pub access_strategy: ServiceAccessStrategy,
    #[serde(default)]
    pub attribute_release_policy: AttributeReleasePolicy,
    #[serde(default)]
    pub authentication_policy: ServiceAuthenticationPolicy,
    #[serde(default)]
    pub proxy_policy: ProxyPolicy,
    #[serde(default)]
    pub username_attribute_provider: UsernameAttributeProvider,
    #[serde(default)]
    pub logout_type: LogoutType,
    /// Whether users may impersonate others when logging into this service
    #[serde(default = "default_surrogate_enabled")]
    pub surrogate_enabled: bool,
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

fn default_surrogate_enabled() -> bool {
    true
}

impl PartialEq for RegisteredService {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.service_id == other.service_id
            && self.description == other.description
            && self.evaluation_order == other.evaluation_order
            && self.access_strategy == other.access_strategy
            && self.attribute_release_policy == other.attribute_release_policy
            && self.authentication_policy == other.authentication_policy
            && self.proxy_policy == other.proxy_policy
            && self.username_attribute_provider == other.username_attribute_provider
            && self.logout_type == other.logout_type
            && self.surrogate_enabled == other.surrogate_enabled
    }
}

impl RegisteredService {
    pub fn new(name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_SERVICE_ID,
            name: name.into(),
            service_id: service_id.into(),
            description: None,
            evaluation_order: 0,
            access_strategy: ServiceAccessStrategy::default(),
            attribute_release_policy: AttributeReleasePolicy::default(),
            authentication_policy: ServiceAuthenticationPolicy::default(),
            proxy_policy: ProxyPolicy::default(),
            username_attribute_provider: UsernameAttributeProvider::default(),
            logout_type: LogoutType::default(),
            surrogate_enabled: true,
            compiled: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_evaluation_order(mut self, order: i32) -> Self {
        self.evaluation_order = order;
        self
    }

    /// Whether the definition carries the fields every registry requires
    pub fn is_complete(&self) -> bool {
        !self.service_id.trim().is_empty() && !self.name.trim().is_empty()
    }

    pub fn matches(&self, service: &Service) -> bool {
        self.matches_url(service.id())
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.compiled
            .get_or_init(|| match compile_full_match(&self.service_id) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(service = %self.name, pattern = %self.service_id, error = %e, "invalid service pattern");
                    None
                }
            })
            .as_ref()
            .is_some_and(|regex| regex.is_match(url))
    }

    pub fn is_allowed_to_proxy(&self) -> bool {
        self.proxy_policy.is_allowed_to_proxy()
    }

    /// File name used by directory-backed registries
    pub fn file_name(&self, extension: &str) -> String {
        let name: String = self.name.chars().filter(|c| !c.is_whitespace()).collect();
        format!("{name}-{}.{extension}", self.id)
    }
}

fn compile_full_match(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_whole_url_case_insensitively() {
        let service = RegisteredService::new("app", r"https://app\.example\.org/.*");
        assert!(service.matches(&Service::new("https://APP.example.org/login")));
        assert!(!service.matches(&Service::new("https://evil.org/?https://app.example.org/")));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let service = RegisteredService::new("broken", "https://(");
        assert!(!service.matches(&Service::new("https://(")));
    }

    #[test]
    fn test_file_name_strips_whitespace() {
        let service = RegisteredService::new("My App", ".*").with_id(42);
        assert_eq!(service.file_name("json"), "MyApp-42.json");
    }

    #[test]
    fn test_proxy_policy() {
        let refuse = ProxyPolicy::Refuse;
        assert!(!refuse.is_allowed_to_proxy());
        let allow = ProxyPolicy::Regex {
            pattern: r"https://proxy\.example\.org/.*".into(),
        };
        assert!(allow.is_allowed_to_proxy());
        assert!(allow.is_allowed_proxy_callback_url("https://proxy.example.org/pgt"));
        assert!(!allow.is_allowed_proxy_callback_url("https://other.example.org/pgt"));
    }

    #[test]
    fn test_username_providers() {
        let mut principal = Principal::new("casuser");
        principal.insert_attribute("mail", vec!["casuser@example.org".into()]);
        let service = Service::new("https://app.example.org/");

        assert_eq!(
            UsernameAttributeProvider::Default.resolve_username(&principal, &service),
            "casuser"
        );
        assert_eq!(
            UsernameAttributeProvider::PrincipalAttribute {
                attribute: "mail".into()
            }
            .resolve_username(&principal, &service),
            "casuser@example.org"
        );

        let anonymous = UsernameAttributeProvider::Anonymous { salt: "s".into() };
        let first = anonymous.resolve_username(&principal, &service);
        assert_ne!(first, "casuser");
        assert_eq!(first, anonymous.resolve_username(&principal, &service));
        assert_ne!(
            first,
            anonymous.resolve_username(&principal, &Service::new("https://other.example.org/"))
        );
    }

    #[test]
    fn test_json_defaults() {
        let service: RegisteredService = serde_json::from_str(
            r#"{ "id": 7, "name": "app", "serviceId": "https://app\\.example\\.org/.*" }"#,
        )
        .unwrap();
        assert!(service.access_strategy.enabled);
        assert!(service.surrogate_enabled);
        assert_eq!(service.logout_type, LogoutType::BackChannel);
        assert!(!service.is_allowed_to_proxy());
    }
}
