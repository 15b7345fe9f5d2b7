use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// `cas.authn.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthenticationProperties {
    pub accept: AcceptAuthenticationProperties,
    pub policy: AuthenticationPolicyProperties,
    pub throttle: ThrottleProperties,
    pub surrogate: SurrogateProperties,
}

/// Static user list handler, `user::password` pairs separated by commas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AcceptAuthenticationProperties {
    pub enabled: bool,
    pub name: String,
    pub users: String,
    pub order: i32,
}

impl Default for AcceptAuthenticationProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "AcceptUsersAuthenticationHandler".to_string(),
            users: "casuser::Mellon".to_string(),
            order: 0,
        }
    }
}

impl AcceptAuthenticationProperties {
    /// Parse `users` into a username to password map, skipping malformed pairs
    pub fn user_map(&self) -> BTreeMap<String, String> {
        self.users
            .split(',')
            .filter_map(|pair| {
                let (user, password) = pair.trim().split_once("::")?;
                (!user.is_empty()).then(|| (user.to_string(), password.to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationPolicyKind {
    #[default]
    AtLeastOne,
    All,
    RequiredHandler,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthenticationPolicyProperties {
    pub kind: AuthenticationPolicyKind,
    /// Handler that must succeed when `kind` is `requiredHandler`
    pub required_handler_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThrottleKind {
    #[default]
    None,
    IpAddress,
    IpAddressAndUsername,
    AuditLog,
}

impl std::str::FromStr for ThrottleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(ThrottleKind::None),
            "ipaddress" | "ip" => Ok(ThrottleKind::IpAddress),
            "ipaddressandusername" => Ok(ThrottleKind::IpAddressAndUsername),
            "auditlog" | "audit" => Ok(ThrottleKind::AuditLog),
            other => Err(format!("unknown throttle kind '{other}'")),
        }
    }
}

/// Login throttling; the allowed failure rate is `threshold / range_seconds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThrottleProperties {
    pub kind: ThrottleKind,
    pub failure: ThrottleFailureProperties,
    pub app_code: String,
    /// How often stale throttle entries are released
    pub repeat_interval_in_seconds: u64,
}

impl Default for ThrottleProperties {
    fn default() -> Self {
        Self {
            kind: ThrottleKind::None,
            failure: ThrottleFailureProperties::default(),
            app_code: cas_core::DEFAULT_AUDIT_APPLICATION_CODE.to_string(),
            repeat_interval_in_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThrottleFailureProperties {
    pub threshold: u32,
    pub range_seconds: u64,
    pub code: String,
}

impl Default for ThrottleFailureProperties {
    fn default() -> Self {
        Self {
            threshold: 100,
            range_seconds: 60,
            code: cas_core::AUTHENTICATION_FAILED_ACTION.to_string(),
        }
    }
}

/// Impersonation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SurrogateProperties {
    pub separator: String,
    /// Principal to the accounts it may act as; `*` allows any account
    pub simple: BTreeMap<String, Vec<String>>,
    /// JSON file with the same shape as `simple`; takes precedence when set
    pub json: Option<PathBuf>,
}

impl Default for SurrogateProperties {
    fn default() -> Self {
        Self {
            separator: cas_core::DEFAULT_SURROGATE_SEPARATOR.to_string(),
            simple: BTreeMap::new(),
            json: None,
        }
    }
}

/// Audit trail retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditProperties {
    pub max_age_in_seconds: u64,
}

impl Default for AuditProperties {
    fn default() -> Self {
        Self {
            max_age_in_seconds: 3_600,
        }
    }
}
