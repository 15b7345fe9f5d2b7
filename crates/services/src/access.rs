//! Service access strategy and the checks built on it

use crate::registered_service::RegisteredService;
use cas_core::{AttributeMap, Authentication, Error, Result, Service};
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Who may use a service and whether it takes part in SSO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceAccessStrategy {
    pub enabled: bool,
    pub sso_enabled: bool,
    pub starting_date_time: Option<DateTime<Utc>>,
    pub ending_date_time: Option<DateTime<Utc>>,
    pub unauthorized_redirect_url: Option<String>,
    pub require_all_attributes: bool,
    /// Attribute name to accepted values; values are regular expressions
    pub required_attributes: BTreeMap<String, BTreeSet<String>>,
    pub case_insensitive: bool,
}

impl Default for ServiceAccessStrategy {
    fn default() -> Self {
        Self {
            enabled: true,
            sso_enabled: true,
            starting_date_time: None,
            ending_date_time: None,
            unauthorized_redirect_url: None,
            require_all_attributes: true,
            required_attributes: BTreeMap::new(),
            case_insensitive: false,
        }
    }
}

impl ServiceAccessStrategy {
    pub fn is_service_access_allowed(&self) -> bool {
        self.is_service_access_allowed_at(Utc::now())
    }

    /// Enabled and inside the optional access window
    pub fn is_service_access_allowed_at(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.starting_date_time.is_some_and(|start| now < start) {
            debug!("service access window has not started");
            return false;
        }
        if self.ending_date_time.is_some_and(|end| now > end) {
            debug!("service access window has ended");
            return false;
        }
        true
    }

    pub fn is_service_access_allowed_for_sso(&self) -> bool {
        self.sso_enabled
    }

    /// Check principal attributes against the required attributes.
    ///
    /// With `require_all_attributes` every required attribute needs a
    /// matching value; otherwise one is enough.
    pub fn do_principal_attributes_allow_service_access(&self, attributes: &AttributeMap) -> bool {
        if self.required_attributes.is_empty() {
            return true;
        }
        if attributes.is_empty() {
            return false;
        }
        let mut satisfied = self
            .required_attributes
            .iter()
            .map(|(name, accepted)| self.attribute_satisfied(attributes.get(name), accepted));
        if self.require_all_attributes {
            satisfied.all(|ok| ok)
        } else {
            satisfied.any(|ok| ok)
        }
    }

    fn attribute_satisfied(&self, values: Option<&Vec<String>>, accepted: &BTreeSet<String>) -> bool {
        let Some(values) = values else {
            return false;
        };
        accepted.iter().any(|pattern| {
            match RegexBuilder::new(&format!("^(?:{pattern})$"))
                .case_insensitive(self.case_insensitive)
                .build()
            {
                Ok(regex) => values.iter().any(|value| regex.is_match(value)),
                Err(_) => values.iter().any(|value| value == pattern),
            }
        })
    }
}

/// Fail unless a registered service exists for `service` and is enabled
pub fn ensure_service_access_allowed(
    service: &Service,
    registered_service: Option<&RegisteredService>,
) -> Result<()> {
    let Some(registered_service) = registered_service else {
        warn!(service = %service, "service is not found in the service registry");
        return Err(Error::unauthorized_service(
            service.id(),
            "service is not found in the service registry",
        ));
    };
    if !registered_service.access_strategy.is_service_access_allowed() {
        warn!(service = %service, "service is not enabled in the service registry");
        return Err(Error::unauthorized_service(
            service.id(),
            "service is not enabled in the service registry",
        ));
    }
    Ok(())
}

/// Service access plus the principal attribute requirements.
///
/// Released principal attributes and authentication attributes are both
/// visible to the check; authentication attributes win on conflicts.
pub fn ensure_principal_access_allowed(
    service: &Service,
    registered_service: Option<&RegisteredService>,
    authentication: &Authentication,
) -> Result<()> {
    ensure_service_access_allowed(service, registered_service)?;
    let Some(registered_service) = registered_service else {
        return Ok(());
    };
    let principal = authentication.principal();
    let mut attributes = registered_service
        .attribute_release_policy
        .release(principal);
    attributes.extend(
        authentication
            .attributes()
            .iter()
            .map(|(name, values)| (name.clone(), values.clone())),
    );
    if !registered_service
        .access_strategy
        .do_principal_attributes_allow_service_access(&attributes)
    {
        warn!(service = %service, principal = %principal, "principal is not authorized for service");
        return Err(Error::principal_access(
            principal.id(),
            format!("not authorized to use service '{}'", service.id()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeReleasePolicy;
    use cas_core::Principal;
    use chrono::TimeDelta;

    fn attributes(pairs: &[(&str, &[&str])]) -> AttributeMap {
        pairs
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn requiring(pairs: &[(&str, &[&str])], require_all: bool) -> ServiceAccessStrategy {
        ServiceAccessStrategy {
            require_all_attributes: require_all,
            required_attributes: pairs
                .iter()
                .map(|(name, values)| {
                    (
                        name.to_string(),
                        values.iter().map(|v| v.to_string()).collect(),
                    )
                })
                .collect(),
            ..ServiceAccessStrategy::default()
        }
    }

    #[test]
    fn test_no_requirements_allow_everyone() {
        let strategy = ServiceAccessStrategy::default();
        assert!(strategy.do_principal_attributes_allow_service_access(&AttributeMap::new()));
    }

    #[test]
    fn test_require_all_attributes() {
        let strategy = requiring(&[("cn", &["cas"]), ("givenName", &["Casuser"])], true);
        assert!(strategy.do_principal_attributes_allow_service_access(&attributes(&[
            ("cn", &["cas"]),
            ("givenName", &["Casuser"]),
        ])));
        assert!(!strategy.do_principal_attributes_allow_service_access(&attributes(&[(
            "cn",
            &["cas"]
        )])));
    }

    #[test]
    fn test_require_any_attribute_with_patterns() {
        let strategy = requiring(&[("memberOf", &["staff|faculty"]), ("cn", &["admin"])], false);
        assert!(strategy
            .do_principal_attributes_allow_service_access(&attributes(&[("memberOf", &["faculty"])])));
        assert!(!strategy
            .do_principal_attributes_allow_service_access(&attributes(&[("memberOf", &["student"])])));
    }

    #[test]
    fn test_case_insensitive_values() {
        let mut strategy = requiring(&[("cn", &["CAS"])], true);
        assert!(!strategy.do_principal_attributes_allow_service_access(&attributes(&[("cn", &["cas"])])));
        strategy.case_insensitive = true;
        assert!(strategy.do_principal_attributes_allow_service_access(&attributes(&[("cn", &["cas"])])));
    }

    #[test]
    fn test_access_window() {
        let now = Utc::now();
        let strategy = ServiceAccessStrategy {
            starting_date_time: Some(now + TimeDelta::hours(1)),
            ..ServiceAccessStrategy::default()
        };
        assert!(!strategy.is_service_access_allowed_at(now));
        assert!(strategy.is_service_access_allowed_at(now + TimeDelta::hours(2)));

        let ended = ServiceAccessStrategy {
            ending_date_time: Some(now - TimeDelta::hours(1)),
            ..ServiceAccessStrategy::default()
        };
        assert!(!ended.is_service_access_allowed_at(now));
    }

    #[test]
    fn test_ensure_service_access() {
        let service = Service::new("https://app.example.org/");
        assert!(matches!(
            ensure_service_access_allowed(&service, None),
            Err(Error::UnauthorizedService { .. })
        ));

        let mut registered = RegisteredService::new("app", ".*");
        assert!(ensure_service_access_allowed(&service, Some(&registered)).is_ok());
        registered.access_strategy.enabled = false;
        assert!(ensure_service_access_allowed(&service, Some(&registered)).is_err());
    }

    #[test]
    fn test_ensure_principal_access_uses_released_attributes() {
        let service = Service::new("https://app.example.org/");
        let mut registered = RegisteredService::new("app", ".*");
        registered.access_strategy = requiring(&[("memberOf", &["staff"])], true);

        let mut principal = Principal::new("casuser");
        principal.insert_attribute("memberOf", vec!["staff".into()]);
        let authentication = Authentication::builder(principal).build();

        // Nothing released by default
        assert!(matches!(
            ensure_principal_access_allowed(&service, Some(&registered), &authentication),
            Err(Error::PrincipalAccess { .. })
        ));

        registered.attribute_release_policy = AttributeReleasePolicy::ReturnAll;
        assert!(ensure_principal_access_allowed(&service, Some(&registered), &authentication).is_ok());
    }
}
