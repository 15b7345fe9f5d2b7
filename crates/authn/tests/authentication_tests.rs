use cas_authn::*;
use cas_config::{AuthenticationProperties, ThrottleKind};
use cas_core::{Credential, Error, Service, UsernamePasswordCredential};
use cas_services::{InMemoryServiceRegistry, RegisteredService, ServicesManager};
use std::collections::BTreeSet;
use std::sync::Arc;

async fn services(registered: Vec<RegisteredService>) -> Arc<ServicesManager> {
    let manager = Arc::new(ServicesManager::new(Arc::new(
        InMemoryServiceRegistry::with_services(registered),
    )));
    manager.load().await.unwrap();
    manager
}

fn properties() -> AuthenticationProperties {
    let mut properties = AuthenticationProperties::default();
    properties.accept.users = "casuser::Mellon,jsmith::secret".to_string();
    properties
}

#[tokio::test]
async fn test_login_with_configured_users() {
    let manager = PolicyBasedAuthenticationManager::from_properties(&properties(), services(vec![]).await)
        .unwrap();

    let ok = AuthenticationTransaction::new(None, vec![Credential::username_password("jsmith", "secret")]);
    let authentication = manager.authenticate(&ok).await.unwrap();
    assert_eq!(authentication.principal().id(), "jsmith");
    assert_eq!(
        authentication.attribute(cas_core::SUCCESSFUL_HANDLERS_ATTRIBUTE),
        Some("AcceptUsersAuthenticationHandler")
    );

    let bad = AuthenticationTransaction::new(None, vec![Credential::username_password("jsmith", "nope")]);
    assert!(matches!(
        manager.authenticate(&bad).await,
        Err(Error::Authentication { .. })
    ));
}

#[tokio::test]
async fn test_service_policy_excludes_handler() {
    let mut registered = RegisteredService::new("locked", "https://locked\\.example\\.org/.*").with_id(7);
    registered.authentication_policy.excluded_authentication_handlers =
        BTreeSet::from(["AcceptUsersAuthenticationHandler".to_string()]);
    let manager =
        PolicyBasedAuthenticationManager::from_properties(&properties(), services(vec![registered]).await)
            .unwrap();

    let tx = AuthenticationTransaction::new(
        Some(Service::new("https://locked.example.org/app")),
        vec![Credential::username_password("casuser", "Mellon")],
    );
    assert!(manager.authenticate(&tx).await.is_err());

    let elsewhere = AuthenticationTransaction::new(
        Some(Service::new("https://open.example.org/app")),
        vec![Credential::username_password("casuser", "Mellon")],
    );
    assert!(manager.authenticate(&elsewhere).await.is_ok());
}

#[tokio::test]
async fn test_credential_source_routes_to_named_handler() {
    let manager = PolicyBasedAuthenticationManager::from_properties(&properties(), services(vec![]).await)
        .unwrap();
    let routed = AuthenticationTransaction::new(
        None,
        vec![Credential::UsernamePassword(
            UsernamePasswordCredential::new("casuser", "Mellon").with_source("ldap"),
        )],
    );
    assert!(manager.authenticate(&routed).await.is_err());
}

#[tokio::test]
async fn test_surrogate_login_denied_without_permission() {
    let mut props = properties();
    props
        .surrogate
        .simple
        .insert("casuser".to_string(), vec!["banderson".to_string()]);
    let manager = PolicyBasedAuthenticationManager::from_properties(&props, services(vec![]).await).unwrap();

    let allowed = AuthenticationTransaction::new(
        None,
        vec![Credential::username_password("banderson+casuser", "Mellon")],
    )
    .with_surrogate_separator("+");
    let authentication = manager.authenticate(&allowed).await.unwrap();
    assert_eq!(authentication.principal().id(), "banderson");
    assert_eq!(
        authentication.attribute(cas_core::SURROGATE_PRINCIPAL_ATTRIBUTE),
        Some("casuser")
    );

    let denied = AuthenticationTransaction::new(
        None,
        vec![Credential::username_password("banderson+jsmith", "secret")],
    )
    .with_surrogate_separator("+");
    assert!(matches!(
        manager.authenticate(&denied).await,
        Err(Error::SurrogateDenied { .. })
    ));
}

#[tokio::test]
async fn test_throttle_in_front_of_manager() {
    let mut props = properties();
    props.throttle.kind = ThrottleKind::IpAddress;
    props.throttle.failure.threshold = 1;
    props.throttle.failure.range_seconds = 60;
    let throttle = throttle_from_properties(&props.throttle, None).unwrap().unwrap();
    let manager = PolicyBasedAuthenticationManager::from_properties(&props, services(vec![]).await).unwrap();

    let attempt = LoginAttempt::new("192.168.1.10", "casuser");
    let tx = AuthenticationTransaction::new(None, vec![Credential::username_password("casuser", "wrong")]);

    throttle.pre_handle(&attempt).await.unwrap();
    let outcome = manager.authenticate(&tx).await;
    throttle.post_handle(&attempt, outcome.is_ok()).await;

    assert!(matches!(
        throttle.pre_handle(&attempt).await,
        Err(Error::Throttled { .. })
    ));
}
