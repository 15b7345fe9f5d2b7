use cas_core::{Authentication, Principal, Service};
use cas_services::{
    ensure_principal_access_allowed, AttributeReleasePolicy, JsonServiceRegistry, ProxyPolicy,
    RegisteredService, ServicesManager,
};
use cas_tickets::{LogoutType, LogoutTypeResolver, TicketTranscoder};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

fn full_service() -> RegisteredService {
    let mut service = RegisteredService::new("Portal", r"https://portal\.example\.org/.*")
        .with_evaluation_order(3);
    service.description = Some("Staff portal".into());
    service.logout_type = LogoutType::FrontChannel;
    service.proxy_policy = ProxyPolicy::Regex {
        pattern: r"https://portal\.example\.org/pgt".into(),
    };
    service.attribute_release_policy = AttributeReleasePolicy::ReturnAllowed {
        allowed_attributes: vec!["memberOf".into()],
    };
    service
        .access_strategy
        .required_attributes
        .insert("memberOf".into(), BTreeSet::from(["staff".to_string()]));
    service
        .authentication_policy
        .required_authentication_handlers
        .insert("AcceptUsersAuthenticationHandler".into());
    service.surrogate_enabled = false;
    service
}

#[tokio::test]
async fn test_manager_over_json_directory() {
    let dir = TempDir::new().unwrap();
    let writer = ServicesManager::new(Arc::new(JsonServiceRegistry::new(dir.path())));
    let saved = writer.save(full_service()).await.unwrap();

    let reader = ServicesManager::new(Arc::new(JsonServiceRegistry::new(dir.path())));
    assert_eq!(reader.load().await.unwrap(), 1);

    let found = reader
        .find_service_by(&Service::new("https://portal.example.org/home"))
        .unwrap();
    assert_eq!(found, saved);
    assert!(!reader.matches_existing_service(&Service::new("https://elsewhere.example.org/")));
    assert!(found.is_allowed_to_proxy());
    assert!(!found.surrogate_enabled);
    assert_eq!(
        reader.logout_type(&Service::new("https://portal.example.org/home")),
        LogoutType::FrontChannel
    );
}

#[tokio::test]
async fn test_principal_access_through_registered_policy() {
    let dir = TempDir::new().unwrap();
    let manager = ServicesManager::new(Arc::new(JsonServiceRegistry::new(dir.path())));
    manager.save(full_service()).await.unwrap();

    let service = Service::new("https://portal.example.org/");
    let registered = manager.find_service_by(&service);

    let mut staff = Principal::new("casuser");
    staff.insert_attribute("memberOf", vec!["staff".into()]);
    let allowed = Authentication::builder(staff).build();
    assert!(ensure_principal_access_allowed(&service, registered.as_ref(), &allowed).is_ok());

    let mut student = Principal::new("student");
    student.insert_attribute("memberOf", vec!["students".into()]);
    let denied = Authentication::builder(student).build();
    assert!(ensure_principal_access_allowed(&service, registered.as_ref(), &denied).is_err());
}

#[test]
fn test_registered_service_survives_transcoding() {
    let transcoder = TicketTranscoder::default();
    let service = full_service().with_id(9);
    let bytes = transcoder.encode("service-9", &service).unwrap();
    let decoded: RegisteredService = transcoder.decode("service-9", &bytes).unwrap();
    assert_eq!(decoded, service);
    assert!(decoded.matches(&Service::new("https://portal.example.org/x")));
}
