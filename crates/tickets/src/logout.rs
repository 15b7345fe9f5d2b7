//! Single logout request creation

use crate::ticket::{TicketGrantingTicket, TicketIdGenerator, UniqueTicketIdGenerator};
use cas_core::Service;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const LOGOUT_REQUEST_PREFIX: &str = "LR";

/// How a relying party is told that the SSO session ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogoutType {
    /// Server-to-server POST of the logout message
    #[default]
    BackChannel,
    /// Delivered through the user's browser
    FrontChannel,
    /// Service does not take part in single logout
    None,
}

/// Decides the logout type of a service, typically from the service registry
pub trait LogoutTypeResolver: Send + Sync {
    fn logout_type(&self, service: &Service) -> LogoutType;
}

/// Every service takes part in back-channel logout
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLogoutTypeResolver;

impl LogoutTypeResolver for DefaultLogoutTypeResolver {
    fn logout_type(&self, _service: &Service) -> LogoutType {
        LogoutType::BackChannel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutRequestStatus {
    NotAttempted,
    Success,
    Failure,
}

/// Logout notification for one service session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutRequest {
    pub ticket_id: String,
    pub service: Service,
    pub logout_type: LogoutType,
    pub message: String,
    pub status: LogoutRequestStatus,
}

/// Builds the logout requests for a ticket-granting ticket being destroyed.
///
/// Delivery is left to the caller.
pub struct LogoutManager {
    resolver: Arc<dyn LogoutTypeResolver>,
    id_generator: Arc<dyn TicketIdGenerator>,
}

impl fmt::Debug for LogoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogoutManager").finish_non_exhaustive()
    }
}

impl Default for LogoutManager {
    fn default() -> Self {
        Self::new(Arc::new(DefaultLogoutTypeResolver))
    }
}

impl LogoutManager {
    pub fn new(resolver: Arc<dyn LogoutTypeResolver>) -> Self {
        Self {
            resolver,
            id_generator: Arc::new(UniqueTicketIdGenerator::new(20, None)),
        }
    }

    /// One request per tracked service session, skipping opted-out services
    pub fn perform_logout(&self, ticket: &TicketGrantingTicket) -> Vec<LogoutRequest> {
        let principal = ticket.authentication().principal().id();
        let requests: Vec<LogoutRequest> = ticket
            .services()
            .iter()
            .filter_map(|(ticket_id, service)| {
                let logout_type = self.resolver.logout_type(service);
                if logout_type == LogoutType::None {
                    debug!(service = %service, "service does not take part in single logout");
                    return None;
                }
                Some(LogoutRequest {
                    ticket_id: ticket_id.clone(),
                    service: service.clone(),
                    logout_type,
                    message: self.create_message(principal, ticket_id),
                    status: LogoutRequestStatus::NotAttempted,
                })
            })
            .collect();
        debug!(
            ticket_id = %ticket.id(),
            requests = requests.len(),
            "prepared single logout requests"
        );
        requests
    }

    /// SAML 2 `LogoutRequest` naming the principal, with the service ticket
    /// as session index
    pub fn create_message(&self, principal: &str, session_index: &str) -> String {
        let id = self.id_generator.new_ticket_id(LOGOUT_REQUEST_PREFIX);
        let issue_instant = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        format!(
            "<samlp:LogoutRequest xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" \
             ID=\"{id}\" Version=\"2.0\" IssueInstant=\"{issue_instant}\">\
             <saml:NameID xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\">{}</saml:NameID>\
             <samlp:SessionIndex>{}</samlp:SessionIndex></samlp:LogoutRequest>",
            escape_xml(principal),
            escape_xml(session_index),
        )
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationPolicy;
    use cas_core::{Authentication, Principal};

    struct OptOut(&'static str);

    impl LogoutTypeResolver for OptOut {
        fn logout_type(&self, service: &Service) -> LogoutType {
            if service.id().starts_with(self.0) {
                LogoutType::None
            } else {
                LogoutType::BackChannel
            }
        }
    }

    fn session_with_services() -> TicketGrantingTicket {
        let mut tgt = TicketGrantingTicket::new(
            "TGT-1",
            Authentication::builder(Principal::new("casuser")).build(),
            ExpirationPolicy::NeverExpires,
        );
        for (id, url) in [("ST-1", "https://a.example.org/"), ("ST-2", "https://b.example.org/")] {
            tgt.grant_service_ticket(
                id,
                Service::new(url),
                ExpirationPolicy::NeverExpires,
                false,
                true,
            );
        }
        tgt
    }

    #[test]
    fn test_one_request_per_service_session() {
        let requests = LogoutManager::default().perform_logout(&session_with_services());
        assert_eq!(requests.len(), 2);
        assert!(requests[0]
            .message
            .contains("<samlp:SessionIndex>ST-1</samlp:SessionIndex>"));
        assert!(requests[0].message.contains(">casuser</saml:NameID>"));
        assert!(requests
            .iter()
            .all(|r| r.status == LogoutRequestStatus::NotAttempted));
    }

    #[test]
    fn test_opted_out_services_are_skipped() {
        let manager = LogoutManager::new(Arc::new(OptOut("https://b.")));
        let requests = manager.perform_logout(&session_with_services());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].ticket_id, "ST-1");
    }

    #[test]
    fn test_message_escapes_principal() {
        let message = LogoutManager::default().create_message("a<b>&c", "ST-1");
        assert!(message.contains("a&lt;b&gt;&amp;c"));
        assert!(message.contains("ID=\"LR-"));
    }
}
