use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A relying-party service requesting tickets, identified by its URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    id: String,
    original_url: String,
}

impl Service {
    /// Build a service from the URL presented by the client.
    ///
    /// Servlet session identifiers (`;jsessionid=...`) are stripped from the id
    /// but kept in the original URL.
    pub fn new(url: impl Into<String>) -> Self {
        let original_url = url.into();
        Self {
            id: strip_session_id(&original_url),
            original_url,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Whether two service references name the same relying party
    pub fn matches(&self, other: &Service) -> bool {
        self.id == other.id
    }

    /// Service URL without query, path parameters or fragment.
    ///
    /// Two services with the same normalized path are the same SSO session
    /// from the ticket-granting ticket's point of view.
    pub fn normalized_path(&self) -> &str {
        let end = self
            .id
            .find(['?', ';', '#'])
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

fn strip_session_id(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    let Some(start) = lower.find(";jsessionid=") else {
        return url.to_string();
    };
    let rest = &url[start + 1..];
    let end = rest
        .find(['?', '#', ';'])
        .map(|offset| start + 1 + offset)
        .unwrap_or(url.len());
    format!("{}{}", &url[..start], &url[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_session_id_is_stripped_from_id() {
        let service = Service::new("https://app.example.org/login;jsessionid=ABC123?x=1");
        assert_eq!(service.id(), "https://app.example.org/login?x=1");
        assert_eq!(
            service.original_url(),
            "https://app.example.org/login;jsessionid=ABC123?x=1"
        );
    }

    #[test]
    fn test_normalized_path_drops_query_and_parameters() {
        assert_eq!(
            Service::new("http://host.com?test").normalized_path(),
            "http://host.com"
        );
        assert_eq!(
            Service::new("http://host.com;JSESSIONID=xxx").normalized_path(),
            "http://host.com"
        );
        assert_eq!(
            Service::new("http://host.com/webapp1?test=true").normalized_path(),
            "http://host.com/webapp1"
        );
    }

    #[test]
    fn test_matches_compares_ids() {
        let a = Service::new("https://app.example.org/");
        let b = Service::new("https://app.example.org/;jsessionid=1");
        assert!(a.matches(&b));
        assert!(!a.matches(&Service::new("https://other.example.org/")));
    }

    proptest! {
        #[test]
        fn prop_normalized_path_is_clean_prefix(url in "https://[a-z]{1,8}\\.org/[a-z;=?#&]{0,24}") {
            let service = Service::new(url);
            let path = service.normalized_path();
            prop_assert!(service.id().starts_with(path));
            prop_assert!(!path.contains(['?', ';', '#']));
        }
    }
}
