use super::{SurrogateAuthenticationService, WILDCARD_ACCOUNT};
use async_trait::async_trait;
use cas_core::{Principal, Result, Service};
use std::collections::BTreeMap;

/// Account lists held in memory, keyed by principal id
#[derive(Debug, Clone, Default)]
pub struct SimpleSurrogateAuthenticationService {
    eligible: BTreeMap<String, Vec<String>>,
}

impl SimpleSurrogateAuthenticationService {
    pub fn new(eligible: BTreeMap<String, Vec<String>>) -> Self {
        Self { eligible }
    }

    pub(crate) fn accounts(&self, principal: &str) -> &[String] {
        self.eligible.get(principal).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn allows(&self, surrogate: &str, principal: &str) -> bool {
        if surrogate == principal {
            return true;
        }
        self.accounts(principal)
            .iter()
            .any(|account| account == WILDCARD_ACCOUNT || account == surrogate)
    }
}

#[async_trait]
impl SurrogateAuthenticationService for SimpleSurrogateAuthenticationService {
    async fn can_impersonate(
        &self,
        surrogate: &str,
        principal: &Principal,
        _service: Option<&Service>,
    ) -> Result<bool> {
        Ok(self.allows(surrogate, principal.id()))
    }

    async fn eligible_accounts(&self, principal: &str) -> Result<Vec<String>> {
        Ok(self.accounts(principal).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SimpleSurrogateAuthenticationService {
        SimpleSurrogateAuthenticationService::new(BTreeMap::from([
            ("casuser".to_string(), vec!["banderson".to_string()]),
            ("admin".to_string(), vec![WILDCARD_ACCOUNT.to_string()]),
        ]))
    }

    #[tokio::test]
    async fn test_listed_account_can_be_impersonated() {
        let svc = service();
        assert!(svc
            .can_impersonate("banderson", &Principal::new("casuser"), None)
            .await
            .unwrap());
        assert!(!svc
            .can_impersonate("someone", &Principal::new("casuser"), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_wildcard_and_self() {
        let svc = service();
        assert!(svc
            .can_impersonate("anyone", &Principal::new("admin"), None)
            .await
            .unwrap());
        assert!(svc
            .can_impersonate("nobody", &Principal::new("nobody"), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_eligible_accounts() {
        let svc = service();
        assert_eq!(
            svc.eligible_accounts("casuser").await.unwrap(),
            vec!["banderson".to_string()]
        );
        assert!(svc.eligible_accounts("unknown").await.unwrap().is_empty());
    }
}
