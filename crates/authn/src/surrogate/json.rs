use super::{SimpleSurrogateAuthenticationService, SurrogateAuthenticationService};
use async_trait::async_trait;
use cas_core::{Error, Principal, Result, Service};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Account lists read from a JSON object of principal to account array
#[derive(Debug, Clone)]
pub struct JsonSurrogateAuthenticationService {
    path: PathBuf,
    inner: SimpleSurrogateAuthenticationService,
}

impl JsonSurrogateAuthenticationService {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read surrogate accounts", e))?;
        let eligible: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| {
                Error::configuration(format!(
                    "invalid surrogate accounts in {}: {e}",
                    path.display()
                ))
            })?;
        info!(path = %path.display(), principals = eligible.len(), "loaded surrogate accounts");
        Ok(Self {
            path: path.to_path_buf(),
            inner: SimpleSurrogateAuthenticationService::new(eligible),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SurrogateAuthenticationService for JsonSurrogateAuthenticationService {
    async fn can_impersonate(
        &self,
        surrogate: &str,
        principal: &Principal,
        _service: Option<&Service>,
    ) -> Result<bool> {
        Ok(self.inner.allows(surrogate, principal.id()))
    }

    async fn eligible_accounts(&self, principal: &str) -> Result<Vec<String>> {
        Ok(self.inner.accounts(principal).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_accounts_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surrogates.json");
        std::fs::write(&path, r#"{"casuser": ["jsmith", "banderson"]}"#).unwrap();

        let svc = JsonSurrogateAuthenticationService::load(&path).unwrap();
        assert_eq!(svc.path(), path.as_path());
        assert!(svc
            .can_impersonate("jsmith", &Principal::new("casuser"), None)
            .await
            .unwrap());
        assert_eq!(svc.eligible_accounts("casuser").await.unwrap().len(), 2);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            JsonSurrogateAuthenticationService::load(dir.path().join("missing.json")),
            Err(Error::FileSystem { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            JsonSurrogateAuthenticationService::load(&path),
            Err(Error::Configuration { .. })
        ));
    }
}
