use super::{assign_id, sort_services, ServiceRegistry};
use crate::registered_service::RegisteredService;
use async_trait::async_trait;
use cas_core::{Error, Result};
use cas_utils::{remove_if_exists, write_atomic_string};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const EXTENSION: &str = "json";

/// Directory of JSON service definitions, one service per file.
///
/// Definitions are read on [`ServiceRegistry::load`]; hidden files, empty
/// files and files with another extension are ignored.
#[derive(Debug)]
pub struct JsonServiceRegistry {
    directory: PathBuf,
    services: RwLock<BTreeMap<i64, (RegisteredService, PathBuf)>>,
}

impl JsonServiceRegistry {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            services: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn definition_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.directory.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::file_system(&dir, "list service definitions", e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::file_system(&dir, "list service definitions", e))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn load_file(path: &Path) -> Option<RegisteredService> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            debug!(file = %file_name, "ignoring hidden service definition");
            return None;
        }
        if !path.extension().is_some_and(|ext| ext == EXTENSION) {
            debug!(file = %file_name, "ignoring file without a .json extension");
            return None;
        }
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %file_name, error = %e, "service definition is not readable");
                return None;
            }
        };
        if content.trim().is_empty() {
            debug!(file = %file_name, "service definition is empty");
            return None;
        }
        match serde_json::from_str::<RegisteredService>(&content) {
            Ok(service) if service.is_complete() => Some(service),
            Ok(_) => {
                warn!(file = %file_name, "service definition lacks a name or serviceId");
                None
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "error reading service definition");
                None
            }
        }
    }
}

#[async_trait]
impl ServiceRegistry for JsonServiceRegistry {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn save(&self, mut service: RegisteredService) -> Result<RegisteredService> {
        let previous_path = {
            let services = self.services.read();
            assign_id(&mut service, services.keys());
            services.get(&service.id).map(|(_, path)| path.clone())
        };
        let path = self.directory.join(service.file_name(EXTENSION));
        let content = serde_json::to_string_pretty(&service)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic_string(&target, &content))
            .await
            .map_err(|e| Error::storage("json service registry", format!("write task failed: {e}")))??;

        // A renamed service leaves its old file behind
        if let Some(previous) = previous_path.filter(|previous| *previous != path) {
            remove_if_exists(&previous)?;
        }
        debug!(id = service.id, file = %path.display(), "saved service definition");
        self.services
            .write()
            .insert(service.id, (service.clone(), path));
        Ok(service)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.services.write().remove(&id);
        match removed {
            Some((_, path)) => {
                remove_if_exists(&path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load(&self) -> Result<Vec<RegisteredService>> {
        let mut loaded = BTreeMap::new();
        for path in self.definition_files().await? {
            let Some(service) = Self::load_file(&path).await else {
                continue;
            };
            if loaded.contains_key(&service.id) {
                warn!(id = service.id, file = %path.display(), "duplicate service id; keeping the first definition");
                continue;
            }
            loaded.insert(service.id, (service, path));
        }

        let mut services: Vec<RegisteredService> =
            loaded.values().map(|(service, _)| service.clone()).collect();
        sort_services(&mut services);
        info!(
            count = services.len(),
            directory = %self.directory.display(),
            "loaded service definitions"
        );
        *self.services.write() = loaded;
        Ok(services)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RegisteredService>> {
        Ok(self
            .services
            .read()
            .get(&id)
            .map(|(service, _)| service.clone()))
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.services.read().len())
    }
}
