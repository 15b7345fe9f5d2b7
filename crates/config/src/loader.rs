//! Configuration loading with precedence: defaults < JSON file < environment

use crate::properties::{CasProperties, ThrottleKind, TicketStoreType};
use crate::validation;
use cas_core::{Error, Result, ResultExt};
use cas_utils::xdg::XdgPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "CAS_CONFIG_FILE";

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// JSON configuration file
    ConfigFile(PathBuf),
    /// One or more `CAS_*` environment variables
    EnvironmentVariable(String),
}

/// Validated configuration together with the layer it was last touched by
#[derive(Debug, Clone)]
pub struct CasConfiguration {
    pub properties: CasProperties,
    pub source: ConfigSource,
}

impl Default for CasConfiguration {
    fn default() -> Self {
        Self {
            properties: CasProperties::default(),
            source: ConfigSource::Default,
        }
    }
}

/// Configuration loader that handles precedence
#[derive(Debug, Clone, Default)]
pub struct CasConfigurationLoader {
    config_file: Option<PathBuf>,
    skip_environment: bool,
}

impl CasConfigurationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of `$CAS_CONFIG_FILE` or the XDG default
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Ignore `CAS_*` environment overrides
    pub fn without_environment(mut self) -> Self {
        self.skip_environment = true;
        self
    }

    /// Load configuration with full precedence handling
    pub fn load(&self) -> Result<CasConfiguration> {
        let mut config = CasConfiguration::default();

        let path = self.config_file_path();
        if let Some(properties) = Self::load_from_config_file(&path, self.config_file.is_some())? {
            info!(path = %path.display(), "loaded configuration file");
            config = CasConfiguration {
                properties,
                source: ConfigSource::ConfigFile(path),
            };
        }

        if !self.skip_environment {
            let applied = apply_environment(&mut config.properties, |name| std::env::var(name).ok())?;
            if !applied.is_empty() {
                debug!(variables = ?applied, "applied environment overrides");
                config.source = ConfigSource::EnvironmentVariable(applied.join(","));
            }
        }

        validation::validate(&config.properties)?;
        Ok(config)
    }

    fn config_file_path(&self) -> PathBuf {
        if let Some(path) = &self.config_file {
            return path.clone();
        }
        if !self.skip_environment {
            if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }
        XdgPaths::config_file()
    }

    /// A missing file is only an error when it was named explicitly
    fn load_from_config_file(path: &Path, required: bool) -> Result<Option<CasProperties>> {
        if !path.exists() {
            if required {
                return Err(Error::configuration(format!(
                    "configuration file '{}' does not exist",
                    path.display()
                )));
            }
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;
        let properties = serde_json::from_str(&content)
            .with_context(|| format!("invalid configuration file '{}'", path.display()))?;
        Ok(Some(properties))
    }
}

/// Apply `CAS_*` overrides through `lookup`, returning the names that were set
pub(crate) fn apply_environment<F>(properties: &mut CasProperties, lookup: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let mut read = |name: &str| -> Option<String> {
        let value = lookup(name)?;
        applied.push(name.to_string());
        Some(value)
    };

    if let Some(value) = read("CAS_HOST_NAME") {
        properties.host.name = Some(value);
    }

    let tgt = &mut properties.ticket.tgt;
    if let Some(value) = read("CAS_TGT_MAX_TIME_TO_LIVE") {
        tgt.max_time_to_live_in_seconds = parse("CAS_TGT_MAX_TIME_TO_LIVE", &value)?;
    }
    if let Some(value) = read("CAS_TGT_TIME_TO_KILL") {
        tgt.time_to_kill_in_seconds = parse("CAS_TGT_TIME_TO_KILL", &value)?;
    }
    if let Some(value) = read("CAS_TGT_ONLY_TRACK_MOST_RECENT_SESSION") {
        tgt.only_track_most_recent_session =
            parse_bool("CAS_TGT_ONLY_TRACK_MOST_RECENT_SESSION", &value)?;
    }
    if let Some(value) = read("CAS_TGT_REMEMBER_ME_ENABLED") {
        tgt.remember_me.enabled = parse_bool("CAS_TGT_REMEMBER_ME_ENABLED", &value)?;
    }

    let st = &mut properties.ticket.st;
    if let Some(value) = read("CAS_ST_NUMBER_OF_USES") {
        st.number_of_uses = parse("CAS_ST_NUMBER_OF_USES", &value)?;
    }
    if let Some(value) = read("CAS_ST_TIME_TO_KILL") {
        st.time_to_kill_in_seconds = parse("CAS_ST_TIME_TO_KILL", &value)?;
    }

    let pt = &mut properties.ticket.pt;
    if let Some(value) = read("CAS_PT_NUMBER_OF_USES") {
        pt.number_of_uses = parse("CAS_PT_NUMBER_OF_USES", &value)?;
    }
    if let Some(value) = read("CAS_PT_TIME_TO_KILL") {
        pt.time_to_kill_in_seconds = parse("CAS_PT_TIME_TO_KILL", &value)?;
    }

    let registry = &mut properties.ticket.registry;
    if let Some(value) = read("CAS_TICKET_REGISTRY_STORE") {
        registry.store = TicketStoreType::from_str(&value).map_err(Error::configuration)?;
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_FILE_DIRECTORY") {
        registry.file.directory = Some(PathBuf::from(value));
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_CACHE_CAPACITY") {
        registry.cache.capacity = parse("CAS_TICKET_REGISTRY_CACHE_CAPACITY", &value)?;
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_CLEANER_ENABLED") {
        registry.cleaner.enabled = parse_bool("CAS_TICKET_REGISTRY_CLEANER_ENABLED", &value)?;
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_CRYPTO_ENABLED") {
        registry.crypto.enabled = parse_bool("CAS_TICKET_REGISTRY_CRYPTO_ENABLED", &value)?;
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_CRYPTO_ENCRYPTION_KEY") {
        registry.crypto.encryption_key = Some(value);
    }
    if let Some(value) = read("CAS_TICKET_REGISTRY_CRYPTO_SIGNING_KEY") {
        registry.crypto.signing_key = Some(value);
    }

    let authn = &mut properties.authn;
    if let Some(value) = read("CAS_AUTHN_ACCEPT_USERS") {
        authn.accept.users = value;
    }
    if let Some(value) = read("CAS_AUTHN_THROTTLE_KIND") {
        authn.throttle.kind = ThrottleKind::from_str(&value).map_err(Error::configuration)?;
    }
    if let Some(value) = read("CAS_AUTHN_THROTTLE_FAILURE_THRESHOLD") {
        authn.throttle.failure.threshold = parse("CAS_AUTHN_THROTTLE_FAILURE_THRESHOLD", &value)?;
    }
    if let Some(value) = read("CAS_AUTHN_THROTTLE_FAILURE_RANGE_SECONDS") {
        authn.throttle.failure.range_seconds =
            parse("CAS_AUTHN_THROTTLE_FAILURE_RANGE_SECONDS", &value)?;
    }

    if let Some(value) = read("CAS_SERVICE_REGISTRY_JSON_LOCATION") {
        properties.service_registry.json.location = Some(PathBuf::from(value));
    }

    Ok(applied)
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::configuration(format!("{name} has an invalid value '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}
