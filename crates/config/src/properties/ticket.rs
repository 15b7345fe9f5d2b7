use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `cas.ticket.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketProperties {
    pub tgt: TicketGrantingTicketProperties,
    pub st: ServiceTicketProperties,
    pub pt: ProxyTicketProperties,
    pub pgt: ProxyGrantingTicketProperties,
    pub registry: TicketRegistryProperties,
}

/// Ticket-granting ticket expiration and session tracking.
///
/// Negative values on both `max_time_to_live_in_seconds` and
/// `time_to_kill_in_seconds` mean tickets never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketGrantingTicketProperties {
    pub max_time_to_live_in_seconds: i64,
    pub time_to_kill_in_seconds: i64,
    pub only_track_most_recent_session: bool,
    pub max_length: usize,
    pub remember_me: RememberMeProperties,
    pub timeout: TimeoutProperties,
    pub hard_timeout: HardTimeoutProperties,
    pub throttled_timeout: ThrottledTimeoutProperties,
}

impl Default for TicketGrantingTicketProperties {
    fn default() -> Self {
        Self {
            max_time_to_live_in_seconds: 28_800,
            time_to_kill_in_seconds: 7_200,
            only_track_most_recent_session: true,
            max_length: 50,
            remember_me: RememberMeProperties::default(),
            timeout: TimeoutProperties::default(),
            hard_timeout: HardTimeoutProperties::default(),
            throttled_timeout: ThrottledTimeoutProperties::default(),
        }
    }
}

/// Long-term sessions selected by the user at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RememberMeProperties {
    pub enabled: bool,
    pub time_to_kill_in_seconds: i64,
}

impl Default for RememberMeProperties {
    fn default() -> Self {
        Self {
            enabled: false,
            time_to_kill_in_seconds: 1_209_600,
        }
    }
}

/// Idle timeout policy; active when `max_time_to_live_in_seconds > 0`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutProperties {
    pub max_time_to_live_in_seconds: i64,
}

/// Hard timeout policy; active when `time_to_kill_in_seconds > 0`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardTimeoutProperties {
    pub time_to_kill_in_seconds: i64,
}

/// Throttled-use policy; active when both values are positive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThrottledTimeoutProperties {
    pub time_to_kill_in_seconds: i64,
    pub time_in_between_uses_in_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceTicketProperties {
    pub number_of_uses: u32,
    pub time_to_kill_in_seconds: i64,
    pub max_length: usize,
}

impl Default for ServiceTicketProperties {
    fn default() -> Self {
        Self {
            number_of_uses: 1,
            time_to_kill_in_seconds: 10,
            max_length: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyTicketProperties {
    pub number_of_uses: u32,
    pub time_to_kill_in_seconds: i64,
    pub max_length: usize,
}

impl Default for ProxyTicketProperties {
    fn default() -> Self {
        Self {
            number_of_uses: 1,
            time_to_kill_in_seconds: 10,
            max_length: 20,
        }
    }
}

/// Proxy-granting tickets share the ticket-granting ticket policy unless a
/// positive hard timeout is configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyGrantingTicketProperties {
    pub hard_timeout_in_seconds: i64,
    pub max_length: usize,
}

impl Default for ProxyGrantingTicketProperties {
    fn default() -> Self {
        Self {
            hard_timeout_in_seconds: 0,
            max_length: 50,
        }
    }
}

/// Backing store of the ticket registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStoreType {
    #[default]
    Memory,
    Cache,
    File,
}

impl std::str::FromStr for TicketStoreType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" | "default" => Ok(TicketStoreType::Memory),
            "cache" => Ok(TicketStoreType::Cache),
            "file" => Ok(TicketStoreType::File),
            other => Err(format!("unknown ticket store type '{other}'")),
        }
    }
}

/// `cas.ticket.registry.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketRegistryProperties {
    pub store: TicketStoreType,
    pub cache: CacheStoreProperties,
    pub file: FileStoreProperties,
    pub cleaner: CleanerProperties,
    pub crypto: CryptoProperties,
    /// Payloads larger than this many bytes are zstd-compressed
    pub compression_threshold: usize,
}

impl Default for TicketRegistryProperties {
    fn default() -> Self {
        Self {
            store: TicketStoreType::Memory,
            cache: CacheStoreProperties::default(),
            file: FileStoreProperties::default(),
            cleaner: CleanerProperties::default(),
            crypto: CryptoProperties::default(),
            compression_threshold: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheStoreProperties {
    pub capacity: usize,
}

impl Default for CacheStoreProperties {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileStoreProperties {
    /// Defaults to the XDG data directory when unset
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanerProperties {
    pub enabled: bool,
    pub start_delay_in_seconds: u64,
    pub repeat_interval_in_seconds: u64,
}

impl Default for CleanerProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_in_seconds: 20,
            repeat_interval_in_seconds: 120,
        }
    }
}

/// Ticket encryption and signing keys, hex encoded 32-byte values.
///
/// Keys are generated at startup when crypto is enabled and no key is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CryptoProperties {
    pub enabled: bool,
    pub encryption_key: Option<String>,
    pub signing_key: Option<String>,
}
