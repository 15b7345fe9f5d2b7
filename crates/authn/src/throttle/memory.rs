use super::{LoginAttempt, ThrottleThreshold, ThrottledSubmissionHandler};
use async_trait::async_trait;
use cas_core::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

/// What identifies a throttled client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleKey {
    IpAddress,
    IpAddressAndUsername,
}

impl ThrottleKey {
    fn key(self, attempt: &LoginAttempt) -> String {
        match self {
            ThrottleKey::IpAddress => attempt.client_ip.clone(),
            ThrottleKey::IpAddressAndUsername => {
                format!("{};{}", attempt.client_ip, attempt.username.to_lowercase())
            }
        }
    }
}

/// Last failure per key, held in memory
#[derive(Debug)]
pub struct InMemoryThrottledSubmissionHandler {
    key: ThrottleKey,
    threshold: ThrottleThreshold,
    failures: DashMap<String, DateTime<Utc>>,
}

impl InMemoryThrottledSubmissionHandler {
    pub fn new(key: ThrottleKey, threshold: ThrottleThreshold) -> Self {
        Self {
            key,
            threshold,
            failures: DashMap::new(),
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.failures.len()
    }

    pub fn pre_handle_at(&self, attempt: &LoginAttempt, now: DateTime<Utc>) -> Result<()> {
        let key = self.key.key(attempt);
        let Some(last_failure) = self.failures.get(&key).map(|entry| *entry) else {
            return Ok(());
        };
        if self.threshold.is_exceeded_by(now, last_failure) {
            warn!(key = %key, "login attempt throttled");
            return Err(Error::throttled(
                key,
                "too many failed login attempts, try again later",
            ));
        }
        Ok(())
    }

    pub fn post_handle_at(&self, attempt: &LoginAttempt, success: bool, now: DateTime<Utc>) {
        if success {
            return;
        }
        self.failures.insert(self.key.key(attempt), now);
    }

    pub fn release_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.failures.len();
        self.failures
            .retain(|_, last_failure| self.threshold.is_exceeded_by(now, *last_failure));
        let released = before.saturating_sub(self.failures.len());
        debug!(released, remaining = self.failures.len(), "released throttle entries");
        released
    }
}

#[async_trait]
impl ThrottledSubmissionHandler for InMemoryThrottledSubmissionHandler {
    fn name(&self) -> &str {
        match self.key {
            ThrottleKey::IpAddress => "InMemoryIpAddressThrottle",
            ThrottleKey::IpAddressAndUsername => "InMemoryIpAddressUsernameThrottle",
        }
    }

    async fn pre_handle(&self, attempt: &LoginAttempt) -> Result<()> {
        self.pre_handle_at(attempt, Utc::now())
    }

    async fn post_handle(&self, attempt: &LoginAttempt, success: bool) {
        self.post_handle_at(attempt, success, Utc::now());
    }

    async fn release(&self) -> usize {
        self.release_at(Utc::now())
    }
}
