//! Login throttling.
//!
//! The allowed failure rate is `threshold / range_seconds` failures per
//! second. A submission is throttled when the rate implied by the time since
//! the previous failure for the same key is above it.

mod audit_log;
mod memory;

pub use audit_log::AuditLogThrottledSubmissionHandler;
pub use memory::{InMemoryThrottledSubmissionHandler, ThrottleKey};

use crate::audit::AuditTrailManager;
use async_trait::async_trait;
use cas_config::{ThrottleKind, ThrottleProperties};
use cas_core::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Who is trying to log in, and from where
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoginAttempt {
    pub client_ip: String,
    pub username: String,
}

impl LoginAttempt {
    pub fn new(client_ip: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            username: username.into(),
        }
    }
}

#[async_trait]
pub trait ThrottledSubmissionHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`Error::Throttled`] when the attempt must be refused
    async fn pre_handle(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Record the outcome of an attempt that went through
    async fn post_handle(&self, attempt: &LoginAttempt, success: bool);

    /// Forget keys whose failure rate dropped below the threshold
    async fn release(&self) -> usize;
}

/// Failure threshold expressed as a rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleThreshold {
    pub threshold: u32,
    pub range_seconds: u64,
}

impl ThrottleThreshold {
    pub fn new(threshold: u32, range_seconds: u64) -> Self {
        Self {
            threshold,
            range_seconds,
        }
    }

    /// Allowed failures per second; unbounded when the range is zero
    pub fn rate(&self) -> f64 {
        if self.range_seconds == 0 {
            return f64::INFINITY;
        }
        f64::from(self.threshold) / self.range_seconds as f64
    }

    /// Submissions per second implied by two events; simultaneous events
    /// have an unbounded rate
    pub fn submission_rate(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
        let elapsed_ms = (later - earlier).num_milliseconds();
        if elapsed_ms <= 0 {
            return f64::INFINITY;
        }
        1000.0 / elapsed_ms as f64
    }

    pub fn is_exceeded_by(&self, later: DateTime<Utc>, earlier: DateTime<Utc>) -> bool {
        Self::submission_rate(later, earlier) > self.rate()
    }
}

impl From<&ThrottleProperties> for ThrottleThreshold {
    fn from(properties: &ThrottleProperties) -> Self {
        Self::new(properties.failure.threshold, properties.failure.range_seconds)
    }
}

/// Throttle described by the properties, `None` when throttling is off
pub fn throttle_from_properties(
    properties: &ThrottleProperties,
    audit: Option<Arc<dyn AuditTrailManager>>,
) -> Result<Option<Arc<dyn ThrottledSubmissionHandler>>> {
    let threshold = ThrottleThreshold::from(properties);
    let handler: Arc<dyn ThrottledSubmissionHandler> = match properties.kind {
        ThrottleKind::None => return Ok(None),
        ThrottleKind::IpAddress => Arc::new(InMemoryThrottledSubmissionHandler::new(
            ThrottleKey::IpAddress,
            threshold,
        )),
        ThrottleKind::IpAddressAndUsername => Arc::new(InMemoryThrottledSubmissionHandler::new(
            ThrottleKey::IpAddressAndUsername,
            threshold,
        )),
        ThrottleKind::AuditLog => {
            let audit = audit.ok_or_else(|| {
                Error::configuration("audit log throttling needs an audit trail manager")
            })?;
            Arc::new(
                AuditLogThrottledSubmissionHandler::new(audit, threshold)
                    .with_codes(&properties.failure.code, &properties.app_code),
            )
        }
    };
    Ok(Some(handler))
}

/// Periodically release stale throttle entries
pub fn spawn_release_task(
    handler: Arc<dyn ThrottledSubmissionHandler>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let released = handler.release().await;
            if released > 0 {
                debug!(handler = handler.name(), released, "released throttled keys");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditTrailManager;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_threshold_rate() {
        let threshold = ThrottleThreshold::new(100, 60);
        let now = Utc::now();
        // 100 per minute is one failure every 600ms
        assert!(threshold.is_exceeded_by(now, now - ChronoDuration::milliseconds(500)));
        assert!(!threshold.is_exceeded_by(now, now - ChronoDuration::milliseconds(700)));
        assert!(threshold.is_exceeded_by(now, now));
    }

    #[test]
    fn test_zero_range_never_throttles() {
        let threshold = ThrottleThreshold::new(1, 0);
        let now = Utc::now();
        assert!(!threshold.is_exceeded_by(now, now - ChronoDuration::milliseconds(1)));
    }

    #[test]
    fn test_from_properties() {
        let mut properties = ThrottleProperties::default();
        assert!(throttle_from_properties(&properties, None).unwrap().is_none());

        properties.kind = ThrottleKind::IpAddressAndUsername;
        let handler = throttle_from_properties(&properties, None).unwrap().unwrap();
        assert_eq!(handler.name(), "InMemoryIpAddressUsernameThrottle");

        properties.kind = ThrottleKind::AuditLog;
        assert!(throttle_from_properties(&properties, None).is_err());
        let audit: Arc<dyn AuditTrailManager> = Arc::new(InMemoryAuditTrailManager::new());
        let handler = throttle_from_properties(&properties, Some(audit)).unwrap().unwrap();
        assert_eq!(handler.name(), "AuditLogThrottle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_task_runs_on_interval() {
        let handler: Arc<dyn ThrottledSubmissionHandler> = Arc::new(
            InMemoryThrottledSubmissionHandler::new(ThrottleKey::IpAddress, ThrottleThreshold::new(100, 60)),
        );
        assert!(spawn_release_task(handler.clone(), Duration::ZERO).is_none());
        let task = spawn_release_task(handler, Duration::from_secs(5)).unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!task.is_finished());
        task.abort();
    }
}
