use super::{LoginAttempt, ThrottleThreshold, ThrottledSubmissionHandler};
use crate::audit::{AuditActionContext, AuditTrailManager};
use async_trait::async_trait;
use cas_core::{
    Error, Result, AUTHENTICATION_FAILED_ACTION, AUTHENTICATION_THROTTLED_ACTION,
    DEFAULT_AUDIT_APPLICATION_CODE,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;

/// Throttle backed by failure records in the audit trail; needs no state of
/// its own, so every node sharing the trail agrees.
///
/// Failures are expected to be recorded by whoever audits authentication
/// outcomes; this handler only reads them and records throttled attempts.
pub struct AuditLogThrottledSubmissionHandler {
    audit: Arc<dyn AuditTrailManager>,
    threshold: ThrottleThreshold,
    failure_code: String,
    application_code: String,
}

impl AuditLogThrottledSubmissionHandler {
    pub fn new(audit: Arc<dyn AuditTrailManager>, threshold: ThrottleThreshold) -> Self {
        Self {
            audit,
            threshold,
            failure_code: AUTHENTICATION_FAILED_ACTION.to_string(),
            application_code: DEFAULT_AUDIT_APPLICATION_CODE.to_string(),
        }
    }

    #[must_use]
    pub fn with_codes(mut self, failure_code: &str, application_code: &str) -> Self {
        self.failure_code = failure_code.to_string();
        self.application_code = application_code.to_string();
        self
    }

    fn context(&self, attempt: &LoginAttempt, action: &str, when: DateTime<Utc>) -> AuditActionContext {
        AuditActionContext::new(
            &attempt.username,
            &attempt.username,
            action,
            &self.application_code,
        )
        .with_client_info(&attempt.client_ip, "")
        .at(when)
    }

    async fn exceeds_threshold(&self, attempt: &LoginAttempt, now: DateTime<Utc>) -> bool {
        let seconds = i64::try_from(self.threshold.range_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::from(u32::MAX));
        let range = Duration::seconds(seconds);
        let mut failures: Vec<DateTime<Utc>> = self
            .audit
            .get_audit_records_since(now - range)
            .await
            .into_iter()
            .filter(|record| {
                record.action == self.failure_code
                    && record.application_code == self.application_code
                    && record.client_ip == attempt.client_ip
                    && record.principal == attempt.username
            })
            .map(|record| record.when)
            .collect();
        if failures.len() < 2 {
            return false;
        }
        failures.sort_unstable_by(|a, b| b.cmp(a));
        self.threshold.is_exceeded_by(failures[0], failures[1])
    }

    pub async fn pre_handle_at(&self, attempt: &LoginAttempt, now: DateTime<Utc>) -> Result<()> {
        if !self.exceeds_threshold(attempt, now).await {
            return Ok(());
        }
        warn!(
            username = %attempt.username,
            client_ip = %attempt.client_ip,
            "login attempt throttled by audit log"
        );
        self.audit
            .record(self.context(attempt, AUTHENTICATION_THROTTLED_ACTION, now))
            .await;
        Err(Error::throttled(
            format!("{};{}", attempt.client_ip, attempt.username),
            "too many failed login attempts, try again later",
        ))
    }
}

#[async_trait]
impl ThrottledSubmissionHandler for AuditLogThrottledSubmissionHandler {
    fn name(&self) -> &str {
        "AuditLogThrottle"
    }

    async fn pre_handle(&self, attempt: &LoginAttempt) -> Result<()> {
        self.pre_handle_at(attempt, Utc::now()).await
    }

    // Outcomes reach the trail through the authentication audit records.
    async fn post_handle(&self, _attempt: &LoginAttempt, _success: bool) {}

    // The audit trail ages out on its own schedule.
    async fn release(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditTrailManager;

    fn setup() -> (Arc<InMemoryAuditTrailManager>, AuditLogThrottledSubmissionHandler) {
        let audit = Arc::new(InMemoryAuditTrailManager::new());
        let handler = AuditLogThrottledSubmissionHandler::new(audit.clone(), ThrottleThreshold::new(60, 60));
        (audit, handler)
    }

    async fn fail(audit: &InMemoryAuditTrailManager, attempt: &LoginAttempt, when: DateTime<Utc>) {
        audit
            .record(
                AuditActionContext::new(
                    &attempt.username,
                    &attempt.username,
                    AUTHENTICATION_FAILED_ACTION,
                    DEFAULT_AUDIT_APPLICATION_CODE,
                )
                .with_client_info(&attempt.client_ip, "10.0.0.254")
                .at(when),
            )
            .await;
    }

    #[tokio::test]
    async fn test_single_failure_is_not_throttled() {
        let (audit, throttle) = setup();
        let attempt = LoginAttempt::new("10.0.0.1", "casuser");
        let now = Utc::now();
        fail(&audit, &attempt, now).await;
        assert!(throttle.pre_handle_at(&attempt, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_two_quick_failures_throttle_and_are_audited() {
        let (audit, throttle) = setup();
        let attempt = LoginAttempt::new("10.0.0.1", "casuser");
        let now = Utc::now();
        fail(&audit, &attempt, now - Duration::milliseconds(300)).await;
        fail(&audit, &attempt, now).await;

        let result = throttle.pre_handle_at(&attempt, now).await;
        assert!(matches!(result, Err(Error::Throttled { .. })));
        let records = audit
            .get_audit_records_since(now - Duration::seconds(1))
            .await;
        assert!(records
            .iter()
            .any(|r| r.action == AUTHENTICATION_THROTTLED_ACTION));

        let other = LoginAttempt::new("10.0.0.2", "casuser");
        assert!(throttle.pre_handle_at(&other, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_spaced_failures_are_allowed() {
        let (audit, throttle) = setup();
        let attempt = LoginAttempt::new("10.0.0.1", "casuser");
        let now = Utc::now();
        fail(&audit, &attempt, now - Duration::seconds(3)).await;
        fail(&audit, &attempt, now).await;
        assert!(throttle.pre_handle_at(&attempt, now).await.is_ok());

        throttle.post_handle(&attempt, false).await;
        assert_eq!(audit.len(), 2);
        assert_eq!(throttle.release().await, 0);
    }
}
