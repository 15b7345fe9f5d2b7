//! Audit trail of authentication events, also the data source of the
//! audit-log throttle

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditActionContext {
    pub principal: String,
    pub resource: String,
    pub action: String,
    pub application_code: String,
    pub when: DateTime<Utc>,
    pub client_ip: String,
    pub server_ip: String,
}

impl AuditActionContext {
    pub fn new(
        principal: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        application_code: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            resource: resource.into(),
            action: action.into(),
            application_code: application_code.into(),
            when: Utc::now(),
            client_ip: String::new(),
            server_ip: String::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.when = when;
        self
    }

    #[must_use]
    pub fn with_client_info(mut self, client_ip: impl Into<String>, server_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self.server_ip = server_ip.into();
        self
    }
}

#[async_trait]
pub trait AuditTrailManager: Send + Sync {
    async fn record(&self, context: AuditActionContext);

    /// Records at or after `since`, oldest first
    async fn get_audit_records_since(&self, since: DateTime<Utc>) -> Vec<AuditActionContext>;

    async fn remove_all(&self);

    /// Drop records older than `max_age`, returning how many were removed
    async fn clean(&self, max_age: Duration) -> usize;
}

/// Audit records kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryAuditTrailManager {
    records: RwLock<Vec<AuditActionContext>>,
}

impl InMemoryAuditTrailManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub(crate) fn clean_at(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| record.when >= cutoff);
        before - records.len()
    }
}

#[async_trait]
impl AuditTrailManager for InMemoryAuditTrailManager {
    async fn record(&self, context: AuditActionContext) {
        info!(
            principal = %context.principal,
            action = %context.action,
            resource = %context.resource,
            client_ip = %context.client_ip,
            "audit"
        );
        let mut records = self.records.write();
        let position = records.partition_point(|r| r.when <= context.when);
        records.insert(position, context);
    }

    async fn get_audit_records_since(&self, since: DateTime<Utc>) -> Vec<AuditActionContext> {
        self.records
            .read()
            .iter()
            .filter(|record| record.when >= since)
            .cloned()
            .collect()
    }

    async fn remove_all(&self) {
        self.records.write().clear();
    }

    async fn clean(&self, max_age: Duration) -> usize {
        let removed = self.clean_at(max_age, Utc::now());
        debug!(removed, "cleaned audit trail");
        removed
    }
}
