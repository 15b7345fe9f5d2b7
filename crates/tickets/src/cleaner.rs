//! Background removal of expired tickets

use crate::logout::{LogoutManager, LogoutRequest};
use crate::registry::TicketRegistry;
use crate::ticket::Ticket;
use cas_config::CleanerProperties;
use cas_core::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Guards a cleaning pass so that only one runs at a time
pub trait LockingStrategy: Send + Sync {
    /// Returns false when another pass holds the lock
    fn acquire(&self) -> bool;

    fn release(&self);
}

/// No coordination; every pass runs
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAcquireLockingStrategy;

impl LockingStrategy for AlwaysAcquireLockingStrategy {
    fn acquire(&self) -> bool {
        true
    }

    fn release(&self) {}
}

/// Exclusive within this process
#[derive(Debug, Default)]
pub struct InProcessLockingStrategy {
    held: Mutex<bool>,
}

impl LockingStrategy for InProcessLockingStrategy {
    fn acquire(&self) -> bool {
        let mut held = self.held.lock();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    fn release(&self) {
        *self.held.lock() = false;
    }
}

/// Outcome of one cleaning pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Tickets removed, cascaded children included
    pub removed: usize,
    pub logout_requests: Vec<LogoutRequest>,
}

/// Periodically deletes expired tickets, issuing single logout for sessions
pub struct RegistryCleaner {
    registry: Arc<TicketRegistry>,
    logout_manager: Arc<LogoutManager>,
    locking: Arc<dyn LockingStrategy>,
}

impl RegistryCleaner {
    pub fn new(registry: Arc<TicketRegistry>, logout_manager: Arc<LogoutManager>) -> Self {
        Self {
            registry,
            logout_manager,
            locking: Arc::new(AlwaysAcquireLockingStrategy),
        }
    }

    #[must_use]
    pub fn with_locking_strategy(mut self, locking: Arc<dyn LockingStrategy>) -> Self {
        self.locking = locking;
        self
    }

    /// Run one pass; returns an empty report when the lock is held elsewhere
    pub async fn clean(&self) -> Result<CleanupReport> {
        if !self.locking.acquire() {
            debug!("ticket registry cleaner is already running");
            return Ok(CleanupReport::default());
        }
        let result = self.clean_expired().await;
        self.locking.release();
        result
    }

    async fn clean_expired(&self) -> Result<CleanupReport> {
        let now = Utc::now();
        let mut report = CleanupReport::default();
        for ticket in self.registry.tickets().await? {
            if !ticket.is_expired_at(now) && !self.registry.is_chain_expired(&ticket, now).await? {
                continue;
            }
            if let Ticket::TicketGranting(tgt) = &ticket {
                report
                    .logout_requests
                    .extend(self.logout_manager.perform_logout(tgt));
            }
            report.removed += self.registry.delete_ticket(ticket.id()).await?;
        }
        if report.removed > 0 {
            info!(removed = report.removed, "removed expired tickets");
        }
        Ok(report)
    }

    /// Start the periodic task; `None` when cleaning is disabled
    pub fn spawn(self: Arc<Self>, properties: &CleanerProperties) -> Option<JoinHandle<()>> {
        let interval = Duration::from_secs(properties.repeat_interval_in_seconds);
        if !properties.enabled || interval == Duration::ZERO {
            info!("ticket registry cleaner is disabled");
            return None;
        }
        let start_delay = Duration::from_secs(properties.start_delay_in_seconds);

        Some(tokio::spawn(async move {
            tokio::time::sleep(start_delay).await;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.clean().await {
                    warn!("Ticket registry cleanup error: {}", e);
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationPolicy;
    use crate::ticket::TicketGrantingTicket;
    use cas_core::{Authentication, Principal, Service};

    fn session(id: &str, policy: ExpirationPolicy) -> TicketGrantingTicket {
        TicketGrantingTicket::new(
            id,
            Authentication::builder(Principal::new("casuser")).build(),
            policy,
        )
    }

    #[test]
    fn test_in_process_lock_is_exclusive() {
        let lock = InProcessLockingStrategy::default();
        assert!(lock.acquire());
        assert!(!lock.acquire());
        lock.release();
        assert!(lock.acquire());
    }

    #[tokio::test]
    async fn test_clean_removes_expired_sessions_and_logs_out() {
        let registry = Arc::new(TicketRegistry::default());
        let mut expired = session("TGT-1", ExpirationPolicy::NeverExpires);
        let st = expired.grant_service_ticket(
            "ST-1",
            Service::new("https://app.example.org/"),
            ExpirationPolicy::NeverExpires,
            false,
            true,
        );
        expired.mark_ticket_expired();
        registry.add_ticket(expired).await.unwrap();
        registry.add_ticket(st).await.unwrap();
        registry
            .add_ticket(session("TGT-2", ExpirationPolicy::NeverExpires))
            .await
            .unwrap();

        let cleaner = RegistryCleaner::new(registry.clone(), Arc::new(LogoutManager::default()));
        let report = cleaner.clean().await.unwrap();

        assert_eq!(report.removed, 2);
        assert_eq!(report.logout_requests.len(), 1);
        assert_eq!(registry.tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_removes_tickets_whose_session_is_gone() {
        let registry = Arc::new(TicketRegistry::default());
        let mut gone = session("TGT-1", ExpirationPolicy::NeverExpires);
        let orphan = gone.grant_service_ticket(
            "ST-1",
            Service::new("https://app.example.org/"),
            ExpirationPolicy::NeverExpires,
            false,
            true,
        );
        registry.add_ticket(orphan).await.unwrap();
        registry
            .add_ticket(session("TGT-2", ExpirationPolicy::NeverExpires))
            .await
            .unwrap();

        let cleaner = RegistryCleaner::new(registry.clone(), Arc::new(LogoutManager::default()));
        let report = cleaner.clean().await.unwrap();

        assert_eq!(report.removed, 1);
        assert!(report.logout_requests.is_empty());
        let remaining = registry.tickets().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), "TGT-2");
    }

    #[tokio::test]
    async fn test_clean_skips_when_locked() {
        let registry = Arc::new(TicketRegistry::default());
        registry
            .add_ticket(session("TGT-1", ExpirationPolicy::AlwaysExpires))
            .await
            .unwrap();
        let lock = Arc::new(InProcessLockingStrategy::default());
        assert!(lock.acquire());

        let cleaner = RegistryCleaner::new(registry.clone(), Arc::new(LogoutManager::default()))
            .with_locking_strategy(lock);
        assert_eq!(cleaner.clean().await.unwrap().removed, 0);
        assert_eq!(registry.tickets().await.unwrap().len(), 1);
    }

    #[test]
    fn test_spawn_disabled_without_interval() {
        let cleaner = Arc::new(RegistryCleaner::new(
            Arc::new(TicketRegistry::default()),
            Arc::new(LogoutManager::default()),
        ));
        let properties = CleanerProperties {
            enabled: true,
            start_delay_in_seconds: 0,
            repeat_interval_in_seconds: 0,
        };
        assert!(cleaner.spawn(&properties).is_none());
    }
}
