//! A configured CAS node: the central authentication service plus login,
//! throttling, auditing and background maintenance

use crate::central::CentralAuthenticationService;
use cas_authn::{
    spawn_release_task, throttle_from_properties, AuditActionContext, AuditTrailManager,
    AuthenticationTransaction, InMemoryAuditTrailManager, LoginAttempt,
    PolicyBasedAuthenticationManager, ThrottledSubmissionHandler,
};
use cas_config::{CasConfiguration, CasProperties};
use cas_core::{Result, Service, AUTHENTICATION_SUCCESS_ACTION};
use cas_tickets::{InProcessLockingStrategy, RegistryCleaner, ServiceTicket, TicketGrantingTicket};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct CasServer {
    properties: CasProperties,
    central: Arc<CentralAuthenticationService>,
    authentication: PolicyBasedAuthenticationManager,
    throttle: Option<Arc<dyn ThrottledSubmissionHandler>>,
    audit: Arc<dyn AuditTrailManager>,
    cleaner: Arc<RegistryCleaner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CasServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasServer")
            .field("central", &self.central)
            .field("authentication", &self.authentication)
            .field("throttle", &self.throttle.as_ref().map(|t| t.name().to_string()))
            .field("tasks", &self.tasks.lock().len())
            .finish_non_exhaustive()
    }
}

impl CasServer {
    /// Build every component from configuration and load service definitions
    pub async fn from_configuration(configuration: &CasConfiguration) -> Result<Self> {
        let properties = configuration.properties.clone();
        let central = Arc::new(CentralAuthenticationService::from_properties(&properties)?);
        let loaded = central.services().load().await?;

        let audit: Arc<dyn AuditTrailManager> = Arc::new(InMemoryAuditTrailManager::new());
        let throttle = throttle_from_properties(&properties.authn.throttle, Some(audit.clone()))?;
        let authentication = PolicyBasedAuthenticationManager::from_properties(
            &properties.authn,
            central.services().clone(),
        )?;
        let cleaner = Arc::new(
            RegistryCleaner::new(central.registry().clone(), central.logout_manager().clone())
                .with_locking_strategy(Arc::new(InProcessLockingStrategy::default())),
        );

        info!(
            source = ?configuration.source,
            services = loaded,
            throttle = ?properties.authn.throttle.kind,
            "CAS server configured"
        );
        Ok(Self {
            properties,
            central,
            authentication,
            throttle,
            audit,
            cleaner,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn central(&self) -> &Arc<CentralAuthenticationService> {
        &self.central
    }

    pub fn authentication_manager(&self) -> &PolicyBasedAuthenticationManager {
        &self.authentication
    }

    pub fn audit_trail(&self) -> &Arc<dyn AuditTrailManager> {
        &self.audit
    }

    pub fn cleaner(&self) -> &Arc<RegistryCleaner> {
        &self.cleaner
    }

    /// Authenticate a login and open an SSO session for it.
    ///
    /// Usernames of the form `surrogate<separator>primary` request surrogate
    /// authentication. Outcomes are audited and fed to the login throttle.
    pub async fn login(&self, transaction: AuthenticationTransaction) -> Result<TicketGrantingTicket> {
        let transaction =
            transaction.with_surrogate_separator(&self.properties.authn.surrogate.separator);
        let attempt = login_attempt(&transaction);

        if let Some(throttle) = &self.throttle {
            throttle.pre_handle(&attempt).await?;
        }

        let outcome = self.authentication.authenticate(&transaction).await;

        if let Some(throttle) = &self.throttle {
            throttle.post_handle(&attempt, outcome.is_ok()).await;
        }
        let action = if outcome.is_ok() {
            AUTHENTICATION_SUCCESS_ACTION
        } else {
            self.properties.authn.throttle.failure.code.as_str()
        };
        let (client_ip, server_ip) = transaction
            .client_info()
            .map(|info| (info.client_ip.clone(), info.server_ip.clone()))
            .unwrap_or_default();
        self.audit
            .record(
                AuditActionContext::new(
                    &attempt.username,
                    &attempt.username,
                    action,
                    &self.properties.authn.throttle.app_code,
                )
                .with_client_info(client_ip, server_ip),
            )
            .await;

        let authentication = outcome?;
        self.central
            .create_ticket_granting_ticket(authentication, transaction.service())
            .await
    }

    /// Convenience for a login that goes straight on to a service ticket
    pub async fn login_to_service(
        &self,
        transaction: AuthenticationTransaction,
        service: &Service,
    ) -> Result<(TicketGrantingTicket, ServiceTicket)> {
        let tgt = self.login(transaction).await?;
        let authentication = tgt.authentication().clone();
        let st = self
            .central
            .grant_service_ticket(tgt.id(), service, Some(&authentication))
            .await?;
        Ok((tgt, st))
    }

    /// Spawn the registry cleaner, throttle release and audit retention tasks
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!("background tasks are already running");
            return;
        }
        if let Some(handle) = self.cleaner.clone().spawn(&self.properties.ticket.registry.cleaner) {
            tasks.push(handle);
        }
        if let Some(throttle) = &self.throttle {
            let interval = Duration::from_secs(self.properties.authn.throttle.repeat_interval_in_seconds);
            if let Some(handle) = spawn_release_task(throttle.clone(), interval) {
                tasks.push(handle);
            }
        }
        if let Some(handle) = spawn_audit_cleanup(
            self.audit.clone(),
            self.properties.audit.max_age_in_seconds,
        ) {
            tasks.push(handle);
        }
        info!(tasks = tasks.len(), "background tasks started");
    }

    /// Stop the background tasks
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("background tasks stopped");
    }
}

impl Drop for CasServer {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

fn login_attempt(transaction: &AuthenticationTransaction) -> LoginAttempt {
    let client_ip = transaction
        .client_info()
        .map(|info| info.client_ip.clone())
        .unwrap_or_default();
    let username = transaction
        .primary_credential()
        .map(|credential| credential.id().to_string())
        .unwrap_or_default();
    LoginAttempt::new(client_ip, username)
}

/// Age out audit records every `max_age / 2`, at least once a second
fn spawn_audit_cleanup(audit: Arc<dyn AuditTrailManager>, max_age_in_seconds: u64) -> Option<JoinHandle<()>> {
    if max_age_in_seconds == 0 {
        return None;
    }
    let seconds = i64::try_from(max_age_in_seconds)
        .unwrap_or(i64::MAX)
        .min(i64::from(u32::MAX));
    let max_age = chrono::Duration::seconds(seconds);
    let period = Duration::from_secs((max_age_in_seconds / 2).max(1));
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            audit.clean(max_age).await;
        }
    }))
}
