use super::ExpirationPolicy;
use cas_config::TicketProperties;
use std::time::Duration;
use tracing::{debug, warn};

/// Derives the expiration policy of each ticket kind from configuration
#[derive(Debug, Clone)]
pub struct ExpirationPolicyBuilder {
    properties: TicketProperties,
}

impl ExpirationPolicyBuilder {
    pub fn new(properties: TicketProperties) -> Self {
        Self { properties }
    }

    /// Policy for ticket-granting tickets.
    ///
    /// The first matching rule wins: both main limits negative gives
    /// never-expiring sessions, then the idle timeout, the combined
    /// hard-and-idle policy, the throttled policy, the hard timeout, and
    /// finally immediate expiry. Remember-me wraps the result when enabled.
    pub fn ticket_granting_ticket(&self) -> ExpirationPolicy {
        let tgt = &self.properties.tgt;

        let session = if tgt.max_time_to_live_in_seconds < 0 && tgt.time_to_kill_in_seconds < 0 {
            warn!("ticket-granting tickets are configured to never expire");
            ExpirationPolicy::NeverExpires
        } else if tgt.timeout.max_time_to_live_in_seconds > 0 {
            ExpirationPolicy::timeout(seconds(tgt.timeout.max_time_to_live_in_seconds))
        } else if tgt.max_time_to_live_in_seconds > 0 && tgt.time_to_kill_in_seconds > 0 {
            ExpirationPolicy::TicketGrantingTicket {
                max_time_to_live: seconds(tgt.max_time_to_live_in_seconds),
                time_to_kill: seconds(tgt.time_to_kill_in_seconds),
            }
        } else if tgt.throttled_timeout.time_to_kill_in_seconds > 0
            && tgt.throttled_timeout.time_in_between_uses_in_seconds > 0
        {
            ExpirationPolicy::ThrottledUseAndTimeout {
                time_to_kill: seconds(tgt.throttled_timeout.time_to_kill_in_seconds),
                time_in_between_uses: seconds(tgt.throttled_timeout.time_in_between_uses_in_seconds),
            }
        } else if tgt.hard_timeout.time_to_kill_in_seconds > 0 {
            ExpirationPolicy::hard_timeout(seconds(tgt.hard_timeout.time_to_kill_in_seconds))
        } else {
            warn!("ticket-granting tickets are configured to expire immediately");
            ExpirationPolicy::AlwaysExpires
        };

        let policy = if tgt.remember_me.enabled {
            ExpirationPolicy::RememberMeDelegating {
                remember_me: Box::new(ExpirationPolicy::hard_timeout(seconds(
                    tgt.remember_me.time_to_kill_in_seconds,
                ))),
                session: Box::new(session),
            }
        } else {
            session
        };
        debug!(?policy, "ticket-granting ticket expiration policy");
        policy
    }

    pub fn service_ticket(&self) -> ExpirationPolicy {
        let st = &self.properties.st;
        ExpirationPolicy::multi_time_use(st.number_of_uses, seconds(st.time_to_kill_in_seconds))
    }

    pub fn proxy_ticket(&self) -> ExpirationPolicy {
        let pt = &self.properties.pt;
        ExpirationPolicy::multi_time_use(pt.number_of_uses, seconds(pt.time_to_kill_in_seconds))
    }

    /// Hard timeout when configured, otherwise the ticket-granting ticket policy
    pub fn proxy_granting_ticket(&self) -> ExpirationPolicy {
        let pgt = &self.properties.pgt;
        if pgt.hard_timeout_in_seconds > 0 {
            ExpirationPolicy::hard_timeout(seconds(pgt.hard_timeout_in_seconds))
        } else {
            self.ticket_granting_ticket()
        }
    }
}

fn seconds(value: i64) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or(0))
}
