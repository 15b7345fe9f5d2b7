//! Expiration policies deciding when a ticket stops being usable
//!
//! A policy is a pure function of the ticket's usage record and the current
//! time. Nothing is cached: every access re-evaluates the policy.

mod builder;

pub use builder::ExpirationPolicyBuilder;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Usage record a policy is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUsage {
    pub creation_time: DateTime<Utc>,
    pub last_time_used: DateTime<Utc>,
    pub previous_time_used: Option<DateTime<Utc>>,
    pub count_of_uses: u32,
}

impl TicketUsage {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            creation_time: now,
            last_time_used: now,
            previous_time_used: None,
            count_of_uses: 0,
        }
    }

    /// Record one use at `now`
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.previous_time_used = Some(self.last_time_used);
        self.last_time_used = now;
        self.count_of_uses = self.count_of_uses.saturating_add(1);
    }
}

/// Strategy deciding whether a ticket has expired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    NeverExpires,
    AlwaysExpires,
    /// Expires a fixed time after creation
    HardTimeout { time_to_kill: Duration },
    /// Expires after a period of inactivity
    Timeout { time_to_kill: Duration },
    /// Hard limit from creation combined with an idle limit
    TicketGrantingTicket {
        max_time_to_live: Duration,
        time_to_kill: Duration,
    },
    /// Expires after a number of uses or a time after creation, whichever comes first
    MultiTimeUseOrTimeout {
        number_of_uses: u32,
        time_to_kill: Duration,
    },
    /// Idle limit plus a minimum spacing between consecutive uses
    ThrottledUseAndTimeout {
        time_to_kill: Duration,
        time_in_between_uses: Duration,
    },
    /// Uses `remember_me` for long-term sessions and `session` otherwise
    RememberMeDelegating {
        remember_me: Box<ExpirationPolicy>,
        session: Box<ExpirationPolicy>,
    },
    /// Expired as soon as any member policy is expired
    Composite(Vec<ExpirationPolicy>),
}

impl ExpirationPolicy {
    pub fn hard_timeout(time_to_kill: Duration) -> Self {
        ExpirationPolicy::HardTimeout { time_to_kill }
    }

    pub fn timeout(time_to_kill: Duration) -> Self {
        ExpirationPolicy::Timeout { time_to_kill }
    }

    pub fn multi_time_use(number_of_uses: u32, time_to_kill: Duration) -> Self {
        ExpirationPolicy::MultiTimeUseOrTimeout {
            number_of_uses,
            time_to_kill,
        }
    }

    /// Evaluate the policy.
    ///
    /// `remember_me` is the long-term session flag of the authentication the
    /// ticket belongs to; only [`ExpirationPolicy::RememberMeDelegating`] reads it.
    pub fn is_expired(&self, usage: &TicketUsage, remember_me: bool, now: DateTime<Utc>) -> bool {
        match self {
            ExpirationPolicy::NeverExpires => false,
            ExpirationPolicy::AlwaysExpires => true,
            ExpirationPolicy::HardTimeout { time_to_kill } => {
                now > plus(usage.creation_time, *time_to_kill)
            }
            ExpirationPolicy::Timeout { time_to_kill } => {
                now > plus(usage.last_time_used, *time_to_kill)
            }
            ExpirationPolicy::TicketGrantingTicket {
                max_time_to_live,
                time_to_kill,
            } => {
                now > plus(usage.creation_time, *max_time_to_live)
                    || now > plus(usage.last_time_used, *time_to_kill)
            }
            ExpirationPolicy::MultiTimeUseOrTimeout {
                number_of_uses,
                time_to_kill,
            } => {
                usage.count_of_uses >= *number_of_uses
                    || now > plus(usage.creation_time, *time_to_kill)
            }
            ExpirationPolicy::ThrottledUseAndTimeout {
                time_to_kill,
                time_in_between_uses,
            } => {
                let idle_deadline = plus(usage.last_time_used, *time_to_kill);
                if usage.count_of_uses == 0 && now < idle_deadline {
                    return false;
                }
                if now >= idle_deadline {
                    return true;
                }
                // Presented again too soon after the last use
                now <= plus(usage.last_time_used, *time_in_between_uses)
            }
            ExpirationPolicy::RememberMeDelegating {
                remember_me: long_term,
                session,
            } => {
                if remember_me {
                    long_term.is_expired(usage, remember_me, now)
                } else {
                    session.is_expired(usage, remember_me, now)
                }
            }
            ExpirationPolicy::Composite(policies) => policies
                .iter()
                .any(|policy| policy.is_expired(usage, remember_me, now)),
        }
    }

    /// Upper bound on how long a ticket under this policy can live.
    ///
    /// Used by stores that evict by TTL. `None` means unbounded.
    pub fn time_to_live(&self) -> Option<Duration> {
        match self {
            ExpirationPolicy::NeverExpires => None,
            ExpirationPolicy::AlwaysExpires => Some(Duration::ZERO),
            ExpirationPolicy::HardTimeout { time_to_kill }
            | ExpirationPolicy::MultiTimeUseOrTimeout { time_to_kill, .. } => Some(*time_to_kill),
            // Idle policies are extended on every use; the store TTL is refreshed on update
            ExpirationPolicy::Timeout { time_to_kill }
            | ExpirationPolicy::ThrottledUseAndTimeout { time_to_kill, .. } => Some(*time_to_kill),
            ExpirationPolicy::TicketGrantingTicket {
                max_time_to_live, ..
            } => Some(*max_time_to_live),
            ExpirationPolicy::RememberMeDelegating {
                remember_me,
                session,
            } => match (remember_me.time_to_live(), session.time_to_live()) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
            ExpirationPolicy::Composite(policies) => {
                policies.iter().filter_map(ExpirationPolicy::time_to_live).min()
            }
        }
    }
}

fn plus(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn at(base: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
        base + TimeDelta::seconds(seconds)
    }

    #[test]
    fn test_never_and_always() {
        let now = Utc::now();
        let usage = TicketUsage::new(now);
        assert!(!ExpirationPolicy::NeverExpires.is_expired(&usage, false, at(now, 1_000_000)));
        assert!(ExpirationPolicy::AlwaysExpires.is_expired(&usage, false, now));
    }

    #[test]
    fn test_hard_timeout_ignores_use() {
        let start = Utc::now();
        let mut usage = TicketUsage::new(start);
        let policy = ExpirationPolicy::hard_timeout(secs(10));

        usage.record_use(at(start, 9));
        assert!(!policy.is_expired(&usage, false, at(start, 10)));
        assert!(policy.is_expired(&usage, false, at(start, 11)));
    }

    #[test]
    fn test_timeout_is_extended_by_use() {
        let start = Utc::now();
        let mut usage = TicketUsage::new(start);
        let policy = ExpirationPolicy::timeout(secs(10));

        usage.record_use(at(start, 8));
        assert!(!policy.is_expired(&usage, false, at(start, 15)));
        assert!(policy.is_expired(&usage, false, at(start, 19)));
    }

    #[test]
    fn test_ticket_granting_policy_combines_limits() {
        let start = Utc::now();
        let policy = ExpirationPolicy::TicketGrantingTicket {
            max_time_to_live: secs(100),
            time_to_kill: secs(20),
        };
        let mut usage = TicketUsage::new(start);

        assert!(policy.is_expired(&usage, false, at(start, 21)), "idle limit");

        for t in (15..=90).step_by(15) {
            usage.record_use(at(start, t));
        }
        assert!(!policy.is_expired(&usage, false, at(start, 100)));
        assert!(policy.is_expired(&usage, false, at(start, 101)), "hard limit");
    }

    #[test]
    fn test_multi_time_use_counts_uses() {
        let start = Utc::now();
        let policy = ExpirationPolicy::multi_time_use(1, secs(10));
        let mut usage = TicketUsage::new(start);

        assert!(!policy.is_expired(&usage, false, at(start, 5)));
        usage.record_use(at(start, 1));
        assert!(policy.is_expired(&usage, false, at(start, 2)));
    }

    #[test]
    fn test_multi_time_use_times_out_unused() {
        let start = Utc::now();
        let policy = ExpirationPolicy::multi_time_use(5, secs(10));
        let usage = TicketUsage::new(start);
        assert!(policy.is_expired(&usage, false, at(start, 11)));
    }

    #[test]
    fn test_throttled_use() {
        let start = Utc::now();
        let policy = ExpirationPolicy::ThrottledUseAndTimeout {
            time_to_kill: secs(60),
            time_in_between_uses: secs(5),
        };
        let mut usage = TicketUsage::new(start);
        assert!(!policy.is_expired(&usage, false, at(start, 30)), "unused inside ttk");
        assert!(policy.is_expired(&usage, false, at(start, 61)), "unused past ttk");

        usage.record_use(at(start, 10));
        usage.record_use(at(start, 12));
        assert!(policy.is_expired(&usage, false, at(start, 13)), "reused too quickly");

        let mut spaced = TicketUsage::new(start);
        spaced.record_use(at(start, 10));
        spaced.record_use(at(start, 20));
        assert!(policy.is_expired(&spaced, false, at(start, 24)), "inside the spacing window");
        assert!(!policy.is_expired(&spaced, false, at(start, 26)));
        assert!(policy.is_expired(&spaced, false, at(start, 80)), "idle past ttk");
    }

    #[test]
    fn test_remember_me_delegation() {
        let start = Utc::now();
        let policy = ExpirationPolicy::RememberMeDelegating {
            remember_me: Box::new(ExpirationPolicy::hard_timeout(secs(1000))),
            session: Box::new(ExpirationPolicy::hard_timeout(secs(10))),
        };
        let usage = TicketUsage::new(start);
        assert!(policy.is_expired(&usage, false, at(start, 20)));
        assert!(!policy.is_expired(&usage, true, at(start, 20)));
        assert_eq!(policy.time_to_live(), Some(secs(1000)));
    }

    #[test]
    fn test_composite_is_expired_when_any_member_is() {
        let start = Utc::now();
        let policy = ExpirationPolicy::Composite(vec![
            ExpirationPolicy::hard_timeout(secs(100)),
            ExpirationPolicy::multi_time_use(2, secs(100)),
        ]);
        let mut usage = TicketUsage::new(start);
        usage.record_use(at(start, 1));
        assert!(!policy.is_expired(&usage, false, at(start, 2)));
        usage.record_use(at(start, 2));
        assert!(policy.is_expired(&usage, false, at(start, 3)));
        assert_eq!(policy.time_to_live(), Some(secs(100)));
    }

    proptest! {
        #[test]
        fn prop_hard_timeout_boundary(ttk in 1u64..100_000, offset in 0i64..200_000) {
            let start = Utc::now();
            let usage = TicketUsage::new(start);
            let policy = ExpirationPolicy::hard_timeout(secs(ttk));
            prop_assert_eq!(policy.is_expired(&usage, false, at(start, offset)), offset > ttk as i64);
        }

        #[test]
        fn prop_never_expires(uses in 0u32..1000, offset in 0i64..10_000_000) {
            let start = Utc::now();
            let mut usage = TicketUsage::new(start);
            usage.count_of_uses = uses;
            prop_assert!(!ExpirationPolicy::NeverExpires.is_expired(&usage, true, at(start, offset)));
        }
    }
}
