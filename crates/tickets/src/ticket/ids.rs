use super::TicketKind;
use cas_config::CasProperties;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of new ticket ids
pub trait TicketIdGenerator: Send + Sync {
    fn new_ticket_id(&self, prefix: &str) -> String;
}

/// Ids of the form `PREFIX-<sequence>-<random>[-<suffix>]`.
///
/// The sequence starts at 1 and wraps back to 1; the random part is drawn
/// from the operating system RNG.
#[derive(Debug)]
pub struct UniqueTicketIdGenerator {
    sequence: AtomicU64,
    random_length: usize,
    suffix: Option<String>,
}

impl UniqueTicketIdGenerator {
    pub fn new(random_length: usize, suffix: Option<String>) -> Self {
        Self {
            sequence: AtomicU64::new(1),
            random_length,
            suffix: suffix.filter(|s| !s.is_empty()),
        }
    }

    fn next_sequence(&self) -> u64 {
        let mut current = self.sequence.load(Ordering::Relaxed);
        loop {
            let next = if current == u64::MAX { 1 } else { current + 1 };
            match self.sequence.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }
}

impl TicketIdGenerator for UniqueTicketIdGenerator {
    fn new_ticket_id(&self, prefix: &str) -> String {
        let random: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(self.random_length)
            .map(char::from)
            .collect();
        let sequence = self.next_sequence();
        match &self.suffix {
            Some(suffix) => format!("{prefix}-{sequence}-{random}-{suffix}"),
            None => format!("{prefix}-{sequence}-{random}"),
        }
    }
}

/// One generator per ticket kind, sized from configuration
#[derive(Clone)]
pub struct TicketIdGenerators {
    ticket_granting: Arc<dyn TicketIdGenerator>,
    proxy_granting: Arc<dyn TicketIdGenerator>,
    service: Arc<dyn TicketIdGenerator>,
    proxy: Arc<dyn TicketIdGenerator>,
}

impl TicketIdGenerators {
    pub fn from_properties(properties: &CasProperties) -> Self {
        let suffix = properties.host.name.clone();
        let ticket = &properties.ticket;
        let make = |length: usize| -> Arc<dyn TicketIdGenerator> {
            Arc::new(UniqueTicketIdGenerator::new(length, suffix.clone()))
        };
        Self {
            ticket_granting: make(ticket.tgt.max_length),
            proxy_granting: make(ticket.pgt.max_length),
            service: make(ticket.st.max_length),
            proxy: make(ticket.pt.max_length),
        }
    }

    /// Use a single generator for every kind
    pub fn uniform(generator: Arc<dyn TicketIdGenerator>) -> Self {
        Self {
            ticket_granting: Arc::clone(&generator),
            proxy_granting: Arc::clone(&generator),
            service: Arc::clone(&generator),
            proxy: generator,
        }
    }

    pub fn new_ticket_id(&self, kind: TicketKind) -> String {
        let generator = match kind {
            TicketKind::TicketGranting => &self.ticket_granting,
            TicketKind::ProxyGranting => &self.proxy_granting,
            TicketKind::Service => &self.service,
            TicketKind::Proxy => &self.proxy,
        };
        generator.new_ticket_id(kind.prefix())
    }
}

impl std::fmt::Debug for TicketIdGenerators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIdGenerators").finish_non_exhaustive()
    }
}
