//! Logging setup and structured ticket events

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Output is a compact
/// single-line format on stderr, with ANSI colours only on a terminal.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_with_default("info")
}

/// Initialize tracing with an explicit default directive used when `RUST_LOG` is unset
pub fn init_with_default(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span wrapping a single ticket registry operation
pub fn ticket_span(operation: &str, ticket_id: &str) -> Span {
    span!(Level::DEBUG, "ticket", operation = %operation, ticket_id = %ticket_id)
}

/// Emit a structured event when a ticket is created
pub fn ticket_created(ticket_id: &str, principal: &str) {
    info!(ticket_id = %ticket_id, principal = %principal, "ticket_created");
}

/// Emit a structured event when a ticket is destroyed
pub fn ticket_destroyed(ticket_id: &str, removed: usize) {
    info!(ticket_id = %ticket_id, removed = %removed, "ticket_destroyed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_installs_global_subscriber_once() {
        assert!(init_with_default("debug").is_ok());
        assert!(init().is_err());

        let span = ticket_span("add", "TGT-1-abc");
        let _entered = span.enter();
        ticket_created("TGT-1-abc", "casuser");
        ticket_destroyed("TGT-1-abc", 1);
    }
}
