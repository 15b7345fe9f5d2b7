//! The central authentication service of the CAS session core.
//!
//! [`CentralAuthenticationService`] owns the ticket lifecycle: it opens SSO
//! sessions, issues and validates service tickets, hands out proxy-granting
//! and proxy tickets, and destroys sessions with single logout.
//! [`CasServer`] wires it to configuration, authentication, login
//! throttling, the audit trail and the registry cleaner.

mod assertion;
mod central;
mod server;

pub use assertion::Assertion;
pub use central::CentralAuthenticationService;
pub use server::CasServer;
