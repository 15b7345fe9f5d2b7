//! Core domain types, errors, and constants for the CAS session core.
//!
//! This crate establishes the foundational data structures and error handling
//! used by every other crate in the workspace.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing every failure mode a ticket or authentication operation can
//!   surface.
//! - **`types`**: Principals, credentials, services and the immutable
//!   `Authentication` record attached to ticket-granting tickets.
//! - **`constants`**: Ticket prefixes and well-known attribute names.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt},
    types::*,
};
