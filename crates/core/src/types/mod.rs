//! Domain types shared by the ticket, service and authentication crates.

mod authentication;
mod credential;
mod principal;
mod service;

pub use authentication::{Authentication, AuthenticationBuilder, HandlerResult};
pub use credential::{Credential, CredentialMetaData, UsernamePasswordCredential};
pub use principal::{AttributeMap, Principal};
pub use service::Service;
