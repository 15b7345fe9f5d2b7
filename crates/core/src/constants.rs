/// Constants used throughout the CAS codebase
// Ticket id prefixes
pub const TICKET_GRANTING_TICKET_PREFIX: &str = "TGT";
pub const SERVICE_TICKET_PREFIX: &str = "ST";
pub const PROXY_TICKET_PREFIX: &str = "PT";
pub const PROXY_GRANTING_TICKET_PREFIX: &str = "PGT";

// Authentication attributes
pub const REMEMBER_ME_ATTRIBUTE: &str = "org.apereo.cas.authentication.principal.REMEMBER_ME";
pub const CREDENTIAL_TYPE_ATTRIBUTE: &str = "credentialType";
pub const SUCCESSFUL_HANDLERS_ATTRIBUTE: &str = "successfulAuthenticationHandlers";
pub const AUTHENTICATION_METHOD_ATTRIBUTE: &str = "authenticationMethod";

// Surrogate authentication attributes
pub const SURROGATE_ENABLED_ATTRIBUTE: &str = "surrogateEnabled";
pub const SURROGATE_PRINCIPAL_ATTRIBUTE: &str = "surrogatePrincipal";
pub const SURROGATE_USER_ATTRIBUTE: &str = "surrogateUser";
pub const DEFAULT_SURROGATE_SEPARATOR: &str = "+";

// Audit actions
pub const AUTHENTICATION_FAILED_ACTION: &str = "AUTHENTICATION_FAILED";
pub const AUTHENTICATION_SUCCESS_ACTION: &str = "AUTHENTICATION_SUCCESS";
pub const AUTHENTICATION_THROTTLED_ACTION: &str = "AUTHENTICATION_THROTTLED";
pub const DEFAULT_AUDIT_APPLICATION_CODE: &str = "CAS";
