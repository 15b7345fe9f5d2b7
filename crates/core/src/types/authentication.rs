use super::{AttributeMap, Credential, CredentialMetaData, Principal};
use crate::constants::{
    AUTHENTICATION_METHOD_ATTRIBUTE, CREDENTIAL_TYPE_ATTRIBUTE, REMEMBER_ME_ATTRIBUTE,
    SUCCESSFUL_HANDLERS_ATTRIBUTE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a single authentication handler validating a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub handler_name: String,
    pub credential_meta_data: CredentialMetaData,
    pub principal: Principal,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl HandlerResult {
    pub fn new(handler_name: impl Into<String>, credential: &Credential, principal: Principal) -> Self {
        Self {
            handler_name: handler_name.into(),
            credential_meta_data: credential.meta_data(),
            principal,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Immutable record of a completed authentication transaction.
///
/// Attached to a ticket-granting ticket when it is created and never mutated
/// afterwards; changes go through [`Authentication::to_builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    principal: Principal,
    credentials: Vec<CredentialMetaData>,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, String>,
    attributes: AttributeMap,
    authentication_date: DateTime<Utc>,
}

impl Authentication {
    pub fn builder(principal: Principal) -> AuthenticationBuilder {
        AuthenticationBuilder::new(principal)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn credentials(&self) -> &[CredentialMetaData] {
        &self.credentials
    }

    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn authentication_date(&self) -> DateTime<Utc> {
        self.authentication_date
    }

    /// Whether the user asked for a long-term ("remember me") session
    pub fn is_remember_me(&self) -> bool {
        self.attribute(REMEMBER_ME_ATTRIBUTE)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    pub fn to_builder(&self) -> AuthenticationBuilder {
        AuthenticationBuilder {
            principal: self.principal.clone(),
            credentials: self.credentials.clone(),
            successes: self.successes.clone(),
            failures: self.failures.clone(),
            attributes: self.attributes.clone(),
            authentication_date: Some(self.authentication_date),
        }
    }
}

/// Builder for [`Authentication`]
#[derive(Debug, Clone)]
pub struct AuthenticationBuilder {
    principal: Principal,
    credentials: Vec<CredentialMetaData>,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, String>,
    attributes: AttributeMap,
    authentication_date: Option<DateTime<Utc>>,
}

impl AuthenticationBuilder {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            credentials: Vec::new(),
            successes: BTreeMap::new(),
            failures: BTreeMap::new(),
            attributes: AttributeMap::new(),
            authentication_date: None,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn set_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    pub fn add_credential(mut self, credential: CredentialMetaData) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Record a successful handler, adding its credential metadata once
    pub fn add_success(mut self, result: HandlerResult) -> Self {
        if !self.credentials.contains(&result.credential_meta_data) {
            self.credentials.push(result.credential_meta_data.clone());
        }
        self.successes.insert(result.handler_name.clone(), result);
        self
    }

    pub fn add_failure(mut self, handler_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(handler_name.into(), message.into());
        self
    }

    pub fn add_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn set_attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    pub fn authentication_date(mut self, date: DateTime<Utc>) -> Self {
        self.authentication_date = Some(date);
        self
    }

    /// Populate the standard metadata attributes from the recorded successes
    pub fn with_standard_metadata(mut self) -> Self {
        let handlers: Vec<String> = self.successes.keys().cloned().collect();
        let mut types: Vec<String> = self
            .credentials
            .iter()
            .map(|c| c.credential_type.clone())
            .collect();
        types.dedup();
        if !handlers.is_empty() {
            self.attributes
                .insert(AUTHENTICATION_METHOD_ATTRIBUTE.to_string(), handlers.clone());
            self.attributes
                .insert(SUCCESSFUL_HANDLERS_ATTRIBUTE.to_string(), handlers);
        }
        if !types.is_empty() {
            self.attributes
                .insert(CREDENTIAL_TYPE_ATTRIBUTE.to_string(), types);
        }
        self
    }

    pub fn build(self) -> Authentication {
        Authentication {
            principal: self.principal,
            credentials: self.credentials,
            successes: self.successes,
            failures: self.failures,
            attributes: self.attributes,
            authentication_date: self.authentication_date.unwrap_or_else(Utc::now),
        }
    }
}
