use cas_core::{AttributeMap, Principal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which principal attributes a service receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeReleasePolicy {
    ReturnAll,
    /// Only the listed attributes; nothing when the list is empty
    #[serde(rename_all = "camelCase")]
    ReturnAllowed { allowed_attributes: Vec<String> },
    /// Source attribute name to the name the service sees
    ReturnMapped { mapping: BTreeMap<String, String> },
    DenyAll,
}

impl Default for AttributeReleasePolicy {
    fn default() -> Self {
        AttributeReleasePolicy::ReturnAllowed {
            allowed_attributes: Vec::new(),
        }
    }
}

impl AttributeReleasePolicy {
    pub fn release(&self, principal: &Principal) -> AttributeMap {
        let attributes = principal.attributes();
        match self {
            AttributeReleasePolicy::ReturnAll => attributes.clone(),
            AttributeReleasePolicy::ReturnAllowed { allowed_attributes } => attributes
                .iter()
                .filter(|(name, _)| allowed_attributes.contains(name))
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect(),
            AttributeReleasePolicy::ReturnMapped { mapping } => mapping
                .iter()
                .filter_map(|(source, target)| {
                    attributes
                        .get(source)
                        .map(|values| (target.clone(), values.clone()))
                })
                .collect(),
            AttributeReleasePolicy::DenyAll => AttributeMap::new(),
        }
    }
}
