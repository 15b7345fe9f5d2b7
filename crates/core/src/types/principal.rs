use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Multi-valued attribute map keyed by attribute name.
///
/// A `BTreeMap` keeps iteration order stable, which the transcoder relies on
/// for byte-identical encodings across nodes.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// An authenticated subject and its released attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    #[serde(default)]
    attributes: AttributeMap,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_attributes(id: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// First value of an attribute, if present
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn insert_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_returns_first_value() {
        let mut principal = Principal::new("casuser");
        principal.insert_attribute("memberOf", vec!["staff".into(), "faculty".into()]);
        assert_eq!(principal.attribute("memberOf"), Some("staff"));
        assert_eq!(principal.attribute("missing"), None);
    }
}
