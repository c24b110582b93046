//! Remote resources: the shared model, the CRUD contract and the HTTP
//! implementations for organizations and environments.

pub mod http;

pub use http::{HttpResourceCatalog, HttpResourceService, PAGE_SIZE};

use crate::primitives::HarborError;
use std::collections::BTreeMap;
use std::fmt;

/// Field name -> new value, as entered by the user
pub type FieldValues = BTreeMap<String, String>;

pub const REQUIRED_FIELDS: &[&str] = &["name"];
pub const EDITABLE_FIELDS: &[&str] = &["name", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Organization,
    Environment,
}

impl ResourceKind {
    pub fn singular(self) -> &'static str {
        match self {
            ResourceKind::Organization => "organization",
            ResourceKind::Environment => "environment",
        }
    }

    pub fn plural_title(self) -> &'static str {
        match self {
            ResourceKind::Organization => "Organizations",
            ResourceKind::Environment => "Environments",
        }
    }

    /// Environments only exist inside an organization
    pub fn requires_scope(self) -> bool {
        matches!(self, ResourceKind::Environment)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Transient copy of a remote entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: ResourceKind,
    pub etag: Option<String>,
}

impl Resource {
    /// Current values of the editable fields
    pub fn field_values(&self) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert("name".to_string(), self.name.clone());
        values.insert(
            "description".to_string(),
            self.description.clone().unwrap_or_default(),
        );
        values
    }
}

/// Names of required fields that are missing or blank
pub fn missing_required(fields: &FieldValues) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| fields.get(*field).is_none_or(|value| value.trim().is_empty()))
        .collect()
}

/// CRUD contract implemented per resource kind
pub trait ResourceService {
    fn kind(&self) -> ResourceKind;

    fn list(&self) -> Result<Vec<Resource>, HarborError>;

    /// Fails with `ApiError::NotFound` for an unknown id
    fn get(&self, id: &str) -> Result<Resource, HarborError>;

    /// Fails with `ApiError::Validation` when the server rejects the fields
    fn create(&self, fields: &FieldValues) -> Result<Resource, HarborError>;

    fn update(&self, id: &str, fields: &FieldValues) -> Result<Resource, HarborError>;

    fn delete(&self, id: &str) -> Result<(), HarborError>;
}

/// Hands out services by kind; `scope` is the parent organization id for
/// scoped kinds.
pub trait ResourceCatalog {
    fn service<'s>(
        &'s self,
        kind: ResourceKind,
        scope: Option<&str>,
    ) -> Result<Box<dyn ResourceService + 's>, HarborError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_fields() {
        let mut fields = FieldValues::new();
        assert_eq!(missing_required(&fields), vec!["name"]);

        fields.insert("name".to_string(), "   ".to_string());
        assert_eq!(missing_required(&fields), vec!["name"]);

        fields.insert("name".to_string(), "acme".to_string());
        assert!(missing_required(&fields).is_empty());
    }

    #[test]
    fn test_field_values_prefill_description() {
        let resource = Resource {
            id: "1".to_string(),
            name: "acme".to_string(),
            description: None,
            kind: ResourceKind::Organization,
            etag: None,
        };
        let values = resource.field_values();
        assert_eq!(values.get("name").map(String::as_str), Some("acme"));
        assert_eq!(values.get("description").map(String::as_str), Some(""));
    }

    #[test]
    fn test_only_environments_are_scoped() {
        assert!(!ResourceKind::Organization.requires_scope());
        assert!(ResourceKind::Environment.requires_scope());
        assert_eq!(ResourceKind::Environment.to_string(), "environment");
    }
}
