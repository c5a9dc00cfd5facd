//! The remote per-customer, per-environment configuration document.
//!
//! The document is a JSON object holding an `apps` sequence of records, each with at least a
//! `name` and a `comment`. Restarting an application means rewriting its record's `comment`; the
//! rest of the document must come back out structurally unchanged, including key order.

use serde_json::{Map, Value};

use crate::errors::DocumentError;

/// Repository-relative location of the document for a customer code and environment.
pub fn document_path(customer_code: &str, environment: &str) -> String {
    format!(
        "environments/{customer_code}/{environment}/utilities/restart-services/vmss-services/vmss-management.json"
    )
}

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteConfigDocument {
    root: Map<String, Value>,
}

impl RemoteConfigDocument {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|error| DocumentError::Malformed(error.to_string()))?;

        let Value::Object(root) = value else {
            return Err(DocumentError::Malformed("top-level value is not an object".to_string()));
        };

        if !matches!(root.get("apps"), Some(Value::Array(_))) {
            return Err(DocumentError::MissingApps);
        }

        Ok(Self { root })
    }

    fn apps(&self) -> &[Value] {
        match self.root.get("apps") {
            Some(Value::Array(apps)) => apps,
            _ => &[],
        }
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps().iter().filter_map(|app| app.get("name").and_then(Value::as_str)).collect()
    }

    /// Sets `comment` on the first record named `record_name`. Later duplicates are untouched.
    pub fn update_comment(
        &mut self,
        record_name: &str,
        comment: &str,
    ) -> Result<(), DocumentError> {
        let Some(Value::Array(apps)) = self.root.get_mut("apps") else {
            return Err(DocumentError::MissingApps);
        };

        let record = apps
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|record| record.get("name").and_then(Value::as_str) == Some(record_name))
            .ok_or_else(|| DocumentError::RecordNotFound(record_name.to_string()))?;

        record.insert("comment".to_string(), Value::String(comment.to_string()));
        Ok(())
    }

    /// Two-space indented rendering with non-ASCII characters written as-is.
    pub fn to_pretty_string(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|error| DocumentError::Malformed(error.to_string()))
    }
}
