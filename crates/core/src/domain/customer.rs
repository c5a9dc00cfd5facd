use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerCode(pub String);

impl fmt::Display for CustomerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the customer record store. Read-only reference data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub name: String,
    pub code: CustomerCode,
    /// Allowed environments in store order, without duplicates.
    pub environments: Vec<String>,
}

impl CustomerRecord {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        environments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut unique = Vec::new();
        for environment in environments {
            let environment = environment.into();
            if !environment.is_empty() && !unique.contains(&environment) {
                unique.push(environment);
            }
        }
        Self { name: name.into(), code: CustomerCode(code.into()), environments: unique }
    }

    pub fn allows_environment(&self, environment: &str) -> bool {
        self.environments.iter().any(|allowed| allowed == environment)
    }
}

#[cfg(test)]
mod tests {
    use super::CustomerRecord;

    #[test]
    fn environments_are_deduplicated_in_store_order() {
        let record = CustomerRecord::new("Acme Corporation", "AC15", ["dv01", "qa01", "dv01", ""]);
        assert_eq!(record.environments, vec!["dv01".to_string(), "qa01".to_string()]);
        assert!(record.allows_environment("qa01"));
        assert!(!record.allows_environment("QA01"));
    }
}
