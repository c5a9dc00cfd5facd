use serde::Serialize;

use crate::domain::application::Application;
use crate::domain::customer::CustomerRecord;

/// A customer/environment/application triple that passed the registry gate.
///
/// Only [`crate::registry::CustomerRegistry::validate`] constructs this value, so holding one is
/// proof the combination was valid when it was checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RestartTarget {
    customer: CustomerRecord,
    environment: String,
    application: Application,
}

impl RestartTarget {
    pub(crate) fn new(
        customer: CustomerRecord,
        environment: impl Into<String>,
        application: Application,
    ) -> Self {
        Self { customer, environment: environment.into(), application }
    }

    pub fn customer(&self) -> &CustomerRecord {
        &self.customer
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn application(&self) -> Application {
        self.application
    }
}
