//! Customer registry and the validation gate in front of every remote mutation.
//!
//! The registry is a flat CSV file with a header row and the columns `name, code,
//! environments`, where `environments` is a comma-joined list inside a single (quoted) cell.
//! It is loaded fresh for every request; nothing is cached between calls.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::domain::{Application, CustomerRecord, RestartTarget};
use crate::errors::{RegistryError, ValidationError};

/// Source of customer records. Implementations must read current data on every call.
pub trait CustomerStore: Send + Sync {
    fn load(&self) -> Result<CustomerRegistry, RegistryError>;
}

#[derive(Clone, Debug)]
pub struct CsvCustomerStore {
    path: PathBuf,
}

impl CsvCustomerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CustomerStore for CsvCustomerStore {
    fn load(&self) -> Result<CustomerRegistry, RegistryError> {
        CustomerRegistry::from_path(&self.path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerRegistry {
    customers: Vec<CustomerRecord>,
}

impl CustomerStore for CustomerRegistry {
    fn load(&self) -> Result<CustomerRegistry, RegistryError> {
        Ok(self.clone())
    }
}

impl CustomerRegistry {
    pub fn new(customers: Vec<CustomerRecord>) -> Self {
        let mut registry = Self::default();
        for customer in customers {
            registry.upsert(customer);
        }
        registry
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let file = File::open(path).map_err(|error| RegistryError::Read {
            path: path.to_path_buf(),
            source: csv::Error::from(error),
        })?;
        Self::parse(file, path)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryError> {
        Self::parse(reader, Path::new("<reader>"))
    }

    fn parse<R: Read>(reader: R, path: &Path) -> Result<Self, RegistryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut registry = Self::default();
        for (index, row) in csv_reader.records().enumerate() {
            let row = row.map_err(|source| RegistryError::Row {
                path: path.to_path_buf(),
                row: index as u64 + 1,
                source,
            })?;

            // Short rows are ignored rather than rejected.
            if row.len() < 3 {
                continue;
            }

            let environments = row[2].split(',').map(str::trim).map(str::to_string);
            registry.upsert(CustomerRecord::new(row[0].trim(), row[1].trim(), environments));
        }

        Ok(registry)
    }

    /// Later rows for the same name replace earlier ones but keep their position.
    fn upsert(&mut self, customer: CustomerRecord) {
        match self.customers.iter_mut().find(|existing| existing.name == customer.name) {
            Some(existing) => *existing = customer,
            None => self.customers.push(customer),
        }
    }

    pub fn customers(&self) -> &[CustomerRecord] {
        &self.customers
    }

    pub fn customer_names(&self) -> Vec<String> {
        self.customers.iter().map(|customer| customer.name.clone()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&CustomerRecord> {
        self.customers.iter().find(|customer| customer.name == name)
    }

    /// Checks customer, then environment, then application, and reports the first input that
    /// fails.
    pub fn validate(
        &self,
        customer_name: &str,
        environment: &str,
        application: &str,
    ) -> Result<RestartTarget, ValidationError> {
        let customer_name = customer_name.trim();
        let environment = environment.trim();

        let customer =
            self.find(customer_name).ok_or_else(|| ValidationError::UnknownCustomer {
                customer: customer_name.to_string(),
                available: self.customer_names(),
            })?;

        if !customer.allows_environment(environment) {
            return Err(ValidationError::InvalidEnvironment {
                customer: customer.name.clone(),
                environment: environment.to_string(),
                available: customer.environments.clone(),
            });
        }

        let application = application.parse::<Application>()?;

        Ok(RestartTarget::new(customer.clone(), environment, application))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{CsvCustomerStore, CustomerRegistry, CustomerStore};
    use crate::domain::Application;
    use crate::errors::{RegistryError, ValidationError};

    const CUSTOMERS_CSV: &str = "name,code,environments\n\
        Acme Corporation,AC15,\"dv01, qa01,pr01\"\n\
        Initech,IN02,dv02\n\
        broken-row\n\
        Globex,GX07,\"uat1,prod1\"\n";

    fn registry() -> CustomerRegistry {
        CustomerRegistry::from_reader(CUSTOMERS_CSV.as_bytes()).expect("fixture parses")
    }

    #[test]
    fn parses_quoted_environment_lists_and_skips_short_rows() {
        let registry = registry();

        assert_eq!(registry.customer_names(), vec!["Acme Corporation", "Initech", "Globex"]);
        let acme = registry.find("Acme Corporation").expect("acme present");
        assert_eq!(acme.code.0, "AC15");
        assert_eq!(acme.environments, vec!["dv01", "qa01", "pr01"]);
    }

    #[test]
    fn valid_triple_produces_restart_target() {
        let target =
            registry().validate("Acme Corporation", "dv01", "cbp").expect("valid combination");

        assert_eq!(target.customer().code.0, "AC15");
        assert_eq!(target.environment(), "dv01");
        assert_eq!(target.application(), Application::Cbp);
    }

    #[test]
    fn unknown_customer_lists_every_customer() {
        let error = registry().validate("Umbrella", "dv01", "cbp").expect_err("unknown customer");

        assert!(matches!(
            error,
            ValidationError::UnknownCustomer { ref customer, .. } if customer == "Umbrella"
        ));
        assert_eq!(error.available(), ["Acme Corporation", "Initech", "Globex"]);
    }

    #[test]
    fn invalid_environment_lists_only_that_customers_environments() {
        let error =
            registry().validate("Acme Corporation", "qa99", "cbp").expect_err("bad environment");

        assert!(matches!(error, ValidationError::InvalidEnvironment { .. }));
        assert_eq!(error.available(), ["dv01", "qa01", "pr01"]);
        assert!(error.to_string().contains("Available environments: dv01, qa01, pr01"));
    }

    #[test]
    fn unknown_application_is_reported_after_customer_and_environment_pass() {
        let error =
            registry().validate("Globex", "uat1", "Billing").expect_err("unknown application");

        assert!(matches!(error, ValidationError::UnknownApplication { .. }));
        assert_eq!(error.available(), ["cbp", "Open Access", "Image Server", "Space Planning"]);
    }

    #[test]
    fn first_invalid_input_determines_the_failure() {
        let registry = registry();

        let error = registry.validate("Nobody", "qa99", "Billing").expect_err("all invalid");
        assert!(matches!(error, ValidationError::UnknownCustomer { .. }));

        let error =
            registry.validate("Initech", "qa99", "Billing").expect_err("env and app invalid");
        assert!(matches!(error, ValidationError::InvalidEnvironment { .. }));
    }

    #[test]
    fn duplicate_names_keep_the_latest_row() {
        let registry = CustomerRegistry::from_reader(
            "name,code,environments\nAcme,A1,dv01\nOther,O1,dv01\nAcme,A2,qa01\n".as_bytes(),
        )
        .expect("parses");

        assert_eq!(registry.customer_names(), vec!["Acme", "Other"]);
        assert_eq!(registry.find("Acme").map(|customer| customer.code.0.as_str()), Some("A2"));
    }

    #[test]
    fn csv_store_reads_fresh_data_on_every_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("customers.csv");
        fs::write(&path, "name,code,environments\nAcme,A1,dv01\n").expect("write fixture");

        let store = CsvCustomerStore::new(&path);
        assert_eq!(store.load().expect("first load").customer_names(), vec!["Acme"]);

        fs::write(&path, "name,code,environments\nAcme,A1,dv01\nInitech,IN02,dv02\n")
            .expect("rewrite fixture");
        assert_eq!(store.load().expect("second load").customer_names(), vec!["Acme", "Initech"]);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = CsvCustomerStore::new(dir.path().join("absent.csv"));

        assert!(matches!(store.load(), Err(RegistryError::Read { .. })));
    }
}
