//! Pipeline configuration file support
//!
//! Handles parsing of `.warehouse-etl.toml` configuration files and
//! environment variable overrides. Connection credentials are normally
//! supplied through the environment by the scheduler.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{DatabaseError, DatabaseResult};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".warehouse-etl.toml";

/// Maximum number of source tables a single extraction accepts
pub const MAX_SOURCE_TABLES: usize = 16;

/// Environment variables for the source connection
pub const ENV_SOURCE_BACKEND: &str = "SOURCE_BACKEND";
pub const ENV_SOURCE_HOST: &str = "SOURCE_HOST";
pub const ENV_SOURCE_PORT: &str = "SOURCE_PORT";
pub const ENV_SOURCE_DB: &str = "SOURCE_DB";
pub const ENV_SOURCE_USER: &str = "SOURCE_USER";
pub const ENV_SOURCE_PASSWORD: &str = "SOURCE_PASSWORD";
pub const ENV_SOURCE_DUCKDB_PATH: &str = "SOURCE_DUCKDB_PATH";

/// Environment variables for the warehouse connection
pub const ENV_DW_BACKEND: &str = "DW_BACKEND";
pub const ENV_DW_HOST: &str = "DW_HOST";
pub const ENV_DW_PORT: &str = "DW_PORT";
pub const ENV_DW_DB: &str = "DW_DB";
pub const ENV_DW_USER: &str = "DW_USER";
pub const ENV_DW_PASSWORD: &str = "DW_PASSWORD";
pub const ENV_DW_DUCKDB_PATH: &str = "DW_DUCKDB_PATH";

/// Environment variables for load tuning
pub const ENV_BATCH_SIZE: &str = "ETL_BATCH_SIZE";
pub const ENV_SAMPLE_SIZE: &str = "ETL_SAMPLE_SIZE";
pub const ENV_DATE_LOCALE: &str = "ETL_DATE_LOCALE";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*){0,2}$")
        .expect("valid qualified name regex")
});

/// Check a plain SQL identifier (schema or staging table name)
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Check a dotted SQL name such as `Sales.SalesOrderHeader`
pub fn is_qualified_name(name: &str) -> bool {
    QUALIFIED_NAME.is_match(name)
}

/// Database backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendType {
    /// PostgreSQL server (default)
    #[default]
    Postgres,
    /// DuckDB embedded database
    DuckDB,
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(DatabaseBackendType::DuckDB),
            "postgres" | "postgresql" => Ok(DatabaseBackendType::Postgres),
            _ => Err(format!(
                "Unknown database backend: {}. Use 'duckdb' or 'postgres'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::DuckDB => write!(f, "duckdb"),
            DatabaseBackendType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Connection parameters for one end of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Backend engine
    pub backend: DatabaseBackendType,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// DuckDB database file; in-memory when unset
    pub path: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            backend: DatabaseBackendType::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            database: String::new(),
            user: "postgres".to_string(),
            password: String::new(),
            path: None,
        }
    }
}

impl ConnectionSettings {
    /// DuckDB settings for a database file, or in-memory when `path` is None
    pub fn duckdb(path: Option<&str>) -> Self {
        Self {
            backend: DatabaseBackendType::DuckDB,
            path: path.map(str::to_string),
            ..Default::default()
        }
    }

    /// libpq key/value connection string
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            kv_escape(&self.host),
            self.port,
            kv_escape(&self.database),
            kv_escape(&self.user),
            kv_escape(&self.password)
        )
    }

    /// Connection string with the password masked, for logging
    pub fn connection_string_masked(&self) -> String {
        match self.backend {
            DatabaseBackendType::DuckDB => format!(
                "duckdb:{}",
                self.path.as_deref().unwrap_or(":memory:")
            ),
            DatabaseBackendType::Postgres => format!(
                "host={} port={} dbname={} user={} password=****",
                kv_escape(&self.host),
                self.port,
                kv_escape(&self.database),
                kv_escape(&self.user)
            ),
        }
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>, keys: &EnvKeys) {
        if let Some(backend) = lookup(keys.backend).and_then(|b| b.parse().ok()) {
            self.backend = backend;
        }
        if let Some(host) = lookup(keys.host) {
            self.host = host;
        }
        if let Some(port) = lookup(keys.port).and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(database) = lookup(keys.database) {
            self.database = database;
        }
        if let Some(user) = lookup(keys.user) {
            self.user = user;
        }
        if let Some(password) = lookup(keys.password) {
            self.password = password;
        }
        if let Some(path) = lookup(keys.path) {
            self.path = Some(path);
        }
    }
}

/// Quote a libpq key/value when it is empty or contains spaces or quotes
fn kv_escape(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

struct EnvKeys {
    backend: &'static str,
    host: &'static str,
    port: &'static str,
    database: &'static str,
    user: &'static str,
    password: &'static str,
    path: &'static str,
}

const SOURCE_KEYS: EnvKeys = EnvKeys {
    backend: ENV_SOURCE_BACKEND,
    host: ENV_SOURCE_HOST,
    port: ENV_SOURCE_PORT,
    database: ENV_SOURCE_DB,
    user: ENV_SOURCE_USER,
    password: ENV_SOURCE_PASSWORD,
    path: ENV_SOURCE_DUCKDB_PATH,
};

const DW_KEYS: EnvKeys = EnvKeys {
    backend: ENV_DW_BACKEND,
    host: ENV_DW_HOST,
    port: ENV_DW_PORT,
    database: ENV_DW_DB,
    user: ENV_DW_USER,
    password: ENV_DW_PASSWORD,
    path: ENV_DW_DUCKDB_PATH,
};

/// How the type inferrer picks its sample rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// First N rows of the extracted result set
    #[default]
    Prefix,
    /// Uniform reservoir sample over the whole result set
    Reservoir,
}

/// Load tuning section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSection {
    /// Rows per staging INSERT batch
    pub batch_size: usize,
    /// Maximum rows inspected by type inference
    pub sample_size: usize,
    /// Sample selection policy
    pub sampling: SamplingMethod,
    /// Seed for reservoir sampling
    pub sample_seed: u64,
    /// Schema holding staging tables
    pub staging_schema: String,
    /// Schema holding dimension and fact tables
    pub warehouse_schema: String,
}

impl Default for LoadSection {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            sample_size: 500,
            sampling: SamplingMethod::Prefix,
            sample_seed: 42,
            staging_schema: "staging".to_string(),
            warehouse_schema: "dw".to_string(),
        }
    }
}

/// Calendar dimension section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// First day of the date dimension
    pub start: NaiveDate,
    /// Last day of the date dimension (inclusive)
    pub end: NaiveDate,
    /// Locale for month and weekday names, e.g. `en_US` or `pt_BR`
    pub locale: String,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
            locale: "en_US".to_string(),
        }
    }
}

impl CalendarSection {
    /// Resolve the configured locale name
    pub fn locale(&self) -> DatabaseResult<chrono::Locale> {
        chrono::Locale::try_from(self.locale.as_str())
            .map_err(|_| DatabaseError::ConfigError(format!("Unknown locale: {}", self.locale)))
    }
}

/// Retry policy applied by the bundled runner around each unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Retries after the first failed attempt
    pub retries: u32,
    /// Fixed delay between attempts, in seconds
    pub delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            retries: 1,
            delay_secs: 300,
        }
    }
}

/// One source table and the staging table it is copied into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    /// Fully-qualified source table name
    pub source: String,
    /// Staging table name (unqualified)
    pub staging: String,
}

impl TableMapping {
    pub fn new(source: impl Into<String>, staging: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            staging: staging.into(),
        }
    }
}

/// Source tables extracted on every run
pub fn default_tables() -> Vec<TableMapping> {
    [
        ("Sales.Customer", "stg_customer"),
        ("Production.Product", "stg_product"),
        ("Production.ProductSubcategory", "stg_product_subcategory"),
        ("Production.ProductCategory", "stg_product_category"),
        ("Sales.SalesTerritory", "stg_sales_territory"),
        ("Sales.SalesPerson", "stg_sales_person"),
        ("HumanResources.Employee", "stg_employee"),
        ("Person.Person", "stg_person"),
        ("Sales.SpecialOffer", "stg_special_offer"),
        ("Sales.SpecialOfferProduct", "stg_special_offer_product"),
        ("Sales.SalesOrderHeader", "stg_sales_order_header"),
        ("Sales.SalesOrderDetail", "stg_sales_order_detail"),
    ]
    .into_iter()
    .map(|(source, staging)| TableMapping::new(source, staging))
    .collect()
}

fn default_source() -> ConnectionSettings {
    ConnectionSettings {
        database: "adventureworks".to_string(),
        ..Default::default()
    }
}

fn default_destination() -> ConnectionSettings {
    ConnectionSettings {
        database: "dw_adventureworks".to_string(),
        user: "dw_user".to_string(),
        ..Default::default()
    }
}

/// Main configuration structure
///
/// Represents the `.warehouse-etl.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Source system connection
    #[serde(default = "default_source")]
    pub source: ConnectionSettings,

    /// Warehouse connection
    #[serde(default = "default_destination")]
    pub destination: ConnectionSettings,

    /// Load tuning
    #[serde(default)]
    pub load: LoadSection,

    /// Date dimension range and locale
    #[serde(default)]
    pub calendar: CalendarSection,

    /// Retry policy for the bundled runner
    #[serde(default)]
    pub retry: RetrySection,

    /// Source to staging table map, extracted in this order
    #[serde(default = "default_tables")]
    pub tables: Vec<TableMapping>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            destination: default_destination(),
            load: LoadSection::default(),
            calendar: CalendarSection::default(),
            retry: RetrySection::default(),
            tables: default_tables(),
        }
    }
}

impl EtlConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration
    ///
    /// Reads `path` when given, otherwise `.warehouse-etl.toml` in the current
    /// directory if present, otherwise defaults. Environment overrides are
    /// applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> DatabaseResult<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(CONFIG_FILENAME).exists() => Self::read(Path::new(CONFIG_FILENAME))?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn read(path: &Path) -> DatabaseResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DatabaseError::IoError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> DatabaseResult<Self> {
        toml::from_str(content)
            .map_err(|e| DatabaseError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> DatabaseResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DatabaseError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.source.apply_overrides(&lookup, &SOURCE_KEYS);
        self.destination.apply_overrides(&lookup, &DW_KEYS);

        if let Some(size) = lookup(ENV_BATCH_SIZE).and_then(|s| s.parse().ok()) {
            self.load.batch_size = size;
        }
        if let Some(size) = lookup(ENV_SAMPLE_SIZE).and_then(|s| s.parse().ok()) {
            self.load.sample_size = size;
        }
        if let Some(locale) = lookup(ENV_DATE_LOCALE) {
            self.calendar.locale = locale;
        }
    }

    /// Check the configuration for values the loaders cannot work with
    pub fn validate(&self) -> DatabaseResult<()> {
        if self.load.batch_size == 0 {
            return Err(DatabaseError::ConfigError(
                "load.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.load.sample_size == 0 {
            return Err(DatabaseError::ConfigError(
                "load.sample_size must be greater than zero".to_string(),
            ));
        }
        for schema in [&self.load.staging_schema, &self.load.warehouse_schema] {
            if !is_identifier(schema) {
                return Err(DatabaseError::ConfigError(format!(
                    "Invalid schema name: {}",
                    schema
                )));
            }
        }
        if self.tables.len() > MAX_SOURCE_TABLES {
            return Err(DatabaseError::ConfigError(format!(
                "{} source tables configured, at most {} are supported",
                self.tables.len(),
                MAX_SOURCE_TABLES
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for table in &self.tables {
            if !is_qualified_name(&table.source) {
                return Err(DatabaseError::ConfigError(format!(
                    "Invalid source table name: {}",
                    table.source
                )));
            }
            if !is_identifier(&table.staging) {
                return Err(DatabaseError::ConfigError(format!(
                    "Invalid staging table name: {}",
                    table.staging
                )));
            }
            if !seen.insert(table.staging.to_lowercase()) {
                return Err(DatabaseError::ConfigError(format!(
                    "Staging table {} is mapped more than once",
                    table.staging
                )));
            }
        }
        // Every task opens its own connection, so an in-memory warehouse
        // would be empty again by the next task
        if self.destination.backend == DatabaseBackendType::DuckDB
            && self.destination.path.as_deref().is_none_or(str::is_empty)
        {
            return Err(DatabaseError::ConfigError(
                "destination.path is required for a DuckDB warehouse".to_string(),
            ));
        }
        if self.calendar.start > self.calendar.end {
            return Err(DatabaseError::ConfigError(format!(
                "calendar.start {} is after calendar.end {}",
                self.calendar.start, self.calendar.end
            )));
        }
        self.calendar.locale()?;
        Ok(())
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# warehouse-etl configuration
# Credentials are usually injected through the environment
# (SOURCE_HOST, SOURCE_DB, SOURCE_USER, SOURCE_PASSWORD,
#  DW_HOST, DW_DB, DW_USER, DW_PASSWORD).

[source]
# "postgres" (default) or "duckdb"
backend = "postgres"
host = "localhost"
port = 5432
database = "adventureworks"
user = "postgres"

[destination]
backend = "postgres"
host = "localhost"
port = 5432
database = "dw_adventureworks"
user = "dw_user"
# path = "warehouse.duckdb"   # required when backend = "duckdb"

[load]
batch_size = 1000
sample_size = 500
# "prefix" (first rows) or "reservoir"
sampling = "prefix"
staging_schema = "staging"
warehouse_schema = "dw"

[calendar]
start = "2008-01-01"
end = "2025-12-31"
locale = "en_US"

[retry]
retries = 1
delay_secs = 300

[[tables]]
source = "Sales.Customer"
staging = "stg_customer"

[[tables]]
source = "Person.Person"
staging = "stg_person"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EtlConfig::new();
        assert_eq!(config.source.backend, DatabaseBackendType::Postgres);
        assert_eq!(config.destination.database, "dw_adventureworks");
        assert_eq!(config.load.batch_size, 1000);
        assert_eq!(config.load.sample_size, 500);
        assert_eq!(config.tables.len(), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let toml = r#"
[destination]
backend = "duckdb"
path = "warehouse.duckdb"

[load]
batch_size = 250
"#;
        let config = EtlConfig::parse(toml).unwrap();
        assert_eq!(config.destination.backend, DatabaseBackendType::DuckDB);
        assert_eq!(config.destination.path.as_deref(), Some("warehouse.duckdb"));
        assert_eq!(config.load.batch_size, 250);
        assert_eq!(config.load.sample_size, 500);
        assert_eq!(config.source.database, "adventureworks");
        assert_eq!(config.tables, default_tables());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SOURCE_HOST, "mssql"),
            (ENV_SOURCE_PASSWORD, "Strong!Passw0rd"),
            (ENV_DW_HOST, "adventureworks_dw"),
            (ENV_DW_PORT, "6543"),
            (ENV_DW_BACKEND, "duckdb"),
            (ENV_DW_DUCKDB_PATH, "warehouse.duckdb"),
            (ENV_BATCH_SIZE, "50"),
            (ENV_DATE_LOCALE, "pt_BR"),
        ]);
        let mut config = EtlConfig::new();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.source.host, "mssql");
        assert_eq!(config.source.password, "Strong!Passw0rd");
        assert_eq!(config.destination.host, "adventureworks_dw");
        assert_eq!(config.destination.port, 6543);
        assert_eq!(config.destination.backend, DatabaseBackendType::DuckDB);
        assert_eq!(config.load.batch_size, 50);
        assert_eq!(config.calendar.locale, "pt_BR");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparsable_override_is_ignored() {
        let mut config = EtlConfig::new();
        config.apply_overrides(|key| (key == ENV_DW_PORT).then(|| "not-a-port".to_string()));
        assert_eq!(config.destination.port, 5432);
    }

    #[test]
    fn test_connection_string_masks_password() {
        let settings = ConnectionSettings {
            password: "s3cret".to_string(),
            database: "dw".to_string(),
            ..Default::default()
        };
        assert!(settings.connection_string().contains("password=s3cret"));
        let masked = settings.connection_string_masked();
        assert!(!masked.contains("s3cret"));
        assert!(masked.contains("password=****"));
    }

    #[test]
    fn test_connection_string_quotes_values() {
        let settings = ConnectionSettings {
            password: "it's secret".to_string(),
            ..Default::default()
        };
        assert!(
            settings
                .connection_string()
                .contains(r"password='it\'s secret'")
        );
        assert!(settings.connection_string().contains("dbname=''"));
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut config = EtlConfig::new();
        config.tables = vec![TableMapping::new("Sales.Customer; DROP TABLE x", "stg_x")];
        assert!(config.validate().is_err());

        let mut config = EtlConfig::new();
        config.tables = vec![
            TableMapping::new("Sales.Customer", "stg_customer"),
            TableMapping::new("Sales.Store", "STG_CUSTOMER"),
        ];
        assert!(config.validate().is_err());

        let mut config = EtlConfig::new();
        config.tables = (0..17)
            .map(|i| TableMapping::new(format!("dbo.t{}", i), format!("stg_{}", i)))
            .collect();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_calendar() {
        let mut config = EtlConfig::new();
        config.calendar.start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_in_memory_warehouse() {
        let mut config = EtlConfig::new();
        config.destination = ConnectionSettings::duckdb(None);
        assert!(matches!(
            config.validate(),
            Err(DatabaseError::ConfigError(msg)) if msg.contains("destination.path")
        ));

        config.destination = ConnectionSettings::duckdb(Some(""));
        assert!(config.validate().is_err());

        config.destination = ConnectionSettings::duckdb(Some("warehouse.duckdb"));
        config.source = ConnectionSettings::duckdb(None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_locale() {
        let mut config = EtlConfig::new();
        config.calendar.locale = "xx_NOPE".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etl.toml");
        std::fs::write(&path, "[load]\nsample_size = 100\n").unwrap();

        let config = EtlConfig::load(Some(&path)).unwrap();
        assert_eq!(config.load.sample_size, 100);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            EtlConfig::load(Some(&missing)),
            Err(DatabaseError::IoError(_))
        ));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = EtlConfig::parse(sample_config()).expect("sample config should parse");
        assert_eq!(config.tables.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_round_trips_through_parse() {
        let config = EtlConfig::new();
        let toml = config.to_toml().unwrap();
        let parsed = EtlConfig::parse(&toml).unwrap();
        assert_eq!(parsed.tables, config.tables);
        assert_eq!(parsed.calendar.end, config.calendar.end);
    }

    #[test]
    fn test_identifier_checks() {
        assert!(is_identifier("stg_customer"));
        assert!(!is_identifier("stg customer"));
        assert!(is_qualified_name("Sales.SalesOrderHeader"));
        assert!(is_qualified_name("AdventureWorks.Sales.Customer"));
        assert!(!is_qualified_name("Sales..Customer"));
    }
}
