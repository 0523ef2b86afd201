//! Process configuration. Precedence: CLI > environment > config file > defaults.

use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::DbError;
use crate::registry::{TableRegistry, TableSpec};

pub const DEFAULT_CONFIG_FILE: &str = "campusdb.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("campus.db"), in_memory: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
    /// A log4rs YAML file; when set it replaces the built-in appenders.
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { slow_query_ms: 500 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub allow_any_table: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub defaults: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub registry: RegistryConfig,
    pub tables: BTreeMap<String, TableConfig>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub bind: Option<String>,
}

/// Loads configuration using the process environment.
///
/// # Errors
/// See [`load_config_with`].
pub fn load_config(overrides: &Overrides) -> Result<AppConfig, DbError> {
    load_config_with(overrides, |key| std::env::var(key).ok())
}

/// Loads configuration with `env` as the environment lookup.
///
/// The file is `overrides.config`, else `CAMPUSDB_CONFIG`, else `./campusdb.toml` when it
/// exists. An explicitly named file must exist.
///
/// # Errors
/// Returns `DbError::Config` if an explicit file is missing or any file fails to parse.
pub fn load_config_with<F>(overrides: &Overrides, env: F) -> Result<AppConfig, DbError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = overrides.config.clone().or_else(|| env("CAMPUSDB_CONFIG").map(PathBuf::from));
    let mut cfg = match explicit {
        Some(path) => read_file(&path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() { read_file(fallback)? } else { AppConfig::default() }
        }
    };

    if let Some(bind) = env("CAMPUSDB_BIND") {
        cfg.server.bind = bind;
    }
    if let Some(db) = env("CAMPUSDB_DB") {
        cfg.storage.path = PathBuf::from(db);
    }
    if let Some(dir) = env("CAMPUSDB_LOG_DIR") {
        cfg.logging.dir = Some(PathBuf::from(dir));
    }
    if let Some(level) = env("CAMPUSDB_LOG_LEVEL") {
        cfg.logging.level = Some(level);
    }
    if let Some(retention) = env("CAMPUSDB_LOG_RETENTION") {
        match retention.parse::<usize>() {
            Ok(n) => cfg.logging.retention = Some(n),
            Err(e) => log::warn!("ignoring CAMPUSDB_LOG_RETENTION={retention:?}: {e}"),
        }
    }

    if let Some(db) = &overrides.db {
        cfg.storage.path.clone_from(db);
    }
    if let Some(bind) = &overrides.bind {
        cfg.server.bind.clone_from(bind);
    }
    Ok(cfg)
}

fn read_file(path: &Path) -> Result<AppConfig, DbError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str::<AppConfig>(&text).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
}

impl AppConfig {
    /// Table registry for this configuration; the default table set when none are listed.
    ///
    /// # Errors
    /// Returns `DbError::InvalidTable` for a malformed table name.
    pub fn table_registry(&self) -> Result<TableRegistry, DbError> {
        let allow_any = self.registry.allow_any_table;
        if self.tables.is_empty() {
            return Ok(TableRegistry::with_default_tables(allow_any));
        }
        let mut reg = TableRegistry::new(allow_any);
        for (name, table) in &self.tables {
            reg.register(name, TableSpec { defaults: toml_table_to_bson(&table.defaults) })?;
        }
        Ok(reg)
    }
}

fn toml_table_to_bson(table: &toml::Table) -> BsonDocument {
    table.iter().map(|(k, v)| (k.clone(), toml_to_bson(v))).collect()
}

fn toml_to_bson(value: &toml::Value) -> Bson {
    match value {
        toml::Value::String(s) => Bson::String(s.clone()),
        toml::Value::Integer(i) => i32::try_from(*i).map_or(Bson::Int64(*i), Bson::Int32),
        toml::Value::Float(f) => Bson::Double(*f),
        toml::Value::Boolean(b) => Bson::Boolean(*b),
        toml::Value::Datetime(dt) => Bson::String(dt.to_string()),
        toml::Value::Array(items) => Bson::Array(items.iter().map(toml_to_bson).collect()),
        toml::Value::Table(t) => Bson::Document(toml_table_to_bson(t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let cfg = load_config_with(&Overrides { config: Some(path), ..Overrides::default() }, env_of(&[])).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert_eq!(cfg.telemetry.slow_query_ms, 500);
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0:1\"\n[storage]\npath = \"file.db\"\n").unwrap();
        let env = env_of(&[("CAMPUSDB_CONFIG", path.to_str().unwrap()), ("CAMPUSDB_BIND", "0.0.0.0:2"), ("CAMPUSDB_DB", "env.db")]);

        let cfg = load_config_with(&Overrides::default(), &env).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:2");
        assert_eq!(cfg.storage.path, PathBuf::from("env.db"));

        let cli = Overrides { db: Some("cli.db".into()), bind: Some("0.0.0.0:3".into()), ..Overrides::default() };
        let cfg = load_config_with(&cli, &env).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:3");
        assert_eq!(cfg.storage.path, PathBuf::from("cli.db"));
    }

    #[test]
    fn missing_or_broken_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Overrides { config: Some(dir.path().join("nope.toml")), ..Overrides::default() };
        assert!(matches!(load_config_with(&missing, env_of(&[])), Err(DbError::Config(_))));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[server\n").unwrap();
        let o = Overrides { config: Some(broken), ..Overrides::default() };
        assert!(matches!(load_config_with(&o, env_of(&[])), Err(DbError::Config(_))));
    }

    #[test]
    fn tables_and_defaults_from_toml() {
        let cfg: AppConfig = toml::from_str(
            "[registry]\nallow_any_table = false\n[tables.news.defaults]\npublished = false\npriority = 3\n[tables.events]\n",
        )
        .unwrap();
        let reg = cfg.table_registry().unwrap();
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["events", "news"]);
        assert_eq!(reg.resolve("news").unwrap(), doc! {"published": false, "priority": 3});
        assert!(reg.resolve("students").is_err());

        let bad: AppConfig = toml::from_str("[tables.Bad]\n").unwrap();
        assert!(matches!(bad.table_registry(), Err(DbError::InvalidTable(_))));
    }

    #[test]
    fn no_tables_means_default_set() {
        let reg = AppConfig::default().table_registry().unwrap();
        assert!(reg.resolve("students").is_ok());
        assert!(reg.resolve("testimonials").is_ok());
    }
}
