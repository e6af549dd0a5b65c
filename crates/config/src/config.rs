//! Core configuration structures and loading logic

use crate::base_path::BasePath;
use crate::secret::{generate_secret, Secret};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Character sets the database layer accepts for `db_charset`
pub const KNOWN_CHARSETS: &[&str] = &[
    "utf8mb4", "utf8mb3", "utf8", "latin1", "ascii", "binary", "ucs2", "utf16", "utf32",
];

/// Charset used when none is configured
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Field name and environment variable of every key/salt, in declaration order
pub const SECRET_SETTINGS: [(&str, &str); 8] = [
    ("auth_key", "AUTH_KEY"),
    ("secure_auth_key", "SECURE_AUTH_KEY"),
    ("logged_in_key", "LOGGED_IN_KEY"),
    ("nonce_key", "NONCE_KEY"),
    ("auth_salt", "AUTH_SALT"),
    ("secure_auth_salt", "SECURE_AUTH_SALT"),
    ("logged_in_salt", "LOGGED_IN_SALT"),
    ("nonce_salt", "NONCE_SALT"),
];

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or empty
    #[error("Missing required setting: {field}")]
    MissingField { field: &'static str },

    /// A setting is present but malformed
    #[error("Invalid value for {field}: {reason}")]
    InvalidFormat { field: &'static str, reason: String },

    /// The base path was already defined with a different value
    #[error(
        "Base path already defined as '{}', refusing to redefine it as '{}'",
        .existing.display(),
        .requested.display()
    )]
    PathConflict { existing: PathBuf, requested: PathBuf },

    /// IO error reading a config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Malformed `.env` file
    #[error("Failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigError {
    /// Name of the setting the error refers to, when there is one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField { field } | ConfigError::InvalidFormat { field, .. } => {
                Some(*field)
            }
            ConfigError::PathConflict { .. } => Some("base_path"),
            _ => None,
        }
    }
}

/// Database section as read from a file, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawDatabaseConfig {
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub charset: Option<String>,
    pub collate: Option<String>,
}

/// Keys and salts as read from a file, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawSecretKeys {
    pub auth_key: Option<String>,
    pub secure_auth_key: Option<String>,
    pub logged_in_key: Option<String>,
    pub nonce_key: Option<String>,
    pub auth_salt: Option<String>,
    pub secure_auth_salt: Option<String>,
    pub logged_in_salt: Option<String>,
    pub nonce_salt: Option<String>,
}

impl RawSecretKeys {
    fn slots_mut(&mut self) -> [&mut Option<String>; 8] {
        [
            &mut self.auth_key,
            &mut self.secure_auth_key,
            &mut self.logged_in_key,
            &mut self.nonce_key,
            &mut self.auth_salt,
            &mut self.secure_auth_salt,
            &mut self.logged_in_salt,
            &mut self.nonce_salt,
        ]
    }
}

/// Unvalidated settings, every field optional
///
/// File and environment sources are merged into this before
/// [`RawInstallationConfig::finalize`] turns it into an [`InstallationConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawInstallationConfig {
    pub database: RawDatabaseConfig,
    pub secrets: RawSecretKeys,
    pub table_prefix: Option<String>,
    pub debug: Option<bool>,
    pub base_path: Option<PathBuf>,
}

impl RawInstallationConfig {
    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawInstallationConfig = toml::from_str(content)?;
        Ok(raw)
    }

    /// Apply overrides from the process environment
    ///
    /// See [`RawInstallationConfig::apply_overrides`] for the variable names.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    ///
    /// A variable that is set replaces the current value, even when empty:
    /// - DB_NAME, DB_USER, DB_PASSWORD, DB_HOST, DB_CHARSET, DB_COLLATE -> database.*
    /// - AUTH_KEY, SECURE_AUTH_KEY, LOGGED_IN_KEY, NONCE_KEY -> secrets.*
    /// - AUTH_SALT, SECURE_AUTH_SALT, LOGGED_IN_SALT, NONCE_SALT -> secrets.*
    /// - TABLE_PREFIX -> table_prefix
    /// - WP_DEBUG -> debug (empty means unset)
    /// - ABSPATH -> base_path (empty means unset)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;
        for (slot, key) in [
            (&mut db.name, "DB_NAME"),
            (&mut db.user, "DB_USER"),
            (&mut db.password, "DB_PASSWORD"),
            (&mut db.host, "DB_HOST"),
            (&mut db.charset, "DB_CHARSET"),
            (&mut db.collate, "DB_COLLATE"),
        ] {
            if let Some(val) = lookup(key) {
                *slot = Some(val);
            }
        }

        for (slot, (_, key)) in self.secrets.slots_mut().into_iter().zip(SECRET_SETTINGS) {
            if let Some(val) = lookup(key) {
                *slot = Some(val);
            }
        }

        if let Some(val) = lookup("TABLE_PREFIX") {
            self.table_prefix = Some(val);
        }

        if let Some(val) = lookup("WP_DEBUG") {
            if !val.is_empty() {
                self.debug = Some(parse_bool("debug_enabled", &val)?);
            }
        }

        if let Some(val) = lookup("ABSPATH") {
            if !val.is_empty() {
                self.base_path = Some(PathBuf::from(val));
            }
        }

        Ok(())
    }

    /// Validate and build the immutable configuration
    ///
    /// Required settings are checked in declaration order, so the first
    /// missing one is the one reported.
    pub fn finalize(self) -> Result<InstallationConfig, ConfigError> {
        let db = self.database;
        let database = DatabaseConfig {
            name: required("db_name", db.name)?,
            user: required("db_user", db.user)?,
            password: Secret::new(required("db_password", db.password)?),
            host: required("db_host", db.host)?,
            charset: validate_charset(db.charset)?,
            collate: db.collate.unwrap_or_default(),
        };

        let s = self.secrets;
        let secrets = SecretKeys {
            auth_key: required_secret("auth_key", s.auth_key)?,
            secure_auth_key: required_secret("secure_auth_key", s.secure_auth_key)?,
            logged_in_key: required_secret("logged_in_key", s.logged_in_key)?,
            nonce_key: required_secret("nonce_key", s.nonce_key)?,
            auth_salt: required_secret("auth_salt", s.auth_salt)?,
            secure_auth_salt: required_secret("secure_auth_salt", s.secure_auth_salt)?,
            logged_in_salt: required_secret("logged_in_salt", s.logged_in_salt)?,
            nonce_salt: required_secret("nonce_salt", s.nonce_salt)?,
        };

        let table_prefix = required("table_prefix", self.table_prefix)?;
        validate_table_prefix(&table_prefix)?;

        let base_path = BasePath::new();
        if let Some(path) = self.base_path {
            base_path.define(&path)?;
        }

        Ok(InstallationConfig {
            database,
            secrets,
            table_prefix,
            debug_enabled: self.debug.unwrap_or(false),
            base_path,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: Secret,
    pub host: String,
    pub charset: String,
    /// Empty means the charset's default collation
    pub collate: String,
}

/// Authentication keys and salts
#[derive(Debug, Clone, PartialEq)]
pub struct SecretKeys {
    pub auth_key: Secret,
    pub secure_auth_key: Secret,
    pub logged_in_key: Secret,
    pub nonce_key: Secret,
    pub auth_salt: Secret,
    pub secure_auth_salt: Secret,
    pub logged_in_salt: Secret,
    pub nonce_salt: Secret,
}

impl SecretKeys {
    /// Generate a fresh set of keys and salts, `len` characters each
    pub fn generate(len: usize) -> Self {
        Self {
            auth_key: generate_secret(len),
            secure_auth_key: generate_secret(len),
            logged_in_key: generate_secret(len),
            nonce_key: generate_secret(len),
            auth_salt: generate_secret(len),
            secure_auth_salt: generate_secret(len),
            logged_in_salt: generate_secret(len),
            nonce_salt: generate_secret(len),
        }
    }

    /// Every value with its field name and environment variable
    pub fn entries(&self) -> [(&'static str, &'static str, &Secret); 8] {
        let values = [
            &self.auth_key,
            &self.secure_auth_key,
            &self.logged_in_key,
            &self.nonce_key,
            &self.auth_salt,
            &self.secure_auth_salt,
            &self.logged_in_salt,
            &self.nonce_salt,
        ];
        std::array::from_fn(|i| {
            let (field, key) = SECRET_SETTINGS[i];
            (field, key, values[i])
        })
    }
}

/// Fully validated installation settings
///
/// Built once at startup and never mutated afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationConfig {
    pub database: DatabaseConfig,
    pub secrets: SecretKeys,
    pub table_prefix: String,
    pub debug_enabled: bool,
    base_path: BasePath,
}

impl InstallationConfig {
    /// Load configuration from the process environment only
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load configuration from a variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = RawInstallationConfig::default();
        raw.apply_overrides(lookup)?;
        raw.finalize()
    }

    /// Load configuration from file and apply environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut raw = RawInstallationConfig::load_from_file(path)?;
        raw.apply_env_overrides()?;
        raw.finalize()
    }

    /// The installation directory, once defined
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.get()
    }

    /// Whether the base path came from outside (ABSPATH or the config file)
    /// or an earlier resolution
    pub fn base_path_defined(&self) -> bool {
        self.base_path.is_defined()
    }

    /// Define the base path as the directory containing the configuration artifact
    ///
    /// Calling it again with an artifact in the same directory is a no-op;
    /// a different directory fails with `PathConflict`.
    pub fn resolve_base_path(&self, artifact_location: &Path) -> Result<&Path, ConfigError> {
        self.base_path.resolve(artifact_location)
    }
}

/// Load a `.env` file into the process environment
///
/// Variables that are already set keep their value. Returns `false` when the
/// file does not exist.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<bool, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    dotenvy::from_path(path)?;
    Ok(true)
}

/// Load a `.env` file that must exist
///
/// Unlike [`load_env_file`], a missing file is an error.
pub fn require_env_file<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if !load_env_file(path)? {
        return Err(ConfigError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("env file not found: {}", path.display()),
        )));
    }
    Ok(())
}

/// Check a table prefix against `[A-Za-z0-9_]+`
pub fn validate_table_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::MissingField {
            field: "table_prefix",
        });
    }

    if let Some(bad) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ConfigError::InvalidFormat {
            field: "table_prefix",
            reason: format!(
                "'{}' contains {:?}; only letters, digits and underscores are allowed",
                prefix, bad
            ),
        });
    }

    Ok(())
}

fn validate_charset(charset: Option<String>) -> Result<String, ConfigError> {
    let charset = match charset {
        Some(c) if !c.is_empty() => c,
        _ => return Ok(DEFAULT_CHARSET.to_string()),
    };

    if KNOWN_CHARSETS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(&charset))
    {
        Ok(charset)
    } else {
        Err(ConfigError::InvalidFormat {
            field: "db_charset",
            reason: format!(
                "unknown charset '{}'; expected one of {}",
                charset,
                KNOWN_CHARSETS.join(", ")
            ),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField { field }),
    }
}

fn required_secret(field: &'static str, value: Option<String>) -> Result<Secret, ConfigError> {
    required(field, value).map(Secret::new)
}

// Accept "true", "1", "yes", "on" as true; "false", "0", "no", "off" as false
fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFormat {
            field,
            reason: format!("'{}' is not a boolean", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 17] = [
        "DB_NAME",
        "DB_USER",
        "DB_PASSWORD",
        "DB_HOST",
        "DB_CHARSET",
        "DB_COLLATE",
        "AUTH_KEY",
        "SECURE_AUTH_KEY",
        "LOGGED_IN_KEY",
        "NONCE_KEY",
        "AUTH_SALT",
        "SECURE_AUTH_SALT",
        "LOGGED_IN_SALT",
        "NONCE_SALT",
        "TABLE_PREFIX",
        "WP_DEBUG",
        "ABSPATH",
    ];

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        for key in ALL_VARS {
            env::remove_var(key);
        }
    }

    fn secret_value(i: usize) -> String {
        // 64 characters, distinct per index
        format!("{:02}{}", i, "k".repeat(62))
    }

    /// The installation used as the reference scenario
    fn scenario_vars() -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("DB_NAME", "Prunn"),
            ("DB_USER", "root"),
            ("DB_PASSWORD", "usuario@1"),
            ("DB_HOST", "10.0.2.110"),
            ("TABLE_PREFIX", "wp_valles"),
            ("WP_DEBUG", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (i, (_, key)) in SECRET_SETTINGS.iter().enumerate() {
            vars.insert(key.to_string(), secret_value(i));
        }
        vars
    }

    fn load_from_map(vars: &HashMap<String, String>) -> Result<InstallationConfig, ConfigError> {
        InstallationConfig::load_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_scenario_loads() {
        let config = load_from_map(&scenario_vars()).expect("scenario should load");

        assert_eq!(config.database.name, "Prunn");
        assert_eq!(config.database.user, "root");
        assert_eq!(config.database.password.expose(), "usuario@1");
        assert_eq!(config.database.host, "10.0.2.110");
        assert_eq!(config.database.charset, "utf8mb4");
        assert_eq!(config.database.collate, "");
        assert_eq!(config.table_prefix, "wp_valles");
        assert!(!config.debug_enabled);
        assert_eq!(config.base_path(), None);
    }

    #[test]
    fn test_scenario_hyphenated_prefix_rejected() {
        let mut vars = scenario_vars();
        vars.insert("TABLE_PREFIX".into(), "wp-valles".into());

        let err = load_from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { field: "table_prefix", .. }));
    }

    #[test]
    fn test_scenario_missing_password() {
        let mut vars = scenario_vars();
        vars.remove("DB_PASSWORD");

        let err = load_from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "db_password" }));
        assert_eq!(err.field(), Some("db_password"));
        assert!(err.to_string().contains("db_password"));
    }

    #[test]
    fn test_every_required_field_reported_when_absent_or_empty() {
        let required = [
            ("DB_NAME", "db_name"),
            ("DB_USER", "db_user"),
            ("DB_PASSWORD", "db_password"),
            ("DB_HOST", "db_host"),
            ("TABLE_PREFIX", "table_prefix"),
        ]
        .into_iter()
        .chain(SECRET_SETTINGS.iter().map(|(field, key)| (*key, *field)));

        for (key, field) in required {
            let mut vars = scenario_vars();
            vars.remove(key);
            match load_from_map(&vars) {
                Err(ConfigError::MissingField { field: f }) => assert_eq!(f, field),
                other => panic!("absent {}: expected MissingField, got {:?}", key, other),
            }

            vars.insert(key.to_string(), String::new());
            match load_from_map(&vars) {
                Err(ConfigError::MissingField { field: f }) => assert_eq!(f, field),
                other => panic!("empty {}: expected MissingField, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_charset_validation() {
        let mut vars = scenario_vars();
        vars.insert("DB_CHARSET".into(), "UTF8MB4".into());
        assert_eq!(load_from_map(&vars).unwrap().database.charset, "UTF8MB4");

        vars.insert("DB_CHARSET".into(), "klingon".into());
        let err = load_from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { field: "db_charset", .. }));

        vars.insert("DB_CHARSET".into(), String::new());
        assert_eq!(load_from_map(&vars).unwrap().database.charset, DEFAULT_CHARSET);
    }

    #[test]
    fn test_collate_kept_verbatim() {
        let mut vars = scenario_vars();
        vars.insert("DB_COLLATE".into(), "utf8mb4_unicode_ci".into());
        assert_eq!(load_from_map(&vars).unwrap().database.collate, "utf8mb4_unicode_ci");
    }

    #[test]
    fn test_debug_flag_parsing() {
        let mut vars = scenario_vars();
        for (raw, expected) in [("true", true), ("1", true), ("ON", true), ("no", false)] {
            vars.insert("WP_DEBUG".into(), raw.into());
            assert_eq!(load_from_map(&vars).unwrap().debug_enabled, expected, "{}", raw);
        }

        vars.insert("WP_DEBUG".into(), "maybe".into());
        let err = load_from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { field: "debug_enabled", .. }));

        vars.remove("WP_DEBUG");
        assert!(!load_from_map(&vars).unwrap().debug_enabled);
    }

    #[test]
    fn test_empty_debug_flag_is_unset() {
        let mut vars = scenario_vars();
        vars.insert("WP_DEBUG".into(), String::new());
        assert!(!load_from_map(&vars).unwrap().debug_enabled);

        // An empty override keeps the value from the file
        let mut raw = RawInstallationConfig::parse_toml("debug = true\n").unwrap();
        raw.apply_overrides(|key| match key {
            "WP_DEBUG" => Some(String::new()),
            _ => vars.get(key).cloned(),
        })
        .unwrap();
        assert_eq!(raw.debug, Some(true));
        assert!(raw.finalize().unwrap().debug_enabled);
    }

    #[test]
    fn test_abspath_defines_base_path() {
        let mut vars = scenario_vars();
        vars.insert("ABSPATH".into(), "/var/www/html".into());
        let config = load_from_map(&vars).unwrap();

        assert_eq!(config.base_path(), Some(Path::new("/var/www/html")));
        assert!(config.base_path_defined());
        // Same directory again is a no-op
        config
            .resolve_base_path(Path::new("/var/www/html/wp-config.toml"))
            .unwrap();
        let err = config
            .resolve_base_path(Path::new("/etc/wordpress/wp-config.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::PathConflict { .. }));
    }

    #[test]
    fn test_relative_abspath_rejected() {
        let mut vars = scenario_vars();
        vars.insert("ABSPATH".into(), "html".into());
        let err = load_from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { field: "base_path", .. }));
    }

    #[test]
    fn test_secret_entries_follow_declaration_order() {
        let config = load_from_map(&scenario_vars()).unwrap();
        let entries = config.secrets.entries();

        assert_eq!(entries[0].0, "auth_key");
        assert_eq!(entries[7].1, "NONCE_SALT");
        for (i, (_, _, value)) in entries.iter().enumerate() {
            assert_eq!(value.expose(), secret_value(i));
        }
    }

    #[test]
    fn test_generated_secret_keys_are_distinct() {
        let keys = SecretKeys::generate(64);
        let values: Vec<&str> = keys.entries().iter().map(|(_, _, v)| v.expose()).collect();
        for (i, a) in values.iter().enumerate() {
            assert_eq!(a.chars().count(), 64);
            for b in &values[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = load_from_map(&scenario_vars()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("usuario@1"));
        assert!(!debug.contains(&secret_value(0)));
        assert!(debug.contains("Prunn"));
    }

    #[test]
    fn test_parse_toml_file() {
        let toml_str = r#"
table_prefix = "wp_valles"
debug = true
base_path = "/srv/wordpress"

[database]
name = "Prunn"
user = "root"
password = "usuario@1"
host = "10.0.2.110"
charset = "utf8mb4"
collate = ""

[secrets]
auth_key = "a"
secure_auth_key = "b"
logged_in_key = "c"
nonce_key = "d"
auth_salt = "e"
secure_auth_salt = "f"
logged_in_salt = "g"
nonce_salt = "h"
"#;
        let config = RawInstallationConfig::parse_toml(toml_str)
            .expect("Valid TOML should parse")
            .finalize()
            .expect("Complete config should validate");

        assert_eq!(config.database.name, "Prunn");
        assert_eq!(config.secrets.nonce_salt.expose(), "h");
        assert!(config.debug_enabled);
        assert_eq!(config.base_path(), Some(Path::new("/srv/wordpress")));
    }

    #[test]
    fn test_parse_toml_rejects_unknown_keys() {
        let result = RawInstallationConfig::parse_toml("[database]\nport = 3306\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_toml_reports_first_missing_field() {
        let raw = RawInstallationConfig::parse_toml("").expect("Empty TOML should parse");
        assert_eq!(raw, RawInstallationConfig::default());
        let err = raw.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "db_name" }));
    }

    #[test]
    fn test_file_values_overridden_by_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wp-config.toml");
        let mut content = String::from(
            "table_prefix = \"wp_\"\n[database]\nname = \"file_db\"\nuser = \"u\"\npassword = \"p\"\nhost = \"localhost\"\n[secrets]\n",
        );
        for (i, (field, _)) in SECRET_SETTINGS.iter().enumerate() {
            content.push_str(&format!("{} = \"{}\"\n", field, secret_value(i)));
        }
        fs::write(&path, content).unwrap();

        env::set_var("DB_NAME", "env_db");
        env::set_var("TABLE_PREFIX", "wp_env_");
        let result = InstallationConfig::load_from_file(&path);
        clear_env_vars();

        let config = result.expect("file plus env should load");
        assert_eq!(config.database.name, "env_db");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.table_prefix, "wp_env_");
    }

    #[test]
    fn test_load_from_process_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        for (key, value) in scenario_vars() {
            env::set_var(key, value);
        }
        let result = InstallationConfig::load();
        clear_env_vars();

        let config = result.expect("env should load");
        assert_eq!(config.database.name, "Prunn");
        assert_eq!(config.table_prefix, "wp_valles");
    }

    #[test]
    fn test_env_file_does_not_override_existing_vars() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "DB_NAME='from_file'\nDB_HOST='db.internal'\n").unwrap();

        env::set_var("DB_NAME", "from_env");
        let loaded = load_env_file(&path);
        let name = env::var("DB_NAME");
        let host = env::var("DB_HOST");
        clear_env_vars();

        assert!(loaded.unwrap());
        assert_eq!(name.unwrap(), "from_env");
        assert_eq!(host.unwrap(), "db.internal");
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = load_env_file(temp_dir.path().join(".env")).unwrap();
        assert!(!loaded);
    }

    #[test]
    fn test_required_env_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let err = require_env_file(temp_dir.path().join("site.env")).unwrap_err();
        match err {
            ConfigError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_valid_table_prefix_accepted(prefix in "[A-Za-z0-9_]{1,32}") {
            prop_assert!(validate_table_prefix(&prefix).is_ok());
        }

        #[test]
        fn prop_table_prefix_with_punctuation_rejected(
            head in "[A-Za-z0-9_]{0,10}",
            bad in "[- .!@#$%^&*()+=/;:,]",
            tail in "[A-Za-z0-9_]{0,10}",
        ) {
            let prefix = format!("{}{}{}", head, bad, tail);
            let is_invalid = matches!(
                validate_table_prefix(&prefix),
                Err(ConfigError::InvalidFormat { field: "table_prefix", .. })
            );
            prop_assert!(is_invalid, "'{}' should be rejected", prefix);
        }

        #[test]
        fn prop_load_returns_inputs_unchanged(
            name in "[A-Za-z0-9@#._ -]{1,40}",
            user in "[A-Za-z0-9@#._ -]{1,40}",
            password in "[A-Za-z0-9@#._ -]{1,64}",
            host in "[a-z0-9.:-]{1,40}",
            charset in proptest::sample::select(KNOWN_CHARSETS),
            collate in "[a-z0-9_]{0,24}",
            prefix in "[A-Za-z0-9_]{1,16}",
            debug in proptest::bool::ANY,
            secrets in proptest::collection::vec("[A-Za-z0-9@#._ -]{1,64}", 8),
        ) {
            let mut vars: HashMap<String, String> = HashMap::new();
            vars.insert("DB_NAME".into(), name.clone());
            vars.insert("DB_USER".into(), user.clone());
            vars.insert("DB_PASSWORD".into(), password.clone());
            vars.insert("DB_HOST".into(), host.clone());
            vars.insert("DB_CHARSET".into(), charset.to_string());
            vars.insert("DB_COLLATE".into(), collate.clone());
            vars.insert("TABLE_PREFIX".into(), prefix.clone());
            vars.insert("WP_DEBUG".into(), debug.to_string());
            for ((_, key), value) in SECRET_SETTINGS.iter().zip(&secrets) {
                vars.insert(key.to_string(), value.clone());
            }

            let config = load_from_map(&vars).expect("complete input should load");

            prop_assert_eq!(&config.database.name, &name);
            prop_assert_eq!(&config.database.user, &user);
            prop_assert_eq!(config.database.password.expose(), password.as_str());
            prop_assert_eq!(&config.database.host, &host);
            prop_assert_eq!(config.database.charset.as_str(), charset);
            prop_assert_eq!(&config.database.collate, &collate);
            prop_assert_eq!(&config.table_prefix, &prefix);
            prop_assert_eq!(config.debug_enabled, debug);
            for ((_, _, value), expected) in config.secrets.entries().iter().zip(&secrets) {
                prop_assert_eq!(value.expose(), expected.as_str());
            }
        }
    }
}
