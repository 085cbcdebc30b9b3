use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Currency assumed when a credit dossier does not name one.
    pub default_currency: String,
    /// Reference prefix used when a workflow type has no own code.
    pub fallback_reference_code: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse `{path}` as TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` is required but missing")]
    MissingConfigFile(PathBuf),
    #[error("config file references unset environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("config file contains an unterminated `${{...}}` expression")]
    UnterminatedInterpolation,
    #[error("`{key}` carries an unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://parapheur.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            workflow: WorkflowConfig {
                default_currency: "XOF".to_string(),
                fallback_reference_code: "REQ".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        [("compact", Self::Compact), ("pretty", Self::Pretty), ("json", Self::Json)]
            .into_iter()
            .find(|(name, _)| value.eq_ignore_ascii_case(name))
            .map(|(_, format)| format)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "unknown log format `{value}` (expected compact, pretty or json)"
                ))
            })
    }
}

impl AppConfig {
    /// Loads configuration with precedence defaults < file < environment
    /// < explicit overrides, then validates the merged result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.apply_patch(read_patch(&path)?),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from("parapheur.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            merge(&mut self.database.url, database.url);
            merge(&mut self.database.max_connections, database.max_connections);
            merge(&mut self.database.timeout_secs, database.timeout_secs);
        }

        if let Some(workflow) = patch.workflow {
            merge(&mut self.workflow.default_currency, workflow.default_currency);
            merge(&mut self.workflow.fallback_reference_code, workflow.fallback_reference_code);
        }

        if let Some(logging) = patch.logging {
            merge(&mut self.logging.level, logging.level);
            merge(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARAPHEUR_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PARAPHEUR_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("PARAPHEUR_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PARAPHEUR_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("PARAPHEUR_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PARAPHEUR_DEFAULT_CURRENCY") {
            self.workflow.default_currency = value;
        }
        if let Some(value) = read_env("PARAPHEUR_FALLBACK_REFERENCE_CODE") {
            self.workflow.fallback_reference_code = value;
        }

        // Short aliases are accepted alongside the canonical names.
        merge(
            &mut self.logging.level,
            read_env("PARAPHEUR_LOGGING_LEVEL").or_else(|| read_env("PARAPHEUR_LOG_LEVEL")),
        );
        if let Some(value) =
            read_env("PARAPHEUR_LOGGING_FORMAT").or_else(|| read_env("PARAPHEUR_LOG_FORMAT"))
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        merge(&mut self.database.url, overrides.database_url);
        merge(&mut self.logging.level, overrides.log_level);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parapheur.toml"), PathBuf::from("config/parapheur.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` in the raw file with the variable's value.
/// A missing variable is an error rather than an empty string, so a
/// half-configured deployment fails loudly.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expr = &rest[start + 2..];
        let end = expr.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &expr[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &expr[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    if !(url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:") {
        return Err(ConfigError::Validation(format!(
            "database.url `{url}` is not a sqlite URL (expected sqlite://... or sqlite::...)"
        )));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections cannot be zero".to_string(),
        ));
    }
    if !(1..=300).contains(&database.timeout_secs) {
        return Err(ConfigError::Validation(
            "database.timeout_secs must lie between 1 and 300".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    let currency = workflow.default_currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "workflow.default_currency must be a three letter ISO code (e.g. XOF)".to_string(),
        ));
    }

    let code = workflow.fallback_reference_code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::Validation(
            "workflow.fallback_reference_code must be a non-empty alphanumeric code".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    let level = logging.level.trim();
    if LEVELS.iter().any(|known| level.eq_ignore_ascii_case(known)) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "logging.level `{level}` is not one of {}",
            LEVELS.join(", ")
        )))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    default_currency: Option<String>,
    fallback_reference_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    // Env vars are process-global, so tests touching them serialize.
    fn env_guard(vars: &[(&str, &str)]) -> MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned");
        for (key, value) in vars {
            env::set_var(key, value);
        }
        guard
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("parapheur.toml");
        fs::write(&path, body).expect("write config file");
        path
    }

    #[test]
    fn defaults_are_valid() {
        let _guard = env_guard(&[]);

        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");
        assert_eq!(config.database.url, "sqlite://parapheur.db");
        assert_eq!(config.workflow.default_currency, "XOF");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_load_supports_env_interpolation() {
        let _guard = env_guard(&[("TEST_PARAPHEUR_DB", "sqlite://interpolated.db")]);

        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[database]\nurl = \"${TEST_PARAPHEUR_DB}\"\n");

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .expect("interpolated load");
        assert_eq!(config.database.url, "sqlite://interpolated.db");

        clear_vars(&["TEST_PARAPHEUR_DB"]);
    }

    #[test]
    fn unterminated_interpolation_is_rejected() {
        let _guard = env_guard(&[]);

        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[database]\nurl = \"${NEVER_CLOSED\"\n");

        let error =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .expect_err("should refuse unterminated expression");
        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }

    #[test]
    fn logging_env_aliases_are_supported() {
        let _guard =
            env_guard(&[("PARAPHEUR_LOG_LEVEL", "warn"), ("PARAPHEUR_LOG_FORMAT", "pretty")]);

        let config = AppConfig::load(LoadOptions::default()).expect("load with aliases");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);

        clear_vars(&["PARAPHEUR_LOG_LEVEL", "PARAPHEUR_LOG_FORMAT"]);
    }

    #[test]
    fn precedence_defaults_file_env_overrides() {
        let _guard = env_guard(&[("PARAPHEUR_DEFAULT_CURRENCY", "EUR")]);

        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[database]\nurl = \"sqlite://from-file.db\"\n\n\
             [workflow]\ndefault_currency = \"USD\"\n\n\
             [logging]\nlevel = \"warn\"\n",
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
            },
            ..LoadOptions::default()
        })
        .expect("layered load");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.workflow.default_currency, "EUR");

        clear_vars(&["PARAPHEUR_DEFAULT_CURRENCY"]);
    }

    #[test]
    fn validation_names_the_offending_field() {
        let _guard = env_guard(&[("PARAPHEUR_DEFAULT_CURRENCY", "francs")]);

        let error =
            AppConfig::load(LoadOptions::default()).expect_err("lowercase currency should fail");
        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("default_currency")
        ));

        clear_vars(&["PARAPHEUR_DEFAULT_CURRENCY"]);
    }

    #[test]
    fn missing_required_file_is_reported() {
        let _guard = env_guard(&[]);

        let error = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("required file is absent");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
