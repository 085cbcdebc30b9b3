use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parapheur_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Prints every effective config value with the layer it came from, so an
/// operator can tell an env override from a file entry at a glance.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let entries: [(&str, &str, String); 7] = [
        ("database.url", "PARAPHEUR_DATABASE_URL", config.database.url.clone()),
        (
            "database.max_connections",
            "PARAPHEUR_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        (
            "database.timeout_secs",
            "PARAPHEUR_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        (
            "workflow.default_currency",
            "PARAPHEUR_DEFAULT_CURRENCY",
            config.workflow.default_currency.clone(),
        ),
        (
            "workflow.fallback_reference_code",
            "PARAPHEUR_FALLBACK_REFERENCE_CODE",
            config.workflow.fallback_reference_code.clone(),
        ),
        ("logging.level", "PARAPHEUR_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "PARAPHEUR_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_key, value) in entries {
        let source = field_source(key, env_key, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {key} = {value} (source: {source})"));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("parapheur.toml"), PathBuf::from("config/parapheur.toml")]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let display = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({display})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path
        .split('.')
        .try_fold(root, |node, key| node.get(key))
        .is_some()
}
