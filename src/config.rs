//! Server configuration loading.
//!
//! Reads an optional `sandchat.yaml` and resolves environment variables.
//! Every field has a default, so a missing file (or a partial one) is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Env var naming the config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "SANDCHAT_CONFIG";

/// Config file looked up in the working directory as a last resort.
const DEFAULT_CONFIG_FILE: &str = "sandchat.yaml";

/// Errors raised while locating or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors `sandchat.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub model: ModelSettings,
    pub agent: AgentSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Where persistent state lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base directory for the database, sandbox tree and logs.
    pub data_dir: Option<PathBuf>,
    /// SQLite database file. Defaults to `<data_dir>/chat.db`.
    pub database_path: Option<PathBuf>,
    /// Parent of the per-user sandbox roots. Defaults to `<data_dir>/sandbox`.
    pub sandbox_root: Option<PathBuf>,
}

impl StorageSettings {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(default_data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| self.data_dir().join("chat.db"))
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.sandbox_root
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| self.data_dir().join("sandbox"))
    }
}

/// The local model endpoint and sampling parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model name as known to the runtime (e.g. an Ollama tag).
    pub model_name: String,
    /// OpenAI-compatible base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Lower = more deterministic tool use.
    pub temperature: f32,
    /// Maximum tokens generated per model turn.
    pub max_tokens: u32,
    /// Total request timeout for a single model call.
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_name: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            request_timeout_secs: 300,
        }
    }
}

/// Reply loop bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Number of most recent messages sent as history.
    pub history_window: usize,
    /// Maximum model invocations per reply.
    pub max_steps: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_steps: 5,
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Platform-standard data directory for sandchat.
///
/// Falls back to `~/.sandchat/` and finally `./.sandchat/`.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("sandchat");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sandchat")
}

/// Resolve which config file to read, if any.
///
/// Order: explicit path, `SANDCHAT_CONFIG`, `./sandchat.yaml`. Returns
/// `None` when nothing was requested and the default file is absent.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
    candidate.exists().then_some(candidate)
}

/// Load configuration, falling back to defaults when no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match find_config_path(explicit) {
        Some(path) => load_config_file(&path)?,
        None => AppConfig::default(),
    };
    validate(&config)?;
    Ok(config)
}

/// Load and parse a config file.
///
/// Performs environment-variable interpolation on values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse config YAML after env-var interpolation.
pub fn parse_config(raw: &str) -> Result<AppConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.agent.max_steps == 0 {
        return Err(ConfigError::Invalid {
            reason: "agent.max_steps must be at least 1".into(),
        });
    }
    if config.agent.history_window == 0 {
        return Err(ConfigError::Invalid {
            reason: "agent.history_window must be at least 1".into(),
        });
    }
    if config.model.base_url.is_empty() {
        return Err(ConfigError::Invalid {
            reason: "model.base_url must not be empty".into(),
        });
    }
    Ok(())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(expand_tilde(text)),
        None => path.to_path_buf(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__SANDCHAT_TEST_UNSET__");
        let result = interpolate_env_vars("${__SANDCHAT_TEST_UNSET__:-/fallback/path}");
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__SANDCHAT_TEST_SET__", "/custom/path");
        let result = interpolate_env_vars("${__SANDCHAT_TEST_SET__:-/fallback/path}");
        assert_eq!(result, "/custom/path");
        std::env::remove_var("__SANDCHAT_TEST_SET__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/sandbox");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/sandbox"));
    }

    #[test]
    fn test_defaults_match_local_setup() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.model.model_name, "llama3.1:8b");
        assert_eq!(config.model.max_tokens, 256);
        assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.agent.history_window, 10);
        assert_eq!(config.agent.max_steps, 5);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
            model:
              model_name: "llama3.2:3b"
            storage:
              data_dir: /srv/sandchat
        "#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.model.model_name, "llama3.2:3b");
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("/srv/sandchat/chat.db")
        );
        assert_eq!(
            config.storage.sandbox_root(),
            PathBuf::from("/srv/sandchat/sandbox")
        );
    }

    #[test]
    fn test_explicit_sandbox_root_wins() {
        let yaml = "storage:\n  data_dir: /a\n  sandbox_root: /b/files\n";
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.storage.sandbox_root(), PathBuf::from("/b/files"));
    }

    #[test]
    fn test_storage_paths_expand_tilde() {
        let config = parse_config("storage:\n  data_dir: ~/chatdata\n").unwrap();
        let data_dir = config.storage.data_dir();
        assert!(!data_dir.starts_with("~"));
        assert!(data_dir.ends_with("chatdata"));
        assert!(config.storage.database_path().ends_with("chatdata/chat.db"));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.agent.history_window, 10);
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = parse_config("agent: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let config = parse_config("agent:\n  max_steps: 0\n").unwrap();
        assert!(matches!(validate(&config), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_config_file_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sandchat.yaml");
        std::fs::write(&path, "server:\n  bind_addr: \"0.0.0.0:9000\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let err = load_config(Some(Path::new("/nonexistent/sandchat.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
