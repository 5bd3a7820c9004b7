//! Configuration system for biblion.

use crate::errors::Error;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration values with priority: defaults < config file < env vars.
///
/// Credential material is resolved exactly once during [`Config::load`]
/// (inline base64, file path, or env token) and kept in memory; nothing is
/// ever materialized to a temporary file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database.
    pub database_path: PathBuf,

    /// Base URL of the embedding provider. Empty means the provider is not
    /// configured; catalog writes then proceed without embeddings and
    /// semantic search reports unavailability.
    pub provider_endpoint: String,

    /// Provider-side embedding model identifier.
    pub provider_model: String,

    /// Bounded timeout for provider calls, in seconds. Expiry surfaces as
    /// unavailability, never as a hang.
    pub provider_timeout_secs: u64,

    /// Resolved bearer token for the provider, if any.
    pub api_token: Option<String>,

    /// Minimum cosine similarity for semantic-search results.
    pub similarity_threshold: f64,

    /// Partition (list) count for the vector index.
    pub index_lists: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| home.join(".local/share"));

        Self {
            database_path: data_dir.join("biblion/catalog.db"),
            provider_endpoint: String::new(),
            provider_model: "text-embedding-004".to_string(),
            provider_timeout_secs: 10,
            api_token: None,
            similarity_threshold: 0.4,
            index_lists: 100,
        }
    }
}

impl Config {
    fn apply_env_overrides(&mut self) -> Result<(), Error> {
        if let Ok(val) = std::env::var("BIBLION_DATABASE_PATH") {
            if val.trim().is_empty() {
                return Err(Error::Config("BIBLION_DATABASE_PATH cannot be empty".into()));
            }
            self.database_path = expand_tilde_path(&PathBuf::from(&val));
        }
        if let Ok(val) = std::env::var("BIBLION_PROVIDER_ENDPOINT") {
            self.provider_endpoint = val.trim().to_string();
        }
        if let Ok(val) = std::env::var("BIBLION_PROVIDER_MODEL") {
            if val.trim().is_empty() {
                return Err(Error::Config("BIBLION_PROVIDER_MODEL cannot be empty".into()));
            }
            self.provider_model = val;
        }
        if let Ok(val) = std::env::var("BIBLION_PROVIDER_TIMEOUT_SECS") {
            self.provider_timeout_secs = val.trim().parse().map_err(|e| {
                Error::Config(format!("Invalid BIBLION_PROVIDER_TIMEOUT_SECS value: {e}"))
            })?;
        }
        if let Ok(val) = std::env::var("BIBLION_SIMILARITY_THRESHOLD") {
            if val.trim().is_empty() {
                return Err(Error::Config(
                    "BIBLION_SIMILARITY_THRESHOLD cannot be empty".into(),
                ));
            }
            self.similarity_threshold = val.trim().parse().map_err(|e| {
                Error::Config(format!("Invalid BIBLION_SIMILARITY_THRESHOLD value: {e}"))
            })?;
        }
        if let Ok(val) = std::env::var("BIBLION_INDEX_LISTS") {
            self.index_lists = val
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("Invalid BIBLION_INDEX_LISTS value: {e}")))?;
        }
        if let Ok(val) = std::env::var("BIBLION_API_TOKEN") {
            if !val.trim().is_empty() {
                self.api_token = Some(val.trim().to_string());
            }
        }
        Ok(())
    }

    fn merge_from_file(&mut self, file: ConfigFile) -> Result<(), Error> {
        self.api_token = resolve_credentials(&file)?;
        if !file.database_path.as_os_str().is_empty() {
            self.database_path = file.database_path;
        }
        if !file.provider_endpoint.is_empty() {
            self.provider_endpoint = file.provider_endpoint;
        }
        if !file.provider_model.is_empty() {
            self.provider_model = file.provider_model;
        }
        if let Some(secs) = file.provider_timeout_secs {
            self.provider_timeout_secs = secs;
        }
        self.similarity_threshold = file.similarity_threshold;
        if let Some(lists) = file.index_lists {
            self.index_lists = lists;
        }
        Ok(())
    }

    /// Load configuration from defaults, the config file, and env vars.
    pub fn load() -> Result<Self, Error> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_local = dirs::data_local_dir().unwrap_or_else(|| home.join(".local/share"));
        let config_dir = dirs::config_dir().unwrap_or_else(|| data_local.join(".config"));

        let config_path = config_dir.join("biblion/config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit config file path.
    pub fn load_from(config_path: &Path) -> Result<Self, Error> {
        let file_config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).map_err(|e| {
                Error::Config(format!(
                    "Failed to read config file {}: {e}",
                    config_path.display()
                ))
            })?;

            let mut config: ConfigFile = toml::from_str(&content).map_err(|e| {
                Error::Config(format!(
                    "Failed to parse config file {}: {e}",
                    config_path.display()
                ))
            })?;

            expand_tilde(&mut config.database_path);

            Some(config)
        } else {
            None
        };

        let mut config = Config::default();

        if let Some(file) = file_config {
            config.merge_from_file(file)?;
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.similarity_threshold < -1.0 || self.similarity_threshold > 1.0 {
            return Err(Error::Config(format!(
                "Invalid similarity threshold: {} (must be between -1.0 and 1.0)",
                self.similarity_threshold
            )));
        }

        if self.provider_timeout_secs == 0 {
            return Err(Error::Config(
                "Provider timeout must be at least 1 second".to_string(),
            ));
        }

        if self.index_lists == 0 {
            return Err(Error::Config(
                "Vector index list count must be at least 1".to_string(),
            ));
        }

        if self.provider_model.trim().is_empty() {
            return Err(Error::Config("Provider model cannot be empty".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Ensure the parent directory for the database path exists.
    pub fn ensure_directories(&self) -> Result<(), Error> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Resolve credential material from the config file: inline base64 first,
/// then a token file path. Env (`BIBLION_API_TOKEN`) overrides both later.
fn resolve_credentials(file: &ConfigFile) -> Result<Option<String>, Error> {
    if let Some(blob) = &file.api_token_b64 {
        let bytes = BASE64
            .decode(blob.trim())
            .map_err(|e| Error::Config(format!("Invalid api_token_b64: {e}")))?;
        let token = String::from_utf8(bytes)
            .map_err(|e| Error::Config(format!("api_token_b64 is not valid UTF-8: {e}")))?;
        return Ok(Some(token.trim().to_string()));
    }

    if let Some(path) = &file.api_token_path {
        let token = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read api token file {}: {e}",
                path.display()
            ))
        })?;
        return Ok(Some(token.trim().to_string()));
    }

    Ok(None)
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database_path: PathBuf,

    #[serde(default)]
    provider_endpoint: String,

    #[serde(default)]
    provider_model: String,

    #[serde(default)]
    provider_timeout_secs: Option<u64>,

    /// Inline credential bytes, base64-encoded.
    #[serde(default)]
    api_token_b64: Option<String>,

    /// Path to a file holding the credential.
    #[serde(default)]
    api_token_path: Option<PathBuf>,

    #[serde(default = "default_threshold")]
    similarity_threshold: f64,

    #[serde(default)]
    index_lists: Option<usize>,
}

fn default_threshold() -> f64 {
    0.4
}

/// Expand `~` to home directory in a PathBuf (in-place).
fn expand_tilde(path: &mut PathBuf) {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            let rest = path.strip_prefix("~").unwrap_or(Path::new(""));
            *path = home.join(rest);
        }
    }
}

/// Expand `~` to home directory in a PathBuf (returns new PathBuf).
fn expand_tilde_path(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            let rest = path.strip_prefix("~").unwrap_or(Path::new(""));
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn cleanup_env_vars() {
        let vars = [
            "BIBLION_DATABASE_PATH",
            "BIBLION_PROVIDER_ENDPOINT",
            "BIBLION_PROVIDER_MODEL",
            "BIBLION_PROVIDER_TIMEOUT_SECS",
            "BIBLION_SIMILARITY_THRESHOLD",
            "BIBLION_INDEX_LISTS",
            "BIBLION_API_TOKEN",
        ];
        for var in vars {
            #[allow(clippy::disallowed_methods)]
            unsafe {
                std::env::remove_var(var)
            };
        }
    }

    fn load_without_file() -> Result<Config, Error> {
        Config::load_from(Path::new("/nonexistent/biblion-config.toml"))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.database_path.ends_with("biblion/catalog.db"));
        assert_eq!(config.provider_model, "text-embedding-004");
        assert!(config.provider_endpoint.is_empty());
        assert_eq!(config.similarity_threshold, 0.4);
        assert_eq!(config.index_lists, 100);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        let config = load_without_file().unwrap();

        assert!(config.database_path.ends_with("biblion/catalog.db"));
        assert_eq!(config.similarity_threshold, 0.4);
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        unsafe {
            std::env::set_var("BIBLION_DATABASE_PATH", "/custom/path/catalog.db");
            std::env::set_var("BIBLION_PROVIDER_ENDPOINT", "http://localhost:9999");
            std::env::set_var("BIBLION_SIMILARITY_THRESHOLD", "0.6");
            std::env::set_var("BIBLION_API_TOKEN", "sekrit");
        }

        let config = load_without_file().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/custom/path/catalog.db"));
        assert_eq!(config.provider_endpoint, "http://localhost:9999");
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.api_token.as_deref(), Some("sekrit"));

        cleanup_env_vars();
    }

    #[test]
    fn test_invalid_similarity_threshold() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        unsafe { std::env::set_var("BIBLION_SIMILARITY_THRESHOLD", "invalid") };
        assert!(matches!(load_without_file(), Err(Error::Config(_))));

        unsafe { std::env::set_var("BIBLION_SIMILARITY_THRESHOLD", "1.5") };
        assert!(matches!(load_without_file(), Err(Error::Config(_))));

        cleanup_env_vars();
    }

    #[test]
    fn test_zero_index_lists_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        unsafe { std::env::set_var("BIBLION_INDEX_LISTS", "0") };
        assert!(matches!(load_without_file(), Err(Error::Config(_))));

        cleanup_env_vars();
    }

    #[test]
    fn test_empty_database_path_env_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        unsafe { std::env::set_var("BIBLION_DATABASE_PATH", "") };
        assert!(matches!(load_without_file(), Err(Error::Config(_))));

        cleanup_env_vars();
    }

    #[test]
    fn test_config_file_credentials_inline_b64() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        // "token-123" base64-encoded.
        std::fs::write(
            &config_path,
            r#"
provider_endpoint = "http://localhost:8080"
api_token_b64 = "dG9rZW4tMTIz"
"#,
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("token-123"));
        assert_eq!(config.provider_endpoint, "http://localhost:8080");
    }

    #[test]
    fn test_config_file_credentials_path() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        let dir = tempfile::TempDir::new().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "file-token\n").unwrap();

        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("api_token_path = \"{}\"\n", token_path.display()),
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_invalid_b64_credentials_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();

        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "api_token_b64 = \"%%%not-base64%%%\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&config_path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from(""));
        if home.as_os_str().is_empty() {
            return;
        }
        let mut path = PathBuf::from("~/test/path");
        expand_tilde(&mut path);

        assert!(!path.starts_with("~"));
        assert!(path.starts_with(&home));
        assert!(path.ends_with("test/path"));
    }

    #[test]
    fn test_malformed_toml() {
        let content = r#"
This is not valid TOML
 [[unclosed bracket
 "#;

        let result: Result<ConfigFile, _> = toml::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_config_file() {
        let result: Result<ConfigFile, _> = toml::from_str("");
        assert!(result.is_ok());

        let config = result.unwrap();
        assert!(config.database_path.as_os_str().is_empty());
        assert!(config.provider_endpoint.is_empty());
        assert_eq!(config.similarity_threshold, 0.4);
    }
}
