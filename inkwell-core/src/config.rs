use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InkwellConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub posts: PostsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before the draft is written.
    pub interval_seconds: u64,
    /// Label stored in place of an empty title.
    pub placeholder_title: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            placeholder_title: "Untitled Draft".to_string(),
        }
    }
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub slot: String,
    /// Largest serialized draft the slot accepts, in bytes.
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.local/share/inkwell".to_string(),
            slot: "autosave-draft".to_string(),
            // Browser local storage is typically capped around 5 MiB.
            quota_bytes: Some(5 * 1024 * 1024),
        }
    }
}

impl StorageConfig {
    /// Data directory with `~` and environment variables expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        match shellexpand::full(&self.data_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.data_dir, "Failed to expand data_dir, using it verbatim");
                PathBuf::from(&self.data_dir)
            }
        }
    }
}

/// Which connections receive a relayed chat message.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelayScope {
    /// Every open connection, regardless of collaboration id.
    #[default]
    Global,
    /// Only connections that joined the message's collaboration id.
    Room,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub scope: RelayScope,
    pub inbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            scope: RelayScope::Global,
            inbox_capacity: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PostsConfig {
    /// Base URL of the PostgREST-style data service, e.g. `https://x.supabase.co/rest/v1`.
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321/rest/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl InkwellConfig {
    /// Load from a TOML file, then apply `INKWELL__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("INKWELL").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Like [`InkwellConfig::load`] but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("INKWELL").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_editor_constants() {
        let config = InkwellConfig::default();
        assert_eq!(config.autosave.interval(), Duration::from_secs(10));
        assert_eq!(config.autosave.placeholder_title, "Untitled Draft");
        assert_eq!(config.storage.slot, "autosave-draft");
        assert_eq!(config.relay.scope, RelayScope::Global);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[autosave]\ninterval_seconds = 30\nplaceholder_title = \"Draft\"\n\n[relay]\nscope = \"room\"\ninbox_capacity = 8"
        )
        .unwrap();

        let config = InkwellConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.autosave.interval_seconds, 30);
        assert_eq!(config.relay.scope, RelayScope::Room);
        assert_eq!(config.http.port, 8787, "missing sections use defaults");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config = InkwellConfig::load_or_default("/nonexistent/inkwell-config").unwrap();
        assert_eq!(config.autosave.interval_seconds, 10);
    }

    #[test]
    fn test_resolved_data_dir_expands_tilde() {
        let storage = StorageConfig {
            data_dir: "~/drafts".to_string(),
            ..StorageConfig::default()
        };
        let resolved = storage.resolved_data_dir();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("drafts"));
    }
}
