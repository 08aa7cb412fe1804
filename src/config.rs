use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind: String,
    /// Upper bound on iterations accepted by a single quantitative run
    pub max_iterations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            max_iterations: 50,
        }
    }
}

/// Model provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base URL
    pub api_endpoint: String,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Temperature for prompt-under-test generations
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4o".to_string(),
            temperature: 0.7,
        }
    }
}

/// Settings for the qualitative judge
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.3,
        }
    }
}

/// Batching and retry settings for quantitative runs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuantitativeConfig {
    /// Batch size used when a request does not specify one
    pub default_batch_size: usize,
    /// Retries allowed for a rate-limited iteration
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `2^n * base_delay_ms` plus jitter
    pub base_delay_ms: u64,
    /// Exclusive upper bound of the random jitter added to each backoff
    pub max_jitter_ms: u64,
    /// Pause between consecutive batches
    pub batch_pause_ms: u64,
}

impl Default for QuantitativeConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 5,
            max_retries: 3,
            base_delay_ms: 1000,
            max_jitter_ms: 1000,
            batch_pause_ms: 500,
        }
    }
}

impl QuantitativeConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

/// Root configuration; every section is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub judge: JudgeConfig,
    pub quantitative: QuantitativeConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Load from `path` when given, otherwise fall back to the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// A single quantitative run driven from the command line
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunFile {
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    pub iterations: usize,
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Environment variable name containing the API key
    pub env_var_api_key: String,
}

impl RunFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML run file: {}", path.display()))
    }

    /// Read the credential from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", self.env_var_api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
[server]
bind = "0.0.0.0:8080"
max_iterations = 20

[provider]
api_endpoint = "http://localhost:9000/v1"
default_model = "gpt-4o-mini"
temperature = 0.5

[judge]
model = "gpt-4-turbo"
temperature = 0.1

[quantitative]
default_batch_size = 3
max_retries = 5
base_delay_ms = 250
max_jitter_ms = 100
batch_pause_ms = 0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.max_iterations, 20);
        assert_eq!(config.provider.default_model, "gpt-4o-mini");
        assert_eq!(config.provider.temperature, 0.5);
        assert_eq!(config.judge.model, "gpt-4-turbo");
        assert_eq!(config.quantitative.default_batch_size, 3);
        assert_eq!(config.quantitative.max_retries, 5);
        assert_eq!(config.quantitative.batch_pause(), Duration::ZERO);
    }

    #[test]
    fn test_config_defaults() {
        let toml_content = r#"
[provider]
default_model = "gpt-3.5-turbo"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.provider.default_model, "gpt-3.5-turbo");
        assert_eq!(config.provider.api_endpoint, "https://api.openai.com/v1");
        assert_eq!(config.provider.temperature, 0.7);
        assert_eq!(config.judge.temperature, 0.3);
        assert_eq!(config.server.max_iterations, 50);
        assert_eq!(config.quantitative.default_batch_size, 5);
        assert_eq!(config.quantitative.max_retries, 3);
        assert_eq!(config.quantitative.base_delay_ms, 1000);
        assert_eq!(config.quantitative.batch_pause_ms, 500);
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::from_file(Path::new("/nonexistent/prompt-judge.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_run_file_parsing() {
        let toml_content = r#"
system_prompt = "You are a sales coach."
user_prompt = "Score this transcript."
iterations = 7
batch_size = 3
env_var_api_key = "PROMPT_JUDGE_TEST_KEY"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let run = RunFile::from_file(temp_file.path()).unwrap();
        assert_eq!(run.iterations, 7);
        assert_eq!(run.batch_size, Some(3));
        assert!(run.model.is_none());
    }

    #[test]
    fn test_run_file_missing_env_var() {
        let run = RunFile {
            system_prompt: "s".to_string(),
            user_prompt: "u".to_string(),
            model: None,
            iterations: 1,
            batch_size: None,
            env_var_api_key: "PROMPT_JUDGE_UNSET_KEY_FOR_TEST".to_string(),
        };

        unsafe {
            std::env::remove_var(&run.env_var_api_key);
        }

        let result = run.api_key();
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
