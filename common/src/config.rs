use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },
    #[error("Failed to read config file: {source}")]
    IoError { source: std::io::Error },
    #[error("Failed to parse config file: {source}")]
    ParseError { source: serde_json::Error },
    #[error("Failed to parse TOML config: {source}")]
    TomlParseError { source: toml::de::Error },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Files probed, in order, when no explicit config path is given.
const FALLBACK_PATHS: [&str; 4] = [
    ".slide/config.toml",
    ".slide/config.json",
    "slide.config.toml",
    "slide.config.json",
];

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    /// OpenAI API key. Without one the server answers with the stub model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix.
    pub base_url: String,
    pub bind: SocketAddr,
    /// Image inserted by the `add_icon` action.
    pub icon_path: PathBuf,
    /// Where saved decks are written. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            icon_path: PathBuf::from("placeholder_icon.png"),
            output_dir: None,
            max_upload_bytes: 50 * 1024 * 1024,
            request_timeout_secs: None,
            log_path: None,
        }
    }
}

impl SlideConfig {
    /// Load configuration from a TOML or JSON file, picked by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound { path: path.display().to_string() }
            } else {
                ConfigError::IoError { source: e }
            }
        })?;

        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::TomlParseError { source: e })
        } else {
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError { source: e })
        }
    }

    /// Resolve the effective configuration: file (explicit or first fallback
    /// that exists), then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                let config = Self::load_from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            None => Self::load_with_fallback(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Try the well-known config locations, falling back to defaults.
    pub fn load_with_fallback() -> Self {
        for path in FALLBACK_PATHS {
            if Path::new(path).exists() {
                match Self::load_from_file(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {path}");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {path}: {e}");
                    }
                }
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Apply environment overrides read through `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = get("SLIDE_MODEL") {
            self.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(bind) = get("SLIDE_BIND") {
            self.bind = bind
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "SLIDE_BIND", value: bind })?;
        }
        if let Some(path) = get("SLIDE_ICON_PATH") {
            self.icon_path = PathBuf::from(path);
        }
        if let Some(dir) = get("SLIDE_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get("SLIDE_LOG_PATH") {
            self.log_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Directory for saved decks.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
