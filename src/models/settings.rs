//! Settings Models
//!
//! Application configuration. Values are layered: built-in defaults, then an
//! optional TOML file, then environment variables and command-line flags
//! (applied by the binary through [`ConfigOverrides`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use proof_cascade_llm::{ProviderConfig, ProviderType};

use crate::utils::error::{AppError, AppResult};

/// Default number of generation attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default sampling temperature for plan requests
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Text-generation provider
    pub provider: ProviderConfig,
    /// Generate-verify-repair loop
    pub generation: GenerationConfig,
    /// HTTP transport
    pub server: ServerConfig,
}

/// Settings of the generate-verify-repair loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Generation attempts before the terminal error step is returned
    pub max_retries: u32,
    /// Sampling temperature sent with every plan request
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Settings of the HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server listens on
    pub bind_addr: String,
    /// Allow any origin, method and header
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cors_allow_any: true,
        }
    }
}

/// Values from the environment or the command line, applied over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderType>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_retries: Option<u32>,
    pub bind_addr: Option<String>,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> AppResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from an optional TOML file, falling back to defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AppError::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment and command-line overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.provider {
            self.provider.provider = provider;
        }
        if let Some(api_key) = overrides.api_key {
            self.provider.api_key = Some(api_key);
        }
        if let Some(base_url) = overrides.base_url {
            self.provider.base_url = Some(base_url);
        }
        if let Some(model) = overrides.model {
            self.provider.model = model;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.generation.max_retries = max_retries;
        }
        if let Some(bind_addr) = overrides.bind_addr {
            self.server.bind_addr = bind_addr;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.generation.max_retries == 0 {
            return Err(AppError::config("generation.max_retries must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.provider.model.trim().is_empty() {
            return Err(AppError::config("provider.model must not be empty"));
        }
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(AppError::config(format!(
                "server.bind_addr '{}' is not a socket address",
                self.server.bind_addr
            )));
        }
        Ok(())
    }
}
