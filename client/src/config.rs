use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String { common::DEFAULT_URL.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

/// Which listing/upload endpoint family the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRoute {
    #[default]
    Jars,
    Binaries,
}

impl ArtifactRoute {
    pub fn segment(&self) -> &'static str {
        match self {
            ArtifactRoute::Jars => "jars",
            ArtifactRoute::Binaries => "binaries",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub artifact_route: ArtifactRoute,
    pub user_agent: Option<String>,
}

fn default_connect_timeout() -> u64 { 60 }
fn default_timeout() -> u64 { 180 }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            artifact_route: ArtifactRoute::default(),
            user_agent: None,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub output: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One config file as written on disk. Every key is optional so that a file
/// only overrides what it actually sets when layered with [`ClientConfig::merge`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub server: ServerLayer,
    #[serde(default)]
    pub transport: TransportLayer,
    #[serde(default)]
    pub logging: LoggingLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerLayer {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportLayer {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub artifact_route: Option<ArtifactRoute>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
    pub level: Option<String>,
    pub output: Option<PathBuf>,
}

impl ConfigLayer {
    /// Load a layer from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let layer: ConfigLayer = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(layer)
    }

    /// Load a layer from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let layer: ConfigLayer = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(layer)
    }

    /// Detect file type by extension and load
    pub fn from_file(path: &Path) -> Result<Self> {
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "toml" => Self::from_toml_file(path),
            _ => Err(anyhow::anyhow!("Unsupported config file format. Use .yaml, .yml, or .toml")),
        }
    }
}

impl ClientConfig {
    /// Load a single config file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = ClientConfig::default();
        config.merge(ConfigLayer::from_file(path)?);
        Ok(config)
    }

    /// Apply a layer, overriding only the keys it sets
    pub fn merge(&mut self, layer: ConfigLayer) {
        if let Some(url) = layer.server.url {
            self.server.url = url;
        }

        let transport = layer.transport;
        if let Some(secs) = transport.connect_timeout_secs {
            self.transport.connect_timeout_secs = secs;
        }
        if let Some(secs) = transport.timeout_secs {
            self.transport.timeout_secs = secs;
        }
        if let Some(route) = transport.artifact_route {
            self.transport.artifact_route = route;
        }
        if transport.user_agent.is_some() {
            self.transport.user_agent = transport.user_agent;
        }

        if let Some(level) = layer.logging.level {
            self.logging.level = level;
        }
        if layer.logging.output.is_some() {
            self.logging.output = layer.logging.output;
        }
    }
}
