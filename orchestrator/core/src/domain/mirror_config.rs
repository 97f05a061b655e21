// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

// Mirror Configuration Types
//
// Defines the configuration schema for the mirror agent:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Radar agent addressing (control port, data port, per-node overrides)
// - Sync engine command line
// - Session policy (connection retries, hot-reload debounce and trigger)
// - Static container resolution table

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::engine::EngineConfig;

pub const API_VERSION: &str = "mirror/v1";
pub const KIND: &str = "MirrorConfig";
pub const CONFIG_PATH_ENV: &str = "MIRROR_CONFIG_PATH";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfigManifest {
    /// API version (must be "mirror/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "MirrorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: MirrorConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable name of this agent host
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfigSpec {
    #[serde(default)]
    pub radar: RadarConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Containers that can be targeted by reference
    #[serde(default)]
    pub containers: Vec<ContainerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Radar gRPC port, identical on every node
    #[serde(default = "default_radar_port")]
    pub port: u16,

    /// Port the remote sync engine listens on, identical on every node
    #[serde(default = "default_mirror_port")]
    pub mirror_port: u16,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Node name → reachable address. Nodes not listed are dialed by name.
    #[serde(default)]
    pub nodes: HashMap<String, String>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            port: default_radar_port(),
            mirror_port: default_mirror_port(),
            connect_timeout: default_connect_timeout(),
            nodes: HashMap::new(),
        }
    }
}

impl RadarConfig {
    pub fn node_address(&self, node: &str) -> String {
        self.nodes
            .get(node)
            .cloned()
            .unwrap_or_else(|| node.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refused connections tolerated before the session is torn down
    #[serde(default = "default_max_connection_retries")]
    pub max_connection_retries: u32,

    /// Quiet period after which a suppressed reload is re-armed
    #[serde(default = "default_reload_debounce", with = "humantime_serde")]
    pub reload_debounce: Duration,

    /// Pattern on engine output that means files are being transferred
    #[serde(default = "default_reload_trigger")]
    pub reload_trigger: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_connection_retries: default_max_connection_retries(),
            reload_debounce: default_reload_debounce(),
            reload_trigger: default_reload_trigger(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub pod: String,
    pub container: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub node: String,
    pub id: String,
}

// Default value functions
fn default_radar_port() -> u16 {
    40321
}

fn default_mirror_port() -> u16 {
    40322
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_connection_retries() -> u32 {
    1
}

fn default_reload_debounce() -> Duration {
    Duration::from_secs(3)
}

fn default_reload_trigger() -> String {
    "INFO  Sending".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for MirrorConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "mirror-host".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: MirrorConfigSpec::default(),
        }
    }
}

impl MirrorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MIRROR_CONFIG_PATH environment variable
    /// 2. ./mirror-config.yaml (working directory)
    /// 3. ~/.mirror/config.yaml (user home)
    /// 4. /etc/mirror/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./mirror-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mirror").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/mirror/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("MIRROR_MAX_CONNECTION_RETRIES") {
            match val.parse::<u32>() {
                Ok(retries) => {
                    tracing::info!("Environment override: MIRROR_MAX_CONNECTION_RETRIES={}", retries);
                    self.spec.session.max_connection_retries = retries;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for MIRROR_MAX_CONNECTION_RETRIES: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("MIRROR_RADAR_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: MIRROR_RADAR_PORT={}", port);
                    self.spec.radar.port = port;
                }
                Err(_) => tracing::warn!("Invalid value for MIRROR_RADAR_PORT: '{}'. Ignoring.", val),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.engine.program.is_empty() {
            anyhow::bail!("spec.engine.program cannot be empty");
        }

        if self.spec.session.reload_debounce.is_zero() {
            anyhow::bail!("spec.session.reload_debounce must be greater than zero");
        }

        regex::Regex::new(&self.spec.session.reload_trigger).map_err(|e| {
            anyhow::anyhow!(
                "spec.session.reload_trigger is not a valid pattern: {}",
                e
            )
        })?;

        for (index, entry) in self.spec.containers.iter().enumerate() {
            if entry.pod.is_empty() || entry.container.is_empty() {
                anyhow::bail!("spec.containers[{}]: pod and container are required", index);
            }
            if entry.node.is_empty() || entry.id.is_empty() {
                anyhow::bail!(
                    "spec.containers[{}] ({}/{}): node and id are required",
                    index,
                    entry.pod,
                    entry.container
                );
            }
            let duplicate = self.spec.containers[..index].iter().any(|other| {
                other.namespace == entry.namespace
                    && other.pod == entry.pod
                    && other.container == entry.container
            });
            if duplicate {
                anyhow::bail!(
                    "spec.containers: {}/{}:{} is listed more than once",
                    entry.namespace,
                    entry.pod,
                    entry.container
                );
            }
        }

        Ok(())
    }
}
