use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use multinode_common::{
    account::DomainId, config::DEFAULT_NODE_COUNT, crypto::KeyPair, prompt::LogLevel,
};

use crate::{
    client::{NodeEndpoint, RpcClientConfig},
    environment::SuiteSettings,
    export::default_blocks_dir,
    scenarios::{malicious_client, network, Pipeline},
};

/// Default values for configuration
pub mod defaults {
    use super::*;

    pub const LOG_LEVEL: LogLevel = LogLevel::Info;
    pub const FILENAME_LOG: &str = "multinode-probe.log";
    pub const LOGS_PATH: &str = "logs/";
    pub const NODE_HOST: &str = "127.0.0.1";
    pub const FIRST_NODE_PORT: u16 = 50051;
    pub const DOMAIN: &str = multinode_common::config::HARNESS_DOMAIN;

    // Node client defaults
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    pub const STATUS_TIMEOUT_SECS: u64 = 120;
    pub const STATUS_POLL_INTERVAL_MS: u64 = 200;

    // Validation limits
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 600;
    pub const MIN_POLL_INTERVAL_MS: u64 = 10;
    pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

    // Environment overrides
    pub const ENV_NODE_PREFIX: &str = "MULTINODE_NODE_";
    pub const ENV_ADMIN_PRIVATE_KEY: &str = "MULTINODE_ADMIN_PRIVATE_KEY";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Suite {
    MaliciousClient,
    Network,
}

impl Suite {
    pub fn name(&self) -> &'static str {
        match self {
            Suite::MaliciousClient => malicious_client::NAME,
            Suite::Network => network::NAME,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        match self {
            Suite::MaliciousClient => malicious_client::pipeline(),
            Suite::Network => network::pipeline(),
        }
    }

    // The double spend probe needs two distinct nodes
    fn min_nodes(&self) -> usize {
        match self {
            Suite::MaliciousClient => 2,
            Suite::Network => 1,
        }
    }
}

/// Where the network under test lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process network started by the harness
    Local,
    /// Deployed network reached through each node's JSON-RPC gateway
    Rpc,
}

fn default_log_level() -> LogLevel {
    defaults::LOG_LEVEL
}
fn default_filename_log() -> String {
    defaults::FILENAME_LOG.to_string()
}
fn default_logs_path() -> String {
    defaults::LOGS_PATH.to_string()
}
fn default_suite() -> Suite {
    Suite::MaliciousClient
}
fn default_backend() -> Backend {
    Backend::Rpc
}
fn default_nodes() -> Vec<NodeEndpoint> {
    (0..DEFAULT_NODE_COUNT as u16)
        .map(|i| NodeEndpoint::new(defaults::NODE_HOST, defaults::FIRST_NODE_PORT + i))
        .collect()
}
fn default_domain() -> String {
    defaults::DOMAIN.to_string()
}
fn default_request_timeout_secs() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_connection_timeout_secs() -> u64 {
    defaults::CONNECTION_TIMEOUT_SECS
}
fn default_status_timeout_secs() -> u64 {
    defaults::STATUS_TIMEOUT_SECS
}
fn default_status_poll_interval_ms() -> u64 {
    defaults::STATUS_POLL_INTERVAL_MS
}

/// Harness configuration, from the command line or a JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default)]
    pub disable_file_logging: bool,

    #[serde(default)]
    pub disable_log_color: bool,

    #[serde(default)]
    pub disable_interactive_mode: bool,

    #[serde(default = "default_filename_log")]
    pub filename_log: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    #[serde(default = "default_suite")]
    pub suite: Suite,

    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Client endpoints of the nodes, in order
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeEndpoint>,

    /// Hex private key of `admin@test`. Required for the RPC backend.
    #[serde(default)]
    pub admin_private_key: Option<String>,

    /// Domain the harness creates its accounts and asset in
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Overrides the suite's pause after the reachability check
    #[serde(default)]
    pub settle_delay_secs: Option<u64>,

    #[serde(default)]
    pub blocks_dir: Option<String>,

    #[serde(default)]
    pub skip_block_export: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,

    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            disable_file_logging: false,
            disable_log_color: false,
            disable_interactive_mode: false,
            filename_log: default_filename_log(),
            logs_path: default_logs_path(),
            suite: default_suite(),
            backend: default_backend(),
            nodes: default_nodes(),
            admin_private_key: None,
            domain: default_domain(),
            settle_delay_secs: None,
            blocks_dir: None,
            skip_block_export: false,
            request_timeout_secs: default_request_timeout_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            status_timeout_secs: default_status_timeout_secs(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("No node endpoints configured")]
    NoNodes,

    #[error("Suite {suite} needs at least {needed} nodes, {configured} configured")]
    NotEnoughNodes {
        suite: &'static str,
        needed: usize,
        configured: usize,
    },

    #[error("Invalid node endpoint in {source_name}: {reason}")]
    InvalidEndpoint { source_name: String, reason: String },

    #[error("Invalid admin private key: {0}")]
    InvalidAdminKey(String),

    #[error("The RPC backend needs the admin private key (--admin-private-key or {})", defaults::ENV_ADMIN_PRIVATE_KEY)]
    MissingAdminKey,

    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("Invalid {field}: {value} - must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid {field}: must not be empty")]
    Empty { field: &'static str },
}

pub type ValidationResult<T> = std::result::Result<T, ConfigValidationError>;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &HarnessConfig) -> ValidationResult<()> {
        if config.nodes.is_empty() {
            return Err(ConfigValidationError::NoNodes);
        }
        let needed = config.suite.min_nodes();
        if config.nodes.len() < needed {
            return Err(ConfigValidationError::NotEnoughNodes {
                suite: config.suite.name(),
                needed,
                configured: config.nodes.len(),
            });
        }

        match &config.admin_private_key {
            Some(key) => {
                KeyPair::from_hex(key)
                    .map_err(|e| ConfigValidationError::InvalidAdminKey(e.to_string()))?;
            }
            None if config.backend == Backend::Rpc => {
                return Err(ConfigValidationError::MissingAdminKey)
            }
            None => {}
        }

        DomainId::new(config.domain.clone()).map_err(|e| ConfigValidationError::InvalidDomain {
            domain: config.domain.clone(),
            reason: e.to_string(),
        })?;

        Self::validate_range(
            "request_timeout_secs",
            config.request_timeout_secs,
            defaults::MIN_TIMEOUT_SECS,
            defaults::MAX_TIMEOUT_SECS,
        )?;
        Self::validate_range(
            "connection_timeout_secs",
            config.connection_timeout_secs,
            defaults::MIN_TIMEOUT_SECS,
            defaults::MAX_TIMEOUT_SECS,
        )?;
        Self::validate_range(
            "status_timeout_secs",
            config.status_timeout_secs,
            defaults::MIN_TIMEOUT_SECS,
            defaults::MAX_TIMEOUT_SECS,
        )?;
        Self::validate_range(
            "status_poll_interval_ms",
            config.status_poll_interval_ms,
            defaults::MIN_POLL_INTERVAL_MS,
            defaults::MAX_POLL_INTERVAL_MS,
        )?;

        if !config.disable_file_logging && config.filename_log.trim().is_empty() {
            return Err(ConfigValidationError::Empty {
                field: "filename_log",
            });
        }
        Ok(())
    }

    fn validate_range(field: &'static str, value: u64, min: u64, max: u64) -> ValidationResult<()> {
        if value < min || value > max {
            return Err(ConfigValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

impl HarnessConfig {
    /// Load, override from the environment and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            anyhow!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let mut config: HarnessConfig = serde_json::from_str(&content).map_err(|e| {
            anyhow!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        config.finalize()?;
        Ok(config)
    }

    /// Apply environment overrides, then validate.
    pub fn finalize(&mut self) -> Result<()> {
        let overridden = self.apply_env_overrides(|key| std::env::var(key).ok())?;
        if overridden > 0 {
            info!("Applied {} setting(s) from the environment", overridden);
        }
        ConfigValidator::validate(self).context("Configuration validation failed")?;
        Ok(())
    }

    /// `MULTINODE_NODE_<n>` replaces the n-th node (1 based) or appends it
    /// right after the last one. `MULTINODE_ADMIN_PRIVATE_KEY` sets the
    /// administrator key. Returns how many values were taken.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ValidationResult<usize>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;

        // Stops at the first gap so the node list stays contiguous
        for n in 1.. {
            let key = format!("{}{}", defaults::ENV_NODE_PREFIX, n);
            let Some(value) = lookup(&key) else { break };
            let endpoint: NodeEndpoint =
                value
                    .parse()
                    .map_err(|reason| ConfigValidationError::InvalidEndpoint {
                        source_name: key.clone(),
                        reason,
                    })?;
            debug!("{} = {}", key, endpoint);
            if n <= self.nodes.len() {
                self.nodes[n - 1] = endpoint;
            } else {
                self.nodes.push(endpoint);
            }
            applied += 1;
        }

        if let Some(key) = lookup(defaults::ENV_ADMIN_PRIVATE_KEY) {
            self.admin_private_key = Some(key);
            applied += 1;
        }

        Ok(applied)
    }

    /// Write a commented template to `path`.
    pub fn generate_template<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut template = serde_json::to_value(HarnessConfig::default())?;
        if let Some(object) = template.as_object_mut() {
            object.insert(
                "_info".to_string(),
                serde_json::json!({
                    "description": "Multinode ledger probe configuration",
                    "suites": "malicious-client, network",
                    "backends": "local (in-process network), rpc (deployed network)",
                    "environment": format!(
                        "{}<n> overrides node n, {} sets the admin key",
                        defaults::ENV_NODE_PREFIX,
                        defaults::ENV_ADMIN_PRIVATE_KEY
                    ),
                }),
            );
        }

        let content = serde_json::to_string_pretty(&template)?;
        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write config template '{}': {}",
                path.as_ref().display(),
                e
            )
        })
    }

    pub fn to_rpc_client_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            status_poll_interval: Duration::from_millis(self.status_poll_interval_ms),
            status_timeout: Duration::from_secs(self.status_timeout_secs),
            ..Default::default()
        }
    }

    /// Administrator key from the configuration, or a fresh one when the
    /// harness starts its own network.
    pub fn admin_keypair(&self) -> Result<KeyPair> {
        match &self.admin_private_key {
            Some(key) => KeyPair::from_hex(key).context("Invalid admin private key"),
            None if self.backend == Backend::Local => Ok(KeyPair::generate()),
            None => Err(ConfigValidationError::MissingAdminKey.into()),
        }
    }

    pub fn suite_settings(&self) -> Result<SuiteSettings> {
        let settings = match self.suite {
            Suite::MaliciousClient => SuiteSettings::malicious_client()?,
            Suite::Network => SuiteSettings::network(self.nodes.len())?,
        };
        let mut settings = settings.with_domain(DomainId::new(self.domain.clone())?);
        if let Some(secs) = self.settle_delay_secs {
            settings = settings.with_settle_delay(Duration::from_secs(secs));
        }
        Ok(settings)
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.blocks_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_blocks_dir(self.suite.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn local() -> HarnessConfig {
        HarnessConfig {
            backend: Backend::Local,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_are_valid_for_local_backend() {
        let config = local();
        assert_eq!(config.nodes.len(), 4);
        assert_eq!(config.nodes[3].to_string(), "127.0.0.1:50054");
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_rpc_backend_needs_admin_key() {
        let config = HarnessConfig::default();
        assert_eq!(
            ConfigValidator::validate(&config),
            Err(ConfigValidationError::MissingAdminKey)
        );

        let config = HarnessConfig {
            admin_private_key: Some("zz".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigValidationError::InvalidAdminKey(_))
        ));
    }

    #[test]
    fn test_security_suite_needs_two_nodes() {
        let mut config = local();
        config.nodes.truncate(1);
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigValidationError::NotEnoughNodes { needed: 2, .. })
        ));

        config.suite = Suite::Network;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_timeout_range() {
        let config = HarnessConfig {
            status_poll_interval_ms: 1,
            ..local()
        };
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigValidationError::OutOfRange {
                field: "status_poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let key = KeyPair::generate().private_key().to_hex();
        let env: HashMap<String, String> = [
            ("MULTINODE_NODE_2", "10.0.0.2:50051"),
            ("MULTINODE_NODE_1", "10.0.0.1:50051"),
            // Not contiguous, ignored
            ("MULTINODE_NODE_7", "10.0.0.7:50051"),
            ("MULTINODE_ADMIN_PRIVATE_KEY", key.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = HarnessConfig::default();
        let applied = config.apply_env_overrides(|k| env.get(k).cloned()).unwrap();
        assert_eq!(applied, 3);
        assert_eq!(config.nodes[0].to_string(), "10.0.0.1:50051");
        assert_eq!(config.nodes[1].to_string(), "10.0.0.2:50051");
        assert_eq!(config.nodes[2].to_string(), "127.0.0.1:50053");
        assert_eq!(config.admin_private_key, Some(key));
    }

    #[test]
    fn test_bad_env_endpoint() {
        let mut config = HarnessConfig::default();
        let result = config.apply_env_overrides(|k| {
            (k == "MULTINODE_NODE_1").then(|| "no-port".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigValidationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.json");
        HarnessConfig::generate_template(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let config: HarnessConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(config.suite, Suite::MaliciousClient);
        assert_eq!(config.nodes.len(), 4);
    }

    #[test]
    fn test_blocks_dir_defaults_to_suite_name() {
        let mut config = local();
        assert_eq!(config.blocks_dir(), PathBuf::from("malicious_client_testing_logs"));
        config.suite = Suite::Network;
        assert_eq!(config.blocks_dir(), PathBuf::from("network_testing_logs"));
    }
}
