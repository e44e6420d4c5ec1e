//! Runtime configuration
//!
//! Loaded once per invocation from `ISOLATION_*` environment variables (plus
//! the downward-API `NODE_NAME`) and threaded explicitly into the cluster
//! session and the executor.

use crate::error::{IsolationError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Kubeconfig used when not running with in-cluster credentials
pub const DEFAULT_KUBECONFIG: &str = "/etc/kubernetes/admin.conf";

/// Environment variable carrying the node-name hint
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Log output format for the binary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Configuration for a single invocation
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationConfig {
    /// Node name hint (Kubernetes downward API)
    #[serde(default)]
    pub node_name: Option<String>,

    /// Kubeconfig for out-of-cluster (node scope) sessions
    #[serde(default = "default_kubeconfig")]
    pub kubeconfig: PathBuf,

    /// Namespace-entry helper
    #[serde(default = "default_nsenter_path")]
    pub nsenter_path: String,

    /// Firewall-control program run inside the namespace
    #[serde(default = "default_iptables_path")]
    pub iptables_path: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_kubeconfig() -> PathBuf {
    PathBuf::from(DEFAULT_KUBECONFIG)
}

fn default_nsenter_path() -> String {
    "nsenter".to_string()
}

fn default_iptables_path() -> String {
    "iptables".to_string()
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            kubeconfig: default_kubeconfig(),
            nsenter_path: default_nsenter_path(),
            iptables_path: default_iptables_path(),
            log_format: LogFormat::default(),
        }
    }
}

impl IsolationConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(None)
    }

    /// Load configuration from an explicit variable map, or from the process
    /// environment when `source` is `None`
    pub fn from_environment(source: Option<config::Map<String, String>>) -> Result<Self> {
        let node_hint = match &source {
            Some(vars) => vars.get(NODE_NAME_ENV).cloned(),
            None => std::env::var(NODE_NAME_ENV).ok(),
        };

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("ISOLATION").source(source))
            .build()
            .map_err(|e| IsolationError::config("failed to read configuration", e))?;

        let mut loaded: IsolationConfig = settings
            .try_deserialize()
            .map_err(|e| IsolationError::config("invalid configuration", e))?;

        if loaded.node_name.is_none() {
            loaded.node_name = node_hint;
        }
        loaded.node_name = loaded.node_name.filter(|name| !name.trim().is_empty());

        Ok(loaded)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn with_overrides(
        mut self,
        node_name: Option<String>,
        kubeconfig: Option<PathBuf>,
        log_format: Option<LogFormat>,
    ) -> Self {
        if let Some(name) = node_name.filter(|n| !n.trim().is_empty()) {
            self.node_name = Some(name);
        }
        if let Some(path) = kubeconfig {
            self.kubeconfig = path;
        }
        if let Some(format) = log_format {
            self.log_format = format;
        }
        self
    }
}
