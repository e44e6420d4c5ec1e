//! Core data models for pod isolation control

use std::net::IpAddr;

/// The cluster's record of the local host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub name: String,
    pub ip: IpAddr,
}

/// A pod as seen by the eligibility filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub namespace: String,
    pub name: String,
    pub host_ip: Option<String>,
    pub pod_ip: Option<String>,
    pub host_network: bool,
    pub ready: bool,
    /// Runtime-qualified id of the first container status, empty if none
    pub container_ref: String,
}

impl PodRecord {
    /// Whether this pod is subject to isolation control on `node`
    pub fn is_eligible_on(&self, node: &NodeIdentity) -> bool {
        let on_node = self
            .host_ip
            .as_deref()
            .and_then(|ip| ip.parse::<IpAddr>().ok())
            .map(|ip| ip == node.ip)
            .unwrap_or(false);

        on_node && !self.host_network && self.ready
    }
}

/// An eligible pod with its network-namespace PID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub namespace: String,
    pub name: String,
    pub pid: u32,
}

impl ResolvedTarget {
    /// `namespace/name`
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// What to run inside a pod's network namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// List the firewall rules
    Inspect,
    /// Flush the firewall rules
    Clear,
}

/// Result of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Captured listing for one pod
    Inspected {
        target: ResolvedTarget,
        output: String,
    },
    /// Number of pods whose rules were flushed
    Cleared { targets: usize },
}
