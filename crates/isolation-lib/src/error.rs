//! Error types for pod isolation control
//!
//! Every failure carries an [`ErrorKind`] tag so callers can branch on the
//! class of failure (e.g. to print usage on argument errors) without
//! inspecting message text.

use thiserror::Error;

/// Coarse classification of an [`IsolationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command line was incomplete, over-long or named no usable target
    Argument,
    /// Credentials or configuration could not be loaded
    Config,
    /// The node, the pod inventory or a pod's PID could not be resolved
    Resolution,
    /// The namespace-scoped command failed
    Execution,
}

/// Failures while turning a container reference into a PID
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("malformed container reference {reference:?}: {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("containerID is empty in reference {reference:?}")]
    EmptyContainerId { reference: String },

    #[error("container runtime client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("container {container_id} not found: {message}")]
    ContainerNotFound {
        container_id: String,
        message: String,
    },

    #[error("pid is 0, containerID is {container_id}")]
    ZeroPid { container_id: String },

    #[error("failed to inspect container {container_id}: {message}")]
    Inspect {
        container_id: String,
        message: String,
    },
}

/// Failures of the external namespace-scoped command
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch {program} for pid {pid}: {source}")]
    Spawn {
        program: String,
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("command for pid {pid} exited with {status}: {output}")]
    Failed {
        pid: u32,
        status: String,
        output: String,
    },
}

/// Top-level error for a single invocation
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("no command given")]
    MissingCommand,

    #[error("{verb} requires a pod name")]
    MissingPodName { verb: &'static str },

    #[error("{verb} accepts at most {max} argument(s), got {got}")]
    TooManyArguments {
        verb: &'static str,
        max: usize,
        got: usize,
    },

    #[error("found pod {name} in more than one namespace ({})", .namespaces.join(", "))]
    AmbiguousPod {
        name: String,
        namespaces: Vec<String>,
    },

    #[error("pod {} not found on this node", qualified(.namespace.as_deref(), .name))]
    PodNotFound {
        namespace: Option<String>,
        name: String,
    },

    #[error("{context}: {message}")]
    Config { context: String, message: String },

    #[error(
        "failed to identify the node by NODE_NAME or hostname: {last_error} (known nodes: {})",
        known_list(.known_nodes)
    )]
    NodeNotFound {
        last_error: String,
        known_nodes: Vec<String>,
    },

    #[error("node {node} has no InternalIP or ExternalIP address")]
    NodeAddressMissing { node: String },

    #[error("cluster API request failed: {0}")]
    ClusterApi(String),

    #[error("get pod pid failed for {pod} (pod IP {pod_ip}): {source}")]
    PidResolution {
        pod: String,
        pod_ip: String,
        #[source]
        source: RuntimeError,
    },

    #[error("pod {pod} exec cmd failed: {source}")]
    Execution {
        pod: String,
        #[source]
        source: ExecError,
    },
}

impl IsolationError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCommand
            | Self::MissingPodName { .. }
            | Self::TooManyArguments { .. }
            | Self::AmbiguousPod { .. }
            | Self::PodNotFound { .. } => ErrorKind::Argument,
            Self::Config { .. } => ErrorKind::Config,
            Self::NodeNotFound { .. }
            | Self::NodeAddressMissing { .. }
            | Self::ClusterApi(_)
            | Self::PidResolution { .. } => ErrorKind::Resolution,
            Self::Execution { .. } => ErrorKind::Execution,
        }
    }

    /// Whether the caller should follow this error with usage text.
    ///
    /// Only malformed command lines qualify; a well-formed request naming a
    /// pod that does not exist is not a usage problem.
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingCommand | Self::MissingPodName { .. } | Self::TooManyArguments { .. }
        )
    }

    pub(crate) fn config(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Config {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

fn qualified(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}

fn known_list(nodes: &[String]) -> String {
    if nodes.is_empty() {
        "none".to_string()
    } else {
        nodes.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, IsolationError>;
