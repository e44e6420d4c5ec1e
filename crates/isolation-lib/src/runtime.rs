//! Container runtime PID resolution
//!
//! Pods report their containers as runtime-qualified references such as
//! `docker://3f4e…`. A [`PidResolver`] turns such a reference into the PID
//! whose network namespace the pod shares.

use crate::error::RuntimeError;
use async_trait::async_trait;
use bollard::container::InspectContainerOptions;
use bollard::Docker;
use tracing::debug;

/// A parsed `<runtime>://<container-id>` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub runtime: String,
    pub container_id: String,
}

impl ContainerRef {
    pub fn parse(reference: &str) -> Result<Self, RuntimeError> {
        let malformed = |reason: &str| RuntimeError::MalformedReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (runtime, container_id) = reference
            .trim()
            .split_once("://")
            .ok_or_else(|| malformed("expected <runtime>://<container-id>"))?;

        if runtime.is_empty() {
            return Err(malformed("runtime scheme is empty"));
        }
        if container_id.is_empty() {
            return Err(RuntimeError::EmptyContainerId {
                reference: reference.to_string(),
            });
        }
        if container_id.contains('/') {
            return Err(malformed("container id must not contain '/'"));
        }

        Ok(Self {
            runtime: runtime.to_ascii_lowercase(),
            container_id: container_id.to_string(),
        })
    }
}

/// Resolves container references to host PIDs
#[async_trait]
pub trait PidResolver: Send + Sync {
    /// PID of the container's primary process; never returns 0
    async fn resolve(&self, container_ref: &str) -> Result<u32, RuntimeError>;
}

/// Resolver backed by the Docker Engine API.
///
/// Connects with the local defaults (`DOCKER_HOST` or the default unix
/// socket). A connection is opened per resolution and dropped when the call
/// returns.
#[derive(Debug, Clone, Default)]
pub struct DockerPidResolver;

impl DockerPidResolver {
    pub const RUNTIME: &'static str = "docker";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PidResolver for DockerPidResolver {
    async fn resolve(&self, container_ref: &str) -> Result<u32, RuntimeError> {
        let parsed = ContainerRef::parse(container_ref)?;
        if parsed.runtime != Self::RUNTIME {
            return Err(RuntimeError::ClientUnavailable(format!(
                "no client for container runtime {:?}",
                parsed.runtime
            )));
        }

        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::ClientUnavailable(e.to_string()))?;

        let inspect = docker
            .inspect_container(&parsed.container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    message,
                } => RuntimeError::ContainerNotFound {
                    container_id: parsed.container_id.clone(),
                    message,
                },
                other => RuntimeError::Inspect {
                    container_id: parsed.container_id.clone(),
                    message: other.to_string(),
                },
            })?;

        let raw_pid = inspect.state.and_then(|state| state.pid).unwrap_or(0);
        let pid = pid_from_state(&parsed.container_id, raw_pid)?;

        debug!(container_id = %parsed.container_id, pid, "Resolved container pid");
        Ok(pid)
    }
}

/// Validate a runtime-reported PID; zero means the container is not running
pub fn pid_from_state(container_id: &str, raw_pid: i64) -> Result<u32, RuntimeError> {
    match u32::try_from(raw_pid) {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(RuntimeError::ZeroPid {
            container_id: container_id.to_string(),
        }),
    }
}
