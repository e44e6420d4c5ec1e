//! Local node identity resolution

use crate::error::{IsolationError, Result};
use crate::models::NodeIdentity;
use crate::session::ClusterApi;
use k8s_openapi::api::core::v1::Node;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Resolve the Node object for this host.
///
/// Tries the node-name hint first, then the local hostname. When neither
/// names a Node the known node names are logged and carried in the error.
pub async fn resolve_node<C>(cluster: &C, hint: Option<&str>) -> Result<NodeIdentity>
where
    C: ClusterApi + ?Sized,
{
    resolve_node_with_hostname(cluster, hint, local_hostname()).await
}

/// [`resolve_node`] with an explicit hostname lookup result
pub async fn resolve_node_with_hostname<C>(
    cluster: &C,
    hint: Option<&str>,
    hostname: std::result::Result<String, String>,
) -> Result<NodeIdentity>
where
    C: ClusterApi + ?Sized,
{
    if let Some(name) = hint {
        match cluster.get_node(name).await {
            Ok(node) => return identity(&node),
            Err(e) => warn!(node = %name, error = %e, "Node from NODE_NAME not found, trying hostname"),
        }
    }

    let last_error = match hostname {
        Ok(hostname) => match cluster.get_node(&hostname).await {
            Ok(node) => return identity(&node),
            Err(e) => e.to_string(),
        },
        Err(e) => format!("hostname unavailable: {}", e),
    };

    let (last_error, known_nodes) = match cluster.list_nodes().await {
        Ok(nodes) => {
            let names: Vec<String> = nodes
                .iter()
                .filter_map(|node| node.metadata.name.clone())
                .collect();
            for name in &names {
                warn!(node = %name, "Known cluster node");
            }
            (last_error, names)
        }
        Err(e) => (
            format!("{}; listing nodes also failed: {}", last_error, e),
            Vec::new(),
        ),
    };

    Err(IsolationError::NodeNotFound {
        last_error,
        known_nodes,
    })
}

fn identity(node: &Node) -> Result<NodeIdentity> {
    let name = node.metadata.name.clone().unwrap_or_default();
    let ip = node_ip(node).ok_or_else(|| IsolationError::NodeAddressMissing { node: name.clone() })?;
    debug!(node = %name, ip = %ip, "Resolved local node");
    Ok(NodeIdentity { name, ip })
}

/// Primary address of a node: first InternalIP, else first ExternalIP
pub fn node_ip(node: &Node) -> Option<IpAddr> {
    let addresses = node.status.as_ref()?.addresses.as_ref()?;

    ["InternalIP", "ExternalIP"].iter().find_map(|kind| {
        addresses
            .iter()
            .filter(|a| a.type_ == *kind)
            .find_map(|a| a.address.parse().ok())
    })
}

fn local_hostname() -> std::result::Result<String, String> {
    nix::unistd::gethostname()
        .map_err(|e| e.to_string())?
        .into_string()
        .map_err(|raw| format!("hostname is not valid UTF-8: {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{node, FakeCluster};

    #[tokio::test]
    async fn test_hint_wins() {
        let cluster = FakeCluster::new()
            .with_node(node("worker-1", &[("InternalIP", "192.168.1.10")]))
            .with_node(node("host-a", &[("InternalIP", "192.168.1.20")]));

        let identity =
            resolve_node_with_hostname(&cluster, Some("worker-1"), Ok("host-a".to_string()))
                .await
                .unwrap();

        assert_eq!(identity.name, "worker-1");
        assert_eq!(identity.ip.to_string(), "192.168.1.10");
        assert_eq!(cluster.node_lists(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_hostname() {
        let cluster =
            FakeCluster::new().with_node(node("host-a", &[("InternalIP", "192.168.1.20")]));

        let identity =
            resolve_node_with_hostname(&cluster, Some("missing"), Ok("host-a".to_string()))
                .await
                .unwrap();

        assert_eq!(identity.name, "host-a");
    }

    #[tokio::test]
    async fn test_fails_after_listing_nodes() {
        let cluster =
            FakeCluster::new().with_node(node("other", &[("InternalIP", "192.168.1.30")]));

        let err = resolve_node_with_hostname(&cluster, None, Ok("host-a".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.to_string().contains("host-a"));
        assert_eq!(cluster.node_lists(), 1);
    }

    #[tokio::test]
    async fn test_failure_names_known_nodes() {
        let cluster = FakeCluster::new()
            .with_node(node("worker-1", &[("InternalIP", "192.168.1.10")]))
            .with_node(node("worker-2", &[("InternalIP", "192.168.1.11")]));

        let err = resolve_node_with_hostname(&cluster, Some("stale"), Ok("host-a".to_string()))
            .await
            .unwrap_err();

        match &err {
            IsolationError::NodeNotFound { known_nodes, .. } => {
                assert_eq!(known_nodes, &["worker-1", "worker-2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("known nodes: worker-1, worker-2"));
    }

    #[tokio::test]
    async fn test_hostname_error_is_reported() {
        let cluster = FakeCluster::new();

        let err = resolve_node_with_hostname(&cluster, None, Err("EPERM".to_string()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("hostname unavailable: EPERM"));
    }

    #[tokio::test]
    async fn test_node_without_address_is_fatal() {
        let cluster = FakeCluster::new().with_node(node("worker-1", &[("Hostname", "worker-1")]));

        let err = resolve_node_with_hostname(&cluster, Some("worker-1"), Ok("x".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, IsolationError::NodeAddressMissing { .. }));
    }

    #[test]
    fn test_node_ip_prefers_internal() {
        let n = node(
            "worker-1",
            &[("ExternalIP", "203.0.113.7"), ("InternalIP", "10.0.0.7")],
        );
        assert_eq!(node_ip(&n).unwrap().to_string(), "10.0.0.7");

        let external_only = node("worker-2", &[("ExternalIP", "203.0.113.8")]);
        assert_eq!(node_ip(&external_only).unwrap().to_string(), "203.0.113.8");
    }
}
