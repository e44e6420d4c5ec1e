//! Pod inventory for the local node
//!
//! Lists pods once, keeps the ones eligible for isolation control on this
//! node and resolves each to the PID that owns its network namespace.

use crate::error::{IsolationError, Result};
use crate::models::{NodeIdentity, PodRecord, ResolvedTarget};
use crate::runtime::PidResolver;
use crate::session::ClusterApi;
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

impl From<&Pod> for PodRecord {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();

        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false);

        let container_ref = status
            .and_then(|s| s.container_statuses.as_ref())
            .and_then(|statuses| statuses.first())
            .and_then(|first| first.container_id.clone())
            .unwrap_or_default();

        PodRecord {
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            name: pod.metadata.name.clone().unwrap_or_default(),
            host_ip: status.and_then(|s| s.host_ip.clone()),
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            host_network: pod
                .spec
                .as_ref()
                .and_then(|spec| spec.host_network)
                .unwrap_or(false),
            ready,
            container_ref,
        }
    }
}

/// Keep the pods eligible on `node`, in list order
pub fn eligible_pods(pods: &[Pod], node: &NodeIdentity) -> Vec<PodRecord> {
    pods.iter()
        .map(PodRecord::from)
        .filter(|record| {
            let eligible = record.is_eligible_on(node);
            if !eligible {
                debug!(
                    namespace = %record.namespace,
                    pod = %record.name,
                    host_ip = ?record.host_ip,
                    host_network = record.host_network,
                    ready = record.ready,
                    "Skipping ineligible pod"
                );
            }
            eligible
        })
        .collect()
}

/// Build the resolved inventory for `node`.
///
/// Any PID-resolution failure for an eligible pod fails the whole build so
/// that callers never act on a partial inventory.
pub async fn build_inventory<C, R>(
    cluster: &C,
    resolver: &R,
    node: &NodeIdentity,
) -> Result<Vec<ResolvedTarget>>
where
    C: ClusterApi + ?Sized,
    R: PidResolver + ?Sized,
{
    let pods = cluster.list_pods().await?;
    let eligible = eligible_pods(&pods, node);

    let mut targets = Vec::with_capacity(eligible.len());
    for record in eligible {
        let pid = resolver
            .resolve(&record.container_ref)
            .await
            .map_err(|source| IsolationError::PidResolution {
                pod: format!("{}/{}", record.namespace, record.name),
                pod_ip: record.pod_ip.clone().unwrap_or_default(),
                source,
            })?;

        targets.push(ResolvedTarget {
            namespace: record.namespace,
            name: record.name,
            pid,
        });
    }

    info!(
        node = %node.name,
        listed = pods.len(),
        eligible = targets.len(),
        "Built pod inventory"
    );
    Ok(targets)
}
