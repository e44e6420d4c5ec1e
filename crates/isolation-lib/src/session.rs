//! Cluster session and API access
//!
//! A session is either scoped to the node (out-of-cluster credentials read
//! from the configured kubeconfig) or to the cluster (the pod's in-cluster
//! service account). The resulting client is wrapped in [`KubeCluster`],
//! which implements the [`ClusterApi`] capability consumed by node resolution
//! and the inventory builder.

use crate::config::IsolationConfig;
use crate::error::{IsolationError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::{debug, info};

/// Which credentials a session is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    /// Local kubeconfig; used for every per-pod and per-node verb
    Node,
    /// In-cluster service-account credentials; cluster-wide clear only
    Cluster,
}

impl SessionScope {
    pub fn in_cluster(self) -> bool {
        matches!(self, SessionScope::Cluster)
    }
}

/// Read-only cluster operations the isolation pipeline needs
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a Node by name
    async fn get_node(&self, name: &str) -> Result<Node>;

    /// List every Node in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List Pods across all namespaces
    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

/// Build an authenticated client for `scope`
pub async fn connect(scope: SessionScope, config: &IsolationConfig) -> Result<Client> {
    let client_config = if scope.in_cluster() {
        Config::incluster().map_err(|e| {
            IsolationError::config("unable to initialize in-cluster config", e)
        })?
    } else {
        let kubeconfig = Kubeconfig::read_from(&config.kubeconfig).map_err(|e| {
            IsolationError::config(
                format!(
                    "failed to build configuration from {}",
                    config.kubeconfig.display()
                ),
                e,
            )
        })?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| IsolationError::config("failed to build configuration from kubeconfig", e))?
    };

    info!(
        scope = ?scope,
        cluster_url = %client_config.cluster_url,
        "Connecting to cluster API"
    );

    Client::try_from(client_config)
        .map_err(|e| IsolationError::config("failed to create Kubernetes client", e))
}

/// [`ClusterApi`] backed by a live `kube` client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect and wrap in one step
    pub async fn connect(scope: SessionScope, config: &IsolationConfig) -> Result<Self> {
        Ok(Self::new(connect(scope, config).await?))
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_node(&self, name: &str) -> Result<Node> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        debug!(node = %name, "Fetching node");
        nodes
            .get(name)
            .await
            .map_err(|e| IsolationError::ClusterApi(format!("get node {}: {}", name, e)))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| IsolationError::ClusterApi(format!("list nodes: {}", e)))?;
        Ok(list.items)
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| IsolationError::ClusterApi(format!("list pods: {}", e)))?;
        debug!(count = list.items.len(), "Listed pods");
        Ok(list.items)
    }
}
