//! In-memory fakes and fixtures shared by the unit tests

use crate::error::{ExecError, IsolationError, Result, RuntimeError};
use crate::models::{ExecMode, NodeIdentity};
use crate::executor::NamespaceExecutor;
use crate::runtime::{ContainerRef, PidResolver};
use crate::session::ClusterApi;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ContainerStatus, Node, NodeAddress, NodeStatus, Pod, PodCondition, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

pub const LOCAL_NODE_IP: &str = "192.168.1.10";

pub fn local_node() -> NodeIdentity {
    NodeIdentity {
        name: "worker-1".to_string(),
        ip: LOCAL_NODE_IP.parse().unwrap(),
    }
}

pub fn node(name: &str, addresses: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            addresses: Some(
                addresses
                    .iter()
                    .map(|(kind, address)| NodeAddress {
                        type_: kind.to_string(),
                        address: address.to_string(),
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A ready, pod-network pod on the local node
pub fn pod(namespace: &str, name: &str, container_ref: &str) -> Pod {
    PodSpecBuilder::new(namespace, name)
        .host_ip(LOCAL_NODE_IP)
        .container(container_ref)
        .build()
}

pub struct PodSpecBuilder {
    namespace: String,
    name: String,
    host_ip: Option<String>,
    host_network: bool,
    ready_status: Option<String>,
    container_ref: Option<String>,
}

impl PodSpecBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            host_ip: None,
            host_network: false,
            ready_status: Some("True".to_string()),
            container_ref: None,
        }
    }

    pub fn host_ip(mut self, ip: &str) -> Self {
        self.host_ip = Some(ip.to_string());
        self
    }

    pub fn host_network(mut self) -> Self {
        self.host_network = true;
        self
    }

    pub fn ready_status(mut self, status: &str) -> Self {
        self.ready_status = Some(status.to_string());
        self
    }

    pub fn no_conditions(mut self) -> Self {
        self.ready_status = None;
        self
    }

    pub fn container(mut self, container_ref: &str) -> Self {
        self.container_ref = Some(container_ref.to_string());
        self
    }

    pub fn build(self) -> Pod {
        let conditions = self.ready_status.map(|status| {
            vec![
                PodCondition {
                    type_: "PodScheduled".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                },
                PodCondition {
                    type_: "Ready".to_string(),
                    status,
                    ..Default::default()
                },
            ]
        });

        let container_statuses = self.container_ref.map(|container_id| {
            vec![ContainerStatus {
                name: "main".to_string(),
                container_id: Some(container_id),
                ready: true,
                ..Default::default()
            }]
        });

        Pod {
            metadata: ObjectMeta {
                namespace: Some(self.namespace),
                name: Some(self.name),
                ..Default::default()
            },
            spec: Some(PodSpec {
                host_network: Some(self.host_network),
                ..Default::default()
            }),
            status: Some(PodStatus {
                host_ip: self.host_ip,
                pod_ip: Some("10.244.1.5".to_string()),
                conditions,
                container_statuses,
                ..Default::default()
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeCluster {
    nodes: BTreeMap<String, Node>,
    pods: Vec<Pod>,
    fail_pod_list: bool,
    node_lists: AtomicUsize,
    pod_lists: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: Node) -> Self {
        let name = node.metadata.name.clone().unwrap_or_default();
        self.nodes.insert(name, node);
        self
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn failing_pod_list(mut self) -> Self {
        self.fail_pod_list = true;
        self
    }

    pub fn node_lists(&self) -> usize {
        self.node_lists.load(Ordering::SeqCst)
    }

    pub fn pod_lists(&self) -> usize {
        self.pod_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_node(&self, name: &str) -> Result<Node> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| IsolationError::ClusterApi(format!("nodes \"{}\" not found", name)))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.node_lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.values().cloned().collect())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.pod_lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_pod_list {
            return Err(IsolationError::ClusterApi("list pods: forbidden".to_string()));
        }
        Ok(self.pods.clone())
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pids: HashMap<String, u32>,
    errors: Mutex<HashMap<String, RuntimeError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pid(mut self, container_ref: &str, pid: u32) -> Self {
        self.pids.insert(container_ref.to_string(), pid);
        self
    }

    pub fn with_error(self, container_ref: &str, error: RuntimeError) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(container_ref.to_string(), error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PidResolver for FakeResolver {
    async fn resolve(&self, container_ref: &str) -> std::result::Result<u32, RuntimeError> {
        self.calls.lock().unwrap().push(container_ref.to_string());

        if let Some(err) = self.errors.lock().unwrap().remove(container_ref) {
            return Err(err);
        }
        let parsed = ContainerRef::parse(container_ref)?;
        self.pids
            .get(container_ref)
            .copied()
            .ok_or(RuntimeError::ContainerNotFound {
                container_id: parsed.container_id,
                message: "no such container".to_string(),
            })
    }
}

#[derive(Default)]
pub struct RecordingExecutor {
    outputs: HashMap<u32, String>,
    failing: HashSet<u32>,
    calls: Mutex<Vec<(u32, ExecMode)>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, pid: u32, output: &str) -> Self {
        self.outputs.insert(pid, output.to_string());
        self
    }

    pub fn failing_on(mut self, pid: u32) -> Self {
        self.failing.insert(pid);
        self
    }

    pub fn calls(&self) -> Vec<(u32, ExecMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NamespaceExecutor for RecordingExecutor {
    async fn run(&self, pid: u32, mode: ExecMode) -> std::result::Result<String, ExecError> {
        self.calls.lock().unwrap().push((pid, mode));

        if self.failing.contains(&pid) {
            return Err(ExecError::Failed {
                pid,
                status: "exit status: 1".to_string(),
                output: "iptables: Permission denied".to_string(),
            });
        }
        match mode {
            ExecMode::Inspect => Ok(self.outputs.get(&pid).cloned().unwrap_or_default()),
            ExecMode::Clear => Ok(String::new()),
        }
    }
}

/// In-memory sink for formatted tracing output
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a plain-text subscriber writing here for the current thread
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
