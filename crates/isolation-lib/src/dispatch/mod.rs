//! Command dispatch
//!
//! Turns positional arguments into a [`CommandRequest`], picks the session
//! scope for the verb, resolves the node and the pod inventory, selects the
//! target pods and runs the namespace command against each of them.

use crate::config::IsolationConfig;
use crate::error::{IsolationError, Result};
use crate::executor::{NamespaceExecutor, NsenterExecutor};
use crate::inventory::build_inventory;
use crate::models::{DispatchOutcome, ExecMode, ResolvedTarget};
use crate::node::resolve_node;
use crate::observability::RunLogger;
use crate::runtime::{DockerPidResolver, PidResolver};
use crate::session::{ClusterApi, KubeCluster, SessionScope};
use tracing::debug;


/// The fixed set of operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `show`: list one pod's rules
    Inspect,
    /// `clear`: flush one pod's rules
    ClearOne,
    /// `node-clear`: flush every eligible pod on this node
    ClearNode,
    /// `cluster-clear`: as `node-clear`, with in-cluster credentials
    ClearCluster,
}

impl Verb {
    /// Match a command-line word; `None` for anything unrecognized
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "show" => Some(Verb::Inspect),
            "clear" => Some(Verb::ClearOne),
            "node-clear" => Some(Verb::ClearNode),
            "cluster-clear" => Some(Verb::ClearCluster),
            _ => None,
        }
    }

    pub fn word(self) -> &'static str {
        match self {
            Verb::Inspect => "show",
            Verb::ClearOne => "clear",
            Verb::ClearNode => "node-clear",
            Verb::ClearCluster => "cluster-clear",
        }
    }

    /// Only the cluster-wide clear runs with in-cluster credentials
    pub fn session_scope(self) -> SessionScope {
        match self {
            Verb::ClearCluster => SessionScope::Cluster,
            _ => SessionScope::Node,
        }
    }

    pub fn mode(self) -> ExecMode {
        match self {
            Verb::Inspect => ExecMode::Inspect,
            _ => ExecMode::Clear,
        }
    }

    pub fn targets_single_pod(self) -> bool {
        matches!(self, Verb::Inspect | Verb::ClearOne)
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub verb: Verb,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl CommandRequest {
    /// Parse positional arguments (without the program name).
    ///
    /// Returns `Ok(None)` for an unrecognized verb, which callers answer with
    /// usage text and a successful exit.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Option<Self>> {
        let (word, operands) = match args.split_first() {
            Some((word, operands)) => (word.as_ref(), operands),
            None => return Err(IsolationError::MissingCommand),
        };

        let verb = match Verb::from_word(word) {
            Some(verb) => verb,
            None => return Ok(None),
        };

        let operands: Vec<&str> = operands.iter().map(|s| s.as_ref()).collect();

        let request = if verb.targets_single_pod() {
            match operands.as_slice() {
                [] => return Err(IsolationError::MissingPodName { verb: verb.word() }),
                [name] => Self {
                    verb,
                    namespace: None,
                    name: Some(name.to_string()),
                },
                [namespace, name] => Self {
                    verb,
                    namespace: Some(namespace.to_string()),
                    name: Some(name.to_string()),
                },
                _ => {
                    return Err(IsolationError::TooManyArguments {
                        verb: verb.word(),
                        max: 2,
                        got: operands.len(),
                    })
                }
            }
        } else {
            if !operands.is_empty() {
                return Err(IsolationError::TooManyArguments {
                    verb: verb.word(),
                    max: 0,
                    got: operands.len(),
                });
            }
            Self {
                verb,
                namespace: None,
                name: None,
            }
        };

        Ok(Some(request))
    }
}

/// Pick the targets of `request` from `inventory`
pub fn select_targets<'a>(
    request: &CommandRequest,
    inventory: &'a [ResolvedTarget],
) -> Result<Vec<&'a ResolvedTarget>> {
    if !request.verb.targets_single_pod() {
        return Ok(inventory.iter().collect());
    }

    let name = request
        .name
        .as_deref()
        .ok_or(IsolationError::MissingPodName {
            verb: request.verb.word(),
        })?;
    let not_found = || IsolationError::PodNotFound {
        namespace: request.namespace.clone(),
        name: name.to_string(),
    };

    if let Some(namespace) = request.namespace.as_deref() {
        return inventory
            .iter()
            .find(|t| t.name == name && t.namespace == namespace)
            .map(|t| vec![t])
            .ok_or_else(not_found);
    }

    let matches: Vec<&ResolvedTarget> = inventory.iter().filter(|t| t.name == name).collect();
    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches),
        _ => Err(IsolationError::AmbiguousPod {
            name: name.to_string(),
            namespaces: matches.iter().map(|t| t.namespace.clone()).collect(),
        }),
    }
}

/// Run the namespace command for `request` against an already-built
/// inventory. Multi-target clears stop at the first failure.
pub async fn execute<E>(
    request: &CommandRequest,
    inventory: &[ResolvedTarget],
    executor: &E,
    logger: &RunLogger,
) -> Result<DispatchOutcome>
where
    E: NamespaceExecutor + ?Sized,
{
    let targets = select_targets(request, inventory)?;
    let mode = request.verb.mode();

    if mode == ExecMode::Inspect {
        let target = targets[0];
        let output = executor
            .run(target.pid, mode)
            .await
            .map_err(|source| IsolationError::Execution {
                pod: target.name.clone(),
                source,
            })?;
        logger.log_target_done(target);
        return Ok(DispatchOutcome::Inspected {
            target: target.clone(),
            output,
        });
    }

    for target in &targets {
        debug!(pod = %target.qualified_name(), pid = target.pid, "Clearing rules");
        executor
            .run(target.pid, mode)
            .await
            .map_err(|source| IsolationError::Execution {
                pod: target.name.clone(),
                source,
            })?;
        logger.log_target_done(target);
    }

    Ok(DispatchOutcome::Cleared {
        targets: targets.len(),
    })
}

/// Dispatches requests against a set of capabilities
pub struct Dispatcher<'a, C: ?Sized, R: ?Sized, E: ?Sized> {
    cluster: &'a C,
    resolver: &'a R,
    executor: &'a E,
    node_hint: Option<&'a str>,
}

impl<'a, C, R, E> Dispatcher<'a, C, R, E>
where
    C: ClusterApi + ?Sized,
    R: PidResolver + ?Sized,
    E: NamespaceExecutor + ?Sized,
{
    pub fn new(cluster: &'a C, resolver: &'a R, executor: &'a E) -> Self {
        Self {
            cluster,
            resolver,
            executor,
            node_hint: None,
        }
    }

    pub fn with_node_hint(mut self, hint: Option<&'a str>) -> Self {
        self.node_hint = hint;
        self
    }

    /// Resolve the node once, build the inventory, then execute
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<DispatchOutcome> {
        let mut logger = RunLogger::new(self.node_hint.unwrap_or_default(), request.verb.word());

        let result = async {
            let node = resolve_node(self.cluster, self.node_hint).await?;
            logger.set_node(&node.name);
            let inventory = build_inventory(self.cluster, self.resolver, &node).await?;
            logger.log_run_started(inventory.len());
            execute(request, &inventory, self.executor, &logger).await
        }
        .await;

        match &result {
            Ok(outcome) => logger.log_run_completed(outcome),
            Err(err) => logger.log_run_failed(err),
        }
        result
    }
}

/// Connect with the verb's session scope and dispatch against the live
/// cluster, the Docker engine and `nsenter`
pub async fn run(request: &CommandRequest, config: &IsolationConfig) -> Result<DispatchOutcome> {
    let cluster = KubeCluster::connect(request.verb.session_scope(), config).await?;
    let resolver = DockerPidResolver::new();
    let executor = NsenterExecutor::from_config(config);

    Dispatcher::new(&cluster, &resolver, &executor)
        .with_node_hint(config.node_name.as_deref())
        .dispatch(request)
        .await
}
