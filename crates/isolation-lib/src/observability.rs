//! Structured run logging
//!
//! One start and one completion event per invocation, plus one event per
//! namespace command, all carrying the same `node` and `verb` fields so a
//! DaemonSet's JSON logs can be grouped by run.

use crate::error::IsolationError;
use crate::models::{DispatchOutcome, ResolvedTarget};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Structured logger for one dispatch run
#[derive(Clone)]
pub struct RunLogger {
    node_name: String,
    verb: &'static str,
    started_at: DateTime<Utc>,
}

impl RunLogger {
    pub fn new(node_name: impl Into<String>, verb: &'static str) -> Self {
        Self {
            node_name: node_name.into(),
            verb,
            started_at: Utc::now(),
        }
    }

    /// Record the resolved node name; until then the node hint is used
    pub fn set_node(&mut self, node_name: &str) {
        self.node_name = node_name.to_string();
    }

    fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    /// Log the start of a run with the size of the resolved inventory
    pub fn log_run_started(&self, inventory_size: usize) {
        info!(
            event = "run_started",
            node = %self.node_name,
            verb = self.verb,
            inventory_size = inventory_size,
            "Pod isolation run started"
        );
    }

    /// Log one namespace command against a target
    pub fn log_target_done(&self, target: &ResolvedTarget) {
        debug!(
            event = "target_done",
            node = %self.node_name,
            verb = self.verb,
            namespace = %target.namespace,
            pod_name = %target.name,
            pid = target.pid,
            "Namespace command succeeded"
        );
    }

    /// Log a finished run
    pub fn log_run_completed(&self, outcome: &DispatchOutcome) {
        let targets = match outcome {
            DispatchOutcome::Inspected { .. } => 1,
            DispatchOutcome::Cleared { targets } => *targets,
        };
        info!(
            event = "run_completed",
            node = %self.node_name,
            verb = self.verb,
            targets = targets,
            elapsed_ms = self.elapsed_ms(),
            "Pod isolation run completed"
        );
    }

    /// Log a failed run. The binary reports the error itself, so this stays
    /// below the default filter.
    pub fn log_run_failed(&self, err: &IsolationError) {
        info!(
            event = "run_failed",
            node = %self.node_name,
            verb = self.verb,
            kind = ?err.kind(),
            error = %err,
            elapsed_ms = self.elapsed_ms(),
            "Pod isolation run failed"
        );
    }
}
