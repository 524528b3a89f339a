//! Ready-queue executor for compiled graphs.
//!
//! The runner drives a [`Graph`] to quiescence on the tokio runtime. It
//! follows the join-counter discipline of classic task-graph executors:
//!
//! - a node's counter counts its *strong* (non-condition) predecessors;
//! - completion of a non-condition node decrements each successor's counter,
//!   and a counter reaching zero enqueues the successor and re-arms the
//!   counter for its next firing;
//! - completion of a condition node enqueues exactly the successor selected
//!   by the returned branch index, bypassing counters, which is what makes
//!   condition back-edges usable as retry/poll loops;
//! - the initial frontier is every node with no declared predecessors at
//!   all, so isolated nodes run exactly once.
//!
//! Ready nodes are dequeued from a priority heap (High > Normal > Low, FIFO
//! within a tier) and at most `workers` node bodies are in flight at once
//! per graph level. Sub-module groups are expanded into nested graphs when
//! their owner is scheduled and get their own worker budget; detached groups
//! run as independent tasks that the run still awaits before reporting
//! completion.

use futures_util::future::BoxFuture;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, instrument, trace};

use crate::body::{Body, ModuleCtx, ModuleError};
use crate::graphs::graph::{ExecNode, GroupSpec};
use crate::graphs::{CompileError, Graph, GraphBuilder};
use crate::types::{GroupMode, Priority};

use super::RuntimeConfig;

/// Errors surfaced by graph execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// Every materialized node has declared predecessors, so nothing can
    /// ever become ready.
    #[error("no entry modules to run (every node has declared predecessors)")]
    #[diagnostic(
        code(taskmesh::runner::no_entry_nodes),
        help("At least one module must have an empty predecessor list.")
    )]
    NoEntryNodes,

    /// A condition body selected a branch index outside its declared
    /// successor range. Rejected rather than clamped, consistently.
    #[error(
        "condition module {module:?} returned branch {index} but declares {successors} successor(s)"
    )]
    #[diagnostic(
        code(taskmesh::runner::branch_out_of_range),
        help("Branch indices are zero-based over the successor edges in declaration order.")
    )]
    BranchOutOfRange {
        module: String,
        index: usize,
        successors: usize,
    },

    /// A module body failed; fatal for the whole run.
    #[error("module {module:?} failed: {source}")]
    #[diagnostic(code(taskmesh::runner::module))]
    Module {
        module: String,
        #[source]
        source: ModuleError,
    },

    /// A sub-module group failed to compile when its owner was scheduled.
    #[error("sub-module group of {module:?} failed to compile")]
    #[diagnostic(code(taskmesh::runner::subgraph_compile))]
    SubGraph {
        module: String,
        #[source]
        source: Box<CompileError>,
    },

    /// A sub-module group failed while running.
    #[error("sub-module group of {module:?} failed")]
    #[diagnostic(code(taskmesh::runner::subgraph_run))]
    SubGraphRun {
        module: String,
        #[source]
        source: Box<RunnerError>,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task join error: {0}")]
    #[diagnostic(code(taskmesh::runner::join))]
    Join(#[from] JoinError),
}

/// Per-module invocation counts observed during one run.
///
/// Counts from nested sub-module groups (joined or detached) are merged in
/// by module name before the run returns.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    runs: FxHashMap<String, u64>,
}

impl RunReport {
    /// How many times the named module was invoked.
    #[must_use]
    pub fn runs(&self, module: &str) -> u64 {
        self.runs.get(module).copied().unwrap_or(0)
    }

    /// Total invocations across all modules.
    #[must_use]
    pub fn total_runs(&self) -> u64 {
        self.runs.values().sum()
    }

    /// Iterates `(module name, invocation count)` pairs in arbitrary order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, u64)> {
        self.runs.iter().map(|(name, &count)| (name.as_str(), count))
    }

    fn record(&mut self, module: &str) {
        *self.runs.entry(module.to_string()).or_insert(0) += 1;
    }

    fn merge(&mut self, other: RunReport) {
        for (module, count) in other.runs {
            *self.runs.entry(module).or_insert(0) += count;
        }
    }
}

/// Heap entry for the ready queue: higher priority first, FIFO within a
/// tier.
#[derive(Debug, PartialEq, Eq)]
struct Ready {
    priority: Priority,
    seq: u64,
    id: usize,
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What a finished node hands back to the coordinator.
struct NodeOutcome {
    id: usize,
    /// Branch index for condition nodes, `None` for plain tasks.
    branch: Option<usize>,
    /// Invocation counts of a joined sub-module group.
    group_report: Option<RunReport>,
    /// Handle of a detached sub-module group, awaited at end of run.
    detached: Option<JoinHandle<Result<RunReport, RunnerError>>>,
}

/// Executes compiled graphs.
///
/// Stateless apart from its configuration; a `Runner` (and the graph it
/// runs) can be reused across invocations.
pub struct Runner {
    config: RuntimeConfig,
}

impl Runner {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Runs `graph` to quiescence, including detached sub-module groups.
    #[instrument(skip_all, fields(nodes = graph.node_count()))]
    pub async fn run(&self, graph: &Graph) -> Result<RunReport, RunnerError> {
        let workers = self.config.resolve_workers();
        debug!(workers, "starting run");
        let report = run_nodes(Arc::clone(&graph.nodes), workers).await?;
        debug!(total_runs = report.total_runs(), "run complete");
        Ok(report)
    }
}

/// Recursively materializes a grouping unit's members into a nested graph.
fn build_subgraph(owner: &str, group: &GroupSpec) -> Result<Graph, RunnerError> {
    GraphBuilder::new()
        .add_roots(group.members.iter())
        .compile()
        .map_err(|source| RunnerError::SubGraph {
            module: owner.to_string(),
            source: Box::new(source),
        })
}

/// Runs one node: group expansion first, then the body.
async fn execute_node(
    nodes: Arc<Vec<ExecNode>>,
    id: usize,
    workers: usize,
) -> Result<NodeOutcome, RunnerError> {
    let node = &nodes[id];
    let mut group_report = None;
    let mut detached = None;

    if let Some(group) = &node.group {
        let subgraph = build_subgraph(&node.name, group)?;
        match group.mode {
            GroupMode::Join => {
                trace!(module = %node.name, "joining sub-module group");
                let report = run_nodes(Arc::clone(&subgraph.nodes), workers)
                    .await
                    .map_err(|source| RunnerError::SubGraphRun {
                        module: node.name.to_string(),
                        source: Box::new(source),
                    })?;
                group_report = Some(report);
            }
            GroupMode::Detach => {
                trace!(module = %node.name, "detaching sub-module group");
                detached = Some(tokio::spawn(run_nodes(
                    Arc::clone(&subgraph.nodes),
                    workers,
                )));
            }
        }
    }

    let ctx = ModuleCtx::new(Arc::clone(&node.name), node.ports.clone());
    let outcome = match &node.body {
        Body::Task(body) => body.run(ctx).await.map(|()| None),
        Body::Condition(body) => body.run(ctx).await.map(|index| {
            trace!(module = %node.name, index, "condition selected branch");
            Some(index)
        }),
    };
    let branch = match outcome {
        Ok(branch) => branch,
        Err(source) => {
            // The run is failing; the group just detached must not outlive it.
            if let Some(handle) = &detached {
                handle.abort();
            }
            return Err(RunnerError::Module {
                module: node.name.to_string(),
                source,
            });
        }
    };

    Ok(NodeOutcome {
        id,
        branch,
        group_report,
        detached,
    })
}

fn abort_detached(detached: &[JoinHandle<Result<RunReport, RunnerError>>]) {
    for handle in detached {
        handle.abort();
    }
}

/// Coordinator loop: dispatches ready nodes, applies completion effects, and
/// drains detached work. Boxed so grouping units can recurse through it.
fn run_nodes(
    nodes: Arc<Vec<ExecNode>>,
    workers: usize,
) -> BoxFuture<'static, Result<RunReport, RunnerError>> {
    Box::pin(async move {
        let mut report = RunReport::default();
        if nodes.is_empty() {
            return Ok(report);
        }

        let mut counters: Vec<usize> = nodes.iter().map(|n| n.strong_preds).collect();
        let mut ready: BinaryHeap<Ready> = BinaryHeap::new();
        let mut seq: u64 = 0;
        for (id, node) in nodes.iter().enumerate() {
            if node.preds.is_empty() {
                ready.push(Ready {
                    priority: node.priority,
                    seq,
                    id,
                });
                seq += 1;
            }
        }
        if ready.is_empty() {
            return Err(RunnerError::NoEntryNodes);
        }

        let mut running: JoinSet<Result<NodeOutcome, RunnerError>> = JoinSet::new();
        let mut detached: Vec<JoinHandle<Result<RunReport, RunnerError>>> = Vec::new();

        loop {
            while running.len() < workers {
                let Some(entry) = ready.pop() else { break };
                report.record(&nodes[entry.id].name);
                trace!(module = %nodes[entry.id].name, priority = %nodes[entry.id].priority, "dispatching");
                running.spawn(execute_node(Arc::clone(&nodes), entry.id, workers));
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    abort_detached(&detached);
                    return Err(err);
                }
                Err(join_err) => {
                    abort_detached(&detached);
                    return Err(RunnerError::Join(join_err));
                }
            };

            if let Some(group_report) = outcome.group_report {
                report.merge(group_report);
            }
            if let Some(handle) = outcome.detached {
                detached.push(handle);
            }

            let node = &nodes[outcome.id];
            match outcome.branch {
                Some(index) => {
                    if index >= node.succ.len() {
                        abort_detached(&detached);
                        return Err(RunnerError::BranchOutOfRange {
                            module: node.name.to_string(),
                            index,
                            successors: node.succ.len(),
                        });
                    }
                    let target = node.succ[index];
                    ready.push(Ready {
                        priority: nodes[target].priority,
                        seq,
                        id: target,
                    });
                    seq += 1;
                }
                None => {
                    for &target in &node.succ {
                        counters[target] = counters[target].saturating_sub(1);
                        if counters[target] == 0 {
                            // Re-arm for the next firing before enqueueing.
                            counters[target] = nodes[target].strong_preds;
                            ready.push(Ready {
                                priority: nodes[target].priority,
                                seq,
                                id: target,
                            });
                            seq += 1;
                        }
                    }
                }
            }
        }

        // The main frontier has quiesced; detached groups still count
        // toward completion.
        for handle in detached {
            match handle.await {
                Ok(Ok(group_report)) => report.merge(group_report),
                Ok(Err(err)) => return Err(err),
                Err(join_err) => return Err(RunnerError::Join(join_err)),
            }
        }

        Ok(report)
    })
}
