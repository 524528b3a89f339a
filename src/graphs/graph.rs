//! The materialized, executable node graph.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::body::Body;
use crate::module::Module;
use crate::ports::PortTable;
use crate::runtimes::{RunReport, Runner, RunnerError, RuntimeConfig};
use crate::types::{GroupMode, Priority};

/// A sub-module group carried by a grouping unit.
///
/// Members stay as descriptors; they are recursively materialized into a
/// nested graph at the moment the owning node is scheduled.
pub(crate) struct GroupSpec {
    pub(crate) members: Vec<Module>,
    pub(crate) mode: GroupMode,
}

/// One materialized scheduler node.
///
/// Exactly one `ExecNode` exists per distinct module name; adjacency is
/// expressed as dense indices into the graph's node arena.
pub(crate) struct ExecNode {
    pub(crate) name: Arc<str>,
    pub(crate) priority: Priority,
    pub(crate) body: Body,
    pub(crate) ports: PortTable,
    /// Successor ids in the source module's declaration order, which is the
    /// branch-index order for condition nodes.
    pub(crate) succ: Vec<usize>,
    /// Deduplicated predecessor ids; used for entry detection.
    pub(crate) preds: Vec<usize>,
    /// Number of non-condition predecessors; the node's join counter is
    /// (re)armed to this value.
    pub(crate) strong_preds: usize,
    pub(crate) group: Option<GroupSpec>,
}

/// Executable node graph produced by
/// [`GraphBuilder::compile`](crate::graphs::GraphBuilder::compile).
///
/// Nodes live in an arena shared with worker tasks; the graph itself is
/// immutable after compilation and can be run any number of times.
pub struct Graph {
    pub(crate) nodes: Arc<Vec<ExecNode>>,
    pub(crate) index: FxHashMap<String, usize>,
    pub(crate) config: RuntimeConfig,
}

impl Graph {
    /// Number of materialized nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of materialized edges after deduplication.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.succ.len()).sum()
    }

    /// Whether a module with this name was materialized.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Successor names of the named node, in declaration order.
    #[must_use]
    pub fn successors(&self, name: &str) -> Option<Vec<&str>> {
        let &id = self.index.get(name)?;
        Some(
            self.nodes[id]
                .succ
                .iter()
                .map(|&s| &*self.nodes[s].name)
                .collect(),
        )
    }

    /// Deduplicated predecessor names of the named node.
    #[must_use]
    pub fn predecessors(&self, name: &str) -> Option<Vec<&str>> {
        let &id = self.index.get(name)?;
        Some(
            self.nodes[id]
                .preds
                .iter()
                .map(|&p| &*self.nodes[p].name)
                .collect(),
        )
    }

    /// The runtime configuration the graph was compiled with.
    #[must_use]
    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs the graph to quiescence on the current tokio runtime.
    ///
    /// Returns only after every node, including detached sub-module groups,
    /// has finished. There is no cancellation; completion is observed by
    /// awaiting this call.
    pub async fn run(&self) -> Result<RunReport, RunnerError> {
        Runner::new(self.config.clone()).run(self).await
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("workers", &self.config.workers())
            .finish()
    }
}
