//! Graph discovery and materialization.
//!
//! Compilation turns the declarative descriptor web into the executable node
//! arena. The traversal is a depth-first walk from each declared root with a
//! visited set keyed by module identity, so cycles (condition back-edges) and
//! multi-root re-entry are safe and every node is processed exactly once.
//!
//! Traversal order is fixed: a node's successors are queued before its
//! predecessors. Either order would discover the same reachable set; the
//! hard requirement is that both directions are covered and that a neighbor
//! discovered through one direction still gets its own full traversal.
//! Fixing one order keeps diagnostics and materialization deterministic.
//!
//! Successor lists are materialized from each source module's own `next`
//! list, never from the discovery path, so declaration order (and therefore
//! the branch-index correspondence of condition nodes) is authoritative no
//! matter which direction a node was reached from. Edges are deduplicated by
//! their ordered (source, destination) id pair: declaring the same edge twice
//! (including once via `before` and once via `after`) collapses to one
//! materialized edge, which keeps diamond-shaped dependencies from producing
//! parallel duplicate edges in the scheduler.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use super::builder::GraphBuilder;
use super::graph::{ExecNode, Graph, GroupSpec};
use crate::module::Module;

/// Errors detected while compiling a descriptor set into a [`Graph`].
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    /// The builder was given no roots.
    #[error("graph has no root modules")]
    #[diagnostic(
        code(taskmesh::graphs::empty),
        help("Add at least one root with GraphBuilder::add_root.")
    )]
    EmptyGraph,

    /// Two distinct descriptors share one identity name.
    #[error("duplicate module name in graph: {name:?}")]
    #[diagnostic(
        code(taskmesh::graphs::duplicate_name),
        help("Module names are identity; give each descriptor a unique name.")
    )]
    DuplicateName { name: String },

    /// Condition result and sub-grouping are mutually exclusive; this is
    /// normally rejected at wiring time and re-checked here.
    #[error("condition module {name:?} cannot own a sub-module group")]
    #[diagnostic(code(taskmesh::graphs::condition_with_group))]
    ConditionWithGroup { name: String },
}

/// Resolves a descriptor to its dense id, registering it on first sight.
///
/// The identity key is the name; a second *distinct* descriptor under an
/// already-registered name is a configuration error.
fn intern(
    module: &Module,
    index: &mut FxHashMap<String, usize>,
    modules: &mut Vec<Module>,
) -> Result<usize, CompileError> {
    if let Some(&id) = index.get(module.name()) {
        if !Module::ptr_eq(&modules[id], module) {
            return Err(CompileError::DuplicateName {
                name: module.name().to_string(),
            });
        }
        return Ok(id);
    }
    let id = modules.len();
    index.insert(module.name().to_string(), id);
    modules.push(module.clone());
    Ok(id)
}

impl GraphBuilder {
    /// Compiles the declared roots into an executable [`Graph`].
    ///
    /// Discovers every module reachable from the roots through successor or
    /// predecessor links, materializes each exactly once, and wires
    /// deduplicated edges. An isolated module (no edges at all) is
    /// materialized as a single entry node.
    ///
    /// # Errors
    ///
    /// See [`CompileError`] for the configuration mistakes rejected here.
    #[instrument(skip_all)]
    pub fn compile(self) -> Result<Graph, CompileError> {
        let (roots, config) = self.into_parts();
        if roots.is_empty() {
            return Err(CompileError::EmptyGraph);
        }

        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut modules: Vec<Module> = Vec::new();
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut stack: Vec<Module> = roots.iter().rev().cloned().collect();

        while let Some(module) = stack.pop() {
            let id = intern(&module, &mut index, &mut modules)?;
            if !seen.insert(id) {
                continue;
            }
            let snapshot = module.snapshot();
            // Successors before predecessors: the LIFO stack visits the last
            // push first, so predecessors go on first.
            for pred in snapshot.prev.iter().rev() {
                stack.push(pred.clone());
            }
            for succ in snapshot.next.iter().rev() {
                stack.push(succ.clone());
            }
        }

        let mut nodes: Vec<ExecNode> = Vec::with_capacity(modules.len());
        for id in 0..modules.len() {
            let module = modules[id].clone();
            let snapshot = module.snapshot();

            if module.is_condition() && !snapshot.group.is_empty() {
                return Err(CompileError::ConditionWithGroup {
                    name: module.name().to_string(),
                });
            }

            // Materialize successors from the source's own declaration
            // order; the first occurrence of a duplicate edge wins.
            let mut succ: Vec<usize> = Vec::with_capacity(snapshot.next.len());
            let mut succ_seen: FxHashSet<usize> = FxHashSet::default();
            for target in &snapshot.next {
                let dst = intern(target, &mut index, &mut modules)?;
                if succ_seen.insert(dst) {
                    succ.push(dst);
                }
            }

            let mut preds: Vec<usize> = Vec::with_capacity(snapshot.prev.len());
            let mut pred_seen: FxHashSet<usize> = FxHashSet::default();
            for source in &snapshot.prev {
                let src = intern(source, &mut index, &mut modules)?;
                if pred_seen.insert(src) {
                    preds.push(src);
                }
            }
            let strong_preds = preds
                .iter()
                .filter(|&&p| !modules[p].is_condition())
                .count();

            let group = if snapshot.group.is_empty() {
                None
            } else {
                Some(GroupSpec {
                    members: snapshot.group,
                    mode: snapshot.group_mode,
                })
            };

            nodes.push(ExecNode {
                name: module.name_arc(),
                priority: snapshot.priority,
                body: module.body(),
                ports: module.ports().clone(),
                succ,
                preds,
                strong_preds,
                group,
            });
        }

        let graph = Graph {
            nodes: Arc::new(nodes),
            index,
            config,
        };
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "compiled task graph"
        );
        Ok(graph)
    }
}
