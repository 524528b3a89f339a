//! GraphBuilder: the fluent entry point for compiling task graphs.

use crate::module::Module;
use crate::runtimes::RuntimeConfig;

/// Builder turning declaratively wired [`Module`]s into an executable
/// [`Graph`](crate::graphs::Graph).
///
/// Roots are starting points for discovery, not necessarily entry nodes of
/// execution: every module reachable from a root through successor **or**
/// predecessor links is materialized, so handing the builder any one module
/// of a connected component is enough to capture the whole component.
///
/// # Examples
///
/// ```rust
/// use taskmesh::graphs::GraphBuilder;
/// use taskmesh::module::Module;
///
/// let a = Module::task_fn("a", |_ctx| async { Ok(()) });
/// let b = Module::task_fn("b", |_ctx| async { Ok(()) });
/// a.before(&[&b]);
///
/// let graph = GraphBuilder::new()
///     .add_root(&a)
///     .with_workers(4)
///     .compile()
///     .unwrap();
/// assert_eq!(graph.node_count(), 2);
/// ```
pub struct GraphBuilder {
    roots: Vec<Module>,
    config: RuntimeConfig,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates an empty builder with default runtime configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// Adds a root module for graph discovery.
    #[must_use]
    pub fn add_root(mut self, root: &Module) -> Self {
        self.roots.push(root.clone());
        self
    }

    /// Adds several roots at once, preserving iteration order.
    #[must_use]
    pub fn add_roots<'a>(mut self, roots: impl IntoIterator<Item = &'a Module>) -> Self {
        self.roots.extend(roots.into_iter().cloned());
        self
    }

    /// Sets the worker count carried into the compiled graph's runtime
    /// configuration. `0` means the host's available hardware concurrency.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config = RuntimeConfig::new(workers);
        self
    }

    /// Replaces the runtime configuration wholesale.
    #[must_use]
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<Module>, RuntimeConfig) {
        (self.roots, self.config)
    }
}
