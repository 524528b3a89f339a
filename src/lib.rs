//! # Taskmesh: Declarative Task-Graph Orchestration
//!
//! Taskmesh is a framework for composing units of work into dependency
//! graphs and running them concurrently on tokio, with conditional routing,
//! nested sub-module groups, and typed concurrency-safe data ports.
//!
//! ## Core Concepts
//!
//! - **Modules**: Named async units of work wired by `before`/`after` edges
//! - **Conditions**: Modules whose result selects one successor edge,
//!   enabling branches and retry loops
//! - **Groups**: Sub-modules owned by a module, run as a nested graph
//!   synchronously (join) or in the background (detach)
//! - **Ports**: Typed single-value slots modules use to exchange data
//! - **Graph**: Deduplicating compiler from module descriptors to an
//!   executable node arena
//! - **Runner**: Priority-honoring worker pool that drives the graph to
//!   quiescence
//!
//! ## Quick Start
//!
//! ```
//! use taskmesh::graphs::GraphBuilder;
//! use taskmesh::module::Module;
//! use taskmesh::ports::Port;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let total = Port::atomic("total", 0u64);
//!
//! let produce = Module::task_fn("produce", |ctx| async move {
//!     ctx.write_output("total", 41u64)?;
//!     Ok(())
//! });
//! let consume = Module::task_fn("consume", |ctx| async move {
//!     let seen: u64 = ctx.read_input("total")?;
//!     ctx.write_output("total", seen + 1)?;
//!     Ok(())
//! });
//! total.output_of(&produce).input_of(&consume).output_of(&consume);
//!
//! produce.before(&[&consume]);
//!
//! let graph = GraphBuilder::new()
//!     .add_root(&produce)
//!     .with_workers(2)
//!     .compile()?;
//! let report = graph.run().await?;
//!
//! assert_eq!(report.runs("produce"), 1);
//! assert_eq!(total.get(), 42);
//! # Ok(())
//! # }
//! ```
//!
//! ### Conditional Routing
//!
//! A condition module returns a zero-based index into its successor edges in
//! declaration order. Routing back to an earlier module builds a retry loop:
//!
//! ```
//! use taskmesh::graphs::GraphBuilder;
//! use taskmesh::module::Module;
//! use taskmesh::ports::Port;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let attempts = Port::atomic("attempts", 0u32);
//!
//! let start = Module::task_fn("start", |_ctx| async move { Ok(()) });
//! let check = Module::condition_fn("check", |ctx| async move {
//!     let n: u32 = ctx.read_input("attempts")?;
//!     ctx.write_output("attempts", n + 1)?;
//!     Ok(if n + 1 < 3 { 0 } else { 1 })
//! });
//! let done = Module::task_fn("done", |_ctx| async move { Ok(()) });
//! attempts.input_of(&check).output_of(&check);
//!
//! // Edge 0 loops back, edge 1 proceeds.
//! start.before(&[&check]);
//! check.before(&[&check, &done]);
//!
//! let graph = GraphBuilder::new().add_root(&start).compile()?;
//! let report = graph.run().await?;
//! assert_eq!(report.runs("check"), 3);
//! assert_eq!(report.runs("done"), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`module`] - Module descriptors, wiring, and sub-module groups
//! - [`body`] - Task and condition body traits and the execution context
//! - [`ports`] - Typed ports and the per-module port registry
//! - [`graphs`] - Graph builder and compilation into the executable arena
//! - [`runtimes`] - Worker-pool runner, run reports, runtime configuration
//! - [`telemetry`] - Tracing subscriber setup helpers
//! - [`types`] - Shared enums (priority tiers, group modes)

pub mod body;
pub mod graphs;
pub mod module;
pub mod ports;
pub mod runtimes;
pub mod telemetry;
pub mod types;
