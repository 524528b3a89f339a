//! Graph construction and materialization.
//!
//! [`GraphBuilder`] consumes a set of root [`Module`](crate::module::Module)
//! descriptors and compiles them into an executable [`Graph`]: a
//! deduplicated arena of scheduler nodes with precede/succeed wiring,
//! condition branch ordering, and sub-module group specifications. The
//! compiled graph is handed to the runtime in
//! [`crate::runtimes`] for execution.

pub mod builder;
pub mod compilation;
pub mod graph;


pub use builder::GraphBuilder;
pub use compilation::CompileError;
pub use graph::Graph;
