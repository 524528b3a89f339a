//! Module bodies: the business logic invoked once a node becomes ready.
//!
//! Bodies come in two execution shapes:
//!
//! - [`TaskBody`]: ordinary work; the return value carries no routing
//!   information and all declared successors are activated on completion.
//! - [`ConditionBody`]: yields a zero-based branch index selecting which
//!   declared successor edge is taken.
//!
//! Both receive a [`ModuleCtx`] granting typed access to the owning module's
//! port registry. Closure adapters ([`Module::task_fn`] /
//! [`Module::condition_fn`]) cover the common case where a full trait impl is
//! overkill.
//!
//! # Error Handling
//!
//! Bodies return [`ModuleError`] for fatal failures; the runner halts the run
//! and surfaces the error with the module's name attached. Port lookup
//! failures convert implicitly, so a missing or mistyped wiring propagates
//! with `?` as a fatal contract violation.
//!
//! [`Module::task_fn`]: crate::module::Module::task_fn
//! [`Module::condition_fn`]: crate::module::Module::condition_fn

use async_trait::async_trait;
use miette::Diagnostic;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ports::{PortError, PortTable};

/// Fixed sleep between polls in [`ModuleCtx::wait_input`].
///
/// Bounded busy-polling is a deliberate simplicity/latency tradeoff; see the
/// method docs for the contract a replacement must preserve.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An ordinary unit of work.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use taskmesh::body::{ModuleCtx, ModuleError, TaskBody};
///
/// struct FlashSoc;
///
/// #[async_trait]
/// impl TaskBody for FlashSoc {
///     async fn run(&self, ctx: ModuleCtx) -> Result<(), ModuleError> {
///         ctx.write_output("progress", 100_u32)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskBody: Send + Sync {
    /// Execute this body. The return value carries no routing information.
    async fn run(&self, ctx: ModuleCtx) -> Result<(), ModuleError>;
}

/// A branch-selecting unit of work.
///
/// The returned index is zero-based and refers to the owning module's
/// successor edges in declaration order. An index outside the declared range
/// is rejected by the runner as a fatal error.
#[async_trait]
pub trait ConditionBody: Send + Sync {
    /// Execute this body and select the successor edge to activate.
    async fn run(&self, ctx: ModuleCtx) -> Result<usize, ModuleError>;
}

/// Execution shape of a module, fixed at construction.
///
/// Keeping the shape in the type (rather than a runtime flag next to a
/// unified return value) makes "condition result" and "plain completion"
/// impossible to confuse.
#[derive(Clone)]
pub(crate) enum Body {
    Task(Arc<dyn TaskBody>),
    Condition(Arc<dyn ConditionBody>),
}

impl Body {
    pub(crate) fn is_condition(&self) -> bool {
        matches!(self, Body::Condition(_))
    }
}

/// Adapter turning an async closure into a [`TaskBody`].
pub(crate) struct FnTask<F> {
    f: F,
}

impl<F> FnTask<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskBody for FnTask<F>
where
    F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
{
    async fn run(&self, ctx: ModuleCtx) -> Result<(), ModuleError> {
        (self.f)(ctx).await
    }
}

/// Adapter turning an async closure into a [`ConditionBody`].
pub(crate) struct FnCondition<F> {
    f: F,
}

impl<F> FnCondition<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ConditionBody for FnCondition<F>
where
    F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<usize, ModuleError>> + Send + 'static,
{
    async fn run(&self, ctx: ModuleCtx) -> Result<usize, ModuleError> {
        (self.f)(ctx).await
    }
}

/// Execution context handed to a body when its node runs.
///
/// Grants typed access to the owning module's port registry; there is no
/// ambient global state. The context is cheap to clone.
#[derive(Clone, Debug)]
pub struct ModuleCtx {
    name: Arc<str>,
    ports: PortTable,
}

impl ModuleCtx {
    pub(crate) fn new(name: Arc<str>, ports: PortTable) -> Self {
        Self { name, ports }
    }

    /// Name of the module this body belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning module's port registry.
    #[must_use]
    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    /// Resolves a typed handle to the named input port.
    pub fn input<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<crate::ports::Port<T>, ModuleError> {
        Ok(self.ports.input::<T>(name)?)
    }

    /// Resolves a typed handle to the named output port.
    pub fn output<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<crate::ports::Port<T>, ModuleError> {
        Ok(self.ports.output::<T>(name)?)
    }

    /// Reads the current value of the named input port.
    pub fn read_input<T: Send + Sync + 'static>(&self, name: &str) -> Result<T, ModuleError> {
        Ok(self.ports.read_input::<T>(name)?)
    }

    /// Writes `value` to the named output port.
    pub fn write_output<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
    ) -> Result<(), ModuleError> {
        Ok(self.ports.write_output(name, value)?)
    }

    /// Blocks this body until the named input port holds a value satisfying
    /// `predicate`, then returns that value.
    ///
    /// Implemented as bounded busy-polling with a fixed sleep interval; a
    /// condition-variable or watch-channel handoff may replace it as long as
    /// the producer's write stays visible to the consumer's read after the
    /// write completes. Only the polling body's worker is occupied; sibling
    /// producers keep running concurrently.
    pub async fn wait_input<T, P>(&self, name: &str, mut predicate: P) -> Result<T, ModuleError>
    where
        T: Send + Sync + 'static,
        P: FnMut(&T) -> bool + Send,
    {
        let port = self.ports.input::<T>(name)?;
        loop {
            let value = port.get();
            if predicate(&value) {
                return Ok(value);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Fatal errors raised by module bodies.
///
/// Any error returned here halts the run; retry behavior belongs in the graph
/// itself, expressed as condition loop edges.
#[derive(Debug, Error, Diagnostic)]
pub enum ModuleError {
    /// A port lookup failed, which is a wiring mistake.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Port(#[from] PortError),

    /// JSON payload serialization/deserialization failed.
    #[error(transparent)]
    #[diagnostic(code(taskmesh::body::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Domain-specific failure reported by the body itself.
    #[error("module body failed: {0}")]
    #[diagnostic(code(taskmesh::body::failed))]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Port;

    fn ctx_with_input(port_name: &str, value: u64) -> ModuleCtx {
        let table = PortTable::default();
        table.set_input(Port::atomic(port_name, value));
        ModuleCtx::new("test".into(), table)
    }

    #[tokio::test]
    async fn read_input_resolves_typed_value() {
        let ctx = ctx_with_input("x", 42);
        assert_eq!(ctx.read_input::<u64>("x").unwrap(), 42);
    }

    #[tokio::test]
    async fn missing_port_propagates_as_module_error() {
        let ctx = ctx_with_input("x", 1);
        match ctx.read_input::<u64>("y") {
            Err(ModuleError::Port(PortError::NotFound { name, .. })) => assert_eq!(name, "y"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_input_returns_once_predicate_holds() {
        let table = PortTable::default();
        let port = Port::atomic("gate", 0_u64);
        table.set_input(port.clone());
        let ctx = ModuleCtx::new("test".into(), table);

        let waiter = tokio::spawn(async move { ctx.wait_input("gate", |v: &u64| *v >= 3).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        port.set(5);
        assert_eq!(waiter.await.unwrap().unwrap(), 5);
    }
}
