//! Declarative module descriptors and wiring.
//!
//! A [`Module`] is the declarative node of a task graph: a stable identity
//! name, a priority hint, a body (plain task or branch-selecting condition),
//! bidirectional adjacency, an optional sub-module group, and a port
//! registry. Descriptors are cheap-clone `Arc` handles; wiring calls mutate
//! shared interior state until the descriptor is handed to the
//! [`GraphBuilder`](crate::graphs::GraphBuilder), after which it must be
//! treated as immutable.
//!
//! # Wiring
//!
//! Edges are always bidirectional: `a.before(&[&b])` appends `b` to `a`'s
//! successor list **and** `a` to `b`'s predecessor list, and `after` is the
//! symmetric call. Successor declaration order is semantically significant:
//! it defines the branch-index correspondence for condition modules.
//!
//! The `>>` operator chains `before` calls left-to-right:
//!
//! ```rust
//! use taskmesh::module::Module;
//!
//! let init = Module::task_fn("init", |_ctx| async { Ok(()) });
//! let check = Module::task_fn("check", |_ctx| async { Ok(()) });
//! let done = Module::task_fn("done", |_ctx| async { Ok(()) });
//!
//! // init -> check -> done in one expression.
//! let _ = &init >> &check >> &done;
//! ```

use miette::Diagnostic;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::ops::Shr;
use std::sync::Arc;
use thiserror::Error;

use crate::body::{Body, ConditionBody, FnCondition, FnTask, ModuleError, ModuleCtx, TaskBody};
use crate::ports::PortTable;
use crate::types::{GroupMode, Priority};

/// Configuration errors detected at wiring time.
///
/// These are fatal and reported as early as possible so an inconsistent graph
/// is never silently constructed.
#[derive(Debug, Error, Diagnostic)]
pub enum WiringError {
    /// Condition result and sub-grouping are mutually exclusive execution
    /// shapes.
    #[error("condition module {module:?} cannot own a sub-module group")]
    #[diagnostic(
        code(taskmesh::module::condition_with_group),
        help("Route the condition's selected branch to a separate grouping module instead.")
    )]
    ConditionWithSubModules { module: String },
}

#[derive(Default)]
struct Links {
    priority: Priority,
    next: Vec<Module>,
    prev: Vec<Module>,
    group: Vec<Module>,
    group_mode: GroupMode,
}

/// Point-in-time copy of a descriptor's mutable state, taken by the graph
/// builder when the descriptor is materialized.
pub(crate) struct LinkSnapshot {
    pub(crate) priority: Priority,
    pub(crate) next: Vec<Module>,
    pub(crate) prev: Vec<Module>,
    pub(crate) group: Vec<Module>,
    pub(crate) group_mode: GroupMode,
}

struct ModuleInner {
    name: Arc<str>,
    body: Body,
    links: RwLock<Links>,
    ports: PortTable,
}

/// Declarative task-graph node.
///
/// Identity is the name: two handles are equal when their names match, and a
/// graph never contains two nodes with the same name. Cloning a `Module`
/// clones the handle, not the descriptor.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    fn with_body(name: impl Into<String>, body: Body) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                name: name.into().into(),
                body,
                links: RwLock::new(Links::default()),
                ports: PortTable::default(),
            }),
        }
    }

    /// Creates a module from a [`TaskBody`] implementation.
    pub fn task(name: impl Into<String>, body: impl TaskBody + 'static) -> Self {
        Self::with_body(name, Body::Task(Arc::new(body)))
    }

    /// Creates a condition module from a [`ConditionBody`] implementation.
    ///
    /// Running the module yields a zero-based index selecting which declared
    /// successor edge is taken, instead of activating all successors.
    pub fn condition(name: impl Into<String>, body: impl ConditionBody + 'static) -> Self {
        Self::with_body(name, Body::Condition(Arc::new(body)))
    }

    /// Creates a module from an async closure.
    ///
    /// ```rust
    /// use taskmesh::module::Module;
    ///
    /// let boot = Module::task_fn("boot", |ctx| async move {
    ///     tracing::info!(module = ctx.name(), "booting");
    ///     Ok(())
    /// });
    /// ```
    pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        Self::task(name, FnTask::new(f))
    }

    /// Creates a condition module from an async closure returning the branch
    /// index.
    pub fn condition_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<usize, ModuleError>> + Send + 'static,
    {
        Self::condition(name, FnCondition::new(f))
    }

    /// The module's stable identity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current priority hint.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.inner.links.read().priority
    }

    /// Sets the priority hint, consuming and returning the handle so the call
    /// chains off a constructor.
    #[must_use]
    pub fn with_priority(self, priority: Priority) -> Self {
        self.inner.links.write().priority = priority;
        self
    }

    /// Whether running this module yields a branch index.
    #[must_use]
    pub fn is_condition(&self) -> bool {
        self.inner.body.is_condition()
    }

    /// The module's port registry, target of `input_of`/`output_of` wiring.
    #[must_use]
    pub fn ports(&self) -> &PortTable {
        &self.inner.ports
    }

    /// Declares that this module precedes every module in `successors`.
    ///
    /// Appends each successor to this module's `next` list and this module to
    /// each successor's `prev` list. Declaration order is preserved and is
    /// the branch-index order for condition modules.
    pub fn before(&self, successors: &[&Module]) -> &Self {
        for succ in successors {
            self.inner.links.write().next.push((*succ).clone());
            succ.inner.links.write().prev.push(self.clone());
        }
        self
    }

    /// Declares that this module succeeds every module in `predecessors`.
    ///
    /// The mirror of [`before`](Self::before): each predecessor gains this
    /// module in its `next` list, in call order.
    pub fn after(&self, predecessors: &[&Module]) -> &Self {
        for pred in predecessors {
            pred.inner.links.write().next.push(self.clone());
            self.inner.links.write().prev.push((*pred).clone());
        }
        self
    }

    /// Attaches a sub-module group executed as part of this module's own
    /// step.
    ///
    /// `GroupMode::Join` runs the group to quiescence before this module's
    /// body; `GroupMode::Detach` launches it independently (the overall run
    /// still waits for it). Members accumulate across calls; the mode of the
    /// latest call wins.
    ///
    /// # Errors
    ///
    /// [`WiringError::ConditionWithSubModules`] if this is a condition
    /// module.
    pub fn sub_modules(
        &self,
        members: &[&Module],
        mode: GroupMode,
    ) -> Result<&Self, WiringError> {
        if self.is_condition() {
            return Err(WiringError::ConditionWithSubModules {
                module: self.name().to_string(),
            });
        }
        let mut links = self.inner.links.write();
        links.group.extend(members.iter().map(|m| (*m).clone()));
        links.group_mode = mode;
        Ok(self)
    }

    pub(crate) fn snapshot(&self) -> LinkSnapshot {
        let links = self.inner.links.read();
        LinkSnapshot {
            priority: links.priority,
            next: links.next.clone(),
            prev: links.prev.clone(),
            group: links.group.clone(),
            group_mode: links.group_mode,
        }
    }

    pub(crate) fn body(&self) -> Body {
        self.inner.body.clone()
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// True when both handles refer to the same descriptor, not merely the
    /// same name.
    pub(crate) fn ptr_eq(a: &Module, b: &Module) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for Module {}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let links = self.inner.links.read();
        f.debug_struct("Module")
            .field("name", &self.inner.name)
            .field("priority", &links.priority)
            .field("condition", &self.is_condition())
            .field("next", &links.next.iter().map(Module::name).collect::<Vec<_>>())
            .field("prev", &links.prev.iter().map(Module::name).collect::<Vec<_>>())
            .field("group", &links.group.len())
            .finish()
    }
}

impl Shr<&Module> for &Module {
    type Output = Module;

    /// `a >> b` is sugar for `a.before(&[&b])`, yielding `b` so paths chain
    /// left-to-right.
    fn shr(self, rhs: &Module) -> Module {
        self.before(&[rhs]);
        rhs.clone()
    }
}

impl Shr<&Module> for Module {
    type Output = Module;

    fn shr(self, rhs: &Module) -> Module {
        self.before(&[rhs]);
        rhs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Module {
        Module::task_fn(name, |_ctx| async { Ok(()) })
    }

    #[test]
    fn before_is_bidirectional() {
        let a = noop("a");
        let b = noop("b");
        a.before(&[&b]);
        let a_snap = a.snapshot();
        let b_snap = b.snapshot();
        assert_eq!(a_snap.next.len(), 1);
        assert_eq!(a_snap.next[0].name(), "b");
        assert_eq!(b_snap.prev.len(), 1);
        assert_eq!(b_snap.prev[0].name(), "a");
    }

    #[test]
    fn after_mirrors_before() {
        let a = noop("a");
        let b = noop("b");
        b.after(&[&a]);
        assert_eq!(a.snapshot().next[0].name(), "b");
        assert_eq!(b.snapshot().prev[0].name(), "a");
    }

    #[test]
    fn shr_chains_and_returns_rhs() {
        let a = noop("a");
        let b = noop("b");
        let c = noop("c");
        let tail = &a >> &b >> &c;
        assert_eq!(tail.name(), "c");
        assert_eq!(a.snapshot().next[0].name(), "b");
        assert_eq!(b.snapshot().next[0].name(), "c");
    }

    #[test]
    fn successor_declaration_order_is_preserved() {
        let cond = Module::condition_fn("cond", |_ctx| async { Ok(0) });
        let x = noop("x");
        let y = noop("y");
        let z = noop("z");
        cond.before(&[&y, &x]).before(&[&z]);
        let names: Vec<_> = cond.snapshot().next.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["y", "x", "z"]);
    }

    #[test]
    fn condition_rejects_sub_modules() {
        let cond = Module::condition_fn("cond", |_ctx| async { Ok(0) });
        let member = noop("member");
        match cond.sub_modules(&[&member], GroupMode::Join) {
            Err(WiringError::ConditionWithSubModules { module }) => assert_eq!(module, "cond"),
            Ok(_) => panic!("condition module accepted a group"),
        }
    }

    #[test]
    fn equality_is_by_name() {
        let a1 = noop("same");
        let a2 = noop("same");
        assert_eq!(a1, a2);
        assert!(!Module::ptr_eq(&a1, &a2));
    }
}
