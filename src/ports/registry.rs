//! Per-module port registry.
//!
//! A [`PortTable`] maps port names to the input and output ports a module's
//! body may touch. Registration is driven by the declarative wiring calls
//! ([`Port::input_of`](super::Port::input_of) /
//! [`Port::output_of`](super::Port::output_of)); a later registration under
//! the same name silently replaces the earlier one (last-write-wins).
//!
//! Lookups are typed: requesting a port under a payload type it was not
//! declared with fails with [`PortError::TypeMismatch`], and a name that was
//! never registered fails with [`PortError::NotFound`]. Both are wiring
//! mistakes rather than recoverable runtime conditions, so callers propagate
//! them as fatal.

use super::Port;
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which side of a module a port is registered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Errors raised by typed port lookups.
#[derive(Debug, Error, Diagnostic)]
pub enum PortError {
    /// The named port was never registered in the requested direction.
    #[error("no {direction} port named {name:?}")]
    #[diagnostic(
        code(taskmesh::ports::not_found),
        help("Check the declarative wiring: was `input_of`/`output_of` called for this module?")
    )]
    NotFound {
        name: String,
        direction: PortDirection,
    },

    /// The named port exists but holds a different payload type.
    #[error("port {name:?} holds {registered}, requested as {requested}")]
    #[diagnostic(
        code(taskmesh::ports::type_mismatch),
        help("Port payload types are fixed at construction; request the declared type.")
    )]
    TypeMismatch {
        name: String,
        registered: &'static str,
        requested: &'static str,
    },
}

/// Type-erased registry slot. The concrete `Port<T>` handle is recovered by
/// downcast on lookup; `payload_type` is kept purely for diagnostics.
struct PortEntry {
    port: Box<dyn Any + Send + Sync>,
    payload_type: &'static str,
}

#[derive(Default)]
struct Tables {
    inputs: RwLock<FxHashMap<String, PortEntry>>,
    outputs: RwLock<FxHashMap<String, PortEntry>>,
}

/// Per-module mapping from port name to input and output ports.
///
/// Cheap to clone; clones share the same underlying tables. Each module owns
/// exactly one table, reachable from its [`ModuleCtx`](crate::body::ModuleCtx)
/// during execution. There is no process-wide port registry.
///
/// # Examples
///
/// ```rust
/// use taskmesh::ports::{Port, PortTable};
///
/// let table = PortTable::default();
/// table.set_output(Port::atomic("progress", 0_u32));
/// table.write_output("progress", 55_u32).unwrap();
/// assert!(table.output::<u64>("progress").is_err()); // declared as u32
/// ```
#[derive(Clone)]
pub struct PortTable {
    inner: Arc<Tables>,
}

impl Default for PortTable {
    fn default() -> Self {
        Self {
            inner: Arc::new(Tables::default()),
        }
    }
}

impl PortTable {
    fn register<T: Send + Sync + 'static>(
        map: &RwLock<FxHashMap<String, PortEntry>>,
        port: Port<T>,
        direction: PortDirection,
    ) {
        let entry = PortEntry {
            payload_type: type_name::<T>(),
            port: Box::new(port.clone()),
        };
        let replaced = map.write().insert(port.name().to_string(), entry);
        if replaced.is_some() {
            tracing::debug!(name = port.name(), %direction, "port registration replaced");
        }
    }

    fn lookup<T: Send + Sync + 'static>(
        map: &RwLock<FxHashMap<String, PortEntry>>,
        name: &str,
        direction: PortDirection,
    ) -> Result<Port<T>, PortError> {
        let guard = map.read();
        let entry = guard.get(name).ok_or_else(|| PortError::NotFound {
            name: name.to_string(),
            direction,
        })?;
        entry
            .port
            .downcast_ref::<Port<T>>()
            .cloned()
            .ok_or_else(|| PortError::TypeMismatch {
                name: name.to_string(),
                registered: entry.payload_type,
                requested: type_name::<T>(),
            })
    }

    /// Registers `port` as an input. Last write wins on duplicate names.
    pub fn set_input<T: Send + Sync + 'static>(&self, port: Port<T>) {
        Self::register(&self.inner.inputs, port, PortDirection::Input);
    }

    /// Registers `port` as an output. Last write wins on duplicate names.
    pub fn set_output<T: Send + Sync + 'static>(&self, port: Port<T>) {
        Self::register(&self.inner.outputs, port, PortDirection::Output);
    }

    /// Resolves a typed handle to the named input port.
    pub fn input<T: Send + Sync + 'static>(&self, name: &str) -> Result<Port<T>, PortError> {
        Self::lookup(&self.inner.inputs, name, PortDirection::Input)
    }

    /// Resolves a typed handle to the named output port.
    pub fn output<T: Send + Sync + 'static>(&self, name: &str) -> Result<Port<T>, PortError> {
        Self::lookup(&self.inner.outputs, name, PortDirection::Output)
    }

    /// Reads the current value of the named input port.
    pub fn read_input<T: Send + Sync + 'static>(&self, name: &str) -> Result<T, PortError> {
        Ok(self.input::<T>(name)?.get())
    }

    /// Writes `value` to the named output port.
    pub fn write_output<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
    ) -> Result<(), PortError> {
        self.output::<T>(name)?.set(value);
        Ok(())
    }

    /// Number of registered input ports.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inner.inputs.read().len()
    }

    /// Number of registered output ports.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.inner.outputs.read().len()
    }
}

impl fmt::Debug for PortTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortTable")
            .field("inputs", &self.input_count())
            .field("outputs", &self.output_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_missing_name_is_not_found() {
        let table = PortTable::default();
        match table.input::<u64>("nope") {
            Err(PortError::NotFound { name, direction }) => {
                assert_eq!(name, "nope");
                assert_eq!(direction, PortDirection::Input);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn lookup_wrong_type_is_mismatch() {
        let table = PortTable::default();
        table.set_input(Port::shared("label", String::from("x")));
        match table.input::<u64>("label") {
            Err(PortError::TypeMismatch { registered, .. }) => {
                assert!(registered.contains("String"));
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let table = PortTable::default();
        table.set_output(Port::atomic("v", 1_u64));
        table.set_output(Port::atomic("v", 2_u64));
        assert_eq!(table.output_count(), 1);
        assert!(table.read_input::<u64>("v").is_err()); // inputs untouched
        assert_eq!(table.output::<u64>("v").unwrap().get(), 2);
    }

    #[test]
    fn directions_are_independent() {
        let table = PortTable::default();
        let port = Port::atomic("x", 7_u32);
        table.set_input(port.clone());
        table.set_output(port);
        assert_eq!(table.read_input::<u32>("x").unwrap(), 7);
        table.write_output("x", 8_u32).unwrap();
        // Same underlying cell registered on both sides.
        assert_eq!(table.read_input::<u32>("x").unwrap(), 8);
    }
}
