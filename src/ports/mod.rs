//! Typed, concurrency-safe data ports for inter-module communication.
//!
//! A [`Port<T>`] is a named storage cell holding a single value, written by a
//! producer module and read by any number of consumer modules. Both `get` and
//! `set` are safe to call concurrently from worker threads without external
//! locking.
//!
//! Two storage strategies back the same contract:
//!
//! - [`Port::atomic`]: lock-free `AtomicU64` storage for trivially
//!   bit-copyable payloads (integers, `bool`, `f32`, `f64`; see
//!   [`AtomicValue`])
//! - [`Port::shared`]: mutex-guarded storage for everything else; the lock
//!   is scoped strictly to the duration of the get/set call
//!
//! The strategy is selected at construction, keeping payload types checked at
//! compile time. The only runtime type check is the registry downcast in
//! [`PortTable`], which reports a precise [`PortError::TypeMismatch`].
//!
//! # Examples
//!
//! ```rust
//! use taskmesh::ports::Port;
//!
//! let counter = Port::atomic("counter", 0_u64);
//! counter.set(41);
//! assert_eq!(counter.get() + 1, 42);
//!
//! let label = Port::shared("label", String::from("boot"));
//! label.set("ready".to_string());
//! assert_eq!(label.get(), "ready");
//! ```

pub mod registry;

pub use registry::{PortDirection, PortError, PortTable};

use crate::module::Module;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage contract shared by both cell flavors.
///
/// `store` happens-before a subsequent `load` observing the stored value
/// (Release/Acquire on atomic cells, mutual exclusion on locked cells).
pub(crate) trait PortCell<T>: Send + Sync {
    fn load(&self) -> T;
    fn store(&self, value: T);
}

mod sealed {
    pub trait Sealed {}
}

/// Payload types with trivial bit-copy semantics, eligible for lock-free
/// atomic storage via [`Port::atomic`].
///
/// Implemented for the primitive integers, `usize`/`isize`, `bool`, `f32`,
/// and `f64`. The trait is sealed; all other payloads go through
/// [`Port::shared`].
pub trait AtomicValue: sealed::Sealed + Copy + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_bits(self) -> u64;
    #[doc(hidden)]
    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_atomic_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl AtomicValue for $ty {
                fn into_bits(self) -> u64 {
                    self as u64
                }
                fn from_bits(bits: u64) -> Self {
                    bits as $ty
                }
            }
        )*
    };
}

impl_atomic_value_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl sealed::Sealed for bool {}
impl AtomicValue for bool {
    fn into_bits(self) -> u64 {
        u64::from(self)
    }
    fn from_bits(bits: u64) -> Self {
        bits != 0
    }
}

impl sealed::Sealed for f32 {}
impl AtomicValue for f32 {
    fn into_bits(self) -> u64 {
        u64::from(self.to_bits())
    }
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl sealed::Sealed for f64 {}
impl AtomicValue for f64 {
    fn into_bits(self) -> u64 {
        self.to_bits()
    }
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// Lock-free cell for bit-copyable payloads.
struct AtomicCell<T> {
    bits: AtomicU64,
    _payload: PhantomData<T>,
}

impl<T: AtomicValue> AtomicCell<T> {
    fn new(initial: T) -> Self {
        Self {
            bits: AtomicU64::new(initial.into_bits()),
            _payload: PhantomData,
        }
    }
}

impl<T: AtomicValue> PortCell<T> for AtomicCell<T> {
    fn load(&self) -> T {
        T::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn store(&self, value: T) {
        self.bits.store(value.into_bits(), Ordering::Release);
    }
}

/// Mutex-guarded cell for payloads with non-trivial copy/move semantics.
struct LockedCell<T> {
    slot: Mutex<T>,
}

impl<T: Clone + Send> LockedCell<T> {
    fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(initial),
        }
    }
}

impl<T: Clone + Send> PortCell<T> for LockedCell<T> {
    fn load(&self) -> T {
        self.slot.lock().clone()
    }

    fn store(&self, value: T) {
        *self.slot.lock() = value;
    }
}

/// A named, typed, concurrency-safe data cell.
///
/// `Port<T>` is a cheap-clone handle (`Arc` internally); every clone refers
/// to the same cell. Modules hold clones registered through a [`PortTable`],
/// so a port outlives every module referencing it without any caller-side
/// lifetime management.
///
/// # Examples
///
/// ```rust
/// use taskmesh::ports::Port;
///
/// let threshold = Port::atomic("threshold", 100_i64);
/// let sibling = threshold.clone();
/// sibling.set(250);
/// assert_eq!(threshold.get(), 250);
/// ```
pub struct Port<T> {
    name: Arc<str>,
    cell: Arc<dyn PortCell<T>>,
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: AtomicValue> Port<T> {
    /// Creates a port with lock-free atomic storage.
    ///
    /// Available for payloads with trivial bit-copy semantics; see
    /// [`AtomicValue`].
    pub fn atomic(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into().into(),
            cell: Arc::new(AtomicCell::new(initial)),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Port<T> {
    /// Creates a port with mutex-guarded storage.
    ///
    /// Works for any clonable payload; the lock is held only for the duration
    /// of a single `get` or `set` call, never across module body execution.
    pub fn shared(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into().into(),
            cell: Arc::new(LockedCell::new(initial)),
        }
    }
}

impl<T> Port<T> {
    /// The port's name, used as its key within a registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the most recently stored value.
    pub fn get(&self) -> T {
        self.cell.load()
    }

    /// Atomically replaces the stored value.
    pub fn set(&self, value: T) {
        self.cell.store(value);
    }
}

impl<T: Send + Sync + 'static> Port<T> {
    /// Registers this port as an output of `module` (the module's body writes
    /// it). Returns `&self` so wiring calls can be chained.
    pub fn output_of(&self, module: &Module) -> &Self {
        module.ports().set_output(self.clone());
        self
    }

    /// Registers this port as an input of `module` (the module's body reads
    /// it). Returns `&self` so wiring calls can be chained.
    pub fn input_of(&self, module: &Module) -> &Self {
        module.ports().set_input(self.clone());
        self
    }
}

impl<T> std::fmt::Debug for Port<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_roundtrip_signed() {
        let p = Port::atomic("neg", -7_i32);
        assert_eq!(p.get(), -7);
        p.set(i32::MIN);
        assert_eq!(p.get(), i32::MIN);
    }

    #[test]
    fn atomic_roundtrip_float() {
        let p = Port::atomic("pi", 3.25_f64);
        assert_eq!(p.get(), 3.25);
        p.set(-0.5);
        assert_eq!(p.get(), -0.5);
    }

    #[test]
    fn shared_roundtrip_json() {
        let p = Port::shared("blob", serde_json::json!({"ready": false}));
        p.set(serde_json::json!({"ready": true}));
        assert_eq!(p.get()["ready"], serde_json::json!(true));
    }

    #[test]
    fn clones_alias_one_cell() {
        let a = Port::atomic("x", 1_u64);
        let b = a.clone();
        b.set(9);
        assert_eq!(a.get(), 9);
    }
}
