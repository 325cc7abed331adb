//! Signal Implementation
//!
//! A Signal is a settable numeric value shared between every handle cloned
//! from it. Source variables of a bound graph are signals.
//!
//! # Thread Safety
//!
//! The value lives behind an `Arc<RwLock<_>>`, so clones can be read and
//! written from any thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A shared, settable value.
///
/// ```rust,ignore
/// let alpha = Signal::named("alpha");
/// alpha.set(30.0);
/// assert_eq!(alpha.get()?, 30.0);
/// ```
#[derive(Clone)]
pub struct Signal {
    id: u64,
    name: Arc<str>,
    /// `None` until first set.
    value: Arc<RwLock<Option<f64>>>,
}

impl Signal {
    /// Create an unnamed signal with no value.
    pub fn new() -> Self {
        Self::named("")
    }

    /// Create a signal with no value, named for error messages.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: next_signal_id(),
            name: name.into(),
            value: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a signal holding `value`.
    pub fn with_value(name: impl Into<Arc<str>>, value: f64) -> Self {
        let signal = Self::named(name);
        signal.set(value);
        signal
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current value, failing with [`Error::Unset`] if none was set.
    pub fn get(&self) -> Result<f64> {
        self.try_get().ok_or_else(|| Error::Unset {
            variable: self.name.to_string(),
        })
    }

    pub fn try_get(&self) -> Option<f64> {
        *self.value.read()
    }

    pub fn set(&self, value: f64) {
        *self.value.write() = Some(value);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(f64) -> f64,
    {
        let mut guard = self.value.write();
        let current = guard.ok_or_else(|| Error::Unset {
            variable: self.name.to_string(),
        })?;
        *guard = Some(f(current));
        Ok(())
    }

    /// Forget the value.
    pub fn clear(&self) {
        *self.value.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }

    /// Whether both handles share the same value.
    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &self.try_get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::named("x");
        assert!(!signal.is_set());
        assert!(matches!(signal.get(), Err(Error::Unset { variable }) if variable == "x"));

        signal.set(42.0);
        assert_eq!(signal.get().unwrap(), 42.0);

        signal.clear();
        assert_eq!(signal.try_get(), None);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::with_value("x", 10.0);
        signal.update(|v| v + 5.0).unwrap();
        assert_eq!(signal.get().unwrap(), 15.0);

        assert!(Signal::new().update(|v| v * 2.0).is_err());
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new();
        let signal2 = signal1.clone();

        signal1.set(42.0);
        assert_eq!(signal2.get().unwrap(), 42.0);

        signal2.set(100.0);
        assert_eq!(signal1.get().unwrap(), 100.0);
        assert!(signal1.ptr_eq(&signal2));
        assert!(!signal1.ptr_eq(&Signal::new()));
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new();
        let s2 = Signal::new();
        let s3 = Signal::new();

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
