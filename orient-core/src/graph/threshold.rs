//! Threshold Sets
//!
//! A [`ThresholdSet`] holds the items an equation is still waiting on. Items
//! are only ever removed, and every removal re-evaluates a threshold test:
//! either "at most `n` items remain" or an arbitrary predicate over the
//! remaining items.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexSet;

/// Predicate form of a threshold.
pub type ThresholdFn<T> = Arc<dyn Fn(&ThresholdSet<T>) -> bool + Send + Sync>;

/// The test a [`ThresholdSet`] evaluates after each removal.
pub enum Threshold<T> {
    /// Satisfied once the set holds at most this many items.
    Count(usize),

    /// Satisfied once the predicate returns true for the remaining set.
    Predicate(ThresholdFn<T>),
}

impl<T> Clone for Threshold<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Count(n) => Self::Count(*n),
            Self::Predicate(f) => Self::Predicate(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Threshold<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A shrinking set with a removal-triggered threshold test.
#[derive(Clone)]
pub struct ThresholdSet<T> {
    items: IndexSet<T>,
    threshold: Threshold<T>,
}

impl<T> ThresholdSet<T>
where
    T: Eq + Hash,
{
    /// Create a set with the given threshold and initial members.
    pub fn new<I>(threshold: Threshold<T>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            items: items.into_iter().collect(),
            threshold,
        }
    }

    /// Remove `item` if given, then evaluate the threshold.
    ///
    /// Removing a non-member leaves the set untouched.
    pub fn control(&mut self, item: Option<&T>) -> bool {
        if let Some(item) = item {
            self.items.shift_remove(item);
        }
        self.is_satisfied()
    }

    /// Remove every item matching `filter`, then evaluate the threshold.
    pub fn control_by_filter<F>(&mut self, mut filter: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.retain(|item| !filter(item));
        self.is_satisfied()
    }

    /// Evaluate the threshold against the current members.
    pub fn is_satisfied(&self) -> bool {
        match &self.threshold {
            Threshold::Count(n) => self.items.len() <= *n,
            Threshold::Predicate(f) => f(self),
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate the remaining members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn any<F>(&self, f: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().any(f)
    }

    pub fn all<F>(&self, f: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().all(f)
    }

    pub fn map<U, F>(&self, f: F) -> Vec<U>
    where
        F: FnMut(&T) -> U,
    {
        self.items.iter().map(f).collect()
    }

    pub fn threshold(&self) -> &Threshold<T> {
        &self.threshold
    }
}

impl<T> fmt::Debug for ThresholdSet<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdSet")
            .field("items", &self.items)
            .field("threshold", &self.threshold)
            .finish()
    }
}
