//! Memo Implementation
//!
//! A Memo evaluates one resolved equation: it reads its input variables,
//! runs the calculation its factory selected for the output key, and
//! caches the outcome.
//!
//! # How Memos Work
//!
//! 1. Nothing runs at construction. The first read computes.
//! 2. Every later read first evaluates the inputs. If all of them hold the
//!    same values as last time, the cached outcome is returned.
//! 3. Otherwise, or after [`Memo::mark_dirty`], the calculation runs again.
//!
//! Calculations run without any lock held.

use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::bind::Variable;
use crate::error::{Error, Result};

/// Counter for generating unique memo IDs.
static MEMO_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_memo_id() -> u64 {
    MEMO_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// One computation variant of an equation.
pub type Calculation = Arc<dyn Fn(&Inputs) -> Result<Outcome> + Send + Sync>;

/// Maps an output key (`"x,y"`) to the calculation producing those outputs.
pub type Factory = Arc<dyn Fn(&str) -> Option<Calculation> + Send + Sync>;

/// Wrap a closure as a [`Calculation`].
pub fn calculation<F>(f: F) -> Calculation
where
    F: Fn(&Inputs) -> Result<Outcome> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Input values of a calculation, addressed by local key.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    equation: Arc<str>,
    values: IndexMap<String, f64>,
}

impl Inputs {
    pub fn new(equation: impl Into<Arc<str>>, values: IndexMap<String, f64>) -> Self {
        Self {
            equation: equation.into(),
            values,
        }
    }

    /// Get an input, failing with [`Error::MissingInput`].
    pub fn get(&self, key: &str) -> Result<f64> {
        self.values.get(key).copied().ok_or_else(|| Error::MissingInput {
            equation: self.equation.to_string(),
            key: key.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a calculation returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The value of the only output.
    Single(f64),
    /// Values by output key, for systems solved jointly.
    Named(IndexMap<String, f64>),
}

impl Outcome {
    /// Extract the output stored under `key`.
    ///
    /// A single value only answers for an equation with exactly one output.
    pub fn project(&self, equation: &str, key: &str, sole: bool) -> Result<f64> {
        let value = match self {
            Self::Single(value) if sole => Some(*value),
            Self::Single(_) => None,
            Self::Named(values) => values.get(key).copied(),
        };
        value.ok_or_else(|| Error::MissingOutput {
            equation: equation.to_string(),
            key: key.to_string(),
        })
    }
}

impl From<f64> for Outcome {
    fn from(value: f64) -> Self {
        Self::Single(value)
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for Outcome {
    fn from(values: [(K, f64); N]) -> Self {
        Self::Named(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Default)]
struct Cache {
    /// Bit patterns of the inputs the cached outcome was computed from.
    fingerprint: Vec<u64>,
    outcome: Option<Outcome>,
}

/// A lazily evaluated, cached equation.
#[derive(Clone)]
pub struct Memo {
    id: u64,
    equation: Arc<str>,
    calculation: Calculation,
    inputs: Arc<Vec<(String, Variable)>>,
    cache: Arc<Mutex<Cache>>,
    compute_count: Arc<AtomicU64>,
}

impl Memo {
    pub fn new(equation: impl Into<Arc<str>>, calculation: Calculation, inputs: Vec<(String, Variable)>) -> Self {
        Self {
            id: next_memo_id(),
            equation: equation.into(),
            calculation,
            inputs: Arc::new(inputs),
            cache: Arc::new(Mutex::new(Cache::default())),
            compute_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the equation this memo evaluates.
    pub fn equation(&self) -> &str {
        &self.equation
    }

    /// Input keys, in registration order.
    pub fn input_keys(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(key, _)| key.as_str())
    }

    /// Get the outcome, recomputing if an input changed.
    ///
    /// Upstream memos are brought up to date first, deepest first, so a
    /// long chain of equations is evaluated without nested calls.
    pub fn get(&self) -> Result<Outcome> {
        for memo in self.upstream()? {
            memo.refresh()?;
        }
        self.refresh()
    }

    /// Every memo this one transitively reads, in evaluation order.
    fn upstream(&self) -> Result<Vec<Memo>> {
        let mut order = Vec::new();
        let mut visited = HashSet::from([self.id]);
        let mut done = HashSet::new();
        let mut stack: Vec<(Memo, bool)> = self.input_memos().map(|memo| (memo, false)).collect();

        while let Some((memo, expanded)) = stack.pop() {
            if expanded {
                done.insert(memo.id);
                order.push(memo);
                continue;
            }
            if !visited.insert(memo.id) {
                if done.contains(&memo.id) {
                    continue;
                }
                return Err(Error::Cycle {
                    name: memo.equation.to_string(),
                });
            }
            let inputs: Vec<Memo> = memo.input_memos().collect();
            stack.push((memo, true));
            stack.extend(inputs.into_iter().map(|input| (input, false)));
        }
        Ok(order)
    }

    fn input_memos(&self) -> impl Iterator<Item = Memo> + '_ {
        self.inputs.iter().filter_map(|(_, var)| match var {
            Variable::Output { memo, .. } => Some(memo.clone()),
            Variable::Source(_) => None,
        })
    }

    /// Recompute from the current input values if they changed.
    ///
    /// Reads the cached outcomes of upstream memos, computing one only if
    /// it has never been evaluated.
    fn refresh(&self) -> Result<Outcome> {
        let values = self
            .inputs
            .iter()
            .map(|(key, var)| -> Result<(String, f64)> { Ok((key.clone(), var.current()?)) })
            .collect::<Result<IndexMap<_, _>>>()?;
        let fingerprint: Vec<u64> = values.values().map(|v| v.to_bits()).collect();

        {
            let cache = self.cache.lock();
            if let Some(outcome) = &cache.outcome {
                if cache.fingerprint == fingerprint {
                    return Ok(outcome.clone());
                }
            }
        }

        let outcome = (self.calculation)(&Inputs::new(Arc::clone(&self.equation), values))?;
        self.compute_count.fetch_add(1, Ordering::Relaxed);

        let mut cache = self.cache.lock();
        cache.fingerprint = fingerprint;
        cache.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// The cached outcome, computed from current inputs if missing.
    pub(crate) fn cached(&self) -> Result<Outcome> {
        if let Some(outcome) = &self.cache.lock().outcome {
            return Ok(outcome.clone());
        }
        self.refresh()
    }

    /// Get one output of the outcome.
    pub fn output(&self, key: &str, sole: bool) -> Result<f64> {
        self.get()?.project(&self.equation, key, sole)
    }

    /// Force the next read to recompute.
    pub fn mark_dirty(&self) {
        self.cache.lock().outcome = None;
    }

    pub fn has_value(&self) -> bool {
        self.cache.lock().outcome.is_some()
    }

    /// How many times the calculation actually ran.
    pub fn compute_count(&self) -> u64 {
        self.compute_count.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("equation", &self.equation)
            .field("inputs", &self.input_keys().collect::<Vec<_>>())
            .field("has_value", &self.has_value())
            .field("compute_count", &self.compute_count())
            .finish()
    }
}

impl Drop for Memo {
    fn drop(&mut self) {
        // Unlink chains of sole owners one at a time; a nested drop would
        // recurse once per equation.
        let mut pending = Vec::new();
        unlink(&mut self.inputs, &mut pending);
        while let Some(var) = pending.pop() {
            if let Variable::Output { mut memo, .. } = var {
                unlink(&mut memo.inputs, &mut pending);
            }
        }
    }
}

fn unlink(inputs: &mut Arc<Vec<(String, Variable)>>, pending: &mut Vec<Variable>) {
    if let Ok(inputs) = Arc::try_unwrap(mem::take(inputs)) {
        pending.extend(inputs.into_iter().map(|(_, var)| var));
    }
}
