//! Equation Nodes
//!
//! An equation node stands for a relation over several variables. It never
//! does any algebra. It only decides, once enough of its variables are
//! known, which of the remaining ones it will compute.
//!
//! # Two thresholds
//!
//! Variables are registered in one of two pools:
//!
//! - *candidates* may become outputs. The arity says how many of them may
//!   still be unknown when the equation resolves (or, as a predicate, which
//!   pending combinations are solvable).
//! - *prerequisites* can never be outputs and must all be known first, like
//!   the enclosed angle of a law of cosines.
//!
//! The equation resolves the first time both tests hold at once. Every
//! candidate still undetermined at that moment becomes an output.
//!
//! # Lifecycle
//!
//! Edges are attached while the network builds the equation. Finalizing
//! freezes the topology; attaching afterwards is a lifecycle error.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use super::edge::{Direction, DirectionChange, Edge, Role};
use super::id::{EdgeId, NodeId};
use super::node::{Commit, EdgeListener, Level};
use super::threshold::{Threshold, ThresholdSet};
use crate::error::{Error, Result};
use crate::runtime::{Calculation, Factory};

/// Predicate over the sorted keys of the still-pending candidates.
pub type ArityFn = Arc<dyn Fn(&[&str]) -> bool + Send + Sync>;

/// How many unknowns an equation can absorb.
#[derive(Clone)]
pub enum Arity {
    /// Resolve once at most this many candidates remain unknown.
    Count(usize),
    /// Resolve once the predicate accepts the pending candidate keys.
    Predicate(ArityFn),
}

impl Arity {
    /// Build an arity from a predicate over pending candidate keys.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&[&str]) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    fn threshold(&self, keys: IndexMap<EdgeId, String>) -> Threshold<EdgeId> {
        match self {
            Self::Count(n) => Threshold::Count(*n),
            Self::Predicate(f) => {
                let f = Arc::clone(f);
                Threshold::Predicate(Arc::new(move |set: &ThresholdSet<EdgeId>| {
                    let mut pending: Vec<&str> = set
                        .iter()
                        .filter_map(|edge| keys.get(edge).map(String::as_str))
                        .collect();
                    pending.sort_unstable();
                    f(&pending)
                }))
            }
        }
    }
}

impl Default for Arity {
    fn default() -> Self {
        Self::Count(1)
    }
}

impl From<usize> for Arity {
    fn from(n: usize) -> Self {
        Self::Count(n)
    }
}

impl fmt::Debug for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Variables addressed by local name.
///
/// Lists get their positions as names (`"0"`, `"1"`, ...); maps and pair
/// lists keep their keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedVars(IndexMap<String, NodeId>);

impl NamedVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable under `key`, replacing an earlier one with that key.
    pub fn with(mut self, key: impl Into<String>, variable: NodeId) -> Self {
        self.0.insert(key.into(), variable);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn positional<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        Self(vars.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect())
    }

    fn keyed<K, I>(vars: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NodeId)>,
    {
        Self(vars.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Vec<NodeId>> for NamedVars {
    fn from(vars: Vec<NodeId>) -> Self {
        Self::positional(vars)
    }
}

impl From<&[NodeId]> for NamedVars {
    fn from(vars: &[NodeId]) -> Self {
        Self::positional(vars.iter().copied())
    }
}

impl<const N: usize> From<[NodeId; N]> for NamedVars {
    fn from(vars: [NodeId; N]) -> Self {
        Self::positional(vars)
    }
}

impl<K: Into<String>> From<Vec<(K, NodeId)>> for NamedVars {
    fn from(vars: Vec<(K, NodeId)>) -> Self {
        Self::keyed(vars)
    }
}

impl<K: Into<String>, const N: usize> From<[(K, NodeId); N]> for NamedVars {
    fn from(vars: [(K, NodeId); N]) -> Self {
        Self::keyed(vars)
    }
}

impl<K: Into<String>> From<IndexMap<K, NodeId>> for NamedVars {
    fn from(vars: IndexMap<K, NodeId>) -> Self {
        Self::keyed(vars)
    }
}

impl<K: Into<String>> From<BTreeMap<K, NodeId>> for NamedVars {
    fn from(vars: BTreeMap<K, NodeId>) -> Self {
        Self::keyed(vars)
    }
}

/// Everything needed to build an equation node.
///
/// ```rust,ignore
/// let sum = network.add_equation(
///     EquationSpec::new("alpha+beta+gamma=PI").candidates([alpha, beta, gamma]),
/// )?;
/// ```
#[derive(Clone, Default)]
pub struct EquationSpec {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) arity: Arity,
    pub(crate) candidates: NamedVars,
    pub(crate) prerequisites: NamedVars,
    pub(crate) factory: Option<Factory>,
}

impl EquationSpec {
    /// Start a spec with arity one and no variables.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn arity(mut self, arity: impl Into<Arity>) -> Self {
        self.arity = arity.into();
        self
    }

    pub fn candidates(mut self, vars: impl Into<NamedVars>) -> Self {
        self.candidates = vars.into();
        self
    }

    pub fn prerequisites(mut self, vars: impl Into<NamedVars>) -> Self {
        self.prerequisites = vars.into();
        self
    }

    /// Set the callback that maps an output key to a calculation.
    ///
    /// The network only stores it; the evaluation runtime calls it.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Option<Calculation> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for EquationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquationSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("candidates", &self.candidates)
            .field("prerequisites", &self.prerequisites)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// What a resolved equation computes, and from what.
#[derive(Clone)]
pub struct Report {
    /// Sorted, comma-joined keys of the outputs. Selects the calculation
    /// variant from the factory.
    pub output_key: String,
    /// Every registered variable that is not an output, with its key.
    pub inputs: Vec<(NodeId, String)>,
    /// The chosen outputs, with their keys.
    pub outputs: Vec<(NodeId, String)>,
    pub factory: Option<Factory>,
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("output_key", &self.output_key)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Pending {
    candidates: ThresholdSet<EdgeId>,
    prerequisites: ThresholdSet<EdgeId>,
}

/// A node representing a relation over several variables.
#[derive(Clone)]
pub struct EquationNode {
    id: NodeId,
    name: String,
    description: Option<String>,
    arity: Arity,
    edges: SmallVec<[EdgeId; 4]>,
    /// Local name of each adjacent variable; the first registration wins.
    index: IndexMap<NodeId, String>,
    factory: Option<Factory>,
    /// Present once finalized.
    pending: Option<Pending>,
    result: Option<SmallVec<[EdgeId; 4]>>,
    report: Option<Report>,
    pub(crate) level: OnceCell<Level>,
}

impl EquationNode {
    pub(crate) fn new(id: NodeId, spec: &EquationSpec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            arity: spec.arity.clone(),
            edges: SmallVec::new(),
            index: IndexMap::new(),
            factory: spec.factory.clone(),
            pending: None,
            result: None,
            report: None,
            level: OnceCell::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the equation has chosen its outputs.
    pub fn is_known(&self) -> bool {
        self.result.is_some()
    }

    /// The output edges, once resolved.
    pub fn result(&self) -> Option<&[EdgeId]> {
        self.result.as_deref()
    }

    pub fn has_result(&self, edge: EdgeId) -> bool {
        self.result.as_ref().is_some_and(|r| r.contains(&edge))
    }

    /// Candidate edges still waiting for their variable, once finalized.
    pub fn pending_candidates(&self) -> Option<&ThresholdSet<EdgeId>> {
        self.pending.as_ref().map(|p| &p.candidates)
    }

    /// The local name under which `variable` was registered.
    pub fn key_of(&self, variable: NodeId) -> Option<&str> {
        self.index.get(&variable).map(String::as_str)
    }

    pub fn report(&self) -> Result<&Report> {
        self.report.as_ref().ok_or_else(|| Error::Unresolved {
            equation: self.name.clone(),
        })
    }

    /// Freeze the topology and resolve at once if enough is already known.
    ///
    /// Chosen outputs are staged, not fired.
    pub(crate) fn finalize(&mut self, edges: &[Edge]) -> Commit {
        let (candidate_edges, prerequisite_edges): (Vec<EdgeId>, Vec<EdgeId>) = self
            .edges
            .iter()
            .copied()
            .partition(|e| edges[e.index()].role() == Role::Candidate);
        let keys: IndexMap<EdgeId, String> = candidate_edges
            .iter()
            .map(|e| (*e, edges[e.index()].key().to_string()))
            .collect();
        let mut candidates = ThresholdSet::new(self.arity.threshold(keys), candidate_edges);
        let mut prerequisites = ThresholdSet::new(Threshold::Count(0), prerequisite_edges);

        let supplied = |e: &EdgeId| edges[e.index()].direction() == Direction::VariableSupplies;
        let prerequisites_ready = prerequisites.control_by_filter(supplied);
        let candidates_ready = candidates.control_by_filter(supplied);
        self.pending = Some(Pending {
            candidates,
            prerequisites,
        });

        if prerequisites_ready && candidates_ready {
            self.select_scheme(edges, false)
        } else {
            Commit::none()
        }
    }

    /// Every pending candidate still undetermined becomes an output.
    fn select_scheme(&mut self, edges: &[Edge], fire: bool) -> Commit {
        let mut commit = Commit::firing(fire);
        let mut result = SmallVec::<[EdgeId; 4]>::new();
        if let Some(pending) = &self.pending {
            for &edge in pending.candidates.iter() {
                if edges[edge.index()].direction() == Direction::Undetermined {
                    commit.assign(edge, Direction::EquationSupplies);
                    result.push(edge);
                }
            }
        }

        let report = self.build_report(&result, edges);
        debug!(equation = %self.name, outputs = %report.output_key, "equation resolved");
        self.result = Some(result);
        self.report = Some(report);
        commit
    }

    fn build_report(&self, result: &[EdgeId], edges: &[Edge]) -> Report {
        let outputs: Vec<(NodeId, String)> = result
            .iter()
            .map(|e| {
                let edge = &edges[e.index()];
                (edge.variable(), edge.key().to_string())
            })
            .collect();
        let inputs = self
            .index
            .iter()
            .filter(|(var, _)| !outputs.iter().any(|(out, _)| out == *var))
            .map(|(var, key)| (*var, key.clone()))
            .collect();

        let mut keys: Vec<&str> = outputs.iter().map(|(_, key)| key.as_str()).collect();
        keys.sort_unstable();
        Report {
            output_key: keys.join(","),
            inputs,
            outputs,
            factory: self.factory.clone(),
        }
    }
}

impl EdgeListener for EquationNode {
    fn attach(&mut self, edge: EdgeId, edges: &[Edge]) -> Result<Commit> {
        if self.is_finalized() {
            return Err(Error::Lifecycle {
                equation: self.name.clone(),
            });
        }
        if !self.edges.contains(&edge) {
            let e = &edges[edge.index()];
            self.edges.push(edge);
            self.index.entry(e.variable()).or_insert_with(|| e.key().to_string());
        }
        Ok(Commit::none())
    }

    fn on_direction(&mut self, change: &DirectionChange, edges: &[Edge]) -> Commit {
        if self.is_known() || change.new != Direction::VariableSupplies {
            return Commit::none();
        }
        let Some(pending) = &mut self.pending else {
            // Still under construction; finalize reads directions directly.
            return Commit::none();
        };
        let candidates_ready = pending.candidates.control(Some(&change.edge));
        let prerequisites_ready = pending.prerequisites.control(Some(&change.edge));
        if candidates_ready && prerequisites_ready {
            self.select_scheme(edges, change.recursive)
        } else {
            Commit::none()
        }
    }
}

impl fmt::Debug for EquationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquationNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("edges", &self.edges)
            .field("pending", &self.pending)
            .field("result", &self.result)
            .finish()
    }
}
