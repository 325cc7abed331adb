//! Variable Nodes
//!
//! A variable node stands for one unknown quantity. It starts unknown and
//! resolves exactly once, either because it is declared as externally
//! supplied or because one incident equation chooses to compute it. From
//! that moment every other undetermined incident edge carries the value
//! away from the variable.

use std::cell::OnceCell;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::debug;

use super::edge::{Direction, DirectionChange, Edge};
use super::id::{EdgeId, NodeId};
use super::node::{Commit, EdgeListener, Level};
use crate::error::{Error, Result};
use crate::runtime::Signal;

/// Resolution state of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Known {
    Unknown,
    /// Supplied from outside the graph.
    Source,
    /// Produced by exactly one equation.
    Computed,
}

impl fmt::Display for Known {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Source => f.write_str("source"),
            Self::Computed => f.write_str("computed"),
        }
    }
}

/// Where a known variable gets its value from.
#[derive(Debug, Clone)]
pub enum VariableSource {
    /// Supplied externally; the runtime creates a fresh signal for it.
    External,
    /// Supplied externally through an existing signal.
    Supplied(Signal),
    /// Computed by the equation on the other end of this edge.
    Edge(EdgeId),
}

/// Names for bulk variable creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableNames {
    /// One variable per name.
    Names(Vec<String>),
    /// `n` variables named `0..n`.
    Count(usize),
}

impl VariableNames {
    pub fn into_names(self) -> Vec<String> {
        match self {
            Self::Names(names) => names,
            Self::Count(n) => (0..n).map(|i| i.to_string()).collect(),
        }
    }
}

impl From<Vec<String>> for VariableNames {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<&[&str]> for VariableNames {
    fn from(names: &[&str]) -> Self {
        Self::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for VariableNames {
    fn from(names: [&str; N]) -> Self {
        Self::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

impl From<usize> for VariableNames {
    fn from(n: usize) -> Self {
        Self::Count(n)
    }
}

impl TryFrom<&Value> for VariableNames {
    type Error = Error;

    /// Accepts an array of string or number names, a non-negative integer
    /// count, or a string holding such a count.
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(Error::InvalidArgument(format!(
                        "variable name must be a string or number, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Names),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Self::Count)
                .ok_or_else(|| Error::InvalidArgument(format!("invalid variable count {n}"))),
            Value::String(s) => s
                .trim()
                .parse::<usize>()
                .map(Self::Count)
                .map_err(|_| Error::InvalidArgument(format!("invalid variable count `{s}`"))),
            other => Err(Error::InvalidArgument(format!(
                "expected a list of names or a count, got {other}"
            ))),
        }
    }
}

impl TryFrom<Value> for VariableNames {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::try_from(&value)
    }
}

/// A node representing one unknown quantity.
#[derive(Debug, Clone)]
pub struct VariableNode {
    id: NodeId,
    name: String,
    description: Option<String>,
    edges: SmallVec<[EdgeId; 4]>,
    known: Known,
    source: Option<VariableSource>,
    pub(crate) level: OnceCell<Level>,
}

impl VariableNode {
    pub(crate) fn new(id: NodeId, name: String) -> Self {
        Self {
            id,
            name,
            description: None,
            edges: SmallVec::new(),
            known: Known::Unknown,
            source: None,
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

    pub fn known(&self) -> Known {
        self.known
    }

    pub fn is_known(&self) -> bool {
        self.known != Known::Unknown
    }

    pub fn is_source(&self) -> bool {
        self.known == Known::Source
    }

    pub fn source(&self) -> Option<&VariableSource> {
        self.source.as_ref()
    }

    /// The edge this variable is computed through, if any.
    pub fn source_edge(&self) -> Option<EdgeId> {
        match self.source {
            Some(VariableSource::Edge(edge)) => Some(edge),
            _ => None,
        }
    }

    /// Declare the variable as externally supplied.
    ///
    /// Every undetermined incident edge becomes variable-supplied. With
    /// `fire` the network delivers those changes at once.
    pub(crate) fn mark_as_source(
        &mut self,
        supplied: Option<Signal>,
        fire: bool,
        edges: &[Edge],
    ) -> Result<Commit> {
        if self.is_known() {
            return Err(Error::AlreadyResolved {
                variable: self.name.clone(),
                known: self.known,
            });
        }
        self.known = Known::Source;
        self.source = Some(supplied.map_or(VariableSource::External, VariableSource::Supplied));
        debug!(variable = %self.name, "variable marked as source");
        Ok(self.release_edges(edges, fire))
    }

    fn resolve_computed(&mut self, edge: EdgeId, edges: &[Edge], fire: bool) -> Commit {
        self.known = Known::Computed;
        self.source = Some(VariableSource::Edge(edge));
        debug!(variable = %self.name, %edge, "variable computed");
        self.release_edges(edges, fire)
    }

    /// Turn every undetermined incident edge into a consumer of this value.
    fn release_edges(&self, edges: &[Edge], fire: bool) -> Commit {
        let mut commit = Commit::firing(fire);
        for &edge in &self.edges {
            if edges[edge.index()].direction() == Direction::Undetermined {
                commit.assign(edge, Direction::VariableSupplies);
            }
        }
        commit
    }
}

impl EdgeListener for VariableNode {
    /// Edges may arrive after the variable resolved, or already pointing
    /// at it, when degenerate equations are wired late.
    fn attach(&mut self, edge: EdgeId, edges: &[Edge]) -> Result<Commit> {
        if self.edges.contains(&edge) {
            return Ok(Commit::none());
        }
        self.edges.push(edge);

        let direction = edges[edge.index()].direction();
        let commit = if self.is_known() && direction == Direction::Undetermined {
            let mut commit = Commit::firing(true);
            commit.assign(edge, Direction::VariableSupplies);
            commit
        } else if !self.is_known() && direction == Direction::EquationSupplies {
            self.resolve_computed(edge, edges, true)
        } else {
            Commit::none()
        };
        Ok(commit)
    }

    fn on_direction(&mut self, change: &DirectionChange, edges: &[Edge]) -> Commit {
        if self.is_known() || change.new != Direction::EquationSupplies {
            return Commit::none();
        }
        self.resolve_computed(change.edge, edges, change.recursive)
    }
}
