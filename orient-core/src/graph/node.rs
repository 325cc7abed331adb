//! Graph Nodes
//!
//! This module defines the closed set of node kinds that live in a network
//! and the contract they share: attaching an edge, and reacting when the
//! direction of an incident edge becomes determined.

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use super::edge::{DirectionChange, Direction, Edge};
use super::equation::EquationNode;
use super::id::{EdgeId, NodeId, NodeKind};
use super::variable::VariableNode;
use crate::error::Result;

/// Direction assignments a node wants applied after reacting.
///
/// Nodes never write edges themselves. They describe the writes, and the
/// network stages them, so every reaction is a complete step before any
/// notification goes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    pub(crate) assignments: SmallVec<[(EdgeId, Direction); 4]>,
    /// Fire the node's prepared edges right away instead of leaving them
    /// for the caller's resolve loop.
    pub(crate) fire: bool,
}

impl Commit {
    pub(crate) fn none() -> Self {
        Self::default()
    }

    pub(crate) fn firing(fire: bool) -> Self {
        Self {
            assignments: SmallVec::new(),
            fire,
        }
    }

    pub(crate) fn assign(&mut self, edge: EdgeId, direction: Direction) {
        self.assignments.push((edge, direction));
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// The reaction contract shared by both node kinds.
///
/// `edges` is the whole edge arena of the owning network, indexed by
/// [`EdgeId`].
pub(crate) trait EdgeListener {
    /// Attach an incident edge. Attaching the same edge twice is a no-op.
    fn attach(&mut self, edge: EdgeId, edges: &[Edge]) -> Result<Commit>;

    /// React to a direction change on an incident edge.
    fn on_direction(&mut self, change: &DirectionChange, edges: &[Edge]) -> Commit;
}

/// Estimated position of a node in computation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Level {
    pub lower: u32,
    pub upper: u32,
}

impl Level {
    /// Level of an externally supplied variable.
    pub const SOURCE: Level = Level { lower: 0, upper: 0 };

    pub fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }

    /// Widen to cover `other` as well.
    pub fn merge(self, other: Level) -> Level {
        Level {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// One step further down the computation order.
    pub fn next(self) -> Level {
        Level {
            lower: self.lower + 1,
            upper: self.upper + 1,
        }
    }
}

impl From<Level> for [u32; 2] {
    fn from(level: Level) -> Self {
        [level.lower, level.upper]
    }
}

impl PartialEq<[u32; 2]> for Level {
    fn eq(&self, other: &[u32; 2]) -> bool {
        self.lower == other[0] && self.upper == other[1]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// A node in the bipartite graph.
#[derive(Debug, Clone)]
pub enum Node {
    Variable(VariableNode),
    Equation(EquationNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Variable(v) => v.id(),
            Node::Equation(q) => q.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Variable(_) => NodeKind::Variable,
            Node::Equation(_) => NodeKind::Equation,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Variable(v) => v.name(),
            Node::Equation(q) => q.name(),
        }
    }

    /// Human-readable description, falling back to the name.
    pub fn description(&self) -> &str {
        match self {
            Node::Variable(v) => v.description(),
            Node::Equation(q) => q.description(),
        }
    }

    pub(crate) fn set_description(&mut self, description: String) {
        match self {
            Node::Variable(v) => v.set_description(description),
            Node::Equation(q) => q.set_description(description),
        }
    }

    /// Incident edges, in attachment order.
    pub fn edges(&self) -> &[EdgeId] {
        match self {
            Node::Variable(v) => v.edges(),
            Node::Equation(q) => q.edges(),
        }
    }

    /// Whether the node has left its unresolved state.
    pub fn is_known(&self) -> bool {
        match self {
            Node::Variable(v) => v.is_known(),
            Node::Equation(q) => q.is_known(),
        }
    }

    /// The cached level, once computed.
    pub(crate) fn level(&self) -> Option<Level> {
        match self {
            Node::Variable(v) => v.level.get().copied(),
            Node::Equation(q) => q.level.get().copied(),
        }
    }

    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            Node::Variable(v) => Some(v),
            Node::Equation(_) => None,
        }
    }

    pub fn as_equation(&self) -> Option<&EquationNode> {
        match self {
            Node::Equation(q) => Some(q),
            Node::Variable(_) => None,
        }
    }

    pub(crate) fn as_variable_mut(&mut self) -> Option<&mut VariableNode> {
        match self {
            Node::Variable(v) => Some(v),
            Node::Equation(_) => None,
        }
    }

    pub(crate) fn as_equation_mut(&mut self) -> Option<&mut EquationNode> {
        match self {
            Node::Equation(q) => Some(q),
            Node::Variable(_) => None,
        }
    }
}

impl EdgeListener for Node {
    fn attach(&mut self, edge: EdgeId, edges: &[Edge]) -> Result<Commit> {
        match self {
            Node::Variable(v) => v.attach(edge, edges),
            Node::Equation(q) => q.attach(edge, edges),
        }
    }

    fn on_direction(&mut self, change: &DirectionChange, edges: &[Edge]) -> Commit {
        match self {
            Node::Variable(v) => v.on_direction(change, edges),
            Node::Equation(q) => q.on_direction(change, edges),
        }
    }
}
