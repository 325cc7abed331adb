//! Graph Edges
//!
//! An edge joins exactly one variable and one equation and carries the
//! direction in which a value will travel along it once resolved.
//!
//! # Staged notifications
//!
//! Writing a direction does not notify anyone. It records a pending change
//! on the edge, and the network delivers it later with an explicit fire.
//! A node that commits several edges in one step therefore never observes
//! its own half-applied state through a listener.

use serde::Serialize;
use tracing::{trace, warn};

use super::id::{EdgeId, NodeId};

/// Which way a value flows along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Not decided yet.
    Undetermined,

    /// The variable feeds the equation.
    VariableSupplies,

    /// The equation computes the variable.
    EquationSupplies,
}

/// How the equation registered the variable behind an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May become an output of the equation.
    Candidate,

    /// Must be known before the equation can resolve at all.
    Prerequisite,
}

/// A direction change delivered to the two endpoints of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionChange {
    pub edge: EdgeId,
    pub old: Direction,
    pub new: Direction,
    /// Whether the change is delivered inside an ongoing cascade, in which
    /// case listeners fire their own consequences immediately.
    pub recursive: bool,
}

/// An edge between a variable and an equation.
#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    variable: NodeId,
    equation: NodeId,
    key: String,
    role: Role,
    tag: Option<String>,
    direction: Direction,
    staged: Option<(Direction, Direction)>,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, equation: NodeId, variable: NodeId, key: String, role: Role) -> Self {
        Self {
            id,
            variable,
            equation,
            key,
            role,
            tag: None,
            direction: Direction::Undetermined,
            staged: None,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn variable(&self) -> NodeId {
        self.variable
    }

    pub fn equation(&self) -> NodeId {
        self.equation
    }

    /// The local name under which the equation registered the variable.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub(crate) fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Both endpoints, variable first.
    pub fn nodes(&self) -> [NodeId; 2] {
        [self.variable, self.equation]
    }

    /// The supplying endpoint, or `None` while undetermined.
    pub fn source(&self) -> Option<NodeId> {
        match self.direction {
            Direction::Undetermined => None,
            Direction::VariableSupplies => Some(self.variable),
            Direction::EquationSupplies => Some(self.equation),
        }
    }

    /// The consuming endpoint, or `None` while undetermined.
    pub fn target(&self) -> Option<NodeId> {
        match self.direction {
            Direction::Undetermined => None,
            Direction::VariableSupplies => Some(self.equation),
            Direction::EquationSupplies => Some(self.variable),
        }
    }

    /// Whether a direction change is staged and waiting to be fired.
    pub fn is_prepared(&self) -> bool {
        self.staged.is_some()
    }

    /// Commit a direction and stage its notification.
    ///
    /// Directions are write-once: a second write is ignored and reported.
    pub(crate) fn stage(&mut self, value: Direction) -> bool {
        if self.direction != Direction::Undetermined {
            warn!(edge = %self.id, current = ?self.direction, requested = ?value, "edge direction already committed");
            return false;
        }
        trace!(edge = %self.id, direction = ?value, "staging edge direction");
        self.staged = Some((self.direction, value));
        self.direction = value;
        true
    }

    /// Take the staged change, if any, clearing the stage.
    pub(crate) fn take_staged(&mut self, recursive: bool) -> Option<DirectionChange> {
        self.staged.take().map(|(old, new)| DirectionChange {
            edge: self.id,
            old,
            new,
            recursive,
        })
    }
}
