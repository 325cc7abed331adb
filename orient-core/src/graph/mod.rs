//! Equation Network
//!
//! This module implements the bipartite graph of variables and equations
//! and the engine that decides, for every edge, which way values flow.
//!
//! # Overview
//!
//! - Variable nodes stand for unknown quantities.
//! - Equation nodes stand for relations over several variables.
//! - An edge joins one variable and one equation. Its direction starts
//!   undetermined and is committed exactly once.
//!
//! When a variable is declared as a source, its edges start supplying it.
//! Each equation counts its known inputs and, once enough are known, picks
//! the rest as outputs. Those outputs become known in turn, and so on until
//! nothing changes. The network never computes values itself; it hands each
//! resolved equation's [`Report`] to the [`runtime`](crate::runtime).
//!
//! # Design Decisions
//!
//! 1. Nodes and edges live in one arena and refer to each other through
//!    [`NodeId`] and [`EdgeId`] handles.
//!
//! 2. The two node kinds are a closed enum sharing one reaction contract.
//!
//! 3. Direction writes and their notifications are two separate steps:
//!    nodes return a [`Commit`], the network stages it, and delivery comes
//!    later. Cascades run from a work queue, not through recursion.

mod edge;
mod equation;
mod id;
mod network;
mod node;
mod subgraph;
mod threshold;
mod variable;

pub use edge::{Direction, DirectionChange, Edge, Role};
pub use equation::{Arity, ArityFn, EquationNode, EquationSpec, NamedVars, Report};
pub use id::{EdgeId, NodeId, NodeKind};
pub use network::Network;
pub use node::{Commit, Level, Node};
pub use subgraph::{union_graphs, Subgraph};
pub use threshold::{Threshold, ThresholdFn, ThresholdSet};
pub use variable::{Known, VariableNames, VariableNode, VariableSource};
