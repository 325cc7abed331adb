//! Network and Propagation Engine
//!
//! The network owns every node and edge of a graph and drives resolution.
//!
//! # Algorithm
//!
//! Resolution is a fixed point over edge directions:
//!
//! 1. Marking a variable as a source, or an equation resolving while it is
//!    built, commits directions on some edges and stages a notification on
//!    each of them.
//! 2. Firing an edge delivers its staged change to both endpoints. Each
//!    endpoint reacts with a [`Commit`]: more directions to assign.
//! 3. Inside a cascade (`recursive`), the reacting node's prepared edges are
//!    fired next, through a work queue rather than the call stack. Outside a
//!    cascade they stay staged for [`Network::resolve_edges`].
//! 4. `resolve_edges` keeps flushing prepared edges until none are left.
//!
//! Every edge changes direction at most once, so the number of deliveries is
//! bounded by the number of edges and the loop always terminates.

use std::collections::{HashSet, VecDeque};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::edge::{Direction, DirectionChange, Edge, Role};
use super::equation::{EquationNode, EquationSpec, Report};
use super::id::{EdgeId, NodeId, NodeKind};
use super::node::{Commit, EdgeListener, Level, Node};
use super::variable::{VariableNames, VariableNode, VariableSource};
use crate::error::{Error, Result};
use crate::runtime::Signal;

/// The arena of a bipartite variable/equation graph.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Network {
    /// Create a new empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unknown variable.
    pub fn add_variable(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.next_node_id();
        self.nodes.push(Node::Variable(VariableNode::new(id, name.into())));
        id
    }

    /// Add one variable per name, or `n` variables named `0..n`.
    pub fn add_variables(&mut self, names: impl Into<VariableNames>) -> Vec<NodeId> {
        let names: VariableNames = names.into();
        names
            .into_names()
            .into_iter()
            .map(|name| self.add_variable(name))
            .collect()
    }

    /// Build an equation over existing variables.
    ///
    /// Edges are created and attached, then the equation is finalized. If
    /// enough variables are already known it resolves right away; its
    /// outputs are staged and delivered by the next resolve.
    pub fn add_equation(&mut self, spec: EquationSpec) -> Result<NodeId> {
        for (_, var) in spec.candidates.iter().chain(spec.prerequisites.iter()) {
            self.variable(var)?;
        }

        let id = self.next_node_id();
        self.nodes.push(Node::Equation(EquationNode::new(id, &spec)));

        let wiring = spec
            .candidates
            .iter()
            .map(|(key, var)| (key, var, Role::Candidate))
            .chain(spec.prerequisites.iter().map(|(key, var)| (key, var, Role::Prerequisite)));
        for (key, var, role) in wiring {
            self.connect(id, var, key.to_string(), role)?;
        }

        let Network { nodes, edges } = self;
        let commit = match nodes[id.index()].as_equation_mut() {
            Some(equation) => equation.finalize(edges),
            None => Commit::none(),
        };
        let follow = self.apply(id, commit);
        self.cascade(follow);

        debug!(
            equation = %spec.name,
            edges = self.nodes[id.index()].edges().len(),
            resolved = self.nodes[id.index()].is_known(),
            "equation added"
        );
        Ok(id)
    }

    /// Attach a new candidate edge between an equation and a variable.
    ///
    /// Equation topology is frozen once built, so this fails with
    /// [`Error::Lifecycle`] for every equation in the network.
    pub fn add_edge(&mut self, equation: NodeId, variable: NodeId, key: impl Into<String>) -> Result<EdgeId> {
        self.variable(variable)?;
        let node = self.equation(equation)?;
        if node.is_finalized() {
            return Err(Error::Lifecycle {
                equation: node.name().to_string(),
            });
        }
        self.connect(equation, variable, key.into(), Role::Candidate)
    }

    fn connect(&mut self, equation: NodeId, variable: NodeId, key: String, role: Role) -> Result<EdgeId> {
        let id = EdgeId::from(self.edges.len() as u32);
        self.edges.push(Edge::new(id, equation, variable, key, role));

        for node in [equation, variable] {
            let Network { nodes, edges } = self;
            let commit = nodes[node.index()].attach(id, edges)?;
            let follow = self.apply(node, commit);
            self.cascade(follow);
        }
        Ok(id)
    }

    /// Declare a variable as externally supplied and propagate at once.
    ///
    /// `supplied` reuses an existing signal as the value handle; without it
    /// the runtime creates one.
    pub fn mark_as_source(&mut self, variable: NodeId, supplied: Option<Signal>) -> Result<()> {
        self.mark_source(variable, supplied, true)
    }

    /// Declare a variable as externally supplied, leaving its edges staged
    /// for a later [`resolve_edges`](Self::resolve_edges).
    pub fn mark_as_source_deferred(&mut self, variable: NodeId, supplied: Option<Signal>) -> Result<()> {
        self.mark_source(variable, supplied, false)
    }

    fn mark_source(&mut self, variable: NodeId, supplied: Option<Signal>, fire: bool) -> Result<()> {
        self.variable(variable)?;
        let Network { nodes, edges } = self;
        let commit = match nodes[variable.index()].as_variable_mut() {
            Some(var) => var.mark_as_source(supplied, fire, edges)?,
            None => Commit::none(),
        };
        let follow = self.apply(variable, commit);
        self.cascade(follow);
        Ok(())
    }

    /// Flush one staged notification to both endpoints of `edge`.
    ///
    /// With `recursive`, the whole cascade it triggers runs before this
    /// returns. Returns whether anything was staged.
    pub fn fire(&mut self, edge: EdgeId, recursive: bool) -> Result<bool> {
        let change = self
            .edges
            .get_mut(edge.index())
            .ok_or(Error::UnknownEdge(edge))?
            .take_staged(recursive);
        let Some(change) = change else {
            return Ok(false);
        };
        let follow = self.deliver(&change);
        self.cascade(follow);
        Ok(true)
    }

    /// Flush every edge of `edges` that is prepared, once.
    ///
    /// Returns whether any edge was flushed. Unknown handles are skipped.
    pub fn fire_edges<'a, I>(&mut self, edges: I) -> bool
    where
        I: IntoIterator<Item = &'a EdgeId>,
    {
        let prepared: Vec<EdgeId> = edges
            .into_iter()
            .copied()
            .filter(|e| self.edges.get(e.index()).is_some_and(Edge::is_prepared))
            .collect();
        trace!(count = prepared.len(), "firing prepared edges");
        for &edge in &prepared {
            if let Some(change) = self.edges[edge.index()].take_staged(false) {
                let follow = self.deliver(&change);
                self.cascade(follow);
            }
        }
        !prepared.is_empty()
    }

    /// Fire `edges` repeatedly until nothing is left to flush.
    pub fn resolve_edges<'a, I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = &'a EdgeId> + Clone,
    {
        let mut passes = 0usize;
        while self.fire_edges(edges.clone()) {
            passes += 1;
        }
        trace!(passes, "edges resolved");
    }

    /// Resolve every edge in the network.
    pub fn resolve(&mut self) {
        let all: Vec<EdgeId> = self.edges.iter().map(Edge::id).collect();
        self.resolve_edges(&all);
    }

    /// Deliver a change to both endpoints; returns edges to fire next.
    fn deliver(&mut self, change: &DirectionChange) -> SmallVec<[EdgeId; 8]> {
        let mut follow = SmallVec::new();
        let ends = self.edges[change.edge.index()].nodes();
        for node in ends {
            let Network { nodes, edges } = self;
            let commit = nodes[node.index()].on_direction(change, edges);
            follow.extend(self.apply(node, commit));
        }
        follow
    }

    /// Stage a node's commit; returns its prepared edges if it fires.
    fn apply(&mut self, node: NodeId, commit: Commit) -> SmallVec<[EdgeId; 8]> {
        for (edge, direction) in commit.assignments {
            self.edges[edge.index()].stage(direction);
        }
        if !commit.fire {
            return SmallVec::new();
        }
        self.nodes[node.index()]
            .edges()
            .iter()
            .copied()
            .filter(|e| self.edges[e.index()].is_prepared())
            .collect()
    }

    /// Fire edges recursively, breadth first, until the cascade dies out.
    fn cascade(&mut self, seed: impl IntoIterator<Item = EdgeId>) {
        let mut queue: VecDeque<EdgeId> = seed.into_iter().collect();
        while let Some(edge) = queue.pop_front() {
            if let Some(change) = self.edges[edge.index()].take_staged(true) {
                trace!(%edge, direction = ?change.new, "edge fired");
                queue.extend(self.deliver(&change));
            }
        }
    }

    fn next_node_id(&self) -> NodeId {
        NodeId::from(self.nodes.len() as u32)
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::UnknownNode(id))
    }

    /// Get a variable node.
    pub fn variable(&self, id: NodeId) -> Result<&VariableNode> {
        let node = self.node(id)?;
        node.as_variable().ok_or_else(|| Error::NodeKind {
            name: node.name().to_string(),
            expected: NodeKind::Variable,
        })
    }

    /// Get an equation node.
    pub fn equation(&self, id: NodeId) -> Result<&EquationNode> {
        let node = self.node(id)?;
        node.as_equation().ok_or_else(|| Error::NodeKind {
            name: node.name().to_string(),
            expected: NodeKind::Equation,
        })
    }

    /// Get an edge.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(id.index()).ok_or(Error::UnknownEdge(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Handles of all variable nodes.
    pub fn variables(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Variable).map(Node::id)
    }

    /// Handles of all equation nodes.
    pub fn equations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Equation).map(Node::id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn set_description(&mut self, node: NodeId, description: impl Into<String>) -> Result<()> {
        self.node(node)?;
        self.nodes[node.index()].set_description(description.into());
        Ok(())
    }

    pub fn set_edge_tag(&mut self, edge: EdgeId, tag: impl Into<String>) -> Result<()> {
        self.edges
            .get_mut(edge.index())
            .ok_or(Error::UnknownEdge(edge))?
            .set_tag(tag);
        Ok(())
    }

    /// The local name under which `equation` registered `variable`.
    pub fn key_of(&self, equation: NodeId, variable: NodeId) -> Result<Option<&str>> {
        Ok(self.equation(equation)?.key_of(variable))
    }

    /// The report of a resolved equation.
    pub fn report(&self, equation: NodeId) -> Result<&Report> {
        self.equation(equation)?.report()
    }

    /// Whether a node lies on a path actually needed to compute something.
    ///
    /// A variable is used once known. An equation is used once resolved
    /// with at least one used output edge.
    pub fn is_used(&self, id: NodeId) -> Result<bool> {
        Ok(match self.node(id)? {
            Node::Variable(v) => v.is_known(),
            Node::Equation(q) => self.equation_is_used(q),
        })
    }

    /// Whether an edge carries a value that is actually needed.
    pub fn edge_is_used(&self, id: EdgeId) -> Result<bool> {
        Ok(self.edge_used(self.edge(id)?))
    }

    fn equation_is_used(&self, equation: &EquationNode) -> bool {
        equation
            .result()
            .is_some_and(|result| result.iter().any(|e| self.edge_used(&self.edges[e.index()])))
    }

    fn edge_used(&self, edge: &Edge) -> bool {
        let (Some(var), Some(eq)) = (
            self.nodes[edge.variable().index()].as_variable(),
            self.nodes[edge.equation().index()].as_equation(),
        ) else {
            return false;
        };
        if !var.is_known() || !eq.is_known() {
            return false;
        }
        match edge.direction() {
            Direction::Undetermined => false,
            Direction::VariableSupplies => {
                var.source_edge() != Some(edge.id())
                    && !eq.has_result(edge.id())
                    && self.equation_is_used(eq)
            }
            Direction::EquationSupplies => {
                eq.has_result(edge.id()) && var.source_edge() == Some(edge.id())
            }
        }
    }

    /// Lower and upper estimate of a used node's depth in computation order.
    ///
    /// Sources sit at `[0, 0]`. An equation sits one step below the
    /// shallowest and deepest of its used inputs (`[1, 1]` without any),
    /// and a computed variable shares the level of its equation.
    ///
    /// Levels are cached per node. Uncached dependencies are walked with an
    /// explicit stack, so long chains cost heap, not call stack.
    pub fn level(&self, id: NodeId) -> Result<Level> {
        let mut stack = vec![id];
        let mut expanded: HashSet<NodeId> = HashSet::new();
        while let Some(&top) = stack.last() {
            let node = self.node(top)?;
            if node.level().is_some() {
                stack.pop();
                continue;
            }
            if !self.is_used(top)? {
                return Err(Error::UnusedNode {
                    name: node.name().to_string(),
                });
            }

            let inputs = self.level_inputs(node)?;
            let pending: SmallVec<[NodeId; 8]> = inputs
                .iter()
                .copied()
                .filter(|input| self.nodes[input.index()].level().is_none())
                .collect();
            if pending.is_empty() {
                let mut levels = inputs.iter().filter_map(|input| self.nodes[input.index()].level());
                let level = match node {
                    Node::Variable(var) => *var.level.get_or_init(|| levels.next().unwrap_or(Level::SOURCE)),
                    Node::Equation(eq) => {
                        *eq.level.get_or_init(|| levels.reduce(Level::merge).map_or(Level::new(1, 1), Level::next))
                    }
                };
                trace!(node = %top, %level, "level computed");
                stack.pop();
            } else if expanded.insert(top) {
                stack.extend(pending);
            } else {
                return Err(Error::Cycle {
                    name: node.name().to_string(),
                });
            }
        }
        self.node(id)?.level().ok_or(Error::UnknownNode(id))
    }

    /// Nodes whose levels determine the level of `node`.
    fn level_inputs(&self, node: &Node) -> Result<SmallVec<[NodeId; 8]>> {
        match node {
            Node::Variable(var) => match var.source() {
                Some(VariableSource::External | VariableSource::Supplied(_)) => Ok(SmallVec::new()),
                Some(VariableSource::Edge(edge)) => {
                    let edge = self.edge(*edge)?;
                    if edge.direction() != Direction::EquationSupplies {
                        return Err(Error::InvalidSource {
                            variable: var.name().to_string(),
                        });
                    }
                    Ok(SmallVec::from_elem(edge.equation(), 1))
                }
                None => Err(Error::InvalidSource {
                    variable: var.name().to_string(),
                }),
            },
            Node::Equation(eq) => Ok(eq
                .edges()
                .iter()
                .map(|e| &self.edges[e.index()])
                .filter(|edge| edge.direction() == Direction::VariableSupplies && self.edge_used(edge))
                .map(Edge::variable)
                .collect()),
        }
    }
}
