//! Subgraphs
//!
//! A [`Subgraph`] is a set of node and edge handles into one network. The
//! algorithms here carve subgraphs out of a network: connected components,
//! the used part of a resolved graph, and unions.

use std::collections::VecDeque;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::debug;

use super::id::{EdgeId, NodeId};
use super::network::Network;
use crate::error::Result;

/// Node and edge handles of one network, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    nodes: IndexSet<NodeId>,
    edges: IndexSet<EdgeId>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &IndexSet<NodeId> {
        &self.nodes
    }

    pub fn edges(&self) -> &IndexSet<EdgeId> {
        &self.edges
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Add everything in `other`.
    pub fn union(&mut self, other: &Subgraph) {
        self.nodes.extend(other.nodes.iter().copied());
        self.edges.extend(other.edges.iter().copied());
    }
}

/// Merge several subgraphs of the same network into one.
pub fn union_graphs<'a, I>(graphs: I) -> Subgraph
where
    I: IntoIterator<Item = &'a Subgraph>,
{
    graphs.into_iter().fold(Subgraph::new(), |mut acc, graph| {
        acc.union(graph);
        acc
    })
}

impl Network {
    /// Everything reachable from `start`, breadth first.
    pub fn connected_component(&self, start: NodeId) -> Result<Subgraph> {
        self.node(start)?;
        let mut graph = Subgraph::new();
        let mut queue = VecDeque::from([start]);
        graph.nodes.insert(start);

        while let Some(node) = queue.pop_front() {
            for &edge in self.node(node)?.edges() {
                if !graph.edges.insert(edge) {
                    continue;
                }
                for next in self.edge(edge)?.nodes() {
                    if graph.nodes.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        debug!(
            %start,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "connected component extracted"
        );
        Ok(graph)
    }

    /// Restrict `graph` to its used nodes and used edges.
    ///
    /// Handles that do not belong to this network are dropped.
    pub fn used_subgraph(&self, graph: &Subgraph) -> Subgraph {
        Subgraph {
            nodes: graph
                .nodes
                .iter()
                .copied()
                .filter(|n| self.is_used(*n).unwrap_or(false))
                .collect(),
            edges: graph
                .edges
                .iter()
                .copied()
                .filter(|e| self.edge_is_used(*e).unwrap_or(false))
                .collect(),
        }
    }

    /// Split `nodes` into the connected components that contain them.
    ///
    /// Each component is complete, so it may hold nodes outside `nodes`.
    pub fn partition_into_components<I>(&self, nodes: I) -> Result<Vec<Subgraph>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut remaining: IndexSet<NodeId> = nodes.into_iter().collect();
        let mut components = Vec::new();
        while let Some(start) = remaining.first().copied() {
            let component = self.connected_component(start)?;
            remaining.retain(|n| !component.nodes.contains(n));
            components.push(component);
        }
        Ok(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EquationSpec;

    /// Two disjoint angle sums plus an isolated variable.
    fn network() -> (Network, Vec<NodeId>) {
        let mut net = Network::new();
        let first = net.add_variables(["a1", "b1", "c1"]);
        let second = net.add_variables(["a2", "b2", "c2"]);
        let lonely = net.add_variable("z");
        net.add_equation(EquationSpec::new("sum1").candidates(first.clone())).unwrap();
        net.add_equation(EquationSpec::new("sum2").candidates(second.clone())).unwrap();

        let mut all = first;
        all.extend(second);
        all.push(lonely);
        (net, all)
    }

    #[test]
    fn component_reaches_everything_connected() {
        let (net, vars) = network();
        let component = net.connected_component(vars[0]).unwrap();
        assert_eq!(component.nodes().len(), 4);
        assert_eq!(component.edges().len(), 3);
        assert!(component.contains_node(vars[2]));
        assert!(!component.contains_node(vars[3]));

        let lonely = net.connected_component(vars[6]).unwrap();
        assert_eq!(lonely.nodes().len(), 1);
        assert!(lonely.edges().is_empty());
    }

    #[test]
    fn partition_covers_input() {
        let (net, vars) = network();
        let components = net.partition_into_components(vars.iter().copied()).unwrap();
        assert_eq!(components.len(), 3);
        assert_eq!(components.iter().map(|c| c.nodes().len()).sum::<usize>(), net.node_count());

        let merged = union_graphs(&components);
        assert_eq!(merged.nodes().len(), net.node_count());
        assert_eq!(merged.edges().len(), net.edge_count());
    }

    #[test]
    fn unknown_start_fails() {
        let (net, _) = network();
        assert!(net.connected_component(NodeId::from(100)).is_err());
    }

    #[test]
    fn used_subgraph_before_and_after_resolution() {
        let (mut net, vars) = network();
        let component = net.connected_component(vars[0]).unwrap();
        assert!(net.used_subgraph(&component).is_empty());

        net.mark_as_source(vars[0], None).unwrap();
        net.mark_as_source(vars[1], None).unwrap();
        let used = net.used_subgraph(&component);
        assert_eq!(used, component);
        assert_eq!(net.used_subgraph(&used), used);
    }

    #[test]
    fn union_is_set_union() {
        let mut a = Subgraph::new();
        a.nodes.insert(NodeId::from(1));
        let mut b = Subgraph::new();
        b.nodes.insert(NodeId::from(1));
        b.edges.insert(EdgeId::from(0));

        let merged = union_graphs([&a, &b]);
        assert_eq!(merged.nodes().len(), 1);
        assert_eq!(merged.edges().len(), 1);
    }
}
