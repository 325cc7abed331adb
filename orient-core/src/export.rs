//! Read-only renderings of a graph.
//!
//! - DOT: one statement per edge, pointing from supplier to consumer.
//!   Undetermined edges point from variable to equation without a head.
//! - TeX: one display formula per node, built from its description.
//! - JSON: a serde snapshot of nodes and edges with their resolution state.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::Result;
use crate::graph::{Direction, Edge, EdgeId, Known, Level, Network, Node, NodeId, NodeKind, Role, Subgraph};

/// Render the edges of `graph` as DOT statements, in graph order.
pub fn to_dot(network: &Network, graph: &Subgraph) -> Result<String> {
    to_dot_by(network, graph, |_, _| Ordering::Equal)
}

/// Render the edges of `graph` as DOT statements, sorted by `compare`.
pub fn to_dot_by<F>(network: &Network, graph: &Subgraph, mut compare: F) -> Result<String>
where
    F: FnMut(&Edge, &Edge) -> Ordering,
{
    let mut edges = graph
        .edges()
        .iter()
        .map(|e| network.edge(*e))
        .collect::<Result<Vec<_>>>()?;
    edges.sort_by(|a, b| compare(*a, *b));

    let lines = edges
        .into_iter()
        .map(|edge| edge_to_dot(network, edge))
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join(";\n"))
}

fn edge_to_dot(network: &Network, edge: &Edge) -> Result<String> {
    let name = |id: NodeId| -> Result<String> { Ok(network.node(id)?.name().replace('"', "\\\"")) };
    Ok(match (edge.source(), edge.target()) {
        (Some(source), Some(target)) => format!("\"{}\" -> \"{}\"", name(source)?, name(target)?),
        _ => format!(
            "\"{}\" -> \"{}\"[arrowhead=none]",
            name(edge.variable())?,
            name(edge.equation())?
        ),
    })
}

/// Render the nodes of `graph` as `$$description$$` lines, in graph order.
pub fn to_tex(network: &Network, graph: &Subgraph) -> Result<String> {
    to_tex_by(network, graph, |_, _| Ordering::Equal)
}

/// Render the nodes of `graph` as `$$description$$` lines, sorted by
/// `compare`.
pub fn to_tex_by<F>(network: &Network, graph: &Subgraph, mut compare: F) -> Result<String>
where
    F: FnMut(&Node, &Node) -> Ordering,
{
    let mut nodes = graph
        .nodes()
        .iter()
        .map(|n| network.node(*n))
        .collect::<Result<Vec<_>>>()?;
    nodes.sort_by(|a, b| compare(*a, *b));
    Ok(nodes
        .iter()
        .map(|node| format!("$${}$$", node.description()))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Resolution state of a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Only for variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known: Option<Known>,
    pub resolved: bool,
    pub used: bool,
    /// Only for used nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub variable: NodeId,
    pub equation: NodeId,
    pub key: String,
    pub role: Role,
    pub direction: Direction,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Capture the state of every node and edge of `graph`.
pub fn snapshot(network: &Network, graph: &Subgraph) -> Result<Snapshot> {
    let mut nodes = Vec::with_capacity(graph.nodes().len());
    for &id in graph.nodes() {
        let node = network.node(id)?;
        let used = network.is_used(id)?;
        nodes.push(NodeSnapshot {
            id,
            name: node.name().to_string(),
            kind: node.kind(),
            known: node.as_variable().map(|v| v.known()),
            resolved: node.is_known(),
            used,
            level: if used { Some(network.level(id)?) } else { None },
        });
    }

    let mut edges = Vec::with_capacity(graph.edges().len());
    for &id in graph.edges() {
        let edge = network.edge(id)?;
        edges.push(EdgeSnapshot {
            id,
            variable: edge.variable(),
            equation: edge.equation(),
            key: edge.key().to_string(),
            role: edge.role(),
            direction: edge.direction(),
            used: network.edge_is_used(id)?,
            tag: edge.tag().map(str::to_string),
        });
    }

    Ok(Snapshot { nodes, edges })
}

/// Render [`snapshot`] as pretty-printed JSON.
pub fn to_json(network: &Network, graph: &Subgraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot(network, graph)?)?)
}
