//! Binding resolved graphs to runtime values.
//!
//! [`bind`] walks a resolved graph and gives every known variable a
//! runtime [`Variable`]:
//!
//! - a source variable becomes a [`Signal`], fresh or the one it was
//!   marked with;
//! - a computed variable becomes a projection of the [`Memo`] of the
//!   equation computing it.
//!
//! Memos are created on demand, one per equation, from the calculation the
//! equation's factory returns for its output key.

use indexmap::IndexMap;
use tracing::debug;

use super::memo::Memo;
use super::signal::Signal;
use crate::error::{Error, Result};
use crate::graph::{union_graphs, Direction, Known, Network, NodeId, Subgraph, VariableSource};

/// Runtime handle of one variable.
#[derive(Debug, Clone)]
pub enum Variable {
    /// Set from outside.
    Source(Signal),
    /// One output of an equation.
    Output {
        memo: Memo,
        key: String,
        /// Whether this is the equation's only output.
        sole: bool,
    },
}

impl Variable {
    /// Current value, evaluating equations as needed.
    pub fn get(&self) -> Result<f64> {
        match self {
            Self::Source(signal) => signal.get(),
            Self::Output { memo, key, sole } => memo.output(key, *sole),
        }
    }

    /// Value from the signal or the memo's cached outcome, without
    /// refreshing upstream equations.
    pub(crate) fn current(&self) -> Result<f64> {
        match self {
            Self::Source(signal) => signal.get(),
            Self::Output { memo, key, sole } => memo.cached()?.project(memo.equation(), key, *sole),
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Self::Source(signal) => Some(signal),
            Self::Output { .. } => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

/// The runtime side of a bound graph.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    inputs: IndexMap<NodeId, Signal>,
    all: IndexMap<NodeId, Variable>,
    memos: IndexMap<NodeId, Memo>,
}

impl Bindings {
    /// Signals of the source variables.
    pub fn inputs(&self) -> &IndexMap<NodeId, Signal> {
        &self.inputs
    }

    /// Every bound variable.
    pub fn all(&self) -> &IndexMap<NodeId, Variable> {
        &self.all
    }

    pub fn by_node(&self, node: NodeId) -> Option<&Variable> {
        self.all.get(&node)
    }

    pub fn input(&self, node: NodeId) -> Option<&Signal> {
        self.inputs.get(&node)
    }

    /// The memo of a bound equation.
    pub fn memo(&self, equation: NodeId) -> Option<&Memo> {
        self.memos.get(&equation)
    }

    /// Current value of a bound variable.
    pub fn value(&self, node: NodeId) -> Result<f64> {
        self.all.get(&node).ok_or(Error::UnknownNode(node))?.get()
    }
}

/// Bind every known variable of `graph`, plus whatever it depends on.
///
/// Unknown variables are skipped; equations only get bound as the source
/// of some computed variable.
pub fn bind(network: &Network, graph: &Subgraph) -> Result<Bindings> {
    let mut binder = Binder {
        network,
        bindings: Bindings::default(),
    };
    for &node in graph.nodes() {
        if let Some(var) = network.node(node)?.as_variable() {
            if var.is_known() {
                binder.variable(node)?;
            }
        }
    }

    let bindings = binder.bindings;
    debug!(
        inputs = bindings.inputs.len(),
        variables = bindings.all.len(),
        equations = bindings.memos.len(),
        "graph bound"
    );
    Ok(bindings)
}

/// Bind the union of several graphs of one network.
pub fn bind_all(network: &Network, graphs: &[Subgraph]) -> Result<Bindings> {
    bind(network, &union_graphs(graphs))
}

struct Binder<'a> {
    network: &'a Network,
    bindings: Bindings,
}

/// A node waiting to be bound.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Variable(NodeId),
    Equation(NodeId),
}

impl Binder<'_> {
    /// Bind a variable after everything it depends on, using an explicit
    /// stack instead of nested calls.
    fn variable(&mut self, id: NodeId) -> Result<Variable> {
        let mut stack = vec![(Pending::Variable(id), false)];
        while let Some((pending, expanded)) = stack.pop() {
            if self.is_bound(pending) {
                continue;
            }
            if expanded {
                match pending {
                    Pending::Variable(var) => self.bind_variable(var)?,
                    Pending::Equation(eq) => self.bind_equation(eq)?,
                }
                continue;
            }
            stack.push((pending, true));
            for next in self.dependencies(pending)? {
                if !self.is_bound(next) {
                    stack.push((next, false));
                }
            }
        }
        self.bindings.all.get(&id).cloned().ok_or(Error::UnknownNode(id))
    }

    fn is_bound(&self, pending: Pending) -> bool {
        match pending {
            Pending::Variable(id) => self.bindings.all.contains_key(&id),
            Pending::Equation(id) => self.bindings.memos.contains_key(&id),
        }
    }

    fn dependencies(&self, pending: Pending) -> Result<Vec<Pending>> {
        Ok(match pending {
            Pending::Variable(id) => match self.network.variable(id)?.source() {
                Some(VariableSource::Edge(edge)) => vec![Pending::Equation(self.network.edge(*edge)?.equation())],
                _ => Vec::new(),
            },
            Pending::Equation(id) => self
                .network
                .report(id)?
                .inputs
                .iter()
                .map(|(var, _)| Pending::Variable(*var))
                .collect(),
        })
    }

    fn bind_variable(&mut self, id: NodeId) -> Result<()> {
        let network = self.network;
        let var = network.variable(id)?;
        let invalid = || Error::InvalidSource {
            variable: var.name().to_string(),
        };

        let bound = match (var.known(), var.source()) {
            (Known::Source, Some(VariableSource::External)) => {
                let signal = Signal::named(var.name());
                self.bindings.inputs.insert(id, signal.clone());
                Variable::Source(signal)
            }
            (Known::Source, Some(VariableSource::Supplied(signal))) => {
                self.bindings.inputs.insert(id, signal.clone());
                Variable::Source(signal.clone())
            }
            (Known::Computed, Some(VariableSource::Edge(edge))) => {
                let edge = network.edge(*edge)?;
                if edge.direction() != Direction::EquationSupplies {
                    return Err(invalid());
                }
                let report = network.report(edge.equation())?;
                let memo = self.bindings.memos.get(&edge.equation()).cloned().ok_or_else(|| Error::Cycle {
                    name: var.name().to_string(),
                })?;
                Variable::Output {
                    memo,
                    key: edge.key().to_string(),
                    sole: report.outputs.len() == 1,
                }
            }
            _ => return Err(invalid()),
        };

        self.bindings.all.insert(id, bound);
        Ok(())
    }

    fn bind_equation(&mut self, id: NodeId) -> Result<()> {
        let network = self.network;
        let equation = network.equation(id)?;
        let report = equation.report()?;

        let factory = report.factory.as_ref().ok_or_else(|| Error::MissingFactory {
            equation: equation.name().to_string(),
        })?;
        let calculation = factory(&report.output_key).ok_or_else(|| Error::MissingScheme {
            equation: equation.name().to_string(),
            key: report.output_key.clone(),
        })?;
        let inputs = report
            .inputs
            .iter()
            .map(|(var, key)| -> Result<(String, Variable)> {
                let bound = self.bindings.all.get(var).cloned().ok_or_else(|| Error::Cycle {
                    name: equation.name().to_string(),
                })?;
                Ok((key.clone(), bound))
            })
            .collect::<Result<Vec<_>>>()?;

        self.bindings.memos.insert(id, Memo::new(equation.name(), calculation, inputs));
        Ok(())
    }
}
