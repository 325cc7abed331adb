//! Orient Core
//!
//! This crate decides in which direction values flow through a network of
//! equations. Given which variables are supplied from outside, it works out
//! which equation computes each remaining variable, and from what.
//!
//! It implements:
//!
//! - The variable/equation graph and its resolution engine
//! - Graph algorithms over resolved graphs (components, used subgraphs,
//!   computation levels)
//! - A small evaluation runtime binding resolved graphs to values
//! - DOT, TeX and JSON renderings
//!
//! # Architecture
//!
//! - `graph`: nodes, edges, thresholds and the propagation engine
//! - `runtime`: signals, memos and graph binding
//! - `export`: read-only formatters
//! - `error`: the crate-wide error type
//!
//! # Example
//!
//! ```rust,ignore
//! use orient_core::graph::{EquationSpec, Network};
//! use orient_core::runtime::{bind, calculation, Outcome};
//!
//! let mut network = Network::new();
//! let angles = network.add_variables(["alpha", "beta", "gamma"]);
//! network.add_equation(
//!     EquationSpec::new("alpha+beta+gamma=180")
//!         .candidates(angles.clone())
//!         .factory(|key| match key {
//!             "2" => Some(calculation(|i| Ok(Outcome::from(180.0 - i.get("0")? - i.get("1")?)))),
//!             _ => None,
//!         }),
//! )?;
//!
//! network.mark_as_source(angles[0], None)?;
//! network.mark_as_source(angles[1], None)?;
//!
//! let graph = network.connected_component(angles[0])?;
//! let bound = bind(&network, &network.used_subgraph(&graph))?;
//! bound.input(angles[0]).unwrap().set(60.0);
//! bound.input(angles[1]).unwrap().set(30.0);
//! assert_eq!(bound.value(angles[2])?, 90.0);
//! ```

pub mod error;
pub mod export;
pub mod graph;
pub mod runtime;

pub use error::{Error, Result};
pub use graph::{EquationSpec, Network, NodeId};
