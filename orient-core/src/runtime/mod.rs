//! Evaluation Runtime
//!
//! The network only decides which way values flow. This module turns a
//! resolved graph into something that produces numbers.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a settable value. Every source variable is backed by
//! one: either the signal it was marked with, or a fresh one.
//!
//! ## Memos
//!
//! A [`Memo`] evaluates one equation. Its calculation comes from the
//! equation's [`Factory`], called with the report's output key, and it is
//! re-run only when an input value changed.
//!
//! ## Binding
//!
//! [`bind`] walks a resolved graph and hands back a [`Variable`] for every
//! known variable in it.

mod bind;
mod memo;
mod signal;

pub use bind::{bind, bind_all, Bindings, Variable};
pub use memo::{calculation, Calculation, Factory, Inputs, Memo, Outcome};
pub use signal::Signal;
