//! Shared infrastructure used across the crate.
//!
//! - [`graph`] - Graph traits, node identifiers and the dominator algorithm
//!   the control-flow analyses are built on

pub mod graph;
