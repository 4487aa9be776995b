//! Path-sensitive (non-merging) dataflow analysis.
//!
//! The engine threads an analysis-owned abstract state along every path of
//! a built CFG. At a node with several outgoing edges the state is forked
//! (an explicit deep copy per edge) and each path continues
//! independently; there is no join at confluence points. This keeps
//! per-path truth ("this branch proved x is not null") that a merged-state
//! dataflow would lose, at the cost of a path count that is exponential in
//! branching depth. Loop back edges are bounded by a per-path revisit cap.
//!
//! # Modules
//!
//! - [`lattice`]: the contract a concrete analysis implements
//! - [`engine`]: the exploration driver

pub mod engine;
pub mod lattice;

pub use engine::{run_analysis, EngineStats, FlowEngine, REVISIT_CAP};
pub use lattice::{FlowAnalysis, PathState};
