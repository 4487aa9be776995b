//! The lattice instantiation contract.
//!
//! A concrete analysis supplies an abstract state type plus two transfer
//! hooks; the engine owns exploration order, forking and bounding. See
//! [`crate::analysis::special_type`] for the canonical instantiation.

use crate::cfg::types::{CfgNode, Guard};
use crate::error::Result;
use crate::scope::ScopeResolver;

/// Abstract state carried by one exploration path.
///
/// `fork` must produce an independent deep copy: once two paths diverge,
/// no mutable state may be shared between them.
pub trait PathState {
    fn fork(&self) -> Self;
}

/// A concrete path-sensitive analysis.
///
/// Findings accumulate inside the instance (each implementation decides
/// how to deduplicate); [`FlowAnalysis::into_findings`] drains them after
/// the walk in deterministic emission order.
pub trait FlowAnalysis<'a> {
    type State: PathState;
    type Finding;

    /// Abstract state at the function entry.
    fn entry_state(&self) -> Self::State;

    /// Called once per guarded edge a path traverses. Record path-local
    /// facts proven by the guard here. Returning an error marks the guard
    /// as uninterpretable: the engine skips this edge's fact extraction
    /// and keeps walking.
    fn transfer_edge(
        &mut self,
        guard: &Guard<'a>,
        state: &mut Self::State,
        scope: &dyn ScopeResolver,
    ) -> Result<()>;

    /// Called once per node a path visits. Observe uses and assignments of
    /// tracked identifiers and emit findings.
    fn transfer_node(
        &mut self,
        node: &CfgNode<'a>,
        state: &mut Self::State,
        scope: &dyn ScopeResolver,
    );

    /// Findings in emission order.
    fn into_findings(self) -> Vec<Self::Finding>;
}
