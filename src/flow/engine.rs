//! The path exploration driver.
//!
//! # Algorithm
//!
//! Depth-first over an explicit stack of path frames. Each frame owns its
//! abstract state and its own per-node revisit counters:
//!
//! 1. Pop a frame, bump the revisit counter for its node; prune the path
//!    if the counter exceeds the cap.
//! 2. Apply the node transfer.
//! 3. For every outgoing transition, fork the state (the last transition
//!    reuses the frame's state), apply the edge transfer if the edge is
//!    guarded, and push a new frame.
//!
//! A path ends when its node has no outgoing transitions or when the
//! revisit cap prunes it. Without the cap a non-merging walk over a loop
//! back edge would not terminate.
//!
//! # Failure semantics
//!
//! An edge transfer that fails ([`PatchflowError::UnsupportedGuard`])
//! skips that edge's fact extraction only; the edge is still traversed.
//! Degenerate graphs (an empty function body) complete with zero findings.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::cfg::types::{Cfg, NodeId};
use crate::error::PatchflowError;
use crate::flow::lattice::{FlowAnalysis, PathState};
use crate::scope::ScopeResolver;

/// Default per-path revisit cap. A small fixed constant, never derived
/// from program size: it bounds loop unrolling, not graph coverage.
pub const REVISIT_CAP: u32 = 2;

/// Counters describing one exploration run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Paths that reached a node with no outgoing transitions.
    pub paths_completed: usize,
    /// Paths pruned by the revisit cap.
    pub paths_pruned: usize,
    /// Guarded edges whose transfer was skipped as uninterpretable.
    pub guards_skipped: usize,
}

struct PathFrame<S> {
    node: NodeId,
    state: S,
    visits: FxHashMap<NodeId, u32>,
}

/// Walks a CFG, threading forked lattice state along every path.
#[derive(Debug, Clone, Copy)]
pub struct FlowEngine {
    revisit_cap: u32,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self {
            revisit_cap: REVISIT_CAP,
        }
    }
}

impl FlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the revisit cap. This is the knob callers use to bound
    /// total exploration cost on hostile inputs.
    pub fn with_revisit_cap(revisit_cap: u32) -> Self {
        Self { revisit_cap }
    }

    /// Explore every path of `cfg`, invoking the analysis' transfer hooks.
    pub fn run<'a, A>(
        &self,
        cfg: &Cfg<'a>,
        analysis: &mut A,
        scope: &dyn ScopeResolver,
    ) -> EngineStats
    where
        A: FlowAnalysis<'a>,
    {
        let mut stats = EngineStats::default();
        if cfg.is_empty() {
            return stats;
        }

        let mut stack = vec![PathFrame {
            node: cfg.entry,
            state: analysis.entry_state(),
            visits: FxHashMap::default(),
        }];

        while let Some(mut frame) = stack.pop() {
            let visits = frame.visits.entry(frame.node).or_insert(0);
            *visits += 1;
            if *visits > self.revisit_cap {
                let err = PatchflowError::ExplorationBound {
                    node: frame.node,
                    cap: self.revisit_cap,
                };
                trace!(function = %cfg.name, %err, "pruning path");
                stats.paths_pruned += 1;
                continue;
            }

            analysis.transfer_node(cfg.node(frame.node), &mut frame.state, scope);

            // Fork once per outgoing edge; the final edge takes over the
            // frame's own state and counters instead of copying.
            let Some((last, rest)) = cfg.transitions(frame.node).split_last() else {
                stats.paths_completed += 1;
                continue;
            };
            for edge in rest {
                let mut state = frame.state.fork();
                if let Some(guard) = &edge.guard {
                    if let Err(err) = analysis.transfer_edge(guard, &mut state, scope) {
                        trace!(function = %cfg.name, %err, "skipping edge transfer");
                        stats.guards_skipped += 1;
                    }
                }
                stack.push(PathFrame {
                    node: edge.to,
                    state,
                    visits: frame.visits.clone(),
                });
            }

            if let Some(guard) = &last.guard {
                if let Err(err) = analysis.transfer_edge(guard, &mut frame.state, scope) {
                    trace!(function = %cfg.name, %err, "skipping edge transfer");
                    stats.guards_skipped += 1;
                }
            }
            stack.push(PathFrame {
                node: last.to,
                state: frame.state,
                visits: frame.visits,
            });
        }

        stats
    }
}

/// Run a concrete analysis over one CFG and drain its findings, in
/// deterministic emission order.
pub fn run_analysis<'a, A>(
    cfg: &Cfg<'a>,
    mut analysis: A,
    scope: &dyn ScopeResolver,
) -> Vec<A::Finding>
where
    A: FlowAnalysis<'a>,
{
    FlowEngine::new().run(cfg, &mut analysis, scope);
    analysis.into_findings()
}
