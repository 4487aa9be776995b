//! Error types for CFG construction and flow analysis.
//!
//! Nothing in this crate is process-fatal: every error is scoped to a
//! single function (construction) or a single exploration path (analysis).
//! A function that fails to build simply yields no findings.

use thiserror::Error;

use crate::cfg::types::NodeId;

/// Errors raised during CFG construction or path exploration.
#[derive(Error, Debug)]
pub enum PatchflowError {
    /// A composition step violated a structural invariant (one entry,
    /// disjoint exit sets). Fatal to that function's build only; the
    /// caller skips the function and continues.
    #[error("malformed CFG in '{function}': {detail}")]
    MalformedCfg { function: String, detail: String },

    /// Break or continue exits survived to function scope. Recovered by
    /// dropping them with a warning.
    #[error("{count} unresolved {kind} exit(s) at function scope")]
    UnresolvedJump { kind: &'static str, count: usize },

    /// An edge guard could not be interpreted by the analysis' transfer
    /// function. Recovered by skipping that edge's fact extraction.
    #[error("unsupported guard expression: {0}")]
    UnsupportedGuard(String),

    /// A path re-entered the same node beyond the revisit cap. Recovered
    /// by terminating that path only.
    #[error("exploration bound hit at node {node:?} (cap {cap})")]
    ExplorationBound { node: NodeId, cap: u32 },
}

pub type Result<T> = std::result::Result<T, PatchflowError>;
