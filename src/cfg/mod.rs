//! Control flow graph construction.
//!
//! Builds one intraprocedural CFG per script/function from a
//! change-annotated AST by structural induction over the statement forms.
//! Nodes wrap source statements (or synthetic markers), edges carry
//! optional polarity-tagged guards, and multi-way constructs (switch,
//! try, with) keep their extra targets in the node kind.
//!
//! # Modules
//!
//! - [`types`]: graph data structures ([`Cfg`], [`CfgNode`], guards)
//! - [`builder`]: fragment composition and [`build_cfgs`]

pub mod builder;
pub mod types;

pub use builder::{build_cfgs, build_function};
pub use types::{
    CatchArm, Cfg, CfgEdge, CfgNode, Guard, GuardTest, JumpKind, NodeId, NodeKind, Polarity,
    SourceRef, SwitchArm,
};
