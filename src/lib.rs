//! Mines recurring bug-repair patterns in JavaScript by comparing the
//! "before" and "after" version of a function.
//!
//! An external tree differ annotates every AST node with a change tag;
//! this crate builds an intraprocedural control flow graph per function
//! over the annotated tree and runs path-sensitive (non-merging) dataflow
//! analyses over it to recognize repair idioms, such as a newly inserted
//! guard that checks a variable against a special falsy/undefined/null
//! value before a pre-existing use.
//!
//! # Pipeline
//!
//! ```text
//! annotated AST -> cfg::build_cfgs -> flow::run_analysis(lattice) -> findings
//! ```
//!
//! The crate performs no parsing, file I/O or report formatting: trees
//! come from the diff collaborator, findings go to the reporting layer.
//! One pass over one function is synchronous and self-contained, so a
//! batch driver can process many file pairs in parallel without locking.

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod error;
pub mod flow;
pub mod scope;

pub use analysis::special_type::{
    find_special_type_repairs, SpecialType, SpecialTypeAnalysis, SpecialTypeFinding,
};
pub use ast::types::{ChangeTag, Expr, ExprKind, Param, Stmt, StmtKind};
pub use cfg::{build_cfgs, Cfg, NodeId};
pub use error::{PatchflowError, Result};
pub use flow::{run_analysis, FlowAnalysis, FlowEngine, PathState, REVISIT_CAP};
pub use scope::{Declaration, FunctionScope, ScopeResolver};
