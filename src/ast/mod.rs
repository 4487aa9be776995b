//! Change-annotated JavaScript syntax trees.
//!
//! The tree differ (an external collaborator) hands this crate an AST in
//! which every statement and expression carries a [`ChangeTag`] describing
//! how it changed between the "before" and "after" version of a file. This
//! module owns the shape of that contract plus the traversal utilities the
//! analyses need. The crate never mutates a tree; it reads tags and
//! structural fields only.
//!
//! # Modules
//!
//! - [`types`]: node definitions ([`Expr`], [`Stmt`], [`ChangeTag`])
//! - [`visit`]: callback-based traversals and identifier extraction

pub mod types;
pub mod visit;

pub use types::{
    BinaryOp, CatchClause, ChangeTag, Declarator, Expr, ExprKind, Param, Stmt, StmtKind,
    SwitchClause, UnaryOp,
};
pub use visit::{
    change_complexity, function_units, identifier_assignments, identifier_assignments_in_expr,
    used_identifiers, used_identifiers_in_expr, FunctionUnit, UnitKind,
};
