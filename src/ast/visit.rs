//! Tree traversal utilities.
//!
//! The analyses need a handful of read-only traversals over annotated
//! trees: which identifiers a statement reads, which simple assignments it
//! performs, which functions a script declares, and how much of a tree
//! changed. These are plain recursive functions parameterized by closures;
//! the node kinds are a closed variant set, so no visitor machinery is
//! required.

use rustc_hash::FxHashSet;

use crate::ast::types::{ChangeTag, Expr, ExprKind, Param, Stmt, StmtKind};

/// Distinguishes the top-level script unit from nested functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Script,
    Function,
}

/// One CFG-bearing unit of a script: the script body itself or one
/// declared function.
#[derive(Debug, Clone, Copy)]
pub struct FunctionUnit<'a> {
    pub kind: UnitKind,
    /// `None` for the script unit and for anonymous function expressions.
    pub name: Option<&'a str>,
    pub params: &'a [Param],
    pub body: &'a [Stmt],
}

impl FunctionUnit<'_> {
    /// Display name used for logging and CFG labeling.
    pub fn display_name(&self) -> &str {
        match self.kind {
            UnitKind::Script => "<script>",
            UnitKind::Function => self.name.unwrap_or("<anonymous>"),
        }
    }
}

/// Collect every CFG-bearing unit of a script: the script body first, then
/// every nested function in declaration order (outer before inner).
pub fn function_units(script: &[Stmt]) -> Vec<FunctionUnit<'_>> {
    let mut units = vec![FunctionUnit {
        kind: UnitKind::Script,
        name: None,
        params: &[],
        body: script,
    }];
    collect_functions(script, &mut units);
    units
}

fn collect_functions<'a>(stmts: &'a [Stmt], out: &mut Vec<FunctionUnit<'a>>) {
    for stmt in stmts {
        collect_functions_in_stmt(stmt, out);
    }
}

fn collect_functions_in_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<FunctionUnit<'a>>) {
    if let StmtKind::FunctionDecl { name, params, body } = &stmt.kind {
        out.push(FunctionUnit {
            kind: UnitKind::Function,
            name: Some(name),
            params,
            body,
        });
        collect_functions(body, out);
        return;
    }

    own_exprs(stmt, &mut |expr| collect_functions_in_expr(expr, out));

    match &stmt.kind {
        StmtKind::Block(body) => collect_functions(body, out),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_functions_in_stmt(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_functions_in_stmt(else_branch, out);
            }
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::ForIn { body, .. }
        | StmtKind::With { body, .. } => collect_functions_in_stmt(body, out),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_functions_in_stmt(init, out);
            }
            collect_functions_in_stmt(body, out);
        }
        StmtKind::Switch { clauses, .. } => {
            for clause in clauses {
                collect_functions(&clause.body, out);
            }
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            collect_functions(body, out);
            for catch in catches {
                collect_functions(&catch.body, out);
            }
            if let Some(finally) = finally {
                collect_functions(finally, out);
            }
        }
        _ => {}
    }
}

fn collect_functions_in_expr<'a>(expr: &'a Expr, out: &mut Vec<FunctionUnit<'a>>) {
    match &expr.kind {
        ExprKind::Function { name, params, body } => {
            out.push(FunctionUnit {
                kind: UnitKind::Function,
                name: name.as_deref(),
                params,
                body,
            });
            collect_functions(body, out);
        }
        ExprKind::Array(elems) => {
            for elem in elems {
                collect_functions_in_expr(elem, out);
            }
        }
        ExprKind::Unary { operand, .. } => collect_functions_in_expr(operand, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_functions_in_expr(lhs, out);
            collect_functions_in_expr(rhs, out);
        }
        ExprKind::Assign { target, value } => {
            collect_functions_in_expr(target, out);
            collect_functions_in_expr(value, out);
        }
        ExprKind::Call { callee, args } => {
            collect_functions_in_expr(callee, out);
            for arg in args {
                collect_functions_in_expr(arg, out);
            }
        }
        ExprKind::Member { object, .. } => collect_functions_in_expr(object, out),
        _ => {}
    }
}

/// Apply `f` to the expressions that belong to the statement itself.
///
/// Sub-statement bodies are excluded: they get their own CFG nodes, and
/// visiting them here would double-count their uses.
fn own_exprs<'a>(stmt: &'a Stmt, f: &mut dyn FnMut(&'a Expr)) {
    match &stmt.kind {
        StmtKind::Expr(expr) | StmtKind::With { object: expr, .. } => f(expr),
        StmtKind::VarDecl(declarators) => {
            for declarator in declarators {
                if let Some(init) = &declarator.init {
                    f(init);
                }
            }
        }
        StmtKind::If { cond, .. }
        | StmtKind::While { cond, .. }
        | StmtKind::DoWhile { cond, .. } => f(cond),
        StmtKind::For { cond, update, .. } => {
            if let Some(cond) = cond {
                f(cond);
            }
            if let Some(update) = update {
                f(update);
            }
        }
        StmtKind::ForIn { target, object, .. } => {
            f(target);
            f(object);
        }
        StmtKind::Switch { scrutinee, .. } => f(scrutinee),
        StmtKind::Return(Some(expr)) => f(expr),
        _ => {}
    }
}

/// Identifiers *read* by a statement, restricted to occurrences tagged
/// [`ChangeTag::Unchanged`] or [`ChangeTag::Moved`]: a use only counts
/// for the repair patterns when it already existed in the original
/// program.
pub fn used_identifiers(stmt: &Stmt) -> FxHashSet<String> {
    let mut used = FxHashSet::default();
    own_exprs(stmt, &mut |expr| collect_reads(expr, &mut used));
    used
}

fn collect_reads(expr: &Expr, out: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Ident(name) => {
            if matches!(expr.tag, ChangeTag::Unchanged | ChangeTag::Moved) {
                out.insert(name.clone());
            }
        }
        ExprKind::Array(elems) => {
            for elem in elems {
                collect_reads(elem, out);
            }
        }
        ExprKind::Unary { operand, .. } => collect_reads(operand, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_reads(lhs, out);
            collect_reads(rhs, out);
        }
        ExprKind::Assign { target, value } => {
            // A bare identifier target is a write, not a read. Compound
            // targets still read their object.
            if !matches!(target.kind, ExprKind::Ident(_)) {
                collect_reads(target, out);
            }
            collect_reads(value, out);
        }
        ExprKind::Call { callee, args } => {
            collect_reads(callee, out);
            for arg in args {
                collect_reads(arg, out);
            }
        }
        ExprKind::Member { object, .. } => collect_reads(object, out),
        // Reads inside nested function bodies belong to that function's
        // own CFG.
        ExprKind::Function { .. } => {}
        _ => {}
    }
}

/// Expression-level variant of [`used_identifiers`], for CFG nodes that
/// wrap a bare expression (for-loop updates).
pub fn used_identifiers_in_expr(expr: &Expr) -> FxHashSet<String> {
    let mut used = FxHashSet::default();
    collect_reads(expr, &mut used);
    used
}

/// Simple `name = value` bindings performed by a statement: assignment
/// expressions with a bare identifier target, plus `var` initializers.
pub fn identifier_assignments(stmt: &Stmt) -> Vec<(&str, &Expr)> {
    let mut assignments = Vec::new();
    if let StmtKind::VarDecl(declarators) = &stmt.kind {
        for declarator in declarators {
            if let Some(init) = &declarator.init {
                assignments.push((declarator.name.as_str(), init));
            }
        }
    }
    own_exprs(stmt, &mut |expr| collect_assignments(expr, &mut assignments));
    assignments
}

/// Expression-level variant of [`identifier_assignments`].
pub fn identifier_assignments_in_expr(expr: &Expr) -> Vec<(&str, &Expr)> {
    let mut assignments = Vec::new();
    collect_assignments(expr, &mut assignments);
    assignments
}

fn collect_assignments<'a>(expr: &'a Expr, out: &mut Vec<(&'a str, &'a Expr)>) {
    match &expr.kind {
        ExprKind::Assign { target, value } => {
            if let ExprKind::Ident(name) = &target.kind {
                out.push((name.as_str(), &**value));
            }
            collect_assignments(value, out);
        }
        ExprKind::Array(elems) => {
            for elem in elems {
                collect_assignments(elem, out);
            }
        }
        ExprKind::Unary { operand, .. } => collect_assignments(operand, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_assignments(lhs, out);
            collect_assignments(rhs, out);
        }
        ExprKind::Call { callee, args } => {
            collect_assignments(callee, out);
            for arg in args {
                collect_assignments(arg, out);
            }
        }
        ExprKind::Member { object, .. } => collect_assignments(object, out),
        _ => {}
    }
}

/// Count changed statements in a tree, nested functions included.
///
/// Batch drivers use this as a cheap admission metric: files whose change
/// volume exceeds a configured threshold are unlikely to contain the
/// repetitive repair patterns this crate mines.
pub fn change_complexity(stmts: &[Stmt]) -> usize {
    let mut count = 0;
    for stmt in stmts {
        complexity_of_stmt(stmt, &mut count);
    }
    count
}

fn complexity_of_stmt(stmt: &Stmt, count: &mut usize) {
    if stmt.tag.is_changed() {
        *count += 1;
    }
    match &stmt.kind {
        StmtKind::Block(body) | StmtKind::FunctionDecl { body, .. } => {
            *count += change_complexity(body);
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            complexity_of_stmt(then_branch, count);
            if let Some(else_branch) = else_branch {
                complexity_of_stmt(else_branch, count);
            }
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::ForIn { body, .. }
        | StmtKind::With { body, .. } => complexity_of_stmt(body, count),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                complexity_of_stmt(init, count);
            }
            complexity_of_stmt(body, count);
        }
        StmtKind::Switch { clauses, .. } => {
            for clause in clauses {
                *count += change_complexity(&clause.body);
            }
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            *count += change_complexity(body);
            for catch in catches {
                *count += change_complexity(&catch.body);
            }
            if let Some(finally) = finally {
                *count += change_complexity(finally);
            }
        }
        _ => {}
    }
}
