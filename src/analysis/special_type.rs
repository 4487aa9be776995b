//! Special-type repair detection.
//!
//! Finds the repair idiom where a guard was inserted to check whether a
//! variable holds a "special" JavaScript value (undefined, null, NaN,
//! blank string, zero, empty array, or anything falsy) before a use that
//! previously ran unprotected:
//!
//! ```text
//! before:            after:
//!   foo(x.bar);        if (!x) return;
//!                      foo(x.bar);
//! ```
//!
//! # Lattice Structure
//!
//! Per path, three maps keyed by identifier:
//! - `special`: types the identifier *may* be on this path (proven by a
//!   check on the matching branch)
//! - `non_special`: types the identifier is *known not* to be
//! - `assignments`: the special type most recently assigned to it, and
//!   only when that assignment is itself part of the change
//!
//! A finding is emitted when an identifier in `non_special` (and not
//! simultaneously in `special`, which would mark the path unsound) is
//! used by a statement while no changed assignment accounts for the
//! excluded type: the inserted check is what made that use safe.
//!
//! # Limitations
//!
//! Checks are recognized structurally (bare truthiness, `!`, loose and
//! strict equality against special literals, `typeof x === "undefined"`,
//! short-circuit conjunction/disjunction on the provable polarity). A
//! condition performing an assignment is reported as an unsupported guard
//! and contributes no facts.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::types::{BinaryOp, ChangeTag, Expr, ExprKind, Stmt, UnaryOp};
use crate::ast::visit::{
    function_units, identifier_assignments, identifier_assignments_in_expr, used_identifiers,
    used_identifiers_in_expr,
};
use crate::cfg::builder::build_function;
use crate::cfg::types::{CfgNode, Guard, GuardTest, Polarity, SourceRef};
use crate::error::{PatchflowError, Result};
use crate::flow::engine::run_analysis;
use crate::flow::lattice::{FlowAnalysis, PathState};
use crate::scope::{FunctionScope, ScopeResolver};

// =============================================================================
// Types
// =============================================================================

/// Special value categories tracked by the analysis. `Falsey` covers
/// everything that evaluates to false in a condition; `NoValue` is the
/// loose-equality bucket (`== null` matches both null and undefined);
/// `Empty` covers blank, zero and the empty array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialType {
    Falsey,
    NoValue,
    Empty,
    Undefined,
    Null,
    Nan,
    Blank,
    Zero,
    EmptyArray,
    Function,
}

impl std::fmt::Display for SpecialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SpecialType::Falsey => "FALSEY",
            SpecialType::NoValue => "NO_VALUE",
            SpecialType::Empty => "EMPTY",
            SpecialType::Undefined => "UNDEFINED",
            SpecialType::Null => "NULL",
            SpecialType::Nan => "NAN",
            SpecialType::Blank => "BLANK",
            SpecialType::Zero => "ZERO",
            SpecialType::EmptyArray => "EMPTY_ARRAY",
            SpecialType::Function => "FUNCTION",
        };
        write!(f, "{label}")
    }
}

/// One special-type check proven by a guard along one polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpecialTypeCheck<'a> {
    identifier: &'a str,
    ty: SpecialType,
    /// `true`: the identifier *is* the type on this edge; `false`: it is
    /// provably not.
    is_special: bool,
}

/// A use that an inserted special-type check made provably safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecialTypeFinding {
    /// Enclosing function, filled in by [`find_special_type_repairs`].
    pub function: Option<String>,
    pub identifier: String,
    pub special_type: SpecialType,
}

// =============================================================================
// Check classification
// =============================================================================

/// Special type a literal expression denotes when used as a comparison
/// operand. Loose equality against null/undefined cannot distinguish the
/// two, hence `NoValue`.
fn compared_special_type(expr: &Expr, strict: bool) -> Option<SpecialType> {
    match &expr.kind {
        ExprKind::Null => Some(if strict {
            SpecialType::Null
        } else {
            SpecialType::NoValue
        }),
        ExprKind::Ident(name) if name == "undefined" => Some(if strict {
            SpecialType::Undefined
        } else {
            SpecialType::NoValue
        }),
        ExprKind::Ident(name) if name == "NaN" => Some(SpecialType::Nan),
        ExprKind::Str(s) if s.is_empty() => Some(SpecialType::Blank),
        ExprKind::Number(n) if *n == 0.0 => Some(SpecialType::Zero),
        ExprKind::Array(elems) if elems.is_empty() => Some(SpecialType::EmptyArray),
        _ => None,
    }
}

/// Special type a literal expression denotes when assigned.
fn assigned_special_type(expr: &Expr) -> Option<SpecialType> {
    match &expr.kind {
        ExprKind::Null => Some(SpecialType::Null),
        ExprKind::Ident(name) if name == "undefined" => Some(SpecialType::Undefined),
        ExprKind::Ident(name) if name == "NaN" => Some(SpecialType::Nan),
        ExprKind::Str(s) if s.is_empty() => Some(SpecialType::Blank),
        ExprKind::Number(n) if *n == 0.0 => Some(SpecialType::Zero),
        ExprKind::Array(elems) if elems.is_empty() => Some(SpecialType::EmptyArray),
        ExprKind::Function { .. } => Some(SpecialType::Function),
        _ => None,
    }
}

/// `typeof x == "undefined"` in either operand order.
fn typeof_undefined_check<'a>(lhs: &'a Expr, rhs: &'a Expr) -> Option<&'a str> {
    let operand = match &lhs.kind {
        ExprKind::Unary {
            op: UnaryOp::TypeOf,
            operand,
        } => operand,
        _ => return None,
    };
    let name = match &operand.kind {
        ExprKind::Ident(name) => name,
        _ => return None,
    };
    match &rhs.kind {
        ExprKind::Str(s) if s == "undefined" => Some(name.as_str()),
        _ => None,
    }
}

/// Collect the special-type checks an expression proves when it evaluates
/// to `truthy`. Only checks whose own node is tagged `Inserted` count:
/// the pattern is specifically about *newly added* guards.
fn collect_checks<'a>(expr: &'a Expr, truthy: bool, out: &mut Vec<SpecialTypeCheck<'a>>) {
    match &expr.kind {
        // Bare identifier truthiness. `undefined` and `NaN` are value
        // identifiers, not variables under test.
        ExprKind::Ident(name) if name != "undefined" && name != "NaN" => {
            if expr.tag == ChangeTag::Inserted {
                out.push(SpecialTypeCheck {
                    identifier: name.as_str(),
                    ty: SpecialType::Falsey,
                    is_special: !truthy,
                });
            }
        }
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => collect_checks(operand, !truthy, out),
        ExprKind::Binary { op, lhs, rhs } => match op {
            // A true conjunction proves both sides; a false disjunction
            // refutes both sides. The other polarities prove nothing.
            BinaryOp::And if truthy => {
                collect_checks(lhs, true, out);
                collect_checks(rhs, true, out);
            }
            BinaryOp::Or if !truthy => {
                collect_checks(lhs, false, out);
                collect_checks(rhs, false, out);
            }
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => {
                if expr.tag != ChangeTag::Inserted {
                    return;
                }
                let equality = matches!(op, BinaryOp::Eq | BinaryOp::StrictEq);
                let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNotEq);
                let is_special = if equality { truthy } else { !truthy };

                if let Some(identifier) =
                    typeof_undefined_check(lhs, rhs).or_else(|| typeof_undefined_check(rhs, lhs))
                {
                    out.push(SpecialTypeCheck {
                        identifier,
                        ty: SpecialType::Undefined,
                        is_special,
                    });
                    return;
                }

                let (identifier, literal) = match (&lhs.kind, &rhs.kind) {
                    (ExprKind::Ident(name), _) if name != "undefined" && name != "NaN" => {
                        (name.as_str(), &**rhs)
                    }
                    (_, ExprKind::Ident(name)) if name != "undefined" && name != "NaN" => {
                        (name.as_str(), &**lhs)
                    }
                    _ => return,
                };
                if let Some(ty) = compared_special_type(literal, strict) {
                    out.push(SpecialTypeCheck {
                        identifier,
                        ty,
                        is_special,
                    });
                }
            }
            _ => {}
        },
        _ => {}
    }
}

// =============================================================================
// Lattice element
// =============================================================================

/// Per-path abstract state. Forking deep-copies all three maps; no state
/// is shared between diverged paths.
#[derive(Debug, Clone, Default)]
pub struct SpecialTypeState {
    /// Identifier -> types it may be on this path.
    special: FxHashMap<String, Vec<SpecialType>>,
    /// Identifier -> types it is known not to be on this path.
    non_special: FxHashMap<String, Vec<SpecialType>>,
    /// Identifier -> special type it was most recently assigned, when
    /// that assignment is itself inserted/removed/updated.
    assignments: FxHashMap<String, SpecialType>,
}

impl SpecialTypeState {
    fn record(&mut self, check: &SpecialTypeCheck<'_>) {
        let map = if check.is_special {
            &mut self.special
        } else {
            &mut self.non_special
        };
        let types = map.entry(check.identifier.to_string()).or_default();
        if !types.contains(&check.ty) {
            types.push(check.ty);
        }
    }

    /// Facts about an identifier stop holding once it is reassigned to
    /// anything we cannot classify.
    fn clear(&mut self, identifier: &str) {
        self.assignments.remove(identifier);
        self.non_special.remove(identifier);
    }
}

impl PathState for SpecialTypeState {
    fn fork(&self) -> Self {
        self.clone()
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// The special-type instantiation of the path-sensitive framework.
#[derive(Debug, Default)]
pub struct SpecialTypeAnalysis {
    findings: Vec<SpecialTypeFinding>,
    seen: FxHashSet<(String, SpecialType)>,
}

impl SpecialTypeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, identifier: &str, ty: SpecialType) {
        if self.seen.insert((identifier.to_string(), ty)) {
            debug!(identifier, %ty, "special-type repair detected");
            self.findings.push(SpecialTypeFinding {
                function: None,
                identifier: identifier.to_string(),
                special_type: ty,
            });
        }
    }
}

impl<'a> FlowAnalysis<'a> for SpecialTypeAnalysis {
    type State = SpecialTypeState;
    type Finding = SpecialTypeFinding;

    fn entry_state(&self) -> SpecialTypeState {
        SpecialTypeState::default()
    }

    fn transfer_edge(
        &mut self,
        guard: &Guard<'a>,
        state: &mut SpecialTypeState,
        scope: &dyn ScopeResolver,
    ) -> Result<()> {
        let truthy = guard.polarity == Polarity::True;
        let mut checks = Vec::new();
        match guard.test {
            GuardTest::Cond(expr) => {
                if matches!(expr.kind, ExprKind::Assign { .. }) {
                    return Err(PatchflowError::UnsupportedGuard(
                        "assignment used as branch condition".to_string(),
                    ));
                }
                collect_checks(expr, truthy, &mut checks);
            }
            // Switch dispatch behaves as strict equality between the
            // scrutinee and the case expression.
            GuardTest::CaseEq { scrutinee, test } => {
                if test.tag == ChangeTag::Inserted {
                    if let ExprKind::Ident(name) = &scrutinee.kind {
                        if let Some(ty) = compared_special_type(test, true) {
                            checks.push(SpecialTypeCheck {
                                identifier: name.as_str(),
                                ty,
                                is_special: truthy,
                            });
                        }
                    }
                }
            }
            // The fabricated key-iteration test says nothing about values.
            GuardTest::HasNextKey(_) => return Ok(()),
        }

        for check in &checks {
            // A check on a freshly-introduced variable is not a repair of
            // old code.
            if scope
                .declaration_of(check.identifier)
                .is_some_and(|decl| decl.tag == ChangeTag::Inserted)
            {
                continue;
            }
            state.record(check);
        }
        Ok(())
    }

    fn transfer_node(
        &mut self,
        node: &CfgNode<'a>,
        state: &mut SpecialTypeState,
        _scope: &dyn ScopeResolver,
    ) {
        let (used, assignments) = match node.source {
            SourceRef::Stmt(stmt) => (used_identifiers(stmt), identifier_assignments(stmt)),
            SourceRef::Expr(expr) => (
                used_identifiers_in_expr(expr),
                identifier_assignments_in_expr(expr),
            ),
            SourceRef::Empty => return,
            // The fabricated next-key assignment writes an arbitrary key
            // into the loop variable: whatever we knew about it is gone.
            SourceRef::NextKeyAssign { target, .. } => {
                if let ExprKind::Ident(name) = &target.kind {
                    state.clear(name);
                }
                return;
            }
        };

        for (identifier, excluded) in &state.non_special {
            // Both proven-possible and proven-impossible on one path
            // means the path condition is contradictory; stay quiet.
            if state.special.contains_key(identifier) {
                continue;
            }
            if !used.contains(identifier) {
                continue;
            }
            let assigned = state.assignments.get(identifier).copied();
            if assigned == Some(SpecialType::Falsey) {
                continue;
            }
            for ty in excluded {
                if assigned != Some(*ty) {
                    self.emit(identifier, *ty);
                }
            }
        }

        for (name, value) in assignments {
            match assigned_special_type(value) {
                Some(ty)
                    if matches!(
                        value.tag,
                        ChangeTag::Inserted | ChangeTag::Removed | ChangeTag::Updated
                    ) =>
                {
                    state.assignments.insert(name.to_string(), ty);
                }
                _ => {
                    state.assignments.remove(name);
                }
            }
            // Any assignment invalidates a previously proven exclusion.
            state.non_special.remove(name);
        }
    }

    fn into_findings(self) -> Vec<SpecialTypeFinding> {
        self.findings
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Run the special-type analysis over every function of a destination
/// version script: the script body first, then nested functions in
/// declaration order. Functions that fail to build are logged and skipped.
pub fn find_special_type_repairs(script: &[Stmt]) -> Vec<SpecialTypeFinding> {
    let mut findings = Vec::new();
    for unit in function_units(script) {
        let cfg = match build_function(&unit) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(function = unit.display_name(), %err, "skipping function");
                continue;
            }
        };
        let scope = FunctionScope::for_function(unit.params, unit.body);
        let function = cfg.name.clone();
        findings.extend(
            run_analysis(&cfg, SpecialTypeAnalysis::new(), &scope)
                .into_iter()
                .map(|mut finding| {
                    finding.function = Some(function.clone());
                    finding
                }),
        );
    }
    findings
}
