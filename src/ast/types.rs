//! AST node definitions.

use serde::{Deserialize, Serialize};

/// Change annotation assigned to a node by the external tree differ.
///
/// Tags describe how a node changed between the "before" and "after"
/// version of a file. This crate only ever reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTag {
    /// Present and identical in both versions.
    Unchanged,
    /// Present only in the destination version.
    Inserted,
    /// Present only in the source version.
    Removed,
    /// Present in both versions with modified content.
    Updated,
    /// Present in both versions at a different position.
    Moved,
}

impl ChangeTag {
    /// Whether the node differs between the two versions in any way.
    pub fn is_changed(self) -> bool {
        !matches!(self, ChangeTag::Unchanged)
    }
}

/// Unary operators that matter to the analyses. Anything else arrives as
/// an uninterpreted expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (`!`).
    Not,
    /// `typeof` operator.
    TypeOf,
    /// Arithmetic negation (`-`).
    Neg,
}

/// Binary operators that matter to the analyses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    /// Loose equality (`==`).
    Eq,
    /// Loose inequality (`!=`).
    NotEq,
    /// Strict equality (`===`).
    StrictEq,
    /// Strict inequality (`!==`).
    StrictNotEq,
    /// Short-circuit conjunction (`&&`).
    And,
    /// Short-circuit disjunction (`||`).
    Or,
    /// Any other operator, carried as its source text.
    Other(String),
}

/// An expression together with its change annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub tag: ChangeTag,
}

/// Expression forms. `undefined` and `NaN` are identifiers in JavaScript
/// and arrive as [`ExprKind::Ident`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Function {
        name: Option<String>,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
}

/// A function parameter with its own change annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub tag: ChangeTag,
}

/// One `name = init` binding inside a `var` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
    pub tag: ChangeTag,
}

/// One `case`/`default` clause of a switch statement. `test` is `None`
/// for the default clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchClause {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// One catch clause. `guard` carries the SpiderMonkey-style conditional
/// catch expression (`catch (e if cond)`) when present.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Param,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// A statement together with its change annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub tag: ChangeTag,
}

/// Statement forms covered by the construction engine. Anything the
/// differ produces outside this set should be wrapped in [`StmtKind::Expr`]
/// so it degrades to the leaf-statement rule.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    VarDecl(Vec<Declarator>),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        target: Expr,
        object: Expr,
        body: Box<Stmt>,
    },
    Switch {
        scrutinee: Expr,
        clauses: Vec<SwitchClause>,
    },
    With {
        object: Expr,
        body: Box<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    FunctionDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
}

// =============================================================================
// Construction helpers
// =============================================================================
//
// Collaborators (and tests) build trees programmatically; these keep that
// from being a wall of struct literals. Nodes default to `Unchanged`.

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            tag: ChangeTag::Unchanged,
        }
    }

    /// Replace the change annotation.
    #[must_use]
    pub fn with_tag(mut self, tag: ChangeTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn ident(name: &str) -> Self {
        Self::new(ExprKind::Ident(name.to_string()))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ExprKind::Number(value))
    }

    pub fn string(value: &str) -> Self {
        Self::new(ExprKind::Str(value.to_string()))
    }

    pub fn null() -> Self {
        Self::new(ExprKind::Null)
    }

    pub fn not(operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    pub fn type_of(operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op: UnaryOp::TypeOf,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            tag: ChangeTag::Unchanged,
        }
    }

    /// Replace the change annotation.
    #[must_use]
    pub fn with_tag(mut self, tag: ChangeTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn empty() -> Self {
        Self::new(StmtKind::Empty)
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block(stmts))
    }

    pub fn if_stmt(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_stmt(cond: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::While {
            cond,
            body: Box::new(body),
        })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    pub fn var(name: &str, init: Option<Expr>) -> Self {
        Self::new(StmtKind::VarDecl(vec![Declarator {
            name: name.to_string(),
            init,
            tag: ChangeTag::Unchanged,
        }]))
    }
}
