//! Scope resolution contract.
//!
//! The full lexical scope tree is built by an external collaborator; the
//! analyses only ever ask one question of it: which declaration introduced
//! an identifier, and in particular whether that declaration is itself a
//! change. [`FunctionScope`] is the minimal in-crate implementation,
//! harvesting the declarations of a single function body. That is enough
//! for single-function callers and tests.

use rustc_hash::FxHashMap;

use crate::ast::types::{ChangeTag, Param, Stmt, StmtKind};

/// A declaration site as the analyses see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration<'a> {
    pub name: &'a str,
    pub tag: ChangeTag,
}

/// Resolves identifiers to the declaration that introduced them.
pub trait ScopeResolver {
    fn declaration_of(&self, identifier: &str) -> Option<Declaration<'_>>;
}

/// Declarations visible inside one function body: parameters, `var`
/// declarators and function declarations. Does not model hoisting
/// subtleties or closures over enclosing scopes.
#[derive(Debug, Default)]
pub struct FunctionScope {
    declarations: FxHashMap<String, ChangeTag>,
}

impl FunctionScope {
    /// Harvest the declarations of a script body.
    pub fn for_script(body: &[Stmt]) -> Self {
        Self::for_function(&[], body)
    }

    /// Harvest parameters plus the declarations of a function body.
    pub fn for_function(params: &[Param], body: &[Stmt]) -> Self {
        let mut scope = Self::default();
        for param in params {
            scope.declarations.insert(param.name.clone(), param.tag);
        }
        scope.harvest(body);
        scope
    }

    fn harvest(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.harvest_stmt(stmt);
        }
    }

    fn harvest_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(declarators) => {
                for declarator in declarators {
                    self.declarations
                        .insert(declarator.name.clone(), declarator.tag);
                }
            }
            StmtKind::FunctionDecl { name, .. } => {
                // The nested body belongs to the nested function's scope.
                self.declarations.insert(name.clone(), stmt.tag);
            }
            StmtKind::Block(body) => self.harvest(body),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.harvest_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.harvest_stmt(else_branch);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::ForIn { body, .. }
            | StmtKind::With { body, .. } => self.harvest_stmt(body),
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.harvest_stmt(init);
                }
                self.harvest_stmt(body);
            }
            StmtKind::Switch { clauses, .. } => {
                for clause in clauses {
                    self.harvest(&clause.body);
                }
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.harvest(body);
                for catch in catches {
                    self.declarations
                        .insert(catch.param.name.clone(), catch.param.tag);
                    self.harvest(&catch.body);
                }
                if let Some(finally) = finally {
                    self.harvest(finally);
                }
            }
            _ => {}
        }
    }
}

impl ScopeResolver for FunctionScope {
    fn declaration_of(&self, identifier: &str) -> Option<Declaration<'_>> {
        self.declarations
            .get_key_value(identifier)
            .map(|(name, tag)| Declaration { name, tag: *tag })
    }
}
