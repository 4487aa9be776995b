//! CFG type definitions.
//!
//! A [`Cfg`] is an arena of nodes borrowing the collaborator-owned AST for
//! the duration of one analysis pass. Node kinds are a single tagged
//! variant ([`NodeKind`]) with exhaustive matching at every consumer;
//! there is no dispatch hierarchy.

use once_cell::sync::OnceCell;
use rustc_hash::FxHashSet;

use crate::ast::types::{Expr, Stmt};
use crate::error::{PatchflowError, Result};

/// Unique identifier for a CFG node (index into the owning arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// What a CFG node wraps: exactly one source node, an explicit empty
/// marker, or the fabricated next-key assignment that desugars for-in
/// iteration.
#[derive(Debug, Clone, Copy)]
pub enum SourceRef<'a> {
    /// A statement from the annotated tree.
    Stmt(&'a Stmt),
    /// An expression from the annotated tree (e.g. a for-loop update).
    Expr(&'a Expr),
    /// Synthetic marker with no source counterpart.
    Empty,
    /// Fabricated `target = object.~getNextKey()` assignment. The pseudo
    /// method name is invalid JavaScript by design; it only exists to give
    /// key iteration a statement the analyses can observe.
    NextKeyAssign {
        target: &'a Expr,
        object: &'a Expr,
    },
}

/// Jump statement categories consumed by enclosing constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
    Return,
}

impl JumpKind {
    pub fn label(self) -> &'static str {
        match self {
            JumpKind::Break => "break",
            JumpKind::Continue => "continue",
            JumpKind::Return => "return",
        }
    }
}

/// Which side of a two-way branch an edge belongs to. Branch nodes emit
/// exactly two edges over the same test, one per polarity; the false edge
/// stands for the test's logical negation without fabricating a `!` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    True,
    False,
}

/// The condition attached to a guarded edge.
#[derive(Debug, Clone, Copy)]
pub enum GuardTest<'a> {
    /// An ordinary condition expression from the source tree.
    Cond(&'a Expr),
    /// Fabricated `object.~hasNextKey()` pseudo-call of the for-in
    /// desugaring.
    HasNextKey(&'a Expr),
    /// Switch dispatch: `scrutinee === test` for one case clause.
    CaseEq {
        scrutinee: &'a Expr,
        test: &'a Expr,
    },
}

/// An edge guard: a test plus the polarity under which the edge is taken.
/// An edge with no guard is unconditional.
#[derive(Debug, Clone, Copy)]
pub struct Guard<'a> {
    pub test: GuardTest<'a>,
    pub polarity: Polarity,
}

impl<'a> Guard<'a> {
    pub fn when(test: GuardTest<'a>, polarity: Polarity) -> Self {
        Self { test, polarity }
    }
}

/// An outgoing edge of a CFG node.
#[derive(Debug, Clone, Copy)]
pub struct CfgEdge<'a> {
    pub guard: Option<Guard<'a>>,
    pub to: NodeId,
}

/// One `case expr:` entry in a switch node's dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct SwitchArm<'a> {
    pub test: &'a Expr,
    pub target: NodeId,
}

/// One catch clause of a try node; `guard` is the conditional-catch
/// expression when present.
#[derive(Debug, Clone, Copy)]
pub struct CatchArm<'a> {
    pub guard: Option<&'a Expr>,
    pub target: NodeId,
}

/// Node kinds. Everything that is not a multi-way construct is a plain
/// `Statement` node whose control flow lives in its `edges`.
#[derive(Debug, Clone)]
pub enum NodeKind<'a> {
    /// Plain statement or synthetic marker.
    Statement,
    /// Multi-way switch dispatch keyed by the scrutinee expression.
    Switch {
        scrutinee: &'a Expr,
        arms: Vec<SwitchArm<'a>>,
        default: Option<NodeId>,
    },
    /// Try statement with one try branch, ordered catch clauses and a
    /// finally branch (fabricated empty fragment when absent).
    Try {
        try_branch: NodeId,
        catches: Vec<CatchArm<'a>>,
        finally_branch: NodeId,
    },
    /// Scope wrapper for `with`, pointing at the wrapped fragment's entry.
    With { inner: NodeId },
    /// Jump marker; placed in the matching exit set during construction
    /// and wired by the nearest enclosing construct that understands it.
    Jump(JumpKind),
}

/// A node in the control flow graph.
#[derive(Debug, Clone)]
pub struct CfgNode<'a> {
    pub id: NodeId,
    pub source: SourceRef<'a>,
    pub kind: NodeKind<'a>,
    /// Outgoing edges added during composition. Multi-way kinds carry
    /// additional targets in their kind payload; [`Cfg::transitions`]
    /// exposes the union.
    pub edges: Vec<CfgEdge<'a>>,
}

/// Complete control flow graph for one script or function.
#[derive(Debug)]
pub struct Cfg<'a> {
    /// Function name, `<script>` or `<anonymous>`.
    pub name: String,
    nodes: Vec<CfgNode<'a>>,
    pub entry: NodeId,
    pub exits: Vec<NodeId>,
    /// Lazily-built per-node outgoing transitions. The path-sensitive
    /// engine revisits the same nodes across many forked paths; deriving
    /// the successor list once per node amortizes the kind-payload
    /// flattening.
    transitions: OnceCell<Vec<Vec<CfgEdge<'a>>>>,
}

impl<'a> Cfg<'a> {
    pub(crate) fn new(name: String, nodes: Vec<CfgNode<'a>>, entry: NodeId, exits: Vec<NodeId>) -> Self {
        Self {
            name,
            nodes,
            entry,
            exits,
            transitions: OnceCell::new(),
        }
    }

    /// Look up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced for this graph. Ids are arena
    /// indices; a [`Cfg`] only hands out valid ones.
    pub fn node(&self, id: NodeId) -> &CfgNode<'a> {
        &self.nodes[id.0]
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[CfgNode<'a>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_exit(&self, id: NodeId) -> bool {
        self.exits.contains(&id)
    }

    /// Outgoing transitions of a node: its plain edges plus the targets
    /// carried by its kind payload (switch arms, try branches, with
    /// scope). Built once per graph, then O(1).
    pub fn transitions(&self, id: NodeId) -> &[CfgEdge<'a>] {
        let table = self.transitions.get_or_init(|| {
            self.nodes.iter().map(Self::derive_transitions).collect()
        });
        &table[id.0]
    }

    fn derive_transitions(node: &CfgNode<'a>) -> Vec<CfgEdge<'a>> {
        let mut out = Vec::new();
        match &node.kind {
            NodeKind::Statement | NodeKind::Jump(_) => {}
            NodeKind::Switch {
                scrutinee,
                arms,
                default,
            } => {
                for arm in arms {
                    out.push(CfgEdge {
                        guard: Some(Guard::when(
                            GuardTest::CaseEq {
                                scrutinee: *scrutinee,
                                test: arm.test,
                            },
                            Polarity::True,
                        )),
                        to: arm.target,
                    });
                }
                if let Some(default) = default {
                    out.push(CfgEdge {
                        guard: None,
                        to: *default,
                    });
                }
            }
            NodeKind::Try {
                try_branch,
                catches,
                ..
            } => {
                out.push(CfgEdge {
                    guard: None,
                    to: *try_branch,
                });
                for catch in catches {
                    out.push(CfgEdge {
                        guard: catch
                            .guard
                            .map(|g| Guard::when(GuardTest::Cond(g), Polarity::True)),
                        to: catch.target,
                    });
                }
            }
            NodeKind::With { inner } => out.push(CfgEdge {
                guard: None,
                to: *inner,
            }),
        }
        out.extend(node.edges.iter().copied());
        out
    }

    /// Check structural invariants: the entry, every exit and every edge
    /// target must name a node of this graph, and the exit list must be
    /// duplicate-free.
    pub fn validate(&self) -> Result<()> {
        let malformed = |detail: String| PatchflowError::MalformedCfg {
            function: self.name.clone(),
            detail,
        };

        if self.entry.0 >= self.nodes.len() {
            return Err(malformed(format!("entry {:?} out of range", self.entry)));
        }

        let mut seen = FxHashSet::default();
        for exit in &self.exits {
            if exit.0 >= self.nodes.len() {
                return Err(malformed(format!("exit {exit:?} out of range")));
            }
            if !seen.insert(*exit) {
                return Err(malformed(format!("duplicate exit {exit:?}")));
            }
        }

        for node in &self.nodes {
            for edge in self.transitions(node.id) {
                if edge.to.0 >= self.nodes.len() {
                    return Err(malformed(format!(
                        "edge {:?} -> {:?} targets a missing node",
                        node.id, edge.to
                    )));
                }
            }
        }

        Ok(())
    }
}
