//! CFG construction by structural induction.
//!
//! Every statement form composes into a [`Fragment`]: one entry node plus
//! four disjoint exit sets (normal fall-through, return, break, continue).
//! Jump exits carry no outgoing edges until the nearest enclosing construct
//! that understands them wires them up: loops and switches consume breaks,
//! loops consume continues, the function wrapper consumes returns. Exits
//! that nothing consumes are reported and dropped at function scope.
//!
//! # Error policy
//!
//! Statement forms outside the known set degrade to the leaf-statement
//! rule. Structural invariant violations (overlapping exit sets) abort the
//! build of that one function; [`build_cfgs`] logs the function as skipped
//! and continues with the next.
//!
//! # Known approximation
//!
//! Try/catch/finally routes every exit category of the try and catch
//! fragments through the finally fragment, whose own exits become the
//! construct's exits. A jump therefore loses its jump character once it
//! has passed through `finally`: the resulting graph is not accurate when
//! jump statements meet a finally block. This is deliberate and must not
//! be "fixed" locally; downstream consumers rely on the documented shape.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::ast::types::{CatchClause, Expr, Stmt, StmtKind, SwitchClause};
use crate::ast::visit::{function_units, FunctionUnit};
use crate::cfg::types::{
    CatchArm, Cfg, CfgEdge, CfgNode, Guard, GuardTest, JumpKind, NodeId, NodeKind, Polarity,
    SourceRef, SwitchArm,
};
use crate::error::{PatchflowError, Result};

/// A partially-built CFG: one entry plus categorized exit sets that are
/// wired by the enclosing composition step.
#[derive(Debug)]
struct Fragment {
    entry: NodeId,
    /// Normal fall-through exits.
    exits: Vec<NodeId>,
    /// Return-jump exits, consumed at function scope.
    returns: Vec<NodeId>,
    /// Break-jump exits, consumed by the nearest loop or switch.
    breaks: Vec<NodeId>,
    /// Continue-jump exits, consumed by the nearest loop.
    continues: Vec<NodeId>,
}

impl Fragment {
    fn from_entry(entry: NodeId) -> Self {
        Self {
            entry,
            exits: Vec::new(),
            returns: Vec::new(),
            breaks: Vec::new(),
            continues: Vec::new(),
        }
    }

    /// A single node that both enters and normally exits the fragment.
    fn leaf(entry: NodeId) -> Self {
        let mut fragment = Self::from_entry(entry);
        fragment.exits.push(entry);
        fragment
    }

    /// Fold another fragment's jump exits into this one (normal exits are
    /// wired explicitly by each composition rule).
    fn absorb_jumps(&mut self, other: &Fragment) {
        self.returns.extend_from_slice(&other.returns);
        self.breaks.extend_from_slice(&other.breaks);
        self.continues.extend_from_slice(&other.continues);
    }

    /// The four exit sets must stay disjoint at all times.
    fn ensure_disjoint(&self, function: &str) -> Result<()> {
        let mut seen = FxHashSet::default();
        let sets = [
            ("normal", &self.exits),
            ("return", &self.returns),
            ("break", &self.breaks),
            ("continue", &self.continues),
        ];
        for (label, set) in sets {
            for id in set {
                if !seen.insert(*id) {
                    return Err(PatchflowError::MalformedCfg {
                        function: function.to_string(),
                        detail: format!("node {id:?} appears in two exit sets (last: {label})"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builds one CFG per script/function by structural induction over the
/// statement forms.
struct CfgBuilder<'a> {
    function: String,
    nodes: Vec<CfgNode<'a>>,
}

impl<'a> CfgBuilder<'a> {
    fn new(function: &str) -> Self {
        Self {
            function: function.to_string(),
            nodes: Vec::new(),
        }
    }

    fn node(&mut self, source: SourceRef<'a>, kind: NodeKind<'a>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CfgNode {
            id,
            source,
            kind,
            edges: Vec::new(),
        });
        id
    }

    fn empty_node(&mut self) -> NodeId {
        self.node(SourceRef::Empty, NodeKind::Statement)
    }

    fn edge(&mut self, from: NodeId, guard: Option<Guard<'a>>, to: NodeId) {
        self.nodes[from.0].edges.push(CfgEdge { guard, to });
    }

    fn connect_all(&mut self, from: &[NodeId], to: NodeId) {
        for id in from {
            self.edge(*id, None, to);
        }
    }

    /// Fabricated single-empty-statement fragment, used wherever a branch
    /// body is absent.
    fn empty_fragment(&mut self) -> Fragment {
        Fragment::leaf(self.empty_node())
    }

    fn build_stmt_or_empty(&mut self, stmt: &'a Stmt) -> Result<Fragment> {
        Ok(match self.build_stmt(stmt)? {
            Some(fragment) => fragment,
            None => self.empty_fragment(),
        })
    }

    fn build_stmts_or_empty(&mut self, stmts: &'a [Stmt]) -> Result<Fragment> {
        Ok(match self.build_block(stmts)? {
            Some(fragment) => fragment,
            None => self.empty_fragment(),
        })
    }

    /// Dispatch on the statement form. Returns `None` for statements that
    /// contribute nothing to the enclosing CFG (function declarations,
    /// blocks with no buildable statements).
    fn build_stmt(&mut self, stmt: &'a Stmt) -> Result<Option<Fragment>> {
        match &stmt.kind {
            StmtKind::Block(body) => self.build_block(body),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self
                .build_if(cond, then_branch, else_branch.as_deref())
                .map(Some),
            StmtKind::While { cond, body } => self.build_while(cond, body).map(Some),
            StmtKind::DoWhile { body, cond } => self.build_do_while(body, cond).map(Some),
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self
                .build_for(init.as_deref(), cond.as_ref(), update.as_ref(), body)
                .map(Some),
            StmtKind::ForIn {
                target,
                object,
                body,
            } => self.build_for_in(target, object, body).map(Some),
            StmtKind::Switch { scrutinee, clauses } => {
                self.build_switch(scrutinee, clauses).map(Some)
            }
            StmtKind::With { object: _, body } => self.build_with(stmt, body).map(Some),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self
                .build_try(stmt, body, catches, finally.as_deref())
                .map(Some),
            StmtKind::Break => Ok(Some(self.build_jump(stmt, JumpKind::Break))),
            StmtKind::Continue => Ok(Some(self.build_jump(stmt, JumpKind::Continue))),
            StmtKind::Return(_) => Ok(Some(self.build_jump(stmt, JumpKind::Return))),
            // Nested functions get their own independent CFG.
            StmtKind::FunctionDecl { .. } => Ok(None),
            // Leaf statements, including anything unrecognized.
            _ => {
                let id = self.node(SourceRef::Stmt(stmt), NodeKind::Statement);
                Ok(Some(Fragment::leaf(id)))
            }
        }
    }

    /// Chain a statement sequence: each fragment's normal exits wire
    /// unconditionally to the next fragment's entry; jump exits propagate
    /// upward untouched.
    fn build_block(&mut self, stmts: &'a [Stmt]) -> Result<Option<Fragment>> {
        let mut block: Option<Fragment> = None;
        let mut previous: Option<Fragment> = None;

        for stmt in stmts {
            let sub = match self.build_stmt(stmt)? {
                Some(sub) => sub,
                None => continue,
            };
            sub.ensure_disjoint(&self.function)?;

            if let Some(prev) = previous.take() {
                self.connect_all(&prev.exits, sub.entry);
            }
            if let Some(head) = block.as_mut() {
                head.absorb_jumps(&sub);
            } else {
                let mut head = Fragment::from_entry(sub.entry);
                head.absorb_jumps(&sub);
                block = Some(head);
            }
            previous = Some(sub);
        }

        match (block, previous) {
            (Some(mut block), Some(last)) => {
                block.exits = last.exits;
                block.ensure_disjoint(&self.function)?;
                Ok(Some(block))
            }
            _ => Ok(None),
        }
    }

    /// If: a synthetic branch node; the true edge enters the then
    /// fragment, the false edge (negated condition) enters the else
    /// fragment. Exit sets are the union of both branches.
    fn build_if(
        &mut self,
        cond: &'a Expr,
        then_branch: &'a Stmt,
        else_branch: Option<&'a Stmt>,
    ) -> Result<Fragment> {
        let branch = self.empty_node();
        let mut fragment = Fragment::from_entry(branch);

        let true_branch = self.build_stmt_or_empty(then_branch)?;
        self.edge(
            branch,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::True)),
            true_branch.entry,
        );
        fragment.exits.extend_from_slice(&true_branch.exits);
        fragment.absorb_jumps(&true_branch);

        let false_branch = match else_branch {
            Some(stmt) => self.build_stmt_or_empty(stmt)?,
            None => self.empty_fragment(),
        };
        self.edge(
            branch,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::False)),
            false_branch.entry,
        );
        fragment.exits.extend_from_slice(&false_branch.exits);
        fragment.absorb_jumps(&false_branch);

        Ok(fragment)
    }

    /// While: body normal and continue exits re-enter the condition; break
    /// exits leave the loop; the false-branch node is the loop's sole
    /// intrinsic normal exit.
    fn build_while(
        &mut self,
        cond: &'a Expr,
        body: &'a Stmt,
    ) -> Result<Fragment> {
        let branch = self.empty_node();
        let body = self.build_stmt_or_empty(body)?;

        self.edge(
            branch,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::True)),
            body.entry,
        );
        self.connect_all(&body.exits, branch);
        self.connect_all(&body.continues, branch);

        let done = self.empty_node();
        self.edge(
            branch,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::False)),
            done,
        );

        let mut fragment = Fragment::from_entry(branch);
        fragment.exits.push(done);
        fragment.exits.extend_from_slice(&body.breaks);
        fragment.returns = body.returns;
        Ok(fragment)
    }

    /// Do-while: the body runs unconditionally once; a trailing condition
    /// node loops back to the body entry or exits.
    fn build_do_while(
        &mut self,
        body: &'a Stmt,
        cond: &'a Expr,
    ) -> Result<Fragment> {
        let body = self.build_stmt_or_empty(body)?;
        let check = self.empty_node();

        self.connect_all(&body.exits, check);
        self.connect_all(&body.continues, check);
        self.edge(
            check,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::True)),
            body.entry,
        );

        let done = self.empty_node();
        self.edge(
            check,
            Some(Guard::when(GuardTest::Cond(cond), Polarity::False)),
            done,
        );

        let mut fragment = Fragment::from_entry(body.entry);
        fragment.exits.push(done);
        fragment.exits.extend_from_slice(&body.breaks);
        fragment.returns = body.returns;
        Ok(fragment)
    }

    /// For: the entry node wraps the initializer and doubles as the loop
    /// header; body normal and continue exits route through the increment
    /// node before re-entering the condition check. A missing condition
    /// loops unconditionally (exits only via break or return).
    fn build_for(
        &mut self,
        init: Option<&'a Stmt>,
        cond: Option<&'a Expr>,
        update: Option<&'a Expr>,
        body: &'a Stmt,
    ) -> Result<Fragment> {
        let header_source = match init {
            Some(stmt) => SourceRef::Stmt(stmt),
            None => SourceRef::Empty,
        };
        let header = self.node(header_source, NodeKind::Statement);

        let increment_source = match update {
            Some(expr) => SourceRef::Expr(expr),
            None => SourceRef::Empty,
        };
        let increment = self.node(increment_source, NodeKind::Statement);
        self.edge(increment, None, header);

        let body = self.build_stmt_or_empty(body)?;
        self.connect_all(&body.exits, increment);
        self.connect_all(&body.continues, increment);

        let mut fragment = Fragment::from_entry(header);
        match cond {
            Some(cond) => {
                self.edge(
                    header,
                    Some(Guard::when(GuardTest::Cond(cond), Polarity::True)),
                    body.entry,
                );
                let done = self.empty_node();
                self.edge(
                    header,
                    Some(Guard::when(GuardTest::Cond(cond), Polarity::False)),
                    done,
                );
                fragment.exits.push(done);
            }
            None => self.edge(header, None, body.entry),
        }
        fragment.exits.extend_from_slice(&body.breaks);
        fragment.returns = body.returns;
        Ok(fragment)
    }

    /// For-in, desugared with two fabricated pseudo-methods: a has-next-key
    /// branch node and a get-next-key assignment node. Body normal and
    /// continue exits return to the assignment node.
    fn build_for_in(
        &mut self,
        target: &'a Expr,
        object: &'a Expr,
        body: &'a Stmt,
    ) -> Result<Fragment> {
        let has_next = self.empty_node();
        let assign = self.node(
            SourceRef::NextKeyAssign { target, object },
            NodeKind::Statement,
        );
        self.edge(
            has_next,
            Some(Guard::when(GuardTest::HasNextKey(object), Polarity::True)),
            assign,
        );

        let body = self.build_stmt_or_empty(body)?;
        self.edge(assign, None, body.entry);
        self.connect_all(&body.exits, assign);
        self.connect_all(&body.continues, assign);

        let done = self.empty_node();
        self.edge(
            has_next,
            Some(Guard::when(GuardTest::HasNextKey(object), Polarity::False)),
            done,
        );

        let mut fragment = Fragment::from_entry(has_next);
        fragment.exits.push(done);
        fragment.exits.extend_from_slice(&body.breaks);
        fragment.returns = body.returns;
        Ok(fragment)
    }

    /// Switch: one dispatch node keyed by the scrutinee. Fall-through is
    /// wired by merging a case's normal exits into the next case's entry.
    /// Break exits of any case become switch normal exits; when there is
    /// no default clause the dispatch node itself is a normal exit
    /// (execution may match no case).
    fn build_switch(
        &mut self,
        scrutinee: &'a Expr,
        clauses: &'a [SwitchClause],
    ) -> Result<Fragment> {
        // Kind payload is filled in after the case fragments exist.
        let dispatch = self.node(SourceRef::Empty, NodeKind::Statement);
        let mut fragment = Fragment::from_entry(dispatch);

        let mut arms = Vec::new();
        let mut default = None;
        let mut previous: Option<Fragment> = None;

        for clause in clauses {
            let sub = self.build_stmts_or_empty(&clause.body)?;

            match &clause.test {
                Some(test) => arms.push(SwitchArm {
                    test,
                    target: sub.entry,
                }),
                None => default = Some(sub.entry),
            }

            fragment.returns.extend_from_slice(&sub.returns);
            fragment.continues.extend_from_slice(&sub.continues);
            fragment.exits.extend_from_slice(&sub.breaks);

            if let Some(prev) = previous {
                self.connect_all(&prev.exits, sub.entry);
            }
            previous = Some(sub);
        }

        if let Some(last) = previous {
            fragment.exits.extend_from_slice(&last.exits);
        }
        if default.is_none() {
            fragment.exits.push(dispatch);
        }

        self.nodes[dispatch.0].kind = NodeKind::Switch {
            scrutinee,
            arms,
            default,
        };
        Ok(fragment)
    }

    /// With: a scope-wrapper node; the wrapped fragment's exits propagate
    /// unchanged.
    fn build_with(&mut self, stmt: &'a Stmt, body: &'a Stmt) -> Result<Fragment> {
        let inner = self.build_stmt_or_empty(body)?;
        let wrapper = self.node(
            SourceRef::Stmt(stmt),
            NodeKind::With { inner: inner.entry },
        );

        let mut fragment = Fragment::from_entry(wrapper);
        fragment.exits = inner.exits;
        fragment.returns = inner.returns;
        fragment.breaks = inner.breaks;
        fragment.continues = inner.continues;
        Ok(fragment)
    }

    /// Try/catch/finally. See the module docs for the deliberate
    /// approximation around jumps meeting a finally block.
    fn build_try(
        &mut self,
        stmt: &'a Stmt,
        body: &'a [Stmt],
        catches: &'a [CatchClause],
        finally: Option<&'a [Stmt]>,
    ) -> Result<Fragment> {
        let finally_fragment = match finally {
            Some(stmts) => self.build_stmts_or_empty(stmts)?,
            None => self.empty_fragment(),
        };

        let try_fragment = self.build_stmts_or_empty(body)?;
        self.route_through_finally(&try_fragment, finally_fragment.entry);

        let mut catch_arms = Vec::new();
        for catch in catches {
            let catch_fragment = self.build_stmts_or_empty(&catch.body)?;
            self.route_through_finally(&catch_fragment, finally_fragment.entry);
            catch_arms.push(CatchArm {
                guard: catch.guard.as_ref(),
                target: catch_fragment.entry,
            });
        }

        let try_node = self.node(
            SourceRef::Stmt(stmt),
            NodeKind::Try {
                try_branch: try_fragment.entry,
                catches: catch_arms,
                finally_branch: finally_fragment.entry,
            },
        );

        let mut fragment = Fragment::from_entry(try_node);
        fragment.exits = finally_fragment.exits;
        fragment.returns = finally_fragment.returns;
        fragment.breaks = finally_fragment.breaks;
        fragment.continues = finally_fragment.continues;
        Ok(fragment)
    }

    /// Merge every exit category of a try or catch fragment into the
    /// finally entry. Jumps lose their jump character past this point;
    /// that is the documented approximation.
    fn route_through_finally(&mut self, fragment: &Fragment, finally_entry: NodeId) {
        self.connect_all(&fragment.exits, finally_entry);
        self.connect_all(&fragment.returns, finally_entry);
        self.connect_all(&fragment.breaks, finally_entry);
        self.connect_all(&fragment.continues, finally_entry);
    }

    /// Jump marker with no outgoing edges, placed in the matching exit
    /// set.
    fn build_jump(&mut self, stmt: &'a Stmt, kind: JumpKind) -> Fragment {
        let id = self.node(SourceRef::Stmt(stmt), NodeKind::Jump(kind));
        let mut fragment = Fragment::from_entry(id);
        match kind {
            JumpKind::Break => fragment.breaks.push(id),
            JumpKind::Continue => fragment.continues.push(id),
            JumpKind::Return => fragment.returns.push(id),
        }
        fragment
    }

    /// Wrap a function/script body fragment with dedicated entry and exit
    /// markers. Return exits are the authoritative function exits and are
    /// wired to the exit marker together with the normal exits; leftover
    /// break/continue exits indicate malformed input and are dropped with
    /// a warning.
    fn finish(mut self, body: Option<Fragment>) -> Result<Cfg<'a>> {
        let body = match body {
            Some(fragment) => fragment,
            None => self.empty_fragment(),
        };
        body.ensure_disjoint(&self.function)?;

        let entry = self.empty_node();
        let exit = self.empty_node();
        self.edge(entry, None, body.entry);
        self.connect_all(&body.exits, exit);
        self.connect_all(&body.returns, exit);

        for (kind, set) in [("break", &body.breaks), ("continue", &body.continues)] {
            if !set.is_empty() {
                let err = PatchflowError::UnresolvedJump {
                    kind,
                    count: set.len(),
                };
                warn!(function = %self.function, %err, "dropping unconsumed jump exits");
            }
        }

        Ok(Cfg::new(self.function, self.nodes, entry, vec![exit]))
    }
}

/// Build the CFG for a single script or function unit.
pub fn build_function<'a>(unit: &FunctionUnit<'a>) -> Result<Cfg<'a>> {
    let mut builder = CfgBuilder::new(unit.display_name());
    let body = builder.build_block(unit.body)?;
    let cfg = builder.finish(body)?;
    cfg.validate()?;
    debug!(function = %cfg.name, nodes = cfg.len(), "built CFG");
    Ok(cfg)
}

/// Build one CFG per script/function: the outer script first, then nested
/// functions in declaration order. A function whose build fails is logged
/// and skipped; the rest of the pass continues.
pub fn build_cfgs(script: &[Stmt]) -> Vec<Cfg<'_>> {
    function_units(script)
        .iter()
        .filter_map(|unit| match build_function(unit) {
            Ok(cfg) => Some(cfg),
            Err(err) => {
                warn!(function = unit.display_name(), %err, "skipping function");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{Expr, StmtKind, SwitchClause};
    use crate::cfg::types::{NodeKind, SourceRef};

    fn single_exit(cfg: &Cfg<'_>) -> NodeId {
        assert_eq!(cfg.exits.len(), 1);
        cfg.exits[0]
    }

    /// Normal exits of the fragment one step before the function exit
    /// marker: the predecessors of the exit node.
    fn predecessors_of_exit(cfg: &Cfg<'_>) -> Vec<NodeId> {
        let exit = single_exit(cfg);
        cfg.nodes()
            .iter()
            .filter(|n| cfg.transitions(n.id).iter().any(|e| e.to == exit))
            .map(|n| n.id)
            .collect()
    }

    #[test]
    fn straight_line_block_chains_statements() {
        let script = vec![
            Stmt::var("a", Some(Expr::number(1.0))),
            Stmt::expr(Expr::assign(Expr::ident("a"), Expr::number(2.0))),
            Stmt::ret(None),
        ];
        let cfgs = build_cfgs(&script);
        assert_eq!(cfgs.len(), 1);
        let cfg = &cfgs[0];
        assert!(cfg.validate().is_ok());
        // entry -> a=1 -> a=2 -> return -> exit, one predecessor of exit
        assert_eq!(predecessors_of_exit(cfg).len(), 1);
    }

    #[test]
    fn if_without_branches_fabricates_two_empty_exits() {
        let script = vec![Stmt::if_stmt(Expr::ident("x"), Stmt::empty(), None)];
        let cfgs = build_cfgs(&script);
        let cfg = &cfgs[0];

        // Both guard edges leave the branch node with opposite polarity.
        let branch = cfg
            .nodes()
            .iter()
            .find(|n| cfg.transitions(n.id).iter().any(|e| e.guard.is_some()))
            .expect("branch node");
        let guards: Vec<_> = cfg.transitions(branch.id).iter().collect();
        assert_eq!(guards.len(), 2);
        assert_ne!(
            guards[0].guard.unwrap().polarity,
            guards[1].guard.unwrap().polarity
        );

        // The merged normal-exit set has exactly two exit nodes.
        assert_eq!(predecessors_of_exit(cfg).len(), 2);
    }

    #[test]
    fn while_loop_has_single_normal_exit() {
        let body = Stmt::block(vec![
            Stmt::expr(Expr::assign(Expr::ident("n"), Expr::number(0.0))),
            Stmt::expr(Expr::call(Expr::ident("step"), vec![])),
        ]);
        let script = vec![Stmt::while_stmt(Expr::ident("n"), body)];
        let cfg = &build_cfgs(&script)[0];
        // Complex body, no breaks: the false-branch node is the loop's
        // only normal exit.
        assert_eq!(predecessors_of_exit(cfg).len(), 1);
    }

    #[test]
    fn while_break_becomes_loop_exit() {
        let body = Stmt::block(vec![Stmt::new(StmtKind::Break)]);
        let script = vec![Stmt::while_stmt(Expr::ident("n"), body)];
        let cfg = &build_cfgs(&script)[0];
        assert_eq!(predecessors_of_exit(cfg).len(), 2);
    }

    #[test]
    fn switch_fallthrough_connects_cases() {
        let clause_a = SwitchClause {
            test: Some(Expr::number(1.0)),
            body: vec![Stmt::expr(Expr::call(Expr::ident("a"), vec![]))],
        };
        let clause_b = SwitchClause {
            test: Some(Expr::number(2.0)),
            body: vec![Stmt::expr(Expr::call(Expr::ident("b"), vec![]))],
        };
        let script = vec![Stmt::new(StmtKind::Switch {
            scrutinee: Expr::ident("x"),
            clauses: vec![clause_a, clause_b],
        })];
        let cfg = &build_cfgs(&script)[0];

        let dispatch = cfg
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Switch { .. }))
            .expect("switch node");
        let (case_a, case_b) = match &dispatch.kind {
            NodeKind::Switch { arms, default, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(default.is_none());
                (arms[0].target, arms[1].target)
            }
            _ => unreachable!(),
        };

        // Fall-through: case A's statement flows into case B's entry with
        // no explicit dispatch edge.
        assert!(cfg.transitions(case_a).iter().any(|e| e.to == case_b));

        // No default: the dispatch node itself is a normal exit.
        let exit = single_exit(cfg);
        assert!(cfg.transitions(dispatch.id).iter().any(|e| e.to == exit));
    }

    #[test]
    fn nested_function_is_excluded_and_gets_own_cfg() {
        let script = vec![
            Stmt::new(StmtKind::FunctionDecl {
                name: "f".to_string(),
                params: vec![],
                body: vec![Stmt::ret(None)],
            }),
            Stmt::expr(Expr::call(Expr::ident("f"), vec![])),
        ];
        let cfgs = build_cfgs(&script);
        assert_eq!(cfgs.len(), 2);
        assert_eq!(cfgs[0].name, "<script>");
        assert_eq!(cfgs[1].name, "f");
        // The script CFG contains only entry, call, exit: the function
        // body does not leak into it.
        assert_eq!(cfgs[0].len(), 3);
    }

    #[test]
    fn try_return_routes_through_finally() {
        let script = vec![Stmt::new(StmtKind::Try {
            body: vec![Stmt::ret(None)],
            catches: vec![],
            finally: Some(vec![Stmt::expr(Expr::call(
                Expr::ident("cleanup"),
                vec![],
            ))]),
        })];
        let cfg = &build_cfgs(&script)[0];

        let try_node = cfg
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Try { .. }))
            .expect("try node");
        let (try_branch, finally_branch) = match &try_node.kind {
            NodeKind::Try {
                try_branch,
                finally_branch,
                ..
            } => (*try_branch, *finally_branch),
            _ => unreachable!(),
        };

        // The return jump inside try flows into the finally entry, not
        // straight to the function exit.
        let return_node = cfg.node(try_branch);
        assert!(matches!(return_node.kind, NodeKind::Jump(JumpKind::Return)));
        assert_eq!(cfg.transitions(try_branch).len(), 1);
        assert_eq!(cfg.transitions(try_branch)[0].to, finally_branch);
    }

    #[test]
    fn empty_body_builds_marker_only_cfg() {
        let cfgs = build_cfgs(&[]);
        assert_eq!(cfgs.len(), 1);
        let cfg = &cfgs[0];
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.exits.len(), 1);
    }

    #[test]
    fn stray_break_is_dropped_not_fatal() {
        let script = vec![Stmt::new(StmtKind::Break)];
        let cfgs = build_cfgs(&script);
        assert_eq!(cfgs.len(), 1);
        let cfg = &cfgs[0];
        // The break marker keeps no outgoing edges; the exit marker is
        // unreachable from it.
        let jump = cfg
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Jump(JumpKind::Break)))
            .expect("jump node");
        assert!(cfg.transitions(jump.id).is_empty());
    }

    #[test]
    fn for_in_desugars_to_has_next_and_assign() {
        let script = vec![Stmt::new(StmtKind::ForIn {
            target: Expr::ident("k"),
            object: Expr::ident("obj"),
            body: Box::new(Stmt::expr(Expr::call(Expr::ident("use"), vec![]))),
        })];
        let cfg = &build_cfgs(&script)[0];
        let assign = cfg
            .nodes()
            .iter()
            .find(|n| matches!(n.source, SourceRef::NextKeyAssign { .. }))
            .expect("next-key assignment node");
        // Body exits loop back to the assignment node.
        let body_target = cfg.transitions(assign.id)[0].to;
        assert!(cfg
            .transitions(body_target)
            .iter()
            .any(|e| e.to == assign.id));
    }
}
