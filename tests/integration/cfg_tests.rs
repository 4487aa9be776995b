//! CFG construction checks through the public API.

use patchflow::ast::types::{Declarator, SwitchClause};
use patchflow::cfg::types::{JumpKind, NodeKind, SourceRef};
use patchflow::cfg::{build_cfgs, Cfg, NodeId};
use patchflow::{Expr, Stmt, StmtKind};

fn exit_of(cfg: &Cfg<'_>) -> NodeId {
    assert_eq!(cfg.exits.len(), 1, "one exit marker per function");
    cfg.exits[0]
}

/// Nodes whose outgoing transitions reach the exit marker directly.
fn exit_predecessors(cfg: &Cfg<'_>) -> Vec<NodeId> {
    let exit = exit_of(cfg);
    cfg.nodes()
        .iter()
        .filter(|node| cfg.transitions(node.id).iter().any(|edge| edge.to == exit))
        .map(|node| node.id)
        .collect()
}

#[test]
fn block_normal_exits_equal_the_last_statement() {
    let script = vec![
        Stmt::var("a", Some(Expr::number(1.0))),
        Stmt::expr(Expr::call(Expr::ident("f"), vec![])),
        Stmt::expr(Expr::call(Expr::ident("g"), vec![])),
    ];
    let cfgs = build_cfgs(&script);
    assert_eq!(cfgs.len(), 1);
    let cfg = &cfgs[0];
    cfg.validate().expect("structurally valid CFG");

    // No jumps inside: exactly the last statement flows to the exit.
    let preds = exit_predecessors(cfg);
    assert_eq!(preds.len(), 1);
    let last = cfg.node(preds[0]);
    match last.source {
        SourceRef::Stmt(stmt) => assert!(matches!(stmt.kind, StmtKind::Expr(_))),
        _ => panic!("expected the last statement to reach the exit"),
    }
}

#[test]
fn if_with_no_branches_builds_two_fabricated_exits() {
    let script = vec![Stmt::if_stmt(Expr::ident("cond"), Stmt::empty(), None)];
    let cfg = &build_cfgs(&script)[0];
    cfg.validate().expect("structurally valid CFG");

    let branch = cfg
        .nodes()
        .iter()
        .find(|n| cfg.transitions(n.id).iter().all(|e| e.guard.is_some())
            && !cfg.transitions(n.id).is_empty())
        .expect("branch node with guarded edges");
    let edges = cfg.transitions(branch.id);
    assert_eq!(edges.len(), 2);

    // Both guard targets are fabricated markers that flow to the exit.
    assert_eq!(exit_predecessors(cfg).len(), 2);
}

#[test]
fn while_loop_normal_exit_is_independent_of_body_complexity() {
    let busy_body = Stmt::block(vec![
        Stmt::if_stmt(
            Expr::ident("a"),
            Stmt::expr(Expr::call(Expr::ident("f"), vec![])),
            Some(Stmt::expr(Expr::call(Expr::ident("g"), vec![]))),
        ),
        Stmt::expr(Expr::assign(Expr::ident("n"), Expr::number(0.0))),
    ]);
    let script = vec![Stmt::while_stmt(Expr::ident("n"), busy_body)];
    let cfg = &build_cfgs(&script)[0];
    // However complex the body, the false branch is the sole normal exit.
    assert_eq!(exit_predecessors(cfg).len(), 1);
}

#[test]
fn switch_fallthrough_needs_no_dispatch_edge() {
    let script = vec![Stmt::new(StmtKind::Switch {
        scrutinee: Expr::ident("x"),
        clauses: vec![
            SwitchClause {
                test: Some(Expr::string("a")),
                body: vec![Stmt::expr(Expr::call(Expr::ident("handle_a"), vec![]))],
            },
            SwitchClause {
                test: Some(Expr::string("b")),
                body: vec![Stmt::expr(Expr::call(Expr::ident("handle_b"), vec![]))],
            },
        ],
    })];
    let cfg = &build_cfgs(&script)[0];

    let dispatch = cfg
        .nodes()
        .iter()
        .find(|n| matches!(n.kind, NodeKind::Switch { .. }))
        .expect("dispatch node");
    let (case_a, case_b) = match &dispatch.kind {
        NodeKind::Switch { arms, .. } => (arms[0].target, arms[1].target),
        _ => unreachable!(),
    };

    // Case A's body flows into case B without any dispatch edge to B's
    // interior.
    assert!(cfg.transitions(case_a).iter().any(|e| e.to == case_b));

    // No default clause: the dispatch node itself can fall past every
    // case.
    let exit = exit_of(cfg);
    assert!(cfg.transitions(dispatch.id).iter().any(|e| e.to == exit));
}

#[test]
fn try_return_passes_through_finally_before_exiting() {
    let script = vec![Stmt::new(StmtKind::Try {
        body: vec![Stmt::ret(Some(Expr::ident("v")))],
        catches: vec![],
        finally: Some(vec![Stmt::expr(Expr::call(Expr::ident("release"), vec![]))]),
    })];
    let cfg = &build_cfgs(&script)[0];

    let (try_branch, finally_branch) = cfg
        .nodes()
        .iter()
        .find_map(|n| match &n.kind {
            NodeKind::Try {
                try_branch,
                finally_branch,
                ..
            } => Some((*try_branch, *finally_branch)),
            _ => None,
        })
        .expect("try node");

    // The return statement's only outgoing transition is the finally
    // entry; the finally body then reaches the function exit.
    assert!(matches!(
        cfg.node(try_branch).kind,
        NodeKind::Jump(JumpKind::Return)
    ));
    let return_edges = cfg.transitions(try_branch);
    assert_eq!(return_edges.len(), 1);
    assert_eq!(return_edges[0].to, finally_branch);
    assert!(cfg
        .transitions(finally_branch)
        .iter()
        .any(|e| e.to == exit_of(cfg)));
}

#[test]
fn script_comes_first_then_functions_in_declaration_order() {
    let script = vec![
        Stmt::new(StmtKind::FunctionDecl {
            name: "first".to_string(),
            params: vec![],
            body: vec![Stmt::ret(None)],
        }),
        Stmt::new(StmtKind::FunctionDecl {
            name: "second".to_string(),
            params: vec![],
            body: vec![Stmt::new(StmtKind::FunctionDecl {
                name: "second_inner".to_string(),
                params: vec![],
                body: vec![],
            })],
        }),
    ];
    let cfgs = build_cfgs(&script);
    let names: Vec<_> = cfgs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["<script>", "first", "second", "second_inner"]);
    for cfg in &cfgs {
        cfg.validate().expect("every CFG validates");
    }
}

#[test]
fn stray_jumps_are_dropped_without_failing_the_build() {
    // A bare continue at script scope is malformed input; the build still
    // succeeds and the marker keeps no outgoing edges.
    let script = vec![
        Stmt::new(StmtKind::Continue),
        Stmt::expr(Expr::call(Expr::ident("after"), vec![])),
    ];
    let cfgs = build_cfgs(&script);
    assert_eq!(cfgs.len(), 1);
    let cfg = &cfgs[0];
    let jump = cfg
        .nodes()
        .iter()
        .find(|n| matches!(n.kind, NodeKind::Jump(JumpKind::Continue)))
        .expect("continue marker");
    assert!(cfg.transitions(jump.id).is_empty());
}

#[test]
fn var_declarations_are_plain_leaf_statements() {
    let script = vec![Stmt::new(StmtKind::VarDecl(vec![
        Declarator {
            name: "a".to_string(),
            init: Some(Expr::number(1.0)),
            tag: patchflow::ChangeTag::Unchanged,
        },
        Declarator {
            name: "b".to_string(),
            init: None,
            tag: patchflow::ChangeTag::Unchanged,
        },
    ]))];
    let cfg = &build_cfgs(&script)[0];
    // entry, declaration, exit
    assert_eq!(cfg.len(), 3);
}
