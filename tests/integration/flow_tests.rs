//! Path-sensitive engine and detector checks through the public API.

use rustc_hash::FxHashMap;

use patchflow::ast::types::SwitchClause;
use patchflow::cfg::build_cfgs;
use patchflow::cfg::types::{CfgNode, Guard, SourceRef};
use patchflow::error::Result;
use patchflow::{
    find_special_type_repairs, ChangeTag, Expr, FlowAnalysis, FlowEngine, FunctionScope,
    PathState, ScopeResolver, SpecialType, Stmt, StmtKind,
};

/// Minimal external instantiation of the analysis contract: counts how
/// often each called function's statement is visited across all paths.
#[derive(Default)]
struct CallProbe {
    visits: FxHashMap<String, usize>,
}

struct Unit;

impl PathState for Unit {
    fn fork(&self) -> Self {
        Unit
    }
}

impl<'a> FlowAnalysis<'a> for CallProbe {
    type State = Unit;
    type Finding = (String, usize);

    fn entry_state(&self) -> Unit {
        Unit
    }

    fn transfer_edge(
        &mut self,
        _guard: &Guard<'a>,
        _state: &mut Unit,
        _scope: &dyn ScopeResolver,
    ) -> Result<()> {
        Ok(())
    }

    fn transfer_node(&mut self, node: &CfgNode<'a>, _state: &mut Unit, _scope: &dyn ScopeResolver) {
        if let SourceRef::Stmt(stmt) = node.source {
            if let StmtKind::Expr(expr) = &stmt.kind {
                if let patchflow::ExprKind::Call { callee, .. } = &expr.kind {
                    if let patchflow::ExprKind::Ident(name) = &callee.kind {
                        *self.visits.entry(name.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    fn into_findings(self) -> Vec<(String, usize)> {
        let mut visits: Vec<_> = self.visits.into_iter().collect();
        visits.sort();
        visits
    }
}

fn call(name: &str) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident(name), vec![]))
}

#[test]
fn fallthrough_case_is_reached_along_the_earlier_case_path() {
    let script = vec![Stmt::new(StmtKind::Switch {
        scrutinee: Expr::ident("x"),
        clauses: vec![
            SwitchClause {
                test: Some(Expr::number(1.0)),
                body: vec![call("case_a")],
            },
            SwitchClause {
                test: Some(Expr::number(2.0)),
                body: vec![call("case_b")],
            },
        ],
    })];
    let cfgs = build_cfgs(&script);
    let scope = FunctionScope::for_script(&script);
    let mut probe = CallProbe::default();
    FlowEngine::new().run(&cfgs[0], &mut probe, &scope);

    // case_b runs on its own dispatch path and again by fall-through from
    // case_a; case_a runs once.
    assert_eq!(probe.visits.get("case_a"), Some(&1));
    assert_eq!(probe.visits.get("case_b"), Some(&2));
}

#[test]
fn revisit_cap_terminates_looping_paths() {
    let script = vec![
        Stmt::while_stmt(Expr::ident("more"), Stmt::block(vec![call("work")])),
        call("done"),
    ];
    let cfgs = build_cfgs(&script);
    let scope = FunctionScope::for_script(&script);

    let mut probe = CallProbe::default();
    let stats = FlowEngine::with_revisit_cap(2).run(&cfgs[0], &mut probe, &scope);

    // The walk terminated, some looping path was pruned, and the loop
    // body was explored no more than the cap allows.
    assert!(stats.paths_pruned > 0);
    assert!(stats.paths_completed > 0);
    let work_visits = *probe.visits.get("work").unwrap_or(&0);
    assert!(work_visits >= 1 && work_visits <= 2);
}

#[test]
fn do_while_executes_body_before_the_condition() {
    let script = vec![Stmt::new(StmtKind::DoWhile {
        body: Box::new(Stmt::block(vec![call("once")])),
        cond: Expr::ident("again"),
    })];
    let cfgs = build_cfgs(&script);
    let scope = FunctionScope::for_script(&script);
    let mut probe = CallProbe::default();
    FlowEngine::new().run(&cfgs[0], &mut probe, &scope);
    // Every path runs the body at least once.
    assert!(*probe.visits.get("once").unwrap_or(&0) >= 1);
}

#[test]
fn inserted_guard_round_trip_is_exact_and_idempotent() {
    // The canonical pair: the only change is `if (!x) return;` inserted
    // before a previously unchecked use of `x`.
    let script = vec![
        Stmt::if_stmt(
            Expr::not(Expr::ident("x").with_tag(ChangeTag::Inserted))
                .with_tag(ChangeTag::Inserted),
            Stmt::ret(None).with_tag(ChangeTag::Inserted),
            None,
        )
        .with_tag(ChangeTag::Inserted),
        Stmt::expr(Expr::call(Expr::ident("use"), vec![Expr::ident("x")])),
    ];

    let first = find_special_type_repairs(&script);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].identifier, "x");
    assert_eq!(first[0].special_type, SpecialType::Falsey);

    let second = find_special_type_repairs(&script);
    assert_eq!(first, second);
}

#[test]
fn guard_inside_a_nested_function_is_attributed_to_it() {
    let script = vec![Stmt::new(StmtKind::FunctionDecl {
        name: "handler".to_string(),
        params: vec![patchflow::Param {
            name: "x".to_string(),
            tag: ChangeTag::Unchanged,
        }],
        body: vec![
            Stmt::if_stmt(
                Expr::not(Expr::ident("x").with_tag(ChangeTag::Inserted))
                    .with_tag(ChangeTag::Inserted),
                Stmt::ret(None).with_tag(ChangeTag::Inserted),
                None,
            )
            .with_tag(ChangeTag::Inserted),
            Stmt::expr(Expr::call(Expr::ident("use"), vec![Expr::ident("x")])),
        ],
    })];
    let findings = find_special_type_repairs(&script);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].function.as_deref(), Some("handler"));
}

#[test]
fn empty_script_yields_zero_findings() {
    assert!(find_special_type_repairs(&[]).is_empty());
}

#[test]
fn loop_guard_facts_do_not_hang_the_detector() {
    // An inserted falsy guard as a while condition: the back edge makes
    // the graph cyclic; the cap must still bound the detector.
    let script = vec![
        Stmt::while_stmt(
            Expr::ident("x").with_tag(ChangeTag::Inserted),
            Stmt::block(vec![Stmt::expr(Expr::call(
                Expr::ident("use"),
                vec![Expr::ident("x")],
            ))]),
        ),
        call("after"),
    ];
    // Inside the loop `x` is truthy (not falsey) and used: one finding.
    let findings = find_special_type_repairs(&script);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].special_type, SpecialType::Falsey);
}

#[test]
fn findings_serialize_to_stable_json() {
    let script = vec![
        Stmt::if_stmt(
            Expr::not(Expr::ident("cfg").with_tag(ChangeTag::Inserted))
                .with_tag(ChangeTag::Inserted),
            Stmt::ret(None).with_tag(ChangeTag::Inserted),
            None,
        )
        .with_tag(ChangeTag::Inserted),
        Stmt::expr(Expr::call(Expr::ident("load"), vec![Expr::ident("cfg")])),
    ];
    let findings = find_special_type_repairs(&script);
    let json = serde_json::to_string(&findings).unwrap();
    assert!(json.contains("\"identifier\":\"cfg\""));
    assert!(json.contains("\"falsey\""));
}
