//! Control-flow analyses through the public API: flattening detection and opaque
//! predicate solving on hand-built function bodies.

use deobscope::{
    config::EngineConfig,
    events::{EventKind, EventLog},
    il::{Function, IlFunction, IlView, Opcode, VarId},
    methods::{cff, AnalysisContext, CffDetection, PredicateSolver},
    utils::graph::NodeId,
};

/// Entry, a dispatcher on `next`, three cases that each reassign it, and an exit.
fn state_machine() -> Function {
    let mut il = IlFunction::new();
    let next = il.add_variable("next");
    let acc = il.add_variable("acc");

    il.add_block();
    let start = il.constant(1, 4);
    il.var_init(next, start);
    let zero = il.constant(0, 4);
    il.var_init(acc, zero);
    il.goto(NodeId::new(1));

    // 1: dispatcher, 2..=4: cases, 5: exit
    il.add_block();
    let s = il.var(next, 4);
    let done = il.constant(0, 4);
    let cond = il.binary(Opcode::CmpE, 1, s, done);
    il.branch(cond, NodeId::new(5), NodeId::new(2));

    il.add_block();
    let s = il.var(next, 4);
    let three = il.constant(3, 4);
    let cond = il.binary(Opcode::CmpUlt, 1, s, three);
    il.branch(cond, NodeId::new(3), NodeId::new(4));

    for step in [2, 0] {
        il.add_block();
        let a = il.var(acc, 4);
        let s = il.var(next, 4);
        let sum = il.binary(Opcode::Add, 4, a, s);
        il.set_var(acc, sum);
        let value = il.constant(step, 4);
        il.set_var(next, value);
        il.goto(NodeId::new(1));
    }

    il.add_block();
    let result = il.var(acc, 4);
    il.ret(Some(result));
    Function::new("state_machine", 0x1000, il)
}

fn straight_line() -> Function {
    let mut il = IlFunction::new();
    let a = il.add_variable("a");
    il.add_block();
    let one = il.constant(1, 4);
    il.var_init(a, one);
    il.goto(NodeId::new(1));
    il.add_block();
    let value = il.var(a, 4);
    il.ret(Some(value));
    Function::new("straight_line", 0x2000, il)
}

/// `0 -> 1`, `1 -> {2, 3}`, `2 -> 1`.
fn counting_loop() -> Function {
    let mut il = IlFunction::new();
    let i = il.add_variable("i");
    il.add_block();
    let zero = il.constant(0, 4);
    il.var_init(i, zero);
    il.goto(NodeId::new(1));

    il.add_block();
    let v = il.var(i, 4);
    let limit = il.constant(10, 4);
    let cond = il.binary(Opcode::CmpUlt, 1, v, limit);
    il.branch(cond, NodeId::new(2), NodeId::new(3));

    il.add_block();
    let v = il.var(i, 4);
    let one = il.constant(1, 4);
    let inc = il.binary(Opcode::Add, 4, v, one);
    il.set_var(i, inc);
    il.goto(NodeId::new(1));

    il.add_block();
    il.ret(None);
    Function::new("counting_loop", 0x3000, il)
}

#[test]
fn test_state_machine_is_flattened() {
    let function = state_machine();
    let il = function.il().unwrap();

    // 0->1, 1->5, 1->2, 2->3, 2->4, 3->1, 4->1
    assert_eq!(il.edge_count(), 7);
    assert_eq!(cff::cyclomatic_complexity(il), 3);
    assert!((cff::flattening_score(il) - 5.0 / 6.0).abs() < 1e-9);

    let report = CffDetection::new(0.5).analyze(&function).unwrap();
    assert!(report.flattened);
    assert_eq!(report.dispatcher, Some(VarId::new(0)));

    let deps = cff::variable_dependencies(il, VarId::new(1));
    assert_eq!(deps, [VarId::new(1), VarId::new(0)]);
}

#[test]
fn test_threshold_separates_plain_loop() {
    let detector = CffDetection::new(0.8);

    let flattened = detector.analyze(&state_machine()).unwrap();
    assert!(flattened.flattened);

    let plain = detector.analyze(&counting_loop()).unwrap();
    assert!((plain.flattening_score - 0.75).abs() < 1e-9);
    assert_eq!(plain.cyclomatic_complexity, 2);
    assert!(!plain.flattened);
    assert_eq!(plain.dispatcher, None);
}

#[test]
fn test_acyclic_function_scores_zero() {
    let function = straight_line();
    let report = CffDetection::new(0.0).analyze(&function).unwrap();
    assert_eq!(report.flattening_score, 0.0);
    assert_eq!(report.cyclomatic_complexity, 1);
    assert!(!report.flattened);
}

#[test]
fn test_unlifted_function_has_no_report() {
    let function = Function::unlifted("pending", 0x4000);
    assert!(CffDetection::new(0.5).analyze(&function).is_none());
    assert!(cff::most_assigned_variable(&function).is_err());
}

#[test]
fn test_most_assigned_without_variables() {
    let mut il = IlFunction::new();
    il.add_block();
    il.ret(None);
    let function = Function::new("empty", 0x5000, il);
    assert!(cff::most_assigned_variable(&function).is_err());
}

#[test]
fn test_every_decidable_branch_patched() {
    // 0: if ((k - k) == 0) then 1 else 3
    // 1: if ((k & 0x0) != 0) then 3 else 2
    // 2: return
    // 3: return
    let mut il = IlFunction::new();
    let k = il.add_variable("k");

    il.add_block();
    let (a, b) = (il.var(k, 4), il.var(k, 4));
    let diff = il.binary(Opcode::Sub, 4, a, b);
    let zero = il.constant(0, 4);
    let cond = il.binary(Opcode::CmpE, 1, diff, zero);
    il.branch(cond, NodeId::new(1), NodeId::new(3));

    il.add_block();
    let a = il.var(k, 4);
    let zero = il.constant(0, 4);
    let masked = il.binary(Opcode::And, 4, a, zero);
    let zero = il.constant(0, 4);
    let cond = il.binary(Opcode::CmpNe, 1, masked, zero);
    il.branch(cond, NodeId::new(3), NodeId::new(2));

    il.add_block();
    il.ret(None);
    il.add_block();
    il.ret(None);

    let events = EventLog::new();
    let config = EngineConfig::default();
    let ctx = AnalysisContext::new(&events, &config);
    let report = PredicateSolver::new(20).solve(&mut il, &ctx, 0x6000).unwrap();

    assert_eq!(report.patched, 2);
    assert_eq!(report.passes, 2);
    assert_eq!(il.render_instruction(0).as_deref(), Some("goto 1"));
    assert_eq!(il.render_instruction(1).as_deref(), Some("goto 2"));
    assert_eq!(il.edge_count(), 2);
    assert_eq!(events.count_kind(EventKind::PredicatePatched), 2);
    assert_eq!(il.opcode(il.instruction(0).unwrap()), Some(Opcode::Goto));
}
