//! End-to-end simplification tests: corpus text in, rewritten IR out.

use std::sync::Arc;

use deobscope::{
    config::{BindingMode, EngineConfig, RewriteStrategy},
    events::{EventKind, EventLog},
    il::{Function, IlFunction, IlView, Opcode},
    pattern::{lower, parse_expression, PatternCorpus, PatternMatcher, Scanner},
};

fn scanner(source: &str) -> Scanner {
    let mut corpus = PatternCorpus::new();
    corpus.load_from_source(source, None);
    Scanner::new(Arc::new(corpus))
}

/// `dest = lhs OP rhs` over fresh registers at width 4.
fn assignment(dest: &str, lhs: &str, op: Opcode, rhs: &str) -> Function {
    let mut il = IlFunction::new();
    let dest = il.add_variable(dest);
    let (l, r) = (il.add_variable(lhs), il.add_variable(rhs));
    let (a, b) = (il.var(l, 4), il.var(r, 4));
    let expr = il.binary(op, 4, a, b);
    il.var_init(dest, expr);
    Function::new("sub_401000", 0x401000, il)
}

fn lowered(expressions: &[&str]) -> Function {
    let mut il = IlFunction::new();
    for (i, text) in expressions.iter().enumerate() {
        let tree = parse_expression(text).unwrap();
        lower::lower_assignment(&mut il, &format!("t{i}"), &tree, 4).unwrap();
    }
    Function::new("lowered", 0x2000, il)
}

fn render(function: &Function, index: usize) -> String {
    function.il().unwrap().render_instruction(index).unwrap()
}

#[test]
fn test_obfuscated_side_decides_the_match() {
    // a+b,a*b: the obfuscated side is a*b, which an ADD never matches.
    let mut function = assignment("eax", "r0", Opcode::Add, "r1");
    let report = scanner("a+b,a*b").simplify(&mut function, &EventLog::new());
    assert_eq!(report.matched, 0);
    assert_eq!(render(&function, 0), "eax = r0 + r1");

    let events = EventLog::new();
    let report = scanner("a*b,a+b").simplify(&mut function, &events);
    assert_eq!(report.rewritten, 1);
    assert_eq!(render(&function, 0), "eax = r0 * r1");
    assert_eq!(events.count_kind(EventKind::PatternMatched), 1);
    assert_eq!(
        events
            .filter_kind(EventKind::ExpressionRewritten)
            .next()
            .and_then(|e| e.location),
        Some(0)
    );
}

#[test]
fn test_and_rewritten_to_xor() {
    let mut function = assignment("t", "rA", Opcode::And, "rB");
    let report = scanner("x^y,x&y").simplify(&mut function, &EventLog::new());
    assert_eq!(report.rewritten, 1);
    assert_eq!(render(&function, 0), "t = rA ^ rB");

    let (_, rhs) = function.il().unwrap().assignment(0).unwrap();
    assert_eq!(function.il().unwrap().width(rhs), Some(4));
}

#[test]
fn test_second_scan_finds_nothing() {
    let scanner = scanner("x^y,x&y\na*b,a+b\n");
    let mut function = lowered(&["p & q", "p + q", "p - q"]);

    let first = scanner.simplify(&mut function, &EventLog::new());
    assert_eq!(first.rewritten, 2);
    assert!(scanner.scan_function(&function).is_empty());

    let second = scanner.simplify(&mut function, &EventLog::new());
    assert_eq!(second.matched, 0);
    assert_eq!(render(&function, 0), "t0 = p ^ q");
    assert_eq!(render(&function, 1), "t1 = p * q");
    assert_eq!(render(&function, 2), "t2 = p - q");
}

#[test]
fn test_variable_leaf_is_a_wildcard() {
    let function = lowered(&["u", "v", "u + 1"]);
    let il = function.il().unwrap();
    let leaf = parse_expression("a").unwrap();
    let matcher = PatternMatcher::default();

    let rhs = |i| il.assignment(i).unwrap().1;
    assert!(matcher.matches(&leaf, il, rhs(0)));
    assert!(matcher.matches(&leaf, il, rhs(1)));
    assert!(!matcher.matches(&leaf, il, rhs(2)));
}

#[test]
fn test_repeated_variable_binding_modes() {
    let corpus = "0,a^a\n";
    let independent = scanner(corpus);
    let mut function = lowered(&["p ^ q", "p ^ p"]);
    assert_eq!(independent.scan_function(&function).len(), 2);

    let consistent = scanner(corpus).with_binding_mode(BindingMode::Consistent);
    let found = consistent.scan_function(&function);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instruction_index, 1);

    // A bare constant is no operator, so the principal-operand rewrite declines ...
    let report = consistent.simplify(&mut function, &EventLog::new());
    assert_eq!(report.declined, 1);
    assert_eq!(render(&function, 1), "t1 = p ^ p");

    // ... while the template rewrite builds it.
    let template = consistent.with_strategy(RewriteStrategy::Template);
    let report = template.simplify(&mut function, &EventLog::new());
    assert_eq!(report.rewritten, 1);
    assert_eq!(render(&function, 1), "t1 = 0x0");
    assert_eq!(render(&function, 0), "t0 = p ^ q");
}

#[test]
fn test_constants_match_exactly() {
    let scanner = scanner("a,a+5\n");
    let function = lowered(&["x + 5", "x + 6", "x + 500", "5 + x"]);
    let found: Vec<_> = scanner
        .scan_function(&function)
        .into_iter()
        .map(|m| m.instruction_index)
        .collect();
    assert_eq!(found, [0]);
}

#[test]
fn test_template_rewrites_full_mba_identity() {
    let config = EngineConfig::default()
        .with_binding_mode(BindingMode::Consistent)
        .with_rewrite_strategy(RewriteStrategy::Template);
    let mut corpus = PatternCorpus::new();
    corpus.load_from_source("a+b,(a|b)+(a&b)\na^b,(a|b)-(a&b)\n", None);
    let scanner = Scanner::from_config(Arc::new(corpus), &config);

    let mut function = lowered(&["(m|n)+(m&n)", "(m|n)-(m&n)", "(m|n)+(n&m)"]);
    let report = scanner.simplify(&mut function, &EventLog::new());

    assert_eq!(report.rewritten, 2);
    assert_eq!(render(&function, 0), "t0 = m + n");
    assert_eq!(render(&function, 1), "t1 = m ^ n");
    assert_eq!(render(&function, 2), "t2 = (m | n) + (n & m)");
}

#[test]
fn test_principal_operands_decline_same_root() {
    let mut function = lowered(&["(m|n)+(m&n)"]);
    let events = EventLog::new();
    let report = scanner("a+b,(a|b)+(a&b)").simplify(&mut function, &events);

    assert_eq!(report.matched, 1);
    assert_eq!(report.declined, 1);
    assert!(events.has(EventKind::RewriteDeclined));
    assert_eq!(render(&function, 0), "t0 = (m | n) + (m & n)");
}

#[test]
fn test_unlifted_function_yields_nothing() {
    let mut function = Function::unlifted("pending", 0x3000);
    let report = scanner("a*b,a+b").simplify(&mut function, &EventLog::new());
    assert_eq!(report.matched, 0);
    assert!(!function.is_lifted());
}
