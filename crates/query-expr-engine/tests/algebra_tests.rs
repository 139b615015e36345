//! Integration tests for the boolean algebra: sum of products, union,
//! intersection and minimization.

use query_expr::{parse, Expression, LogicalOperator, Operator, Value};
use query_expr_engine::{EngineConfig, EngineError, ExpressionEngine};

fn leaf(name: &str, value: i64) -> Expression {
    Expression::new(name, Operator::Equal, value)
}

/// Minterms as sorted literal texts, sorted; order-independent comparison.
fn minterm_set(engine: &ExpressionEngine, expr: &Expression) -> Vec<Vec<String>> {
    let mut set: Vec<Vec<String>> = engine
        .minterms(expr)
        .unwrap()
        .iter()
        .map(|minterm| {
            let mut literals: Vec<String> = match minterm {
                Expression::Simple(_) => vec![minterm.to_string()],
                Expression::Compound(_) => minterm.children().iter().map(ToString::to_string).collect(),
            };
            literals.sort();
            literals
        })
        .collect();
    set.sort();
    set
}

/// Small deterministic generator (xorshift) for property checks.
struct Rng(u64);

impl Rng {
    fn below(&mut self, n: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % n
    }
}

fn random_tree(rng: &mut Rng, depth: usize) -> Expression {
    if depth == 0 || rng.below(2) == 0 {
        let name = ["a", "b", "c", "d", "e"][rng.below(5) as usize];
        let mut expr = leaf(name, rng.below(2) as i64);
        if rng.below(4) == 0 {
            expr.complement();
        }
        return expr;
    }
    let mut node = Expression::empty();
    for _ in 0..2 + rng.below(3) {
        let operator = if rng.below(2) == 0 {
            LogicalOperator::And
        } else {
            LogicalOperator::Or
        };
        node.push(operator, random_tree(rng, depth - 1));
    }
    if rng.below(4) == 0 {
        node.complement();
    }
    if rng.below(6) == 0 {
        node.compound();
    }
    node
}

/// Random trees whose canonical form stays small enough to minimize.
fn samples() -> Vec<Expression> {
    let engine = ExpressionEngine::new();
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    (0..80)
        .map(|_| random_tree(&mut rng, 3))
        .filter(|e| engine.minterms(e).map(|m| m.len() <= 64).unwrap_or(false))
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_minterms_of_sum_of_products() {
    let engine = ExpressionEngine::new();
    let (a, b, c, d) = (leaf("A", 1), leaf("B", 2), leaf("C", 3), leaf("D", 4));
    let expr = Expression::and_all([a.clone(), b.clone()]).or(Expression::and_all([c.clone(), d.clone()]));

    let minterms = engine.minterms(&expr).unwrap();
    assert_eq!(minterms, vec![a.and(b), c.and(d)]);
}

#[test]
fn test_minterms_of_negated_group() {
    let engine = ExpressionEngine::new();
    let (a, b, c, d) = (leaf("A", 1), leaf("B", 2), leaf("C", 3), leaf("D", 4));
    let expr = Expression::and_all([
        !Expression::or_all([a.clone(), b.clone()]),
        Expression::or_all([c.clone(), d.clone()]),
    ]);

    let minterms = engine.minterms(&expr).unwrap();
    assert_eq!(
        minterms,
        vec![
            Expression::and_all([!a.clone(), !b.clone(), c]),
            Expression::and_all([!a, !b, d]),
        ]
    );
}

#[test]
fn test_parse_scenario() {
    let parsed = parse(r#"[firstName] == "John" && [age] > 23"#).unwrap().unwrap();
    let expected = Expression::new("firstName", Operator::Equal, "John").and(Expression::new("age", Operator::Gt, 23));
    assert_eq!(parsed, expected);

    // a quoted number stays a string
    let quoted = parse(r#"[age] > "23""#).unwrap().unwrap();
    assert_eq!(quoted.value(), Some(&Value::from("23")));
}

#[test]
fn test_list_leaf_rendering() {
    let expr = Expression::new("field", Operator::In, vec![1, 2, 3]);
    assert_eq!(expr.to_string(), "([field] IN [1,2,3])");
}

#[test]
fn test_remove_collapses_to_remaining_child() {
    let mut expr = leaf("a", 1).or(leaf("b", 2));
    expr.remove_sub_expression(0).unwrap();
    assert_eq!(expr, leaf("b", 2));
}

// =============================================================================
// Algebraic properties
// =============================================================================

#[test]
fn test_double_negation_cancels() {
    for expr in samples() {
        let mut twice = expr.clone();
        twice.complement();
        twice.complement();
        assert_eq!(twice, expr);
    }
}

#[test]
fn test_minimization_is_idempotent() {
    let engine = ExpressionEngine::new();
    let samples = samples();
    assert!(!samples.is_empty());
    for expr in samples {
        let once = engine.minimized(&expr).unwrap();
        let twice = engine.minimized(&once).unwrap();
        assert_eq!(twice, once, "not idempotent for {}", expr);
    }
}

#[test]
fn test_de_morgan() {
    let engine = ExpressionEngine::new();
    let (a, b) = (leaf("a", 1), leaf("b", 2));
    let mut negated = a.clone().and(b.clone());
    negated.distribute_complement();
    assert_eq!(
        engine.minimized(&negated).unwrap(),
        engine.minimized(&(!a).or(!b)).unwrap()
    );
}

#[test]
fn test_absorption() {
    let engine = ExpressionEngine::new();
    let (a, b) = (leaf("a", 1), leaf("b", 2));
    let absorbed = a.clone().or(a.clone().and(b));
    assert_eq!(engine.minimized(&absorbed).unwrap(), engine.minimized(&a).unwrap());
}

#[test]
fn test_distributivity() {
    let engine = ExpressionEngine::new();
    let (a, b, c, d) = (leaf("a", 1), leaf("b", 2), leaf("c", 3), leaf("d", 4));
    let product = Expression::and_all([
        Expression::or_all([a.clone(), b.clone()]),
        Expression::or_all([c.clone(), d.clone()]),
    ]);
    let expanded = Expression::or_all([
        Expression::and_all([a.clone(), c.clone()]),
        Expression::and_all([a, d.clone()]),
        Expression::and_all([b.clone(), c]),
        Expression::and_all([b, d]),
    ]);
    let left = engine.minimized(&product).unwrap();
    let right = engine.minimized(&expanded).unwrap();
    assert_eq!(minterm_set(&engine, &left), minterm_set(&engine, &right));
}

#[test]
fn test_strategies_agree() {
    let engine = ExpressionEngine::new();
    for expr in samples() {
        let by_stack = engine.sum_of_products_by_stack(&expr).unwrap();
        for k in 1..=expr.len() + 1 {
            let divided = engine.sum_of_products_divide_and_conquer(&expr, k).unwrap();
            assert_eq!(divided, by_stack, "threshold {} on {}", k, expr);
        }
    }
}

// =============================================================================
// Strategy selection
// =============================================================================

#[test]
fn test_wide_tree_uses_divide_and_conquer() {
    let engine = ExpressionEngine::with_config(EngineConfig::builder().with_threshold(4).build()).unwrap();
    let expr = Expression::or_all((0..12).map(|i| leaf("x", i).and(leaf("y", i))));

    let sop = engine.sum_of_products(&expr).unwrap();
    assert_eq!(sop, engine.sum_of_products_by_stack(&expr).unwrap());
    assert_eq!(engine.minterms(&expr).unwrap().len(), 12);
}

#[test]
fn test_all_and_longer_than_threshold_falls_back() {
    let engine = ExpressionEngine::with_config(EngineConfig::builder().with_threshold(4).build()).unwrap();
    let expr = Expression::and_all((0..10).map(|i| leaf("x", i)));

    let sop = engine.sum_of_products(&expr).unwrap();
    assert_eq!(sop, expr);
    assert_eq!(engine.minterms(&expr).unwrap().len(), 1);
}

fn deep(levels: usize) -> Expression {
    let mut expr = leaf("a", 1);
    for _ in 0..levels {
        expr = Expression::and_all([expr, leaf("b", 2)]);
    }
    expr
}

#[test]
fn test_deep_nesting_does_not_recurse() {
    let engine = ExpressionEngine::new();
    let expr = deep(10_000);
    let sop = engine.sum_of_products(&expr).unwrap();
    assert_eq!(sop, leaf("a", 1).and(leaf("b", 2)));
    drop(expr);
}

#[test]
fn test_negated_deep_tree_lifecycle() {
    let engine = ExpressionEngine::new();
    let expr = !deep(10_000);
    let copy = expr.clone();

    // !(a && b && b ...) == !a || !b || !b ...
    let sop = engine.sum_of_products(&copy).unwrap();
    assert_eq!(sop.len(), 10_001);
    assert_eq!(sop.children()[0], !leaf("a", 1));
    assert!(sop.as_compound().unwrap().operators().iter().all(|op| *op == LogicalOperator::Or));

    let minimized = engine.minimized(&expr).unwrap();
    assert_eq!(minimized, (!leaf("a", 1)).or(!leaf("b", 2)));
    drop(copy);
    drop(expr);
}

#[test]
fn test_nested_empty_compound_is_rejected() {
    let engine = ExpressionEngine::new();
    let expr = leaf("a", 1).and(Expression::empty()).or(leaf("b", 2));
    assert_eq!(engine.sum_of_products(&expr), Err(EngineError::EmptyCompound));
    assert_eq!(engine.sum_of_products(&Expression::empty()), Ok(Expression::empty()));
}

// =============================================================================
// Union, intersection, simplification
// =============================================================================

#[test]
fn test_union_concatenates_minterms() {
    let engine = ExpressionEngine::new();
    let left = leaf("a", 1).and(leaf("b", 2));
    let right = leaf("c", 3);
    let union = engine.union(&left, &right).unwrap();
    assert_eq!(union.to_string(), "(([a] == 1) && ([b] == 2) || ([c] == 3))");
}

#[test]
fn test_intersection_distributes() {
    let engine = ExpressionEngine::new();
    let left = leaf("a", 1).or(leaf("b", 2));
    let right = leaf("c", 3).or(leaf("a", 1));
    let product = engine.intersection(&left, &right).unwrap();
    assert_eq!(
        minterm_set(&engine, &product),
        vec![
            vec!["([a] == 1)".to_string()],
            vec!["([a] == 1)".to_string(), "([b] == 2)".to_string()],
            vec!["([a] == 1)".to_string(), "([c] == 3)".to_string()],
            vec!["([b] == 2)".to_string(), "([c] == 3)".to_string()],
        ]
    );
    let minimized = engine.simplify(&product).unwrap();
    assert_eq!(minimized, leaf("a", 1).or(leaf("b", 2)).and(leaf("c", 3)));
}

#[test]
fn test_intersection_canonicalizes_non_sop_operands() {
    let engine = ExpressionEngine::new();
    let negated = !leaf("a", 1).or(leaf("b", 2));
    let product = engine.intersection(&negated, &leaf("c", 3)).unwrap();
    assert_eq!(product, Expression::and_all([!leaf("a", 1), !leaf("b", 2), leaf("c", 3)]));
}

#[test]
fn test_simplify_nested_unwraps() {
    let engine = ExpressionEngine::new();
    let mut wrapped = leaf("a", 1).or(leaf("b", 2));
    wrapped.compound();
    wrapped.compound();
    assert_eq!(engine.simplify_nested(&wrapped), leaf("a", 1).or(leaf("b", 2)));
}
