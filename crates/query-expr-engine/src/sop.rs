//! Sum-of-products canonicalization.
//!
//! A value in sum-of-products (SOP) form is either a single leaf or a
//! non-negated compound whose children are all leaves. Its minterms are the
//! maximal AND-runs between OR operators.
//!
//! The stack machine walks the tree without recursion. Each child value is
//! delivered to a value stack together with the operator on its right:
//!
//! ```text
//! right op AND  -> push And token, defer
//! right op OR   -> reduce the pending AND-run by intersection, push Or token
//! end of node   -> reduce the AND-run, then union everything up to the
//!                  node's sentinel, then negate if a Not token is waiting
//! ```
//!
//! Because runs are reduced independently and unions only concatenate, the
//! SOP of a node equals the concatenation of the SOPs of its AND-runs. Divide
//! and conquer relies on this when it cuts a node after an OR.

use std::borrow::Cow;

use query_expr::{Compound, Expression, LogicalOperator};
use tracing::trace;

use crate::error::{EngineError, EngineResult};

/// Control tokens interleaved with the value stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    And,
    Or,
    Sentinel,
    Not,
}

/// A compound being walked and the index of its next child.
struct Frame<'a> {
    node: &'a Compound,
    next: usize,
}

// =============================================================================
// SOP values
// =============================================================================

/// Returns true if `expr` is already in sum-of-products form.
pub(crate) fn is_sop(expr: &Expression) -> bool {
    match expr {
        Expression::Simple(_) => true,
        Expression::Compound(c) => !c.is_complement() && c.children().iter().all(Expression::is_simple),
    }
}

/// Minterms of a SOP value. An empty compound has none.
pub(crate) fn products(expr: &Expression) -> Vec<&[Expression]> {
    match expr {
        Expression::Simple(_) => vec![std::slice::from_ref(expr)],
        Expression::Compound(c) => c.or_groups(),
    }
}

/// Builds a SOP value from minterms. A single one-literal minterm collapses
/// to the leaf.
pub(crate) fn from_products(products: Vec<Vec<Expression>>) -> Expression {
    if products.len() == 1 && products[0].len() == 1 {
        if let Some(leaf) = products.into_iter().flatten().next() {
            return leaf;
        }
        return Expression::empty();
    }
    let mut sum = Compound::new();
    for product in products {
        for (i, literal) in product.into_iter().enumerate() {
            let operator = if i == 0 {
                LogicalOperator::Or
            } else {
                LogicalOperator::And
            };
            sum.push(operator, literal);
        }
    }
    Expression::Compound(sum)
}

/// Union of SOP values: their minterms concatenated in order. The first
/// compound part is extended in place.
pub(crate) fn sum_of(parts: Vec<Expression>) -> Expression {
    let mut sum = Compound::new();
    for part in parts {
        match part {
            Expression::Simple(_) => sum.push(LogicalOperator::Or, part),
            Expression::Compound(c) if sum.is_empty() && !c.is_complement() => sum = c,
            Expression::Compound(c) => {
                let (children, operators, _) = c.into_parts();
                let mut operators = operators.into_iter();
                for (i, literal) in children.into_iter().enumerate() {
                    let operator = match i {
                        0 => LogicalOperator::Or,
                        _ => operators.next().unwrap_or(LogicalOperator::And),
                    };
                    sum.push(operator, literal);
                }
            }
        }
    }
    if sum.len() == 1 {
        let (children, _, _) = sum.into_parts();
        return children.into_iter().next().unwrap_or_default();
    }
    Expression::Compound(sum)
}

/// Intersection of two SOP values.
///
/// Each minterm of `left` is paired with each minterm of `right`; the pair
/// keeps `left`'s literals followed by those of `right` not already present.
pub(crate) fn intersect(left: &Expression, right: &Expression) -> Expression {
    let right_products = products(right);
    let mut out = Vec::new();
    for x in products(left) {
        for y in &right_products {
            let mut product = x.to_vec();
            for literal in y.iter() {
                if !product.contains(literal) {
                    product.push(literal.clone());
                }
            }
            out.push(product);
        }
    }
    from_products(out)
}

/// Negates a SOP value and returns it in SOP form.
fn negate(value: Expression) -> Expression {
    let mut negated = value;
    negated.distribute_complement();
    // a leaf, or a single OR-group of negated literals, is already SOP
    let joined_by_and = matches!(
        &negated,
        Expression::Compound(c) if c.operators().contains(&LogicalOperator::And)
    );
    if !joined_by_and {
        return negated;
    }
    match negated.children().split_first() {
        Some((first, rest)) => rest
            .iter()
            .fold(first.clone(), |acc, term| intersect(&acc, term)),
        None => Expression::empty(),
    }
}

// =============================================================================
// Preparation
// =============================================================================

/// Follows single-child compounds down to the first node that is a leaf or
/// has several children, accumulating the negation flags passed on the way.
/// The returned node's own flag is not included.
pub(crate) fn unwrap_single(expr: &Expression) -> (&Expression, bool) {
    let mut current = expr;
    let mut flip = false;
    while let Expression::Compound(c) = current {
        if c.len() != 1 {
            break;
        }
        flip ^= c.is_complement();
        current = &c.children()[0];
    }
    (current, flip)
}

/// Returns an equivalent tree whose root is neither a single-child wrapper
/// nor a negated compound. The input is only cloned when the root changes.
pub(crate) fn prepare(expr: &Expression) -> Cow<'_, Expression> {
    let (node, flip) = unwrap_single(expr);
    let negated = flip ^ node.is_complement();
    match node {
        Expression::Compound(c) if !c.is_empty() && negated => {
            let mut rewritten = node.clone();
            if !flip {
                rewritten.complement();
            }
            rewritten.distribute_complement();
            Cow::Owned(rewritten)
        }
        Expression::Compound(_) if !flip => Cow::Borrowed(node),
        _ => {
            let mut toggled = node.clone();
            if flip {
                toggled.complement();
            }
            Cow::Owned(toggled)
        }
    }
}

// =============================================================================
// Stack machine
// =============================================================================

/// Computes the SOP of a tree without recursion. A negated root is negated
/// after reduction; an empty compound below a wrapper is rejected.
pub(crate) fn by_stack(root: &Expression) -> EngineResult<Expression> {
    let (node, flip) = unwrap_single(root);
    let compound = match node {
        Expression::Compound(c) if !c.is_empty() => c,
        Expression::Compound(_) if !std::ptr::eq(node, root) => {
            return Err(EngineError::EmptyCompound)
        }
        other => {
            let mut value = other.clone();
            if flip {
                value.complement();
            }
            return Ok(value);
        }
    };

    let mut frames: Vec<Frame<'_>> = Vec::new();
    let mut values: Vec<Expression> = Vec::new();
    let mut control: Vec<Control> = Vec::new();
    enter(&mut frames, &mut control, compound, flip ^ compound.is_complement());

    while let Some(frame) = frames.last_mut() {
        let node = frame.node;
        let index = frame.next;

        if index == node.len() {
            frames.pop();
            let value = reduce_node(&mut values, &mut control);
            match frames.last() {
                Some(parent) => {
                    let right = parent.node.right_of(parent.next - 1);
                    deliver(&mut values, &mut control, value, right);
                }
                None => return Ok(value),
            }
            continue;
        }

        frame.next += 1;
        let (child, negated) = unwrap_single(&node.children()[index]);
        match child {
            Expression::Simple(_) => {
                let mut leaf = child.clone();
                if negated {
                    leaf.complement();
                }
                deliver(&mut values, &mut control, leaf, node.right_of(index));
            }
            Expression::Compound(c) if c.is_empty() => return Err(EngineError::EmptyCompound),
            Expression::Compound(c) => {
                enter(&mut frames, &mut control, c, negated ^ c.is_complement());
            }
        }
    }
    Err(EngineError::EmptyCompound)
}

fn enter<'a>(frames: &mut Vec<Frame<'a>>, control: &mut Vec<Control>, node: &'a Compound, negate: bool) {
    if negate {
        control.push(Control::Not);
    }
    control.push(Control::Sentinel);
    frames.push(Frame { node, next: 0 });
}

/// Pushes a child value and handles the operator to its right.
fn deliver(
    values: &mut Vec<Expression>,
    control: &mut Vec<Control>,
    value: Expression,
    right: Option<LogicalOperator>,
) {
    let adjacent_leaves = value.is_simple()
        && control.last() == Some(&Control::And)
        && values.last().is_some_and(Expression::is_simple);
    let merged = if adjacent_leaves {
        values.pop().map(|previous| intersect(&previous, &value))
    } else {
        None
    };
    match merged {
        Some(product) => {
            control.pop();
            values.push(product);
        }
        None => values.push(value),
    }

    match right {
        Some(LogicalOperator::And) => control.push(Control::And),
        Some(LogicalOperator::Or) => {
            reduce_run(values, control);
            control.push(Control::Or);
        }
        None => reduce_run(values, control),
    }
}

/// Folds the pending AND-run on top of the value stack by intersection.
fn reduce_run(values: &mut Vec<Expression>, control: &mut Vec<Control>) {
    let mut operands = 1;
    while control.last() == Some(&Control::And) {
        control.pop();
        operands += 1;
    }
    if operands == 1 {
        return;
    }
    let run = values.split_off(values.len().saturating_sub(operands));
    let mut iter = run.into_iter();
    if let Some(first) = iter.next() {
        let product = iter.fold(first, |acc, term| intersect(&acc, &term));
        values.push(product);
    }
}

/// Unions the run values of a finished node and applies a pending negation.
fn reduce_node(values: &mut Vec<Expression>, control: &mut Vec<Control>) -> Expression {
    let mut operands = 1;
    while let Some(token) = control.pop() {
        match token {
            Control::Or => operands += 1,
            Control::Sentinel => break,
            Control::And | Control::Not => {}
        }
    }
    let parts = values.split_off(values.len().saturating_sub(operands));
    let mut sum = match parts.len() {
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => sum_of(parts),
    };
    if control.last() == Some(&Control::Not) {
        control.pop();
        trace!("negating node value with {} literals", sum.len());
        sum = negate(sum);
    }
    sum
}

// =============================================================================
// Divide and conquer
// =============================================================================

/// Splits the top-level children into consecutive divisions of roughly
/// `threshold` children. A division only ends after an OR or at the end.
pub(crate) fn partition(compound: &Compound, threshold: usize) -> Vec<Expression> {
    let n = compound.len();
    let mut divisions = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = (start + threshold.max(1)).min(n);
        while end < n && compound.right_of(end - 1) != Some(LogicalOperator::Or) {
            end += 1;
        }
        let mut division = Compound::new();
        for i in start..end {
            let operator = compound.left_of(i).unwrap_or(LogicalOperator::And);
            division.push(operator, compound.children()[i].clone());
        }
        divisions.push(Expression::Compound(division));
        start = end;
    }
    divisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_expr::Operator;

    fn leaf(name: &str) -> Expression {
        Expression::new(name, Operator::Equal, 1)
    }

    #[test]
    fn test_from_products_collapses_single_literal() {
        assert_eq!(from_products(vec![vec![leaf("a")]]), leaf("a"));
        assert_eq!(from_products(Vec::new()), Expression::empty());
    }

    #[test]
    fn test_intersect_skips_repeated_literals() {
        let left = Expression::and_all([leaf("a"), leaf("b")]);
        let right = Expression::or_all([leaf("b"), leaf("c")]);
        let product = intersect(&left, &right);
        let groups = products(&product);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], &[leaf("a"), leaf("b")][..]);
        assert_eq!(groups[1], &[leaf("a"), leaf("b"), leaf("c")][..]);
    }

    #[test]
    fn test_sum_of_concatenates() {
        let sum = sum_of(vec![leaf("a"), Expression::and_all([leaf("b"), leaf("c")])]);
        assert_eq!(sum.to_string(), "(([a] == 1) || ([b] == 1) && ([c] == 1))");

        let sum = sum_of(vec![Expression::and_all([leaf("a"), leaf("b")]), leaf("c")]);
        assert_eq!(sum.to_string(), "(([a] == 1) && ([b] == 1) || ([c] == 1))");

        assert_eq!(sum_of(vec![Expression::empty(), leaf("a")]), leaf("a"));
        assert_eq!(sum_of(Vec::new()), Expression::empty());
    }

    #[test]
    fn test_negate_product() {
        let negated = negate(Expression::and_all([leaf("a"), leaf("b")]));
        assert_eq!(negated, Expression::or_all([!leaf("a"), !leaf("b")]));
    }

    #[test]
    fn test_negate_sum_of_products() {
        // !((a && b) || c) == (!a && !c) || (!b && !c)
        let value = Expression::and_all([leaf("a"), leaf("b")]).or(leaf("c"));
        let negated = negate(value);
        let groups = products(&negated);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], &[!leaf("a"), !leaf("c")][..]);
        assert_eq!(groups[1], &[!leaf("b"), !leaf("c")][..]);
    }

    #[test]
    fn test_unwrap_single_accumulates_flags() {
        let inner = leaf("a");
        let mut wrapped = inner.clone();
        wrapped.compound();
        wrapped.complement();
        wrapped.compound();
        let (node, flip) = unwrap_single(&wrapped);
        assert_eq!(node, &inner);
        assert!(flip);
    }

    #[test]
    fn test_prepare_applies_de_morgan_to_negated_root() {
        let expr = !Expression::or_all([leaf("a"), leaf("b")]);
        let prepared = prepare(&expr);
        assert!(!prepared.is_complement());
        assert_eq!(*prepared, Expression::and_all([!leaf("a"), !leaf("b")]));

        let plain = Expression::or_all([leaf("a"), leaf("b")]);
        assert!(matches!(prepare(&plain), Cow::Borrowed(_)));
    }

    #[test]
    fn test_by_stack_nested_negation() {
        // !(a || b) && (c || d)
        let expr = Expression::and_all([
            !Expression::or_all([leaf("a"), leaf("b")]),
            Expression::or_all([leaf("c"), leaf("d")]),
        ]);
        let sop = by_stack(&expr).unwrap();
        let groups = products(&sop);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], &[!leaf("a"), !leaf("b"), leaf("c")][..]);
        assert_eq!(groups[1], &[!leaf("a"), !leaf("b"), leaf("d")][..]);
    }

    #[test]
    fn test_by_stack_rejects_nested_empty() {
        let expr = Expression::and_all([leaf("a"), Expression::empty()]);
        assert_eq!(by_stack(&expr), Err(EngineError::EmptyCompound));
    }

    #[test]
    fn test_partition_cuts_after_or_only() {
        // a && b && c || d || e && f
        let expr = Expression::and_all([leaf("a"), leaf("b"), leaf("c")])
            .or(leaf("d"))
            .or(leaf("e"))
            .and(leaf("f"));
        let compound = expr.as_compound().unwrap();
        let divisions = partition(compound, 1);
        let sizes: Vec<usize> = divisions.iter().map(Expression::len).collect();
        assert_eq!(sizes, vec![3, 1, 2]);
    }

    #[test]
    fn test_prepare_negated_deep_root() {
        let mut expr = leaf("a");
        for _ in 0..10_000 {
            expr = Expression::and_all([expr, leaf("b")]);
        }
        expr.complement();
        let prepared = prepare(&expr);
        assert!(!prepared.is_complement());
        assert_eq!(prepared.children()[1], !leaf("b"));
    }
}
