//! Minimization of sum-of-products values.
//!
//! Two reductions are applied:
//! - idempotence: a literal repeated inside a minterm is kept once
//! - absorption: a minterm whose literals include all literals of another
//!   minterm is dropped (`A || A && B` becomes `A`); of two equal minterms the
//!   first is kept

use query_expr::Expression;
use tracing::trace;

use crate::sop::{from_products, products};

/// Minimizes a value already in SOP form.
pub(crate) fn simplify(sop: &Expression) -> Expression {
    let terms: Vec<Vec<&Expression>> = products(sop).into_iter().map(dedupe).collect();

    let kept: Vec<Vec<Expression>> = terms
        .iter()
        .enumerate()
        .filter(|(i, term)| {
            !terms
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && absorbs(other, term, j < *i))
        })
        .map(|(_, term)| term.iter().map(|literal| (*literal).clone()).collect())
        .collect();

    trace!(
        before = terms.len(),
        after = kept.len(),
        "absorbed redundant minterms"
    );
    from_products(kept)
}

fn dedupe(product: &[Expression]) -> Vec<&Expression> {
    let mut out: Vec<&Expression> = Vec::with_capacity(product.len());
    for literal in product {
        if !out.contains(&literal) {
            out.push(literal);
        }
    }
    out
}

/// Returns true if `small` makes `big` redundant. Equal sets only absorb when
/// `small` comes first.
fn absorbs(small: &[&Expression], big: &[&Expression], earlier: bool) -> bool {
    if small.len() > big.len() || !small.iter().all(|literal| big.contains(literal)) {
        return false;
    }
    small.len() < big.len() || earlier
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_expr::Operator;

    fn leaf(name: &str) -> Expression {
        Expression::new(name, Operator::Equal, 1)
    }

    #[test]
    fn test_absorption() {
        // a || a && b  ->  a
        let sop = leaf("a").or(leaf("a")).and(leaf("b"));
        assert_eq!(simplify(&sop), leaf("a"));
    }

    #[test]
    fn test_idempotent_literals() {
        let sop = Expression::and_all([leaf("a"), leaf("b"), leaf("a")]);
        assert_eq!(simplify(&sop), Expression::and_all([leaf("a"), leaf("b")]));
    }

    #[test]
    fn test_equal_minterms_keep_first() {
        // a && b || b && a || c
        let sop = Expression::and_all([leaf("a"), leaf("b")])
            .or(leaf("b"))
            .and(leaf("a"))
            .or(leaf("c"));
        let simplified = simplify(&sop);
        assert_eq!(simplified.to_string(), "(([a] == 1) && ([b] == 1) || ([c] == 1))");
    }

    #[test]
    fn test_negated_literal_is_distinct() {
        let sop = leaf("a").or(!leaf("a"));
        assert_eq!(simplify(&sop), sop);
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(simplify(&Expression::empty()), Expression::empty());
    }
}
