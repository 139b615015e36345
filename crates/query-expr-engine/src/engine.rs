//! Expression engine implementation.

use std::cmp::Ordering;

use query_expr::{Condition, Expression, Operator, Subject, Value};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::minimize;
use crate::sop;

/// Boolean algebra over [`Expression`] trees.
///
/// The engine evaluates trees against the values carried by their subjects,
/// rewrites them into sum-of-products form, combines them with union and
/// intersection and minimizes the result.
///
/// # Example
///
/// ```rust
/// use query_expr::{Expression, Operator, Subject};
/// use query_expr_engine::ExpressionEngine;
///
/// let engine = ExpressionEngine::new();
///
/// let expr = Expression::new(Subject::with_value("age", 30), Operator::Gte, 18)
///     .and(Expression::new(Subject::with_value("name", "Ann"), Operator::StartsWith, "A"));
/// assert!(engine.evaluate(&expr).unwrap());
///
/// let minterms = engine.minterms(&expr).unwrap();
/// assert_eq!(minterms.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExpressionEngine {
    config: EngineConfig,
}

impl ExpressionEngine {
    /// Creates an engine with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with custom configuration.
    ///
    /// Returns [`EngineError::InvalidThreshold`] if the threshold is 0.
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluates the tree against the values carried by its subjects.
    ///
    /// The tree is first rewritten into sum-of-products form; it is true if
    /// every literal of at least one minterm is true. An empty compound is
    /// false.
    pub fn evaluate(&self, expr: &Expression) -> EngineResult<bool> {
        let sop = self.sum_of_products(expr)?;
        for product in sop::products(&sop) {
            let mut all = true;
            for literal in product {
                if let Expression::Simple(condition) = literal {
                    if !self.evaluate_condition(condition)? {
                        all = false;
                        break;
                    }
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Evaluates a single condition, honoring its negation flag.
    pub fn evaluate_condition(&self, condition: &Condition) -> EngineResult<bool> {
        let Subject { value, .. } = &condition.subject;
        let result = self.compare(value.as_ref(), condition.operator, condition.value())?;
        Ok(result != condition.complement)
    }

    /// Compares a subject value against a condition value.
    ///
    /// Two absent values are `Equal`; one absent value is `NotEqual`. Present
    /// values must be of the same type and orderable.
    pub fn compare(
        &self,
        left: Option<&Value>,
        operator: Operator,
        right: Option<&Value>,
    ) -> EngineResult<bool> {
        let (left, right) = match (left, right) {
            (None, None) => return Ok(operator == Operator::Equal),
            (None, _) | (_, None) => return Ok(operator == Operator::NotEqual),
            (Some(left), Some(right)) => (left, right),
        };
        if !left.same_type(right) {
            return Err(EngineError::TypeMismatch {
                left: left.type_name(),
                right: right.type_name(),
            });
        }
        let ordering = order(left, right)
            .ok_or_else(|| EngineError::NotComparable(format!("{} and {}", left, right)))?;

        let result = match operator {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::StartsWith => left.to_plain_text().starts_with(&right.to_plain_text()),
            Operator::EndsWith => left.to_plain_text().ends_with(&right.to_plain_text()),
            other => return Err(EngineError::UnsupportedOperator(other)),
        };
        Ok(result)
    }

    // =========================================================================
    // Sum of products
    // =========================================================================

    /// Rewrites the tree into sum-of-products form.
    ///
    /// Trees with more top-level children than the configured threshold are
    /// split with [`sum_of_products_divide_and_conquer`]; others run on the
    /// stack machine. A leaf or an empty compound is returned unchanged.
    ///
    /// [`sum_of_products_divide_and_conquer`]: Self::sum_of_products_divide_and_conquer
    pub fn sum_of_products(&self, expr: &Expression) -> EngineResult<Expression> {
        if !expr.is_compound() {
            return Ok(expr.clone());
        }
        if expr.len() > self.config.threshold {
            self.sum_of_products_divide_and_conquer(expr, self.config.threshold)
        } else {
            self.sum_of_products_by_stack(expr)
        }
    }

    /// Rewrites the tree into sum-of-products form with the iterative stack
    /// machine. Returns [`EngineError::EmptyCompound`] if an empty compound is
    /// nested in the tree.
    pub fn sum_of_products_by_stack(&self, expr: &Expression) -> EngineResult<Expression> {
        if !expr.is_compound() {
            return Ok(expr.clone());
        }
        let prepared = sop::prepare(expr);
        trace!(children = prepared.len(), "stack machine");
        sop::by_stack(&prepared)
    }

    /// Rewrites the tree into sum-of-products form by splitting its top-level
    /// children into divisions of about `threshold` children.
    ///
    /// Divisions only end after an OR, so each is an independent disjunct; the
    /// results are unioned. If no OR allows a split, the threshold is halved
    /// and at 1 the stack machine takes the whole tree.
    pub fn sum_of_products_divide_and_conquer(
        &self,
        expr: &Expression,
        threshold: usize,
    ) -> EngineResult<Expression> {
        if threshold == 0 {
            return Err(EngineError::InvalidThreshold(threshold));
        }
        if !expr.is_compound() {
            return Ok(expr.clone());
        }
        let prepared = sop::prepare(expr);
        self.divide(&prepared, threshold)
    }

    fn divide(&self, prepared: &Expression, threshold: usize) -> EngineResult<Expression> {
        let compound = match prepared {
            Expression::Compound(c) if !c.is_empty() => c,
            other => return Ok(other.clone()),
        };

        let mut threshold = threshold;
        loop {
            let divisions = sop::partition(compound, threshold);
            if divisions.len() > 1 {
                debug!(
                    children = compound.len(),
                    threshold,
                    divisions = divisions.len(),
                    "divide and conquer"
                );
                let mut parts = Vec::with_capacity(divisions.len());
                for division in &divisions {
                    parts.push(self.division(division)?);
                }
                return Ok(sop::sum_of(parts));
            }
            if threshold == 1 {
                debug!(
                    children = compound.len(),
                    "no OR to split on, falling back to stack machine"
                );
                return sop::by_stack(prepared);
            }
            threshold /= 2;
            trace!(threshold, "single division, halving threshold");
        }
    }

    /// Canonicalizes one division with the configured threshold. Divisions
    /// are never negated, so they skip root preparation.
    fn division(&self, division: &Expression) -> EngineResult<Expression> {
        if division.len() > self.config.threshold {
            self.divide(division, self.config.threshold)
        } else {
            sop::by_stack(division)
        }
    }

    // =========================================================================
    // Algebra
    // =========================================================================

    /// Disjunction of two trees, in sum-of-products form.
    pub fn union(&self, left: &Expression, right: &Expression) -> EngineResult<Expression> {
        let left = self.canonical(left)?;
        let right = self.canonical(right)?;
        Ok(sop::sum_of(vec![left, right]))
    }

    /// Conjunction of two trees, in sum-of-products form.
    ///
    /// Every minterm of `left` is combined with every minterm of `right`.
    pub fn intersection(&self, left: &Expression, right: &Expression) -> EngineResult<Expression> {
        let left = self.canonical(left)?;
        let right = self.canonical(right)?;
        Ok(sop::intersect(&left, &right))
    }

    /// Minimizes a tree by idempotence and absorption.
    ///
    /// A tree not yet in sum-of-products form is rewritten first.
    pub fn simplify(&self, expr: &Expression) -> EngineResult<Expression> {
        let sop = self.canonical(expr)?;
        Ok(minimize::simplify(&sop))
    }

    /// Sum of products followed by minimization.
    pub fn minimized(&self, expr: &Expression) -> EngineResult<Expression> {
        let sop = self.sum_of_products(expr)?;
        Ok(minimize::simplify(&sop))
    }

    /// Returns the minterms of the tree's sum-of-products form, each a leaf
    /// or an AND of leaves.
    pub fn minterms(&self, expr: &Expression) -> EngineResult<Vec<Expression>> {
        let sop = self.sum_of_products(expr)?;
        Ok(sop::products(&sop)
            .into_iter()
            .map(|product| match product {
                [single] => single.clone(),
                many => Expression::and_all(many.iter().cloned()),
            })
            .collect())
    }

    /// Removes single-child compound wrappers from the root down, folding
    /// their negation into the unwrapped node.
    pub fn simplify_nested(&self, expr: &Expression) -> Expression {
        let (node, flip) = sop::unwrap_single(expr);
        let mut unwrapped = node.clone();
        if flip {
            unwrapped.complement();
        }
        unwrapped
    }

    /// Parses expression text. Blank or unparsable text yields `None`.
    pub fn parse(&self, input: &str) -> EngineResult<Option<Expression>> {
        Ok(query_expr::parse(input)?)
    }

    fn canonical(&self, expr: &Expression) -> EngineResult<Expression> {
        if sop::is_sop(expr) {
            Ok(expr.clone())
        } else {
            self.sum_of_products(expr)
        }
    }
}

/// Ordering of two values of the same type; `None` for lists and NaN.
fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
