//! Rewriting of expression trees leaf by leaf.
//!
//! An [`ExpressionTransformer`] replaces each leaf with a new expression or
//! drops it. Compound nodes are rebuilt from the surviving children with their
//! original operators and negation.

use std::collections::HashMap;

use query_expr::{Compound, Condition, Expression, LogicalOperator, Operator, Subject, Value, ValueRef};

use crate::error::EngineResult;

/// Rebuilds a non-negated leaf from its parts, sharing the value payload.
pub fn rebuild(subject: &Subject, operator: Operator, value: Option<&ValueRef>) -> Expression {
    Expression::Simple(Condition {
        subject: subject.clone(),
        operator,
        value: value.cloned(),
        complement: false,
    })
}

/// Leaf-by-leaf rewriting of an expression tree.
///
/// Implementors override [`transform_leaf`](Self::transform_leaf) and
/// optionally [`post_transform`](Self::post_transform); [`transform`](Self::transform)
/// walks the tree.
///
/// # Example
///
/// ```rust
/// use query_expr::{Expression, Operator, Subject, ValueRef};
/// use query_expr_engine::{rebuild, EngineResult, ExpressionTransformer};
///
/// struct Upper;
///
/// impl ExpressionTransformer for Upper {
///     fn transform_leaf(
///         &mut self,
///         subject: &Subject,
///         operator: Operator,
///         value: Option<&ValueRef>,
///     ) -> EngineResult<Option<Expression>> {
///         let renamed = Subject::new(subject.name.to_uppercase());
///         Ok(Some(rebuild(&renamed, operator, value)))
///     }
/// }
///
/// let expr = Expression::new("age", Operator::Gt, 23);
/// let out = Upper.transform(&expr).unwrap().unwrap();
/// assert_eq!(out.to_string(), "([AGE] > 23)");
/// ```
pub trait ExpressionTransformer {
    /// Produces the replacement of a leaf, ignoring its negation (the walker
    /// applies it). `None` drops the leaf.
    fn transform_leaf(
        &mut self,
        subject: &Subject,
        operator: Operator,
        value: Option<&ValueRef>,
    ) -> EngineResult<Option<Expression>> {
        Ok(Some(rebuild(subject, operator, value)))
    }

    /// Post-processes the replacement of `original`.
    fn post_transform(
        &mut self,
        original: &Condition,
        transformed: Option<Expression>,
    ) -> EngineResult<Option<Expression>> {
        let _ = original;
        Ok(transformed)
    }

    /// Rewrites the whole tree. Returns `None` if every leaf was dropped.
    fn transform(&mut self, expr: &Expression) -> EngineResult<Option<Expression>> {
        transform_tree(self, expr)
    }
}

fn transform_tree<T: ExpressionTransformer + ?Sized>(
    transformer: &mut T,
    expr: &Expression,
) -> EngineResult<Option<Expression>> {
    let compound = match expr {
        Expression::Simple(condition) => {
            let mut out =
                transformer.transform_leaf(&condition.subject, condition.operator, condition.value.as_ref())?;
            if condition.complement {
                if let Some(e) = out.as_mut() {
                    e.complement();
                }
            }
            return transformer.post_transform(condition, out);
        }
        Expression::Compound(c) => c,
    };

    let mut rebuilt = Compound::new();
    for (i, child) in compound.children().iter().enumerate() {
        if let Some(out) = transform_tree(transformer, child)? {
            let operator = compound.left_of(i).unwrap_or(LogicalOperator::And);
            rebuilt.push(operator, out);
        }
    }

    let mut result = match rebuilt.len() {
        0 => return Ok(None),
        1 => {
            let (children, _, _) = rebuilt.into_parts();
            match children.into_iter().next() {
                Some(only) => only,
                None => return Ok(None),
            }
        }
        _ => Expression::Compound(rebuilt),
    };
    if compound.is_complement() {
        result.complement();
    }
    Ok(Some(result))
}

// =============================================================================
// Wildcards
// =============================================================================

/// Rewrites string prefix/suffix/containment tests into `LIKE` patterns:
/// `STARTS_WITH v` becomes `LIKE "v%"`, `ENDS_WITH v` becomes `LIKE "%v"` and
/// `CONTAINS v` becomes `LIKE "%v%"`. `%`, `_` and `\` inside `v` are escaped
/// with a backslash.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardTransformer;

impl WildcardTransformer {
    fn pattern(operator: Operator, text: &str) -> Option<String> {
        let escaped = escape_like(text);
        match operator {
            Operator::StartsWith => Some(format!("{}%", escaped)),
            Operator::EndsWith => Some(format!("%{}", escaped)),
            Operator::Contains => Some(format!("%{}%", escaped)),
            _ => None,
        }
    }
}

impl ExpressionTransformer for WildcardTransformer {
    fn transform_leaf(
        &mut self,
        subject: &Subject,
        operator: Operator,
        value: Option<&ValueRef>,
    ) -> EngineResult<Option<Expression>> {
        let pattern = value
            .and_then(|v| v.as_str())
            .and_then(|text| Self::pattern(operator, text));
        Ok(Some(match pattern {
            Some(pattern) => Expression::Simple(Condition::new(
                subject.clone(),
                Operator::Like,
                Some(Value::String(pattern)),
            )),
            None => rebuild(subject, operator, value),
        }))
    }
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Identifiers
// =============================================================================

/// Rewrites leaves on one identifier subject into a different subject and
/// value, e.g. a public id resolved to an internal key.
///
/// The mapping receives the leaf value; returning `None` drops the leaf.
///
/// ```rust
/// use query_expr::{Expression, Operator, Subject, Value};
/// use query_expr_engine::{ExpressionTransformer, IdentifierTransformer};
///
/// let mut resolve = IdentifierTransformer::new("id", |value: Option<&Value>| {
///     let key = value?.as_str()?.strip_prefix("usr-")?.parse::<i64>().ok()?;
///     Some((Subject::new("user_key"), Some(Value::Integer(key))))
/// });
///
/// let expr = Expression::new("id", Operator::Equal, "usr-42");
/// let out = resolve.transform(&expr).unwrap().unwrap();
/// assert_eq!(out.to_string(), "([user_key] == 42)");
/// ```
pub struct IdentifierTransformer<F> {
    identifier: String,
    mapping: F,
}

impl<F> IdentifierTransformer<F>
where
    F: FnMut(Option<&Value>) -> Option<(Subject, Option<Value>)>,
{
    /// Creates a transformer for leaves whose subject is named `identifier`.
    pub fn new(identifier: impl Into<String>, mapping: F) -> Self {
        Self {
            identifier: identifier.into(),
            mapping,
        }
    }
}

impl<F> ExpressionTransformer for IdentifierTransformer<F>
where
    F: FnMut(Option<&Value>) -> Option<(Subject, Option<Value>)>,
{
    fn transform_leaf(
        &mut self,
        subject: &Subject,
        operator: Operator,
        value: Option<&ValueRef>,
    ) -> EngineResult<Option<Expression>> {
        if subject.name != self.identifier {
            return Ok(Some(rebuild(subject, operator, value)));
        }
        Ok((self.mapping)(value.map(|v| &**v))
            .map(|(subject, value)| Expression::Simple(Condition::new(subject, operator, value))))
    }
}

// =============================================================================
// Renames
// =============================================================================

/// Renames subjects by a fixed table, keeping operators and values.
#[derive(Debug, Clone, Default)]
pub struct RenameTransformer {
    renames: HashMap<String, String>,
}

impl RenameTransformer {
    /// Creates an empty rename table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rename from `from` to `to`.
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }
}

impl ExpressionTransformer for RenameTransformer {
    fn transform_leaf(
        &mut self,
        subject: &Subject,
        operator: Operator,
        value: Option<&ValueRef>,
    ) -> EngineResult<Option<Expression>> {
        let Some(target) = self.renames.get(&subject.name) else {
            return Ok(Some(rebuild(subject, operator, value)));
        };
        let renamed = Subject {
            name: target.clone(),
            value: subject.value.clone(),
        };
        Ok(Some(rebuild(&renamed, operator, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform_shares_values() {
        struct Identity;
        impl ExpressionTransformer for Identity {}

        let expr = Expression::new("a", Operator::Equal, 1)
            .and(!Expression::new("b", Operator::Equal, "x").or(Expression::new("c", Operator::Gt, 2)));
        let out = Identity.transform(&expr).unwrap().unwrap();
        assert_eq!(out, expr);
        assert!(out.shares_values_with(&expr));
    }

    #[test]
    fn test_wildcards() {
        let expr = Expression::new("name", Operator::StartsWith, "Jo")
            .or(Expression::new("name", Operator::EndsWith, "son"))
            .or(Expression::new("name", Operator::Contains, "50%"));
        let out = WildcardTransformer.transform(&expr).unwrap().unwrap();
        assert_eq!(
            out.to_string(),
            r#"(([name] LIKE "Jo%") || ([name] LIKE "%son") || ([name] LIKE "%50\\%%"))"#
        );
    }

    #[test]
    fn test_wildcard_keeps_negation_and_other_leaves() {
        let expr = !Expression::new("name", Operator::StartsWith, "A");
        let out = WildcardTransformer.transform(&expr).unwrap().unwrap();
        assert_eq!(out.to_string(), r#"!([name] LIKE "A%")"#);

        let number = Expression::new("age", Operator::StartsWith, 4);
        assert_eq!(WildcardTransformer.transform(&number).unwrap(), Some(number));
    }

    #[test]
    fn test_identifier_drops_unresolved() {
        let mut resolve = IdentifierTransformer::new("id", |_: Option<&Value>| None);
        let expr = Expression::new("id", Operator::Equal, "x").and(Expression::new("age", Operator::Gt, 3));
        let out = resolve.transform(&expr).unwrap().unwrap();
        assert_eq!(out, Expression::new("age", Operator::Gt, 3));
    }

    #[test]
    fn test_all_dropped_yields_none() {
        let mut drop_all = IdentifierTransformer::new("id", |_: Option<&Value>| None);
        let expr = Expression::new("id", Operator::Equal, 1).or(Expression::new("id", Operator::Equal, 2));
        assert_eq!(drop_all.transform(&expr).unwrap(), None);
    }

    #[test]
    fn test_single_survivor_keeps_node_negation() {
        let mut resolve = IdentifierTransformer::new("id", |_: Option<&Value>| None);
        let expr = !Expression::new("id", Operator::Equal, 1).and(Expression::new("age", Operator::Gt, 3));
        let out = resolve.transform(&expr).unwrap().unwrap();
        assert_eq!(out, !Expression::new("age", Operator::Gt, 3));
    }

    #[test]
    fn test_rename() {
        let mut rename = RenameTransformer::new().with_rename("firstName", "first_name");
        let expr = Expression::new("firstName", Operator::Equal, "Ann").and(Expression::new("age", Operator::Gt, 3));
        let out = rename.transform(&expr).unwrap().unwrap();
        assert_eq!(out.to_string(), r#"(([first_name] == "Ann") && ([age] > 3))"#);
    }

    #[test]
    fn test_post_transform_hook() {
        struct Counting(usize);
        impl ExpressionTransformer for Counting {
            fn post_transform(
                &mut self,
                _original: &Condition,
                transformed: Option<Expression>,
            ) -> EngineResult<Option<Expression>> {
                self.0 += 1;
                Ok(transformed)
            }
        }

        let mut counting = Counting(0);
        let expr = Expression::new("a", Operator::Equal, 1).or(Expression::new("b", Operator::Equal, 2));
        counting.transform(&expr).unwrap();
        assert_eq!(counting.0, 2);
    }
}
