//! Named parameters for compiling expressions into parameterized queries.
//!
//! Each leaf value is bound to a token derived from a scope, the leaf's
//! subject and a digest of the value, so equal leaves share one parameter.

use std::collections::BTreeMap;

use query_expr::{Expression, PrefixToken, Value, ValueRef};
use sha2::{Digest, Sha256};

/// Length in hex characters of the value digest in a token.
const DIGEST_LEN: usize = 12;

/// Parameter tokens and their values, in token order.
///
/// ```rust
/// use query_expr::{Expression, Operator};
/// use query_expr_engine::ParameterMap;
///
/// let expr = Expression::new("age", Operator::Gt, 23)
///     .or(Expression::new("age", Operator::Gt, 23))
///     .or(Expression::new("name", Operator::Equal, "Ann"));
///
/// let params = ParameterMap::collect("user", &expr);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    entries: BTreeMap<String, ValueRef>,
}

impl ParameterMap {
    /// Collects the values of every leaf in `expr`. Leaves without a value
    /// (existence checks) bind nothing.
    pub fn collect(scope: &str, expr: &Expression) -> Self {
        let mut entries = BTreeMap::new();
        expr.prefix(|token| {
            if let PrefixToken::Leaf(condition) = token {
                if let Some(value) = &condition.value {
                    let key = Self::token(scope, &condition.subject.name, value);
                    entries.entry(key).or_insert_with(|| value.clone());
                }
            }
        });
        Self { entries }
    }

    /// Token bound to `value` on `subject` within `scope`:
    /// `<scope>_<subject>_<digest>` with non-alphanumeric characters of scope
    /// and subject replaced by `_`.
    pub fn token(scope: &str, subject: &str, value: &Value) -> String {
        format!("{}_{}_{}", sanitize(scope), sanitize(subject), digest(value))
    }

    /// Returns the value bound to `token`.
    pub fn get(&self, token: &str) -> Option<&Value> {
        self.entries.get(token).map(|v| &**v)
    }

    /// Number of distinct parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no parameter was collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(token, value)` pairs in token order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), &**v))
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn digest(value: &Value) -> String {
    let hash = Sha256::digest(value.to_string().as_bytes());
    let mut hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    hex.truncate(DIGEST_LEN);
    hex
}
