//! Leaf types of the predicate tree: operators, values, subjects and conditions.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ExprError;

/// Format used to render and parse date-time literals.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator of a simple expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Operator {
    /// Equal: `==`
    Equal,
    /// Not equal: `!=`
    NotEqual,
    /// Greater than: `>`
    Gt,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    Lte,
    /// Greater than or equal: `>=`
    Gte,
    /// String prefix: `STARTS_WITH`
    StartsWith,
    /// String suffix: `ENDS_WITH`
    EndsWith,
    /// Containment: `CONTAINS`
    Contains,
    /// Membership in a list: `IN`
    In,
    /// SQL-style pattern match: `LIKE`
    Like,
}

impl Operator {
    /// Returns the canonical upper-case name (`EQUAL`, `GT`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::Gt => "GT",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gte => "GTE",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::In => "IN",
            Operator::Like => "LIKE",
        }
    }

    /// Returns the symbol used by the textual grammar.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            other => other.name(),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operator {
    type Err = ExprError;

    /// Accepts either the symbol (`>=`) or the name (`GTE`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_uppercase().as_str() {
            "==" | "EQUAL" => Operator::Equal,
            "!=" | "NOT_EQUAL" => Operator::NotEqual,
            ">" | "GT" => Operator::Gt,
            "<" | "LT" => Operator::Lt,
            "<=" | "LTE" => Operator::Lte,
            ">=" | "GTE" => Operator::Gte,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "CONTAINS" => Operator::Contains,
            "IN" => Operator::In,
            "LIKE" => Operator::Like,
            _ => return Err(ExprError::InvalidOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// Binary logical combinator between two sibling expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOperator {
    /// Conjunction: `&&`
    And,
    /// Disjunction: `||`
    Or,
}

impl LogicalOperator {
    /// Returns the De Morgan dual (AND ↔ OR).
    pub fn dual(self) -> Self {
        match self {
            LogicalOperator::And => LogicalOperator::Or,
            LogicalOperator::Or => LogicalOperator::And,
        }
    }
}

impl std::fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "&&"),
            LogicalOperator::Or => write!(f, "||"),
        }
    }
}

impl FromStr for LogicalOperator {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" | "&&" => Ok(LogicalOperator::And),
            "OR" | "||" => Ok(LogicalOperator::Or),
            _ => Err(ExprError::InvalidLogicalOperator(s.to_string())),
        }
    }
}

/// Which neighbour of a child an operator lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The operator between the child and its predecessor.
    Left,
    /// The operator between the child and its successor.
    Right,
}

impl FromStr for Side {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            _ => Err(ExprError::InvalidSide(s.to_string())),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// Literal payload of a condition or a subject.
///
/// An absent value (`null`) is represented by `Option::None` at the use site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::derive_partial_eq_without_eq)]
pub enum Value {
    /// Boolean literal: `true`
    Bool(bool),
    /// Integer literal: `42`
    Integer(i64),
    /// Decimal literal: `4.2`
    Decimal(f64),
    /// String literal: `"text"`
    String(String),
    /// Date-time literal: `2024-01-31T00:00:00`
    Date(NaiveDateTime),
    /// List literal: `[1,2,3]`
    List(Vec<Value>),
}

/// Shared handle to a leaf value. Cloning an expression shares its payloads.
pub type ValueRef = Arc<Value>;

impl Value {
    /// Returns a short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "list",
        }
    }

    /// Returns the string content if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain text form without quoting, used for prefix/suffix checks.
    pub fn to_plain_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if both values are the same variant.
    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal(n) => write!(f, "{:?}", n),
            Value::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Value::Date(d) => write!(f, "{}", d.format(DATE_TIME_FORMAT)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Subject
// =============================================================================

/// A named reference to a queryable attribute.
///
/// The optional value is a cached evaluation input; it never reaches the
/// query compiler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    /// Attribute name.
    pub name: String,
    /// Value used when evaluating the expression in memory.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<Value>,
}

impl Subject {
    /// Creates a subject without an evaluation value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Creates a subject carrying an evaluation value.
    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Subject::new(name)
    }
}

impl From<String> for Subject {
    fn from(name: String) -> Self {
        Subject::new(name)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(v) => write!(f, "[{}={}]", self.name, v),
            None => write!(f, "[{}]", self.name),
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// An atomic predicate: `subject operator value`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    /// The attribute being tested.
    pub subject: Subject,
    /// The comparison operator.
    pub operator: Operator,
    /// The comparison operand (None = existence check).
    pub value: Option<ValueRef>,
    /// Whether the condition is negated.
    #[cfg_attr(feature = "serde", serde(default))]
    pub complement: bool,
}

impl Condition {
    /// Creates a non-negated condition.
    pub fn new(subject: impl Into<Subject>, operator: Operator, value: Option<Value>) -> Self {
        Self {
            subject: subject.into(),
            operator,
            value: value.map(Arc::new),
            complement: false,
        }
    }

    /// Returns the subject.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the comparison operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the comparison operand.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }
}
