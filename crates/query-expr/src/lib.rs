//! # query-expr
//!
//! Boolean predicate trees for query filters.
//!
//! This crate provides:
//! - **Expression tree**: leaf conditions `[subject] OPERATOR value` combined
//!   with AND/OR into compound nodes, each optionally negated
//! - **De Morgan negation**: iterative rewriting of a negated tree
//! - **Text round-trip**: rendering with `Display` and parsing with [`parse`]
//! - **Sort**: cascading `field+`/`field-` ordering specifications
//!
//! Canonicalization (sum of products, minimization) and evaluation live in
//! the `query-expr-engine` crate.
//!
//! ## Usage
//!
//! ```rust
//! use query_expr::{parse, Expression, Operator};
//!
//! let expr = Expression::new("status", Operator::Equal, "open")
//!     .and(Expression::new("priority", Operator::Gte, 3).or(Expression::new("owner", Operator::In, vec![1, 2])));
//!
//! let text = expr.to_string();
//! assert_eq!(text, r#"(([status] == "open") && (([priority] >= 3) || ([owner] IN [1,2])))"#);
//! assert_eq!(parse(&text).unwrap(), Some(expr));
//! ```
//!
//! ## Grammar Quick Reference
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `[name] OP value` | Condition | `[age] >= 18` |
//! | `[name=v] OP value` | Condition with evaluation value | `[age=30] >= 18` |
//! | `&&` / `AND` | Conjunction | `[a] == 1 && [b] == 2` |
//! | `\|\|` / `OR` | Disjunction | `[a] == 1 OR [b] == 2` |
//! | `!` | Negation | `!([a] == 1 \|\| [b] == 2)` |
//! | `( )` | Grouping | `[a] == 1 && ([b] == 2 \|\| [c] == 3)` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod expression;
mod formatter;
mod parser;
mod sort;

pub use ast::{
    Condition, LogicalOperator, Operator, Side, Subject, Value, ValueRef, DATE_TIME_FORMAT,
};
pub use error::{ExprError, ExprResult};
pub use expression::{Compound, Expression, PrefixToken};
pub use parser::parse;
pub use sort::{Order, Sort};
