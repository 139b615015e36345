//! # query-expr-engine
//!
//! Boolean algebra over [`query_expr::Expression`] trees.
//!
//! This crate provides:
//! - **Evaluation** of a tree against values carried by its subjects
//! - **Sum of products** by an iterative stack machine, or by divide and
//!   conquer for wide trees
//! - **Union, intersection and minimization** of trees in sum-of-products form
//! - **Transformers** rewriting trees leaf by leaf
//! - **Parameter maps** binding leaf values to stable tokens
//!
//! ## Quick Start
//!
//! ```rust
//! use query_expr::{Expression, Operator};
//! use query_expr_engine::ExpressionEngine;
//!
//! let a = Expression::new("a", Operator::Equal, 1);
//! let b = Expression::new("b", Operator::Equal, 2);
//! let c = Expression::new("c", Operator::Equal, 3);
//!
//! // a && (b || c)  ->  a && b || a && c
//! let engine = ExpressionEngine::new();
//! let sop = engine.sum_of_products(&a.clone().and(b.clone().or(c.clone()))).unwrap();
//! assert_eq!(
//!     engine.minterms(&sop).unwrap(),
//!     vec![a.clone().and(b), a.and(c)]
//! );
//! ```
//!
//! ## With Configuration
//!
//! ```rust
//! use query_expr_engine::{EngineConfig, ExpressionEngine};
//!
//! let config = EngineConfig::builder().with_threshold(64).build();
//! let engine = ExpressionEngine::with_config(config).unwrap();
//! assert_eq!(engine.config().threshold, 64);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Serialize/deserialize [`EngineConfig`] and the expression types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod config;
mod engine;
mod error;
mod minimize;
mod parameters;
mod sop;
mod transformer;

// Public re-exports
pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_THRESHOLD};
pub use engine::ExpressionEngine;
pub use error::{EngineError, EngineResult};
pub use parameters::ParameterMap;
pub use transformer::{
    rebuild, ExpressionTransformer, IdentifierTransformer, RenameTransformer, WildcardTransformer,
};

// Re-export commonly used types from the expression crate for convenience
pub use query_expr::{Expression, Operator, Subject, Value};
