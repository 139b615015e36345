//! Textual rendering of predicate trees.
//!
//! The output is accepted by [`crate::parse`]:
//!
//! ```text
//! leaf      !?([name(=subjectValue)?] OPERATOR value)
//! compound  !?(child OP child ...)
//! ```
//!
//! Every compound keeps its own parentheses, including a single-child
//! wrapper. The parser reads a one-element group as the element itself, so
//! such wrappers do not survive a round trip: `(([a] == 1))` reads back as the
//! leaf, and a negated wrapper as the negated leaf.

use std::fmt;

use crate::ast::Condition;
use crate::expression::Expression;

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.complement {
            write!(f, "!")?;
        }
        write!(f, "({} {} ", self.subject, self.operator)?;
        match self.value() {
            Some(v) => write!(f, "{}", v)?,
            None => write!(f, "null")?,
        }
        write!(f, ")")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Simple(c) => write!(f, "{}", c),
            Expression::Compound(c) => {
                if c.is_complement() {
                    write!(f, "!")?;
                }
                write!(f, "(")?;
                for (i, child) in c.children().iter().enumerate() {
                    if let Some(op) = c.left_of(i) {
                        write!(f, " {} ", op)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Operator, Subject};
    use crate::expression::Expression;

    #[test]
    fn test_leaf_with_list_value() {
        let expr = Expression::new("field", Operator::In, vec![1, 2, 3]);
        assert_eq!(expr.to_string(), "([field] IN [1,2,3])");
    }

    #[test]
    fn test_leaf_with_string_list() {
        let expr = Expression::new("tag", Operator::In, vec!["a", "b"]);
        assert_eq!(expr.to_string(), r#"([tag] IN ["a","b"])"#);
    }

    #[test]
    fn test_leaf_with_subject_value() {
        let expr = Expression::new(Subject::with_value("age", 30), Operator::Gte, 18);
        assert_eq!(expr.to_string(), "([age=30] >= 18)");
    }

    #[test]
    fn test_negated_leaf_and_null() {
        let expr = !Expression::null_check("deletedAt", Operator::Equal);
        assert_eq!(expr.to_string(), "!([deletedAt] == null)");
    }

    #[test]
    fn test_compound_rendering() {
        let expr = !Expression::new("a", Operator::Equal, 1)
            .and(Expression::new("b", Operator::StartsWith, "x"))
            .or(Expression::new("c", Operator::Lt, 2.5));
        assert_eq!(
            expr.to_string(),
            r#"!(([a] == 1) && ([b] STARTS_WITH "x") || ([c] < 2.5))"#
        );
    }

    #[test]
    fn test_single_child_wrapper_reads_back_as_child() {
        let leaf = Expression::new("a", Operator::Equal, 1);
        let wrapped = Expression::and_all([leaf.clone()]);
        assert_eq!(wrapped.to_string(), "(([a] == 1))");
        assert_eq!(crate::parse(&wrapped.to_string()).unwrap(), Some(leaf.clone()));

        let negated = !Expression::and_all([leaf.clone()]);
        assert_eq!(negated.to_string(), "!(([a] == 1))");
        assert_eq!(crate::parse(&negated.to_string()).unwrap(), Some(!leaf));
    }

    #[test]
    fn test_empty_compound() {
        assert_eq!(Expression::empty().to_string(), "()");
    }
}
