//! Ordering specification.
//!
//! Textual form: `field+` (ascending) or `field-` (descending), cascaded with
//! commas: `lastName+,age-`. A field without suffix sorts ascending.

use std::str::FromStr;

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0, one_of},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    sequence::{delimited, pair, tuple},
    IResult,
};

use crate::error::ExprError;

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    /// Field to sort by.
    pub field: String,
    /// Sort direction.
    pub ascending: bool,
}

/// Cascading list of sort keys, most significant first.
///
/// ```rust
/// use query_expr::Sort;
///
/// let sort = Sort::ascending("lastName").then_descending("age");
/// assert_eq!(sort.to_string(), "lastName+,age-");
/// assert_eq!("lastName+, age-".parse::<Sort>().unwrap(), sort);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    /// Sort ascending by `field`.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            orders: vec![Order {
                field: field.into(),
                ascending: true,
            }],
        }
    }

    /// Sort descending by `field`.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            orders: vec![Order {
                field: field.into(),
                ascending: false,
            }],
        }
    }

    /// Appends the keys of `next` as lower-priority keys.
    pub fn then(mut self, next: Sort) -> Self {
        self.orders.extend(next.orders);
        self
    }

    /// Appends an ascending key.
    pub fn then_ascending(self, field: impl Into<String>) -> Self {
        self.then(Sort::ascending(field))
    }

    /// Appends a descending key.
    pub fn then_descending(self, field: impl Into<String>) -> Self {
        self.then(Sort::descending(field))
    }

    /// Returns the keys, most significant first.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Returns true if no key is set.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.field, if self.ascending { '+' } else { '-' })
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, order) in self.orders.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", order)?;
        }
        Ok(())
    }
}

impl FromStr for Sort {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match all_consuming(delimited(multispace0, orders, multispace0))(s) {
            Ok((_, orders)) => Ok(Sort { orders }),
            Err(_) => Err(ExprError::InvalidSort(s.to_string())),
        }
    }
}

fn orders(input: &str) -> IResult<&str, Vec<Order>> {
    separated_list1(tuple((multispace0, char(','), multispace0)), order)(input)
}

fn order(input: &str) -> IResult<&str, Order> {
    map(
        pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
            opt(one_of("+-")),
        ),
        |(field, direction): (&str, Option<char>)| Order {
            field: field.to_string(),
            ascending: direction != Some('-'),
        },
    )(input)
}
