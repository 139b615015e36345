//! Predicate text parser implementation using nom.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! expression := unary (logical unary)*
//! unary      := "!"* primary
//! primary    := "(" expression ")" | leaf
//! leaf       := "[" name ("=" literal)? "]" comparison literal
//! logical    := "&&" | "||" | AND | OR
//! comparison := == | != | <= | >= | < | > | IN | LIKE | CONTAINS | STARTS_WITH | ENDS_WITH
//! literal    := string | list | null | boolean | date | integer | decimal
//! ```
//!
//! Leaves and literals are nom combinators; groups are tracked on an explicit
//! stack rather than by recursive descent.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use chrono::{NaiveDate, NaiveDateTime};

use crate::ast::{Condition, LogicalOperator, Operator, Subject, Value, DATE_TIME_FORMAT};
use crate::error::{ExprError, ExprResult};
use crate::expression::{Compound, Expression};

/// Parse predicate text into an expression.
///
/// # Returns
///
/// * `Ok(Some(expr))` - the parsed tree
/// * `Ok(None)` - blank input or text that does not follow the grammar
/// * `Err(ExprError::InvalidLiteral)` - a bare literal that is neither null,
///   boolean, date, integer nor decimal
///
/// # Examples
///
/// ```rust
/// use query_expr::{parse, Expression, Operator};
///
/// let expr = parse(r#"[firstName] == "John" && [age] > 23"#).unwrap().unwrap();
/// let expected = Expression::new("firstName", Operator::Equal, "John")
///     .and(Expression::new("age", Operator::Gt, 23));
/// assert_eq!(expr, expected);
///
/// assert_eq!(parse("   ").unwrap(), None);
/// ```
pub fn parse(input: &str) -> ExprResult<Option<Expression>> {
    if input.trim().is_empty() {
        return Ok(None);
    }

    match all_consuming(delimited(ws, sequence, ws))(input) {
        Ok((_, expr)) => Ok(Some(expr)),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::MapRes => {
            let position = input.len() - e.input.len();
            let literal = bare_token(e.input).map(|(_, t)| t).unwrap_or(e.input);
            Err(ExprError::InvalidLiteral {
                position,
                literal: literal.to_string(),
            })
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            tracing::debug!(
                position = input.len() - e.input.len(),
                kind = ?e.code,
                "predicate text does not follow the grammar"
            );
            Ok(None)
        }
        Err(nom::Err::Incomplete(_)) => Ok(None),
    }
}

// ============================================================================
// Structure
// ============================================================================

/// An open group and the operands read into it so far.
struct Group {
    negations: usize,
    operator: LogicalOperator,
    items: Vec<(LogicalOperator, Expression)>,
}

impl Group {
    fn new(negations: usize) -> Self {
        Self {
            negations,
            operator: LogicalOperator::And,
            items: Vec::new(),
        }
    }

    fn push(&mut self, operand: Expression) {
        self.items.push((self.operator, operand));
    }

    /// A single element is the element itself, so "(x)" reads as x.
    fn close(self) -> Expression {
        let mut items = self.items.into_iter();
        let mut expr = match (items.next(), items.len()) {
            (Some((_, only)), 0) => only,
            (first, _) => {
                let mut compound = Compound::new();
                for (op, item) in first.into_iter().chain(items) {
                    compound.push(op, item);
                }
                Expression::Compound(compound)
            }
        };
        if self.negations % 2 == 1 {
            expr.complement();
        }
        expr
    }
}

/// Reads operands and logical operators left to right. Parentheses open and
/// close groups on an explicit stack, so nesting depth is not bounded by the
/// call stack.
fn sequence(input: &str) -> IResult<&str, Expression> {
    let mut groups = vec![Group::new(0)];
    let mut input = input;

    loop {
        let (rest, negations) = preceded(ws, many0_count(terminated(char('!'), ws)))(input)?;
        if let Ok((rest, _)) = pair(char('('), ws)(rest) {
            groups.push(Group::new(negations));
            input = rest;
            continue;
        }

        let (rest, mut operand) = leaf(rest)?;
        if negations % 2 == 1 {
            operand.complement();
        }
        input = rest;

        loop {
            if let Some(group) = groups.last_mut() {
                group.push(operand);
            }
            if groups.len() == 1 {
                break;
            }
            match preceded(ws, char(')'))(input) {
                Ok((rest, _)) => {
                    input = rest;
                    match groups.pop() {
                        Some(group) => operand = group.close(),
                        None => break,
                    }
                }
                Err(_) => break,
            }
        }

        match preceded(ws, logical_operator)(input) {
            Ok((rest, op)) => {
                if let Some(group) = groups.last_mut() {
                    group.operator = op;
                }
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    match groups.pop() {
        Some(root) if groups.is_empty() => Ok((input, root.close())),
        _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    }
}

fn logical_operator(input: &str) -> IResult<&str, LogicalOperator> {
    alt((
        value(LogicalOperator::And, tag("&&")),
        value(LogicalOperator::Or, tag("||")),
        value(LogicalOperator::And, keyword("AND")),
        value(LogicalOperator::Or, keyword("OR")),
    ))(input)
}

// ============================================================================
// Leaf
// ============================================================================

fn leaf(input: &str) -> IResult<&str, Expression> {
    let (input, subject) = subject(input)?;
    let (input, operator) = preceded(ws, comparison_operator)(input)?;
    let (input, operand) = preceded(ws, literal)(input)?;
    Ok((input, Expression::Simple(Condition::new(subject, operator, operand))))
}

fn subject(input: &str) -> IResult<&str, Subject> {
    let (input, _) = char('[')(input)?;
    let (input, name) = verify(take_while1(|c: char| c != ']' && c != '='), |s: &str| {
        !s.trim().is_empty()
    })(input)?;
    let (input, cached) = opt(preceded(char('='), literal))(input)?;
    let (input, _) = char(']')(input)?;

    Ok((
        input,
        Subject {
            name: name.trim().to_string(),
            value: cached.flatten(),
        },
    ))
}

fn comparison_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        // Order matters - longer matches first
        value(Operator::Gte, tag(">=")),
        value(Operator::Lte, tag("<=")),
        value(Operator::Equal, tag("==")),
        value(Operator::NotEqual, tag("!=")),
        value(Operator::Gt, tag(">")),
        value(Operator::Lt, tag("<")),
        value(Operator::StartsWith, keyword("STARTS_WITH")),
        value(Operator::EndsWith, keyword("ENDS_WITH")),
        value(Operator::Contains, keyword("CONTAINS")),
        value(Operator::Like, keyword("LIKE")),
        value(Operator::In, keyword("IN")),
    ))(input)
}

// ============================================================================
// Literals
// ============================================================================

/// Parses a literal; `None` stands for `null`.
fn literal(input: &str) -> IResult<&str, Option<Value>> {
    alt((
        map(quoted_string, |s| Some(Value::String(s))),
        map(list_literal, |items| Some(Value::List(items))),
        scalar,
    ))(input)
}

/// A bare token must be a known scalar; anything else aborts the parse.
fn scalar(input: &str) -> IResult<&str, Option<Value>> {
    let (rest, token) = bare_token(input)?;
    match scalar_literal(token) {
        Ok(parsed) => Ok((rest, parsed)),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::MapRes))),
    }
}

/// Tries, in order: null, boolean, date, integer, decimal.
fn scalar_literal(token: &str) -> Result<Option<Value>, std::num::ParseFloatError> {
    if token.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if token.eq_ignore_ascii_case("true") {
        return Ok(Some(Value::Bool(true)));
    }
    if token.eq_ignore_ascii_case("false") {
        return Ok(Some(Value::Bool(false)));
    }
    if let Some(date) = date_literal(token) {
        return Ok(Some(Value::Date(date)));
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Some(Value::Integer(n)));
    }
    token.parse::<f64>().map(|n| Some(Value::Decimal(n)))
}

fn date_literal(token: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(token, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(token, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | ',' | '&' | '|' | '"')
    })(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    loop {
        match chars.next() {
            Some((i, '"')) => return Ok((&rest[i + 1..], out)),
            Some((_, '\\')) => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            Some((_, c)) => out.push(c),
            None => break,
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

fn list_literal(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        pair(char('['), ws),
        separated_list0(tuple((ws, char(','), ws)), list_item),
        pair(ws, char(']')),
    )(input)
}

fn list_item(input: &str) -> IResult<&str, Value> {
    alt((
        map(quoted_string, Value::String),
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(Value::Integer)
        }),
    ))(input)
}

// ============================================================================
// Lexical helpers
// ============================================================================

/// Case-insensitive keyword not followed by an identifier character.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag_no_case(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

/// Optional whitespace
fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}
