//! The predicate tree.
//!
//! An [`Expression`] is either a [`Condition`] leaf or a [`Compound`] node that
//! interleaves its children with AND/OR operators:
//!
//! ```text
//! children:   c0      c1      c2      c3
//! operators:      &&      ||      &&
//! ```
//!
//! There is never an operator before the first child or after the last one.
//! Within a compound, AND binds tighter than OR, so the example reads
//! `(c0 && c1) || (c2 && c3)`.

use std::sync::Arc;

use crate::ast::{Condition, LogicalOperator, Operator, Side, Subject, Value};
use crate::error::{ExprError, ExprResult};

/// A boolean predicate tree.
///
/// # Examples
///
/// ```rust
/// use query_expr::{Expression, Operator};
///
/// let expr = Expression::new("firstName", Operator::Equal, "John")
///     .and(Expression::new("age", Operator::Gt, 23));
///
/// assert!(expr.is_compound());
/// assert_eq!(expr.len(), 2);
/// assert_eq!(expr.to_string(), r#"(([firstName] == "John") && ([age] > 23))"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expression {
    /// An atomic condition.
    Simple(Condition),
    /// A boolean combination of sub-expressions.
    Compound(Compound),
}

/// Interior node: children joined by logical operators.
///
/// Invariant: `operators.len() == children.len() - 1` for a non-empty node.
///
/// Cloning and dropping walk the subtree with an explicit stack, so trees of
/// any depth can be copied and released.
#[derive(Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Compound {
    children: Vec<Expression>,
    operators: Vec<LogicalOperator>,
    complement: bool,
}

/// Token produced by [`Expression::prefix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrefixToken<'a> {
    /// A binary logical operator applying to the next two operands.
    Operator(LogicalOperator),
    /// Negation of the next operand.
    Not,
    /// A leaf condition.
    Leaf(&'a Condition),
}

impl Compound {
    /// Creates an empty compound shell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the children in order.
    pub fn children(&self) -> &[Expression] {
        &self.children
    }

    /// Returns the operators between consecutive children.
    pub fn operators(&self) -> &[LogicalOperator] {
        &self.operators
    }

    /// Returns true if the node is negated.
    pub fn is_complement(&self) -> bool {
        self.complement
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Appends a child at the tail. The operator is ignored for the first child.
    pub fn push(&mut self, operator: LogicalOperator, child: Expression) {
        if !self.children.is_empty() {
            self.operators.push(operator);
        }
        self.children.push(child);
    }

    /// Operator between child `index` and its predecessor.
    pub fn left_of(&self, index: usize) -> Option<LogicalOperator> {
        index
            .checked_sub(1)
            .and_then(|i| self.operators.get(i).copied())
    }

    /// Operator between child `index` and its successor.
    pub fn right_of(&self, index: usize) -> Option<LogicalOperator> {
        self.operators.get(index).copied()
    }

    /// Splits the children into maximal AND-runs, i.e. at every OR.
    pub fn or_groups(&self) -> Vec<&[Expression]> {
        if self.children.is_empty() {
            return Vec::new();
        }
        let mut groups = Vec::new();
        let mut start = 0;
        for (i, op) in self.operators.iter().enumerate() {
            if *op == LogicalOperator::Or {
                groups.push(&self.children[start..=i]);
                start = i + 1;
            }
        }
        groups.push(&self.children[start..]);
        groups
    }

    /// Decomposes the node into `(children, operators, complement)`.
    pub fn into_parts(mut self) -> (Vec<Expression>, Vec<LogicalOperator>, bool) {
        (
            std::mem::take(&mut self.children),
            std::mem::take(&mut self.operators),
            self.complement,
        )
    }

    fn shell_of(&self) -> Self {
        Compound {
            children: Vec::with_capacity(self.children.len()),
            operators: self.operators.clone(),
            complement: self.complement,
        }
    }
}

impl Clone for Compound {
    fn clone(&self) -> Self {
        struct Frame<'a> {
            source: &'a Compound,
            next: usize,
            copy: Compound,
        }

        let mut frames = vec![Frame {
            source: self,
            next: 0,
            copy: self.shell_of(),
        }];
        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let source = frame.source;
            let index = frame.next;

            if index == source.children.len() {
                let Some(done) = frames.pop() else {
                    break;
                };
                match frames.last_mut() {
                    Some(parent) => parent.copy.children.push(Expression::Compound(done.copy)),
                    None => return done.copy,
                }
                continue;
            }

            frame.next += 1;
            match &source.children[index] {
                Expression::Simple(c) => frame.copy.children.push(Expression::Simple(c.clone())),
                Expression::Compound(c) => frames.push(Frame {
                    source: c,
                    next: 0,
                    copy: c.shell_of(),
                }),
            }
        }
        Compound::new()
    }
}

impl Drop for Compound {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Expression::Compound(mut c) = child {
                pending.append(&mut c.children);
            }
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Expression::Compound(Compound::default())
    }
}

impl From<Condition> for Expression {
    fn from(condition: Condition) -> Self {
        Expression::Simple(condition)
    }
}

impl From<Compound> for Expression {
    fn from(compound: Compound) -> Self {
        Expression::Compound(compound)
    }
}

impl std::ops::Not for Expression {
    type Output = Expression;

    fn not(mut self) -> Self::Output {
        self.complement();
        self
    }
}

impl Expression {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Creates a simple expression `subject operator value`.
    pub fn new(subject: impl Into<Subject>, operator: Operator, value: impl Into<Value>) -> Self {
        Expression::Simple(Condition::new(subject, operator, Some(value.into())))
    }

    /// Creates a simple expression with an absent value (an existence check).
    pub fn null_check(subject: impl Into<Subject>, operator: Operator) -> Self {
        Expression::Simple(Condition::new(subject, operator, None))
    }

    /// Creates an empty compound shell.
    pub fn empty() -> Self {
        Expression::default()
    }

    /// Builds a compound joining every item with AND.
    pub fn and_all(items: impl IntoIterator<Item = Expression>) -> Self {
        Self::join_all(LogicalOperator::And, items)
    }

    /// Builds a compound joining every item with OR.
    pub fn or_all(items: impl IntoIterator<Item = Expression>) -> Self {
        Self::join_all(LogicalOperator::Or, items)
    }

    fn join_all(operator: LogicalOperator, items: impl IntoIterator<Item = Expression>) -> Self {
        let mut compound = Compound::new();
        for item in items {
            compound.push(operator, item);
        }
        Expression::Compound(compound)
    }

    /// Appends `other` with AND, promoting a simple expression first.
    pub fn and(mut self, other: impl Into<Expression>) -> Self {
        self.push(LogicalOperator::And, other.into());
        self
    }

    /// Appends `other` with OR, promoting a simple expression first.
    pub fn or(mut self, other: impl Into<Expression>) -> Self {
        self.push(LogicalOperator::Or, other.into());
        self
    }

    /// Appends `child` at the tail joined by `operator`.
    ///
    /// A simple or negated node is promoted first so the negation keeps
    /// applying to the original content only.
    pub fn push(&mut self, operator: LogicalOperator, child: Expression) {
        let needs_promotion = match self {
            Expression::Simple(_) => true,
            Expression::Compound(c) => c.complement && !c.children.is_empty(),
        };
        if needs_promotion {
            self.compound();
        }
        if let Expression::Compound(c) = self {
            c.push(operator, child);
        }
    }

    /// Inserts `child` at `index`.
    ///
    /// At index 0 the result is `[child, operator, existing...]`; past the end
    /// it is `[...existing, operator, child]`; in the middle the operator is
    /// spliced immediately left of the new child. A leaf is promoted first, so
    /// it counts as child 0.
    pub fn insert(&mut self, index: usize, operator: LogicalOperator, child: Expression) {
        if self.is_simple() {
            self.compound();
        }
        if index >= self.len() {
            self.push(operator, child);
            return;
        }
        if self.is_complement() {
            self.compound();
            self.insert(index.min(1), operator, child);
            return;
        }
        if let Expression::Compound(c) = self {
            c.children.insert(index, child);
            if index == 0 {
                c.operators.insert(0, operator);
            } else {
                c.operators.insert(index - 1, operator);
            }
        }
    }

    /// Promotes the node: its current state becomes the single child of a
    /// fresh, non-negated compound. An empty compound is left unchanged.
    pub fn compound(&mut self) {
        if let Expression::Compound(c) = self {
            if c.children.is_empty() {
                return;
            }
        }
        let current = std::mem::take(self);
        let mut shell = Compound::new();
        shell.children.push(current);
        *self = Expression::Compound(shell);
    }

    /// Resets the node to an empty compound shell.
    pub fn clear(&mut self) {
        *self = Expression::empty();
    }

    // =========================================================================
    // Structural queries
    // =========================================================================

    /// Returns true if the node has at least one child.
    pub fn is_compound(&self) -> bool {
        matches!(self, Expression::Compound(c) if !c.children.is_empty())
    }

    /// Returns true if the node is a leaf condition.
    pub fn is_simple(&self) -> bool {
        matches!(self, Expression::Simple(_))
    }

    /// Returns true if the node is negated.
    pub fn is_complement(&self) -> bool {
        match self {
            Expression::Simple(c) => c.complement,
            Expression::Compound(c) => c.complement,
        }
    }

    /// Number of direct sub-expressions (0 for a leaf).
    pub fn len(&self) -> usize {
        match self {
            Expression::Simple(_) => 0,
            Expression::Compound(c) => c.children.len(),
        }
    }

    /// Returns true if the node has no sub-expressions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the leaf condition, if this is a simple expression.
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Expression::Simple(c) => Some(c),
            Expression::Compound(_) => None,
        }
    }

    /// Returns the compound node, if this is one.
    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Expression::Simple(_) => None,
            Expression::Compound(c) => Some(c),
        }
    }

    /// Subject of a leaf.
    pub fn subject(&self) -> Option<&Subject> {
        self.as_condition().map(|c| &c.subject)
    }

    /// Comparison operator of a leaf.
    pub fn comparison(&self) -> Option<Operator> {
        self.as_condition().map(|c| c.operator)
    }

    /// Comparison operand of a leaf.
    pub fn value(&self) -> Option<&Value> {
        self.as_condition().and_then(|c| c.value())
    }

    /// Children of a compound (empty for a leaf).
    pub fn children(&self) -> &[Expression] {
        match self {
            Expression::Simple(_) => &[],
            Expression::Compound(c) => &c.children,
        }
    }

    /// Returns the sub-expression at `index`.
    pub fn sub_expression(&self, index: usize) -> ExprResult<&Expression> {
        let len = self.len();
        self.children()
            .get(index)
            .ok_or(ExprError::IndexOutOfBounds { index, len })
    }

    /// Returns the sub-expression at `index` mutably.
    pub fn sub_expression_mut(&mut self, index: usize) -> ExprResult<&mut Expression> {
        let len = self.len();
        match self {
            Expression::Compound(c) if index < len => Ok(&mut c.children[index]),
            _ => Err(ExprError::IndexOutOfBounds { index, len }),
        }
    }

    /// Returns the operator on the given side of child `index`.
    ///
    /// `Ok(None)` is returned left of the first child and right of the last.
    pub fn operator(&self, index: usize, side: Side) -> ExprResult<Option<LogicalOperator>> {
        let compound = match self {
            Expression::Compound(c) if index < c.children.len() => c,
            _ => {
                return Err(ExprError::IndexOutOfBounds {
                    index,
                    len: self.len(),
                })
            }
        };
        Ok(match side {
            Side::Left => compound.left_of(index),
            Side::Right => compound.right_of(index),
        })
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes and returns the sub-expression at `index`.
    ///
    /// Child 0 goes with the operator on its right, any other child with the
    /// operator on its left. A node left with a single child collapses into
    /// that child.
    pub fn remove_sub_expression(&mut self, index: usize) -> ExprResult<Expression> {
        let len = self.len();
        let compound = match self {
            Expression::Compound(c) if index < len => c,
            _ => return Err(ExprError::IndexOutOfBounds { index, len }),
        };
        let removed = compound.children.remove(index);
        if !compound.operators.is_empty() {
            compound.operators.remove(index.saturating_sub(1));
        }
        if compound.children.len() == 1 {
            let complement = compound.complement;
            let mut only = compound.children.remove(0);
            if complement {
                only.complement();
            }
            *self = only;
        }
        Ok(removed)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Returns the first leaf (depth-first, left to right) whose subject is `name`.
    pub fn find(&self, name: &str) -> Option<&Expression> {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expression::Simple(c) if c.subject.name == name => return Some(expr),
                Expression::Simple(_) => {}
                Expression::Compound(c) => stack.extend(c.children.iter().rev()),
            }
        }
        None
    }

    /// Collects every leaf condition, depth-first, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expression::Simple(c) => out.push(c),
                Expression::Compound(c) => stack.extend(c.children.iter().rev()),
            }
        }
        out
    }

    // =========================================================================
    // Negation
    // =========================================================================

    /// Toggles the negation flag.
    pub fn complement(&mut self) {
        match self {
            Expression::Simple(c) => c.complement = !c.complement,
            Expression::Compound(c) => c.complement = !c.complement,
        }
    }

    /// Negates the node by rewriting it with De Morgan's laws.
    ///
    /// Operators are dualized and every leaf negated, so the result carries no
    /// negation flag on any rewritten compound:
    /// `!(A && B && C || D)` becomes `(!A || !B || !C) && !D`.
    /// A leaf, an empty node or an already negated compound only has its flag
    /// toggled.
    pub fn distribute_complement(&mut self) {
        let rewritten = match self {
            Expression::Compound(c) if !c.complement && !c.children.is_empty() => {
                de_morgan(c)
            }
            _ => {
                self.complement();
                return;
            }
        };
        *self = rewritten;
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Visits the tree in binary prefix notation.
    ///
    /// Each compound is split into OR-separated minterms: `minterms - 1` OR
    /// tokens are emitted, then per minterm `terms - 1` AND tokens followed by
    /// its terms. AND therefore binds tighter than OR regardless of the
    /// original nesting.
    pub fn prefix<'a>(&'a self, mut visit: impl FnMut(PrefixToken<'a>)) {
        enum Work<'a> {
            Node(&'a Expression),
            Token(PrefixToken<'a>),
        }

        let mut stack = vec![Work::Node(self)];
        while let Some(work) = stack.pop() {
            let compound = match work {
                Work::Token(token) => {
                    visit(token);
                    continue;
                }
                Work::Node(Expression::Simple(c)) => {
                    visit(PrefixToken::Leaf(c));
                    continue;
                }
                Work::Node(Expression::Compound(c)) => c,
            };
            let groups = compound.or_groups();
            if groups.is_empty() {
                continue;
            }
            let mut items = Vec::new();
            if compound.complement {
                items.push(Work::Token(PrefixToken::Not));
            }
            for _ in 1..groups.len() {
                items.push(Work::Token(PrefixToken::Operator(LogicalOperator::Or)));
            }
            for group in groups {
                for _ in 1..group.len() {
                    items.push(Work::Token(PrefixToken::Operator(LogicalOperator::And)));
                }
                items.extend(group.iter().map(Work::Node));
            }
            stack.extend(items.into_iter().rev());
        }
    }

    /// Returns true if every leaf shares its value payload with `other`'s
    /// corresponding leaf. Used to observe that clones do not copy values.
    pub fn shares_values_with(&self, other: &Expression) -> bool {
        let left = self.conditions();
        let right = other.conditions();
        left.len() == right.len()
            && left.iter().zip(right.iter()).all(|(a, b)| match (&a.value, &b.value) {
                (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                (None, None) => true,
                _ => false,
            })
    }
}

// =============================================================================
// De Morgan rewriting
// =============================================================================

/// Output under construction for one compound being negated.
#[derive(Default)]
struct Accumulator {
    /// AND-joined negated terms.
    terms: Compound,
    /// OR-group collecting the negation of the current AND-run.
    group: Option<Compound>,
}

impl Accumulator {
    /// Places a negated child according to the operators around the original.
    fn place(&mut self, negated: Expression, left: Option<LogicalOperator>, right: Option<LogicalOperator>) {
        let and_left = left == Some(LogicalOperator::And);
        let and_right = right == Some(LogicalOperator::And);
        if and_left {
            if let Some(group) = self.group.as_mut() {
                group.push(LogicalOperator::Or, negated);
                if !and_right {
                    if let Some(done) = self.group.take() {
                        self.terms.push(LogicalOperator::And, Expression::Compound(done));
                    }
                }
                return;
            }
        }
        if and_right {
            let mut group = Compound::new();
            group.push(LogicalOperator::Or, negated);
            self.group = Some(group);
        } else {
            self.terms.push(LogicalOperator::And, negated);
        }
    }

    fn finish(mut self) -> Expression {
        if let Some(open) = self.group.take() {
            self.terms.push(LogicalOperator::And, Expression::Compound(open));
        }
        if self.terms.children.len() == 1 {
            return self.terms.children.remove(0);
        }
        Expression::Compound(self.terms)
    }
}

/// Iterative De Morgan negation of a non-empty, non-negated compound.
fn de_morgan(root: &Compound) -> Expression {
    struct Frame<'a> {
        node: &'a Compound,
        next: usize,
    }

    let mut frames = vec![Frame { node: root, next: 0 }];
    let mut accumulators = vec![Accumulator::default()];

    loop {
        let Some(frame) = frames.last_mut() else {
            break;
        };

        if frame.next == frame.node.children.len() {
            frames.pop();
            let value = accumulators
                .pop()
                .map(Accumulator::finish)
                .unwrap_or_default();
            match frames.last() {
                None => return value,
                Some(parent) => {
                    let index = parent.next - 1;
                    let (left, right) = (parent.node.left_of(index), parent.node.right_of(index));
                    if let Some(acc) = accumulators.last_mut() {
                        acc.place(value, left, right);
                    }
                }
            }
            continue;
        }

        let node = frame.node;
        let index = frame.next;
        frame.next += 1;

        let negated = match &node.children[index] {
            Expression::Compound(c) if !c.complement && !c.children.is_empty() => {
                frames.push(Frame { node: c, next: 0 });
                accumulators.push(Accumulator::default());
                continue;
            }
            other => !other.clone(),
        };
        if let Some(acc) = accumulators.last_mut() {
            acc.place(negated, node.left_of(index), node.right_of(index));
        }
    }

    Expression::empty()
}
