//! Logical plan expressions.
//!
//! This module defines the scalar expression tree shared by logical plans,
//! physical plans and the evaluator.

// Allow arithmetic method names that match std traits - we intentionally
// don't implement the traits because these return new expressions, not Self
#![allow(clippy::should_implement_trait)]

use std::collections::HashSet;
use std::fmt;

use evolvdb_core::{Schema, Value};

/// A scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalExpr {
    /// A literal value.
    Literal(Value),

    /// A column reference with optional table qualifier.
    Column {
        /// Table/alias qualifier (e.g., "u" in "u.id").
        qualifier: Option<String>,
        /// Column name.
        name: String,
    },

    /// A binary operation (arithmetic, comparison or AND/OR).
    BinaryOp {
        /// Left operand.
        left: Box<LogicalExpr>,
        /// The operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<LogicalExpr>,
    },

    /// Logical negation.
    Not(Box<LogicalExpr>),

    /// An aggregate call. `arg` is `None` for `COUNT(*)`.
    AggregateFunction {
        /// Aggregate function.
        func: AggregateFunction,
        /// The single argument.
        arg: Option<Box<LogicalExpr>>,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `||`
    Concat,
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinaryOp {
    /// Returns true for `+ - * /`.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    /// Returns true for the six comparison operators.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }

    /// Returns true for AND and OR.
    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Concat => "||",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
        };
        write!(f, "{s}")
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// COUNT(*) or COUNT(expr).
    Count,
    /// SUM(expr).
    Sum,
    /// AVG(expr).
    Avg,
    /// MIN(expr).
    Min,
    /// MAX(expr).
    Max,
}

impl AggregateFunction {
    /// Parses a function name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        };
        write!(f, "{name}")
    }
}

/// A column reference collected from an expression.
///
/// Names are lower-cased so that sets of references compare the way column
/// lookup does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    /// Lower-cased qualifier.
    pub qualifier: Option<String>,
    /// Lower-cased column name.
    pub name: String,
}

impl ColumnRef {
    /// Creates a normalized reference.
    #[must_use]
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        Self { qualifier: qualifier.map(str::to_lowercase), name: name.to_lowercase() }
    }

    /// Creates a reference to a schema column, splitting `q.col` names.
    #[must_use]
    pub fn from_column_name(name: &str) -> Self {
        match name.split_once('.') {
            Some((q, col)) if !q.is_empty() => Self::new(Some(q), col),
            _ => Self::new(None, name),
        }
    }

    /// Returns `qualifier.name`, or `name` when unqualified.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{q}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if `schema` has a column this reference can bind to.
    #[must_use]
    pub fn is_in(&self, schema: &Schema) -> bool {
        schema.contains(self.qualifier.as_deref(), &self.name)
    }

    /// Builds a column expression for this reference.
    #[must_use]
    pub fn to_expr(&self) -> LogicalExpr {
        LogicalExpr::Column { qualifier: self.qualifier.clone(), name: self.name.clone() }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl LogicalExpr {
    // ========== Constructors ==========

    /// Creates a literal from any value.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a literal boolean expression.
    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }

    /// Creates a literal integer expression.
    ///
    /// Integer literals are BIGINT; INSERT narrows them to INT columns.
    #[must_use]
    pub const fn integer(value: i64) -> Self {
        Self::Literal(Value::BigInt(value))
    }

    /// Creates a literal float expression.
    #[must_use]
    pub const fn float(value: f64) -> Self {
        Self::Literal(Value::Float(value))
    }

    /// Creates a literal string expression.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Value::String(value.into()))
    }

    /// Creates a column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column { qualifier: None, name: name.into() }
    }

    /// Creates a qualified column reference.
    #[must_use]
    pub fn qualified_column(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column { qualifier: Some(qualifier.into()), name: name.into() }
    }

    // ========== Binary Operations ==========

    fn binary(self, op: BinaryOp, other: Self) -> Self {
        Self::BinaryOp { left: Box::new(self), op, right: Box::new(other) }
    }

    /// Creates an AND expression.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Creates an OR expression.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn eq(self, other: Self) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Creates a not-equal expression.
    #[must_use]
    pub fn not_eq(self, other: Self) -> Self {
        self.binary(BinaryOp::NotEq, other)
    }

    /// Creates a less-than expression.
    #[must_use]
    pub fn lt(self, other: Self) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Creates a less-than-or-equal expression.
    #[must_use]
    pub fn lt_eq(self, other: Self) -> Self {
        self.binary(BinaryOp::LtEq, other)
    }

    /// Creates a greater-than expression.
    #[must_use]
    pub fn gt(self, other: Self) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Creates a greater-than-or-equal expression.
    #[must_use]
    pub fn gt_eq(self, other: Self) -> Self {
        self.binary(BinaryOp::GtEq, other)
    }

    /// Creates an addition expression.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    /// Creates a subtraction expression.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        self.binary(BinaryOp::Sub, other)
    }

    /// Creates a multiplication expression.
    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        self.binary(BinaryOp::Mul, other)
    }

    /// Creates a division expression.
    #[must_use]
    pub fn div(self, other: Self) -> Self {
        self.binary(BinaryOp::Div, other)
    }

    /// Creates a string concatenation expression.
    #[must_use]
    pub fn concat(self, other: Self) -> Self {
        self.binary(BinaryOp::Concat, other)
    }

    /// Creates a NOT expression.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    // ========== Aggregates ==========

    /// Creates `COUNT(*)`.
    #[must_use]
    pub const fn count_star() -> Self {
        Self::AggregateFunction { func: AggregateFunction::Count, arg: None }
    }

    /// Creates `COUNT(expr)`.
    #[must_use]
    pub fn count(expr: Self) -> Self {
        Self::aggregate(AggregateFunction::Count, expr)
    }

    /// Creates `SUM(expr)`.
    #[must_use]
    pub fn sum(expr: Self) -> Self {
        Self::aggregate(AggregateFunction::Sum, expr)
    }

    /// Creates `AVG(expr)`.
    #[must_use]
    pub fn avg(expr: Self) -> Self {
        Self::aggregate(AggregateFunction::Avg, expr)
    }

    /// Creates `MIN(expr)`.
    #[must_use]
    pub fn min(expr: Self) -> Self {
        Self::aggregate(AggregateFunction::Min, expr)
    }

    /// Creates `MAX(expr)`.
    #[must_use]
    pub fn max(expr: Self) -> Self {
        Self::aggregate(AggregateFunction::Max, expr)
    }

    /// Creates a one-argument aggregate call.
    #[must_use]
    pub fn aggregate(func: AggregateFunction, expr: Self) -> Self {
        Self::AggregateFunction { func, arg: Some(Box::new(expr)) }
    }

    // ========== Inspection ==========

    /// Returns the column name if this is a bare column reference.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Self::Column { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns true if the expression contains an aggregate call.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Self::AggregateFunction { .. } => true,
            Self::Literal(_) | Self::Column { .. } => false,
            Self::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Self::Not(inner) => inner.contains_aggregate(),
        }
    }

    /// Returns every column reference in the expression, without duplicates,
    /// in first-appearance order.
    #[must_use]
    pub fn column_refs(&self) -> Vec<ColumnRef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_column_refs(&mut seen, &mut out);
        out
    }

    fn collect_column_refs(&self, seen: &mut HashSet<ColumnRef>, out: &mut Vec<ColumnRef>) {
        match self {
            Self::Column { qualifier, name } => {
                let r = ColumnRef::new(qualifier.as_deref(), name);
                if seen.insert(r.clone()) {
                    out.push(r);
                }
            }
            Self::BinaryOp { left, right, .. } => {
                left.collect_column_refs(seen, out);
                right.collect_column_refs(seen, out);
            }
            Self::Not(inner) => inner.collect_column_refs(seen, out),
            Self::AggregateFunction { arg: Some(arg), .. } => arg.collect_column_refs(seen, out),
            Self::AggregateFunction { arg: None, .. } | Self::Literal(_) => {}
        }
    }

    /// Returns true if every column this expression references is in `schema`.
    #[must_use]
    pub fn is_bound_by(&self, schema: &Schema) -> bool {
        self.column_refs().iter().all(|r| r.is_in(schema))
    }

    /// Returns the operands if this is `column = column`.
    #[must_use]
    pub fn as_column_equality(&self) -> Option<(&Self, &Self)> {
        match self {
            Self::BinaryOp { left, op: BinaryOp::Eq, right }
                if matches!(**left, Self::Column { .. }) && matches!(**right, Self::Column { .. }) =>
            {
                Some((left, right))
            }
            _ => None,
        }
    }
}

/// Splits a predicate into its AND-conjuncts.
#[must_use]
pub fn split_conjunction(expr: &LogicalExpr) -> Vec<LogicalExpr> {
    let mut out = Vec::new();
    split_conjunction_into(expr, &mut out);
    out
}

fn split_conjunction_into(expr: &LogicalExpr, out: &mut Vec<LogicalExpr>) {
    match expr {
        LogicalExpr::BinaryOp { left, op: BinaryOp::And, right } => {
            split_conjunction_into(left, out);
            split_conjunction_into(right, out);
        }
        other => out.push(other.clone()),
    }
}

/// ANDs the conjuncts together left to right. An empty list yields `TRUE`.
#[must_use]
pub fn conjunction(conjuncts: Vec<LogicalExpr>) -> LogicalExpr {
    conjuncts.into_iter().reduce(LogicalExpr::and).unwrap_or(LogicalExpr::boolean(true))
}

/// Returns true if a relation with `schema`, whose scans answer to
/// `qualifiers` (lower-cased), provides the referenced column.
///
/// A qualified reference binds when the schema holds `q.col` verbatim, or
/// when `q` names one of the relation's scans and the column resolves.
#[must_use]
pub fn schema_contains(schema: &Schema, qualifiers: &HashSet<String>, column: &ColumnRef) -> bool {
    match &column.qualifier {
        None => schema.contains(None, &column.name),
        Some(q) => {
            schema.index_of(&column.full_name()).is_some()
                || (qualifiers.contains(q) && schema.contains(Some(q), &column.name))
        }
    }
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Column { qualifier, name } => {
                if let Some(q) = qualifier {
                    write!(f, "{q}.{name}")
                } else {
                    write!(f, "{name}")
                }
            }
            Self::BinaryOp { left, op, right } => write!(f, "({left} {op} {right})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::AggregateFunction { func, arg: Some(arg) } => write!(f, "{func}({arg})"),
            Self::AggregateFunction { func, arg: None } => write!(f, "{func}(*)"),
        }
    }
}
