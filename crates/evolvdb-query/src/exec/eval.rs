//! Scalar expression evaluation.
//!
//! Expressions are evaluated against one tuple, or against the pair of
//! tuples a join is about to combine. Null operands follow three-valued
//! logic: arithmetic and comparisons with a null yield null, `AND`/`OR`
//! yield a definite result when one side decides it.

use std::cmp::Ordering;
use std::collections::HashSet;

use evolvdb_core::{Schema, Tuple, Value};

use crate::error::{QueryError, QueryResult};
use crate::plan::logical::{BinaryOp, LogicalExpr};

/// One input of an evaluation.
#[derive(Clone, Copy)]
struct Side<'a> {
    tuple: &'a Tuple,
    schema: &'a Schema,
    /// Scan names this input binds; `None` in single-tuple context.
    qualifiers: Option<&'a HashSet<String>>,
}

impl Side<'_> {
    fn owns(&self, qualifier: &str) -> bool {
        self.qualifiers.is_some_and(|qs| qs.contains(qualifier)) || self.schema.has_qualifier(qualifier)
    }

    fn value(&self, index: usize, name: &str) -> QueryResult<Value> {
        self.tuple.get(index).cloned().ok_or_else(|| QueryError::UnknownColumn(name.to_owned()))
    }
}

/// Evaluates `expr` against a single tuple.
///
/// With no scan names to go on, a qualified column binds through the
/// schema alone: any qualifier is accepted over an unqualified schema,
/// while over a join output only the qualifiers its columns carry are.
///
/// # Errors
///
/// Returns a binding error for unresolved columns or mistyped operands and
/// [`QueryError::Arithmetic`] on overflow or division by zero.
pub fn evaluate(expr: &LogicalExpr, tuple: &Tuple, schema: &Schema) -> QueryResult<Value> {
    eval(expr, &[Side { tuple, schema, qualifiers: None }])
}

/// Evaluates `expr` against one input, resolving qualified columns only
/// through the scan names that input binds.
///
/// # Errors
///
/// As [`evaluate`], plus [`QueryError::UnknownTableQualifier`] for foreign
/// qualifiers.
pub fn evaluate_bound(
    expr: &LogicalExpr,
    tuple: &Tuple,
    schema: &Schema,
    qualifiers: &HashSet<String>,
) -> QueryResult<Value> {
    eval(expr, &[Side { tuple, schema, qualifiers: Some(qualifiers) }])
}

/// Evaluates `expr` against a candidate pair of join rows.
///
/// A qualified column is looked up on the side whose qualifiers own it,
/// left first. An unqualified column must resolve on exactly one side.
///
/// # Errors
///
/// As [`evaluate`], plus [`QueryError::UnknownTableQualifier`] and
/// [`QueryError::AmbiguousColumn`].
pub fn evaluate_join(
    expr: &LogicalExpr,
    left: &Tuple,
    left_schema: &Schema,
    right: &Tuple,
    right_schema: &Schema,
    left_qualifiers: &HashSet<String>,
    right_qualifiers: &HashSet<String>,
) -> QueryResult<Value> {
    eval(
        expr,
        &[
            Side { tuple: left, schema: left_schema, qualifiers: Some(left_qualifiers) },
            Side { tuple: right, schema: right_schema, qualifiers: Some(right_qualifiers) },
        ],
    )
}

/// Returns true only for boolean `TRUE`.
#[must_use]
pub const fn is_true(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn eval(expr: &LogicalExpr, sides: &[Side<'_>]) -> QueryResult<Value> {
    match expr {
        LogicalExpr::Literal(value) => Ok(value.clone()),
        LogicalExpr::Column { qualifier, name } => resolve_column(sides, qualifier.as_deref(), name),
        LogicalExpr::BinaryOp { left, op, right } => {
            let l = eval(left, sides)?;
            let r = eval(right, sides)?;
            evaluate_binary_op(&l, *op, &r)
        }
        LogicalExpr::Not(inner) => match eval(inner, sides)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null => Ok(Value::Null),
            other => Err(QueryError::type_mismatch("BOOLEAN", other.type_name())),
        },
        LogicalExpr::AggregateFunction { .. } => {
            Err(QueryError::AggregateInScalarContext(expr.to_string()))
        }
    }
}

fn resolve_column(sides: &[Side<'_>], qualifier: Option<&str>, name: &str) -> QueryResult<Value> {
    match qualifier {
        Some(q) => {
            let q = q.to_lowercase();
            let full = format!("{q}.{name}");
            let side = match sides.iter().find(|s| s.owns(&q)) {
                Some(side) => side,
                None => match sides {
                    [only] if only.qualifiers.is_none() && !only.schema.has_qualified_columns() => only,
                    _ => return Err(QueryError::UnknownTableQualifier(q)),
                },
            };
            let index =
                side.schema.resolve(Some(&q), name).ok_or_else(|| QueryError::UnknownColumn(full.clone()))?;
            side.value(index, &full)
        }
        None => {
            let mut found = None;
            for side in sides {
                if let Some(index) = side.schema.resolve(None, name) {
                    if found.is_some() {
                        return Err(QueryError::AmbiguousColumn(name.to_owned()));
                    }
                    found = Some((side, index));
                }
            }
            let (side, index) = found.ok_or_else(|| QueryError::UnknownColumn(name.to_owned()))?;
            side.value(index, name)
        }
    }
}

fn evaluate_binary_op(left: &Value, op: BinaryOp, right: &Value) -> QueryResult<Value> {
    match op {
        BinaryOp::And => {
            let (l, r) = (logical_operand(left)?, logical_operand(right)?);
            Ok(match (l, r) {
                (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                (Some(true), Some(true)) => Value::Bool(true),
                _ => Value::Null,
            })
        }
        BinaryOp::Or => {
            let (l, r) = (logical_operand(left)?, logical_operand(right)?);
            Ok(match (l, r) {
                (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                (Some(false), Some(false)) => Value::Bool(false),
                _ => Value::Null,
            })
        }
        _ if left.is_null() || right.is_null() => Ok(Value::Null),
        BinaryOp::Concat => Ok(Value::String(format!("{left}{right}"))),
        BinaryOp::Eq => Ok(Value::Bool(compare_values(left, right)? == Ordering::Equal)),
        BinaryOp::NotEq => Ok(Value::Bool(compare_values(left, right)? != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Bool(compare_values(left, right)? == Ordering::Less)),
        BinaryOp::LtEq => Ok(Value::Bool(compare_values(left, right)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare_values(left, right)? == Ordering::Greater)),
        BinaryOp::GtEq => Ok(Value::Bool(compare_values(left, right)? != Ordering::Less)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            evaluate_arithmetic(left, op, right)
        }
    }
}

fn logical_operand(value: &Value) -> QueryResult<Option<bool>> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(QueryError::type_mismatch("BOOLEAN", other.type_name())),
    }
}

fn overflow(op: BinaryOp) -> QueryError {
    QueryError::Arithmetic(format!("integer overflow in {op}"))
}

fn evaluate_arithmetic(left: &Value, op: BinaryOp, right: &Value) -> QueryResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                _ if *b == 0 => return Err(QueryError::Arithmetic("division by zero".into())),
                _ => a.checked_div(*b),
            };
            result.map(Value::Int).ok_or_else(|| overflow(op))
        }
        (Value::Float(_), _) | (_, Value::Float(_)) => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(numeric_mismatch(left, right));
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Err(QueryError::Arithmetic("division by zero".into())),
                _ => a / b,
            };
            Ok(Value::Float(result))
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) else {
                return Err(numeric_mismatch(left, right));
            };
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                _ if b == 0 => return Err(QueryError::Arithmetic("division by zero".into())),
                _ => a.checked_div(b),
            };
            result.map(Value::BigInt).ok_or_else(|| overflow(op))
        }
    }
}

fn numeric_mismatch(left: &Value, right: &Value) -> QueryError {
    let actual = if left.is_numeric() { right.type_name() } else { left.type_name() };
    QueryError::type_mismatch("numeric", actual)
}

/// Compares two non-null values after numeric promotion.
///
/// # Errors
///
/// Returns [`QueryError::TypeMismatch`] when the values are not comparable,
/// such as a number against a string, or when either is null.
pub fn compare_values(left: &Value, right: &Value) -> QueryResult<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
        (Value::Float(f), other) if other.is_numeric() => match other.as_i64() {
            Some(i) => Ok(compare_integer_float(i, *f).reverse()),
            None => Err(QueryError::type_mismatch(left.type_name(), right.type_name())),
        },
        (other, Value::Float(f)) if other.is_numeric() => match other.as_i64() {
            Some(i) => Ok(compare_integer_float(i, *f)),
            None => Err(QueryError::type_mismatch(left.type_name(), right.type_name())),
        },
        _ => match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => Err(QueryError::type_mismatch(left.type_name(), right.type_name())),
        },
    }
}

/// Compares an integer with a float without rounding the integer, so
/// `2^53 + 1` stays greater than `2^53` as a float.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn compare_integer_float(i: i64, f: f64) -> Ordering {
    // [-2^63, 2^63) is exactly the set of floats whose integral part fits i64.
    if f.is_nan() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return (i as f64).total_cmp(&f);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if f > whole => Ordering::Less,
        Ordering::Equal if f < whole => Ordering::Greater,
        ordering => ordering,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::BigInt(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
    }
}

/// A total order over values, used for sorting.
///
/// Nulls sort first, then booleans, numbers (compared after promotion) and
/// strings. Values of one kind compare as [`compare_values`] does.
#[must_use]
pub fn order_values(left: &Value, right: &Value) -> Ordering {
    compare_values(left, right).unwrap_or_else(|_| type_rank(left).cmp(&type_rank(right)))
}

#[cfg(test)]
mod tests {
    use evolvdb_core::{Column, DataType};

    use super::*;
    use crate::exec::key::join_key;

    fn users() -> (Schema, Tuple) {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::String),
        ]);
        (schema, Tuple::new(vec![Value::Int(1), Value::from("Alice")]))
    }

    fn orders() -> (Schema, Tuple) {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("user_id", DataType::Int),
            Column::new("amount", DataType::BigInt),
        ]);
        (schema, Tuple::new(vec![Value::Int(10), Value::Int(1), Value::BigInt(250)]))
    }

    fn quals(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    fn join_eval(expr: &LogicalExpr) -> QueryResult<Value> {
        let (ls, lt) = users();
        let (rs, rt) = orders();
        evaluate_join(expr, &lt, &ls, &rt, &rs, &quals(&["u"]), &quals(&["o"]))
    }

    #[test]
    fn single_tuple_columns() {
        let (schema, tuple) = users();
        assert_eq!(evaluate(&LogicalExpr::column("NAME"), &tuple, &schema).unwrap(), Value::from("Alice"));
        assert_eq!(
            evaluate(&LogicalExpr::qualified_column("u", "id"), &tuple, &schema).unwrap(),
            Value::Int(1)
        );
        assert!(matches!(
            evaluate(&LogicalExpr::column("email"), &tuple, &schema),
            Err(QueryError::UnknownColumn(_))
        ));
    }

    #[test]
    fn join_columns_resolve_by_qualifier() {
        let cond = LogicalExpr::qualified_column("u", "id").eq(LogicalExpr::qualified_column("o", "user_id"));
        assert_eq!(join_eval(&cond).unwrap(), Value::Bool(true));
        assert_eq!(join_eval(&LogicalExpr::qualified_column("o", "id")).unwrap(), Value::Int(10));
        assert_eq!(join_eval(&LogicalExpr::column("amount")).unwrap(), Value::BigInt(250));
    }

    #[test]
    fn join_resolution_errors() {
        assert!(matches!(
            join_eval(&LogicalExpr::column("id")),
            Err(QueryError::AmbiguousColumn(_))
        ));
        assert!(matches!(
            join_eval(&LogicalExpr::qualified_column("x", "id")),
            Err(QueryError::UnknownTableQualifier(_))
        ));
        assert!(matches!(
            join_eval(&LogicalExpr::qualified_column("u", "amount")),
            Err(QueryError::UnknownColumn(_))
        ));
    }

    #[test]
    fn bound_keys_reject_foreign_qualifiers() {
        let (schema, tuple) = orders();
        let key = LogicalExpr::qualified_column("u", "id");
        assert!(matches!(
            evaluate_bound(&key, &tuple, &schema, &quals(&["o"])),
            Err(QueryError::UnknownTableQualifier(_))
        ));
    }

    #[test]
    fn joined_schema_rejects_foreign_qualifiers() {
        let (users, tuple) = users();
        let (orders, right) = orders();
        let schema = users.join(&orders, "o");
        let row = tuple.concat(&right);

        // `name` exists only on the left, so `o.name` must not find it.
        assert!(matches!(
            evaluate(&LogicalExpr::qualified_column("o", "name"), &row, &schema),
            Err(QueryError::UnknownColumn(_))
        ));
        assert!(matches!(
            evaluate(&LogicalExpr::qualified_column("zz", "id"), &row, &schema),
            Err(QueryError::UnknownTableQualifier(_))
        ));
        assert_eq!(
            evaluate(&LogicalExpr::qualified_column("o", "id"), &row, &schema).unwrap(),
            Value::Int(10)
        );

        let bound = quals(&["u", "o"]);
        let eval = |e: LogicalExpr| evaluate_bound(&e, &row, &schema, &bound);
        assert_eq!(eval(LogicalExpr::qualified_column("u", "name")).unwrap(), Value::from("Alice"));
        assert_eq!(eval(LogicalExpr::qualified_column("u", "id")).unwrap(), Value::Int(1));
        assert!(matches!(eval(LogicalExpr::qualified_column("o", "name")), Err(QueryError::UnknownColumn(_))));
        assert!(matches!(
            eval(LogicalExpr::qualified_column("zz", "id")),
            Err(QueryError::UnknownTableQualifier(_))
        ));
    }

    #[test]
    fn arithmetic_promotion() {
        let (schema, tuple) = orders();
        let eval = |e: LogicalExpr| evaluate(&e, &tuple, &schema).unwrap();

        assert_eq!(eval(LogicalExpr::column("id").add(LogicalExpr::column("user_id"))), Value::Int(11));
        assert_eq!(eval(LogicalExpr::column("id").add(LogicalExpr::column("amount"))), Value::BigInt(260));
        assert_eq!(eval(LogicalExpr::column("id").mul(LogicalExpr::float(0.5))), Value::Float(5.0));
        assert_eq!(eval(LogicalExpr::column("id").div(LogicalExpr::literal(3i32))), Value::Int(3));
    }

    #[test]
    fn arithmetic_errors() {
        let (schema, tuple) = orders();
        let div_zero = LogicalExpr::column("id").div(LogicalExpr::literal(0i32));
        assert!(matches!(evaluate(&div_zero, &tuple, &schema), Err(QueryError::Arithmetic(_))));

        let overflow = LogicalExpr::literal(i32::MAX).add(LogicalExpr::literal(1i32));
        assert!(matches!(evaluate(&overflow, &tuple, &schema), Err(QueryError::Arithmetic(_))));

        let mismatch = LogicalExpr::column("id").add(LogicalExpr::string("x"));
        assert!(matches!(evaluate(&mismatch, &tuple, &schema), Err(QueryError::TypeMismatch { .. })));
    }

    #[test]
    fn concat_uses_display_forms() {
        let (schema, tuple) = users();
        let expr = LogicalExpr::column("name").concat(LogicalExpr::column("id"));
        assert_eq!(evaluate(&expr, &tuple, &schema).unwrap(), Value::from("Alice1"));
    }

    #[test]
    fn comparisons() {
        assert_eq!(compare_values(&Value::Int(2), &Value::BigInt(2)).unwrap(), Ordering::Equal);
        assert_eq!(compare_values(&Value::Int(2), &Value::Float(2.5)).unwrap(), Ordering::Less);
        assert_eq!(compare_values(&Value::from("b"), &Value::from("a")).unwrap(), Ordering::Greater);
        assert!(compare_values(&Value::Int(1), &Value::from("1")).is_err());
    }

    #[test]
    fn large_integers_compare_exactly_against_floats() {
        let two_53 = 1_i64 << 53;
        let rounded = Value::Float(9_007_199_254_740_992.0);
        assert_eq!(compare_values(&Value::BigInt(two_53), &rounded).unwrap(), Ordering::Equal);
        assert_eq!(compare_values(&Value::BigInt(two_53 + 1), &rounded).unwrap(), Ordering::Greater);
        assert_eq!(compare_values(&rounded, &Value::BigInt(two_53 + 1)).unwrap(), Ordering::Less);
        assert_eq!(compare_values(&Value::Int(-3), &Value::Float(-2.5)).unwrap(), Ordering::Less);
        assert_eq!(compare_values(&Value::BigInt(i64::MAX), &Value::Float(1e19)).unwrap(), Ordering::Less);

        // Hash keys agree with the comparison.
        assert_eq!(join_key(&Value::BigInt(two_53)), join_key(&rounded));
        assert_ne!(join_key(&Value::BigInt(two_53 + 1)), join_key(&rounded));
    }

    #[test]
    fn three_valued_logic() {
        let (schema, tuple) = users();
        let null = || LogicalExpr::literal(Value::Null);
        let eval = |e: LogicalExpr| evaluate(&e, &tuple, &schema).unwrap();

        assert_eq!(eval(null().and(LogicalExpr::boolean(false))), Value::Bool(false));
        assert_eq!(eval(null().and(LogicalExpr::boolean(true))), Value::Null);
        assert_eq!(eval(null().or(LogicalExpr::boolean(true))), Value::Bool(true));
        assert_eq!(eval(null().not()), Value::Null);
        assert_eq!(eval(null().eq(LogicalExpr::integer(1))), Value::Null);
        assert!(!is_true(&Value::Null));
    }

    #[test]
    fn logical_operators_require_booleans() {
        let (schema, tuple) = users();
        let expr = LogicalExpr::column("id").and(LogicalExpr::boolean(true));
        assert!(matches!(evaluate(&expr, &tuple, &schema), Err(QueryError::TypeMismatch { .. })));
        let expr = LogicalExpr::column("name").not();
        assert!(matches!(evaluate(&expr, &tuple, &schema), Err(QueryError::TypeMismatch { .. })));
    }

    #[test]
    fn aggregates_are_rejected() {
        let (schema, tuple) = users();
        let err = evaluate(&LogicalExpr::count_star(), &tuple, &schema).unwrap_err();
        assert!(matches!(err, QueryError::AggregateInScalarContext(_)));
    }

    #[test]
    fn total_order() {
        let mut values =
            vec![Value::from("a"), Value::Int(3), Value::Null, Value::Float(1.5), Value::Bool(true)];
        values.sort_by(order_values);
        assert_eq!(
            values,
            vec![Value::Null, Value::Bool(true), Value::Float(1.5), Value::Int(3), Value::from("a")]
        );
    }
}
