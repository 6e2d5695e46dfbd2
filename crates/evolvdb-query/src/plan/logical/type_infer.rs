//! Expression type inference.
//!
//! Given the schema an expression is evaluated against, this module
//! determines the expression's output type. Plan builders use it to derive
//! the schemas of `Project` and `Aggregate` nodes.

use evolvdb_core::{DataType, Schema, Value};

use super::expr::{AggregateFunction, BinaryOp, LogicalExpr};
use crate::error::{QueryError, QueryResult};

impl LogicalExpr {
    /// Infers the output type of this expression against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownColumn`] for references that do not
    /// resolve and [`QueryError::TypeMismatch`] for arithmetic on
    /// non-numeric operands.
    pub fn data_type(&self, schema: &Schema) -> QueryResult<DataType> {
        match self {
            // A null literal has no type of its own; callers that combine it
            // with a typed operand take the other operand's type.
            Self::Literal(value) => Ok(value.data_type().unwrap_or(DataType::String)),

            Self::Column { qualifier, name } => schema
                .resolve(qualifier.as_deref(), name)
                .and_then(|i| schema.column(i))
                .map(|c| c.data_type)
                .ok_or_else(|| QueryError::UnknownColumn(self.to_string())),

            Self::BinaryOp { left, op, right } => infer_binary(left, *op, right, schema),

            Self::Not(inner) => {
                inner.data_type(schema)?;
                Ok(DataType::Boolean)
            }

            Self::AggregateFunction { func, arg } => {
                let arg_type = arg.as_ref().map(|a| a.data_type(schema)).transpose()?;
                infer_aggregate(*func, arg_type)
            }
        }
    }
}

fn is_null_literal(expr: &LogicalExpr) -> bool {
    matches!(expr, LogicalExpr::Literal(Value::Null))
}

fn infer_binary(
    left: &LogicalExpr,
    op: BinaryOp,
    right: &LogicalExpr,
    schema: &Schema,
) -> QueryResult<DataType> {
    let lt = left.data_type(schema)?;
    let rt = right.data_type(schema)?;

    if op == BinaryOp::Concat {
        return Ok(DataType::String);
    }
    if op.is_comparison() || op.is_logical() {
        return Ok(DataType::Boolean);
    }

    match (is_null_literal(left), is_null_literal(right)) {
        (true, true) => Ok(DataType::BigInt),
        (true, false) => numeric(rt),
        (false, true) => numeric(lt),
        (false, false) => {
            lt.promote(rt).ok_or_else(|| QueryError::type_mismatch("numeric", format!("{lt} {op} {rt}")))
        }
    }
}

fn numeric(ty: DataType) -> QueryResult<DataType> {
    if ty.is_numeric() {
        Ok(ty)
    } else {
        Err(QueryError::type_mismatch("numeric", ty.to_string()))
    }
}

fn infer_aggregate(func: AggregateFunction, arg: Option<DataType>) -> QueryResult<DataType> {
    match (func, arg) {
        (AggregateFunction::Count, _) => Ok(DataType::BigInt),
        (AggregateFunction::Avg, _) => Ok(DataType::Float),
        (AggregateFunction::Sum, Some(DataType::Float)) => Ok(DataType::Float),
        (AggregateFunction::Sum, _) => Ok(DataType::BigInt),
        (AggregateFunction::Min | AggregateFunction::Max, Some(ty)) => Ok(ty),
        (AggregateFunction::Min | AggregateFunction::Max, None) => {
            Err(QueryError::type_mismatch("an argument", format!("{func}(*)")))
        }
    }
}
