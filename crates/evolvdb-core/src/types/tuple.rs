//! Tuples.

use serde::{Deserialize, Serialize};

use super::{Column, DataType, Schema, Value};
use crate::error::{CoreError, CoreResult};

/// An ordered list of values.
///
/// A tuple does not carry its schema; operators expose the schema of the
/// tuples they produce. Use [`Tuple::checked`] to validate values against a
/// table schema before storing them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    /// Creates a tuple without validation.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Creates a tuple after checking arity, types and VARCHAR lengths.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on an arity mismatch or overlong
    /// VARCHAR and [`CoreError::TypeMismatch`] when a value does not fit its
    /// column.
    pub fn checked(schema: &Schema, values: Vec<Value>) -> CoreResult<Self> {
        if values.len() != schema.len() {
            return Err(CoreError::Validation(format!(
                "tuple has {} values but schema has {} columns",
                values.len(),
                schema.len()
            )));
        }
        for (col, value) in schema.columns().iter().zip(&values) {
            check_value(col, value)?;
        }
        Ok(Self { values })
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the tuple has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Concatenates two tuples (join output).
    #[must_use]
    pub fn concat(&self, other: &Tuple) -> Self {
        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Self { values }
    }

    /// Creates a tuple of `len` nulls (outer join padding).
    #[must_use]
    pub fn nulls(len: usize) -> Self {
        Self { values: vec![Value::Null; len] }
    }

    /// Consumes the tuple and returns its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

fn check_value(col: &Column, value: &Value) -> CoreResult<()> {
    let ok = match (col.data_type, value) {
        (_, Value::Null) => {
            return Err(CoreError::Validation(format!("column {} does not accept NULL", col.name)))
        }
        (DataType::Int, Value::Int(_))
        | (DataType::BigInt, Value::BigInt(_))
        | (DataType::Boolean, Value::Bool(_))
        | (DataType::Float, Value::Float(_))
        | (DataType::String, Value::String(_)) => true,
        (DataType::Varchar(max), Value::String(s)) => {
            let len = s.chars().count();
            if len > max as usize {
                return Err(CoreError::Validation(format!(
                    "value for {} exceeds VARCHAR({max})",
                    col.name
                )));
            }
            true
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(CoreError::type_mismatch_with_value(col.data_type.to_string(), value.type_name(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::Varchar(5)),
        ])
    }

    #[test]
    fn checked_accepts_matching_values() {
        let t = Tuple::checked(&schema(), vec![Value::Int(1), Value::from("Bob")]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1), Some(&Value::from("Bob")));
    }

    #[test]
    fn checked_rejects_wrong_type() {
        let err = Tuple::checked(&schema(), vec![Value::BigInt(1), Value::from("Bob")]).unwrap_err();
        assert!(err.to_string().contains("expected INT"));
    }

    #[test]
    fn checked_rejects_long_varchar() {
        let err =
            Tuple::checked(&schema(), vec![Value::Int(1), Value::from("Bartholomew")]).unwrap_err();
        assert!(err.to_string().contains("VARCHAR(5)"));
    }

    #[test]
    fn checked_rejects_arity_and_nulls() {
        assert!(Tuple::checked(&schema(), vec![Value::Int(1)]).is_err());
        assert!(Tuple::checked(&schema(), vec![Value::Int(1), Value::Null]).is_err());
    }

    #[test]
    fn concat_and_padding() {
        let left = Tuple::new(vec![Value::Int(1)]);
        let joined = left.concat(&Tuple::nulls(2));
        assert_eq!(joined.values(), &[Value::Int(1), Value::Null, Value::Null]);
    }
}
