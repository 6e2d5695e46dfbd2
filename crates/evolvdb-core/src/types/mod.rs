//! Value and type system.
//!
//! This module defines the values, column types, schemas and tuples that
//! every other part of the engine exchanges.

mod data_type;
mod schema;
mod tuple;
mod value;

pub use data_type::DataType;
pub use schema::{Column, Schema};
pub use tuple::Tuple;
pub use value::Value;
