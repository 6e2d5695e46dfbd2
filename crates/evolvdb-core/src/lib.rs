//! `EvolvDB` Core
//!
//! This crate provides the value and type system shared by the query engine,
//! together with the narrow interfaces through which the engine reaches its
//! collaborators.
//!
//! # Overview
//!
//! - **Values and types**: [`Value`], [`DataType`], [`Column`], [`Schema`], [`Tuple`]
//! - **Catalog**: [`Catalog`] and [`TableHandle`], with the in-memory
//!   [`MemoryCatalog`]
//! - **Statistics**: [`StatsProvider`] and [`InMemoryStatsProvider`]
//!
//! # Example
//!
//! ```
//! use evolvdb_core::{Column, DataType, Schema, Tuple, Value};
//!
//! let schema = Schema::new(vec![
//!     Column::new("id", DataType::Int),
//!     Column::new("name", DataType::Varchar(16)),
//! ]);
//!
//! let row = Tuple::checked(&schema, vec![Value::Int(1), Value::from("Alice")]).unwrap();
//! assert_eq!(row.get(0), Some(&Value::Int(1)));
//! assert_eq!(schema.index_of("NAME"), Some(1));
//! ```

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod catalog;
pub mod error;
pub mod stats;
pub mod types;

pub use catalog::{Catalog, MemoryCatalog, RecordLocator, TableHandle, TableId, TableMeta};
pub use error::{CoreError, CoreResult};
pub use stats::{ColumnStats, InMemoryStatsProvider, StatsProvider, TableStats};
pub use types::{Column, DataType, Schema, Tuple, Value};
