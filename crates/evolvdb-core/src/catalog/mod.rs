//! Catalog and table-handle interfaces.
//!
//! The query engine reaches storage only through these traits:
//!
//! - [`Catalog`] maps table names to metadata and opens [`TableHandle`]s
//! - [`TableHandle`] inserts tuples and produces restartable scans
//!
//! [`MemoryCatalog`] is a thread-safe, heap-backed implementation used by
//! tests, benchmarks and embedders that do not need persistence.
//!
//! # Example
//!
//! ```
//! use evolvdb_core::catalog::{Catalog, MemoryCatalog};
//! use evolvdb_core::{Column, DataType, Schema, Tuple, Value};
//!
//! let catalog = MemoryCatalog::new();
//! let schema = Schema::new(vec![Column::new("id", DataType::Int)]);
//! catalog.create_table("t", schema).unwrap();
//!
//! let table = catalog.open_table("t").unwrap();
//! table.insert(Tuple::new(vec![Value::Int(1)])).unwrap();
//! assert_eq!(table.scan().unwrap().count(), 1);
//! ```

mod memory;

use std::fmt;
use std::sync::Arc;

use crate::error::CoreResult;
use crate::types::{Schema, Tuple};

pub use memory::{MemoryCatalog, MemoryTable};

/// Identifier assigned to a table by its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    /// Creates a table ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Location of a stored record, returned by [`TableHandle::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordLocator {
    /// Owning table.
    pub table: TableId,
    /// Slot within the table.
    pub slot: u64,
}

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Table identifier.
    pub id: TableId,
    /// Table name as created.
    pub name: String,
    /// Table schema.
    pub schema: Arc<Schema>,
}

/// A lazy, single-pass sequence of stored tuples.
pub type TupleCursor = Box<dyn Iterator<Item = CoreResult<Tuple>> + Send>;

/// Read/write access to one table.
pub trait TableHandle: Send + Sync {
    /// Returns the table metadata.
    fn meta(&self) -> &TableMeta;

    /// Stores a tuple and returns where it was placed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn insert(&self, tuple: Tuple) -> CoreResult<RecordLocator>;

    /// Starts a new scan over the live tuples.
    ///
    /// Every call returns a fresh cursor positioned at the first tuple.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the scan cannot be started.
    fn scan(&self) -> CoreResult<TupleCursor>;
}

/// Name-to-table mapping.
pub trait Catalog: Send + Sync {
    /// Looks up table metadata by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`](crate::CoreError::TableNotFound)
    /// for unknown names.
    fn lookup_table(&self, name: &str) -> CoreResult<TableMeta>;

    /// Opens a handle to the named table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableNotFound`](crate::CoreError::TableNotFound)
    /// for unknown names.
    fn open_table(&self, name: &str) -> CoreResult<Arc<dyn TableHandle>>;
}
