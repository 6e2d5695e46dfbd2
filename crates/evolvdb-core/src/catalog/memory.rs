//! Heap-backed catalog and tables.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Catalog, RecordLocator, TableHandle, TableId, TableMeta, TupleCursor};
use crate::error::{CoreError, CoreResult};
use crate::types::{Schema, Tuple};

fn poisoned() -> CoreError {
    CoreError::Storage("lock poisoned".into())
}

/// An in-memory table.
///
/// Scans iterate over a snapshot taken when the scan starts, so inserts made
/// while a cursor is open are not observed by that cursor.
#[derive(Debug)]
pub struct MemoryTable {
    meta: TableMeta,
    rows: RwLock<Vec<Tuple>>,
}

impl MemoryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(meta: TableMeta) -> Self {
        Self { meta, rows: RwLock::new(Vec::new()) }
    }

    /// Returns the number of stored tuples.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the table lock is poisoned.
    pub fn row_count(&self) -> CoreResult<usize> {
        Ok(self.rows.read().map_err(|_| poisoned())?.len())
    }
}

impl TableHandle for MemoryTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn insert(&self, tuple: Tuple) -> CoreResult<RecordLocator> {
        if tuple.len() != self.meta.schema.len() {
            return Err(CoreError::Validation(format!(
                "table {} expects {} values, got {}",
                self.meta.name,
                self.meta.schema.len(),
                tuple.len()
            )));
        }
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let slot = rows.len() as u64;
        rows.push(tuple);
        Ok(RecordLocator { table: self.meta.id, slot })
    }

    fn scan(&self) -> CoreResult<TupleCursor> {
        let snapshot = self.rows.read().map_err(|_| poisoned())?.clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

/// An in-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: RwLock<HashMap<String, Arc<MemoryTable>>>,
    next_id: RwLock<u64>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TableExists`] if the name is taken.
    pub fn create_table(&self, name: &str, schema: Schema) -> CoreResult<Arc<MemoryTable>> {
        let key = name.to_lowercase();
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.contains_key(&key) {
            return Err(CoreError::TableExists(name.to_owned()));
        }
        let mut next_id = self.next_id.write().map_err(|_| poisoned())?;
        *next_id += 1;
        let meta =
            TableMeta { id: TableId::new(*next_id), name: name.to_owned(), schema: Arc::new(schema) };
        let table = Arc::new(MemoryTable::new(meta));
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Creates a table and stores `rows` in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the table exists or a row does not fit the schema.
    pub fn create_table_with_rows(
        &self,
        name: &str,
        schema: Schema,
        rows: Vec<Tuple>,
    ) -> CoreResult<Arc<MemoryTable>> {
        let table = self.create_table(name, schema)?;
        for row in rows {
            let checked = Tuple::checked(&table.meta().schema, row.into_values())?;
            table.insert(checked)?;
        }
        Ok(table)
    }

    /// Returns the names of all tables.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the catalog lock is poisoned.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = tables.values().map(|t| t.meta().name.clone()).collect();
        names.sort();
        Ok(names)
    }

    fn get(&self, name: &str) -> CoreResult<Arc<MemoryTable>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        tables
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| CoreError::TableNotFound(name.to_owned()))
    }
}

impl Catalog for MemoryCatalog {
    fn lookup_table(&self, name: &str) -> CoreResult<TableMeta> {
        Ok(self.get(name)?.meta().clone())
    }

    fn open_table(&self, name: &str) -> CoreResult<Arc<dyn TableHandle>> {
        let table: Arc<dyn TableHandle> = self.get(name)?;
        Ok(table)
    }
}
