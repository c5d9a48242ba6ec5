use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::conversion::{FromRowValue, coerce_strict};
use crate::error::SprocError;
use crate::mapping::{MapStrategy, Record};
use crate::types::RowValues;

/// A materialized result set
///
/// Rows share one column list and one name lookup.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the procedure
    pub results: Vec<CustomDbRow>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set with the given columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> ResultSet {
        let column_index = Arc::new(build_column_index(&column_names));
        ResultSet {
            results: Vec::new(),
            column_names: Arc::new(column_names),
            column_index,
        }
    }

    /// Column names shared by every row
    #[must_use]
    pub fn get_column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Add a row to the result set
    ///
    /// # Errors
    ///
    /// Returns `SprocError::TypeShapeError` if the row width differs from the column count.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) -> Result<(), SprocError> {
        if row_values.len() != self.column_names.len() {
            return Err(SprocError::TypeShapeError(format!(
                "row has {} values but the result set has {} columns",
                row_values.len(),
                self.column_names.len()
            )));
        }
        self.results.push(CustomDbRow::with_index(
            self.column_names.clone(),
            self.column_index.clone(),
            row_values,
        ));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }

    /// Map every row onto `T` with the given strategy.
    ///
    /// # Errors
    ///
    /// Returns the first mapping error encountered.
    pub fn to_records<T: Record>(&self, strategy: MapStrategy) -> Result<Vec<T>, SprocError> {
        self.results.iter().map(|row| strategy.map_row(row)).collect()
    }

    /// Build a map from the first column (keys) to the second column (values).
    ///
    /// Columns past the second are ignored. Later duplicate keys overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::TypeShapeError` with fewer than two columns, or a
    /// conversion error for a key or value.
    pub fn as_dictionary<K, V>(&self) -> Result<HashMap<K, V>, SprocError>
    where
        K: FromRowValue + Eq + Hash,
        V: FromRowValue,
    {
        if self.column_names.len() < 2 {
            return Err(SprocError::TypeShapeError(format!(
                "dictionary conversion needs two columns, result set has {}",
                self.column_names.len()
            )));
        }
        let mut map = HashMap::with_capacity(self.results.len());
        for row in &self.results {
            let key = coerce_strict::<K>(row.rows[0].clone())?;
            let value = coerce_strict::<V>(row.rows[1].clone())?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
