//! Helper utilities for testing and development.

use crate::results::ResultSet;
use crate::types::RowValues;

/// Create a result set from column names and rows.
///
/// # Panics
///
/// Panics if a row's width differs from the column count.
#[must_use]
pub fn create_test_rows(column_names: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut result_set = ResultSet::new(column_names.iter().map(|c| (*c).to_string()).collect());
    for row in rows {
        result_set
            .add_row_values(row)
            .expect("test row width must match the column count");
    }
    result_set
}
