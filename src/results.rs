//! Raw rows, result sets and multi-result procedure outcomes.

mod result_set;
mod row;

use std::collections::HashMap;

pub use result_set::ResultSet;
pub use row::CustomDbRow;
pub(crate) use row::build_column_index;

use crate::types::RowValues;

/// Everything a multi-result procedure call produced.
///
/// `result_sets` are in server order. `outputs` holds the final values of
/// `Output` and `InputOutput` parameters keyed by parameter name (without `@`).
#[derive(Debug, Clone, Default)]
pub struct ProcedureResult {
    pub result_sets: Vec<ResultSet>,
    pub outputs: HashMap<String, RowValues>,
}

impl ProcedureResult {
    /// Output parameter value by name; a leading `@` is ignored.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&RowValues> {
        self.outputs.get(name.trim_start_matches('@'))
    }
}

/// What a non-query call reports.
///
/// `affected` counts rows touched by data-modifying statements only; rows a
/// procedure selects are not included. `outputs` is keyed like
/// [`ProcedureResult::outputs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutcome {
    pub affected: usize,
    pub outputs: HashMap<String, RowValues>,
}

impl ExecOutcome {
    /// Output parameter value by name; a leading `@` is ignored.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&RowValues> {
        self.outputs.get(name.trim_start_matches('@'))
    }
}
