//! Table-valued parameters built from record collections.

use crate::error::SprocError;
use crate::mapping::{MemberKind, Record, check_shape};
use crate::results::ResultSet;
use crate::types::{RowValues, SqlType};

/// One column of a [`TableValue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// Underlying type; an `Option` member yields its inner type here.
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Named columns plus rows, passed as a single structured parameter.
///
/// The column set is fixed when the first row is added. NULL cells are
/// `RowValues::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableValue {
    type_name: Option<String>,
    columns: Vec<TableColumn>,
    rows: Vec<Vec<RowValues>>,
}

impl TableValue {
    /// An empty table with an explicit column set.
    #[must_use]
    pub fn with_columns(columns: Vec<TableColumn>) -> Self {
        Self {
            type_name: None,
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from the property members of `T`.
    ///
    /// An empty collection yields zero rows and zero columns.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::TypeShapeError` if `T`'s member table is ambiguous, or if
    /// the collection is non-empty and `T` declares no property members.
    pub fn from_properties<'a, T, I>(items: I) -> Result<Self, SprocError>
    where
        T: Record,
        I: IntoIterator<Item = &'a T>,
    {
        Self::from_members(items, MemberKind::Property)
    }

    /// Build a table from the field members of `T`.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::TypeShapeError` if `T`'s member table is ambiguous, or if
    /// the collection is non-empty and `T` declares no field members.
    pub fn from_fields<'a, T, I>(items: I) -> Result<Self, SprocError>
    where
        T: Record,
        I: IntoIterator<Item = &'a T>,
    {
        Self::from_members(items, MemberKind::Field)
    }

    fn from_members<'a, T, I>(items: I, kind: MemberKind) -> Result<Self, SprocError>
    where
        T: Record,
        I: IntoIterator<Item = &'a T>,
    {
        check_shape::<T>()?;
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            return Ok(TableValue::default());
        }

        let members = T::members_of(kind);
        if members.is_empty() {
            return Err(SprocError::TypeShapeError(format!(
                "{} has no {kind:?} members to build table columns from",
                std::any::type_name::<T>()
            )));
        }
        let mut table = TableValue::with_columns(
            members
                .iter()
                .map(|m| TableColumn {
                    name: m.name().to_string(),
                    sql_type: m.sql_type(),
                    nullable: m.is_nullable(),
                })
                .collect(),
        );
        for item in items {
            let row = members.iter().map(|m| m.get(item)).collect();
            table.add_row(row)?;
        }
        Ok(table)
    }

    /// Name of the SQL table type this value is declared as on the server.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    #[must_use]
    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::TypeShapeError` if the row width differs from the column set.
    pub fn add_row(&mut self, row: Vec<RowValues>) -> Result<(), SprocError> {
        if row.len() != self.columns.len() {
            return Err(SprocError::TypeShapeError(format!(
                "table row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// View the table as a result set with the column names as headers.
    ///
    /// # Errors
    ///
    /// Propagates row width errors; a table built through `add_row` has none.
    pub fn to_result_set(&self) -> Result<ResultSet, SprocError> {
        let mut result_set =
            ResultSet::new(self.columns.iter().map(|c| c.name.clone()).collect());
        for row in &self.rows {
            result_set.add_row_values(row.clone())?;
        }
        Ok(result_set)
    }
}
