use super::record::{Member, MemberKind, Record, check_shape};
use crate::error::SprocError;
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// Which mapping rule turns a row into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapStrategy {
    /// Match column names against every member; unmatched columns are skipped.
    #[default]
    ByName,
    /// Match column names against field members only.
    ByFields,
    /// Match values to settable members by declaration order.
    Positional,
}

impl MapStrategy {
    /// Map one raw row with this strategy.
    ///
    /// # Errors
    ///
    /// See [`map_by_name`], [`map_by_fields`] and [`map_positional`].
    pub fn map_row<T: Record>(self, row: &CustomDbRow) -> Result<T, SprocError> {
        match self {
            MapStrategy::ByName => map_by_name(&row.rows, &row.column_names),
            MapStrategy::ByFields => map_by_fields(&row.rows, &row.column_names),
            MapStrategy::Positional => map_positional(&row.rows),
        }
    }
}

/// Populate a new `T` by matching column names to member names.
///
/// # Errors
///
/// `SprocError::TypeShapeError` if a matched member has no setter or the member table
/// is ambiguous; `SprocError::ConversionError` if a value does not fit its member.
pub fn map_by_name<T: Record>(
    values: &[RowValues],
    column_names: &[String],
) -> Result<T, SprocError> {
    let members = check_shape::<T>()?;
    assign_by_name(members.iter(), values, column_names)
}

/// Like [`map_by_name`], restricted to field members.
///
/// # Errors
///
/// Same as [`map_by_name`].
pub fn map_by_fields<T: Record>(
    values: &[RowValues],
    column_names: &[String],
) -> Result<T, SprocError> {
    let members = check_shape::<T>()?;
    assign_by_name(
        members.iter().filter(|m| m.kind() == MemberKind::Field),
        values,
        column_names,
    )
}

/// Populate a new `T` from values in member declaration order.
///
/// Settable fields are tried first; if their count differs from the value count,
/// settable properties are tried.
///
/// # Errors
///
/// `SprocError::TypeShapeError` if neither member list has exactly one member per value.
pub fn map_positional<T: Record>(values: &[RowValues]) -> Result<T, SprocError> {
    let members = check_shape::<T>()?;
    let settable = |kind: MemberKind| -> Vec<&'static Member<T>> {
        members
            .iter()
            .filter(|m| m.kind() == kind && m.is_settable())
            .collect()
    };

    let fields = settable(MemberKind::Field);
    let targets = if fields.len() == values.len() {
        fields
    } else {
        let properties = settable(MemberKind::Property);
        if properties.len() != values.len() {
            return Err(SprocError::TypeShapeError(format!(
                "{} has {} fields and {} properties, row has {} values",
                std::any::type_name::<T>(),
                fields.len(),
                properties.len(),
                values.len()
            )));
        }
        properties
    };

    let mut record = T::default();
    for (member, value) in targets.into_iter().zip(values) {
        member.set(&mut record, value.clone())?;
    }
    Ok(record)
}

fn assign_by_name<'m, T: Record>(
    members: impl Iterator<Item = &'m Member<T>> + Clone,
    values: &[RowValues],
    column_names: &[String],
) -> Result<T, SprocError> {
    let mut record = T::default();
    for (column, value) in column_names.iter().zip(values) {
        if let Some(member) = members.clone().find(|m| m.name() == column.as_str()) {
            member.set(&mut record, value.clone())?;
        }
    }
    Ok(record)
}
