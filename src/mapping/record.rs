use std::collections::HashSet;

use crate::error::SprocError;
use crate::types::{RowValues, SqlType};

/// How a member is bound to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Bound directly to a struct field.
    Field,
    /// Exposed through accessor functions.
    Property,
}

type Getter<T> = fn(&T) -> RowValues;
type Setter<T> = fn(&mut T, RowValues) -> Result<(), SprocError>;

/// One named member of a record type.
pub struct Member<T> {
    name: &'static str,
    kind: MemberKind,
    sql_type: SqlType,
    nullable: bool,
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

impl<T> Member<T> {
    #[must_use]
    pub const fn field(
        name: &'static str,
        sql_type: SqlType,
        nullable: bool,
        getter: Getter<T>,
        setter: Setter<T>,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Field,
            sql_type,
            nullable,
            getter,
            setter: Some(setter),
        }
    }

    #[must_use]
    pub const fn property(
        name: &'static str,
        sql_type: SqlType,
        nullable: bool,
        getter: Getter<T>,
        setter: Setter<T>,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Property,
            sql_type,
            nullable,
            getter,
            setter: Some(setter),
        }
    }

    /// A property with a getter only. Mapping a column onto it by name is an error.
    #[must_use]
    pub const fn read_only(
        name: &'static str,
        sql_type: SqlType,
        nullable: bool,
        getter: Getter<T>,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Property,
            sql_type,
            nullable,
            getter,
            setter: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Declared type with any `Option` stripped.
    #[must_use]
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the member's current value.
    pub fn get(&self, record: &T) -> RowValues {
        (self.getter)(record)
    }

    /// Write a raw value into the member, coercing it to the declared type.
    ///
    /// # Errors
    ///
    /// `SprocError::TypeShapeError` if the member has no setter,
    /// `SprocError::ConversionError` if the value does not fit.
    pub fn set(&self, record: &mut T, value: RowValues) -> Result<(), SprocError> {
        let setter = self.setter.ok_or_else(|| {
            SprocError::TypeShapeError(format!("member `{}` has no setter", self.name))
        })?;
        setter(record, value).map_err(|e| e.for_member(self.name))
    }
}

impl<T> std::fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("sql_type", &self.sql_type)
            .field("nullable", &self.nullable)
            .field("settable", &self.setter.is_some())
            .finish()
    }
}

/// A default-constructible composite type with a static member table.
///
/// Members are listed in declaration order; that order drives positional mapping
/// and table column order.
pub trait Record: Default + Sized + 'static {
    fn members() -> &'static [Member<Self>];

    /// Members of one kind, in declaration order.
    fn members_of(kind: MemberKind) -> Vec<&'static Member<Self>> {
        Self::members().iter().filter(|m| m.kind() == kind).collect()
    }
}

/// Reject member tables that cannot be mapped unambiguously.
pub(crate) fn check_shape<T: Record>() -> Result<&'static [Member<T>], SprocError> {
    let members = T::members();
    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.name()) {
            return Err(SprocError::TypeShapeError(format!(
                "{} declares member `{}` more than once",
                std::any::type_name::<T>(),
                member.name()
            )));
        }
    }
    Ok(members)
}
