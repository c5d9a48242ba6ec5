/// Declare a struct together with its [`Record`](crate::mapping::Record) member table.
///
/// Each field names the column it maps to. A plain `=> "Column"` declares a
/// [`MemberKind::Field`](crate::mapping::MemberKind::Field); `=> property "Column"`
/// declares a [`MemberKind::Property`](crate::mapping::MemberKind::Property). Every
/// member gets a setter.
///
/// ```rust
/// use sproc_middleware::prelude::*;
///
/// sproc_middleware::record! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct User {
///         pub id: i32 => "Id",
///         pub name: String => "Name",
///         pub email: Option<String> => property "Email",
///     }
/// }
///
/// let columns = vec!["Id".to_string(), "Name".to_string(), "Email".to_string()];
/// let values = vec![RowValues::Int(1), RowValues::Text("Ann".into()), RowValues::Null];
/// let user: User = map_by_name(&values, &columns).unwrap();
/// assert_eq!(user.email, None);
/// assert_eq!(User::members_of(MemberKind::Property).len(), 1);
/// ```
#[macro_export]
macro_rules! record {
    (@member $name:ident, $field:ident, $fty:ty, $column:literal) => {
        $crate::record!(@build field, $name, $field, $fty, $column)
    };
    (@member $name:ident, $field:ident, $fty:ty, $column:literal, property) => {
        $crate::record!(@build property, $name, $field, $fty, $column)
    };
    (@build $ctor:ident, $name:ident, $field:ident, $fty:ty, $column:literal) => {
        $crate::mapping::Member::$ctor(
            $column,
            <$fty as $crate::conversion::SqlTyped>::SQL_TYPE,
            <$fty as $crate::conversion::SqlTyped>::NULLABLE,
            |record: &$name| $crate::conversion::ToRowValue::to_row_value(&record.$field),
            |record: &mut $name, value: $crate::types::RowValues| {
                record.$field = $crate::conversion::coerce_strict::<$fty>(value)?;
                ::std::result::Result::Ok(())
            },
        )
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty => $($kind:ident)? $column:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $fty, )*
        }

        impl $crate::mapping::Record for $name {
            fn members() -> &'static [$crate::mapping::Member<Self>] {
                static MEMBERS: &[$crate::mapping::Member<$name>] = &[
                    $(
                        $crate::record!(@member $name, $field, $fty, $column $(, $kind)?),
                    )*
                ];
                MEMBERS
            }
        }
    };
}
