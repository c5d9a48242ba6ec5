//! Record mapping between raw rows and application types.
//!
//! A record type describes its members once, in a static [`Member`] table, instead of
//! being inspected at run time. The [`record!`](crate::record) macro writes that
//! table for plain structs; types with accessor-backed members implement
//! [`Record`] by hand.

mod macros;
mod record;
mod row_mapper;

pub use record::{Member, MemberKind, Record};
pub(crate) use record::check_shape;
pub use row_mapper::{MapStrategy, map_by_fields, map_by_name, map_positional};
