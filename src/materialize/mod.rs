//! Conversion of generic field values into target types.
//!
//! A target type describes its constructible [`Shape`] through
//! [`Materialize`]. The shape is introspected once into a
//! [`MaterializationPlan`], cached per type in a [`MaterializationSession`].
//! For each schema a [`FieldBinding`] maps source positions to slots through
//! the staged name resolution in [`resolve_names`], and each bound value is
//! converted with [`FromField`].

mod convert;
mod macros;
mod plan;
mod resolve;
mod value;

pub use convert::FromField;
pub use plan::{
    Argument, Arguments, Binder, ConstructorShape, FieldBinding, MaterializationPlan,
    MaterializationSession, Materialize, Member, PropertyShape, Shape, Slot, materialize_nested,
};
pub use resolve::{MatchStage, resolve_names};
pub use value::{DynamicRecord, FieldValue};

pub(crate) use convert::{parse_bool, parse_decimal, parse_timestamp};
pub(crate) use value::integer_value;
