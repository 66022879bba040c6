//! Materialization plans: how a target type is constructed from named fields.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::convert::FromField;
use super::resolve::resolve_names;
use super::value::{DynamicRecord, FieldValue};
use crate::error::ConversionError;

/// A type the readers can produce.
///
/// Implement it with [`materialize_properties!`](crate::materialize_properties)
/// or [`materialize_constructor!`](crate::materialize_constructor), or by hand
/// for a custom shape.
pub trait Materialize: Sized + 'static {
    /// Describe how instances are built. Called once per type and session.
    fn shape() -> Shape<Self>;

    /// Name of the concrete type of this instance, checked by YAML type
    /// restriction. Defaults to the static type name.
    fn runtime_type(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// The constructible shape of a target type.
pub enum Shape<T> {
    /// Construct positionally from ordered parameters
    Constructor(ConstructorShape<T>),
    /// Start from a default instance and assign members
    Properties(PropertyShape<T>),
    /// Take the whole value as-is
    Dynamic(fn(FieldValue) -> Result<T, ConversionError>),
}

/// A named member or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub type_name: &'static str,
}

pub struct ConstructorShape<T> {
    pub params: Vec<Slot>,
    pub construct: fn(&mut Arguments<'_>) -> Result<T, ConversionError>,
}

pub struct PropertyShape<T> {
    pub create: fn() -> T,
    pub members: Vec<Member<T>>,
}

pub struct Member<T> {
    pub slot: Slot,
    pub assign: fn(&mut T, &Argument<'_>) -> Result<(), ConversionError>,
}

/// A source field bound to a slot.
#[derive(Debug, Clone, Copy)]
pub struct Argument<'a> {
    pub column_index: usize,
    pub column_name: &'a str,
    pub value: &'a FieldValue,
}

impl Argument<'_> {
    /// Convert the bound value, attaching the source position on failure.
    pub fn convert<U: FromField>(&self) -> Result<U, ConversionError> {
        U::from_field(self.value).map_err(|message| ConversionError {
            column_index: self.column_index,
            column_name: self.column_name.to_string(),
            raw: self.value.excerpt(),
            target_type: type_name::<U>().to_string(),
            message,
        })
    }
}

/// Constructor arguments in parameter order; unbound parameters are missing.
pub struct Arguments<'a> {
    slots: Vec<Option<Argument<'a>>>,
    cursor: usize,
}

impl<'a> Arguments<'a> {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            cursor: 0,
        }
    }

    /// Convert the next parameter.
    pub fn next_arg<U: FromField>(&mut self) -> Result<U, ConversionError> {
        let slot = self.cursor;
        self.cursor += 1;
        match self.slots.get(slot).and_then(Option::as_ref) {
            Some(arg) => arg.convert(),
            None => Ok(U::missing()),
        }
    }
}

/// Source position to slot mapping for one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBinding {
    slots: Vec<Option<usize>>,
}

impl FieldBinding {
    /// Slot bound to the source field at `position`.
    pub fn slot_for(&self, position: usize) -> Option<usize> {
        self.slots.get(position).copied().flatten()
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// The resolved, read-only plan for one target type.
pub struct MaterializationPlan<T> {
    type_name: &'static str,
    shape: Shape<T>,
}

impl<T: Materialize> MaterializationPlan<T> {
    /// Introspect `T` once.
    pub fn build() -> Self {
        let plan = Self {
            type_name: type_name::<T>(),
            shape: T::shape(),
        };
        log::debug!(
            "built {} materialization plan for {} ({} slots)",
            plan.kind(),
            plan.type_name,
            plan.slot_names().len()
        );
        plan
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// "constructor", "properties" or "dynamic".
    pub fn kind(&self) -> &'static str {
        match self.shape {
            Shape::Constructor(_) => "constructor",
            Shape::Properties(_) => "properties",
            Shape::Dynamic(_) => "dynamic",
        }
    }

    pub fn slot_names(&self) -> Vec<&'static str> {
        match &self.shape {
            Shape::Constructor(c) => c.params.iter().map(|s| s.name).collect(),
            Shape::Properties(p) => p.members.iter().map(|m| m.slot.name).collect(),
            Shape::Dynamic(_) => Vec::new(),
        }
    }

    /// Bind a schema's field names to slots.
    pub fn bind<S: AsRef<str>>(&self, names: &[S]) -> FieldBinding {
        FieldBinding {
            slots: resolve_names(&self.slot_names(), names),
        }
    }

    /// Build an instance from positional values under a binding.
    pub fn build_from(
        &self,
        binding: &FieldBinding,
        names: &[String],
        values: &[FieldValue],
    ) -> Result<T, ConversionError> {
        let argument = |position: usize| Argument {
            column_index: position,
            column_name: names.get(position).map(String::as_str).unwrap_or(""),
            value: &values[position],
        };

        match &self.shape {
            Shape::Constructor(shape) => {
                let mut args = Arguments::new(shape.params.len());
                for position in 0..values.len() {
                    if let Some(slot) = binding.slot_for(position) {
                        args.slots[slot] = Some(argument(position));
                    }
                }
                (shape.construct)(&mut args)
            }
            Shape::Properties(shape) => {
                let mut instance = (shape.create)();
                for position in 0..values.len() {
                    if let Some(slot) = binding.slot_for(position) {
                        (shape.members[slot].assign)(&mut instance, &argument(position))?;
                    }
                }
                Ok(instance)
            }
            Shape::Dynamic(from_value) => from_value(FieldValue::Map(
                names.iter().cloned().zip(values.iter().cloned()).collect(),
            )),
        }
    }
}

/// Cache of plans keyed by target type.
#[derive(Default)]
pub struct MaterializationSession {
    plans: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MaterializationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default session.
    pub fn global() -> &'static MaterializationSession {
        static GLOBAL: OnceLock<MaterializationSession> = OnceLock::new();
        GLOBAL.get_or_init(MaterializationSession::new)
    }

    /// Get the cached plan for `T`, building it on first use.
    pub fn plan<T: Materialize>(&self) -> Arc<MaterializationPlan<T>> {
        let id = TypeId::of::<T>();
        let cached = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        if let Some(plan) = cached.and_then(|p| p.downcast::<MaterializationPlan<T>>().ok()) {
            return plan;
        }

        let built = Arc::new(MaterializationPlan::<T>::build());
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        let entry = plans
            .entry(id)
            .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
            .clone();
        entry.downcast::<MaterializationPlan<T>>().unwrap_or(built)
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MaterializationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializationSession")
            .field("plans", &self.len())
            .finish()
    }
}

/// Applies a plan to a stream of inputs, rebinding only when the schema changes.
pub struct Binder<T> {
    plan: Arc<MaterializationPlan<T>>,
    names: Vec<String>,
    binding: FieldBinding,
}

impl<T: Materialize> Binder<T> {
    pub fn new(plan: Arc<MaterializationPlan<T>>) -> Self {
        Self {
            plan,
            names: Vec::new(),
            binding: FieldBinding::default(),
        }
    }

    /// Binder using the global session's plan for `T`.
    pub fn global() -> Self {
        Self::new(MaterializationSession::global().plan::<T>())
    }

    pub fn plan(&self) -> &MaterializationPlan<T> {
        &self.plan
    }

    /// Build an instance from a positional row.
    pub fn materialize_row(
        &mut self,
        names: &[String],
        values: &[FieldValue],
    ) -> Result<T, ConversionError> {
        if self.names.as_slice() != names {
            self.binding = self.plan.bind(names);
            self.names = names.to_vec();
        }
        self.plan.build_from(&self.binding, names, values)
    }

    /// Build an instance from a structured value.
    pub fn materialize_value(&mut self, value: FieldValue) -> Result<T, ConversionError> {
        if let Shape::Dynamic(from_value) = &self.plan.shape {
            return from_value(value);
        }
        match value {
            FieldValue::Map(fields) => {
                let (names, values): (Vec<String>, Vec<FieldValue>) = fields.into_iter().unzip();
                self.materialize_row(&names, &values)
            }
            other => Err(ConversionError {
                column_index: 0,
                column_name: String::new(),
                raw: other.excerpt(),
                target_type: self.plan.type_name.to_string(),
                message: "expected a mapping of named fields".into(),
            }),
        }
    }
}

/// Convert a nested value into a record type through the global session.
pub fn materialize_nested<T: Materialize>(value: &FieldValue) -> Result<T, String> {
    Binder::<T>::global()
        .materialize_value(value.clone())
        .map_err(|e| e.to_string())
}

impl Materialize for FieldValue {
    fn shape() -> Shape<Self> {
        Shape::Dynamic(Ok)
    }
}

impl Materialize for DynamicRecord {
    fn shape() -> Shape<Self> {
        Shape::Dynamic(|value| {
            Ok(match value {
                FieldValue::Map(fields) => DynamicRecord::from_fields(fields),
                other => DynamicRecord::from_fields(vec![("value".to_string(), other)]),
            })
        })
    }
}

impl Materialize for serde_json::Value {
    fn shape() -> Shape<Self> {
        Shape::Dynamic(|value| Ok(serde_json::Value::from(&value)))
    }
}
