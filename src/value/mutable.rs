//! Mutable (builder) values.
//!
//! A mutable value is exclusively owned: the API threads `&mut` everywhere
//! and nothing here is internally synchronized. Conversion follows the
//! copy-on-upgrade protocol:
//!
//! - [`FrozenStruct::to_mutable`] copies only the top-level field slots;
//!   nested frozen values stay shared.
//! - [`MutStruct::into_frozen`] recursively freezes still-mutable children;
//!   a slot that already holds a frozen value passes through untouched, so
//!   freezing preserves identity (not merely equality) for frozen subtrees.
//! - [`MutStruct::mutable_struct`] / [`MutStruct::mutable_array`] implement
//!   get-or-upgrade: return the existing mutable child, or replace a frozen
//!   child in place with its mutable shallow copy and return that. Repeated
//!   calls return the same object until the top-level value is frozen again.

use crate::error::{Result, SkirError};
use crate::schema::{StructDescriptor, TypeRef};
use crate::value::frozen::{FrozenArray, FrozenStruct, FrozenValue};
use crate::value::keyed::KeyValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A field or element slot inside a mutable container: either a shared
/// frozen value or an exclusively owned mutable child.
#[derive(Debug)]
pub enum Slot {
    /// Frozen value, possibly shared with other owners.
    Frozen(FrozenValue),
    /// Mutable nested struct.
    Struct(Box<MutStruct>),
    /// Mutable nested array.
    Array(Box<MutArray>),
}

impl Slot {
    /// Freeze this slot. A no-op (identity-preserving) for `Slot::Frozen`.
    pub fn into_frozen(self) -> FrozenValue {
        match self {
            Slot::Frozen(v) => v,
            Slot::Struct(s) => s.into_frozen(),
            Slot::Array(a) => a.into_frozen(),
        }
    }

    /// Borrow the frozen value, if this slot holds one.
    pub fn as_frozen(&self) -> Option<&FrozenValue> {
        match self {
            Slot::Frozen(v) => Some(v),
            _ => None,
        }
    }
}

impl From<FrozenValue> for Slot {
    fn from(v: FrozenValue) -> Self {
        Slot::Frozen(v)
    }
}

impl From<MutStruct> for Slot {
    fn from(v: MutStruct) -> Self {
        Slot::Struct(Box::new(v))
    }
}

impl From<MutArray> for Slot {
    fn from(v: MutArray) -> Self {
        Slot::Array(Box::new(v))
    }
}

/// A mutable struct builder.
#[derive(Debug)]
pub struct MutStruct {
    descriptor: Arc<StructDescriptor>,
    slots: Vec<Slot>,
}

impl MutStruct {
    /// A builder with every field at its declared default.
    pub fn new(descriptor: &Arc<StructDescriptor>) -> Self {
        let slots = descriptor
            .fields()
            .iter()
            .map(|f| Slot::Frozen(f.ty.default_value()))
            .collect();
        MutStruct {
            descriptor: Arc::clone(descriptor),
            slots,
        }
    }

    /// The struct's schema.
    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    /// Assign a frozen value to a field.
    pub fn set(&mut self, name: &str, value: impl Into<FrozenValue>) -> Result<()> {
        self.set_slot(name, Slot::Frozen(value.into()))
    }

    /// Assign any slot (frozen or mutable) to a field.
    pub fn set_slot(&mut self, name: &str, slot: Slot) -> Result<()> {
        let idx = self.slot_index(name)?;
        self.slots[idx] = slot;
        Ok(())
    }

    /// Read a field slot by display name.
    pub fn field(&self, name: &str) -> Option<&Slot> {
        self.descriptor.slot(name).map(|idx| &self.slots[idx])
    }

    /// Get-or-upgrade access to a struct-typed field: returns the existing
    /// mutable child, upgrading a frozen child in place (shallow copy) first
    /// if necessary.
    pub fn mutable_struct(&mut self, name: &str) -> Result<&mut MutStruct> {
        let idx = self.slot_index(name)?;
        match &self.descriptor.fields()[idx].ty {
            TypeRef::Struct(_) => {}
            other => {
                return Err(SkirError::schema(format!(
                    "field '{name}' has type {}, not a struct",
                    other.name()
                )))
            }
        }
        let slot = &mut self.slots[idx];
        if let Slot::Frozen(v) = slot {
            let frozen = v.as_struct().ok_or_else(|| {
                SkirError::schema(format!("field '{name}' does not hold a struct value"))
            })?;
            *slot = Slot::Struct(Box::new(frozen.to_mutable()));
        }
        match slot {
            Slot::Struct(child) => Ok(child),
            _ => Err(SkirError::schema(format!(
                "field '{name}' does not hold a struct value"
            ))),
        }
    }

    /// Get-or-upgrade access to an array-typed field.
    pub fn mutable_array(&mut self, name: &str) -> Result<&mut MutArray> {
        let idx = self.slot_index(name)?;
        match &self.descriptor.fields()[idx].ty {
            TypeRef::Array { .. } => {}
            other => {
                return Err(SkirError::schema(format!(
                    "field '{name}' has type {}, not an array",
                    other.name()
                )))
            }
        }
        let slot = &mut self.slots[idx];
        if let Slot::Frozen(v) = slot {
            let frozen = v.as_array().ok_or_else(|| {
                SkirError::schema(format!("field '{name}' does not hold an array value"))
            })?;
            *slot = Slot::Array(Box::new(frozen.to_mutable()));
        }
        match slot {
            Slot::Array(child) => Ok(child),
            _ => Err(SkirError::schema(format!(
                "field '{name}' does not hold an array value"
            ))),
        }
    }

    /// Freeze this builder into an immutable value. Cheap when all children
    /// are already frozen: frozen slots move through without copying.
    pub fn into_frozen(self) -> FrozenValue {
        let slots = self.slots.into_iter().map(Slot::into_frozen).collect();
        FrozenValue::Struct(Arc::new(FrozenStruct::from_slots(self.descriptor, slots)))
    }

    pub(crate) fn slot_at(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    fn slot_index(&self, name: &str) -> Result<usize> {
        self.descriptor.slot(name).ok_or_else(|| {
            SkirError::schema(format!(
                "struct '{}': unknown field '{name}'",
                self.descriptor.name()
            ))
        })
    }
}

impl FrozenStruct {
    /// Mutable shallow copy: copies the top-level field slots only; nested
    /// frozen values remain shared.
    pub fn to_mutable(&self) -> MutStruct {
        MutStruct {
            descriptor: Arc::clone(&self.descriptor),
            slots: self.slots.iter().cloned().map(Slot::Frozen).collect(),
        }
    }
}

/// A mutable array builder with an invalidate-on-write key cache.
#[derive(Debug, Default)]
pub struct MutArray {
    elems: Vec<Slot>,
    /// Cached key index: `(key slot of the element struct, key -> position)`.
    /// Cleared by every mutating accessor.
    pub(crate) key_cache: Option<(usize, HashMap<KeyValue, usize>)>,
}

impl MutArray {
    /// An empty array builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Append an element.
    pub fn push(&mut self, elem: impl Into<Slot>) {
        self.key_cache = None;
        self.elems.push(elem.into());
    }

    /// Replace the element at `index`.
    pub fn replace(&mut self, index: usize, elem: impl Into<Slot>) -> Result<()> {
        if index >= self.elems.len() {
            return Err(SkirError::schema(format!(
                "array index {index} out of bounds (len {})",
                self.elems.len()
            )));
        }
        self.key_cache = None;
        self.elems[index] = elem.into();
        Ok(())
    }

    /// Read an element slot.
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.elems.get(index)
    }

    /// Mutable element access. Invalidates the key cache, since the caller
    /// may change the element's key.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.key_cache = None;
        self.elems.get_mut(index)
    }

    /// Elements in order.
    pub fn elems(&self) -> &[Slot] {
        &self.elems
    }

    /// Freeze this builder into an immutable array.
    pub fn into_frozen(self) -> FrozenValue {
        let elems = self.elems.into_iter().map(Slot::into_frozen).collect();
        FrozenValue::Array(Arc::new(FrozenArray::new(elems)))
    }
}

impl FrozenArray {
    /// Mutable shallow copy: elements remain shared frozen values.
    pub fn to_mutable(&self) -> MutArray {
        MutArray {
            elems: self.elems.iter().cloned().map(Slot::Frozen).collect(),
            key_cache: None,
        }
    }
}
