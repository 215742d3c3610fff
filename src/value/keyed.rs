//! Keyed lookups over struct arrays.
//!
//! An array whose element type designates a key field maps that field's value
//! to the element holding it. On a frozen array the index is built lazily on
//! first lookup and published atomically through a `OnceLock`; concurrent
//! first-time builders may duplicate work, but a reader never observes a
//! partially built index, and no locking is needed afterwards. On a mutable
//! array the cache is cleared by every mutating accessor and rebuilt by the
//! next lookup.
//!
//! Duplicate keys resolve last-write-wins: the index is built front to back
//! and later elements overwrite earlier entries. First lookups run in O(n),
//! later ones in O(1).

use crate::error::{Result, SkirError};
use crate::schema::{StructDescriptor, TypeRef};
use crate::value::frozen::{FrozenArray, FrozenValue};
use crate::value::mutable::{MutArray, Slot};
use std::collections::HashMap;
use std::sync::Arc;

/// A hashable key extracted from a scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// Boolean key.
    Bool(bool),
    /// Integer or timestamp key.
    Int(i64),
    /// String key.
    Str(Arc<str>),
}

impl KeyValue {
    /// Extract a key from a scalar frozen value. Timestamps key by their
    /// unix-millis value.
    pub fn from_value(value: &FrozenValue) -> Option<KeyValue> {
        match value {
            FrozenValue::Bool(v) => Some(KeyValue::Bool(*v)),
            FrozenValue::Int(v) | FrozenValue::Timestamp(v) => Some(KeyValue::Int(*v)),
            FrozenValue::Str(v) => Some(KeyValue::Str(Arc::clone(v))),
            _ => None,
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v.into())
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Str(Arc::from(v))
    }
}

impl From<bool> for KeyValue {
    fn from(v: bool) -> Self {
        KeyValue::Bool(v)
    }
}

fn build_index<'a>(
    elems: impl Iterator<Item = Option<&'a FrozenValue>>,
    key_slot: usize,
) -> HashMap<KeyValue, usize> {
    let mut index = HashMap::new();
    for (position, elem) in elems.enumerate() {
        let key = elem
            .and_then(FrozenValue::as_struct)
            .and_then(|s| s.slots().get(key_slot))
            .and_then(KeyValue::from_value);
        if let Some(key) = key {
            // Later elements overwrite earlier ones: last write wins.
            index.insert(key, position);
        }
    }
    index
}

fn resolve_key_slot(descriptor: &StructDescriptor, key_field: &str) -> Result<usize> {
    descriptor.slot(key_field).ok_or_else(|| {
        SkirError::schema(format!(
            "key field '{key_field}' not found in struct '{}'",
            descriptor.name()
        ))
    })
}

impl FrozenArray {
    /// Look up the element whose `key_field` equals `key`.
    ///
    /// The index built by the first lookup is cached for the array's lifetime
    /// together with the key slot it was built for. Lookups by a different
    /// key field answer through a fresh uncached scan, so only the designated
    /// key field gets the O(1) path. Duplicate keys resolve last-write-wins.
    pub fn find(
        &self,
        descriptor: &StructDescriptor,
        key_field: &str,
        key: &KeyValue,
    ) -> Result<Option<&FrozenValue>> {
        let key_slot = resolve_key_slot(descriptor, key_field)?;
        let (cached_slot, index) = self
            .index
            .get_or_init(|| (key_slot, build_index(self.elems.iter().map(Some), key_slot)));
        let position = if *cached_slot == key_slot {
            index.get(key).copied()
        } else {
            build_index(self.elems.iter().map(Some), key_slot)
                .get(key)
                .copied()
        };
        Ok(position.map(|position| &self.elems[position]))
    }
}

impl MutArray {
    /// Position of the element whose `key_field` equals `key`.
    ///
    /// The first lookup after a mutation rebuilds the cache in O(n);
    /// subsequent lookups are O(1). Duplicate keys resolve last-write-wins.
    pub fn find_index(
        &mut self,
        descriptor: &StructDescriptor,
        key_field: &str,
        key: &KeyValue,
    ) -> Result<Option<usize>> {
        let key_slot = resolve_key_slot(descriptor, key_field)?;
        let stale = !matches!(&self.key_cache, Some((slot, _)) if *slot == key_slot);
        if stale {
            let index = build_index(
                self.elems().iter().map(|slot| match slot {
                    Slot::Frozen(v) => Some(v),
                    Slot::Struct(s) => s.slot_at(key_slot).as_frozen(),
                    Slot::Array(_) => None,
                }),
                key_slot,
            );
            self.key_cache = Some((key_slot, index));
        }
        let (_, index) = self.key_cache.as_ref().unwrap_or_else(|| unreachable!());
        Ok(index.get(key).copied())
    }

    /// Look up the element slot whose `key_field` equals `key`.
    pub fn find(
        &mut self,
        descriptor: &StructDescriptor,
        key_field: &str,
        key: &KeyValue,
    ) -> Result<Option<&Slot>> {
        Ok(self
            .find_index(descriptor, key_field, key)?
            .and_then(|position| self.get(position)))
    }
}

/// Keyed lookup through an array-typed [`TypeRef`], using its designated key
/// field.
pub fn find_keyed<'a>(
    array: &'a FrozenValue,
    array_ty: &TypeRef,
    key: impl Into<KeyValue>,
) -> Result<Option<&'a FrozenValue>> {
    let (elem, key_field) = match array_ty {
        TypeRef::Array {
            elem,
            key_field: Some(key_field),
        } => (elem, key_field),
        TypeRef::Array { key_field: None, .. } => {
            return Err(SkirError::schema(
                "array type does not designate a key field".to_string(),
            ))
        }
        other => {
            return Err(SkirError::schema(format!(
                "expected an array type, got {}",
                other.name()
            )))
        }
    };
    let descriptor = match elem.as_ref() {
        TypeRef::Struct(desc) => desc,
        other => {
            return Err(SkirError::schema(format!(
                "keyed element type must be a struct, got {}",
                other.name()
            )))
        }
    };
    let array = array.as_array().ok_or_else(|| {
        SkirError::schema("keyed lookup requires an array value".to_string())
    })?;
    array.find(descriptor, key_field, &key.into())
}
