//! # Schema Descriptors
//!
//! Runtime metadata describing struct and enum shapes.
//!
//! A schema is a tree of [`TypeRef`]s. Struct fields carry a stable numeric
//! field number that is independent of the field's display name: dense JSON
//! and the binary format address fields by number, so renaming a field never
//! changes its wire identity.
//!
//! Descriptors are validated at construction time: duplicate field names or
//! numbers, enums without a constant variant, and key fields that do not
//! resolve to a scalar field of the element struct are all rejected with
//! [`SkirError::SchemaViolation`].
//!
//! Descriptors serialize to a stable JSON shape (see [`json`]) and can be
//! reconstructed from it, enabling cross-process schema introspection without
//! the original schema source.

pub mod json;

use crate::error::{Result, SkirError};
use crate::value::{EnumState, EnumValue, FrozenValue, UnknownVariant};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Reference to a value type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Boolean, default `false`.
    Bool,
    /// 64-bit signed integer, default `0`.
    Int,
    /// 64-bit float, default `0.0`.
    Float,
    /// UTF-8 string, default `""`.
    String,
    /// Byte string, default empty. Base64 in the JSON formats.
    Bytes,
    /// Instant in time as unix milliseconds, default epoch.
    Timestamp,
    /// Optional wrapper, default absent.
    Optional(Box<TypeRef>),
    /// Ordered sequence, default empty. When `key_field` names a scalar field
    /// of the (struct) element type, the sequence supports keyed lookups.
    Array {
        /// Element type.
        elem: Box<TypeRef>,
        /// Display name of the element field used as lookup key, if any.
        key_field: Option<String>,
    },
    /// Nested struct.
    Struct(Arc<StructDescriptor>),
    /// Nested enum.
    Enum(Arc<EnumDescriptor>),
}

impl TypeRef {
    /// Whether values of this type may serve as lookup keys.
    pub fn is_keyable(&self) -> bool {
        matches!(
            self,
            TypeRef::Bool | TypeRef::Int | TypeRef::String | TypeRef::Timestamp
        )
    }

    /// Validate array key-field designations in this type tree.
    pub fn validate(&self) -> Result<()> {
        match self {
            TypeRef::Optional(inner) => inner.validate(),
            TypeRef::Array { elem, key_field } => {
                if let Some(key) = key_field {
                    let desc = match elem.as_ref() {
                        TypeRef::Struct(desc) => desc,
                        other => {
                            return Err(SkirError::schema(format!(
                                "key field '{key}' requires a struct element type, got {other:?}"
                            )))
                        }
                    };
                    match desc.field(key) {
                        Some(field) if field.ty.is_keyable() => {}
                        Some(field) => {
                            return Err(SkirError::schema(format!(
                                "key field '{}.{key}' has non-keyable type {:?}",
                                desc.name(),
                                field.ty
                            )))
                        }
                        None => {
                            return Err(SkirError::schema(format!(
                                "key field '{key}' not found in struct '{}'",
                                desc.name()
                            )))
                        }
                    }
                }
                elem.validate()
            }
            // Struct and enum descriptors validate their own field types at
            // construction time.
            _ => Ok(()),
        }
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Bool => "bool",
            TypeRef::Int => "int",
            TypeRef::Float => "float",
            TypeRef::String => "string",
            TypeRef::Bytes => "bytes",
            TypeRef::Timestamp => "timestamp",
            TypeRef::Optional(_) => "optional",
            TypeRef::Array { .. } => "array",
            TypeRef::Struct(desc) => desc.name(),
            TypeRef::Enum(desc) => desc.name(),
        }
    }
}

/// A single struct field: display name, stable wire number, value type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Display name, used only by the readable JSON format.
    pub name: String,
    /// Stable field number; the dense JSON position and binary tag.
    pub number: u32,
    /// Declared value type.
    pub ty: TypeRef,
}

impl FieldDescriptor {
    /// Create a field descriptor.
    pub fn new(name: impl Into<String>, number: u32, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
        }
    }
}

/// An ordered set of named, numbered fields.
///
/// Fields are stored sorted by field number ascending; a slot index is the
/// position of a field in that order.
#[derive(Debug)]
pub struct StructDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    /// Lazily built default value (see `FrozenStruct::default_of`).
    pub(crate) default_cell: OnceLock<FrozenValue>,
}

impl PartialEq for StructDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl StructDescriptor {
    /// Build a struct descriptor, validating field uniqueness and nested key
    /// designations.
    pub fn new(name: impl Into<String>, mut fields: Vec<FieldDescriptor>) -> Result<Arc<Self>> {
        let name = name.into();
        fields.sort_by_key(|f| f.number);
        let mut by_name = HashMap::with_capacity(fields.len());
        for (slot, field) in fields.iter().enumerate() {
            if slot > 0 && fields[slot - 1].number == field.number {
                return Err(SkirError::schema(format!(
                    "struct '{name}': duplicate field number {}",
                    field.number
                )));
            }
            if by_name.insert(field.name.clone(), slot).is_some() {
                return Err(SkirError::schema(format!(
                    "struct '{name}': duplicate field name '{}'",
                    field.name
                )));
            }
            field.ty.validate()?;
        }
        Ok(Arc::new(Self {
            name,
            fields,
            by_name,
            default_cell: OnceLock::new(),
        }))
    }

    /// Struct name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields, ordered by field number ascending.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by display name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.slot(name).map(|slot| &self.fields[slot])
    }

    /// Slot index of a field by display name.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Look up a field and its slot by wire number.
    pub fn field_by_number(&self, number: u32) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .binary_search_by_key(&number, |f| f.number)
            .ok()
            .map(|slot| (slot, &self.fields[slot]))
    }
}

/// A single enum variant. `payload: None` marks a constant variant,
/// `payload: Some(ty)` a data-carrying variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDescriptor {
    /// Display name.
    pub name: String,
    /// Stable wire discriminator.
    pub number: u32,
    /// Payload type for data variants.
    pub payload: Option<TypeRef>,
}

impl VariantDescriptor {
    /// A zero-payload constant variant.
    pub fn constant(name: impl Into<String>, number: u32) -> Self {
        Self {
            name: name.into(),
            number,
            payload: None,
        }
    }

    /// A data-carrying variant.
    pub fn data(name: impl Into<String>, number: u32, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            number,
            payload: Some(ty),
        }
    }

    /// Whether this is a constant (zero-payload) variant.
    pub fn is_constant(&self) -> bool {
        self.payload.is_none()
    }
}

/// A closed set of constant and data variants.
///
/// Every enum additionally has an implicit "unrecognized" state produced when
/// decoding a discriminator unknown to this schema version; it is never
/// declared here.
#[derive(Debug)]
pub struct EnumDescriptor {
    name: Arc<str>,
    variants: Vec<VariantDescriptor>,
    by_name: HashMap<String, usize>,
    /// Shared singletons for constant variants, parallel to `variants`.
    singletons: Vec<Option<FrozenValue>>,
    default_slot: usize,
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.variants == other.variants
    }
}

impl EnumDescriptor {
    /// Build an enum descriptor. Requires at least one constant variant; the
    /// first declared constant is the enum's default value.
    pub fn new(name: impl Into<String>, variants: Vec<VariantDescriptor>) -> Result<Arc<Self>> {
        let name: Arc<str> = Arc::from(name.into());
        let mut by_name = HashMap::with_capacity(variants.len());
        let mut numbers = HashMap::with_capacity(variants.len());
        let mut default_slot = None;
        for (slot, variant) in variants.iter().enumerate() {
            if by_name.insert(variant.name.clone(), slot).is_some() {
                return Err(SkirError::schema(format!(
                    "enum '{name}': duplicate variant name '{}'",
                    variant.name
                )));
            }
            if numbers.insert(variant.number, slot).is_some() {
                return Err(SkirError::schema(format!(
                    "enum '{name}': duplicate variant number {}",
                    variant.number
                )));
            }
            if let Some(ty) = &variant.payload {
                ty.validate()?;
            } else if default_slot.is_none() {
                default_slot = Some(slot);
            }
        }
        let default_slot = default_slot.ok_or_else(|| {
            SkirError::schema(format!("enum '{name}': at least one constant variant required"))
        })?;
        let singletons = variants
            .iter()
            .map(|v| {
                v.is_constant().then(|| {
                    FrozenValue::Enum(Arc::new(EnumValue::new(
                        Arc::clone(&name),
                        EnumState::Constant {
                            number: v.number,
                            name: Arc::from(v.name.as_str()),
                        },
                    )))
                })
            })
            .collect();
        Ok(Arc::new(Self {
            name,
            variants,
            by_name,
            singletons,
            default_slot,
        }))
    }

    /// Enum name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declared variants, in declaration order.
    pub fn variants(&self) -> &[VariantDescriptor] {
        &self.variants
    }

    /// Look up a variant by display name.
    pub fn variant(&self, name: &str) -> Option<&VariantDescriptor> {
        self.by_name.get(name).map(|&slot| &self.variants[slot])
    }

    /// Look up a variant by wire discriminator.
    pub fn variant_by_number(&self, number: u32) -> Option<&VariantDescriptor> {
        self.variants.iter().find(|v| v.number == number)
    }

    /// The default value: the first declared constant variant.
    pub fn default_value(&self) -> FrozenValue {
        self.singletons[self.default_slot]
            .as_ref()
            .cloned()
            .unwrap_or_else(|| unreachable!("default slot always holds a constant singleton"))
    }

    /// Shared singleton for a constant variant. Repeated calls return the
    /// same underlying allocation.
    pub fn of_constant(&self, name: &str) -> Result<FrozenValue> {
        let slot = self.by_name.get(name).ok_or_else(|| {
            SkirError::schema(format!("enum '{}': unknown variant '{name}'", self.name))
        })?;
        self.singletons[*slot].as_ref().cloned().ok_or_else(|| {
            SkirError::schema(format!(
                "enum '{}': variant '{name}' carries data; use of_data()",
                self.name
            ))
        })
    }

    /// Wrap a value under a named data variant.
    pub fn of_data(&self, name: &str, value: FrozenValue) -> Result<FrozenValue> {
        let variant = self.variant(name).ok_or_else(|| {
            SkirError::schema(format!("enum '{}': unknown variant '{name}'", self.name))
        })?;
        if variant.is_constant() {
            return Err(SkirError::schema(format!(
                "enum '{}': variant '{name}' is a constant; use of_constant()",
                self.name
            )));
        }
        Ok(FrozenValue::Enum(Arc::new(EnumValue::new(
            Arc::clone(&self.name),
            EnumState::Data {
                number: variant.number,
                name: Arc::from(variant.name.as_str()),
                value,
            },
        ))))
    }

    /// Build the unrecognized state for a discriminator unknown to this
    /// schema version. Used by the codec; also handy in tests.
    pub fn of_unrecognized(&self, unknown: UnknownVariant) -> FrozenValue {
        FrozenValue::Enum(Arc::new(EnumValue::new(
            Arc::clone(&self.name),
            EnumState::Unrecognized(unknown),
        )))
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}
