//! Frozen (deeply immutable) values.
//!
//! A [`FrozenValue`] is safe to share across threads and cheap to clone:
//! composite variants hold `Arc`s, so cloning copies a pointer, never the
//! data. Equality is structural.

use crate::error::{Result, SkirError};
use crate::schema::{StructDescriptor, TypeRef};
use crate::value::keyed::KeyValue;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A deeply immutable value of some schema type.
#[derive(Debug, Clone)]
pub enum FrozenValue {
    /// Absent optional.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(Arc<str>),
    /// Byte string.
    Bytes(Arc<[u8]>),
    /// Unix milliseconds.
    Timestamp(i64),
    /// Ordered sequence.
    Array(Arc<FrozenArray>),
    /// Struct instance.
    Struct(Arc<FrozenStruct>),
    /// Enum instance.
    Enum(Arc<EnumValue>),
}

impl PartialEq for FrozenValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FrozenValue::Null, FrozenValue::Null) => true,
            (FrozenValue::Bool(a), FrozenValue::Bool(b)) => a == b,
            (FrozenValue::Int(a), FrozenValue::Int(b)) => a == b,
            (FrozenValue::Float(a), FrozenValue::Float(b)) => a == b,
            (FrozenValue::Str(a), FrozenValue::Str(b)) => a == b,
            (FrozenValue::Bytes(a), FrozenValue::Bytes(b)) => a == b,
            (FrozenValue::Timestamp(a), FrozenValue::Timestamp(b)) => a == b,
            (FrozenValue::Array(a), FrozenValue::Array(b)) => a == b,
            (FrozenValue::Struct(a), FrozenValue::Struct(b)) => a == b,
            (FrozenValue::Enum(a), FrozenValue::Enum(b)) => a == b,
            _ => false,
        }
    }
}

impl FrozenValue {
    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as unix milliseconds.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as array.
    pub fn as_array(&self) -> Option<&FrozenArray> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as struct.
    pub fn as_struct(&self) -> Option<&FrozenStruct> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as enum.
    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// Struct field access by display name.
    pub fn field(&self, name: &str) -> Option<&FrozenValue> {
        self.as_struct().and_then(|s| s.field(name))
    }

    /// Timestamp constructor (disambiguates from [`FrozenValue::Int`]).
    pub fn timestamp(unix_millis: i64) -> Self {
        Self::Timestamp(unix_millis)
    }

    /// Whether this value equals the declared default of `ty`.
    pub fn is_default(&self, ty: &TypeRef) -> bool {
        match (self, ty) {
            (FrozenValue::Null, TypeRef::Optional(_)) => true,
            (FrozenValue::Bool(v), TypeRef::Bool) => !*v,
            (FrozenValue::Int(v), TypeRef::Int) => *v == 0,
            (FrozenValue::Float(v), TypeRef::Float) => *v == 0.0,
            (FrozenValue::Str(v), TypeRef::String) => v.is_empty(),
            (FrozenValue::Bytes(v), TypeRef::Bytes) => v.is_empty(),
            (FrozenValue::Timestamp(v), TypeRef::Timestamp) => *v == 0,
            (FrozenValue::Array(v), TypeRef::Array { .. }) => v.is_empty(),
            (FrozenValue::Struct(v), TypeRef::Struct(desc)) => v
                .slots
                .iter()
                .zip(desc.fields())
                .all(|(slot, field)| slot.is_default(&field.ty)),
            // Unrecognized states never compare equal to the default constant.
            (FrozenValue::Enum(_), TypeRef::Enum(desc)) => *self == desc.default_value(),
            _ => false,
        }
    }
}

impl From<bool> for FrozenValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FrozenValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FrozenValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for FrozenValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FrozenValue {
    fn from(v: &str) -> Self {
        Self::Str(Arc::from(v))
    }
}

impl From<String> for FrozenValue {
    fn from(v: String) -> Self {
        Self::Str(Arc::from(v.as_str()))
    }
}

impl From<Vec<u8>> for FrozenValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(v.as_slice()))
    }
}

impl From<Vec<FrozenValue>> for FrozenValue {
    fn from(v: Vec<FrozenValue>) -> Self {
        Self::Array(Arc::new(FrozenArray::new(v)))
    }
}

/// A frozen struct: one slot per schema field, ordered by field number.
#[derive(Debug)]
pub struct FrozenStruct {
    pub(crate) descriptor: Arc<StructDescriptor>,
    pub(crate) slots: Vec<FrozenValue>,
}

impl PartialEq for FrozenStruct {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name() == other.descriptor.name() && self.slots == other.slots
    }
}

impl FrozenStruct {
    /// Construct a frozen struct from `(display name, value)` pairs.
    /// Unspecified fields take the type's declared default. An unknown field
    /// name is a [`SkirError::SchemaViolation`].
    pub fn create<'a>(
        descriptor: &Arc<StructDescriptor>,
        fields: impl IntoIterator<Item = (&'a str, FrozenValue)>,
    ) -> Result<FrozenValue> {
        let mut slots: Vec<Option<FrozenValue>> = vec![None; descriptor.fields().len()];
        for (name, value) in fields {
            let slot = descriptor.slot(name).ok_or_else(|| {
                SkirError::schema(format!(
                    "struct '{}': unknown field '{name}'",
                    descriptor.name()
                ))
            })?;
            slots[slot] = Some(value);
        }
        let slots = slots
            .into_iter()
            .zip(descriptor.fields())
            .map(|(slot, field)| slot.unwrap_or_else(|| field.ty.default_value()))
            .collect();
        Ok(FrozenValue::Struct(Arc::new(FrozenStruct {
            descriptor: Arc::clone(descriptor),
            slots,
        })))
    }

    pub(crate) fn from_slots(descriptor: Arc<StructDescriptor>, slots: Vec<FrozenValue>) -> Self {
        debug_assert_eq!(slots.len(), descriptor.fields().len());
        FrozenStruct { descriptor, slots }
    }

    /// The struct's schema.
    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    /// Slots ordered by field number.
    pub fn slots(&self) -> &[FrozenValue] {
        &self.slots
    }

    /// Field access by display name.
    pub fn field(&self, name: &str) -> Option<&FrozenValue> {
        self.descriptor.slot(name).map(|slot| &self.slots[slot])
    }
}

/// A frozen ordered sequence with an optional lazily built key index.
///
/// The index is published through a `OnceLock`: concurrent first-time lookups
/// may build it redundantly, but readers only ever observe a complete index.
/// The cached entry remembers which key slot it was built for, so lookups by
/// a different key field stay correct.
#[derive(Debug)]
pub struct FrozenArray {
    pub(crate) elems: Vec<FrozenValue>,
    pub(crate) index: OnceLock<(usize, HashMap<KeyValue, usize>)>,
}

impl PartialEq for FrozenArray {
    fn eq(&self, other: &Self) -> bool {
        // The cached index is derived state and never part of value identity.
        self.elems == other.elems
    }
}

impl FrozenArray {
    /// Wrap a sequence of frozen elements.
    pub fn new(elems: Vec<FrozenValue>) -> Self {
        FrozenArray {
            elems,
            index: OnceLock::new(),
        }
    }

    /// Elements in order.
    pub fn elems(&self) -> &[FrozenValue] {
        &self.elems
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Element access by position.
    pub fn get(&self, index: usize) -> Option<&FrozenValue> {
        self.elems.get(index)
    }
}

/// Raw discriminator of an enum variant unknown to this schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTag {
    /// Numeric wire discriminator (dense JSON, binary).
    Number(u64),
    /// Display name (readable JSON only; has no numeric wire identity).
    Name(String),
}

/// Captured payload of an unknown data variant, kept verbatim so re-encoding
/// reproduces the original output byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownPayload {
    /// Payload as decoded from one of the JSON formats.
    Json(serde_json::Value),
    /// Raw payload bytes as decoded from the binary format.
    Binary(Vec<u8>),
}

/// An enum discriminator (and payload) absent from this schema version.
/// Forward compatibility: this is a legitimate value state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownVariant {
    /// The unrecognized discriminator.
    pub tag: RawTag,
    /// The unrecognized payload, if the variant carried one.
    pub payload: Option<UnknownPayload>,
}

/// Internal enum state. Exactly one of constant / data / unrecognized.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumState {
    /// Declared zero-payload variant.
    Constant {
        /// Wire discriminator.
        number: u32,
        /// Display name.
        name: Arc<str>,
    },
    /// Declared data-carrying variant.
    Data {
        /// Wire discriminator.
        number: u32,
        /// Display name.
        name: Arc<str>,
        /// Carried value.
        value: FrozenValue,
    },
    /// Discriminator not known to this schema version.
    Unrecognized(UnknownVariant),
}

/// A frozen enum value.
#[derive(Debug)]
pub struct EnumValue {
    enum_name: Arc<str>,
    state: EnumState,
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.enum_name == other.enum_name && self.state == other.state
    }
}

/// Borrowed, exhaustively matchable view of an enum value. The unrecognized
/// case is part of the closed set, so `match` arms cover forward
/// compatibility explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnumKind<'a> {
    /// A declared constant variant.
    Constant(&'a str),
    /// A declared data variant and its payload.
    Data(&'a str, &'a FrozenValue),
    /// A variant unknown to this schema version.
    Unrecognized,
}

impl EnumValue {
    pub(crate) fn new(enum_name: Arc<str>, state: EnumState) -> Self {
        EnumValue { enum_name, state }
    }

    /// Name of the enum type this value belongs to.
    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    /// The internal state.
    pub fn state(&self) -> &EnumState {
        &self.state
    }

    /// Exhaustively matchable discriminator view.
    pub fn kind(&self) -> EnumKind<'_> {
        match &self.state {
            EnumState::Constant { name, .. } => EnumKind::Constant(name),
            EnumState::Data { name, value, .. } => EnumKind::Data(name, value),
            EnumState::Unrecognized(_) => EnumKind::Unrecognized,
        }
    }

    /// Wire discriminator, if this value has one in this schema version.
    pub fn number(&self) -> Option<u32> {
        match &self.state {
            EnumState::Constant { number, .. } | EnumState::Data { number, .. } => Some(*number),
            EnumState::Unrecognized(_) => None,
        }
    }

    /// The carried value of a data variant.
    pub fn value(&self) -> Option<&FrozenValue> {
        match &self.state {
            EnumState::Data { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl TypeRef {
    /// The recursively composed default ("zero") value of this type.
    pub fn default_value(&self) -> FrozenValue {
        match self {
            TypeRef::Bool => FrozenValue::Bool(false),
            TypeRef::Int => FrozenValue::Int(0),
            TypeRef::Float => FrozenValue::Float(0.0),
            TypeRef::String => FrozenValue::Str(Arc::from("")),
            TypeRef::Bytes => FrozenValue::Bytes(Arc::from(&[][..])),
            TypeRef::Timestamp => FrozenValue::Timestamp(0),
            TypeRef::Optional(_) => FrozenValue::Null,
            TypeRef::Array { .. } => FrozenValue::Array(Arc::new(FrozenArray::new(Vec::new()))),
            TypeRef::Struct(desc) => desc
                .default_cell
                .get_or_init(|| {
                    let slots = desc.fields().iter().map(|f| f.ty.default_value()).collect();
                    FrozenValue::Struct(Arc::new(FrozenStruct::from_slots(
                        Arc::clone(desc),
                        slots,
                    )))
                })
                .clone(),
            TypeRef::Enum(desc) => desc.default_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDescriptor, FieldDescriptor, VariantDescriptor};

    fn user_desc() -> Arc<StructDescriptor> {
        StructDescriptor::new(
            "User",
            vec![
                FieldDescriptor::new("user_id", 0, TypeRef::Int),
                FieldDescriptor::new("name", 1, TypeRef::String),
                FieldDescriptor::new("quote", 2, TypeRef::String),
            ],
        )
        .expect("valid schema")
    }

    #[test]
    fn create_fills_defaults() {
        let desc = user_desc();
        let jane = FrozenStruct::create(&desc, [("user_id", 43.into()), ("name", "Jane Doe".into())])
            .expect("create");
        assert_eq!(jane.field("quote").and_then(FrozenValue::as_str), Some(""));
        assert_eq!(jane.field("user_id").and_then(FrozenValue::as_int), Some(43));
    }

    #[test]
    fn create_rejects_unknown_field() {
        let desc = user_desc();
        let err = FrozenStruct::create(&desc, [("foo", FrozenValue::Int(1))]).unwrap_err();
        assert!(matches!(err, SkirError::SchemaViolation(_)));
    }

    #[test]
    fn default_equality_law() {
        let desc = user_desc();
        let ty = TypeRef::Struct(Arc::clone(&desc));
        let default = ty.default_value();
        let explicit = FrozenStruct::create(
            &desc,
            [("user_id", 0.into()), ("name", "".into()), ("quote", "".into())],
        )
        .expect("create");
        assert_eq!(default, explicit);
        assert!(explicit.is_default(&ty));

        let nonzero = FrozenStruct::create(&desc, [("user_id", 1.into())]).expect("create");
        assert_ne!(default, nonzero);
        assert!(!nonzero.is_default(&ty));
    }

    #[test]
    fn struct_default_is_cached() {
        let desc = user_desc();
        let ty = TypeRef::Struct(Arc::clone(&desc));
        match (ty.default_value(), ty.default_value()) {
            (FrozenValue::Struct(a), FrozenValue::Struct(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected struct defaults"),
        }
    }

    #[test]
    fn unrecognized_is_never_default() {
        let desc = EnumDescriptor::new(
            "Status",
            vec![VariantDescriptor::constant("UNKNOWN", 0)],
        )
        .expect("valid schema");
        let ty = TypeRef::Enum(Arc::clone(&desc));
        let unknown = desc.of_unrecognized(UnknownVariant {
            tag: RawTag::Number(99),
            payload: None,
        });
        assert!(!unknown.is_default(&ty));
        assert!(desc.default_value().is_default(&ty));
    }

    #[test]
    fn enum_kind_exposes_unrecognized() {
        let desc = EnumDescriptor::new(
            "Status",
            vec![
                VariantDescriptor::constant("UNKNOWN", 0),
                VariantDescriptor::data("trial", 2, TypeRef::Timestamp),
            ],
        )
        .expect("valid schema");

        let free = desc.of_constant("UNKNOWN").expect("constant");
        let trial = desc
            .of_data("trial", FrozenValue::Timestamp(1234))
            .expect("data");
        let unknown = desc.of_unrecognized(UnknownVariant {
            tag: RawTag::Number(7),
            payload: None,
        });

        let kind_of = |v: &FrozenValue| match v.as_enum().expect("enum").kind() {
            EnumKind::Constant(name) => format!("const:{name}"),
            EnumKind::Data(name, value) => {
                format!("data:{name}:{}", value.as_timestamp().expect("ts"))
            }
            EnumKind::Unrecognized => "?".to_string(),
        };
        assert_eq!(kind_of(&free), "const:UNKNOWN");
        assert_eq!(kind_of(&trial), "data:trial:1234");
        assert_eq!(kind_of(&unknown), "?");
    }
}
