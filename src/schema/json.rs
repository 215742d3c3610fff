//! Descriptor serialization.
//!
//! Type descriptors serialize to a stable, version-tolerant JSON shape and
//! can be reconstructed from it, so a process can introspect a peer's schema
//! without the original schema source. Unknown object keys are ignored on
//! parse; a missing or unknown `kind` is a [`SkirError::MalformedPayload`].
//!
//! The mapping is hand-specified over `serde_json::Value`: descriptors are
//! plain data, no host-language reflection is involved.

use crate::error::{Result, SkirError};
use crate::schema::{
    EnumDescriptor, FieldDescriptor, StructDescriptor, TypeRef, VariantDescriptor,
};
use serde_json::{json, Value};

impl TypeRef {
    /// Serialize this type (and every nested type) to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            TypeRef::Bool => json!({"kind": "bool"}),
            TypeRef::Int => json!({"kind": "int"}),
            TypeRef::Float => json!({"kind": "float"}),
            TypeRef::String => json!({"kind": "string"}),
            TypeRef::Bytes => json!({"kind": "bytes"}),
            TypeRef::Timestamp => json!({"kind": "timestamp"}),
            TypeRef::Optional(inner) => json!({"kind": "optional", "item": inner.to_json()}),
            TypeRef::Array { elem, key_field } => match key_field {
                Some(key) => json!({"kind": "array", "item": elem.to_json(), "key_field": key}),
                None => json!({"kind": "array", "item": elem.to_json()}),
            },
            TypeRef::Struct(desc) => {
                let fields: Vec<Value> = desc
                    .fields()
                    .iter()
                    .map(|f| {
                        json!({
                            "name": f.name,
                            "number": f.number,
                            "type": f.ty.to_json(),
                        })
                    })
                    .collect();
                json!({"kind": "struct", "name": desc.name(), "fields": fields})
            }
            TypeRef::Enum(desc) => {
                let variants: Vec<Value> = desc
                    .variants()
                    .iter()
                    .map(|v| match &v.payload {
                        Some(ty) => json!({
                            "name": v.name,
                            "number": v.number,
                            "type": ty.to_json(),
                        }),
                        None => json!({"name": v.name, "number": v.number}),
                    })
                    .collect();
                json!({"kind": "enum", "name": desc.name(), "variants": variants})
            }
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json_code(&self) -> String {
        self.to_json().to_string()
    }

    /// Reconstruct a type from its JSON form.
    pub fn from_json(value: &Value) -> Result<TypeRef> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SkirError::malformed("type descriptor without 'kind'"))?;
        match kind {
            "bool" => Ok(TypeRef::Bool),
            "int" => Ok(TypeRef::Int),
            "float" => Ok(TypeRef::Float),
            "string" => Ok(TypeRef::String),
            "bytes" => Ok(TypeRef::Bytes),
            "timestamp" => Ok(TypeRef::Timestamp),
            "optional" => Ok(TypeRef::Optional(Box::new(Self::from_json(item_of(
                value,
            )?)?))),
            "array" => Ok(TypeRef::Array {
                elem: Box::new(Self::from_json(item_of(value)?)?),
                key_field: value
                    .get("key_field")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            "struct" => {
                let name = name_of(value)?;
                let fields = value
                    .get("fields")
                    .and_then(Value::as_array)
                    .ok_or_else(|| SkirError::malformed("struct descriptor without 'fields'"))?
                    .iter()
                    .map(parse_field)
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeRef::Struct(StructDescriptor::new(name, fields)?))
            }
            "enum" => {
                let name = name_of(value)?;
                let variants = value
                    .get("variants")
                    .and_then(Value::as_array)
                    .ok_or_else(|| SkirError::malformed("enum descriptor without 'variants'"))?
                    .iter()
                    .map(parse_variant)
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeRef::Enum(EnumDescriptor::new(name, variants)?))
            }
            other => Err(SkirError::malformed(format!(
                "unknown type descriptor kind '{other}'"
            ))),
        }
    }

    /// Reconstruct a type from a JSON string.
    pub fn from_json_code(code: &str) -> Result<TypeRef> {
        let value: Value = serde_json::from_str(code)
            .map_err(|e| SkirError::malformed(format!("invalid descriptor JSON: {e}")))?;
        Self::from_json(&value)
    }
}

fn item_of(value: &Value) -> Result<&Value> {
    value
        .get("item")
        .ok_or_else(|| SkirError::malformed("wrapper descriptor without 'item'"))
}

fn name_of(value: &Value) -> Result<&str> {
    value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SkirError::malformed("descriptor without 'name'"))
}

fn number_of(value: &Value) -> Result<u32> {
    value
        .get("number")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| SkirError::malformed("descriptor without valid 'number'"))
}

fn parse_field(value: &Value) -> Result<FieldDescriptor> {
    let ty = value
        .get("type")
        .ok_or_else(|| SkirError::malformed("field descriptor without 'type'"))?;
    Ok(FieldDescriptor::new(
        name_of(value)?,
        number_of(value)?,
        TypeRef::from_json(ty)?,
    ))
}

fn parse_variant(value: &Value) -> Result<VariantDescriptor> {
    let name = name_of(value)?;
    let number = number_of(value)?;
    Ok(match value.get("type") {
        Some(ty) => VariantDescriptor::data(name, number, TypeRef::from_json(ty)?),
        None => VariantDescriptor::constant(name, number),
    })
}
