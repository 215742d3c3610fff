//! Dense and readable JSON encodings.
//!
//! Dense JSON addresses struct fields positionally: array index = field
//! number. Trailing fields equal to their default are truncated; interior
//! defaulted fields emit their default token; numbers with no field in this
//! schema version emit `null` and are skipped on decode. Renaming a field
//! never changes dense output.
//!
//! Readable JSON addresses fields by display name and omits every
//! default-valued field. It is for humans: renames change its keys, and it is
//! not guaranteed to stay parseable across them.
//!
//! Struct decoding auto-detects the flavor: a JSON array is dense, an object
//! is readable.

use crate::error::{constants, Result, SkirError};
use crate::schema::{EnumDescriptor, StructDescriptor, TypeRef};
use crate::value::{
    EnumState, FrozenArray, FrozenStruct, FrozenValue, RawTag, UnknownPayload, UnknownVariant,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub(crate) fn encode(value: &FrozenValue, ty: &TypeRef, readable: bool) -> Result<Value> {
    match (value, ty) {
        (FrozenValue::Null, TypeRef::Optional(_)) => Ok(Value::Null),
        (v, TypeRef::Optional(inner)) => encode(v, inner, readable),
        (FrozenValue::Bool(v), TypeRef::Bool) => Ok(json!(v)),
        (FrozenValue::Int(v), TypeRef::Int) => Ok(json!(v)),
        (FrozenValue::Float(v), TypeRef::Float) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .ok_or_else(|| SkirError::schema("non-finite float cannot be encoded as JSON")),
        (FrozenValue::Str(v), TypeRef::String) => Ok(json!(v.as_ref())),
        (FrozenValue::Bytes(v), TypeRef::Bytes) => Ok(json!(BASE64.encode(v.as_ref()))),
        (FrozenValue::Timestamp(v), TypeRef::Timestamp) => Ok(json!(v)),
        (FrozenValue::Array(v), TypeRef::Array { elem, .. }) => {
            let elems = v
                .elems()
                .iter()
                .map(|e| encode(e, elem, readable))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(elems))
        }
        (FrozenValue::Struct(v), TypeRef::Struct(desc)) => {
            check_struct_type(v, desc)?;
            if readable {
                encode_struct_readable(v, desc)
            } else {
                encode_struct_dense(v, desc)
            }
        }
        (FrozenValue::Enum(v), TypeRef::Enum(desc)) => encode_enum(v.state(), desc, readable),
        (value, ty) => Err(SkirError::schema(format!(
            "value {value:?} does not match type '{}'",
            ty.name()
        ))),
    }
}

fn check_struct_type(value: &FrozenStruct, desc: &Arc<StructDescriptor>) -> Result<()> {
    if Arc::ptr_eq(value.descriptor(), desc) || value.descriptor().as_ref() == desc.as_ref() {
        Ok(())
    } else {
        Err(SkirError::schema(format!(
            "struct value of type '{}' where '{}' expected",
            value.descriptor().name(),
            desc.name()
        )))
    }
}

fn encode_struct_dense(value: &FrozenStruct, desc: &StructDescriptor) -> Result<Value> {
    let fields = desc.fields();
    let slots = value.slots();
    // Trailing-default truncation: find the last slot carrying a non-default
    // value; everything after it is omitted.
    let last = fields
        .iter()
        .enumerate()
        .rev()
        .find(|(i, f)| !slots[*i].is_default(&f.ty));
    let Some((last, last_field)) = last else {
        return Ok(Value::Array(Vec::new()));
    };
    let mut out = Vec::with_capacity(last_field.number as usize + 1);
    for number in 0..=last_field.number {
        match desc.field_by_number(number) {
            Some((i, field)) if i <= last => out.push(encode(&slots[i], &field.ty, false)?),
            // A number with no field in this schema version: emit the gap
            // token so positions stay aligned.
            _ => out.push(Value::Null),
        }
    }
    Ok(Value::Array(out))
}

fn encode_struct_readable(value: &FrozenStruct, desc: &StructDescriptor) -> Result<Value> {
    let mut out = Map::new();
    for (slot, field) in desc.fields().iter().enumerate() {
        let v = &value.slots()[slot];
        if !v.is_default(&field.ty) {
            out.insert(field.name.clone(), encode(v, &field.ty, true)?);
        }
    }
    Ok(Value::Object(out))
}

fn encode_enum(state: &EnumState, desc: &EnumDescriptor, readable: bool) -> Result<Value> {
    match state {
        EnumState::Constant { number, name } => {
            if readable {
                Ok(json!(name.as_ref()))
            } else {
                Ok(json!(number))
            }
        }
        EnumState::Data {
            number,
            name,
            value,
        } => {
            let payload_ty = desc
                .variant_by_number(*number)
                .and_then(|v| v.payload.as_ref())
                .ok_or_else(|| {
                    SkirError::schema(format!(
                        "enum '{}': value does not belong to this schema (variant {number})",
                        desc.name()
                    ))
                })?;
            let payload = encode(value, payload_ty, readable)?;
            if readable {
                Ok(json!({"kind": name.as_ref(), "value": payload}))
            } else {
                Ok(json!([number, payload]))
            }
        }
        EnumState::Unrecognized(unknown) => encode_unknown_enum(unknown, readable),
    }
}

fn encode_unknown_enum(unknown: &UnknownVariant, readable: bool) -> Result<Value> {
    let captured = match &unknown.payload {
        None => None,
        Some(UnknownPayload::Json(v)) => Some(v.clone()),
        Some(UnknownPayload::Binary(_)) => {
            return Err(SkirError::schema(
                "unrecognized variant captured from binary cannot be re-encoded as JSON",
            ))
        }
    };
    if readable {
        // Display only: the numeric identity is not echoed.
        return Ok(match captured {
            Some(v) => json!({"kind": "?", "value": v}),
            None => json!("?"),
        });
    }
    let tag = match &unknown.tag {
        RawTag::Number(n) => json!(n),
        RawTag::Name(s) => json!(s),
    };
    Ok(match captured {
        Some(v) => json!([tag, v]),
        None => tag,
    })
}

pub(crate) fn decode(ty: &TypeRef, value: &Value, depth: usize) -> Result<FrozenValue> {
    if depth == 0 {
        return Err(SkirError::malformed(constants::ERR_DEPTH_LIMIT));
    }
    match ty {
        TypeRef::Bool => value
            .as_bool()
            .map(FrozenValue::Bool)
            .ok_or_else(|| expected("bool", value)),
        TypeRef::Int => value
            .as_i64()
            .map(FrozenValue::Int)
            .ok_or_else(|| expected("integer", value)),
        TypeRef::Float => value
            .as_f64()
            .map(FrozenValue::Float)
            .ok_or_else(|| expected("number", value)),
        TypeRef::String => value
            .as_str()
            .map(FrozenValue::from)
            .ok_or_else(|| expected("string", value)),
        TypeRef::Bytes => {
            let text = value.as_str().ok_or_else(|| expected("base64 string", value))?;
            let bytes = BASE64
                .decode(text)
                .map_err(|e| SkirError::malformed(format!("invalid base64: {e}")))?;
            Ok(FrozenValue::from(bytes))
        }
        TypeRef::Timestamp => value
            .as_i64()
            .map(FrozenValue::Timestamp)
            .ok_or_else(|| expected("unix-millis integer", value)),
        TypeRef::Optional(inner) => {
            if value.is_null() {
                Ok(FrozenValue::Null)
            } else {
                decode(inner, value, depth)
            }
        }
        TypeRef::Array { elem, .. } => {
            let items = value.as_array().ok_or_else(|| expected("array", value))?;
            let elems = items
                .iter()
                .map(|item| decode(elem, item, depth - 1))
                .collect::<Result<Vec<_>>>()?;
            Ok(FrozenValue::Array(Arc::new(FrozenArray::new(elems))))
        }
        TypeRef::Struct(desc) => match value {
            Value::Array(positions) => decode_struct_dense(desc, positions, depth),
            Value::Object(entries) => decode_struct_readable(desc, entries, depth),
            other => Err(expected("struct (array or object)", other)),
        },
        TypeRef::Enum(desc) => decode_enum(desc, value, depth),
    }
}

fn decode_struct_dense(
    desc: &Arc<StructDescriptor>,
    positions: &[Value],
    depth: usize,
) -> Result<FrozenValue> {
    let slots = desc
        .fields()
        .iter()
        .map(|field| match positions.get(field.number as usize) {
            // Truncated trailing fields and gap tokens take the default.
            None | Some(Value::Null) => Ok(field.ty.default_value()),
            Some(v) => decode(&field.ty, v, depth - 1),
        })
        .collect::<Result<Vec<_>>>()?;
    // Positions beyond the known fields belong to a newer schema version and
    // are skipped.
    Ok(FrozenValue::Struct(Arc::new(FrozenStruct::from_slots(
        Arc::clone(desc),
        slots,
    ))))
}

fn decode_struct_readable(
    desc: &Arc<StructDescriptor>,
    entries: &Map<String, Value>,
    depth: usize,
) -> Result<FrozenValue> {
    let slots = desc
        .fields()
        .iter()
        .map(|field| match entries.get(&field.name) {
            None => Ok(field.ty.default_value()),
            Some(v) => decode(&field.ty, v, depth - 1),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FrozenValue::Struct(Arc::new(FrozenStruct::from_slots(
        Arc::clone(desc),
        slots,
    ))))
}

fn decode_enum(desc: &Arc<EnumDescriptor>, value: &Value, depth: usize) -> Result<FrozenValue> {
    match value {
        // Bare discriminator: a constant variant or an unknown one.
        Value::Number(_) => {
            let number = enum_number(value)?;
            match u32::try_from(number).ok().and_then(|n| desc.variant_by_number(n)) {
                Some(variant) if variant.is_constant() => desc.of_constant(&variant.name),
                Some(variant) => Err(SkirError::malformed(format!(
                    "enum '{}': data variant '{}' without payload",
                    desc.name(),
                    variant.name
                ))),
                None => Ok(desc.of_unrecognized(UnknownVariant {
                    tag: RawTag::Number(number),
                    payload: None,
                })),
            }
        }
        Value::String(name) => decode_enum_by_name(desc, name, None, depth),
        // [discriminator, payload]: a data variant or an unknown one.
        Value::Array(parts) => {
            let [tag, payload] = parts.as_slice() else {
                return Err(SkirError::malformed(format!(
                    "enum '{}': expected [discriminator, payload]",
                    desc.name()
                )));
            };
            match tag {
                Value::Number(_) => {
                    let number = enum_number(tag)?;
                    match u32::try_from(number).ok().and_then(|n| desc.variant_by_number(n)) {
                        Some(variant) => match &variant.payload {
                            Some(ty) => {
                                let value = decode(ty, payload, depth - 1)?;
                                desc.of_data(&variant.name, value)
                            }
                            None => Err(SkirError::malformed(format!(
                                "enum '{}': constant variant '{}' with payload",
                                desc.name(),
                                variant.name
                            ))),
                        },
                        None => Ok(desc.of_unrecognized(UnknownVariant {
                            tag: RawTag::Number(number),
                            payload: Some(UnknownPayload::Json(payload.clone())),
                        })),
                    }
                }
                Value::String(name) => decode_enum_by_name(desc, name, Some(payload), depth),
                other => Err(expected("enum discriminator", other)),
            }
        }
        // Readable data form.
        Value::Object(entries) => {
            let kind = entries
                .get("kind")
                .and_then(Value::as_str)
                .ok_or_else(|| SkirError::malformed("enum object without 'kind'"))?;
            decode_enum_by_name(desc, kind, entries.get("value"), depth)
        }
        other => Err(expected("enum value", other)),
    }
}

fn decode_enum_by_name(
    desc: &Arc<EnumDescriptor>,
    name: &str,
    payload: Option<&Value>,
    depth: usize,
) -> Result<FrozenValue> {
    match desc.variant(name) {
        Some(variant) => match (&variant.payload, payload) {
            (None, None) => desc.of_constant(name),
            (Some(ty), Some(payload)) => {
                let value = decode(ty, payload, depth - 1)?;
                desc.of_data(name, value)
            }
            (None, Some(_)) => Err(SkirError::malformed(format!(
                "enum '{}': constant variant '{name}' with payload",
                desc.name()
            ))),
            (Some(_), None) => Err(SkirError::malformed(format!(
                "enum '{}': data variant '{name}' without payload",
                desc.name()
            ))),
        },
        // Unknown display name (including the "?" marker): unrecognized.
        None => Ok(desc.of_unrecognized(UnknownVariant {
            tag: RawTag::Name(name.to_string()),
            payload: payload.map(|v| UnknownPayload::Json(v.clone())),
        })),
    }
}

fn enum_number(value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| expected("non-negative discriminator", value))
}

fn expected(what: &str, got: &Value) -> SkirError {
    SkirError::malformed(format!("expected {what}, got {got}"))
}
