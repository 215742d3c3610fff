//! Binary wire format.
//!
//! Length-prefixed and field-number-tagged, like the dense JSON format but
//! byte-oriented:
//!
//! - varints are unsigned LEB128; signed values (int, timestamp) are zigzag
//!   mapped first
//! - `bool` is one byte, `float` is 8 bytes little-endian
//! - `string` and `bytes` are a varint length followed by the raw bytes
//! - optionals are a presence byte, then the inner value if present
//! - arrays are a varint element count followed by the elements
//! - structs are a varint count of present (non-default) fields, then per
//!   field: varint field number, varint byte length, encoded value, in
//!   ascending number order; decoders skip unknown numbers by length
//! - enums are a varint `(number << 1) | has_payload` discriminator; a
//!   payload follows as varint length plus bytes
//!
//! Unknown enum discriminators capture their raw payload bytes and re-encode
//! byte-identically. Decoding is all-or-nothing: truncated input, trailing
//! bytes, and length prefixes overrunning the buffer are all
//! [`SkirError::MalformedPayload`].

use crate::error::{constants, Result, SkirError};
use crate::schema::{EnumDescriptor, StructDescriptor, TypeRef};
use crate::value::{
    EnumState, FrozenArray, FrozenStruct, FrozenValue, RawTag, UnknownPayload, UnknownVariant,
};
use bytes::{Buf, BufMut};
use std::sync::Arc;

pub(crate) fn encode(value: &FrozenValue, ty: &TypeRef) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, value, ty)?;
    Ok(out)
}

pub(crate) fn decode(ty: &TypeRef, bytes: &[u8], max_depth: usize) -> Result<FrozenValue> {
    let mut buf = bytes;
    let value = read_value(&mut buf, ty, max_depth)?;
    if buf.has_remaining() {
        return Err(SkirError::malformed(constants::ERR_TRAILING_BYTES));
    }
    Ok(value)
}

fn write_value(out: &mut Vec<u8>, value: &FrozenValue, ty: &TypeRef) -> Result<()> {
    match (value, ty) {
        (FrozenValue::Null, TypeRef::Optional(_)) => {
            out.put_u8(0x00);
            Ok(())
        }
        (v, TypeRef::Optional(inner)) => {
            out.put_u8(0x01);
            write_value(out, v, inner)
        }
        (FrozenValue::Bool(v), TypeRef::Bool) => {
            out.put_u8(u8::from(*v));
            Ok(())
        }
        (FrozenValue::Int(v), TypeRef::Int)
        | (FrozenValue::Timestamp(v), TypeRef::Timestamp) => {
            write_varint(out, zigzag(*v));
            Ok(())
        }
        (FrozenValue::Float(v), TypeRef::Float) => {
            out.put_f64_le(*v);
            Ok(())
        }
        (FrozenValue::Str(v), TypeRef::String) => {
            write_varint(out, v.len() as u64);
            out.put_slice(v.as_bytes());
            Ok(())
        }
        (FrozenValue::Bytes(v), TypeRef::Bytes) => {
            write_varint(out, v.len() as u64);
            out.put_slice(v);
            Ok(())
        }
        (FrozenValue::Array(v), TypeRef::Array { elem, .. }) => {
            write_varint(out, v.len() as u64);
            for item in v.elems() {
                write_value(out, item, elem)?;
            }
            Ok(())
        }
        (FrozenValue::Struct(v), TypeRef::Struct(desc)) => write_struct(out, v, desc),
        (FrozenValue::Enum(v), TypeRef::Enum(_)) => write_enum(out, v.state(), ty),
        (value, ty) => Err(SkirError::schema(format!(
            "value {value:?} does not match type '{}'",
            ty.name()
        ))),
    }
}

fn write_struct(out: &mut Vec<u8>, value: &FrozenStruct, desc: &Arc<StructDescriptor>) -> Result<()> {
    if !Arc::ptr_eq(value.descriptor(), desc) && value.descriptor().as_ref() != desc.as_ref() {
        return Err(SkirError::schema(format!(
            "struct value of type '{}' where '{}' expected",
            value.descriptor().name(),
            desc.name()
        )));
    }
    let slots = value.slots();
    let present: Vec<usize> = desc
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, f)| !slots[*i].is_default(&f.ty))
        .map(|(i, _)| i)
        .collect();
    write_varint(out, present.len() as u64);
    // Fields are stored ascending by number, so this emits ascending tags.
    let mut scratch = Vec::new();
    for i in present {
        let field = &desc.fields()[i];
        scratch.clear();
        write_value(&mut scratch, &slots[i], &field.ty)?;
        write_varint(out, u64::from(field.number));
        write_varint(out, scratch.len() as u64);
        out.put_slice(&scratch);
    }
    Ok(())
}

fn write_enum(out: &mut Vec<u8>, state: &EnumState, ty: &TypeRef) -> Result<()> {
    let TypeRef::Enum(desc) = ty else {
        return Err(SkirError::schema("enum value with non-enum type".to_string()));
    };
    match state {
        EnumState::Constant { number, .. } => {
            write_varint(out, u64::from(*number) << 1);
            Ok(())
        }
        EnumState::Data { number, value, .. } => {
            let payload_ty = desc
                .variant_by_number(*number)
                .and_then(|v| v.payload.as_ref())
                .ok_or_else(|| {
                    SkirError::schema(format!(
                        "enum '{}': value does not belong to this schema (variant {number})",
                        desc.name()
                    ))
                })?;
            write_varint(out, (u64::from(*number) << 1) | 1);
            let mut scratch = Vec::new();
            write_value(&mut scratch, value, payload_ty)?;
            write_varint(out, scratch.len() as u64);
            out.put_slice(&scratch);
            Ok(())
        }
        EnumState::Unrecognized(unknown) => {
            let RawTag::Number(number) = unknown.tag else {
                return Err(SkirError::schema(
                    "unrecognized variant with a name tag has no binary identity",
                ));
            };
            match &unknown.payload {
                None => {
                    write_varint(out, number << 1);
                    Ok(())
                }
                Some(UnknownPayload::Binary(raw)) => {
                    write_varint(out, (number << 1) | 1);
                    write_varint(out, raw.len() as u64);
                    out.put_slice(raw);
                    Ok(())
                }
                Some(UnknownPayload::Json(_)) => Err(SkirError::schema(
                    "unrecognized variant captured from JSON cannot be re-encoded as binary",
                )),
            }
        }
    }
}

fn read_value(buf: &mut &[u8], ty: &TypeRef, depth: usize) -> Result<FrozenValue> {
    if depth == 0 {
        return Err(SkirError::malformed(constants::ERR_DEPTH_LIMIT));
    }
    match ty {
        TypeRef::Bool => match read_u8(buf)? {
            0x00 => Ok(FrozenValue::Bool(false)),
            0x01 => Ok(FrozenValue::Bool(true)),
            other => Err(SkirError::malformed(format!("invalid bool byte {other:#04x}"))),
        },
        TypeRef::Int => Ok(FrozenValue::Int(unzigzag(read_varint(buf)?))),
        TypeRef::Timestamp => Ok(FrozenValue::Timestamp(unzigzag(read_varint(buf)?))),
        TypeRef::Float => {
            if buf.remaining() < 8 {
                return Err(SkirError::malformed(constants::ERR_TRUNCATED));
            }
            Ok(FrozenValue::Float(buf.get_f64_le()))
        }
        TypeRef::String => {
            let raw = read_len_prefixed(buf)?;
            let text = std::str::from_utf8(raw)
                .map_err(|e| SkirError::malformed(format!("invalid UTF-8 string: {e}")))?;
            Ok(FrozenValue::from(text))
        }
        TypeRef::Bytes => Ok(FrozenValue::from(read_len_prefixed(buf)?.to_vec())),
        TypeRef::Optional(inner) => match read_u8(buf)? {
            0x00 => Ok(FrozenValue::Null),
            0x01 => read_value(buf, inner, depth),
            other => Err(SkirError::malformed(format!(
                "invalid presence byte {other:#04x}"
            ))),
        },
        TypeRef::Array { elem, .. } => {
            let count = read_varint(buf)?;
            // Every element takes at least one byte; a count past the buffer
            // is a truncation, not an allocation request.
            if count > buf.remaining() as u64 {
                return Err(SkirError::malformed(constants::ERR_TRUNCATED));
            }
            let mut elems = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elems.push(read_value(buf, elem, depth - 1)?);
            }
            Ok(FrozenValue::Array(Arc::new(FrozenArray::new(elems))))
        }
        TypeRef::Struct(desc) => read_struct(buf, desc, depth),
        TypeRef::Enum(desc) => read_enum(buf, desc, depth),
    }
}

fn read_struct(buf: &mut &[u8], desc: &Arc<StructDescriptor>, depth: usize) -> Result<FrozenValue> {
    let count = read_varint(buf)?;
    if count > buf.remaining() as u64 {
        return Err(SkirError::malformed(constants::ERR_TRUNCATED));
    }
    let mut slots: Vec<FrozenValue> = desc
        .fields()
        .iter()
        .map(|f| f.ty.default_value())
        .collect();
    for _ in 0..count {
        let number = read_varint(buf)?;
        let raw = read_len_prefixed(buf)?;
        // A number with no field in this schema version is skipped by its
        // encoded length.
        let known = u32::try_from(number)
            .ok()
            .and_then(|n| desc.field_by_number(n));
        if let Some((slot, field)) = known {
            let mut field_buf = raw;
            slots[slot] = read_value(&mut field_buf, &field.ty, depth - 1)?;
            if field_buf.has_remaining() {
                return Err(SkirError::malformed(constants::ERR_TRAILING_BYTES));
            }
        }
    }
    Ok(FrozenValue::Struct(Arc::new(FrozenStruct::from_slots(
        Arc::clone(desc),
        slots,
    ))))
}

fn read_enum(buf: &mut &[u8], desc: &Arc<EnumDescriptor>, depth: usize) -> Result<FrozenValue> {
    let tag = read_varint(buf)?;
    let number = tag >> 1;
    let has_payload = tag & 1 == 1;
    let known = u32::try_from(number)
        .ok()
        .and_then(|n| desc.variant_by_number(n));
    match known {
        Some(variant) => match (&variant.payload, has_payload) {
            (None, false) => desc.of_constant(&variant.name),
            (Some(ty), true) => {
                let raw = read_len_prefixed(buf)?;
                let mut payload_buf = raw;
                let value = read_value(&mut payload_buf, ty, depth - 1)?;
                if payload_buf.has_remaining() {
                    return Err(SkirError::malformed(constants::ERR_TRAILING_BYTES));
                }
                desc.of_data(&variant.name, value)
            }
            (None, true) => Err(SkirError::malformed(format!(
                "enum '{}': constant variant '{}' with payload",
                desc.name(),
                variant.name
            ))),
            (Some(_), false) => Err(SkirError::malformed(format!(
                "enum '{}': data variant '{}' without payload",
                desc.name(),
                variant.name
            ))),
        },
        None => {
            let payload = if has_payload {
                Some(UnknownPayload::Binary(read_len_prefixed(buf)?.to_vec()))
            } else {
                None
            };
            Ok(desc.of_unrecognized(UnknownVariant {
                tag: RawTag::Number(number),
                payload,
            }))
        }
    }
}

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

pub(crate) fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.put_u8(byte);
            return;
        }
        out.put_u8(byte | 0x80);
    }
}

pub(crate) fn read_varint(buf: &mut &[u8]) -> Result<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = read_u8(buf)?;
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            if shift == 63 && byte > 0x01 {
                return Err(SkirError::malformed("varint overflows 64 bits"));
            }
            return Ok(value);
        }
    }
    Err(SkirError::malformed("varint longer than 10 bytes"))
}

fn read_u8(buf: &mut &[u8]) -> Result<u8> {
    if !buf.has_remaining() {
        return Err(SkirError::malformed(constants::ERR_TRUNCATED));
    }
    Ok(buf.get_u8())
}

fn read_len_prefixed<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = read_varint(buf)?;
    if len > buf.remaining() as u64 {
        return Err(SkirError::malformed(constants::ERR_TRUNCATED));
    }
    let (raw, rest) = buf.split_at(len as usize);
    *buf = rest;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, VariantDescriptor};

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

    fn status_desc() -> Arc<EnumDescriptor> {
        EnumDescriptor::new(
            "SubscriptionStatus",
            vec![
                VariantDescriptor::constant("UNKNOWN", 0),
                VariantDescriptor::constant("FREE", 1),
                VariantDescriptor::constant("PREMIUM", 2),
                VariantDescriptor::data("trial", 3, TypeRef::Timestamp),
            ],
        )
        .expect("valid schema")
    }

    fn roundtrip(value: &FrozenValue, ty: &TypeRef) -> FrozenValue {
        let bytes = encode(value, ty).expect("encode");
        decode(ty, &bytes, 64).expect("decode")
    }

    #[test]
    fn zigzag_maps_small_magnitudes_small() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
        for v in [0, 1, -1, 300, -300, i64::MAX, i64::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn varint_limits() {
        let mut out = Vec::new();
        write_varint(&mut out, u64::MAX);
        assert_eq!(out.len(), 10);
        let mut buf: &[u8] = &out;
        assert_eq!(read_varint(&mut buf).expect("read"), u64::MAX);

        let overlong: &[u8] = &[0x80; 11];
        let mut buf = overlong;
        assert!(read_varint(&mut buf).is_err());
    }

    #[test]
    fn scalars_roundtrip() {
        for (value, ty) in [
            (FrozenValue::Bool(true), TypeRef::Bool),
            (FrozenValue::Int(-123456), TypeRef::Int),
            (FrozenValue::Float(2.5), TypeRef::Float),
            (FrozenValue::from("héllo"), TypeRef::String),
            (FrozenValue::from(vec![0u8, 255, 7]), TypeRef::Bytes),
            (FrozenValue::Timestamp(1734000000000), TypeRef::Timestamp),
            (FrozenValue::Null, TypeRef::Optional(Box::new(TypeRef::Int))),
            (FrozenValue::Int(5), TypeRef::Optional(Box::new(TypeRef::Int))),
        ] {
            assert_eq!(roundtrip(&value, &ty), value, "{ty:?}");
        }
    }

    #[test]
    fn default_struct_is_one_byte() {
        let desc = user_desc();
        let ty = TypeRef::Struct(Arc::clone(&desc));
        let bytes = encode(&ty.default_value(), &ty).expect("encode");
        assert_eq!(bytes, [0x00]);
        assert_eq!(decode(&ty, &bytes, 64).expect("decode"), ty.default_value());
    }

    #[test]
    fn struct_omits_defaults_and_roundtrips() {
        let desc = user_desc();
        let ty = TypeRef::Struct(Arc::clone(&desc));
        let john = FrozenStruct::create(
            &desc,
            [("user_id", 42.into()), ("name", "John Doe".into())],
        )
        .expect("create");
        let bytes = encode(&john, &ty).expect("encode");
        let back = decode(&ty, &bytes, 64).expect("decode");
        assert_eq!(back, john);
        assert_eq!(back.field("quote").and_then(FrozenValue::as_str), Some(""));
    }

    #[test]
    fn unknown_field_numbers_skipped() {
        let v2 = StructDescriptor::new(
            "User",
            vec![
                FieldDescriptor::new("user_id", 0, TypeRef::Int),
                FieldDescriptor::new("name", 1, TypeRef::String),
                FieldDescriptor::new("quote", 2, TypeRef::String),
                FieldDescriptor::new("karma", 7, TypeRef::Int),
            ],
        )
        .expect("valid schema");
        let value = FrozenStruct::create(
            &v2,
            [("user_id", 42.into()), ("karma", 99.into())],
        )
        .expect("create");
        let bytes = encode(&value, &TypeRef::Struct(v2)).expect("encode");

        let v1 = TypeRef::Struct(user_desc());
        let decoded = decode(&v1, &bytes, 64).expect("decode under older schema");
        assert_eq!(decoded.field("user_id").and_then(FrozenValue::as_int), Some(42));
    }

    #[test]
    fn enum_discriminators() {
        let desc = status_desc();
        let ty = TypeRef::Enum(Arc::clone(&desc));

        let premium = desc.of_constant("PREMIUM").expect("constant");
        let bytes = encode(&premium, &ty).expect("encode");
        // (2 << 1) | 0
        assert_eq!(bytes, [0x04]);
        assert_eq!(decode(&ty, &bytes, 64).expect("decode"), premium);

        let trial = desc
            .of_data("trial", FrozenValue::Timestamp(600))
            .expect("data");
        assert_eq!(roundtrip(&trial, &ty), trial);
    }

    #[test]
    fn unknown_enum_reencodes_byte_identically() {
        let desc = status_desc();
        let ty = TypeRef::Enum(Arc::clone(&desc));
        // (9 << 1) | 1, 3-byte payload.
        let wire = [0x13, 0x03, 0xAA, 0xBB, 0xCC];
        let decoded = decode(&ty, &wire, 64).expect("decode");
        assert!(matches!(
            decoded.as_enum().expect("enum").state(),
            EnumState::Unrecognized(_)
        ));
        assert_eq!(encode(&decoded, &ty).expect("encode"), wire);
    }

    #[test]
    fn json_captured_unknowns_refuse_binary_encode() {
        let desc = status_desc();
        let ty = TypeRef::Enum(Arc::clone(&desc));
        let from_json = desc.of_unrecognized(UnknownVariant {
            tag: RawTag::Number(9),
            payload: Some(UnknownPayload::Json(serde_json::json!({"a": 1}))),
        });
        assert!(matches!(
            encode(&from_json, &ty),
            Err(SkirError::SchemaViolation(_))
        ));
        let named = desc.of_unrecognized(UnknownVariant {
            tag: RawTag::Name("later".to_string()),
            payload: None,
        });
        assert!(encode(&named, &ty).is_err());
    }

    #[test]
    fn truncation_and_trailing_bytes_rejected() {
        let desc = user_desc();
        let ty = TypeRef::Struct(Arc::clone(&desc));
        let john = FrozenStruct::create(
            &desc,
            [("user_id", 42.into()), ("name", "John Doe".into())],
        )
        .expect("create");
        let bytes = encode(&john, &ty).expect("encode");

        for cut in 1..bytes.len() {
            assert!(
                decode(&ty, &bytes[..cut], 64).is_err(),
                "truncation at {cut} must fail"
            );
        }

        let mut padded = bytes.clone();
        padded.push(0x00);
        assert!(matches!(
            decode(&ty, &padded, 64),
            Err(SkirError::MalformedPayload(_))
        ));
    }

    #[test]
    fn nested_arrays_hit_depth_limit() {
        fn nest(depth: usize) -> TypeRef {
            let mut ty = TypeRef::Int;
            for _ in 0..depth {
                ty = TypeRef::Array {
                    elem: Box::new(ty),
                    key_field: None,
                };
            }
            ty
        }
        let ty = nest(8);
        let mut value = FrozenValue::Int(1);
        for _ in 0..8 {
            value = vec![value].into();
        }
        let bytes = encode(&value, &ty).expect("encode");
        assert_eq!(decode(&ty, &bytes, 64).expect("decode"), value);
        assert!(matches!(
            decode(&ty, &bytes, 4),
            Err(SkirError::MalformedPayload(_))
        ));
    }
}
