//! Shared schema fixtures: a small user-registry domain exercising structs,
//! enums, keyed arrays, optionals, and timestamps.

#![allow(dead_code)]

use skir::schema::{
    EnumDescriptor, FieldDescriptor, StructDescriptor, TypeRef, VariantDescriptor,
};
use skir::value::{FrozenStruct, FrozenValue};
use std::sync::Arc;

pub fn pet_descriptor() -> Arc<StructDescriptor> {
    StructDescriptor::new(
        "Pet",
        vec![
            FieldDescriptor::new("name", 0, TypeRef::String),
            FieldDescriptor::new("height_in_meters", 1, TypeRef::Float),
        ],
    )
    .expect("valid schema")
}

pub fn status_descriptor() -> Arc<EnumDescriptor> {
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

pub fn user_descriptor() -> Arc<StructDescriptor> {
    StructDescriptor::new(
        "User",
        vec![
            FieldDescriptor::new("user_id", 0, TypeRef::Int),
            FieldDescriptor::new("name", 1, TypeRef::String),
            FieldDescriptor::new("quote", 2, TypeRef::Optional(Box::new(TypeRef::String))),
            FieldDescriptor::new(
                "pets",
                3,
                TypeRef::Array {
                    elem: Box::new(TypeRef::Struct(pet_descriptor())),
                    key_field: None,
                },
            ),
            FieldDescriptor::new("status", 4, TypeRef::Enum(status_descriptor())),
            FieldDescriptor::new("signup_time", 5, TypeRef::Timestamp),
        ],
    )
    .expect("valid schema")
}

/// `Array<User>` keyed by `user_id`.
pub fn registry_type() -> TypeRef {
    TypeRef::Array {
        elem: Box::new(TypeRef::Struct(user_descriptor())),
        key_field: Some("user_id".to_string()),
    }
}

pub fn user(id: i64, name: &str) -> FrozenValue {
    FrozenStruct::create(
        &user_descriptor(),
        [("user_id", id.into()), ("name", name.into())],
    )
    .expect("create")
}

pub fn pet(name: &str, height: f64) -> FrozenValue {
    FrozenStruct::create(
        &pet_descriptor(),
        [("name", name.into()), ("height_in_meters", height.into())],
    )
    .expect("create")
}
