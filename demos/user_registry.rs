//! End-to-end tour: schemas, frozen/mutable values, the three wire formats,
//! keyed lookups, schema introspection, and an RPC round trip over the
//! in-process loopback.
//!
//! Run with `cargo run --example user_registry`.

use skir::codec::{Serializer, WireFormat};
use skir::rpc::{Client, LocalTransport, MethodDescriptor, Service};
use skir::schema::{
    EnumDescriptor, FieldDescriptor, StructDescriptor, TypeRef, VariantDescriptor,
};
use skir::value::{find_keyed, EnumKind, FrozenStruct, FrozenValue};
use std::sync::Arc;

fn user_schema() -> skir::Result<TypeRef> {
    let pet = StructDescriptor::new(
        "Pet",
        vec![
            FieldDescriptor::new("name", 0, TypeRef::String),
            FieldDescriptor::new("height_in_meters", 1, TypeRef::Float),
        ],
    )?;
    let status = EnumDescriptor::new(
        "SubscriptionStatus",
        vec![
            VariantDescriptor::constant("UNKNOWN", 0),
            VariantDescriptor::constant("FREE", 1),
            VariantDescriptor::constant("PREMIUM", 2),
            VariantDescriptor::data("trial", 3, TypeRef::Timestamp),
        ],
    )?;
    Ok(TypeRef::Struct(StructDescriptor::new(
        "User",
        vec![
            FieldDescriptor::new("user_id", 0, TypeRef::Int),
            FieldDescriptor::new("name", 1, TypeRef::String),
            FieldDescriptor::new(
                "pets",
                2,
                TypeRef::Array {
                    elem: Box::new(TypeRef::Struct(pet)),
                    key_field: Some("name".to_string()),
                },
            ),
            FieldDescriptor::new("status", 3, TypeRef::Enum(status)),
        ],
    )?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> skir::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let user_ty = user_schema()?;
    let TypeRef::Struct(user_desc) = &user_ty else {
        unreachable!()
    };

    // Frozen values: construct once, share freely.
    let john = FrozenStruct::create(
        user_desc,
        [("user_id", 42.into()), ("name", "John Doe".into())],
    )?;
    println!("john = {john:?}");

    // Mutable values: thaw, edit, refreeze. The original is untouched.
    let mut builder = john.as_struct().map(FrozenStruct::to_mutable).unwrap();
    builder.set("name", "John Q. Doe")?;
    let pet_desc = match &user_desc.field("pets").unwrap().ty {
        TypeRef::Array { elem, .. } => match elem.as_ref() {
            TypeRef::Struct(desc) => Arc::clone(desc),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    builder.mutable_array("pets")?.push(FrozenStruct::create(
        &pet_desc,
        [("name", "Cupcake".into()), ("height_in_meters", 0.3.into())],
    )?);
    let john = builder.into_frozen();

    // Three wire formats from one serializer.
    let serializer = Serializer::new(user_ty.clone())?;
    println!("dense    = {}", serializer.to_json_code(&john, WireFormat::Dense)?);
    println!("readable = {}", serializer.to_json_code(&john, WireFormat::Readable)?);
    println!("binary   = {} bytes", serializer.to_bytes(&john)?.len());

    // Keyed lookup over the pets array (declared key: "name").
    let pets_ty = &user_desc.field("pets").unwrap().ty;
    let pets = john.field("pets").cloned().unwrap();
    if let Some(cupcake) = find_keyed(&pets, pets_ty, "Cupcake")? {
        println!("cupcake height = {:?}", cupcake.field("height_in_meters"));
    }

    // Status is an enum with an explicit unrecognized state.
    let status = john.field("status").and_then(FrozenValue::as_enum).unwrap();
    match status.kind() {
        EnumKind::Constant(name) => println!("status = {name}"),
        EnumKind::Data(name, value) => println!("status = {name}({value:?})"),
        EnumKind::Unrecognized => println!("status from a newer schema version"),
    }

    // The schema itself serializes; a peer can rebuild it without our source.
    println!("descriptor = {}", user_ty.to_json_code());

    // RPC: register a lookup method, call it through the loopback transport.
    let method = MethodDescriptor::new(
        "GetUser",
        "g7c2f1",
        TypeRef::Int,
        TypeRef::Optional(Box::new(user_ty.clone())),
    )?
    .side_effect_free();

    let service = Arc::new(Service::new());
    let registry = john.clone();
    service.register(method.clone(), move |request| {
        Ok(match request.as_int() {
            Some(42) => registry.clone(),
            _ => FrozenValue::Null,
        })
    })?;

    let client = Client::new(LocalTransport::new(service));
    let mut call = client.call(&method)?;
    let response = call.invoke(&FrozenValue::Int(42)).await?;
    println!(
        "rpc GetUser(42) -> {:?}",
        response.field("name").and_then(FrozenValue::as_str)
    );

    Ok(())
}
