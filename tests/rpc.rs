//! RPC integration tests: a search service dispatched over the in-process
//! loopback transport, in both text and binary formats.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args
)]

mod common;

use common::{registry_type, user, user_descriptor};
use skir::codec::Payload;
use skir::rpc::{CallState, Client, LocalTransport, MethodDescriptor, Service, Transport, Verb};
use skir::value::{find_keyed, FrozenValue};
use skir::{SkirError, TypeRef, WireFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn get_user_method() -> MethodDescriptor {
    MethodDescriptor::new(
        "GetUser",
        "g7c2f1",
        TypeRef::Int,
        TypeRef::Optional(Box::new(TypeRef::Struct(user_descriptor()))),
    )
    .expect("descriptor")
    .side_effect_free()
}

fn registry_service() -> Arc<Service> {
    let service = Arc::new(Service::new());
    let registry: FrozenValue = vec![user(42, "John Doe"), user(43, "Jane Doe")].into();
    let registry_ty = registry_type();
    service
        .register(get_user_method(), move |request| {
            let id = request
                .as_int()
                .ok_or_else(|| SkirError::schema("expected an int request"))?;
            Ok(find_keyed(&registry, &registry_ty, id)?
                .cloned()
                .unwrap_or(FrozenValue::Null))
        })
        .expect("register");
    service
}

#[tokio::test]
async fn call_roundtrip_text_and_binary() {
    let transport = LocalTransport::new(registry_service());
    for format in [WireFormat::Dense, WireFormat::Binary] {
        let client = Client::new(transport.clone()).with_format(format);
        let mut call = client.call(&get_user_method()).expect("call");
        assert_eq!(call.state(), CallState::Pending);

        let response = call.invoke(&FrozenValue::Int(42)).await.expect("invoke");
        assert_eq!(call.state(), CallState::Completed);
        assert_eq!(
            response.field("name").and_then(FrozenValue::as_str),
            Some("John Doe"),
            "{}",
            format.name()
        );
    }
}

#[tokio::test]
async fn absent_user_comes_back_null() {
    let client = Client::new(LocalTransport::new(registry_service()));
    let mut call = client.call(&get_user_method()).expect("call");
    let response = call.invoke(&FrozenValue::Int(99)).await.expect("invoke");
    assert_eq!(response, FrozenValue::Null);
}

#[tokio::test]
async fn handler_failure_is_distinguishable() {
    let service = Arc::new(Service::new());
    service
        .register(
            MethodDescriptor::new("Reject", "r1", TypeRef::Int, TypeRef::Int).expect("descriptor"),
            |_| Err(SkirError::HandlerFailure("quota exceeded".to_string())),
        )
        .expect("register");
    let client = Client::new(LocalTransport::new(service));
    let method = MethodDescriptor::new("Reject", "r1", TypeRef::Int, TypeRef::Int).expect("descriptor");

    let mut call = client.call(&method).expect("call");
    let err = call.invoke(&FrozenValue::Int(1)).await.unwrap_err();
    assert_eq!(call.state(), CallState::Failed);
    match err {
        SkirError::HandlerFailure(message) => assert!(message.contains("quota exceeded")),
        other => panic!("expected HandlerFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_method_fails_the_call() {
    let client = Client::new(LocalTransport::new(registry_service()));
    let method =
        MethodDescriptor::new("Missing", "nope", TypeRef::Int, TypeRef::Int).expect("descriptor");
    let mut call = client.call(&method).expect("call");
    let err = call.invoke(&FrozenValue::Int(1)).await.unwrap_err();
    assert!(matches!(err, SkirError::HandlerFailure(_)), "{err:?}");
    assert_eq!(call.state(), CallState::Failed);
}

#[tokio::test]
async fn call_completes_at_most_once() {
    let client = Client::new(LocalTransport::new(registry_service()));
    let mut call = client.call(&get_user_method()).expect("call");
    call.invoke(&FrozenValue::Int(42)).await.expect("invoke");
    assert!(call.invoke(&FrozenValue::Int(43)).await.is_err());
    // The first outcome is preserved.
    assert_eq!(call.state(), CallState::Completed);
}

/// Records the verbs it sees, then delegates to a loopback.
#[derive(Clone)]
struct RecordingTransport {
    inner: LocalTransport,
    verbs: Arc<Mutex<Vec<Verb>>>,
}

impl Transport for RecordingTransport {
    async fn send(&self, wire_name: &str, payload: Payload, verb: Verb) -> Result<Payload, SkirError> {
        self.verbs.lock().expect("lock").push(verb);
        self.inner.send(wire_name, payload, verb).await
    }
}

#[tokio::test]
async fn side_effect_free_methods_travel_as_get() {
    let service = registry_service();
    service
        .register(
            MethodDescriptor::new("Touch", "t1", TypeRef::Int, TypeRef::Int).expect("descriptor"),
            Ok,
        )
        .expect("register");
    let verbs = Arc::new(Mutex::new(Vec::new()));
    let transport = RecordingTransport {
        inner: LocalTransport::new(service),
        verbs: Arc::clone(&verbs),
    };
    let client = Client::new(transport);

    let mut call = client.call(&get_user_method()).expect("call");
    call.invoke(&FrozenValue::Int(42)).await.expect("invoke");

    let touch = MethodDescriptor::new("Touch", "t1", TypeRef::Int, TypeRef::Int).expect("descriptor");
    let mut call = client.call(&touch).expect("call");
    call.invoke(&FrozenValue::Int(1)).await.expect("invoke");

    assert_eq!(*verbs.lock().expect("lock"), [Verb::Get, Verb::Post]);
}

/// Never responds; exercises the client-side response timeout.
struct StalledTransport;

impl Transport for StalledTransport {
    async fn send(&self, _: &str, _: Payload, _: Verb) -> Result<Payload, SkirError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("the timeout should fire first")
    }
}

#[tokio::test(start_paused = true)]
async fn response_timeout_maps_to_transport_failure() {
    let config = skir::config::RpcConfig {
        response_timeout: Duration::from_millis(250),
    };
    let client = Client::new(StalledTransport).with_config(config);
    let mut call = client.call(&get_user_method()).expect("call");
    let err = call.invoke(&FrozenValue::Int(42)).await.unwrap_err();
    assert!(matches!(err, SkirError::TransportFailure(_)), "{err:?}");
    assert_eq!(call.state(), CallState::Failed);
}

#[tokio::test]
async fn service_introspection_matches_registrations() {
    let service = registry_service();
    let methods = service.methods().expect("methods");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].wire_name, "g7c2f1");
    assert_eq!(methods[0].verb(), Verb::Get);

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_in_handler = Arc::clone(&counter);
    service
        .register(
            MethodDescriptor::new("Count", "c1", TypeRef::Int, TypeRef::Int).expect("descriptor"),
            move |v| {
                counter_in_handler.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            },
        )
        .expect("register");
    assert_eq!(service.methods().expect("methods").len(), 2);

    let client = Client::new(LocalTransport::new(service));
    let count = MethodDescriptor::new("Count", "c1", TypeRef::Int, TypeRef::Int).expect("descriptor");
    let mut call = client.call(&count).expect("call");
    call.invoke(&FrozenValue::Int(5)).await.expect("invoke");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
