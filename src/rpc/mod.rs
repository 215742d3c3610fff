//! # RPC Dispatch
//!
//! Request/response dispatch over the wire formats.
//!
//! A [`MethodDescriptor`] names a method (stable `wire_name`, request and
//! response types, side-effect contract). A [`Service`] holds registered
//! methods and handlers and turns an incoming payload into an enveloped
//! reply; a [`Client`] drives calls through any [`Transport`].
//!
//! The response envelope keeps application failures distinguishable from
//! transport failures: a handler error travels inside an `err` envelope and
//! surfaces to the caller as [`SkirError::HandlerFailure`], never as a
//! transport error.
//!
//! [`SkirError::HandlerFailure`]: crate::error::SkirError::HandlerFailure

mod client;
mod envelope;
mod method;
mod server;
mod transport;

pub use client::{Call, CallState, Client};
pub use method::{MethodDescriptor, Verb};
pub use server::Service;
pub use transport::{LocalTransport, Transport};
