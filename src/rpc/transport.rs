//! Transport seam.
//!
//! The client is generic over anything that can carry a request payload to a
//! service and return the enveloped reply. The runtime only consumes this
//! trait; wiring it to a real network stack is the embedding application's
//! concern. [`LocalTransport`] is the in-process loopback used by tests and
//! demos.

use crate::codec::{Payload, WireFormat};
use crate::error::Result;
use crate::rpc::method::Verb;
use crate::rpc::server::Service;
use std::future::Future;
use std::sync::Arc;

/// Carries one request to a service and returns the enveloped reply.
pub trait Transport: Send + Sync {
    /// Send a request payload to the method identified by `wire_name`.
    ///
    /// The verb is advisory routing metadata ([`Verb::Get`] requests are safe
    /// to retry); the payload is already fully encoded.
    fn send(
        &self,
        wire_name: &str,
        payload: Payload,
        verb: Verb,
    ) -> impl Future<Output = Result<Payload>> + Send;
}

/// Loops a client straight back to an in-process [`Service`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
    service: Arc<Service>,
}

impl LocalTransport {
    /// Attach to a service.
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    /// The attached service.
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }
}

impl Transport for LocalTransport {
    async fn send(&self, wire_name: &str, payload: Payload, _verb: Verb) -> Result<Payload> {
        // Reply in the family the request arrived in.
        let format = match payload {
            Payload::Text(_) => WireFormat::Dense,
            Payload::Binary(_) => WireFormat::Binary,
        };
        Ok(self.service.handle(wire_name, &payload, format))
    }
}
