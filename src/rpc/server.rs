//! Instance-scoped method registry and dispatch.

use crate::codec::{Payload, Serializer, WireFormat};
use crate::config::CodecConfig;
use crate::error::{constants, Result, SkirError};
use crate::rpc::envelope;
use crate::rpc::method::MethodDescriptor;
use crate::value::FrozenValue;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

type HandlerFn = dyn Fn(FrozenValue) -> Result<FrozenValue> + Send + Sync + 'static;

struct MethodEntry {
    descriptor: MethodDescriptor,
    request: Serializer,
    response: Serializer,
    handler: Box<HandlerFn>,
}

/// A set of registered RPC methods, keyed by wire name.
///
/// Services are plain values: construct as many as needed, nothing is
/// process-global. `handle` never fails outward; every outcome, including an
/// unknown wire name or a malformed request, is reported to the caller
/// through the response envelope.
pub struct Service {
    methods: RwLock<HashMap<Cow<'static, str>, MethodEntry>>,
    config: CodecConfig,
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl Service {
    /// An empty service with default codec limits.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// An empty service with explicit codec limits.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a method. A later registration under the same wire name
    /// replaces the earlier one.
    pub fn register<F>(&self, descriptor: MethodDescriptor, handler: F) -> Result<()>
    where
        F: Fn(FrozenValue) -> Result<FrozenValue> + Send + Sync + 'static,
    {
        let entry = MethodEntry {
            request: Serializer::with_config(descriptor.request.clone(), self.config.clone())?,
            response: Serializer::with_config(descriptor.response.clone(), self.config.clone())?,
            descriptor,
            handler: Box::new(handler),
        };
        let mut methods = self
            .methods
            .write()
            .map_err(|_| SkirError::TransportFailure(constants::ERR_REGISTRY_WRITE_LOCK.into()))?;
        debug!(method = %entry.descriptor.wire_name, "register");
        methods.insert(entry.descriptor.wire_name.clone(), entry);
        Ok(())
    }

    /// Dispatch one request and produce an enveloped response in the given
    /// format.
    pub fn handle(&self, wire_name: &str, payload: &Payload, format: WireFormat) -> Payload {
        match self.dispatch(wire_name, payload, format) {
            Ok(response) => envelope::seal_ok(response),
            Err(e) => {
                warn!(method = wire_name, error = %e, "dispatch failed");
                envelope::seal_err(&e.to_string(), format.is_text())
            }
        }
    }

    fn dispatch(&self, wire_name: &str, payload: &Payload, format: WireFormat) -> Result<Payload> {
        let methods = self
            .methods
            .read()
            .map_err(|_| SkirError::TransportFailure(constants::ERR_REGISTRY_READ_LOCK.into()))?;
        let entry = methods
            .get(wire_name)
            .ok_or_else(|| SkirError::MethodNotFound(wire_name.to_string()))?;
        debug!(method = %entry.descriptor.name, wire = wire_name, "dispatch");
        let request = entry.request.decode(payload)?;
        let response = (entry.handler)(request)?;
        entry.response.encode(&response, format)
    }

    /// Metadata of every registered method, in no particular order.
    pub fn methods(&self) -> Result<Vec<MethodDescriptor>> {
        let methods = self
            .methods
            .read()
            .map_err(|_| SkirError::TransportFailure(constants::ERR_REGISTRY_READ_LOCK.into()))?;
        Ok(methods.values().map(|e| e.descriptor.clone()).collect())
    }

    /// Metadata of one method by wire name.
    pub fn method(&self, wire_name: &str) -> Result<Option<MethodDescriptor>> {
        let methods = self
            .methods
            .read()
            .map_err(|_| SkirError::TransportFailure(constants::ERR_REGISTRY_READ_LOCK.into()))?;
        Ok(methods.get(wire_name).map(|e| e.descriptor.clone()))
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.methods.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("Service").field("methods", &count).finish()
    }
}
