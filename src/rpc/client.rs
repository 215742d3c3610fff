//! RPC client and per-call state machine.

use crate::codec::{Serializer, WireFormat};
use crate::config::RpcConfig;
use crate::error::{Result, SkirError};
use crate::rpc::envelope::{self, Reply};
use crate::rpc::method::MethodDescriptor;
use crate::rpc::transport::Transport;
use crate::value::FrozenValue;
use tracing::{debug, trace};

/// Lifecycle of one call.
///
/// `Pending → InFlight → Completed | Failed`. Dropping the `invoke` future
/// while in flight abandons the call; the completion transition runs at most
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Created, not yet invoked.
    Pending,
    /// Request sent, awaiting the reply.
    InFlight,
    /// Reply received and decoded.
    Completed,
    /// Transport, timeout, or handler failure.
    Failed,
}

/// RPC client bound to a transport.
#[derive(Debug, Clone)]
pub struct Client<T: Transport> {
    transport: T,
    format: WireFormat,
    config: RpcConfig,
}

impl<T: Transport> Client<T> {
    /// A client sending dense JSON with default timeouts.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            format: WireFormat::default(),
            config: RpcConfig::default(),
        }
    }

    /// Choose the wire format for outgoing requests.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the RPC configuration.
    pub fn with_config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Prepare a call to a method. The returned [`Call`] is invoked once and
    /// keeps its final state for inspection.
    pub fn call(&self, method: &MethodDescriptor) -> Result<Call<'_, T>> {
        Ok(Call {
            client: self,
            request: Serializer::new(method.request.clone())?,
            response: Serializer::new(method.response.clone())?,
            method: method.clone(),
            state: CallState::Pending,
        })
    }
}

/// One in-progress or finished method call.
pub struct Call<'a, T: Transport> {
    client: &'a Client<T>,
    method: MethodDescriptor,
    request: Serializer,
    response: Serializer,
    state: CallState,
}

impl<T: Transport> Call<'_, T> {
    /// Current lifecycle state.
    pub fn state(&self) -> CallState {
        self.state
    }

    /// The called method.
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// Send the request and await the decoded response.
    ///
    /// A server-reported failure surfaces as [`SkirError::HandlerFailure`];
    /// everything between the processes (including the response timeout) as
    /// [`SkirError::TransportFailure`].
    pub async fn invoke(&mut self, request: &FrozenValue) -> Result<FrozenValue> {
        if self.state != CallState::Pending {
            return Err(SkirError::schema(format!(
                "call to '{}' already invoked",
                self.method.name
            )));
        }
        let outcome = self.drive(request).await;
        self.state = if outcome.is_ok() {
            CallState::Completed
        } else {
            CallState::Failed
        };
        debug!(method = %self.method.name, state = ?self.state, "call finished");
        outcome
    }

    async fn drive(&mut self, request: &FrozenValue) -> Result<FrozenValue> {
        let payload = self.request.encode(request, self.client.format)?;
        self.state = CallState::InFlight;
        trace!(
            method = %self.method.name,
            wire = %self.method.wire_name,
            verb = ?self.method.verb(),
            "sending request"
        );
        let reply = tokio::time::timeout(
            self.client.config.response_timeout,
            self.client
                .transport
                .send(&self.method.wire_name, payload, self.method.verb()),
        )
        .await
        .map_err(|_| {
            SkirError::TransportFailure(format!(
                "no response from '{}' within {:?}",
                self.method.wire_name, self.client.config.response_timeout
            ))
        })??;
        match envelope::open(&reply)? {
            Reply::Success(response) => self.response.decode(&response),
            Reply::Failure(message) => Err(SkirError::HandlerFailure(message)),
        }
    }
}
