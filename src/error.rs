//! # Error Types
//!
//! Comprehensive error handling for the serialization runtime.
//!
//! This module defines all error variants that can occur across the runtime,
//! from schema construction mistakes to corrupt wire payloads and RPC
//! failures.
//!
//! ## Error Categories
//! - **Schema Violations**: programming errors (unknown field names, duplicate
//!   field numbers, type mismatches), not expected to be caught in normal
//!   operation
//! - **Malformed Payloads**: corrupt or truncated input during decode;
//!   recoverable, surfaced to the caller
//! - **RPC Errors**: unknown methods, transport failures, handler failures
//! - **Configuration Errors**: invalid config files or values
//!
//! An unrecognized enum discriminator is *not* an error: it is a legitimate
//! value state (see [`crate::value::EnumKind::Unrecognized`]).
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Service registry lock errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on method registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on method registry";

    /// Decode errors
    pub const ERR_TRUNCATED: &str = "Unexpected end of input";
    pub const ERR_TRAILING_BYTES: &str = "Trailing bytes after value";
    pub const ERR_DEPTH_LIMIT: &str = "Nesting depth limit exceeded";
    pub const ERR_PAYLOAD_TOO_LARGE: &str = "Payload exceeds maximum size";

    /// RPC envelope errors
    pub const ERR_BAD_ENVELOPE: &str = "Malformed response envelope";
}

/// Primary error type for all runtime operations.
#[derive(Error, Debug)]
pub enum SkirError {
    /// A schema invariant was violated by the caller. This is a programming
    /// error (e.g. constructing a struct with an unknown field name), not a
    /// condition to recover from.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// The input payload is corrupt, truncated, or structurally invalid.
    /// Decoding is all-or-nothing: no partial value is produced.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// No method with the given wire name is registered on the service.
    #[error("Unknown method: {0}")]
    MethodNotFound(String),

    /// The transport failed to carry the request or response. Opaque to the
    /// runtime; surfaced unchanged to the RPC caller.
    #[error("Transport error: {0}")]
    TransportFailure(String),

    /// A server method handler reported an application-level failure. Carried
    /// back to the caller inside a failure envelope, distinct from transport
    /// errors.
    #[error("Handler error: {0}")]
    HandlerFailure(String),

    /// Invalid configuration file or value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error (config file loading).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SkirError {
    /// Shorthand for a [`SkirError::SchemaViolation`].
    pub fn schema(msg: impl Into<String>) -> Self {
        SkirError::SchemaViolation(msg.into())
    }

    /// Shorthand for a [`SkirError::MalformedPayload`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        SkirError::MalformedPayload(msg.into())
    }
}

/// Type alias for Results using SkirError
pub type Result<T> = std::result::Result<T, SkirError>;
