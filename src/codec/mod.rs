//! # Codec
//!
//! Encodes and decodes [`FrozenValue`]s to and from the three wire formats,
//! driven by [`TypeRef`] descriptors.
//!
//! ## Formats
//! - **Dense JSON**: positional arrays addressed by field number; compact and
//!   rename-proof, the format to pick when the value will be deserialized
//!   later.
//! - **Readable JSON**: objects keyed by field display name; for humans and
//!   debugging, not guaranteed parseable across field renames.
//! - **Binary**: length-prefixed, field-number-tagged; slightly more compact
//!   than dense JSON and forward/backward compatible (unknown fields are
//!   skipped by encoded length).
//!
//! ## Compatibility
//! - Unknown struct fields from newer schema versions never fail a decode.
//! - Unknown enum discriminators decode to the unrecognized state and
//!   re-encode byte-identically in the dense formats.
//! - Decoding is all-or-nothing: a malformed payload yields
//!   [`SkirError::MalformedPayload`] and no partial value.

pub mod binary;
pub mod json;

use crate::config::CodecConfig;
use crate::error::{Result, SkirError};
use crate::schema::TypeRef;
use crate::value::FrozenValue;
use tracing::trace;

/// Supported wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Compact positional JSON (default).
    #[default]
    Dense,
    /// Human-readable name-keyed JSON.
    Readable,
    /// Compact binary.
    Binary,
}

impl WireFormat {
    /// Get the format identifier byte for wire negotiation.
    pub fn format_byte(self) -> u8 {
        match self {
            WireFormat::Dense => 0x01,
            WireFormat::Readable => 0x02,
            WireFormat::Binary => 0x03,
        }
    }

    /// Detect format from identifier byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(WireFormat::Dense),
            0x02 => Some(WireFormat::Readable),
            0x03 => Some(WireFormat::Binary),
            _ => None,
        }
    }

    /// Get human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Dense => "dense-json",
            WireFormat::Readable => "readable-json",
            WireFormat::Binary => "binary",
        }
    }

    /// Whether payloads of this format are text.
    pub fn is_text(self) -> bool {
        !matches!(self, WireFormat::Binary)
    }
}

/// A self-contained wire payload: text for the JSON formats, bytes for the
/// binary format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// JSON text.
    Text(String),
    /// Binary bytes.
    Binary(Vec<u8>),
}

impl Payload {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }

    /// Borrow as bytes, if this is a binary payload.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(b) => Some(b),
            Payload::Text(_) => None,
        }
    }
}

/// Serializer for one schema type.
///
/// Binds a [`TypeRef`] and codec limits; all encode/decode traffic for that
/// type goes through here.
#[derive(Debug, Clone)]
pub struct Serializer {
    ty: TypeRef,
    config: CodecConfig,
}

impl Serializer {
    /// Build a serializer for a type, validating its key designations.
    pub fn new(ty: TypeRef) -> Result<Self> {
        Self::with_config(ty, CodecConfig::default())
    }

    /// Build a serializer with explicit codec limits.
    pub fn with_config(ty: TypeRef, config: CodecConfig) -> Result<Self> {
        ty.validate()?;
        Ok(Serializer { ty, config })
    }

    /// The bound type.
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Encode a value to the given format.
    pub fn encode(&self, value: &FrozenValue, format: WireFormat) -> Result<Payload> {
        trace!(format = format.name(), ty = self.ty.name(), "encode");
        match format {
            WireFormat::Dense => Ok(Payload::Text(
                json::encode(value, &self.ty, false)?.to_string(),
            )),
            WireFormat::Readable => Ok(Payload::Text(serde_json::to_string_pretty(
                &json::encode(value, &self.ty, true)?,
            )
            .map_err(|e| SkirError::malformed(format!("JSON serialization failed: {e}")))?)),
            WireFormat::Binary => Ok(Payload::Binary(binary::encode(value, &self.ty)?)),
        }
    }

    /// Decode a payload. Text payloads auto-detect dense vs readable JSON.
    pub fn decode(&self, payload: &Payload) -> Result<FrozenValue> {
        if payload.len() > self.config.max_payload_size {
            return Err(SkirError::malformed(format!(
                "{} ({} > {} bytes)",
                crate::error::constants::ERR_PAYLOAD_TOO_LARGE,
                payload.len(),
                self.config.max_payload_size
            )));
        }
        trace!(bytes = payload.len(), ty = self.ty.name(), "decode");
        match payload {
            Payload::Text(code) => self.from_json_code(code),
            Payload::Binary(bytes) => binary::decode(&self.ty, bytes, self.config.max_depth),
        }
    }

    /// Encode to a JSON string (dense or readable).
    pub fn to_json_code(&self, value: &FrozenValue, format: WireFormat) -> Result<String> {
        match self.encode(value, format)? {
            Payload::Text(code) => Ok(code),
            Payload::Binary(_) => Err(SkirError::schema(
                "to_json_code requires a JSON format".to_string(),
            )),
        }
    }

    /// Decode from a JSON string (dense or readable, auto-detected).
    pub fn from_json_code(&self, code: &str) -> Result<FrozenValue> {
        let parsed: serde_json::Value = serde_json::from_str(code)
            .map_err(|e| SkirError::malformed(format!("invalid JSON: {e}")))?;
        json::decode(&self.ty, &parsed, self.config.max_depth)
    }

    /// Encode to binary bytes.
    pub fn to_bytes(&self, value: &FrozenValue) -> Result<Vec<u8>> {
        binary::encode(value, &self.ty)
    }

    /// Decode from binary bytes.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<FrozenValue> {
        self.decode(&Payload::Binary(bytes.to_vec()))
    }
}
