//! Method metadata.

use crate::error::Result;
use crate::schema::TypeRef;
use std::borrow::Cow;

/// Request verb derived from a method's side-effect contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Side-effect-free method; safe to retry and cache.
    Get,
    /// Method that may mutate server state.
    Post,
}

/// Describes one RPC method: display name, stable wire identity, and the
/// request/response value types.
///
/// The `wire_name` is the network-visible identity and survives local renames
/// of the method; `name` is only for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    /// Display name, for diagnostics and logs.
    pub name: String,
    /// Stable network-visible identity.
    pub wire_name: Cow<'static, str>,
    /// Request value type.
    pub request: TypeRef,
    /// Response value type.
    pub response: TypeRef,
    /// Whether invoking the method leaves server state unchanged.
    pub side_effect_free: bool,
}

impl MethodDescriptor {
    /// Describe a method. Defaults to side-effecting ([`Verb::Post`]).
    pub fn new(
        name: impl Into<String>,
        wire_name: impl Into<Cow<'static, str>>,
        request: TypeRef,
        response: TypeRef,
    ) -> Result<Self> {
        request.validate()?;
        response.validate()?;
        Ok(Self {
            name: name.into(),
            wire_name: wire_name.into(),
            request,
            response,
            side_effect_free: false,
        })
    }

    /// Mark the method side-effect-free, deriving [`Verb::Get`].
    pub fn side_effect_free(mut self) -> Self {
        self.side_effect_free = true;
        self
    }

    /// The verb is a property of the method, not of any one payload.
    pub fn verb(&self) -> Verb {
        if self.side_effect_free {
            Verb::Get
        } else {
            Verb::Post
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_follows_side_effect_contract() {
        let post = MethodDescriptor::new("SearchUsers", "s3a8b2", TypeRef::String, TypeRef::Int)
            .expect("descriptor");
        assert_eq!(post.verb(), Verb::Post);

        let get = post.clone().side_effect_free();
        assert_eq!(get.verb(), Verb::Get);
        // The wire identity is untouched by the verb.
        assert_eq!(get.wire_name, "s3a8b2");
    }

    #[test]
    fn invalid_request_type_rejected() {
        let bad = TypeRef::Array {
            elem: Box::new(TypeRef::Int),
            key_field: Some("x".to_string()),
        };
        assert!(MethodDescriptor::new("M", "m1", bad, TypeRef::Int).is_err());
    }
}
