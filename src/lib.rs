//! # skir
//!
//! Schema-driven serialization runtime with frozen/mutable value duality,
//! three wire formats, and a lightweight RPC dispatch layer.
//!
//! ## Core pieces
//! - [`schema`]: runtime type descriptors ([`TypeRef`]) with stable numeric
//!   field identities, serializable for cross-process introspection.
//! - [`value`]: every type has a deeply immutable, `Arc`-shared frozen form
//!   and an exclusively owned mutable form; converting between them copies
//!   only the top level, and freezing an untouched subtree is free.
//! - [`codec`]: dense JSON (positional, rename-proof), readable JSON
//!   (name-keyed, for humans), and a compact binary format. Unknown struct
//!   fields are skipped; unknown enum variants decode to a legitimate
//!   "unrecognized" state that re-encodes byte-identically.
//! - [`rpc`]: instance-scoped method registries, a transport seam, and a
//!   client with a per-call state machine.
//!
//! ## Example
//! ```
//! use skir::schema::{FieldDescriptor, StructDescriptor, TypeRef};
//! use skir::value::{FrozenStruct, FrozenValue};
//! use skir::codec::{Serializer, WireFormat};
//!
//! # fn main() -> skir::Result<()> {
//! let user = StructDescriptor::new(
//!     "User",
//!     vec![
//!         FieldDescriptor::new("user_id", 0, TypeRef::Int),
//!         FieldDescriptor::new("name", 1, TypeRef::String),
//!     ],
//! )?;
//! let john = FrozenStruct::create(
//!     &user,
//!     [("user_id", 42.into()), ("name", "John Doe".into())],
//! )?;
//!
//! let serializer = Serializer::new(TypeRef::Struct(user))?;
//! let code = serializer.to_json_code(&john, WireFormat::Dense)?;
//! assert_eq!(code, r#"[42,"John Doe"]"#);
//! assert_eq!(serializer.from_json_code(&code)?, john);
//! # Ok(())
//! # }
//! ```
//!
//! [`TypeRef`]: schema::TypeRef

pub mod codec;
pub mod config;
pub mod error;
pub mod rpc;
pub mod schema;
pub mod value;

pub use codec::{Payload, Serializer, WireFormat};
pub use error::{Result, SkirError};
pub use schema::TypeRef;
pub use value::FrozenValue;
