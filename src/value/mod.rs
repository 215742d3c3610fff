//! # Value Model
//!
//! The dual frozen/mutable representation for structs, enums, and arrays.
//!
//! Every schema type has two value representations sharing one layout:
//! - **Frozen** ([`FrozenValue`]): deeply immutable, `Arc`-shared, safe to
//!   pass between threads without synchronization.
//! - **Mutable** ([`MutStruct`], [`MutArray`]): builder-style, exclusively
//!   owned, never internally locked.
//!
//! Conversion is cheap in both directions: freezing is a no-op for
//! already-frozen subtrees (identity preserved), and thawing copies only the
//! top-level slots. See [`mutable`] for the copy-on-upgrade protocol and
//! [`keyed`] for keyed lookups.

pub mod frozen;
pub mod keyed;
pub mod mutable;

pub use frozen::{
    EnumKind, EnumState, EnumValue, FrozenArray, FrozenStruct, FrozenValue, RawTag,
    UnknownPayload, UnknownVariant,
};
pub use keyed::{find_keyed, KeyValue};
pub use mutable::{MutArray, MutStruct, Slot};
