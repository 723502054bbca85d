//! Typed, content-addressed value model for Cairn.
//!
//! Every datum is a [`Value`]: immutable, cheap to clone, and identified by
//! the hash of its canonical encoding ([`Value::content_ref`]). Containers
//! ([`Map`], [`Set`], [`List`]) are persistent, so updates return new values
//! that share unchanged structure with the old ones.
//!
//! # Key Types
//!
//! - [`Value`]: The closed set of value variants
//! - [`TypeRef`]: Structural type descriptor
//! - [`Package`]: Content-addressed collection of type definitions
//! - [`TypeRegistry`]: Package lookup, type resolution, checking and conversion
//! - [`Future`]: A lazily loaded dependency, resolved through a [`ValueReader`]
//! - [`MapDiff`] / [`SetDiff`]: Structural diffs between collections

pub mod chunk;
pub mod codec;
pub mod diff;
pub mod error;
pub mod kind;
pub mod list;
pub mod map;
pub mod package;
pub mod registry;
pub mod set;
pub mod structs;
pub mod typeref;
pub mod value;

mod tree;

pub use chunk::{Future, ValueReader};
pub use codec::{decode, encode};
pub use diff::{MapChange, MapDiff, SetDiff};
pub use error::{ValueError, ValueResult};
pub use kind::Kind;
pub use list::List;
pub use map::Map;
pub use package::Package;
pub use registry::{Conversion, TypeRegistry, CHOICE_KEY, CHOICE_VALUE_KEY};
pub use set::Set;
pub use structs::Struct;
pub use typeref::{Field, StructDesc, TypeRef};
pub use value::{FromValue, RefValue, Value};
