//! The two access-control dialects and the tree-backed converter between
//! them. `at` models transformer lists (with the legacy dotted dialect
//! normalizer), `aw` models wideners, and `convert` resolves targets
//! against a [`crate::tree::FrozenTree`] to translate either direction.

pub mod at;
pub mod aw;
pub mod convert;

pub use self::at::{parse_at, serialize_at, transform_legacy, AccessLevel, AtEntry, AtTarget, FinalMod};
pub use self::aw::{parse_aw, serialize_aw, AwAccess, AwEntry, AwFile, AwTarget};
pub use self::convert::{remap_transformers, transformers_to_widener, widener_to_transformers};
