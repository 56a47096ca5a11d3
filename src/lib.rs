//! Resolves, merges, and converts name-mapping data for obfuscated minecraft
//! symbols across the historical mapping dialects:
//! - `tiny` (v1 and v2) - fabric's multi-namespace format
//! - `srg`/`csrg`/`tsrg` (v1 and v2) - the MCP/Spigot family
//! - `rgs` - Retroguard scripts, the oldest dialect still in circulation
//! - the three generations of MCP csv exports (plus `packages.csv`)
//! - proguard obfuscation logs and parchment json
//! - raw class files and jars, used to seed a tree when no text mapping exists
//!
//! Everything is built around a single streaming [`visitor::MappingVisitor`]
//! contract. Readers produce visitor calls, the [`tree::MappingTree`] consumes
//! them, and the decorators in [`transform`] rewrite the stream in between.
//! Once built, a tree is frozen into an immutable [`tree::FrozenTree`] which
//! the access-transformer/access-widener converter in [`access`] resolves
//! member references against.
extern crate indexmap;
extern crate failure;
extern crate failure_derive;
#[macro_use]
extern crate scopeguard;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;
extern crate regex;
#[macro_use]
extern crate lazy_static;
extern crate serde;
extern crate serde_derive;
extern crate serde_json;
extern crate csv;
extern crate zip;

pub mod cols;
pub mod visitor;
pub mod tree;
pub mod descriptor;
pub mod format;
pub mod transform;
pub mod builder;
pub mod access;

pub use self::visitor::{MappingVisitor, MappedKind, VisitorFlags};
pub use self::tree::{MappingTree, FrozenTree, NULL_NAMESPACE_ID};
pub use self::format::MappingFormat;
pub use self::builder::{InputBuilder, MappingInput, Side};
