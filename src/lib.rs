//! # class-index
//!
//! Discovers the Java classes reachable from a classpath, extracts their
//! structure with `javap`, and keeps a recency-ranked prefix index for
//! autocomplete.
//!
//! ## Architecture
//!
//! - **scan**: Classpath parsing and class file enumeration across directories and archives
//! - **archive**: Zip/jar entry listing
//! - **javap**: javap process integration
//! - **introspect**: Batched introspection over the `Introspect` capability
//! - **parse**: javap output parsing, including parameter name recovery
//! - **model**: Class and member descriptors with recency ranks
//! - **trie**: Ranked prefix trie
//! - **index**: Category-keyed tries holding classes and their members
//! - **locate**: Java system library discovery
//! - **refresh**: Full, incremental and single-class refresh sequencing
//! - **config**: Tuning defaults and tool/classpath resolution

pub mod archive;
pub mod cli;
pub mod config;
pub mod index;
pub mod introspect;
pub mod javap;
pub mod locate;
pub mod model;
pub mod parse;
pub mod refresh;
pub mod scan;
pub mod trie;
