//! Static minimal perfect hash sets and maps persisted to a compact binary format.
//!
//! The `sphash` crate builds a perfect hash over a key set known in advance
//! and answers membership or key-value lookups in O(1) with no probing: one
//! hash pair, one displacement read, one slot comparison. Keys and values are
//! fixed-width plain data ([`bytemuck::Pod`]) so the tables are flat arrays
//! that serialize byte for byte.
//!
//! Construction follows the "hash, displace" family: keys are grouped into
//! buckets by a primary hash, and each bucket, largest first, gets the
//! smallest 16-bit displacement that places all of its keys into distinct
//! free slots of an `N`-slot table. If a bucket cannot be placed the round
//! restarts with more buckets (see [`SphBuildConfig`]).
//!
//! Use [`SphSetBuilder`] or [`SphMapBuilder`] to build and save an index, and
//! [`SphSet`] or [`SphMap`] to load and query it.
//!
//! ```
//! use sphash::{SphMap, SphMapBuilder};
//!
//! # fn main() -> std::io::Result<()> {
//! let mut builder = SphMapBuilder::new();
//! builder.extend([(5u64, 50u64), (17, 170), (42, 420), (1000, 10000)]);
//! let stats = builder.build()?;
//! assert_eq!(stats.num_keys, 4);
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("x.bin");
//! builder.save_to_file(&path)?;
//!
//! let map = SphMap::<u64, u64>::open(&path)?;
//! assert_eq!(map.get(&42), Some(420));
//! assert_eq!(map.get(&99), None);
//! # Ok(())
//! # }
//! ```

/// Magic tag of a persisted set.
pub const MAGIC_SET: [u8; 4] = *b"SPHS";
/// Magic tag of a persisted map.
pub const MAGIC_MAP: [u8; 4] = *b"SPHM";
/// Current persisted format version.
pub const FORMAT_VERSION: u32 = 1;

mod hasher;
pub use hasher::{h1, h2, hash_bytes, HashPair};

mod config;
pub use config::{SphBuildConfig, DEFAULT_BUCKET_MULTIPLIERS, MAX_DISPLACEMENT};

mod meta;
pub use meta::{SphBuildStats, SphHeader, SphLayout};

mod reader;
pub use reader::SphReader;

mod writer;
pub use writer::SphWriter;

pub mod bucket;
pub mod solver;

mod format;

mod index;
pub use index::SphIndex;

mod set;
pub use set::SphSet;

mod map;
pub use map::{SphMap, SphMapIter};

mod builder;
pub use builder::{SphMapBuilder, SphSetBuilder};
