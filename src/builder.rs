use std::io::{Error, ErrorKind, Result};
use std::path::Path;
use std::time::Instant;

use bytemuck::Pod;

use crate::bucket::{assign_buckets, Buckets};
use crate::format::{self, pod_bytes};
use crate::solver::{solve_bucket, OccupiedSlots, Placement};
use crate::{
    HashPair, SphBuildConfig, SphBuildStats, SphHeader, SphLayout, SphWriter, MAGIC_MAP,
    MAGIC_SET,
};

/// Tables produced by a successful build, in final slot order.
#[derive(Debug, Clone)]
struct Built<K, V> {
    displacements: Vec<u16>,
    keys: Vec<K>,
    values: Vec<V>,
    stats: SphBuildStats,
}

/// Builder for a static perfect hash map with fixed-width keys and values.
///
/// Collect pairs with [`add`](Self::add), run [`build`](Self::build) once, then
/// persist with [`save_to_memory`](Self::save_to_memory),
/// [`save_to_file`](Self::save_to_file), [`save`](Self::save) or
/// [`encode_into`](Self::encode_into). The result is read back with
/// [`SphMap`](crate::SphMap).
///
/// Keys must be unique. A duplicated key can never be placed, so `build`
/// fails for such input.
///
/// # Examples
///
/// ```
/// use sphash::{SphMap, SphMapBuilder};
///
/// # fn main() -> std::io::Result<()> {
/// let mut builder = SphMapBuilder::<u32, u32>::new();
/// builder.add(5, 50);
/// builder.add(17, 170);
/// builder.build()?;
///
/// let bytes = builder.save_to_memory()?;
/// let map = SphMap::<u32, u32>::from_bytes(&bytes)?;
/// assert_eq!(map.get(&17), Some(170));
/// assert_eq!(map.get(&99), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SphMapBuilder<K, V> {
    magic: [u8; 4],
    config: SphBuildConfig,
    keys: Vec<K>,
    values: Vec<V>,
    built: Option<Built<K, V>>,
}

impl<K, V> Default for SphMapBuilder<K, V> {
    fn default() -> Self {
        Self::with_magic(MAGIC_MAP, 0)
    }
}

impl<K, V> SphMapBuilder<K, V> {
    fn with_magic(magic: [u8; 4], capacity: usize) -> Self {
        SphMapBuilder {
            magic,
            config: SphBuildConfig::default(),
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            built: None,
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_magic(MAGIC_MAP, capacity)
    }

    /// Replaces the whole retry policy.
    pub fn with_config(mut self, config: SphBuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bucket count multipliers, one build round each.
    pub fn with_bucket_multipliers(mut self, multipliers: impl Into<Vec<f64>>) -> Self {
        self.config.bucket_multipliers = multipliers.into();
        self
    }

    /// Overrides the exclusive bound of the per-bucket displacement search.
    pub fn with_max_displacement(mut self, max_displacement: u32) -> Self {
        self.config.max_displacement = max_displacement;
        self
    }

    pub fn config(&self) -> &SphBuildConfig {
        &self.config
    }

    /// Queues a pair. Discards the result of any previous build.
    pub fn add(&mut self, key: K, value: V) {
        self.built = None;
        self.keys.push(key);
        self.values.push(value);
    }

    /// Number of queued pairs.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Statistics of the last successful build.
    pub fn stats(&self) -> Option<&SphBuildStats> {
        self.built.as_ref().map(|built| &built.stats)
    }

    /// Per-bucket displacements of the last successful build.
    pub fn displacements(&self) -> Option<&[u16]> {
        self.built.as_ref().map(|built| built.displacements.as_slice())
    }

    /// Keys in final slot order.
    pub fn slot_keys(&self) -> Option<&[K]> {
        self.built.as_ref().map(|built| built.keys.as_slice())
    }

    /// Values in final slot order.
    pub fn slot_values(&self) -> Option<&[V]> {
        self.built.as_ref().map(|built| built.values.as_slice())
    }

    /// Size in bytes of the persisted index, once built.
    pub fn serialized_len(&self) -> Option<usize> {
        self.stats().map(|stats| stats.serialized_len as usize)
    }

    fn built(&self) -> Result<&Built<K, V>> {
        self.built.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                "Perfect hash has not been built successfully",
            )
        })
    }
}

impl<K: Pod, V: Pod> SphMapBuilder<K, V> {
    /// Runs the construction rounds over the queued keys.
    ///
    /// Each round assigns keys to buckets, then searches a displacement for
    /// every bucket, largest bucket first, against a shared slot table. A
    /// round ends at the first bucket without a collision-free displacement
    /// and the next round retries from scratch with more buckets.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty key list, more than `u32::MAX` keys or an
    /// invalid configuration; `Other` when every round fails, which also
    /// happens for duplicated keys.
    pub fn build(&mut self) -> Result<&SphBuildStats> {
        self.built = None;
        self.config.validate()?;

        let num_keys = self.keys.len();
        if num_keys == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Cannot build a perfect hash over zero keys",
            ));
        }
        if num_keys > u32::MAX as usize {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Too many keys: {num_keys}"),
            ));
        }

        let start = Instant::now();
        let hashes: Vec<HashPair> = self.keys.iter().map(HashPair::of).collect();
        let bucket_counts = self.config.bucket_counts(num_keys);
        let rounds = bucket_counts.len();

        for (round, num_buckets) in bucket_counts.into_iter().enumerate() {
            if num_buckets > u32::MAX as usize {
                log::warn!("round {round}: {num_buckets} buckets exceed the format limit");
                continue;
            }
            log::debug!("round {round}: placing {num_keys} keys with {num_buckets} buckets");

            let buckets = assign_buckets(&hashes, num_buckets);
            let Some(placement) =
                place_buckets(&hashes, &buckets, num_keys, self.config.max_displacement)
            else {
                log::warn!("round {round}: displacement search exhausted with {num_buckets} buckets");
                continue;
            };

            let keys: Vec<K> = placement
                .slots
                .iter()
                .map(|&index| self.keys[index as usize])
                .collect();
            let values: Vec<V> = placement
                .slots
                .iter()
                .map(|&index| self.values[index as usize])
                .collect();

            let layout = SphLayout::new(
                num_keys,
                num_buckets,
                std::mem::size_of::<K>(),
                std::mem::size_of::<V>(),
            );
            let stats = SphBuildStats {
                retry_count: round as u32,
                num_buckets: num_buckets as u32,
                num_keys: num_keys as u32,
                space_overhead: SphBuildStats::space_overhead(num_keys, num_buckets),
                build_time: start.elapsed(),
                empty_buckets: buckets.empty_buckets() as u32,
                max_bucket_size: buckets.max_bucket_len() as u32,
                max_displacement_used: placement.displacements.iter().copied().max().unwrap_or(0),
                serialized_len: layout.total_length(),
            };
            log::info!(
                "built perfect hash: {} keys, {} buckets, {} retries, {:?}",
                stats.num_keys,
                stats.num_buckets,
                stats.retry_count,
                stats.build_time
            );

            let built = self.built.insert(Built {
                displacements: placement.displacements,
                keys,
                values,
                stats,
            });
            return Ok(&built.stats);
        }

        log::error!("failed to build perfect hash for {num_keys} keys after {rounds} rounds");
        Err(Error::other(format!(
            "Failed to build perfect hash for {num_keys} keys after {rounds} rounds"
        )))
    }

    fn header(&self, built: &Built<K, V>) -> SphHeader {
        SphHeader::new(
            self.magic,
            built.stats.num_keys,
            built.stats.num_buckets,
            std::mem::size_of::<K>() as u32,
        )
    }

    /// Encodes the built index into `buf` without allocating.
    ///
    /// Returns the number of bytes written; `buf` must hold at least
    /// [`serialized_len`](Self::serialized_len) bytes.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let built = self.built()?;
        format::encode_into(
            buf,
            &self.header(built),
            &built.displacements,
            pod_bytes(&built.keys),
            pod_bytes(&built.values),
        )
    }

    pub fn save_to_memory(&self) -> Result<Vec<u8>> {
        let built = self.built()?;
        let mut buf = vec![0u8; built.stats.serialized_len as usize];
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Writes the built index through a positional writer, section by section.
    ///
    /// Returns the number of bytes written.
    pub fn save<W: SphWriter>(&self, writer: &W) -> Result<u64> {
        let built = self.built()?;
        let header = self.header(built);
        let layout = header.layout(std::mem::size_of::<V>());

        let displacements: Vec<u8> = built
            .displacements
            .iter()
            .flat_map(|d| d.to_le_bytes())
            .collect();
        // Header is written last.
        writer.write_sections(&[
            (layout.displacements_offset, displacements.as_slice()),
            (layout.keys_offset, pod_bytes(&built.keys)),
            (layout.values_offset, pod_bytes(&built.values)),
            (0, &header.serialize()[..]),
        ])
    }

    /// Writes the built index to `path`, replacing any existing file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_to_memory()?;
        std::fs::write(path, bytes)
    }
}

impl<K, V> Extend<(K, V)> for SphMapBuilder<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for SphMapBuilder<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut builder = Self::new();
        builder.extend(iter);
        builder
    }
}

/// Places every bucket of one round, largest first, into an `num_slots`-slot table.
///
/// Returns `None` as soon as one bucket cannot be placed.
fn place_buckets(
    hashes: &[HashPair],
    buckets: &Buckets,
    num_slots: usize,
    max_displacement: u32,
) -> Option<Placement> {
    let mut occupied = OccupiedSlots::new(num_slots);
    let mut placement = Placement::new(buckets.len(), num_slots);
    let mut positions = Vec::with_capacity(buckets.max_bucket_len());

    for bucket in buckets.processing_order() {
        let bucket = bucket as usize;
        solve_bucket(
            bucket,
            buckets.members(bucket),
            hashes,
            &mut occupied,
            &mut placement,
            max_displacement,
            &mut positions,
        )?;
    }

    if occupied.count() != num_slots {
        log::error!(
            "placement covered {} of {} slots",
            occupied.count(),
            num_slots
        );
        return None;
    }
    Some(placement)
}

/// Builder for a static perfect hash set with fixed-width keys.
///
/// The set counterpart of [`SphMapBuilder`]; read the result back with
/// [`SphSet`](crate::SphSet).
///
/// ```
/// use sphash::{SphSet, SphSetBuilder};
///
/// # fn main() -> std::io::Result<()> {
/// let mut builder: SphSetBuilder<u64> = (0..100).collect();
/// let stats = builder.build()?;
/// assert_eq!(stats.num_keys, 100);
///
/// let set = SphSet::<u64>::from_bytes(&builder.save_to_memory()?)?;
/// assert!(set.contains(&99));
/// assert!(!set.contains(&100));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SphSetBuilder<K> {
    inner: SphMapBuilder<K, ()>,
}

impl<K> Default for SphSetBuilder<K> {
    fn default() -> Self {
        SphSetBuilder {
            inner: SphMapBuilder::with_magic(MAGIC_SET, 0),
        }
    }
}

impl<K> SphSetBuilder<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SphSetBuilder {
            inner: SphMapBuilder::with_magic(MAGIC_SET, capacity),
        }
    }

    /// Replaces the whole retry policy.
    pub fn with_config(self, config: SphBuildConfig) -> Self {
        SphSetBuilder {
            inner: self.inner.with_config(config),
        }
    }

    pub fn with_bucket_multipliers(self, multipliers: impl Into<Vec<f64>>) -> Self {
        SphSetBuilder {
            inner: self.inner.with_bucket_multipliers(multipliers),
        }
    }

    pub fn with_max_displacement(self, max_displacement: u32) -> Self {
        SphSetBuilder {
            inner: self.inner.with_max_displacement(max_displacement),
        }
    }

    pub fn config(&self) -> &SphBuildConfig {
        self.inner.config()
    }

    /// Queues a key. Discards the result of any previous build.
    pub fn add(&mut self, key: K) {
        self.inner.add(key, ());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.inner.is_built()
    }

    pub fn stats(&self) -> Option<&SphBuildStats> {
        self.inner.stats()
    }

    pub fn displacements(&self) -> Option<&[u16]> {
        self.inner.displacements()
    }

    pub fn slot_keys(&self) -> Option<&[K]> {
        self.inner.slot_keys()
    }

    pub fn serialized_len(&self) -> Option<usize> {
        self.inner.serialized_len()
    }
}

impl<K: Pod> SphSetBuilder<K> {
    /// See [`SphMapBuilder::build`].
    pub fn build(&mut self) -> Result<&SphBuildStats> {
        self.inner.build()
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.encode_into(buf)
    }

    pub fn save_to_memory(&self) -> Result<Vec<u8>> {
        self.inner.save_to_memory()
    }

    pub fn save<W: SphWriter>(&self, writer: &W) -> Result<u64> {
        self.inner.save(writer)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.save_to_file(path)
    }
}

impl<K> Extend<K> for SphSetBuilder<K> {
    fn extend<T: IntoIterator<Item = K>>(&mut self, iter: T) {
        for key in iter {
            self.add(key);
        }
    }
}

impl<K> FromIterator<K> for SphSetBuilder<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut builder = Self::new();
        builder.extend(iter);
        builder
    }
}
