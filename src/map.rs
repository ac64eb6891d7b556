use std::borrow::Borrow;
use std::io::Result;
use std::path::Path;

use bytemuck::Pod;

use crate::format::{self, Decoded};
use crate::{SphHeader, SphIndex, SphReader, MAGIC_MAP};

/// Immutable key-value map loaded from a persisted perfect hash index.
///
/// A `SphMap` starts out empty, answering every lookup with `None`, and is
/// populated once by [`from_bytes`](Self::from_bytes), [`load`](Self::load),
/// [`open`](Self::open) or the in-place loaders. Lookups hash the key, read
/// one displacement and compare one slot: O(1) with no probing. A loaded map
/// is never mutated, so it can be shared across threads without locking.
///
/// # Type Parameters
/// - `K`: fixed-width key type; must match the width recorded in the header.
/// - `V`: fixed-width value type; its width is implied by the payload length.
#[derive(Debug, Clone)]
pub struct SphMap<K, V> {
    index: SphIndex<K>,
    values: Vec<V>,
}

impl<K, V> Default for SphMap<K, V> {
    fn default() -> Self {
        SphMap {
            index: SphIndex::default(),
            values: Vec::new(),
        }
    }
}

impl<K: Pod + Eq, V: Pod> SphMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_decoded(decoded: Decoded<K, V>) -> Self {
        SphMap {
            index: SphIndex::new(decoded.header, decoded.displacements, decoded.keys),
            values: decoded.values,
        }
    }

    /// Decodes a map from a complete in-memory index.
    ///
    /// # Errors
    ///
    /// `InvalidData` on a bad magic, version, checksum, key width, value width
    /// or table shape, and `UnexpectedEof` on a truncated buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        format::decode(data, MAGIC_MAP).map(Self::from_decoded)
    }

    /// Reads a map through a positional reader, such as a `File`.
    ///
    /// Only the ranges declared by the header are read.
    pub fn load<R: SphReader>(reader: &R) -> Result<Self> {
        format::load(reader, MAGIC_MAP).map(Self::from_decoded)
    }

    /// Reads and decodes the whole file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Replaces the contents of this map with the index in `data`.
    ///
    /// On failure the map is left empty.
    pub fn load_from_memory(&mut self, data: &[u8]) -> Result<()> {
        self.replace_with(Self::from_bytes(data))
    }

    /// Replaces the contents of this map with the index stored at `path`.
    ///
    /// On failure the map is left empty.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.replace_with(Self::open(path))
    }

    fn replace_with(&mut self, loaded: Result<Self>) -> Result<()> {
        match loaded {
            Ok(map) => {
                *self = map;
                Ok(())
            }
            Err(e) => {
                log::debug!("failed to load perfect hash map: {e}");
                *self = Self::default();
                Err(e)
            }
        }
    }

    /// Returns the value stored for `key`.
    #[inline]
    pub fn get(&self, key: &K) -> Option<V> {
        self.index.slot_of(key).map(|slot| self.values[slot])
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains(key)
    }

    /// Performs multiple lookups, preserving the order of `keys`.
    pub fn batch_get(&self, keys: impl IntoIterator<Item = impl Borrow<K>>) -> Vec<Option<V>> {
        keys.into_iter().map(|key| self.get(key.borrow())).collect()
    }

    /// Slot of `key` in the perfect hash table.
    pub fn slot_of(&self, key: &K) -> Option<usize> {
        self.index.slot_of(key)
    }

    /// Iterates over all entries in slot order.
    pub fn iter(&self) -> SphMapIter<'_, K, V> {
        SphMapIter {
            keys: self.index.keys().iter(),
            values: self.values.iter(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn num_buckets(&self) -> usize {
        self.index.num_buckets()
    }

    pub fn header(&self) -> &SphHeader {
        self.index.header()
    }

    pub fn index(&self) -> &SphIndex<K> {
        &self.index
    }

    pub fn memory_usage(&self) -> usize {
        self.index.memory_usage() + self.values.len() * std::mem::size_of::<V>()
    }
}

/// Iterator over the entries of a [`SphMap`] in slot order.
pub struct SphMapIter<'a, K, V> {
    keys: std::slice::Iter<'a, K>,
    values: std::slice::Iter<'a, V>,
}

impl<K: Copy, V: Copy> Iterator for SphMapIter<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        Some((*self.keys.next()?, *self.values.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K: Copy, V: Copy> ExactSizeIterator for SphMapIter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use crate::*;

    fn scenario_bytes() -> Vec<u8> {
        let mut builder = SphMapBuilder::new();
        builder.extend([(5u64, 50u64), (17, 170), (42, 420), (1000, 10000)]);
        builder.build().unwrap();
        builder.save_to_memory().unwrap()
    }

    #[test]
    fn test_basic() {
        let map = SphMap::<u64, u64>::from_bytes(&scenario_bytes()).unwrap();
        assert!(map.is_loaded());
        assert_eq!(map.len(), 4);
        assert_eq!(map.header().magic, MAGIC_MAP);
        assert_eq!(map.get(&42), Some(420));
        assert_eq!(map.get(&5), Some(50));
        assert_eq!(map.get(&99), None);
        assert!(map.contains_key(&1000));
        assert!(!map.contains_key(&1001));

        let results = map.batch_get([17u64, 99, 1000]);
        assert_eq!(results, vec![Some(170), None, Some(10000)]);
        let keys = vec![5u64, 6];
        assert_eq!(map.batch_get(&keys), vec![Some(50), None]);

        let mut entries: Vec<_> = map.iter().collect();
        assert_eq!(map.iter().len(), 4);
        entries.sort();
        assert_eq!(entries, vec![(5, 50), (17, 170), (42, 420), (1000, 10000)]);

        let slots: Vec<usize> = entries
            .iter()
            .map(|(k, _)| map.slot_of(k).unwrap())
            .collect();
        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_map() {
        let map = SphMap::<u64, u64>::new();
        assert!(!map.is_loaded());
        assert_eq!(map.get(&0), None);
        assert_eq!(map.iter().count(), 0);
        assert_eq!(map.batch_get([1u64, 2]), vec![None, None]);
    }

    #[test]
    fn test_load_failure_leaves_map_empty() {
        let bytes = scenario_bytes();
        let mut map = SphMap::<u64, u64>::new();
        map.load_from_memory(&bytes).unwrap();
        assert_eq!(map.get(&17), Some(170));

        let err = map.load_from_memory(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        assert!(!map.is_loaded());
        assert_eq!(map.get(&17), None);

        map.load_from_memory(&bytes).unwrap();
        map.load_from_memory(&bytes[..16]).unwrap_err();
        assert!(map.is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let bytes = scenario_bytes();
        // Wrong key width.
        SphMap::<u32, u64>::from_bytes(&bytes).unwrap_err();
        // Wrong value width.
        SphMap::<u64, u32>::from_bytes(&bytes).unwrap_err();
        // A map is not a set.
        let err = SphSet::<u64>::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_positional_load_checks_value_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.bin");
        std::fs::write(&path, scenario_bytes()).unwrap();
        let file = std::fs::File::open(&path).unwrap();

        // Narrower values leave bytes past the declared end.
        let err = SphMap::<u64, u32>::load(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        // Wider values run past the end of the file.
        let err = SphMap::<u64, [u64; 2]>::load(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        SphMap::<u64, u32>::open(&path).unwrap_err();

        let map = SphMap::<u64, u64>::load(&file).unwrap();
        assert_eq!(map.get(&42), Some(420));

        let mut padded = scenario_bytes();
        padded.push(0);
        std::fs::write(&path, padded).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let err = SphMap::<u64, u64>::load(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");

        let mut builder = SphMapBuilder::new();
        builder.extend([(5u64, 50u64), (17, 170), (42, 420), (1000, 10000)]);
        builder.build().unwrap();
        builder.save_to_file(&path).unwrap();

        let mut map = SphMap::<u64, u64>::new();
        map.load_from_file(&path).unwrap();
        for (k, v) in [(5u64, 50u64), (17, 170), (42, 420), (1000, 10000)] {
            assert_eq!(map.get(&k), Some(v));
        }

        let file = std::fs::File::open(&path).unwrap();
        let loaded = SphMap::<u64, u64>::load(&file).unwrap();
        assert_eq!(loaded.get(&42), Some(420));
        assert_eq!(SphMap::<u64, u64>::open(&path).unwrap().len(), 4);

        map.load_from_file(dir.path().join("missing.bin"))
            .unwrap_err();
        assert!(!map.is_loaded());
    }
}
