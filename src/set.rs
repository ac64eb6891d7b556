use std::borrow::Borrow;
use std::io::Result;
use std::path::Path;

use bytemuck::Pod;

use crate::format::{self, Decoded};
use crate::{SphHeader, SphIndex, SphReader, MAGIC_SET};

/// Immutable set loaded from a persisted perfect hash index.
///
/// The membership counterpart of [`SphMap`](crate::SphMap): same loaders,
/// same lookup path, no value array.
#[derive(Debug, Clone)]
pub struct SphSet<K> {
    index: SphIndex<K>,
}

impl<K> Default for SphSet<K> {
    fn default() -> Self {
        SphSet {
            index: SphIndex::default(),
        }
    }
}

impl<K: Pod + Eq> SphSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_decoded(decoded: Decoded<K, ()>) -> Self {
        SphSet {
            index: SphIndex::new(decoded.header, decoded.displacements, decoded.keys),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        format::decode(data, MAGIC_SET).map(Self::from_decoded)
    }

    pub fn load<R: SphReader>(reader: &R) -> Result<Self> {
        format::load(reader, MAGIC_SET).map(Self::from_decoded)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Replaces the contents of this set; on failure the set is left empty.
    pub fn load_from_memory(&mut self, data: &[u8]) -> Result<()> {
        self.replace_with(Self::from_bytes(data))
    }

    /// Replaces the contents of this set; on failure the set is left empty.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.replace_with(Self::open(path))
    }

    fn replace_with(&mut self, loaded: Result<Self>) -> Result<()> {
        match loaded {
            Ok(set) => {
                *self = set;
                Ok(())
            }
            Err(e) => {
                log::debug!("failed to load perfect hash set: {e}");
                *self = Self::default();
                Err(e)
            }
        }
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains(key)
    }

    pub fn batch_contains(&self, keys: impl IntoIterator<Item = impl Borrow<K>>) -> Vec<bool> {
        keys.into_iter()
            .map(|key| self.contains(key.borrow()))
            .collect()
    }

    pub fn slot_of(&self, key: &K) -> Option<usize> {
        self.index.slot_of(key)
    }

    /// Keys in slot order.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, K>> {
        self.index.keys().iter().copied()
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
        self.index.memory_usage()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use crate::*;

    #[test]
    fn test_sequential_keys() {
        let mut builder: SphSetBuilder<u32> = (0..100).collect();
        let stats = builder.build().unwrap().clone();
        assert_eq!(stats.num_keys, 100);
        assert!([100, 150, 200].contains(&stats.num_buckets));

        let set = SphSet::<u32>::from_bytes(&builder.save_to_memory().unwrap()).unwrap();
        assert_eq!(set.len(), 100);
        assert_eq!(set.num_buckets(), stats.num_buckets as usize);
        for key in 0..100 {
            assert!(set.contains(&key), "missing {key}");
        }
        assert!(!set.contains(&100));
        assert_eq!(
            set.batch_contains([0u32, 100, 99, 1000]),
            vec![true, false, true, false]
        );

        let mut keys: Vec<u32> = set.iter().collect();
        keys.sort();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());
        assert_eq!(
            set.memory_usage(),
            set.num_buckets() * 2 + 100 * std::mem::size_of::<u32>()
        );
    }

    #[test]
    fn test_short_buffer() {
        let mut set = SphSet::<u64>::new();
        for len in [0, 1, 31] {
            let err = set.load_from_memory(&vec![0u8; len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
            assert!(!set.is_loaded());
        }
        assert!(!set.contains(&0));
    }

    #[test]
    fn test_corrupted_header() {
        let mut builder: SphSetBuilder<u64> = [3u64, 1, 4, 1_000_000].into_iter().collect();
        builder.build().unwrap();
        let bytes = builder.save_to_memory().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[..4].copy_from_slice(b"XXXX");
        SphSet::<u64>::from_bytes(&bad_magic).unwrap_err();

        let mut bad_checksum = bytes.clone();
        bad_checksum[20] = bad_checksum[20].wrapping_add(1);
        SphSet::<u64>::from_bytes(&bad_checksum).unwrap_err();

        let mut bad_version = bytes.clone();
        bad_version[4] = 9;
        SphSet::<u64>::from_bytes(&bad_version).unwrap_err();

        let set = SphSet::<u64>::from_bytes(&bytes).unwrap();
        assert!(set.contains(&1_000_000));
        assert!(!set.contains(&2));
    }

    #[test]
    fn test_positional_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.sph");
        let mut builder: SphSetBuilder<u64> = (0..1000u64).map(|i| i * i).collect();
        builder.build().unwrap();

        let file = std::fs::File::create(&path).unwrap();
        let written = builder.save(&file).unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len());

        let file = std::fs::File::open(&path).unwrap();
        let set = SphSet::<u64>::load(&file).unwrap();
        assert!((0..1000u64).all(|i| set.contains(&(i * i))));
        assert!(!set.contains(&2));

        // Truncated files fail the positional read.
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(written - 1).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        SphSet::<u64>::load(&file).unwrap_err();

        let mut set = SphSet::<u64>::new();
        set.load_from_file(&path).unwrap_err();
        assert!(set.is_empty());
    }
}
