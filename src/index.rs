use bytemuck::Pod;

use crate::{HashPair, SphHeader};

/// Read-only perfect hash lookup shared by [`SphSet`](crate::SphSet) and
/// [`SphMap`](crate::SphMap).
///
/// Holds the displacement table and the slot array. An index built with
/// [`Default`] is empty and resolves no key.
#[derive(Debug, Clone)]
pub struct SphIndex<K> {
    header: SphHeader,
    displacements: Vec<u16>,
    keys: Vec<K>,
}

impl<K> Default for SphIndex<K> {
    fn default() -> Self {
        SphIndex {
            header: SphHeader::default(),
            displacements: Vec::new(),
            keys: Vec::new(),
        }
    }
}

impl<K: Pod + Eq> SphIndex<K> {
    pub(crate) fn new(header: SphHeader, displacements: Vec<u16>, keys: Vec<K>) -> Self {
        SphIndex {
            header,
            displacements,
            keys,
        }
    }

    /// Slot holding `key`, or `None` if `key` was not part of the built set.
    ///
    /// The candidate slot is always compared against `key`: a foreign key can
    /// land on a slot owned by a different trained key.
    #[inline]
    pub fn slot_of(&self, key: &K) -> Option<usize> {
        if self.keys.is_empty() || self.displacements.is_empty() {
            return None;
        }
        let pair = HashPair::of(key);
        let bucket = pair.bucket(self.displacements.len() as u64);
        let displacement = self.displacements[bucket] as u64;
        let pos = pair.position(displacement, self.keys.len() as u64);
        (self.keys[pos] == *key).then_some(pos)
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.slot_of(key).is_some()
    }

    /// Header of the loaded index; all zeroes when empty.
    pub fn header(&self) -> &SphHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn num_buckets(&self) -> usize {
        self.displacements.len()
    }

    pub fn displacements(&self) -> &[u16] {
        &self.displacements
    }

    /// Keys in slot order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Bytes held by the displacement table and slot array.
    pub fn memory_usage(&self) -> usize {
        self.displacements.len() * std::mem::size_of::<u16>()
            + self.keys.len() * std::mem::size_of::<K>()
    }
}
