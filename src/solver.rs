use crate::HashPair;

/// Fixed-size bitmap over the `N` slots of the final table.
#[derive(Debug, Clone)]
pub struct OccupiedSlots {
    words: Vec<u64>,
    len: usize,
    count: usize,
}

impl OccupiedSlots {
    pub fn new(len: usize) -> Self {
        OccupiedSlots {
            words: vec![0; len.div_ceil(64)],
            len,
            count: 0,
        }
    }

    /// Number of slots covered by the bitmap.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots currently marked.
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn get(&self, slot: usize) -> bool {
        self.words[slot / 64] & (1u64 << (slot % 64)) != 0
    }

    /// Marks `slot`, returning false if it was already taken.
    #[inline]
    pub fn set(&mut self, slot: usize) -> bool {
        let word = &mut self.words[slot / 64];
        let bit = 1u64 << (slot % 64);
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        self.count += 1;
        true
    }

    #[inline]
    pub fn clear(&mut self, slot: usize) {
        let word = &mut self.words[slot / 64];
        let bit = 1u64 << (slot % 64);
        if *word & bit != 0 {
            *word &= !bit;
            self.count -= 1;
        }
    }
}

/// Output of one successful build round.
///
/// `slots[p]` is the index (into the builder's key list) of the key stored at
/// slot `p`; keys and values are gathered through it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub displacements: Vec<u16>,
    pub slots: Vec<u32>,
}

impl Placement {
    pub fn new(num_buckets: usize, num_slots: usize) -> Self {
        Placement {
            displacements: vec![0; num_buckets],
            slots: vec![u32::MAX; num_slots],
        }
    }
}

/// Searches the smallest displacement `d < max_displacement` that places every
/// key of `bucket` into a distinct free slot.
///
/// On success the slots are marked in `occupied`, written to
/// `placement.slots`, `d` is recorded for the bucket and returned. On failure
/// `occupied` and `placement` are left untouched and `None` is returned.
pub fn solve_bucket(
    bucket: usize,
    members: &[u32],
    hashes: &[HashPair],
    occupied: &mut OccupiedSlots,
    placement: &mut Placement,
    max_displacement: u32,
    positions: &mut Vec<usize>,
) -> Option<u16> {
    let num_slots = occupied.len() as u64;
    'search: for d in 0..max_displacement {
        positions.clear();
        for &index in members {
            let pos = hashes[index as usize].position(d as u64, num_slots);
            // Marking as we go also catches collisions inside the bucket.
            if !occupied.set(pos) {
                for &taken in positions.iter() {
                    occupied.clear(taken);
                }
                continue 'search;
            }
            positions.push(pos);
        }

        for (&index, &pos) in members.iter().zip(positions.iter()) {
            placement.slots[pos] = index;
        }
        placement.displacements[bucket] = d as u16;
        return Some(d as u16);
    }
    None
}
