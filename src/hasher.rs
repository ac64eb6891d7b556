use bytemuck::Pod;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const MIX_SEED: u64 = 0x9e37_79b9_7f4a_7c15;
const MIX_MULTIPLIER: u64 = 0xff51_afd7_ed55_8ccd;
const MIX_FINALIZER: u64 = 0xc4ce_b9fe_1a85_ec53;

#[inline]
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[inline]
fn avalanche(mut hash: u64) -> u64 {
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(MIX_MULTIPLIER);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(MIX_FINALIZER);
    hash ^= hash >> 33;
    hash
}

/// Primary hash: 64-bit FNV-1a over the raw key bytes, followed by an
/// avalanche step so that the low bits depend on every input bit.
///
/// Selects the bucket (`h1 mod B`) and is the base offset of the slot position.
#[inline]
pub fn h1(bytes: &[u8]) -> u64 {
    avalanche(fnv1a(bytes))
}

/// Secondary hash: a multiply-xorshift mix with its own seed.
///
/// The result is always odd, so `h1 + d * h2` never repeats for distinct
/// 16-bit displacements.
#[inline]
pub fn h2(bytes: &[u8]) -> u64 {
    let mut hash = MIX_SEED ^ (bytes.len() as u64);
    for &byte in bytes {
        hash = (hash ^ byte as u64).wrapping_mul(MIX_MULTIPLIER);
        hash ^= hash >> 29;
    }
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(MIX_FINALIZER);
    hash ^= hash >> 33;
    hash | 1
}

/// Both hashes of a single key, computed once and reused by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPair {
    pub h1: u64,
    pub h2: u64,
}

impl HashPair {
    /// Hashes the raw byte representation of `key`.
    #[inline]
    pub fn of<K: Pod>(key: &K) -> Self {
        Self::from_bytes(bytemuck::bytes_of(key))
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        HashPair {
            h1: h1(bytes),
            h2: h2(bytes),
        }
    }

    /// Bucket index for a table of `num_buckets` buckets.
    #[inline]
    pub fn bucket(&self, num_buckets: u64) -> usize {
        (self.h1 % num_buckets) as usize
    }

    /// Slot index under displacement `d` for a table of `num_slots` slots:
    /// `avalanche(h1 + d * h2) mod num_slots`, with wrapping 64-bit arithmetic.
    ///
    /// The avalanche step makes successive displacements land on unrelated
    /// slots for any table size. The persisted format depends on this exact
    /// formula.
    #[inline]
    pub fn position(&self, displacement: u64, num_slots: u64) -> usize {
        let probe = self
            .h1
            .wrapping_add(displacement.wrapping_mul(self.h2));
        (avalanche(probe) % num_slots) as usize
    }
}

/// Convenience for callers that only hold bytes.
pub fn hash_bytes(bytes: &[u8]) -> (u64, u64) {
    let pair = HashPair::from_bytes(bytes);
    (pair.h1, pair.h2)
}
