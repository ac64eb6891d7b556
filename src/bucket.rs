use crate::HashPair;

/// Build-time partition of key indices into `h1 mod B` buckets.
///
/// Members are stored contiguously per bucket: bucket `i` owns
/// `members[offsets[i]..offsets[i + 1]]`. Within a bucket, keys keep their
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    offsets: Vec<u32>,
    members: Vec<u32>,
}

impl Buckets {
    /// Number of buckets, including empty ones.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices (into the builder's key list) of the keys in `bucket`.
    pub fn members(&self, bucket: usize) -> &[u32] {
        &self.members[self.offsets[bucket] as usize..self.offsets[bucket + 1] as usize]
    }

    pub fn bucket_len(&self, bucket: usize) -> usize {
        (self.offsets[bucket + 1] - self.offsets[bucket]) as usize
    }

    pub fn empty_buckets(&self) -> usize {
        (0..self.len()).filter(|&b| self.bucket_len(b) == 0).count()
    }

    pub fn max_bucket_len(&self) -> usize {
        (0..self.len())
            .map(|b| self.bucket_len(b))
            .max()
            .unwrap_or(0)
    }

    /// Non-empty bucket indices, largest bucket first, ties by ascending index.
    pub fn processing_order(&self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.len() as u32)
            .filter(|&b| self.bucket_len(b as usize) > 0)
            .collect();
        order.sort_by(|&a, &b| {
            self.bucket_len(b as usize)
                .cmp(&self.bucket_len(a as usize))
                .then(a.cmp(&b))
        });
        order
    }
}

/// Partitions `hashes` into `num_buckets` buckets by `h1 mod num_buckets`.
///
/// Every index of `hashes` lands in exactly one bucket.
pub fn assign_buckets(hashes: &[HashPair], num_buckets: usize) -> Buckets {
    assert!(num_buckets > 0);
    let bucket_of: Vec<usize> = hashes
        .iter()
        .map(|pair| pair.bucket(num_buckets as u64))
        .collect();

    let mut offsets = vec![0u32; num_buckets + 1];
    for &b in &bucket_of {
        offsets[b + 1] += 1;
    }
    for i in 0..num_buckets {
        offsets[i + 1] += offsets[i];
    }

    let mut cursor = offsets.clone();
    let mut members = vec![0u32; hashes.len()];
    for (index, &b) in bucket_of.iter().enumerate() {
        members[cursor[b] as usize] = index as u32;
        cursor[b] += 1;
    }

    Buckets { offsets, members }
}
