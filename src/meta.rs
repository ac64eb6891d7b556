use std::io::{Error, ErrorKind, Result};
use std::time::Duration;

use serde::Serialize;

use crate::FORMAT_VERSION;

/// Fixed-size header at the start of every persisted index.
///
/// All integers are little-endian `u32`.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SphHeader {
    /// `b"SPHS"` for sets, `b"SPHM"` for maps.
    pub magic: [u8; 4],
    /// Format version, currently [`FORMAT_VERSION`].
    pub version: u32,
    /// Number of keys `N`, which is also the number of slots.
    pub num_keys: u32,
    /// Number of buckets `B`, one displacement entry each.
    pub num_buckets: u32,
    /// Byte width of one key.
    pub key_size: u32,
    /// `num_keys + num_buckets`, wrapping.
    pub checksum: u32,
    /// Written as zero, ignored on read.
    pub reserved: [u32; 2],
}

impl SphHeader {
    pub const SIZE: usize = 32;

    pub fn new(magic: [u8; 4], num_keys: u32, num_buckets: u32, key_size: u32) -> Self {
        SphHeader {
            magic,
            version: FORMAT_VERSION,
            num_keys,
            num_buckets,
            key_size,
            checksum: Self::compute_checksum(num_keys, num_buckets),
            reserved: [0; 2],
        }
    }

    pub fn compute_checksum(num_keys: u32, num_buckets: u32) -> u32 {
        num_keys.wrapping_add(num_buckets)
    }

    /// Writes the header into the first [`SIZE`](Self::SIZE) bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.magic);
        let words = [
            self.version,
            self.num_keys,
            self.num_buckets,
            self.key_size,
            self.checksum,
            self.reserved[0],
            self.reserved[1],
        ];
        for (chunk, word) in buf[4..Self::SIZE].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Parses a header from the start of `data` without validating it.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "Buffer of {} bytes is shorter than the {} byte header",
                    data.len(),
                    Self::SIZE
                ),
            ));
        }
        let word = |i: usize| {
            let offset = 4 + i * 4;
            u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ])
        };
        Ok(SphHeader {
            magic: [data[0], data[1], data[2], data[3]],
            version: word(0),
            num_keys: word(1),
            num_buckets: word(2),
            key_size: word(3),
            checksum: word(4),
            reserved: [word(5), word(6)],
        })
    }

    /// Verifies the header against the container reading it.
    pub fn validate(&self, magic: [u8; 4], key_size: usize) -> Result<()> {
        if self.magic != magic {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Invalid magic: expected {:?}, found {:?}",
                    String::from_utf8_lossy(&magic),
                    String::from_utf8_lossy(&self.magic)
                ),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unsupported format version: {}", self.version),
            ));
        }
        if self.checksum != Self::compute_checksum(self.num_keys, self.num_buckets) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Checksum mismatch: {}", self.checksum),
            ));
        }
        if self.key_size as usize != key_size {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Key size mismatch: file has {}, expected {}",
                    self.key_size, key_size
                ),
            ));
        }
        if self.num_keys == 0 || self.num_buckets < self.num_keys {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Invalid table shape: {} keys, {} buckets",
                    self.num_keys, self.num_buckets
                ),
            ));
        }
        Ok(())
    }

    /// Byte layout of the sections following this header.
    pub fn layout(&self, value_size: usize) -> SphLayout {
        SphLayout::new(
            self.num_keys as usize,
            self.num_buckets as usize,
            self.key_size as usize,
            value_size,
        )
    }
}

/// Offsets of the persisted sections, in bytes from the start of the buffer.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SphLayout {
    pub displacements_offset: u64,
    pub displacements_length: u64,
    pub keys_offset: u64,
    pub keys_length: u64,
    pub values_offset: u64,
    pub values_length: u64,
}

impl SphLayout {
    pub fn new(num_keys: usize, num_buckets: usize, key_size: usize, value_size: usize) -> Self {
        let displacements_offset = SphHeader::SIZE as u64;
        let displacements_length = num_buckets as u64 * 2;
        let keys_offset = displacements_offset + displacements_length;
        let keys_length = num_keys as u64 * key_size as u64;
        let values_offset = keys_offset + keys_length;
        let values_length = num_keys as u64 * value_size as u64;
        SphLayout {
            displacements_offset,
            displacements_length,
            keys_offset,
            keys_length,
            values_offset,
            values_length,
        }
    }

    /// Total length of a buffer holding this layout.
    pub fn total_length(&self) -> u64 {
        self.values_offset + self.values_length
    }
}

/// Summary of the last successful build.
#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct SphBuildStats {
    /// Index of the round that succeeded; 0 when the first bucket count worked.
    pub retry_count: u32,
    /// Bucket count `B` of the successful round.
    pub num_buckets: u32,
    /// Number of keys `N`.
    pub num_keys: u32,
    /// `(B - N) / N * 100`.
    pub space_overhead: f64,
    /// Wall time spent in `build`, over all rounds.
    pub build_time: Duration,
    /// Buckets that received no key.
    pub empty_buckets: u32,
    /// Size of the largest bucket.
    pub max_bucket_size: u32,
    /// Largest displacement chosen for any bucket.
    pub max_displacement_used: u16,
    /// Bytes produced by saving the built index.
    pub serialized_len: u64,
}

impl SphBuildStats {
    pub fn space_overhead(num_keys: usize, num_buckets: usize) -> f64 {
        (num_buckets as f64 - num_keys as f64) / num_keys as f64 * 100.0
    }
}
