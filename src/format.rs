//! Encoding and decoding of the persisted index layout:
//!
//! ```text
//! header        32 bytes      see SphHeader
//! displacements B * u16 (LE)  one per bucket
//! keys          N * key_size  slot order, host byte order
//! values        N * val_size  slot order, maps only
//! ```
use std::io::{Error, ErrorKind, Result};

use bytemuck::Pod;

use crate::{SphHeader, SphLayout, SphReader};

/// Tables recovered from a persisted index.
#[derive(Debug)]
pub(crate) struct Decoded<K, V> {
    pub header: SphHeader,
    pub displacements: Vec<u16>,
    pub keys: Vec<K>,
    pub values: Vec<V>,
}

/// Raw bytes of a slice of plain values; empty for zero-sized types.
pub(crate) fn pod_bytes<T: Pod>(items: &[T]) -> &[u8] {
    if std::mem::size_of::<T>() == 0 {
        &[]
    } else {
        bytemuck::cast_slice(items)
    }
}

/// Reads `count` values from `bytes`, which may be unaligned.
pub(crate) fn decode_pods<T: Pod>(bytes: &[u8], count: usize) -> Vec<T> {
    let size = std::mem::size_of::<T>();
    if size == 0 {
        return vec![T::zeroed(); count];
    }
    bytes
        .chunks_exact(size)
        .take(count)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

pub(crate) fn decode_displacements(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Writes `header` and the three sections into `buf`.
///
/// Does not allocate. Returns the number of bytes written, or `WriteZero`
/// when `buf` is too small.
pub(crate) fn encode_into(
    buf: &mut [u8],
    header: &SphHeader,
    displacements: &[u16],
    keys: &[u8],
    values: &[u8],
) -> Result<usize> {
    let total = SphHeader::SIZE + displacements.len() * 2 + keys.len() + values.len();
    if buf.len() < total {
        return Err(Error::new(
            ErrorKind::WriteZero,
            format!(
                "Buffer of {} bytes cannot hold {} byte index",
                buf.len(),
                total
            ),
        ));
    }

    header.write_to(&mut buf[..SphHeader::SIZE]);
    let mut offset = SphHeader::SIZE;
    for &d in displacements {
        buf[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
        offset += 2;
    }
    buf[offset..offset + keys.len()].copy_from_slice(keys);
    offset += keys.len();
    buf[offset..offset + values.len()].copy_from_slice(values);
    offset += values.len();
    Ok(offset)
}

/// Decodes a complete in-memory index.
///
/// The buffer must be exactly as long as the header declares; shorter
/// buffers are `UnexpectedEof`, longer ones `InvalidData`.
pub(crate) fn decode<K: Pod, V: Pod>(data: &[u8], magic: [u8; 4]) -> Result<Decoded<K, V>> {
    let header = SphHeader::deserialize(data)?;
    header.validate(magic, std::mem::size_of::<K>())?;
    let layout = header.layout(std::mem::size_of::<V>());

    let expected = layout.total_length();
    if (data.len() as u64) < expected {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "Truncated index: {} bytes, expected {}",
                data.len(),
                expected
            ),
        ));
    }
    if data.len() as u64 > expected {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!(
                "Unexpected index length: {} bytes, expected {}",
                data.len(),
                expected
            ),
        ));
    }

    let section = |offset: u64, length: u64| &data[offset as usize..(offset + length) as usize];
    Ok(decode_sections(
        header,
        section(layout.displacements_offset, layout.displacements_length),
        section(layout.keys_offset, layout.keys_length),
        section(layout.values_offset, layout.values_length),
    ))
}

/// Decodes an index through positional reads.
///
/// The reader must end exactly where the layout ends. The value width is not
/// recorded in the header, so a reader with trailing bytes is `InvalidData`
/// and a short one is `UnexpectedEof`.
pub(crate) fn load<K: Pod, V: Pod, R: SphReader>(
    reader: &R,
    magic: [u8; 4],
) -> Result<Decoded<K, V>> {
    let header = reader.read_header()?;
    header.validate(magic, std::mem::size_of::<K>())?;
    let layout: SphLayout = header.layout(std::mem::size_of::<V>());

    let expected = layout.total_length();
    match reader.read_exact_at(expected, 1, |_| Ok(())) {
        Ok(()) => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unexpected index length: data continues past {expected} bytes"),
            ));
        }
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
        Err(e) => return Err(e),
    }

    let iov = [
        (layout.displacements_offset, layout.displacements_length),
        (layout.keys_offset, layout.keys_length),
        (layout.values_offset, layout.values_length),
    ];
    let mut sections = reader.batch_read_at(&iov, |_, data| Ok(data.to_vec()))?;
    let values = sections.pop().unwrap_or_default();
    let keys = sections.pop().unwrap_or_default();
    let displacements = sections.pop().unwrap_or_default();
    Ok(decode_sections(header, &displacements, &keys, &values))
}

fn decode_sections<K: Pod, V: Pod>(
    header: SphHeader,
    displacements: &[u8],
    keys: &[u8],
    values: &[u8],
) -> Decoded<K, V> {
    let num_keys = header.num_keys as usize;
    Decoded {
        header,
        displacements: decode_displacements(displacements),
        keys: decode_pods(keys, num_keys),
        values: decode_pods(values, num_keys),
    }
}
