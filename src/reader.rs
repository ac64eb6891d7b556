use std::io::Result;

use crate::SphHeader;

/// Positional read access to a persisted index.
///
/// Loading reads the header, the declared section ranges and one byte
/// past the end, so the reader must hold exactly one index. Blanket-implemented
/// for platform `FileExt` handles.
pub trait SphReader {
    /// Reads `length` bytes starting at `offset` and forwards them to `f`.
    ///
    /// Implementations should return an error whenever the requested range
    /// cannot be satisfied in full.
    fn read_exact_at<F, R>(&self, offset: u64, length: u64, f: F) -> Result<R>
    where
        F: Fn(&[u8]) -> Result<R>;

    /// Reads and parses the fixed-size header at offset zero.
    fn read_header(&self) -> Result<SphHeader> {
        self.read_exact_at(0, SphHeader::SIZE as u64, SphHeader::deserialize)
    }

    /// Reads multiple ranges in sequence, delegating to [`read_exact_at`](Self::read_exact_at).
    ///
    /// Empty ranges are passed to `f` as an empty slice without touching the
    /// reader.
    fn batch_read_at<F, R>(&self, iov: &[(u64, u64)], f: F) -> Result<Vec<R>>
    where
        F: Fn(usize, &[u8]) -> Result<R>,
    {
        let mut results = Vec::with_capacity(iov.len());
        for (index, &(offset, length)) in iov.iter().enumerate() {
            if length == 0 {
                results.push(f(index, &[])?);
            } else {
                let result = self.read_exact_at(offset, length, |data| f(index, data))?;
                results.push(result);
            }
        }
        Ok(results)
    }
}

#[cfg(unix)]
impl<T: std::os::unix::fs::FileExt> SphReader for T {
    fn read_exact_at<F, R>(&self, offset: u64, length: u64, f: F) -> Result<R>
    where
        F: Fn(&[u8]) -> Result<R>,
    {
        let mut buffer = vec![0u8; length as usize];
        std::os::unix::fs::FileExt::read_exact_at(self, &mut buffer, offset)?;
        f(&buffer)
    }
}

#[cfg(windows)]
impl<T: std::os::windows::fs::FileExt> SphReader for T {
    fn read_exact_at<F, R>(&self, offset: u64, length: u64, f: F) -> Result<R>
    where
        F: Fn(&[u8]) -> Result<R>,
    {
        let mut buffer = vec![0u8; length as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            let bytes = self.seek_read(&mut buffer[filled..], offset + filled as u64)?;
            if bytes == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Failed to read enough bytes",
                ));
            }
            filled += bytes;
        }
        f(&buffer)
    }
}
