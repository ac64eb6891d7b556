use std::io::Result;

/// Positional sink for a built index.
///
/// Blanket-implemented for `FileExt` handles on Unix and Windows.
pub trait SphWriter {
    /// Writes all of `data` at the given absolute `offset`.
    fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()>;

    /// Writes `(offset, data)` sections in the given order.
    ///
    /// Returns the end offset of the furthest section. Empty sections are
    /// skipped.
    fn write_sections(&self, sections: &[(u64, &[u8])]) -> Result<u64> {
        let mut end = 0;
        for &(offset, data) in sections {
            if !data.is_empty() {
                self.write_all_at(data, offset)?;
            }
            end = end.max(offset + data.len() as u64);
        }
        Ok(end)
    }
}

#[cfg(unix)]
impl<T: std::os::unix::fs::FileExt> SphWriter for T {
    fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, data, offset)
    }
}

#[cfg(windows)]
impl<T: std::os::windows::fs::FileExt> SphWriter for T {
    fn write_all_at(&self, mut data: &[u8], mut offset: u64) -> Result<()> {
        while !data.is_empty() {
            let written = self.seek_write(data, offset)?;
            if written == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write whole buffer",
                ));
            }
            data = &data[written..];
            offset += written as u64;
        }
        Ok(())
    }
}
