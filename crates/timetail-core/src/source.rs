//! Random-access byte source consumed by the backward scanner.

use std::io::{self, Read, Seek, SeekFrom};

/// A sized byte source that can be read at arbitrary, decreasing offsets.
///
/// Implemented for every `Read + Seek` type, which covers `std::fs::File`
/// and `std::io::Cursor` over in-memory buffers.
pub trait ByteSource {
    /// Total size in bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn size(&mut self) -> io::Result<u64>;

    /// Fill `buf` from `offset`, returning the number of bytes read. Fewer
    /// than `buf.len()` bytes are returned only at end of file.
    ///
    /// # Errors
    ///
    /// Any I/O error is returned as-is; reads are never retried.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Read + Seek> ByteSource for T {
    fn size(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}
