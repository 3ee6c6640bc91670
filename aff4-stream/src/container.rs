//! Interfaces onto the outer archive container.
//!
//! The container itself (entry bookkeeping, name sanitization, archive
//! parsing) lives outside this crate; the reading pipeline consumes it
//! through these traits.

use std::io;

/// Positional read access to raw bytes.
///
/// Each call carries its own offset, so readers share a source without
/// sharing a cursor and without synchronizing seek/read pairs.
pub trait Source: Send + Sync {
    /// Reads bytes at the given offset into `buf`.
    ///
    /// Returns the number of bytes actually read. A short read indicates
    /// the end of the source was reached.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Reads exactly `buf.len()` bytes at `offset`, retrying short reads.
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the source ends before
    /// the buffer is filled.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut total = 0;

        while total < buf.len() {
            let n = self.read_at(offset + total as u64, &mut buf[total..])?;

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected end of source",
                ));
            }

            total += n;
        }

        Ok(())
    }

    /// Returns the total length of the source in bytes.
    fn len(&self) -> u64;

    /// Returns `true` if the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads a whole source into memory.
pub fn read_all(source: &dyn Source) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; source.len() as usize];
    source.read_exact_at(0, &mut buf)?;
    Ok(buf)
}

/// How a segment's bytes are stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMethod {
    /// Stored verbatim; the entry's data range holds the final payload.
    Stored,
    /// Deflated as a whole; the payload is only reachable through a
    /// decoded sub-stream.
    Deflated,
}

/// An entry of the outer archive.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// The entry's name inside the archive.
    pub name: String,
    /// Offset of the entry's stored data in the container's raw channel.
    pub data_offset: u64,
    /// Length of the stored (possibly deflated) data.
    pub stored_len: u64,
    /// How the entry's data is stored.
    pub method: ArchiveMethod,
}

/// The outer archive container, consumed at its interface.
///
/// Streams hold the container handle only to read segments and to signal
/// release on close; the container owns stream lifecycle.
pub trait Container: Send + Sync {
    /// Looks up the archive entry for a named segment.
    fn entry(&self, name: &str) -> Option<SegmentEntry>;

    /// Opens a named segment as a decoded sub-stream, or `None` if the
    /// archive has no such segment.
    fn segment(&self, name: &str) -> io::Result<Option<Box<dyn Source>>>;

    /// Returns the container's shared raw channel.
    fn source(&self) -> &dyn Source;

    /// Applies the container's resource-name sanitization.
    ///
    /// Naming changed across container format versions; readers try the
    /// sanitized form first and fall back to the raw resource name.
    fn sanitize(&self, resource: &str) -> String;

    /// Notifies the container that a stream opened from it was closed.
    fn release(&self, resource: &str);
}
