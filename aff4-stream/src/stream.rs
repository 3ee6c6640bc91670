//! The seekable read channel over a stream's decoded chunks.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use aff4_crypto::Decryptor;
use snafu::{OptionExt, ResultExt, ensure};

use crate::cache::Cache;
use crate::chunk::ChunkLoader;
use crate::codec;
use crate::container::Container;
use crate::error::{
    BuildDecryptorSnafu, ClosedSnafu, Error, InvalidGeometrySnafu, NoKeyBagSnafu, ReadOnlySnafu,
    Result, TruncatedChunkSnafu, UnknownCodecSnafu, UnwrapKeySnafu,
};
use crate::keybag;
use crate::properties::{HashEntry, Properties, lexicon};

/// Chunk size used when the metadata does not record one.
pub const DEFAULT_CHUNK_SIZE: u32 = 32 * 1024;

/// Chunks per bevvy used when the metadata does not record one.
pub const DEFAULT_CHUNKS_IN_SEGMENT: u32 = 1024;

/// Bytes of decoded chunk data kept in memory per stream.
const CHUNK_CACHE_BYTES: u64 = 8 * 1024 * 1024;

/// A read-only, seekable channel over one image stream of a container.
///
/// Reads go through a bounded chunk cache keyed by chunk-aligned stream
/// offset, which in turn goes through a bounded bevvy-index cache, so
/// random access over a working set stays cheap.
///
/// A stream is immutable for its lifetime. Reading and seeking take
/// `&mut self`, which serializes operations on one stream; independent
/// streams may be driven concurrently from different threads.
#[must_use]
pub struct ImageStream {
    resource: String,
    container: Arc<dyn Container>,
    size: u64,
    chunk_size: u32,
    chunks_in_segment: u32,
    hashes: Vec<HashEntry>,
    compression_method: String,
    position: u64,
    closed: bool,
    chunk_cache: Cache<u64, Arc<Vec<u8>>>,
    loader: ChunkLoader,
}

impl std::fmt::Debug for ImageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStream")
            .field("resource", &self.resource)
            .field("size", &self.size)
            .field("chunk_size", &self.chunk_size)
            .field("chunks_in_segment", &self.chunks_in_segment)
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ImageStream {
    /// Opens an unencrypted image stream.
    ///
    /// Reads the stream's geometry and compression method from the
    /// metadata graph, falling back to the format-defined defaults.
    pub fn open(
        resource: &str,
        container: Arc<dyn Container>,
        properties: &dyn Properties,
    ) -> Result<Self> {
        Self::build(resource, container, properties, None)
    }

    /// Opens an encrypted image stream.
    ///
    /// Resolves the stream's key bag, unwraps the volume key with the
    /// caller-supplied secret and binds a decryptor. Any unwrap failure
    /// aborts construction; no partially-initialized stream is returned.
    pub fn open_encrypted(
        resource: &str,
        container: Arc<dyn Container>,
        properties: &dyn Properties,
        secret: &str,
    ) -> Result<Self> {
        let bag_resource = properties
            .resource(resource, lexicon::KEY_BAG)
            .context(NoKeyBagSnafu { resource })?;

        let bag = keybag::resolve(&bag_resource, properties)?;
        let vek = bag.unwrap(secret).context(UnwrapKeySnafu {
            resource: bag_resource,
        })?;
        let decryptor = Decryptor::new(&vek).context(BuildDecryptorSnafu)?;

        Self::build(resource, container, properties, Some(decryptor))
    }

    fn build(
        resource: &str,
        container: Arc<dyn Container>,
        properties: &dyn Properties,
        decryptor: Option<Decryptor>,
    ) -> Result<Self> {
        let size = properties
            .long(resource, lexicon::SIZE)
            .unwrap_or(0)
            .max(0) as u64;

        let chunk_size = properties
            .int(resource, lexicon::CHUNK_SIZE)
            .unwrap_or(DEFAULT_CHUNK_SIZE as i32);
        ensure!(
            chunk_size > 0,
            InvalidGeometrySnafu {
                resource,
                property: "chunkSize",
                value: chunk_size,
            }
        );
        let chunk_size = chunk_size as u32;

        let chunks_in_segment = properties
            .int(resource, lexicon::CHUNKS_IN_SEGMENT)
            .unwrap_or(DEFAULT_CHUNKS_IN_SEGMENT as i32);
        ensure!(
            chunks_in_segment > 0,
            InvalidGeometrySnafu {
                resource,
                property: "chunksInSegment",
                value: chunks_in_segment,
            }
        );
        let chunks_in_segment = chunks_in_segment as u32;

        let compression_method = properties
            .resource(resource, lexicon::COMPRESSION_METHOD)
            .unwrap_or_else(|| lexicon::COMPRESSION_STORED.to_string());
        let codec = codec::for_resource(&compression_method, chunk_size as usize).context(
            UnknownCodecSnafu {
                resource: compression_method.clone(),
            },
        )?;

        let hashes = properties.hashes(resource);

        let loader = ChunkLoader::new(
            container.clone(),
            resource.to_string(),
            chunk_size,
            chunks_in_segment,
            size,
            codec,
            decryptor,
        );

        let chunk_capacity = (CHUNK_CACHE_BYTES / u64::from(chunk_size)).max(1) as usize;

        Ok(Self {
            resource: resource.to_string(),
            container,
            size,
            chunk_size,
            chunks_in_segment,
            hashes,
            compression_method,
            position: 0,
            closed: false,
            chunk_cache: Cache::new(chunk_capacity),
            loader,
        })
    }

    /// Reads from the current position into `dst`, returning the number
    /// of bytes copied.
    ///
    /// Returns `Ok(0)` when `dst` is empty or the position is at or past
    /// the end of the stream. Copying stops at the end of the containing
    /// chunk or the logical stream size, whichever comes first; trailing
    /// padding in the final chunk is never exposed.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        ensure!(!self.closed, ClosedSnafu);

        if dst.is_empty() || self.position >= self.size {
            return Ok(0);
        }

        let chunk_offset = self.position - self.position % u64::from(self.chunk_size);
        let loader = &self.loader;
        let chunk = self
            .chunk_cache
            .get_or_load(chunk_offset, || loader.load(chunk_offset))?;

        let delta = (self.position - chunk_offset) as usize;
        ensure!(
            chunk.len() > delta,
            TruncatedChunkSnafu {
                offset: chunk_offset,
            }
        );

        let logical = usize::try_from(self.size - self.position).unwrap_or(usize::MAX);
        let count = dst.len().min(chunk.len() - delta).min(logical);

        dst[..count].copy_from_slice(&chunk[delta..delta + count]);
        self.position += count as u64;

        Ok(count)
    }

    /// Returns the current position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves the position.
    ///
    /// A position at or past the end of the stream clamps to the last
    /// readable byte (and to zero for an empty stream).
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        ensure!(!self.closed, ClosedSnafu);

        self.position = if self.size == 0 {
            0
        } else {
            position.min(self.size - 1)
        };

        Ok(())
    }

    /// Returns the logical size of the stream in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the size of one decoded chunk in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Returns the number of chunks grouped into one bevvy.
    #[must_use]
    pub fn chunks_in_segment(&self) -> u32 {
        self.chunks_in_segment
    }

    /// Returns the hashes recorded against the stream.
    #[must_use]
    pub fn hashes(&self) -> &[HashEntry] {
        &self.hashes
    }

    /// Returns the stream's compression-method resource identifier.
    #[must_use]
    pub fn compression_method(&self) -> &str {
        &self.compression_method
    }

    /// Returns the stream's resource identifier.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns `true` until the stream is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Streams are read-only; truncation always fails.
    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        ReadOnlySnafu.fail()
    }

    /// Closes the stream, releasing it from its container and dropping
    /// both caches. Closing twice is a no-op.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.container.release(&self.resource);
            self.chunk_cache.clear();
            self.loader.clear();
        }
    }
}

impl Drop for ImageStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Read for ImageStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ImageStream::read(self, buf).map_err(Into::into)
    }
}

impl Seek for ImageStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.size as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if target < 0 {
            return Err(Error::NegativePosition.into());
        }

        self.set_position(target as u64)?;
        Ok(self.position)
    }
}

impl Write for ImageStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(Error::ReadOnly.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
