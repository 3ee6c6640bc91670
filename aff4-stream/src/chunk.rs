//! Chunk loading: bevvy resolution, raw reads, decompression, decryption.

use std::io;
use std::sync::Arc;

use aff4_crypto::Decryptor;
use snafu::{OptionExt, ResultExt};
use tracing::error;

use crate::bevvy::{BevvyIndex, BevvyPoint};
use crate::cache::Cache;
use crate::codec::CompressionCodec;
use crate::container::{ArchiveMethod, Container};
use crate::error::{ChunkReadSnafu, DecryptSnafu, Error, MissingPointSnafu, Result};

/// The maximum number of bevvy indices kept in memory per stream.
pub(crate) const BEVVY_CACHE_SIZE: usize = 10;

/// Loads and decodes chunks for one stream.
///
/// Holds the stream's immutable read state (geometry, codec, optional
/// decryptor) plus the bevvy-index cache. Loading is a pure function of
/// the chunk-aligned offset, which is what makes cache population safe
/// without single-flight de-duplication.
pub(crate) struct ChunkLoader {
    container: Arc<dyn Container>,
    resource: String,
    bevvy_cache: Cache<u64, Arc<BevvyIndex>>,
    chunk_size: u32,
    chunks_in_segment: u32,
    total_size: u64,
    codec: Arc<dyn CompressionCodec>,
    decryptor: Option<Decryptor>,
}

impl ChunkLoader {
    pub fn new(
        container: Arc<dyn Container>,
        resource: String,
        chunk_size: u32,
        chunks_in_segment: u32,
        total_size: u64,
        codec: Arc<dyn CompressionCodec>,
        decryptor: Option<Decryptor>,
    ) -> Self {
        Self {
            container,
            resource,
            bevvy_cache: Cache::new(BEVVY_CACHE_SIZE),
            chunk_size,
            chunks_in_segment,
            total_size,
            codec,
            decryptor,
        }
    }

    /// Loads the decoded chunk at the given chunk-aligned stream offset.
    ///
    /// Any failure is logged and surfaced as an error; a chunk is never
    /// silently replaced by empty data.
    pub fn load(&self, offset: u64) -> Result<Arc<Vec<u8>>> {
        self.load_inner(offset).inspect_err(|err| {
            error!("cannot load chunk at offset {offset} of {}: {err}", self.resource);
        })
    }

    fn load_inner(&self, offset: u64) -> Result<Arc<Vec<u8>>> {
        let chunk_index = offset / u64::from(self.chunk_size);
        let bevvy_id = chunk_index / u64::from(self.chunks_in_segment);
        let chunk_in_bevvy = chunk_index % u64::from(self.chunks_in_segment);

        let index = self.bevvy_cache.get_or_load(bevvy_id, || {
            BevvyIndex::load(&self.resource, bevvy_id, self.container.as_ref()).map(Arc::new)
        })?;

        let point = index.point(chunk_in_bevvy).context(MissingPointSnafu {
            bevvy: bevvy_id,
            chunk: chunk_in_bevvy,
        })?;

        let raw = self
            .read_raw(&index, point)
            .context(ChunkReadSnafu { offset })?;

        let chunk = if u64::from(point.length) == u64::from(self.chunk_size) {
            raw
        } else {
            match self.codec.decompress(&raw) {
                Ok(decoded) => decoded,
                // Some producers mark the final chunk compressed while
                // storing it verbatim. Tolerated only when the chunk ends
                // exactly at the stream's total size.
                Err(_) if offset + u64::from(point.length) == self.total_size => raw,
                Err(source) => return Err(Error::Decompress { offset, source }),
            }
        };

        let chunk = match &self.decryptor {
            Some(decryptor) => {
                let data_unit_number =
                    bevvy_id * u64::from(self.chunks_in_segment) + chunk_in_bevvy;
                decryptor
                    .decrypt(&chunk, data_unit_number)
                    .context(DecryptSnafu { offset })?
            }
            None => chunk,
        };

        Ok(Arc::new(chunk))
    }

    /// Reads a chunk's raw bytes from the physical source.
    ///
    /// A stored data segment is read straight from the shared channel at
    /// the entry's data range; a deflated segment only exposes the final
    /// payload through its decoded sub-stream.
    fn read_raw(&self, index: &BevvyIndex, point: BevvyPoint) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; point.length as usize];
        let entry = index.entry();

        if entry.method == ArchiveMethod::Stored {
            self.container
                .source()
                .read_exact_at(entry.data_offset + point.offset, &mut buf)?;
        } else {
            let stream = self.container.segment(&entry.name)?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("missing segment {}", entry.name),
                )
            })?;
            stream.read_exact_at(point.offset, &mut buf)?;
        }

        Ok(buf)
    }

    /// Drops every cached bevvy index.
    pub fn clear(&self) {
        self.bevvy_cache.clear();
    }
}
