//! Chunk decompression codecs.

use flate2::FlushDecompress;
use std::io;
use std::sync::Arc;

use crate::properties::lexicon;

/// Decompresses one chunk's raw bytes into its decoded form.
pub trait CompressionCodec: Send + Sync {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// The resource identifier of this codec.
    fn resource_id(&self) -> &str;
}

/// Resolves the codec for a compression-method resource identifier.
///
/// `chunk_size` bounds the decoded size of a chunk. Returns `None` for
/// identifiers this reader has no codec for.
pub fn for_resource(resource: &str, chunk_size: usize) -> Option<Arc<dyn CompressionCodec>> {
    match resource {
        lexicon::COMPRESSION_ZLIB => Some(Arc::new(ZlibCodec { chunk_size })),
        lexicon::COMPRESSION_DEFLATE => Some(Arc::new(DeflateCodec { chunk_size })),
        lexicon::COMPRESSION_STORED => Some(Arc::new(StoredCodec)),
        _ => None,
    }
}

/// RFC 1950 zlib-framed chunks.
pub struct ZlibCodec {
    chunk_size: usize,
}

impl CompressionCodec for ZlibCodec {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        inflate(data, self.chunk_size, true)
    }

    fn resource_id(&self) -> &str {
        lexicon::COMPRESSION_ZLIB
    }
}

/// RFC 1951 raw deflate chunks.
pub struct DeflateCodec {
    chunk_size: usize,
}

impl CompressionCodec for DeflateCodec {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        inflate(data, self.chunk_size, false)
    }

    fn resource_id(&self) -> &str {
        lexicon::COMPRESSION_DEFLATE
    }
}

/// Chunks stored without compression.
pub struct StoredCodec;

impl CompressionCodec for StoredCodec {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn resource_id(&self) -> &str {
        lexicon::COMPRESSION_STORED
    }
}

/// Inflates one chunk into a buffer of at most `capacity` bytes.
fn inflate(data: &[u8], capacity: usize, zlib_header: bool) -> io::Result<Vec<u8>> {
    let mut out = vec![0u8; capacity];
    let mut inflater = flate2::Decompress::new(zlib_header);

    let status = inflater
        .decompress(data, &mut out, FlushDecompress::Finish)
        .map_err(io::Error::other)?;

    if status != flate2::Status::StreamEnd {
        return Err(io::Error::other("truncated compressed chunk"));
    }

    out.truncate(inflater.total_out() as usize);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn zlib_round_trip() {
        let chunk = vec![0x5au8; 4096];

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&chunk).unwrap();
        let compressed = encoder.finish().unwrap();
        assert!(compressed.len() < chunk.len());

        let codec = for_resource(lexicon::COMPRESSION_ZLIB, chunk.len()).unwrap();
        assert_eq!(codec.decompress(&compressed).unwrap(), chunk);
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = for_resource(lexicon::COMPRESSION_ZLIB, 4096).unwrap();
        assert!(codec.decompress(&[0xff, 0x00, 0x12, 0x34]).is_err());
    }

    #[test]
    fn stored_codec_passes_through() {
        let codec = for_resource(lexicon::COMPRESSION_STORED, 64).unwrap();
        assert_eq!(codec.decompress(&[1, 2, 3]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unknown_resource_has_no_codec() {
        assert!(for_resource("http://example.com/mystery", 64).is_none());
    }
}
