//! The error taxonomy shared by the stream reading pipeline.

use snafu::Snafu;
use std::io;

/// Errors surfaced by stream opening, reading and seeking.
///
/// Chunk loads fail loudly: a chunk that cannot be produced is always an
/// error, never empty data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("stream is closed"))]
    Closed,

    #[snafu(display("cannot seek to a negative position"))]
    NegativePosition,

    #[snafu(display("image streams are read-only"))]
    ReadOnly,

    #[snafu(display("stream {resource} declares {property} = {value}"))]
    InvalidGeometry {
        resource: String,
        property: &'static str,
        value: i32,
    },

    #[snafu(display("stream {resource} references no key bag"))]
    NoKeyBag { resource: String },

    #[snafu(display("key bag {resource} has no recognized type"))]
    UnknownKeyBagType { resource: String },

    #[snafu(display("key bag {resource} is missing property {property}"))]
    MissingKeyBagProperty {
        resource: String,
        property: &'static str,
    },

    #[snafu(display("cannot decode property {property} of {resource}"))]
    DecodeProperty {
        resource: String,
        property: &'static str,
        source: hex::FromHexError,
    },

    #[snafu(display("cannot unwrap the volume key from key bag {resource}"))]
    UnwrapKey {
        resource: String,
        source: aff4_crypto::KeyBagError,
    },

    #[snafu(display("cannot build a decryptor from the volume key"))]
    BuildDecryptor { source: aff4_crypto::CipherError },

    #[snafu(display("no compression codec for {resource}"))]
    UnknownCodec { resource: String },

    #[snafu(display("missing segment {name}"))]
    MissingSegment { name: String },

    #[snafu(display("bevvy {bevvy} has no index entry for chunk {chunk}"))]
    MissingPoint { bevvy: u64, chunk: u64 },

    #[snafu(display("cannot read raw chunk at offset {offset}"))]
    ChunkRead { offset: u64, source: io::Error },

    #[snafu(display("chunk at offset {offset} is shorter than the stream requires"))]
    TruncatedChunk { offset: u64 },

    #[snafu(display("cannot decompress chunk at offset {offset}"))]
    Decompress { offset: u64, source: io::Error },

    #[snafu(display("cannot decrypt chunk at offset {offset}"))]
    Decrypt {
        offset: u64,
        source: aff4_crypto::DecryptError,
    },

    #[snafu(display("i/o failed"))]
    Io { source: io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Closed => io::ErrorKind::NotConnected,
            Error::NegativePosition => io::ErrorKind::InvalidInput,
            Error::ReadOnly => io::ErrorKind::Unsupported,
            Error::NoKeyBag { .. }
            | Error::UnknownKeyBagType { .. }
            | Error::MissingKeyBagProperty { .. }
            | Error::UnknownCodec { .. }
            | Error::MissingSegment { .. }
            | Error::MissingPoint { .. } => io::ErrorKind::NotFound,
            Error::DecodeProperty { .. } | Error::TruncatedChunk { .. } => {
                io::ErrorKind::InvalidData
            }
            _ => io::ErrorKind::Other,
        };

        io::Error::new(kind, err)
    }
}
