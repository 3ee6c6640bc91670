//! A library for reading image streams from AFF4 forensic evidence
//! containers.
//!
//! An image stream stores its data as fixed-size chunks, individually
//! compressed and optionally encrypted, grouped into bevvies whose
//! binary index segments map each chunk to its physical byte range. This
//! crate implements the chunked read pipeline over that layout:
//!
//! - Bevvy-index addressing with the historical segment-naming variants
//! - Per-chunk decompression, with the documented tolerance for the
//!   producer defect on a stream's final chunk
//! - Per-chunk XTS decryption keyed by the global chunk index
//! - Two tiers of bounded LRU caching (bevvy indices and decoded chunks)
//! - A seekable, strictly read-only channel over the logical stream
//!
//! The outer archive container and the metadata graph are external
//! collaborators, consumed through the [`container::Container`] and
//! [`properties::Properties`] traits.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! use aff4_stream::ImageStream;
//! # use aff4_stream::container::Container;
//! # use aff4_stream::properties::Properties;
//!
//! # fn open(container: Arc<dyn Container>, metadata: &dyn Properties)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = ImageStream::open("aff4://evidence/disk", container, metadata)?;
//!
//! let mut sector = [0u8; 512];
//! stream.read_exact(&mut sector)?;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [The AFF4 evidence container](https://aff4.org)

mod bevvy;
mod cache;
mod chunk;
pub mod codec;
pub mod container;
pub mod error;
pub mod keybag;
pub mod properties;
pub mod stream;

pub use error::Error;
pub use stream::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNKS_IN_SEGMENT, ImageStream};
