//! Bevvy index parsing and segment resolution.
//!
//! A bevvy groups a fixed number of consecutive chunks; its index segment
//! records where each chunk's raw bytes live inside the bevvy's data
//! range.

use snafu::{OptionExt, ResultExt};
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::container::{Container, SegmentEntry, read_all};
use crate::error::{IoSnafu, MissingSegmentSnafu, Result};

/// One record of the on-disk bevvy index (12 bytes, little-endian).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct BevvyPointRaw {
    offset: U64,
    length: U32,
}

/// The physical location of one chunk's raw bytes inside its bevvy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BevvyPoint {
    /// Byte offset within the bevvy's data range.
    pub offset: u64,
    /// Length of the raw (possibly compressed) bytes.
    pub length: u32,
}

/// A parsed bevvy index together with its data segment's archive entry.
#[derive(Debug)]
pub(crate) struct BevvyIndex {
    entry: SegmentEntry,
    points: Vec<BevvyPoint>,
}

impl BevvyIndex {
    /// Loads the index for `bevvy_id` of `resource`.
    ///
    /// Segment naming changed across container format versions, so both
    /// the data segment and the index segment are resolved by trying the
    /// container's sanitized name first and the raw resource name second.
    pub fn load(resource: &str, bevvy_id: u64, container: &dyn Container) -> Result<Self> {
        let data_name = format!("{resource}/{bevvy_id:08}");
        let entry = container
            .entry(&container.sanitize(&data_name))
            .or_else(|| container.entry(&data_name))
            .context(MissingSegmentSnafu { name: data_name })?;

        let index_name = format!("{resource}/{bevvy_id:08}.index");
        let stream = match container
            .segment(&container.sanitize(&index_name))
            .context(IoSnafu)?
        {
            Some(stream) => stream,
            None => container
                .segment(&index_name)
                .context(IoSnafu)?
                .context(MissingSegmentSnafu { name: index_name })?,
        };

        let raw = read_all(stream.as_ref()).context(IoSnafu)?;

        let mut points = Vec::with_capacity(raw.len() / size_of::<BevvyPointRaw>());
        let mut rest = raw.as_slice();

        // A trailing partial record is ignored.
        while let Ok((point, tail)) = BevvyPointRaw::read_from_prefix(rest) {
            points.push(BevvyPoint {
                offset: point.offset.get(),
                length: point.length.get(),
            });
            rest = tail;
        }

        Ok(Self { entry, points })
    }

    /// Returns the archive entry of the bevvy's data segment.
    pub fn entry(&self) -> &SegmentEntry {
        &self.entry
    }

    /// Returns the point for a chunk offset within this bevvy, or `None`
    /// if the index has no such entry.
    pub fn point(&self, offset: u64) -> Option<BevvyPoint> {
        self.points.get(usize::try_from(offset).ok()?).copied()
    }
}
