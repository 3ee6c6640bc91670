//! Typed access to the container's metadata graph.
//!
//! The metadata store itself is an external collaborator; this crate
//! only performs typed lookups of the properties it consumes.

/// Lexicon identifiers for the properties the reading pipeline consumes.
pub mod lexicon {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    pub const SIZE: &str = "http://aff4.org/Schema#size";
    pub const HASH: &str = "http://aff4.org/Schema#hash";
    pub const CHUNK_SIZE: &str = "http://aff4.org/Schema#chunkSize";
    pub const CHUNKS_IN_SEGMENT: &str = "http://aff4.org/Schema#chunksInSegment";
    pub const COMPRESSION_METHOD: &str = "http://aff4.org/Schema#compressionMethod";
    pub const KEY_BAG: &str = "http://aff4.org/Schema#keyBag";

    pub const SALT: &str = "http://aff4.org/Schema#salt";
    pub const ITERATIONS: &str = "http://aff4.org/Schema#iterations";
    pub const KEY_SIZE_IN_BYTES: &str = "http://aff4.org/Schema#keySizeInBytes";
    pub const WRAPPED_KEY: &str = "http://aff4.org/Schema#wrappedKey";
    pub const X509_SUBJECT_NAME: &str = "http://aff4.org/Schema#x509SubjectName";
    pub const SERIAL_NUMBER: &str = "http://aff4.org/Schema#serialNumber";

    pub const PASSWORD_WRAPPED_KEY_BAG: &str = "http://aff4.org/Schema#passwordWrappedKeyBag";
    pub const CERT_WRAPPED_KEY_BAG: &str = "http://aff4.org/Schema#certEncryptedKeyBag";

    pub const COMPRESSION_ZLIB: &str = "https://www.ietf.org/rfc/rfc1950.txt";
    pub const COMPRESSION_DEFLATE: &str = "https://tools.ietf.org/html/rfc1951";
    pub const COMPRESSION_STORED: &str = "http://aff4.org/Schema#NullCompressor";
}

/// One hash recorded against a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    /// The hash algorithm's identifier (e.g. `SHA1`, `MD5`).
    pub algorithm: String,
    /// The hex-encoded digest.
    pub value: String,
}

/// Typed key/value lookups against the metadata graph.
///
/// All lookups are by subject resource and predicate identifier; absent
/// or differently-typed values read as `None`.
pub trait Properties: Send + Sync {
    /// Reads a string property.
    fn string(&self, subject: &str, predicate: &str) -> Option<String>;

    /// Reads a 32-bit integer property.
    fn int(&self, subject: &str, predicate: &str) -> Option<i32>;

    /// Reads a 64-bit integer property.
    fn long(&self, subject: &str, predicate: &str) -> Option<i64>;

    /// Reads a property whose object is another resource, returning its
    /// identifier.
    fn resource(&self, subject: &str, predicate: &str) -> Option<String>;

    /// Returns all hashes recorded against `subject`.
    fn hashes(&self, subject: &str) -> Vec<HashEntry>;
}
