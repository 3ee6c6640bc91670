//! Key bags: wrapped copies of a volume encryption key.
//!
//! A key bag carries an encrypted (wrapped) copy of the volume encryption
//! key together with the metadata needed to unwrap it. Two variants exist
//! in the wild: password-protected bags unwrapped via PBKDF2 and AES key
//! wrap, and certificate-protected bags unwrapped with an RSA private key.

use aes_kw::{KekAes128, KekAes192, KekAes256};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::Hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use sha2::Sha256;
use snafu::{ResultExt, Snafu, ensure};
use zeroize::Zeroize;

/// Default initial value for AES key wrap, per RFC 3394.
pub const KEY_WRAP_IV: [u8; 8] = [0xA6; 8];

/// Bytes of key-wrap framing added to the wrapped key material.
const KEY_WRAP_OVERHEAD: usize = 8;

/// Errors when wrapping or unwrapping a key bag.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum KeyBagError {
    #[snafu(display("cannot derive a wrapping key of {len} bytes"))]
    DeriveFailed { len: usize },

    #[snafu(display("wrapped key blob is {len} bytes; expected a multiple of 8 of at least 24"))]
    MalformedWrappedKey { len: usize },

    #[snafu(display("key material is {len} bytes; expected a non-empty multiple of 8"))]
    MalformedKeyMaterial { len: usize },

    #[snafu(display("{len} bytes is not a valid AES key-wrapping key length"))]
    InvalidKekLength { len: usize },

    #[snafu(display("AES key unwrap failed (wrong secret or corrupt blob)"))]
    UnwrapFailed,

    #[snafu(display("AES key wrap failed"))]
    WrapFailed,

    #[snafu(display("cannot decode private key material"))]
    DecodePrivateKey { source: base64::DecodeError },

    #[snafu(display("cannot parse PKCS#8 private key"))]
    ParsePrivateKey { source: rsa::pkcs8::Error },

    #[snafu(display("RSA unwrap failed"))]
    RsaUnwrapFailed { source: rsa::Error },

    #[snafu(display("volume key is {len} bytes; cannot split into equal halves"))]
    OddKeyLength { len: usize },

    #[snafu(display("certificate-based key wrapping is not implemented"))]
    WrapUnsupported,
}

/// Raw volume-encryption-key material, recovered by unwrapping a key bag.
///
/// The two halves are used as the XTS cipher key and tweak key. The
/// material is wiped when the value is dropped.
pub struct Vek {
    bytes: Vec<u8>,
}

impl Vek {
    /// Wraps recovered key material, rejecting material that cannot be
    /// split into two equal halves.
    pub fn new(bytes: Vec<u8>) -> Result<Self, KeyBagError> {
        ensure!(
            !bytes.is_empty() && bytes.len() % 2 == 0,
            OddKeyLengthSnafu { len: bytes.len() }
        );
        Ok(Self { bytes })
    }

    /// Returns the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the length of the key material in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Splits the material into the cipher key and tweak key halves.
    #[must_use]
    pub fn split(&self) -> (&[u8], &[u8]) {
        self.bytes.split_at(self.bytes.len() / 2)
    }
}

impl Drop for Vek {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Vek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vek")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A key bag, tagged by its wrapping scheme.
#[derive(Debug, Clone)]
pub enum KeyBag {
    Password(PasswordKeyBag),
    Certificate(CertificateKeyBag),
}

impl KeyBag {
    /// Unwraps the volume key using the caller-supplied secret: the
    /// password for a password bag, base64 PKCS#8 private key material
    /// for a certificate bag.
    pub fn unwrap(&self, secret: &str) -> Result<Vek, KeyBagError> {
        match self {
            Self::Password(bag) => bag.unwrap(secret),
            Self::Certificate(bag) => bag.unwrap(secret),
        }
    }

    /// Wraps a volume key under the secret, replacing the stored blob.
    pub fn wrap(&mut self, secret: &str, vek: Option<&[u8]>) -> Result<Vec<u8>, KeyBagError> {
        match self {
            Self::Password(bag) => bag.wrap(secret, vek),
            Self::Certificate(bag) => bag.wrap(secret, vek),
        }
    }

    /// Returns the key size recorded by the bag, in bytes.
    #[must_use]
    pub fn key_size_bytes(&self) -> usize {
        match self {
            Self::Password(bag) => bag.key_size_bytes(),
            Self::Certificate(bag) => bag.key_size_bytes(),
        }
    }
}

/// A password-protected key bag.
///
/// The wrapping key is derived from the password with
/// PBKDF2-HMAC-SHA-256 and the volume key is wrapped with AES key wrap
/// (RFC 3394) under the default initial value.
#[derive(Debug, Clone)]
pub struct PasswordKeyBag {
    salt: Vec<u8>,
    iterations: u32,
    key_size_bytes: usize,
    wrapped_key: Vec<u8>,
}

impl PasswordKeyBag {
    pub fn new(salt: Vec<u8>, iterations: u32, key_size_bytes: usize, wrapped_key: Vec<u8>) -> Self {
        Self {
            salt,
            iterations,
            key_size_bytes,
            wrapped_key,
        }
    }

    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub fn key_size_bytes(&self) -> usize {
        self.key_size_bytes
    }

    #[must_use]
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    /// Unwraps the volume key with the given password.
    pub fn unwrap(&self, password: &str) -> Result<Vek, KeyBagError> {
        let kek = self.derive_kek(password)?;
        Vek::new(unwrap_key(&kek, &self.wrapped_key)?)
    }

    /// Wraps a volume key under the password, storing and returning the
    /// new blob. Generates a fresh random volume key of the recorded key
    /// size when none is supplied.
    pub fn wrap(&mut self, password: &str, vek: Option<&[u8]>) -> Result<Vec<u8>, KeyBagError> {
        let mut material = match vek {
            Some(bytes) => bytes.to_vec(),
            None => {
                let mut fresh = vec![0u8; self.key_size_bytes];
                OsRng.fill_bytes(&mut fresh);
                fresh
            }
        };

        let kek = self.derive_kek(password)?;
        let wrapped = wrap_key(&kek, &material);
        material.zeroize();

        self.wrapped_key = wrapped?;
        Ok(self.wrapped_key.clone())
    }

    /// Derives the key-wrapping key from the password.
    fn derive_kek(&self, password: &str) -> Result<Vec<u8>, KeyBagError> {
        let mut kek = vec![0u8; self.key_size_bytes];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(
            password.as_bytes(),
            &self.salt,
            self.iterations,
            &mut kek,
        )
        .map_err(|_| KeyBagError::DeriveFailed {
            len: self.key_size_bytes,
        })?;
        Ok(kek)
    }
}

/// A certificate-protected key bag.
///
/// The volume key is wrapped to the certificate holder with RSA-OAEP
/// (SHA-1 with MGF1). Only unwrapping is supported.
#[derive(Debug, Clone)]
pub struct CertificateKeyBag {
    subject_name: String,
    serial_number: String,
    key_size_bytes: usize,
    wrapped_key: Vec<u8>,
}

impl CertificateKeyBag {
    pub fn new(
        subject_name: String,
        serial_number: String,
        key_size_bytes: usize,
        wrapped_key: Vec<u8>,
    ) -> Self {
        Self {
            subject_name,
            serial_number,
            key_size_bytes,
            wrapped_key,
        }
    }

    #[must_use]
    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    #[must_use]
    pub fn key_size_bytes(&self) -> usize {
        self.key_size_bytes
    }

    #[must_use]
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    /// Unwraps the volume key with base64-encoded PKCS#8 private key
    /// material belonging to the bag's certificate.
    pub fn unwrap(&self, private_key: &str) -> Result<Vek, KeyBagError> {
        let der = BASE64
            .decode(private_key.trim())
            .context(DecodePrivateKeySnafu)?;
        let key = RsaPrivateKey::from_pkcs8_der(&der).context(ParsePrivateKeySnafu)?;

        let vek = key
            .decrypt(Oaep::new::<Sha1>(), &self.wrapped_key)
            .context(RsaUnwrapFailedSnafu)?;

        Vek::new(vek)
    }

    /// Certificate-based wrapping is not supported.
    pub fn wrap(&mut self, _public_key: &str, _vek: Option<&[u8]>) -> Result<Vec<u8>, KeyBagError> {
        WrapUnsupportedSnafu.fail()
    }
}

/// Unwraps `wrapped` under `kek` with AES key wrap and the default IV.
fn unwrap_key(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, KeyBagError> {
    ensure!(
        wrapped.len() % 8 == 0 && wrapped.len() >= 3 * 8,
        MalformedWrappedKeySnafu { len: wrapped.len() }
    );

    let mut out = vec![0u8; wrapped.len() - KEY_WRAP_OVERHEAD];

    let result = match kek.len() {
        16 => KekAes128::from(to_array::<16>(kek)).unwrap(wrapped, &mut out),
        24 => KekAes192::from(to_array::<24>(kek)).unwrap(wrapped, &mut out),
        32 => KekAes256::from(to_array::<32>(kek)).unwrap(wrapped, &mut out),
        len => return InvalidKekLengthSnafu { len }.fail(),
    };

    result.map_err(|_| KeyBagError::UnwrapFailed)?;
    Ok(out)
}

/// Wraps `material` under `kek` with AES key wrap and the default IV.
fn wrap_key(kek: &[u8], material: &[u8]) -> Result<Vec<u8>, KeyBagError> {
    ensure!(
        material.len() % 8 == 0 && !material.is_empty(),
        MalformedKeyMaterialSnafu {
            len: material.len(),
        }
    );

    let mut out = vec![0u8; material.len() + KEY_WRAP_OVERHEAD];

    let result = match kek.len() {
        16 => KekAes128::from(to_array::<16>(kek)).wrap(material, &mut out),
        24 => KekAes192::from(to_array::<24>(kek)).wrap(material, &mut out),
        32 => KekAes256::from(to_array::<32>(kek)).wrap(material, &mut out),
        len => return InvalidKekLengthSnafu { len }.fail(),
    };

    result.map_err(|_| KeyBagError::WrapFailed)?;
    Ok(out)
}

/// Callers check the length before converting.
fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    bytes.try_into().unwrap()
}
