//! Cryptographic primitives for reading encrypted AFF4 forensic images.
//!
//! This crate provides the pieces an evidence-container reader needs to
//! recover and use a volume encryption key:
//!
//! - An XTS engine over AES for fixed 512-byte data units
//! - Password- and certificate-protected key bags and their unwrapping
//! - A chunk [`Decryptor`] binding a recovered key to the engine
//!
//! It performs no I/O and knows nothing about containers; the stream
//! reading layer lives in the `aff4-stream` crate.
//!
//! # Example
//!
//! ```
//! use aff4_crypto::{Decryptor, PasswordKeyBag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bag = PasswordKeyBag::new(b"salt".to_vec(), 1000, 32, Vec::new());
//! bag.wrap("password", None)?;
//!
//! let vek = bag.unwrap("password")?;
//! let decryptor = Decryptor::new(&vek)?;
//! # let _ = decryptor;
//! # Ok(())
//! # }
//! ```

pub mod decryptor;
pub mod keybag;
pub mod xts;

pub use decryptor::{DecryptError, Decryptor};
pub use keybag::{CertificateKeyBag, KeyBag, KeyBagError, PasswordKeyBag, Vek};
pub use xts::{CipherError, DATA_UNIT_SIZE, Direction, Xts, XtsCipher};
