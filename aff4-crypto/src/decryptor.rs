//! Chunk decryption bound to a recovered volume key.

use snafu::{Snafu, ensure};

use crate::keybag::Vek;
use crate::xts::{CipherError, Direction, XtsCipher};

/// Errors when decrypting a chunk.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecryptError {
    #[snafu(display("buffer is {len} bytes; XTS data units are {expected} bytes"))]
    WrongDataUnitSize { len: usize, expected: usize },

    #[snafu(transparent)]
    Cipher { source: CipherError },
}

/// Decrypts chunks of an encrypted stream.
///
/// Built once from the recovered volume key, whose halves become the XTS
/// cipher key and tweak key. Immutable after construction and freely
/// shared between readers.
#[derive(Debug)]
pub struct Decryptor {
    cipher: XtsCipher,
}

impl Decryptor {
    /// Builds a decryptor from a recovered volume key.
    pub fn new(vek: &Vek) -> Result<Self, CipherError> {
        let (key, tweak_key) = vek.split();

        Ok(Self {
            cipher: XtsCipher::new(key, tweak_key, Direction::Decrypt)?,
        })
    }

    /// Decrypts one chunk, addressed by its global chunk index.
    ///
    /// The chunk index is the XTS data unit number; passing any other
    /// value produces garbage plaintext without any error, so callers
    /// must derive it from the chunk's position in the stream.
    pub fn decrypt(&self, input: &[u8], chunk_index: u64) -> Result<Vec<u8>, DecryptError> {
        ensure!(
            input.len() == self.cipher.data_unit_size(),
            WrongDataUnitSizeSnafu {
                len: input.len(),
                expected: self.cipher.data_unit_size(),
            }
        );

        let mut output = vec![0u8; input.len()];
        self.cipher
            .process_data_unit(input, &mut output, chunk_index)?;

        Ok(output)
    }

    /// Returns the required chunk buffer size.
    #[must_use]
    pub const fn data_unit_size(&self) -> usize {
        self.cipher.data_unit_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xts::DATA_UNIT_SIZE;

    fn test_vek() -> Vek {
        Vek::new((0u8..64).collect()).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let decryptor = Decryptor::new(&test_vek()).unwrap();

        let err = decryptor.decrypt(&[0u8; 100], 0).unwrap_err();
        assert!(matches!(
            err,
            DecryptError::WrongDataUnitSize {
                len: 100,
                expected: DATA_UNIT_SIZE,
            }
        ));
    }

    #[test]
    fn recovers_encrypted_data_unit() {
        let vek = test_vek();
        let (key, tweak_key) = vek.split();
        let encryptor = XtsCipher::new(key, tweak_key, Direction::Encrypt).unwrap();

        let mut plaintext = [0u8; DATA_UNIT_SIZE];
        for (i, byte) in plaintext.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }

        let chunk_index = 42;
        let mut ciphertext = [0u8; DATA_UNIT_SIZE];
        encryptor
            .process_data_unit(&plaintext, &mut ciphertext, chunk_index)
            .unwrap();

        let decryptor = Decryptor::new(&vek).unwrap();
        let recovered = decryptor.decrypt(&ciphertext, chunk_index).unwrap();
        assert_eq!(recovered.as_slice(), plaintext.as_slice());

        // A wrong chunk index silently yields different bytes.
        let wrong = decryptor.decrypt(&ciphertext, chunk_index + 1).unwrap();
        assert_ne!(wrong.as_slice(), plaintext.as_slice());
    }
}
