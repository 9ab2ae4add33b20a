use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use super::CryptoError;

/// Key size used by servers and clients unless configured otherwise
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Public half of an RSA-OAEP encryption key pair
///
/// Serialized as an SPKI PEM block (`-----BEGIN PUBLIC KEY-----`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionPublicKey(RsaPublicKey);

impl EncryptionPublicKey {
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        RsaPublicKey::from_public_key_pem(pem.trim())
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Largest plaintext, in bytes, that fits in a single OAEP block
    pub fn max_plaintext_len(&self) -> usize {
        let hash_len = <Sha256 as Digest>::output_size();
        self.0.size().saturating_sub(2 * hash_len + 2)
    }

    /// Encrypt `plaintext` and return the base64 encoded ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the plaintext does not fit in
    /// one block for this key size.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let max = self.max_plaintext_len();
        if plaintext.len() > max {
            return Err(CryptoError::Encryption(format!(
                "plaintext is {} bytes, key capacity is {} bytes",
                plaintext.len(),
                max
            )));
        }
        let mut rng = rand::thread_rng();
        let ciphertext = self
            .0
            .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(STANDARD.encode(ciphertext))
    }
}

/// Private half of an RSA-OAEP encryption key pair
///
/// Never persisted by the protocol itself; PEM (PKCS#8) conversion exists so
/// key pairs can be moved between processes in tests and tooling.
#[derive(Clone)]
pub struct EncryptionPrivateKey(RsaPrivateKey);

impl std::fmt::Debug for EncryptionPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionPrivateKey")
            .field("bits", &(self.0.size() * 8))
            .field("key", &"[redacted]")
            .finish()
    }
}

impl EncryptionPrivateKey {
    /// Generate a new private key with a modulus of `bits` bits
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, bits)
            .map(Self)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
    }

    pub fn public(&self) -> EncryptionPublicKey {
        EncryptionPublicKey(self.0.to_public_key())
    }

    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        RsaPrivateKey::from_pkcs8_pem(pem.trim())
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Decrypt a base64 encoded ciphertext produced by [`EncryptionPublicKey::encrypt`].
    ///
    /// Every failure maps to [`CryptoError::Decryption`].
    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, CryptoError> {
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CryptoError::Decryption)?;
        self.0
            .decrypt(Oaep::new::<Sha256>(), &bytes)
            .map_err(|_| CryptoError::Decryption)
    }
}

/// Generate an encryption key pair of the given size.
///
/// Returns `(public, private)`.
pub fn generate_encryption_keypair(
    bits: usize,
) -> Result<(EncryptionPublicKey, EncryptionPrivateKey), CryptoError> {
    let private = EncryptionPrivateKey::generate(bits)?;
    Ok((private.public(), private))
}
