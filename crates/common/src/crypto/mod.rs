//! Cryptographic primitives for strongbox
//!
//! Two independent key families are used by the protocol:
//!
//! - **Encryption**: RSA-OAEP (SHA-256) key pairs, generated fresh by every
//!   process. They only keep a single payload (a secret name on the way in, a
//!   secret value on the way out) confidential between the two ends of one
//!   exchange. There is no symmetric session key, so a payload must fit in a
//!   single RSA block; see [`EncryptionPublicKey::max_plaintext_len`].
//! - **Signing**: Ed25519 key pairs, generated once per client identity at
//!   registration time. The public half lives in the server's trust registry,
//!   the private half is handed to the client out of band.
//!
//! All key material crosses process boundaries as PEM text, and ciphertexts
//! and signatures as standard base64, so everything can live in JSON, YAML or
//! dotenv files without binary-safety concerns.

mod encryption;
mod keys;

pub use encryption::{
    generate_encryption_keypair, EncryptionPrivateKey, EncryptionPublicKey, DEFAULT_RSA_BITS,
};
pub(crate) use keys::decode_signature;
pub use keys::{
    generate_signing_keypair, SigningPrivateKey, SigningPublicKey, PRIVATE_KEY_SIZE,
    PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};

/// Errors produced by the crypto primitives
///
/// `Decryption` carries no detail: a bad encoding, the wrong key
/// and a padding failure must be indistinguishable to anyone upstream.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed")]
    Decryption,
    #[error("malformed signature: {0}")]
    Verification(String),
}
