use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::CryptoError;

/// Size of Ed25519 private key (seed) in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

const PUBLIC_PEM_TAG: &str = "ED25519 PUBLIC KEY";
const PRIVATE_PEM_TAG: &str = "ED25519 PRIVATE KEY";

/// Verification key for a registered client identity
///
/// This is what the trust registry stores next to each identity name. It
/// serializes as PEM text so registry files stay human-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SigningPublicKey(VerifyingKey);

impl TryFrom<String> for SigningPublicKey {
    type Error = CryptoError;
    fn try_from(pem: String) -> Result<Self, Self::Error> {
        Self::from_pem(&pem)
    }
}

impl From<SigningPublicKey> for String {
    fn from(key: SigningPublicKey) -> Self {
        key.to_pem()
    }
}

impl SigningPublicKey {
    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Encode public key in PEM format with tag "ED25519 PUBLIC KEY"
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PUBLIC_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a public key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "ED25519 PUBLIC KEY"
    /// - The key size is incorrect or the bytes are not a valid curve point
    pub fn from_pem(pem_str: &str) -> Result<Self, CryptoError> {
        let bytes = parse_pem::<PUBLIC_KEY_SIZE>(pem_str, PUBLIC_PEM_TAG)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Verify a base64 encoded Ed25519 signature over `message`.
    ///
    /// A signature that simply does not match is `Ok(false)`; only a signature
    /// that cannot be decoded at all is an error.
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<bool, CryptoError> {
        let signature = decode_signature(signature)?;
        Ok(self.verify_decoded(message, &signature))
    }

    pub(crate) fn verify_decoded(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, signature).is_ok()
    }
}

/// Signing key held by a client identity
///
/// Generated by the registration path and delivered to the client out of
/// band. Debug output never includes key material.
#[derive(Clone)]
pub struct SigningPrivateKey(SigningKey);

impl std::fmt::Debug for SigningPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningPrivateKey")
            .field("public", &self.public().to_pem().trim())
            .field("seed", &"[redacted]")
            .finish()
    }
}

impl From<[u8; PRIVATE_KEY_SIZE]> for SigningPrivateKey {
    fn from(seed: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&seed))
    }
}

impl SigningPrivateKey {
    /// Generate a new random signing key using the OS RNG
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Derive the verification key for this signing key
    pub fn public(&self) -> SigningPublicKey {
        SigningPublicKey(self.0.verifying_key())
    }

    /// Convert the signing key seed to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Encode the seed in PEM format with tag "ED25519 PRIVATE KEY"
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PRIVATE_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, CryptoError> {
        let bytes = parse_pem::<PRIVATE_KEY_SIZE>(pem_str, PRIVATE_PEM_TAG)?;
        Ok(Self::from(bytes))
    }

    /// Sign the exact bytes of `message`, returning a base64 encoded signature.
    ///
    /// Ed25519 is deterministic: the same key and message always produce the
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.0.sign(message);
        STANDARD.encode(signature.to_bytes())
    }
}

/// Generate a fresh signing key pair, returned as `(public, private)`.
pub fn generate_signing_keypair() -> (SigningPublicKey, SigningPrivateKey) {
    let private = SigningPrivateKey::generate();
    (private.public(), private)
}

fn parse_pem<const N: usize>(pem_str: &str, tag: &str) -> Result<[u8; N], CryptoError> {
    let pem = pem::parse(pem_str.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("failed to parse PEM: {}", e)))?;

    if pem.tag() != tag {
        return Err(CryptoError::InvalidKey(format!(
            "invalid PEM tag, expected {}, got {}",
            tag,
            pem.tag()
        )));
    }

    let contents = pem.contents();
    if contents.len() != N {
        return Err(CryptoError::InvalidKey(format!(
            "invalid key size in PEM, expected {}, got {}",
            N,
            contents.len()
        )));
    }

    let mut bytes = [0u8; N];
    bytes.copy_from_slice(contents);
    Ok(bytes)
}

pub(crate) fn decode_signature(signature: &str) -> Result<Signature, CryptoError> {
    let bytes = STANDARD
        .decode(signature.trim())
        .map_err(|e| CryptoError::Verification(e.to_string()))?;
    Signature::from_slice(&bytes).map_err(|_| {
        CryptoError::Verification(format!(
            "expected {} signature bytes, got {}",
            SIGNATURE_SIZE,
            bytes.len()
        ))
    })
}
