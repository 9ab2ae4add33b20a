/**
 * Cryptographic types and operations.
 *  - RSA-OAEP encryption keys for payload confidentiality
 *  - Ed25519 signing keys for client identity
 */
pub mod crypto;
/**
 * Request and response bodies exchanged
 *  between the client driver and the server.
 */
pub mod protocol;
/**
 * The server-side trust registry: which identities
 *  exist and which key each of them signs with.
 */
pub mod registry;

pub mod prelude {
    pub use crate::crypto::{
        CryptoError, EncryptionPrivateKey, EncryptionPublicKey, SigningPrivateKey,
        SigningPublicKey,
    };
    pub use crate::protocol::{SecretRequest, SecretResponse};
    pub use crate::registry::{Registry, RegistryEntry, RegistryError, SharedRegistry};
}
