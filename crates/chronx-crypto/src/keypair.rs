use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use zeroize::Zeroize;

/// An Ed25519 keypair for an address. The signing key is wiped on drop.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Restore a keypair from a raw 32-byte secret key (e.g. loaded from a
    /// wallet file).
    pub fn from_raw(secret_key_bytes: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret_key_bytes),
        }
    }

    /// Sign canonical message bytes, returning the hex-encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        crate::signature::sign(&self.signing_key, message)
    }

    /// Hex-encoded public key, suitable for `Transaction::sender_public_key`
    /// or `Account::public_key`.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {} }}", self.public_key_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_sign() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(crate::signature::verify(&kp.public_key_hex(), b"hello", &sig));
    }

    #[test]
    fn from_raw_round_trip() {
        let kp = KeyPair::generate();
        let raw = kp.secret_key_bytes();
        let restored = KeyPair::from_raw(raw);
        assert_eq!(kp.public_key_hex(), restored.public_key_hex());
    }
}
