pub mod canonical;
pub mod hash;
pub mod keypair;
pub mod signature;

pub use canonical::{canonical_form, canonical_json};
pub use hash::{sha256_hex, sha256_of_canonical};
pub use keypair::KeyPair;
pub use signature::{sign, verify};
