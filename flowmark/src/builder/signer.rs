use flowmark_core::{HashAlgorithm, PrivateKey};

/// Produces envelope signatures for one account key.
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// Raw public key matching the signatures produced by [`Signer::sign`].
    fn public_key(&self) -> Vec<u8>;
}

/// Signer holding the private key in process memory.
#[derive(Debug, Clone)]
pub struct InMemorySigner {
    key: PrivateKey,
    hash: HashAlgorithm,
}

impl InMemorySigner {
    pub fn new(key: PrivateKey, hash: HashAlgorithm) -> Self {
        Self { key, hash }
    }
}

impl Signer for InMemorySigner {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(self.hash, message)
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.public_key()
    }
}
