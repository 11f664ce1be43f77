use sha2::{Digest, Sha256};

/// Issues the capability string that authorizes downloading one specific
/// backup file. Verification happens in the request layer.
pub trait TokenProvider: Send + Sync {
    fn issue(&self, filename: &str) -> String;
}

/// Salted SHA-256 token. The salt lives in configuration so tokens stay
/// stable across requests without any cross-request state in the core.
pub struct SaltedTokenProvider {
    salt: String,
}

impl SaltedTokenProvider {
    pub fn new(salt: impl Into<String>) -> Self {
        SaltedTokenProvider { salt: salt.into() }
    }
}

impl TokenProvider for SaltedTokenProvider {
    fn issue(&self, filename: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(filename.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..20].to_string()
    }
}
