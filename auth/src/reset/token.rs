use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

/// Number of random bytes backing a raw reset token.
const TOKEN_BYTES: usize = 20;

/// A freshly generated reset token.
///
/// `raw` is handed to the account owner (embedded in a link) and never
/// stored; `digest` is what the store keeps for the later comparison.
pub struct GeneratedResetToken {
    pub raw: String,
    pub digest: String,
}

/// Generator for single-use password-reset tokens.
///
/// Tokens are 20 bytes of OS entropy, hex-encoded. Only the SHA-256 digest
/// of the raw token is meant to be persisted, so a leaked store never yields
/// a usable reset link.
pub struct ResetTokenGenerator;

impl ResetTokenGenerator {
    /// Create a new reset token generator.
    pub fn new() -> Self {
        Self
    }

    /// Generate a high-entropy raw token together with its storable digest.
    pub fn generate(&self) -> GeneratedResetToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let raw = hex::encode(bytes);
        let digest = self.digest(&raw);

        GeneratedResetToken { raw, digest }
    }

    /// Compute the storable digest of a raw token.
    ///
    /// Deterministic: the same raw token always digests to the same value,
    /// which is how an incoming token is matched against the stored one.
    pub fn digest(&self, raw: &str) -> String {
        hex::encode(Sha256::digest(raw.as_bytes()))
    }
}

impl Default for ResetTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}
