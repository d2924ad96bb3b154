//! Machine-local secret protection

use crate::error::Result;
use zeroize::Zeroizing;

/// Encrypts and decrypts secrets so they are only usable on this machine
///
/// Implementations must round-trip byte-for-byte and must fail with
/// [`crate::Error::Format`] (never panic) on blobs they did not produce.
pub trait SecretProtector: Send + Sync {
    /// Encrypt `plaintext` into an opaque printable blob
    fn protect(&self, plaintext: &[u8]) -> Result<String>;

    /// Decrypt a blob produced by [`SecretProtector::protect`]
    ///
    /// The returned buffer is scrubbed when dropped.
    fn unprotect(&self, blob: &str) -> Result<Zeroizing<Vec<u8>>>;
}
