//! Machine-local API token protection
//!
//! Tokens are encrypted with AES-256-GCM under a key derived (PBKDF2-HMAC-SHA256)
//! from the machine identifier and a per-blob random salt. The stored blob is
//! `base64(salt ‖ nonce ‖ ciphertext)`, so it only decrypts on the machine
//! that produced it.

use crate::config::ENCRYPTED_PREFIX;
use crate::error::{Error, Result};
use crate::traits::SecretProtector;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const DEFAULT_ITERATIONS: u32 = 100_000;

/// Locations checked for the machine identifier, in order
pub const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// [`SecretProtector`] keyed to the local machine
pub struct MachineKeyProtector {
    machine_secret: Zeroizing<Vec<u8>>,
    iterations: u32,
}

impl std::fmt::Debug for MachineKeyProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineKeyProtector")
            .field("machine_secret", &"<REDACTED>")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl MachineKeyProtector {
    /// Create a protector from raw machine secret bytes
    pub fn new(machine_secret: &[u8]) -> Self {
        Self {
            machine_secret: Zeroizing::new(machine_secret.to_vec()),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Override the PBKDF2 iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Key the protector to this machine's identifier
    ///
    /// `override_path` takes precedence over the standard locations.
    pub fn from_machine_id(override_path: Option<&Path>) -> Result<Self> {
        let candidates: Vec<&Path> = match override_path {
            Some(path) => vec![path],
            None => MACHINE_ID_PATHS.iter().map(Path::new).collect(),
        };

        for path in &candidates {
            match std::fs::read_to_string(path) {
                Ok(id) if !id.trim().is_empty() => {
                    tracing::debug!(path = %path.display(), "Using machine identifier");
                    return Ok(Self::new(id.trim().as_bytes()));
                }
                Ok(_) => tracing::debug!(path = %path.display(), "Machine identifier file is empty"),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Machine identifier unavailable"),
            }
        }

        Err(Error::format(format!(
            "No machine identifier found (tried {})",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    fn derive_key(&self, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(&self.machine_secret, salt, self.iterations, &mut key[..]);
        key
    }
}

impl SecretProtector for MachineKeyProtector {
    fn protect(&self, plaintext: &[u8]) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::format(format!("Invalid key: {}", e)))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| Error::format(format!("Encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&blob))
    }

    fn unprotect(&self, blob: &str) -> Result<Zeroizing<Vec<u8>>> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .map_err(|e| Error::format(format!("Token is not valid base64: {}", e)))?;

        if data.len() < SALT_LEN + NONCE_LEN {
            return Err(Error::format("Token blob is too short"));
        }

        let (salt, rest) = data.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::format(format!("Invalid key: {}", e)))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::format("Token was not encrypted on this machine or is corrupted"))?;

        Ok(Zeroizing::new(plaintext))
    }
}

/// Protect a plaintext token into its stored `ENCRYPTED:` form
pub fn protect_token(protector: &dyn SecretProtector, plaintext: &str) -> Result<String> {
    Ok(format!("{}{}", ENCRYPTED_PREFIX, protector.protect(plaintext.as_bytes())?))
}
