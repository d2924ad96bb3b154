//! Configuration types for the UDDNS system
//!
//! The configuration bundle is loaded once at startup and is immutable for
//! the life of the process.

use crate::error::{Error, Result, codes};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix marking an API token that has already been protected
pub const ENCRYPTED_PREFIX: &str = "ENCRYPTED:";

/// Main synchronization configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Registrar name as shown in the registry (e.g. "Name.com")
    #[serde(default = "default_registrar")]
    pub registrar: String,

    /// Registrar API user name
    pub user_name: String,

    /// API token protected by the machine-local secret primitive
    pub api_token: String,

    /// Fully qualified domain name to keep updated
    pub domain: String,

    /// Minutes between successful cycles
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Minutes between cycles after a failure (defaults to a quarter of
    /// `interval_minutes`)
    #[serde(default)]
    pub interval_error_minutes: Option<u64>,

    /// Emit a verbose log entry per step
    #[serde(default)]
    pub debug: bool,

    /// Skip authentication when the public IP has not changed since the last
    /// cycle that confirmed the registrar holds it
    #[serde(default)]
    pub skip_unchanged_ip: bool,
}

// Keep the token out of debug output
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("registrar", &self.registrar)
            .field("user_name", &self.user_name)
            .field("api_token", &"<REDACTED>")
            .field("domain", &self.domain)
            .field("interval_minutes", &self.interval_minutes)
            .field("interval_error_minutes", &self.interval_error_minutes)
            .field("debug", &self.debug)
            .field("skip_unchanged_ip", &self.skip_unchanged_ip)
            .finish()
    }
}

impl SyncConfig {
    /// Create a configuration with default intervals
    pub fn new(
        user_name: impl Into<String>,
        api_token: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            registrar: default_registrar(),
            user_name: user_name.into(),
            api_token: api_token.into(),
            domain: domain.into(),
            interval_minutes: default_interval_minutes(),
            interval_error_minutes: None,
            debug: false,
            skip_unchanged_ip: false,
        }
    }

    /// Set the registrar name
    pub fn with_registrar(mut self, registrar: impl Into<String>) -> Self {
        self.registrar = registrar.into();
        self
    }

    /// Set both polling intervals
    pub fn with_intervals(mut self, interval_minutes: u64, error_minutes: Option<u64>) -> Self {
        self.interval_minutes = interval_minutes;
        self.interval_error_minutes = error_minutes;
        self
    }

    /// Enable or disable per-step debug entries
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable the unchanged-IP short-circuit
    pub fn with_skip_unchanged_ip(mut self, skip: bool) -> Self {
        self.skip_unchanged_ip = skip;
        self
    }

    /// Load a configuration bundle from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                codes::CONFIG_FILE,
                format!("Unable to read {}: {}", path.display(), e),
            )
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            Error::config(
                codes::CONFIG_FILE,
                format!("Invalid configuration in {}: {}", path.display(), e),
            )
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.registrar.trim().is_empty() {
            return Err(Error::config(codes::EMPTY_REGISTRAR, "Registrar cannot be empty"));
        }

        self.credentials().check_present()?;
        validate_domain_name(&self.domain)?;

        if self.interval_minutes == 0 {
            return Err(Error::config(
                codes::INVALID_INTERVAL,
                "Polling interval must be at least one minute",
            ));
        }
        if self.interval_error_minutes == Some(0) {
            return Err(Error::config(
                codes::INVALID_INTERVAL,
                "Error polling interval must be at least one minute",
            ));
        }

        Ok(())
    }

    /// Sleep between successful cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Shortened sleep after a failed cycle
    pub fn error_interval(&self) -> Duration {
        match self.interval_error_minutes {
            Some(minutes) => Duration::from_secs(minutes.saturating_mul(60)),
            None => self.interval() / 4,
        }
    }

    /// Credentials handed to a registrar client for one cycle
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user_name, &self.api_token, &self.domain)
    }
}

fn default_registrar() -> String {
    "Name.com".to_string()
}

fn default_interval_minutes() -> u64 {
    5
}

/// Registrar credentials plus the target domain
///
/// The token is kept in its protected form; clients decrypt it only for the
/// duration of an authenticate call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user_name: String,
    api_token_encrypted: String,
    domain: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("api_token_encrypted", &"<REDACTED>")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Credentials {
    /// Build credentials, stripping an `ENCRYPTED:` marker from the token
    pub fn new(user_name: &str, api_token_encrypted: &str, domain: &str) -> Self {
        let token = api_token_encrypted.trim();
        let token = token.strip_prefix(ENCRYPTED_PREFIX).unwrap_or(token);

        Self {
            user_name: user_name.trim().to_string(),
            api_token_encrypted: token.to_string(),
            domain: domain.trim().trim_end_matches('.').to_lowercase(),
        }
    }

    /// API user name
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Protected API token blob (without the `ENCRYPTED:` marker)
    pub fn api_token_encrypted(&self) -> &str {
        &self.api_token_encrypted
    }

    /// Target FQDN, lowercased without a trailing dot
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Reject zero-length fields before any network call
    pub fn check_present(&self) -> Result<()> {
        if self.user_name.is_empty() {
            return Err(Error::config(codes::EMPTY_USERNAME, "Username cannot be empty"));
        }
        if self.api_token_encrypted.is_empty() {
            return Err(Error::config(codes::EMPTY_TOKEN, "API token cannot be empty"));
        }
        if self.domain.is_empty() {
            return Err(Error::config(codes::EMPTY_DOMAIN, "Domain cannot be empty"));
        }
        Ok(())
    }
}

/// Validate that a string is a usable host name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphens.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        return Err(Error::config(codes::EMPTY_DOMAIN, "Domain cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(
            codes::INVALID_DOMAIN,
            format!("Domain name too long: {} chars (max 253)", domain.len()),
        ));
    }

    if !domain.contains('.') {
        return Err(Error::config(
            codes::INVALID_DOMAIN,
            format!("Domain must have at least two labels: '{}'", domain),
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(
                codes::INVALID_DOMAIN,
                format!("Domain name has empty label: '{}'", domain),
            ));
        }
        if label.len() > 63 {
            return Err(Error::config(
                codes::INVALID_DOMAIN,
                format!("Domain label too long: {} chars (max 63). Label: '{}'", label.len(), label),
            ));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::config(
                codes::INVALID_DOMAIN,
                format!("Domain label contains invalid characters: '{}'", label),
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(
                codes::INVALID_DOMAIN,
                format!("Domain label cannot start or end with hyphen: '{}'", label),
            ));
        }
    }

    Ok(())
}
