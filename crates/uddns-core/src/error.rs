//! Error types for the UDDNS system
//!
//! Every failure carries a stable numeric code. Codes are what operators see
//! in the event log, so they must never be renumbered.

use thiserror::Error;

/// Result type alias for UDDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric codes attached to errors and log entries.
pub mod codes {
    pub const EMPTY_USERNAME: u16 = 100;
    pub const EMPTY_TOKEN: u16 = 101;
    pub const EMPTY_DOMAIN: u16 = 102;
    pub const EMPTY_REGISTRAR: u16 = 103;
    pub const UNSUPPORTED_REGISTRAR: u16 = 104;
    pub const SECRET_FORMAT: u16 = 105;
    pub const INVALID_INTERVAL: u16 = 106;
    pub const INVALID_DOMAIN: u16 = 107;
    pub const CONFIG_FILE: u16 = 108;

    pub const HTTP_STATUS: u16 = 200;
    pub const TRANSPORT: u16 = 201;
    pub const INVALID_JSON: u16 = 202;
    pub const REGISTRAR_STATUS: u16 = 203;
    pub const MISSING_ENVELOPE: u16 = 204;
    pub const TIMEOUT: u16 = 205;

    pub const MISSING_CLIENT_IP: u16 = 302;
    pub const INVALID_CLIENT_IP: u16 = 303;

    pub const EMPTY_CREDENTIALS: u16 = 401;
    pub const MISSING_SESSION_TOKEN: u16 = 402;
    pub const INVALID_SESSION_TOKEN: u16 = 403;

    pub const NO_DOMAINS: u16 = 502;
    pub const DOMAIN_NOT_OWNED: u16 = 503;

    pub const RECORD_UPDATED: u16 = 999;
}

/// Core error type for the UDDNS system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required configuration value is missing, empty or invalid
    #[error("Configuration error {code}: {message}")]
    Config {
        /// Numeric code (100-108)
        code: u16,
        /// What is wrong with the value
        message: String,
    },

    /// The configured registrar has no registered client
    #[error("Unsupported registrar: {name}")]
    UnsupportedRegistrar {
        /// The registrar name as configured
        name: String,
    },

    /// The registrar could not be reached
    #[error("Transport error reaching {url}: {details}")]
    Transport {
        /// Absolute URL of the request
        url: String,
        /// Underlying failure
        details: String,
        /// Whether the request hit the client timeout
        timed_out: bool,
    },

    /// The registrar answered with a non-success HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Absolute URL of the request
        url: String,
    },

    /// The response body was not JSON or lacked an expected shape
    #[error("Malformed response from {url}: {details}")]
    MalformedResponse {
        /// Numeric code (202 or 204)
        code: u16,
        /// Absolute URL of the request
        url: String,
        /// Raw response context for diagnosis
        details: String,
    },

    /// The registrar reported a failure, or returned a value that violates
    /// the protocol (e.g. a malformed client IP)
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Numeric code (203, 302, 303)
        code: u16,
        /// Registrar message or description of the violation
        message: String,
    },

    /// Authentication failed or produced an unusable session
    #[error("Authentication failed ({code}): {message}")]
    Auth {
        /// Numeric code (401-403)
        code: u16,
        /// Description of the failure
        message: String,
    },

    /// The account owns no domains at all
    #[error("The registrar account has no domains")]
    NoDomains,

    /// No suffix of the target domain is owned by the account
    #[error("Domain {domain} is not owned by the registrar account")]
    DomainNotOwned {
        /// Target FQDN
        domain: String,
    },

    /// The stored secret could not be decrypted or encrypted
    #[error("Secret format error: {0}")]
    Format(String),

    /// Cooperative cancellation was observed
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a configuration error
    pub fn config(code: u16, msg: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: msg.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(code: u16, msg: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: msg.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(code: u16, msg: impl Into<String>) -> Self {
        Self::Auth {
            code,
            message: msg.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(code: u16, url: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            code,
            url: url.into(),
            details: details.into(),
        }
    }

    /// Create a secret format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Numeric code for the event log
    pub fn code(&self) -> u16 {
        match self {
            Error::Config { code, .. } => *code,
            Error::UnsupportedRegistrar { .. } => codes::UNSUPPORTED_REGISTRAR,
            Error::Transport { timed_out: true, .. } => codes::TIMEOUT,
            Error::Transport { .. } => codes::TRANSPORT,
            Error::HttpStatus { .. } => codes::HTTP_STATUS,
            Error::MalformedResponse { code, .. } => *code,
            Error::Protocol { code, .. } => *code,
            Error::Auth { code, .. } => *code,
            Error::NoDomains => codes::NO_DOMAINS,
            Error::DomainNotOwned { .. } => codes::DOMAIN_NOT_OWNED,
            Error::Format(_) => codes::SECRET_FORMAT,
            Error::Cancelled => 0,
        }
    }

    /// Fixed human-readable text for this error's code
    pub fn summary(&self) -> &'static str {
        match self.code() {
            codes::EMPTY_USERNAME => "Username is empty.",
            codes::EMPTY_TOKEN => "API token is empty.",
            codes::EMPTY_DOMAIN => "Domain is empty.",
            codes::EMPTY_REGISTRAR => "No registrar selected.",
            codes::UNSUPPORTED_REGISTRAR => "Registrar is not supported.",
            codes::SECRET_FORMAT => "The stored API token could not be decrypted.",
            codes::INVALID_INTERVAL => "Polling interval is invalid.",
            codes::INVALID_DOMAIN => "Domain is not a valid host name.",
            codes::CONFIG_FILE => "Configuration file could not be loaded.",
            codes::HTTP_STATUS => "Registrar returned an unsuccessful HTTP status.",
            codes::TRANSPORT => "Unable to reach the registrar.",
            codes::INVALID_JSON => "Registrar returned invalid JSON.",
            codes::REGISTRAR_STATUS => "Registrar reported an error.",
            codes::MISSING_ENVELOPE => "Registrar response lacks a result status.",
            codes::TIMEOUT => "Timed out waiting for the registrar.",
            codes::MISSING_CLIENT_IP => "Registrar did not report the client IP.",
            codes::INVALID_CLIENT_IP => "Registrar reported a malformed client IP.",
            codes::EMPTY_CREDENTIALS => "Username or API token is empty.",
            codes::MISSING_SESSION_TOKEN => "Registrar did not return a session token.",
            codes::INVALID_SESSION_TOKEN => "Registrar returned a malformed session token.",
            codes::NO_DOMAINS => "The registrar account has no domains.",
            codes::DOMAIN_NOT_OWNED => "The domain is not owned by this account.",
            _ => "Operation cancelled.",
        }
    }

    /// Additional context beyond [`Error::summary`], if any
    pub fn details(&self) -> Option<String> {
        match self {
            Error::Config { message, .. }
            | Error::Protocol { message, .. }
            | Error::Auth { message, .. } => Some(message.clone()),
            Error::UnsupportedRegistrar { name } => Some(format!("Registrar: {}", name)),
            Error::Transport { url, details, .. } if url.is_empty() => Some(details.clone()),
            Error::Transport { url, details, .. } => Some(format!("URL: {}\n{}", url, details)),
            Error::HttpStatus { status, url } => Some(format!("HTTP {}; URL: {}", status, url)),
            Error::MalformedResponse { url, details, .. } => {
                Some(format!("URL: {}\n{}", url, details))
            }
            Error::DomainNotOwned { domain } => Some(format!("Domain: {}", domain)),
            Error::Format(msg) => Some(msg.clone()),
            Error::NoDomains | Error::Cancelled => None,
        }
    }

    /// Whether this is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether retrying cannot help (startup-class errors)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::UnsupportedRegistrar { .. })
    }

    /// Whether a registrar's help page is relevant to this failure
    pub fn wants_registrar_help(&self) -> bool {
        matches!(
            self,
            Error::Auth { .. } | Error::NoDomains | Error::DomainNotOwned { .. }
        )
    }

    /// Convert into a user-facing report
    pub fn report(&self, url: Option<String>) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.summary().to_string(),
            details: self.details(),
            url,
        }
    }
}

/// Structured failure surfaced to operators or users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Numeric error code
    pub code: u16,
    /// Human text for the code
    pub message: String,
    /// Optional details (URL, upstream message, raw response)
    pub details: Option<String>,
    /// Optional remediation link
    pub url: Option<String>,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, "\n\n{}", details)?;
        }
        if let Some(url) = &self.url {
            write!(f, "\n\n{}", url)?;
        }
        Ok(())
    }
}
