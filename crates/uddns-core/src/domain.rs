//! Public IP and main-domain value types
//!
//! Both are validated at construction so that downstream steps never see a
//! registrar's garbage.

use crate::error::{Error, Result, codes};
use regex::Regex;
use std::sync::LazyLock;

// Four dot-separated groups of one to three digits. Octet ranges are not
// checked, so "999.1.1.1" is accepted.
static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$").expect("valid IPv4 pattern")
});

/// The host's public IPv4 address as reported by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrentIp(String);

impl CurrentIp {
    /// Validate a dotted-quad string
    pub fn parse(value: &str) -> Result<Self> {
        if !Self::is_valid(value) {
            return Err(Error::protocol(
                codes::INVALID_CLIENT_IP,
                format!("Not a dotted-quad IPv4 address: '{}'", value),
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Whether `value` has the dotted-quad shape
    pub fn is_valid(value: &str) -> bool {
        IPV4_PATTERN.is_match(value)
    }

    /// The address as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrentIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The account-owned domain that is a suffix of (or equal to) the target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MainDomain(String);

impl MainDomain {
    /// The domain as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host label of `domain` relative to this main domain
    ///
    /// `"home.example.com"` under `"example.com"` yields `"home"`; the apex
    /// yields an empty string.
    pub fn subdomain_of<'a>(&self, domain: &'a str) -> &'a str {
        if domain == self.0 {
            return "";
        }
        domain
            .strip_suffix(self.0.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(domain)
    }
}

impl std::fmt::Display for MainDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the main domain of `domain` among the domains an account owns
///
/// An exact entry wins. Otherwise the longest owned proper suffix of at
/// least two labels is chosen.
pub fn resolve_main_domain<S: AsRef<str>>(domain: &str, owned: &[S]) -> Result<MainDomain> {
    if owned.is_empty() {
        return Err(Error::NoDomains);
    }

    let owns = |candidate: &str| {
        owned
            .iter()
            .any(|d| d.as_ref().trim_end_matches('.').eq_ignore_ascii_case(candidate))
    };

    if owns(domain) {
        return Ok(MainDomain(domain.to_string()));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    for len in (2..labels.len()).rev() {
        let candidate = labels[labels.len() - len..].join(".");
        if owns(&candidate) {
            return Ok(MainDomain(candidate));
        }
    }

    Err(Error::DomainNotOwned {
        domain: domain.to_string(),
    })
}
