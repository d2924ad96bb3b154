//! # uddns-core
//!
//! Core library for a registrar-driven dynamic DNS updater.
//!
//! ## Architecture Overview
//!
//! Each polling cycle asks the registrar for the host's public IP, logs in,
//! finds the account-owned main domain, lists the target's records and
//! replaces stale ones, then logs out:
//!
//! - **RegistrarClient**: Capability set a registrar integration implements
//! - **RegistrarRegistry**: Maps configured registrar names to client factories
//! - **SyncEngine**: Cancellable polling loop with a shortened error interval
//! - **CredentialValidator**: One-shot validation of proposed credentials
//! - **SecretProtector**: Machine-local encryption of the stored API token
//! - **LogSink**: Destination for coded event log entries
//!
//! ## Design Principles
//!
//! 1. **Explicit wiring**: registry and log sink are constructed by the host
//!    and injected, never global
//! 2. **Cooperative cancellation**: every network call and sleep observes a
//!    `CancellationToken`
//! 3. **Create before delete**: a domain never loses its last A record
//! 4. **Stable codes**: every failure maps to a numeric code for operators

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod log;
pub mod records;
pub mod registry;
pub mod secret;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use config::{Credentials, ENCRYPTED_PREFIX, SyncConfig};
pub use domain::{CurrentIp, MainDomain, resolve_main_domain};
pub use engine::{CycleAction, CycleOutcome, SyncEngine};
pub use error::{Error, ErrorReport, Result};
pub use log::{ChannelSink, LogEntry, LogSink, Severity, TracingSink};
pub use records::{DnsRecord, RecordKind, RecordSet, ReconcilePlan};
pub use registry::{RegistrarInfo, RegistrarRegistry};
pub use secret::{MachineKeyProtector, protect_token};
pub use traits::{ReconcileSummary, RegistrarClient, RegistrarFactory, SecretProtector};
pub use validate::{CredentialValidator, ProgressSink, ValidationOutcome, ValidationStep};
