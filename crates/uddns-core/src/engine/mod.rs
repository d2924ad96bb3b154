//! Polling synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Building a fresh registrar client per cycle
//! - Running the six-step protocol in strict order
//! - Choosing the next sleep (normal or shortened error interval)
//! - Reporting to the injected [`LogSink`]
//!
//! ## Cycle
//!
//! ```text
//! CurrentIP ─► Authenticate ─► ResolveMainDomain ─► ListRecords
//!                                                       │
//!                          ┌────────── in sync? ────────┤
//!                          │ no                         │ yes
//!                          ▼                            │
//!                  ReconcileRecords ────────────────────┤
//!                                                       ▼
//!                                                    Logout
//! ```
//!
//! Every network call and every sleep is a cancellation point. A cancelled
//! cycle is not a failure: the loop exits without an error entry.

use crate::config::{Credentials, SyncConfig};
use crate::domain::{CurrentIp, MainDomain};
use crate::error::{Error, Result, codes};
use crate::log::{LogEntry, LogSink, Severity};
use crate::records::RecordSet;
use crate::registry::RegistrarRegistry;
use crate::traits::{ReconcileSummary, RegistrarClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause before the main interval sleep so a concurrent stop lands first
pub const GRACE_PERIOD: Duration = Duration::from_secs(1);

/// What a completed cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// The IP matched the last confirmed value; no authentication happened
    Skipped,
    /// The registrar already held exactly the current IP
    InSync,
    /// Records were reconciled
    Updated(ReconcileSummary),
}

/// Result of one successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Public IP observed this cycle
    pub current_ip: CurrentIp,
    /// Main domain, absent when the cycle was skipped
    pub main_domain: Option<MainDomain>,
    /// What was done
    pub action: CycleAction,
}

/// Core polling engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`] (validates configuration)
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine runs until the cancellation token fires
///
/// Cycles never overlap: cycle N+1 starts only after cycle N's logout (or
/// failure) completes.
pub struct SyncEngine {
    /// Immutable configuration bundle
    config: SyncConfig,

    /// Registrar factories
    registry: Arc<RegistrarRegistry>,

    /// Event log destination
    sink: Arc<dyn LogSink>,

    /// IP the registrar was last confirmed to hold (skip_unchanged_ip only)
    last_confirmed_ip: Option<CurrentIp>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Errors
    ///
    /// Fails with a fatal error (`Config` or `UnsupportedRegistrar`) when the
    /// configuration is invalid or its registrar is not registered.
    pub fn new(
        config: SyncConfig,
        registry: Arc<RegistrarRegistry>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        config.validate()?;
        registry.factory(&config.registrar)?;

        Ok(Self {
            config,
            registry,
            sink,
            last_confirmed_ip: None,
        })
    }

    /// The configuration in use
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run until `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            registrar = %self.config.registrar,
            domain = %self.config.domain,
            interval_minutes = self.config.interval_minutes,
            "Sync engine started"
        );

        loop {
            let Some(next) = self.run_once(&cancel).await else {
                break;
            };

            if !sleep_or_cancel(GRACE_PERIOD, &cancel).await {
                break;
            }
            if !sleep_or_cancel(next.saturating_sub(GRACE_PERIOD), &cancel).await {
                break;
            }
        }

        info!("Sync engine stopped");
    }

    /// Run one cycle and report its outcome
    ///
    /// Returns the sleep before the next cycle: the normal interval on
    /// success, the error interval after a failure, or `None` when the cycle
    /// was cancelled.
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> Option<Duration> {
        match self.run_cycle(cancel).await {
            Ok(outcome) => {
                debug!(?outcome, "Cycle completed");
                Some(self.config.interval())
            }
            Err(e) if e.is_cancelled() => {
                debug!("Cycle cancelled");
                self.trace("Cycle cancelled.");
                None
            }
            Err(e) => {
                self.report_failure(&e);
                Some(self.config.error_interval())
            }
        }
    }

    /// Execute the six-step protocol once
    ///
    /// Failures are returned, not logged; [`SyncEngine::run_once`] logs them.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut client = self.registry.create(&self.config.registrar)?;
        let credentials = self.config.credentials();
        credentials.check_present()?;

        self.trace(format!(
            "Querying current IP address from {}.",
            client.registrar_name()
        ));
        let current_ip = client.current_ip(cancel).await?;
        self.trace(format!("Current IP address is {}.", current_ip));

        if self.config.skip_unchanged_ip && self.last_confirmed_ip.as_ref() == Some(&current_ip) {
            self.trace("IP address unchanged since last confirmed cycle, skipping.");
            return Ok(CycleOutcome {
                current_ip,
                main_domain: None,
                action: CycleAction::Skipped,
            });
        }

        self.trace(format!("Authenticating as {}.", credentials.user_name()));
        client.authenticate(&credentials, cancel).await?;

        let synced = self
            .synchronize(client.as_mut(), &credentials, &current_ip, cancel)
            .await;

        match synced {
            Ok((main_domain, action)) => {
                self.trace("Logging out.");
                if let Err(e) = client.logout(cancel).await {
                    self.report_logout_failure(&e);
                }

                // Only a read-back that found the IP in place confirms it.
                self.last_confirmed_ip = match action {
                    CycleAction::InSync => Some(current_ip.clone()),
                    _ => None,
                };
                Ok(CycleOutcome {
                    current_ip,
                    main_domain: Some(main_domain),
                    action,
                })
            }
            Err(e) => {
                // Session is still open; release it unless we are stopping.
                if !e.is_cancelled() {
                    if let Err(logout_err) = client.logout(cancel).await {
                        self.report_secondary_logout_failure(&logout_err);
                    }
                }
                self.last_confirmed_ip = None;
                Err(e)
            }
        }
    }

    /// Steps three to five, run with an authenticated client
    async fn synchronize(
        &self,
        client: &mut dyn RegistrarClient,
        credentials: &Credentials,
        current_ip: &CurrentIp,
        cancel: &CancellationToken,
    ) -> Result<(MainDomain, CycleAction)> {
        let domain = credentials.domain();

        self.trace(format!("Resolving main domain of {}.", domain));
        let main_domain = client.resolve_main_domain(domain, cancel).await?;
        self.trace(format!("Main domain is {}.", main_domain));

        let records: RecordSet = client.list_records(&main_domain, domain, cancel).await?;
        self.trace(format!(
            "Found {} record(s) for {}: {}",
            records.len(),
            domain,
            records.summary()
        ));

        if records.is_in_sync(current_ip) {
            self.trace("Records already hold the current IP address.");
            return Ok((main_domain, CycleAction::InSync));
        }

        let summary = client
            .reconcile_records(&records, current_ip, domain, &main_domain, cancel)
            .await?;

        info!(
            domain,
            ip = %current_ip,
            created = summary.created.is_some(),
            deleted = summary.deleted.len(),
            "Records reconciled"
        );
        self.sink.record(LogEntry::info(
            codes::RECORD_UPDATED,
            format!(
                "Updated {} with the current IP address of {}.",
                domain, current_ip
            ),
        ));

        Ok((main_domain, CycleAction::Updated(summary)))
    }

    /// Log one error entry for a failed cycle
    fn report_failure(&self, err: &Error) {
        let url = if err.wants_registrar_help() {
            self.registry.info_url(&self.config.registrar)
        } else {
            None
        };
        let report = err.report(url);

        error!(
            code = report.code,
            retry_in_secs = self.config.error_interval().as_secs(),
            "Cycle failed: {}",
            err
        );
        self.sink.record(LogEntry::error(report.code, report.to_string()));
    }

    fn report_logout_failure(&self, err: &Error) {
        if err.is_cancelled() {
            debug!("Logout cancelled");
            return;
        }
        warn!(code = err.code(), "Logout failed: {}", err);
        self.sink.record(LogEntry::warning(
            err.code(),
            format!("Logout failed: {}", err.report(None)),
        ));
    }

    /// Logout failing after the cycle already failed
    ///
    /// The cycle's own error entry is the one that matters, so this is kept
    /// at debug severity.
    fn report_secondary_logout_failure(&self, err: &Error) {
        if err.is_cancelled() {
            return;
        }
        debug!(code = err.code(), "Logout after failed cycle also failed: {}", err);
        self.sink.record(LogEntry::new(
            err.code(),
            format!("Logout after failed cycle also failed: {}", err.report(None)),
            Severity::Debug,
        ));
    }

    /// Verbose per-step entry, only when debug is enabled
    fn trace(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        if self.config.debug {
            self.sink.record(LogEntry::debug(message));
        }
    }
}

/// Sleep for `duration` unless cancelled first
///
/// Returns `false` when cancellation won.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_secs(300), &cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            child.cancel();
        });

        let started = tokio::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(3600), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[test]
    fn engine_rejects_unregistered_registrar() {
        let config = SyncConfig::new("alice", "ENCRYPTED:blob", "home.example.com");
        let registry = Arc::new(RegistrarRegistry::new());
        let err = SyncEngine::new(config, registry, Arc::new(crate::log::TracingSink))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnsupportedRegistrar { .. }));
    }
}
