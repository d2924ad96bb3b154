//! Credential validation driver
//!
//! Runs Authenticate → ResolveMainDomain → (ListRecords) → Logout once, for
//! checking a proposed configuration before it is committed. Unlike the
//! engine it never retries and reports to the caller instead of the event
//! log.

use crate::config::{Credentials, validate_domain_name};
use crate::domain::MainDomain;
use crate::error::{Error, ErrorReport, Result, codes};
use crate::registry::RegistrarRegistry;
use crate::traits::RegistrarClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Validation steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStep {
    Authenticating,
    ResolvingDomain,
    ListingRecords,
    LoggingOut,
    Complete,
}

impl ValidationStep {
    /// Progress percentage reported when the step starts
    pub fn percent(self) -> u8 {
        match self {
            ValidationStep::Authenticating => 10,
            ValidationStep::ResolvingDomain => 20,
            ValidationStep::ListingRecords => 25,
            ValidationStep::LoggingOut => 30,
            ValidationStep::Complete => 100,
        }
    }

    /// Short label for status displays
    pub fn label(self) -> &'static str {
        match self {
            ValidationStep::Authenticating => "Authenticating",
            ValidationStep::ResolvingDomain => "Resolving main domain",
            ValidationStep::ListingRecords => "Listing records",
            ValidationStep::LoggingOut => "Logging out",
            ValidationStep::Complete => "Done",
        }
    }
}

/// Receives step-by-step progress
pub trait ProgressSink: Send + Sync {
    /// Called as each step starts
    fn report(&self, step: ValidationStep, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(ValidationStep, u8) + Send + Sync,
{
    fn report(&self, step: ValidationStep, percent: u8) {
        self(step, percent)
    }
}

/// Result of a validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The credentials work and the account owns the domain
    Valid {
        /// Resolved main domain
        main_domain: MainDomain,
        /// Number of existing records, when listing was requested
        record_count: Option<usize>,
    },
    /// The first failure, ready for display
    Failed(ErrorReport),
    /// The caller cancelled mid-flight
    Cancelled,
}

/// Synchronous, user-facing variant of the sync cycle
pub struct CredentialValidator {
    registry: Arc<RegistrarRegistry>,
    list_records: bool,
    timeout: Option<Duration>,
}

impl CredentialValidator {
    /// Create a validator that also lists records
    pub fn new(registry: Arc<RegistrarRegistry>) -> Self {
        Self {
            registry,
            list_records: true,
            timeout: None,
        }
    }

    /// Whether to include the record listing step
    pub fn with_list_records(mut self, list_records: bool) -> Self {
        self.list_records = list_records;
        self
    }

    /// Bound the whole run; exceeding it reports code 205, not cancellation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate `credentials` against `registrar`
    pub async fn run(
        &self,
        registrar: &str,
        credentials: &Credentials,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        let result = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.validate(registrar, credentials, progress, cancel))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Transport {
                        url: String::new(),
                        details: format!(
                            "Validation against {} did not finish within {:?}",
                            registrar, limit
                        ),
                        timed_out: true,
                    }),
                }
            }
            None => self.validate(registrar, credentials, progress, cancel).await,
        };

        match result {
            Ok((main_domain, record_count)) => {
                progress.report(ValidationStep::Complete, ValidationStep::Complete.percent());
                ValidationOutcome::Valid {
                    main_domain,
                    record_count,
                }
            }
            Err(e) if e.is_cancelled() => ValidationOutcome::Cancelled,
            Err(e) => {
                let url = if e.wants_registrar_help() {
                    self.registry.info_url(registrar)
                } else {
                    None
                };
                ValidationOutcome::Failed(e.report(url))
            }
        }
    }

    /// Drive [`CredentialValidator::run`] on a private current-thread runtime
    ///
    /// For callers without a runtime. Must not be called from within one.
    pub fn run_blocking(
        &self,
        registrar: &str,
        credentials: &Credentials,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> std::io::Result<ValidationOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run(registrar, credentials, progress, cancel)))
    }

    async fn validate(
        &self,
        registrar: &str,
        credentials: &Credentials,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(MainDomain, Option<usize>)> {
        credentials.check_present()?;
        validate_domain_name(credentials.domain())?;
        let mut client = self.registry.create(registrar)?;

        let step = |s: ValidationStep| {
            debug!(step = s.label(), "Validation step");
            progress.report(s, s.percent());
        };

        step(ValidationStep::Authenticating);
        client.authenticate(credentials, cancel).await?;

        let checked = match self
            .check_account(client.as_mut(), credentials, &step, cancel)
            .await
        {
            Ok(checked) => checked,
            Err(e) => {
                if !e.is_cancelled() {
                    if let Err(logout_err) = client.logout(cancel).await {
                        debug!(error = %logout_err, "Logout after failed validation also failed");
                    }
                }
                return Err(e);
            }
        };

        step(ValidationStep::LoggingOut);
        if let Err(e) = client.logout(cancel).await {
            if e.is_cancelled() {
                return Err(e);
            }
            warn!(code = e.code(), "Logout failed after successful validation: {}", e);
        }

        Ok(checked)
    }

    async fn check_account(
        &self,
        client: &mut dyn RegistrarClient,
        credentials: &Credentials,
        step: &(dyn Fn(ValidationStep) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(MainDomain, Option<usize>)> {
        step(ValidationStep::ResolvingDomain);
        let main_domain = client
            .resolve_main_domain(credentials.domain(), cancel)
            .await?;

        let record_count = if self.list_records {
            step(ValidationStep::ListingRecords);
            let records = client
                .list_records(&main_domain, credentials.domain(), cancel)
                .await?;
            Some(records.len())
        } else {
            None
        };

        Ok((main_domain, record_count))
    }
}

impl ValidationOutcome {
    /// Code of the failure, if any
    pub fn code(&self) -> Option<u16> {
        match self {
            ValidationOutcome::Failed(report) => Some(report.code),
            _ => None,
        }
    }

    /// Whether the run ended because of a timeout
    pub fn is_timeout(&self) -> bool {
        self.code() == Some(codes::TIMEOUT)
    }
}
