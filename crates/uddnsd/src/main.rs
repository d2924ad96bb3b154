// # uddnsd - registrar DDNS daemon
//
// A thin host around `uddns-core`. It is responsible for:
// 1. Reading configuration from the environment or a JSON file
// 2. Initializing tracing and the runtime
// 3. Protecting the API token and registering registrars
// 4. Optionally validating the credentials once
// 5. Running the sync engine until SIGTERM/SIGINT
//
// All synchronization logic lives in `uddns-core`.
//
// ## Configuration
//
// ### Sync settings (ignored when `UDDNS_CONFIG_FILE` is set)
// - `UDDNS_REGISTRAR`: Registrar name (default: Name.com)
// - `UDDNS_USERNAME`: Registrar API user name
// - `UDDNS_API_TOKEN`: API token, preferably in `ENCRYPTED:` form
// - `UDDNS_DOMAIN`: Fully qualified domain name to keep updated
// - `UDDNS_INTERVAL_MINUTES`: Minutes between cycles (default: 5)
// - `UDDNS_INTERVAL_ERROR_MINUTES`: Minutes between cycles after a failure
// - `UDDNS_DEBUG`: Emit an entry per step (true/false)
// - `UDDNS_SKIP_UNCHANGED_IP`: Skip cycles while the IP is unchanged
//
// ### Host settings
// - `UDDNS_CONFIG_FILE`: JSON file holding the sync settings
// - `UDDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `UDDNS_VALIDATE_ON_START`: Check the credentials before the first cycle
// - `UDDNS_MACHINE_ID_PATH`: Machine identifier used to protect the token
//
// ## Example
//
// ```bash
// export UDDNS_USERNAME=alice
// export UDDNS_API_TOKEN=ENCRYPTED:...
// export UDDNS_DOMAIN=home.example.com
// export UDDNS_INTERVAL_MINUTES=10
//
// uddnsd
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use uddns_core::{
    ChannelSink, CredentialValidator, ENCRYPTED_PREFIX, LogEntry, LogSink, MachineKeyProtector,
    RegistrarRegistry, SecretProtector, SyncConfig, SyncEngine, TracingSink, ValidationOutcome,
    ValidationStep, protect_token,
};
use zeroize::Zeroizing;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the engine may take to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for the start-up credential check
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Engine log entries buffered before they are dropped
const LOG_CHANNEL_CAPACITY: usize = 256;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum UddnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<UddnsExitCode> for ExitCode {
    fn from(code: UddnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Everything the daemon reads at start-up
#[derive(Debug)]
struct HostConfig {
    sync: SyncConfig,
    log_level: Level,
    validate_on_start: bool,
    machine_id_path: Option<PathBuf>,
}

impl HostConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let sync = match lookup("UDDNS_CONFIG_FILE").filter(|p| !p.trim().is_empty()) {
            Some(path) => SyncConfig::from_json_file(path.trim())?,
            None => {
                let mut sync = SyncConfig::new(
                    lookup("UDDNS_USERNAME").unwrap_or_default(),
                    lookup("UDDNS_API_TOKEN").unwrap_or_default(),
                    lookup("UDDNS_DOMAIN").unwrap_or_default(),
                );
                if let Some(registrar) = lookup("UDDNS_REGISTRAR") {
                    sync = sync.with_registrar(registrar.trim());
                }
                if let Some(minutes) =
                    parse_minutes("UDDNS_INTERVAL_MINUTES", lookup("UDDNS_INTERVAL_MINUTES"))?
                {
                    sync.interval_minutes = minutes;
                }
                sync.interval_error_minutes = parse_minutes(
                    "UDDNS_INTERVAL_ERROR_MINUTES",
                    lookup("UDDNS_INTERVAL_ERROR_MINUTES"),
                )?;
                sync.debug = parse_flag("UDDNS_DEBUG", lookup("UDDNS_DEBUG"))?;
                sync.skip_unchanged_ip =
                    parse_flag("UDDNS_SKIP_UNCHANGED_IP", lookup("UDDNS_SKIP_UNCHANGED_IP"))?;
                sync
            }
        };

        let log_level = match lookup("UDDNS_LOG_LEVEL") {
            Some(level) => level.trim().parse::<Level>().map_err(|_| {
                anyhow::anyhow!(
                    "UDDNS_LOG_LEVEL '{}' is not valid. \
                    Valid levels: trace, debug, info, warn, error",
                    level
                )
            })?,
            None => Level::INFO,
        };

        Ok(Self {
            sync,
            log_level,
            validate_on_start: parse_flag(
                "UDDNS_VALIDATE_ON_START",
                lookup("UDDNS_VALIDATE_ON_START"),
            )?,
            machine_id_path: lookup("UDDNS_MACHINE_ID_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Tracing level, raised to debug when per-step entries are requested
    fn effective_log_level(&self) -> Level {
        if self.sync.debug && self.log_level != Level::TRACE {
            Level::DEBUG
        } else {
            self.log_level
        }
    }
}

fn parse_minutes(name: &str, value: Option<String>) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.trim().parse::<u64>().with_context(|| {
                format!("{} must be a whole number of minutes. Got: '{}'", name, v)
            })
        })
        .transpose()
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: '{}'", name, value),
    }
}

/// Replace a plaintext API token with its protected form
///
/// Returns whether the token was changed. The plaintext copy is zeroized.
fn protect_plaintext_token(sync: &mut SyncConfig, protector: &dyn SecretProtector) -> Result<bool> {
    let token = sync.api_token.trim();
    if token.is_empty() || token.starts_with(ENCRYPTED_PREFIX) {
        return Ok(false);
    }

    let plaintext = Zeroizing::new(std::mem::take(&mut sync.api_token));
    sync.api_token = protect_token(protector, plaintext.trim())?;
    Ok(true)
}

fn main() -> ExitCode {
    let mut config = match HostConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return UddnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.sync.validate() {
        eprintln!("Configuration validation error: {}", e.report(None));
        return UddnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.effective_log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return UddnsExitCode::ConfigError.into();
    }

    info!("Starting uddnsd daemon");
    info!(config = ?config.sync, "Configuration loaded");

    let protector = match MachineKeyProtector::from_machine_id(config.machine_id_path.as_deref()) {
        Ok(protector) => Arc::new(protector),
        Err(e) => {
            error!("Unable to derive the machine key: {}", e.report(None));
            return UddnsExitCode::ConfigError.into();
        }
    };

    match protect_plaintext_token(&mut config.sync, protector.as_ref()) {
        Ok(true) => warn!(
            "UDDNS_API_TOKEN was given in plaintext. Store this value instead: {}",
            config.sync.api_token
        ),
        Ok(false) => {}
        Err(e) => {
            error!("Unable to protect the API token: {}", e);
            return UddnsExitCode::ConfigError.into();
        }
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return UddnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(config, protector).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return UddnsExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            UddnsExitCode::RuntimeError
        } else {
            UddnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// A started daemon: the engine plus the receiving end of its log channel
struct Daemon {
    engine: SyncEngine,
    log_rx: mpsc::Receiver<LogEntry>,
}

impl Daemon {
    /// Wire the registry, optionally validate, and build the engine
    async fn start(config: HostConfig, protector: Arc<MachineKeyProtector>) -> Result<Self> {
        let registry = Arc::new(RegistrarRegistry::new());
        uddns_registrar_namecom::register(&registry, protector)?;
        for entry in registry.entries() {
            info!("Registrar available: {}", entry.display_label());
        }

        let HostConfig {
            sync,
            validate_on_start,
            ..
        } = config;

        if validate_on_start {
            validate_credentials(&registry, &sync).await?;
        }

        let (sink, log_rx) = ChannelSink::new(LOG_CHANNEL_CAPACITY);
        let engine = SyncEngine::new(sync, registry, Arc::new(sink))?;

        Ok(Self { engine, log_rx })
    }

    /// Run the engine until a shutdown signal arrives
    async fn run(self) -> Result<()> {
        let Daemon { mut engine, mut log_rx } = self;
        let cancel = CancellationToken::new();

        let drain = tokio::spawn(async move {
            let sink = TracingSink;
            while let Some(entry) = log_rx.recv().await {
                sink.record(entry);
            }
        });

        let mut engine_task = tokio::spawn({
            let cancel = cancel.clone();
            async move { engine.run(cancel).await }
        });

        info!("Daemon initialized successfully");

        tokio::select! {
            signal = wait_for_shutdown() => {
                cancel.cancel();
                let signal = signal?;
                info!("Received shutdown signal: {}", signal);
            }
            joined = &mut engine_task => {
                cancel.cancel();
                return Err(match joined {
                    Ok(()) => anyhow::anyhow!("Sync engine stopped unexpectedly"),
                    Err(e) => anyhow::anyhow!("Sync engine task failed: {}", e),
                });
            }
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => anyhow::bail!("Sync engine task failed: {}", e),
            Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
        }

        // The engine held the only sender, so the drain ends once it is gone.
        if let Err(e) = drain.await {
            warn!("Log drain ended abnormally: {}", e);
        }

        info!("Shutting down daemon");
        Ok(())
    }
}

/// Check the credentials once before the first cycle
async fn validate_credentials(registry: &Arc<RegistrarRegistry>, sync: &SyncConfig) -> Result<()> {
    let validator = CredentialValidator::new(Arc::clone(registry)).with_timeout(VALIDATION_TIMEOUT);
    let progress = |step: ValidationStep, percent: u8| info!(percent, "{}", step.label());

    match validator
        .run(
            &sync.registrar,
            &sync.credentials(),
            &progress,
            &CancellationToken::new(),
        )
        .await
    {
        ValidationOutcome::Valid {
            main_domain,
            record_count,
        } => {
            info!(
                main_domain = %main_domain,
                records = ?record_count,
                "Credentials validated"
            );
            Ok(())
        }
        ValidationOutcome::Failed(report) => {
            anyhow::bail!("Credential validation failed\n{}", report)
        }
        ValidationOutcome::Cancelled => anyhow::bail!("Credential validation cancelled"),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
