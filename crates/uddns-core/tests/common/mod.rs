//! Test doubles and common utilities for contract tests
//!
//! This module provides a scripted in-memory registrar that records every
//! call, plus a log sink that keeps every entry for inspection.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uddns_core::error::{Error, Result};
use uddns_core::{
    Credentials, CurrentIp, LogEntry, LogSink, MainDomain, ReconcilePlan, ReconcileSummary,
    RecordSet, RegistrarClient, RegistrarFactory, RegistrarRegistry, Severity, SyncConfig,
};

pub const REGISTRAR: &str = "Mock";
pub const INFO_URL: &str = "https://registrar.example/signup";
pub const DOMAIN: &str = "home.example.com";

/// Registrar operations, used to script failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CurrentIp,
    Authenticate,
    ResolveMainDomain,
    ListRecords,
    Reconcile,
    Logout,
}

/// One observed call, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentIp,
    Authenticate { user_name: String },
    ResolveMainDomain { domain: String },
    ListRecords { main_domain: String },
    Create { content: String },
    Delete { id: String },
    Logout,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Create { .. } | Call::Delete { .. })
    }
}

/// What the fake registrar holds and how it misbehaves
struct MockState {
    ip: String,
    owned_domains: Vec<String>,
    records: Vec<(String, String)>,
    next_id: usize,
    calls: Vec<Call>,
    ip_queries: Vec<Instant>,
    failures: HashMap<Step, VecDeque<Error>>,
    hang_at: Option<Step>,
}

/// Handle shared by the test, the factory and every client it creates
#[derive(Clone)]
pub struct MockRegistrar {
    state: Arc<Mutex<MockState>>,
    clients_created: Arc<AtomicUsize>,
}

impl MockRegistrar {
    /// Registrar reporting `ip`, owning `example.com`, with no records
    pub fn new(ip: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                ip: ip.to_string(),
                owned_domains: vec!["example.com".to_string()],
                records: Vec::new(),
                next_id: 100,
                calls: Vec::new(),
                ip_queries: Vec::new(),
                failures: HashMap::new(),
                hang_at: None,
            })),
            clients_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_record(self, id: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .push((id.to_string(), content.to_string()));
        self
    }

    pub fn with_owned_domains(self, domains: &[&str]) -> Self {
        self.state.lock().unwrap().owned_domains = domains.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Fail the next call of `step` with `err`
    pub fn fail_next(&self, step: Step, err: Error) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(step)
            .or_default()
            .push_back(err);
    }

    /// Make `step` block until cancelled
    pub fn hang_at(&self, step: Step) {
        self.state.lock().unwrap().hang_at = Some(step);
    }

    pub fn set_ip(&self, ip: &str) {
        self.state.lock().unwrap().ip = ip.to_string();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Records currently held, as (id, content)
    pub fn records(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().records.clone()
    }

    /// When each current-IP query happened
    pub fn ip_queries(&self) -> Vec<Instant> {
        self.state.lock().unwrap().ip_queries.clone()
    }

    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> Arc<dyn RegistrarFactory> {
        Arc::new(MockFactory {
            registrar: self.clone(),
        })
    }

    /// Registry holding only this registrar
    pub fn registry(&self) -> Arc<RegistrarRegistry> {
        let registry = RegistrarRegistry::new();
        registry.register(REGISTRAR, INFO_URL, self.factory());
        Arc::new(registry)
    }

    fn record_call(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    /// Shared prologue: honor cancellation, hangs and scripted failures
    async fn enter(&self, step: Step, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (hang, failure) = {
            let mut state = self.state.lock().unwrap();
            let failure = state.failures.get_mut(&step).and_then(VecDeque::pop_front);
            (state.hang_at == Some(step), failure)
        };

        if hang {
            cancel.cancelled().await;
            return Err(Error::Cancelled);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct MockFactory {
    registrar: MockRegistrar,
}

impl RegistrarFactory for MockFactory {
    fn create(&self) -> Result<Box<dyn RegistrarClient>> {
        self.registrar.clients_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockClient {
            registrar: self.registrar.clone(),
        }))
    }
}

/// Factory whose client construction always fails with a fixed error
pub struct FailingFactory {
    error: Error,
    attempts: Arc<AtomicUsize>,
}

impl FailingFactory {
    /// Registry whose only registrar cannot build clients, plus an attempt counter
    pub fn registry(error: Error) -> (Arc<RegistrarRegistry>, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = RegistrarRegistry::new();
        registry.register(
            REGISTRAR,
            INFO_URL,
            Arc::new(FailingFactory {
                error,
                attempts: Arc::clone(&attempts),
            }),
        );
        (Arc::new(registry), attempts)
    }
}

impl RegistrarFactory for FailingFactory {
    fn create(&self) -> Result<Box<dyn RegistrarClient>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

pub struct MockClient {
    registrar: MockRegistrar,
}

#[async_trait]
impl RegistrarClient for MockClient {
    async fn current_ip(&mut self, cancel: &CancellationToken) -> Result<CurrentIp> {
        {
            let mut state = self.registrar.state.lock().unwrap();
            state.calls.push(Call::CurrentIp);
            state.ip_queries.push(Instant::now());
        }
        self.registrar.enter(Step::CurrentIp, cancel).await?;
        let ip = self.registrar.state.lock().unwrap().ip.clone();
        CurrentIp::parse(&ip)
    }

    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.registrar.record_call(Call::Authenticate {
            user_name: credentials.user_name().to_string(),
        });
        self.registrar.enter(Step::Authenticate, cancel).await
    }

    async fn resolve_main_domain(
        &mut self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<MainDomain> {
        self.registrar.record_call(Call::ResolveMainDomain {
            domain: domain.to_string(),
        });
        self.registrar.enter(Step::ResolveMainDomain, cancel).await?;
        let owned = self.registrar.state.lock().unwrap().owned_domains.clone();
        uddns_core::resolve_main_domain(domain, &owned)
    }

    async fn list_records(
        &mut self,
        main_domain: &MainDomain,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<RecordSet> {
        self.registrar.record_call(Call::ListRecords {
            main_domain: main_domain.to_string(),
        });
        self.registrar.enter(Step::ListRecords, cancel).await?;
        let records = self.registrar.records();
        Ok(RecordSet::from_listing(
            domain,
            records
                .iter()
                .map(|(id, content)| (id.as_str(), domain, "A", content.as_str())),
        ))
    }

    async fn reconcile_records(
        &mut self,
        records: &RecordSet,
        ip: &CurrentIp,
        _domain: &str,
        _main_domain: &MainDomain,
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        self.registrar.enter(Step::Reconcile, cancel).await?;
        let plan = ReconcilePlan::for_records(records, ip);
        let mut summary = ReconcileSummary::default();

        if let Some(content) = plan.create {
            let mut state = self.registrar.state.lock().unwrap();
            let id = format!("id{}", state.next_id);
            state.next_id += 1;
            state.records.push((id, content.clone()));
            state.calls.push(Call::Create {
                content: content.clone(),
            });
            summary.created = Some(content);
        }
        for id in plan.delete {
            let mut state = self.registrar.state.lock().unwrap();
            state.records.retain(|(existing, _)| *existing != id);
            state.calls.push(Call::Delete { id: id.clone() });
            summary.deleted.push(id);
        }

        Ok(summary)
    }

    async fn logout(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.registrar.record_call(Call::Logout);
        self.registrar.enter(Step::Logout, cancel).await
    }

    fn registrar_name(&self) -> &'static str {
        REGISTRAR
    }
}

/// Log sink that keeps every entry
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    pub fn errors(&self) -> Vec<LogEntry> {
        self.with_severity(Severity::Error)
    }
}

impl LogSink for RecordingSink {
    fn record(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Configuration for the mock registrar: 20 minute interval, 5 on error
pub fn mock_config() -> SyncConfig {
    SyncConfig::new("alice", "ENCRYPTED:c2VjcmV0", DOMAIN)
        .with_registrar(REGISTRAR)
        .with_intervals(20, Some(5))
}

/// Transport timeout as a registrar client would report it
pub fn timeout_error() -> Error {
    Error::Transport {
        url: "https://registrar.example/api/hello".to_string(),
        details: "operation timed out".to_string(),
        timed_out: true,
    }
}

/// The six-step sequence of a cycle that finds its records in sync
pub fn in_sync_calls() -> Vec<Call> {
    vec![
        Call::CurrentIp,
        Call::Authenticate {
            user_name: "alice".to_string(),
        },
        Call::ResolveMainDomain {
            domain: DOMAIN.to_string(),
        },
        Call::ListRecords {
            main_domain: "example.com".to_string(),
        },
        Call::Logout,
    ]
}
