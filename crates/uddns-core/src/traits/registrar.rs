// # Registrar Client Trait
//
// Defines the capability set every registrar integration implements.
//
// ## Implementations
//
// - Name.com: `uddns-registrar-namecom` crate
//
// ## Usage
//
// ```rust,ignore
// use uddns_core::RegistrarClient;
//
// let ip = client.current_ip(&cancel).await?;
// client.authenticate(&credentials, &cancel).await?;
// let main = client.resolve_main_domain(credentials.domain(), &cancel).await?;
// let records = client.list_records(&main, credentials.domain(), &cancel).await?;
// client.reconcile_records(&records, &ip, credentials.domain(), &main, &cancel).await?;
// client.logout(&cancel).await?;
// ```

use crate::config::Credentials;
use crate::domain::{CurrentIp, MainDomain};
use crate::error::Result;
use crate::records::RecordSet;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait for registrar client implementations
///
/// One instance serves one polling cycle or one validation run. It owns the
/// session token for that run and nothing else survives it.
///
/// Every operation is a cancellation point: when `cancel` fires, an in-flight
/// request is abandoned and the call returns [`crate::Error::Cancelled`].
///
/// # State machine
///
/// `Unauthenticated → Authenticated → DomainResolved → RecordsListed →
/// [Reconciled] → LoggedOut`. Clients do not enforce the order themselves;
/// out-of-order calls fail upstream.
///
/// # Retries
///
/// Implementations perform single-shot requests and never retry. The
/// [`crate::SyncEngine`] owns the retry interval.
#[async_trait]
pub trait RegistrarClient: Send {
    /// Ask the registrar which public IPv4 address the request came from
    ///
    /// Fails with a protocol error (302/303) when the field is missing or
    /// not a dotted quad.
    async fn current_ip(&mut self, cancel: &CancellationToken) -> Result<CurrentIp>;

    /// Decrypt the API token, log in and keep the session token
    ///
    /// The decrypted token must be dropped (and scrubbed) before returning.
    /// A token that fails to decrypt is treated as empty.
    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Find the account-owned domain that `domain` lives under
    async fn resolve_main_domain(
        &mut self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<MainDomain>;

    /// List the A and CNAME records named exactly `domain`
    ///
    /// An empty set is a valid result.
    async fn list_records(
        &mut self,
        main_domain: &MainDomain,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<RecordSet>;

    /// Bring `records` in line with `ip`
    ///
    /// Creates an A record for `ip` when none holds it, then deletes every
    /// record whose content differs. Creation always precedes deletion.
    async fn reconcile_records(
        &mut self,
        records: &RecordSet,
        ip: &CurrentIp,
        domain: &str,
        main_domain: &MainDomain,
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary>;

    /// Invalidate the session token
    ///
    /// A no-op when not authenticated.
    async fn logout(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Registrar name (for logging)
    fn registrar_name(&self) -> &'static str;
}

/// Writes performed by [`RegistrarClient::reconcile_records`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Content of the created A record, if any
    pub created: Option<String>,
    /// Ids of deleted records, in deletion order
    pub deleted: Vec<String>,
}

impl ReconcileSummary {
    /// Whether any write happened
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.deleted.is_empty()
    }
}

/// Constructs a fresh registrar client per cycle
pub trait RegistrarFactory: Send + Sync {
    /// Create a client with no session
    fn create(&self) -> Result<Box<dyn RegistrarClient>>;
}
