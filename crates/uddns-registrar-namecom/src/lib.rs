// # Name.com Registrar Client
//
// This crate provides the Name.com registrar client for the UDDNS updater.
//
// ## Behavior
//
// - One HTTP request per operation step; no retries (the engine owns them)
// - HTTP timeout of 10 seconds, reported as code 205
// - Every response must carry `result.code == 100`; anything else is a
//   registrar-reported failure (203) carrying the upstream message
// - Client IP and session token are checked against strict patterns before
//   use
//
// ## Security Requirements
//
// - The API token is decrypted only inside `authenticate`; the decrypted
//   bytes and the serialized login body are zeroized on drop up to the
//   point the body buffer is moved into the HTTP request. The buffer owned
//   by reqwest after that hand-off is not scrubbed.
// - Neither the API token nor the session token ever appears in logs
//
// ## API Reference
//
// - Client IP: GET `/api/hello`
// - Login: POST `/api/login` `{username, api_token}`
// - Domains: GET `/api/domain/list`
// - Records: GET `/api/dns/list/:domain`
// - Create: POST `/api/dns/create/:domain`
// - Delete: POST `/api/dns/delete/:domain` `{record_id}`
// - Logout: GET `/api/logout`

pub mod transport;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use transport::{ApiRequest, Method, ReqwestTransport, Transport};
use uddns_core::error::codes;
use uddns_core::{
    Credentials, CurrentIp, Error, MainDomain, ReconcilePlan, ReconcileSummary, RecordSet,
    RegistrarClient, RegistrarFactory, RegistrarRegistry, Result, SecretProtector,
};
use zeroize::Zeroizing;

/// Registry name
pub const REGISTRAR_NAME: &str = "Name.com";

/// Signup page shown next to the registrar name
pub const INFO_URL: &str = "http://name.com/reseller";

/// Name.com API base URL
pub const API_BASE: &str = "https://api.name.com";

const PATH_HELLO: &str = "/api/hello";
const PATH_LOGIN: &str = "/api/login";
const PATH_DOMAIN_LIST: &str = "/api/domain/list";
const PATH_DNS_LIST: &str = "/api/dns/list/";
const PATH_DNS_CREATE: &str = "/api/dns/create/";
const PATH_DNS_DELETE: &str = "/api/dns/delete/";
const PATH_LOGOUT: &str = "/api/logout";

/// Embedded status code of a successful response
const RESULT_OK: i64 = 100;

/// TTL and priority sent with created records
const RECORD_TTL: &str = "300";
const RECORD_PRIORITY: &str = "10";

static SESSION_TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{10,46}$").expect("valid session token pattern"));

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    api_token: &'a str,
}

#[derive(Serialize)]
struct CreateRecordBody<'a> {
    hostname: &'a str,
    #[serde(rename = "type")]
    record_type: &'a str,
    content: &'a str,
    ttl: &'a str,
    priority: &'a str,
}

#[derive(Serialize)]
struct DeleteRecordBody<'a> {
    record_id: &'a str,
}

/// Name.com registrar client
///
/// One instance per cycle. The session token lives only in this instance.
pub struct NameComClient {
    transport: Arc<dyn Transport>,
    protector: Arc<dyn SecretProtector>,
    base_url: String,
    session_token: Option<String>,
}

// Custom Debug implementation that hides the session token
impl std::fmt::Debug for NameComClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameComClient")
            .field("base_url", &self.base_url)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl NameComClient {
    /// Create an unauthenticated client
    pub fn new(transport: Arc<dyn Transport>, protector: Arc<dyn SecretProtector>) -> Self {
        Self {
            transport,
            protector,
            base_url: API_BASE.to_string(),
            session_token: None,
        }
    }

    /// Point the client at another API host (e.g. the Name.com sandbox)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a session token is held
    pub fn is_authenticated(&self) -> bool {
        self.session_token.is_some()
    }

    /// Perform one request and validate the embedded status envelope
    ///
    /// # Errors
    ///
    /// - 201/205: transport failure or timeout
    /// - 200: non-2xx HTTP status
    /// - 202: body is not JSON
    /// - 204: body lacks `result.code`
    /// - 203: `result.code` is not 100
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Zeroizing<Vec<u8>>>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(?method, url = %url, "Registrar request");

        let response = self
            .transport
            .send(
                ApiRequest {
                    method,
                    url: url.clone(),
                    body,
                    session_token: self.session_token.clone(),
                },
                cancel,
            )
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(Error::HttpStatus {
                status: response.status,
                url,
            });
        }

        let json: Value = serde_json::from_str(&response.body).map_err(|e| {
            Error::malformed(
                codes::INVALID_JSON,
                &url,
                format!("{}\nBody: {}", e, truncate(&response.body, 512)),
            )
        })?;

        let code = json
            .get("result")
            .and_then(|r| r.get("code"))
            .and_then(|c| c.as_i64().or_else(|| c.as_str()?.trim().parse().ok()));

        match code {
            None => Err(Error::malformed(
                codes::MISSING_ENVELOPE,
                &url,
                format!("JSON: {}", redacted(&json)),
            )),
            Some(RESULT_OK) => Ok(json),
            Some(code) => {
                let message = json["result"]["message"].as_str().unwrap_or("");
                Err(Error::protocol(
                    codes::REGISTRAR_STATUS,
                    format!("URL: {}\nCode {}: {}", url, code, message),
                ))
            }
        }
    }

    fn require_field<'a>(json: &'a Value, field: &str, path: &str) -> Result<&'a Value> {
        json.get(field).ok_or_else(|| {
            Error::malformed(
                codes::INVALID_JSON,
                path,
                format!("Response lacks '{}'. JSON: {}", field, redacted(json)),
            )
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::malformed(codes::INVALID_JSON, path, e.to_string()))?;
        self.request_json(Method::Post, path, Some(Zeroizing::new(body)), cancel)
            .await
    }
}

#[async_trait]
impl RegistrarClient for NameComClient {
    async fn current_ip(&mut self, cancel: &CancellationToken) -> Result<CurrentIp> {
        let json = self
            .request_json(Method::Get, PATH_HELLO, None, cancel)
            .await?;

        let client_ip = json["client_ip"].as_str().ok_or_else(|| {
            Error::protocol(
                codes::MISSING_CLIENT_IP,
                format!("URL: {}{}", self.base_url, PATH_HELLO),
            )
        })?;
        CurrentIp::parse(client_ip)
    }

    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.session_token = None;

        // A token that cannot be decrypted is treated as empty.
        let token = match self.protector.unprotect(credentials.api_token_encrypted()) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(code = e.code(), "Unable to decrypt API token: {}", e);
                Zeroizing::new(Vec::new())
            }
        };
        let token = std::str::from_utf8(&token).unwrap_or("");

        if credentials.user_name().is_empty() || token.is_empty() {
            return Err(Error::auth(
                codes::EMPTY_CREDENTIALS,
                "Username or API token is empty",
            ));
        }

        let body = LoginBody {
            username: credentials.user_name(),
            api_token: token,
        };
        let json = self.post(PATH_LOGIN, &body, cancel).await?;

        let session_token = json["session_token"].as_str().ok_or_else(|| {
            Error::auth(
                codes::MISSING_SESSION_TOKEN,
                "Login response lacks a session token",
            )
        })?;
        if !SESSION_TOKEN_PATTERN.is_match(session_token) {
            return Err(Error::auth(
                codes::INVALID_SESSION_TOKEN,
                format!("Session token of length {} is malformed", session_token.len()),
            ));
        }

        tracing::debug!(user = credentials.user_name(), "Authenticated");
        self.session_token = Some(session_token.to_string());
        Ok(())
    }

    async fn resolve_main_domain(
        &mut self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<MainDomain> {
        let json = self
            .request_json(Method::Get, PATH_DOMAIN_LIST, None, cancel)
            .await?;

        let domains = Self::require_field(&json, "domains", PATH_DOMAIN_LIST)?;
        let owned: Vec<&str> = match domains {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            // An account with no domains may serialize as an empty array.
            Value::Array(list) if list.is_empty() => Vec::new(),
            _ => {
                return Err(Error::malformed(
                    codes::INVALID_JSON,
                    PATH_DOMAIN_LIST,
                    format!("'domains' is not an object: {}", domains),
                ));
            }
        };

        tracing::debug!(count = owned.len(), "Account domains listed");
        uddns_core::resolve_main_domain(domain, &owned)
    }

    async fn list_records(
        &mut self,
        main_domain: &MainDomain,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<RecordSet> {
        let path = format!("{}{}", PATH_DNS_LIST, main_domain);
        let json = self.request_json(Method::Get, &path, None, cancel).await?;

        let records = Self::require_field(&json, "records", &path)?
            .as_array()
            .ok_or_else(|| {
                Error::malformed(codes::INVALID_JSON, &path, "'records' is not an array")
            })?;

        let mut listing = Vec::with_capacity(records.len());
        for record in records {
            let id = match &record["record_id"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            let field = |name: &str| record[name].as_str().unwrap_or("").to_string();
            listing.push((id, field("name"), field("type"), field("content")));
        }

        Ok(RecordSet::from_listing(
            domain,
            listing
                .iter()
                .map(|(id, name, kind, content)| (id.as_str(), name.as_str(), kind.as_str(), content.as_str())),
        ))
    }

    async fn reconcile_records(
        &mut self,
        records: &RecordSet,
        ip: &CurrentIp,
        domain: &str,
        main_domain: &MainDomain,
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        let plan = ReconcilePlan::for_records(records, ip);
        let mut summary = ReconcileSummary::default();

        if let Some(content) = plan.create {
            let path = format!("{}{}", PATH_DNS_CREATE, main_domain);
            let body = CreateRecordBody {
                hostname: main_domain.subdomain_of(domain),
                record_type: "A",
                content: &content,
                ttl: RECORD_TTL,
                priority: RECORD_PRIORITY,
            };
            self.post(&path, &body, cancel).await?;
            tracing::info!(domain, ip = %content, "Created A record");
            summary.created = Some(content);
        }

        let path = format!("{}{}", PATH_DNS_DELETE, main_domain);
        for id in plan.delete {
            self.post(&path, &DeleteRecordBody { record_id: &id }, cancel)
                .await?;
            tracing::info!(domain, record_id = %id, "Deleted stale record");
            summary.deleted.push(id);
        }

        Ok(summary)
    }

    async fn logout(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.session_token.is_none() {
            return Ok(());
        }

        let result = self
            .request_json(Method::Get, PATH_LOGOUT, None, cancel)
            .await;
        self.session_token = None;
        result.map(|_| ())
    }

    fn registrar_name(&self) -> &'static str {
        REGISTRAR_NAME
    }
}

/// Factory for creating Name.com clients
///
/// All clients share one HTTP connection pool; each gets its own session.
pub struct NameComFactory {
    transport: Arc<dyn Transport>,
    protector: Arc<dyn SecretProtector>,
    base_url: String,
}

impl NameComFactory {
    /// Factory using the production HTTP transport
    pub fn new(protector: Arc<dyn SecretProtector>) -> Result<Self> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new()?),
            protector,
        ))
    }

    /// Factory using a custom transport
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        protector: Arc<dyn SecretProtector>,
    ) -> Self {
        Self {
            transport,
            protector,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point created clients at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl RegistrarFactory for NameComFactory {
    fn create(&self) -> Result<Box<dyn RegistrarClient>> {
        Ok(Box::new(
            NameComClient::new(Arc::clone(&self.transport), Arc::clone(&self.protector))
                .with_base_url(self.base_url.clone()),
        ))
    }
}

/// Register the Name.com registrar with a registry
///
/// # Example
///
/// ```rust,ignore
/// let registry = RegistrarRegistry::new();
/// uddns_registrar_namecom::register(&registry, protector)?;
/// ```
pub fn register(registry: &RegistrarRegistry, protector: Arc<dyn SecretProtector>) -> Result<()> {
    registry.register(
        REGISTRAR_NAME,
        INFO_URL,
        Arc::new(NameComFactory::new(protector)?),
    );
    Ok(())
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

// Raw JSON goes into operator-visible details; never include a session token.
fn redacted(json: &Value) -> String {
    let mut json = json.clone();
    if let Some(token) = json.get_mut("session_token") {
        *token = Value::String("<REDACTED>".to_string());
    }
    json.to_string()
}
