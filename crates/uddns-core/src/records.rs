//! Record sets and reconciliation planning
//!
//! A [`RecordSet`] is rebuilt from the registrar's authoritative listing every
//! cycle. [`ReconcilePlan`] turns it into the minimal create-then-delete
//! sequence that leaves exactly one A record holding the current IP.

use crate::domain::CurrentIp;

/// Record types the updater recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// IPv4 address record (the only type ever created)
    A,
    /// Alias record, recognized so that it can be replaced
    Cname,
}

impl RecordKind {
    /// Parse a registrar type string; other types are ignored
    pub fn from_type(record_type: &str) -> Option<Self> {
        match record_type.trim().to_ascii_uppercase().as_str() {
            "A" => Some(RecordKind::A),
            "CNAME" => Some(RecordKind::Cname),
            _ => None,
        }
    }
}

/// One record held by the registrar for the target domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Registrar-assigned record id
    pub id: String,
    /// Record type
    pub kind: RecordKind,
    /// IP address or CNAME target
    pub content: String,
}

/// Records for exactly the target domain, keyed by record id
///
/// Listing order is preserved; inserting an existing id replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<DnsRecord>,
}

impl RecordSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a raw registrar listing
    ///
    /// Keeps only entries whose name equals `domain` (case-insensitive, a
    /// trailing dot ignored) and whose type is A or CNAME. Each item is
    /// `(record_id, name, type, content)`.
    pub fn from_listing<'a, I>(domain: &str, listing: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a str, &'a str)>,
    {
        let mut set = Self::new();
        for (id, name, record_type, content) in listing {
            if !name.trim_end_matches('.').eq_ignore_ascii_case(domain) {
                continue;
            }
            if let Some(kind) = RecordKind::from_type(record_type) {
                set.insert(DnsRecord {
                    id: id.to_string(),
                    kind,
                    content: content.to_string(),
                });
            }
        }
        set
    }

    /// Insert a record, replacing any record with the same id
    pub fn insert(&mut self, record: DnsRecord) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate in listing order
    pub fn iter(&self) -> impl Iterator<Item = &DnsRecord> {
        self.records.iter()
    }

    /// Content of the record with `id`
    pub fn get(&self, id: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.content.as_str())
    }

    /// Whether any record already holds `ip`
    pub fn contains_content(&self, ip: &CurrentIp) -> bool {
        self.records.iter().any(|r| r.content == ip.as_str())
    }

    /// Exactly one record, and it holds `ip`
    pub fn is_in_sync(&self, ip: &CurrentIp) -> bool {
        matches!(self.records.as_slice(), [only] if only.content == ip.as_str())
    }

    /// Comma-separated contents, for debug logging
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// The writes needed to bring a record set in line with the current IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Content of the A record to create, if none holds the IP yet
    pub create: Option<String>,
    /// Ids of records whose content differs from the IP
    pub delete: Vec<String>,
}

impl ReconcilePlan {
    /// Plan the create-before-delete sequence
    ///
    /// Creation happens only when no record already holds `ip`, and every
    /// record with different content is deleted afterwards, so the domain is
    /// never left without an A record if a delete fails partway.
    pub fn for_records(records: &RecordSet, ip: &CurrentIp) -> Self {
        let create = (!records.contains_content(ip)).then(|| ip.as_str().to_string());
        let delete = records
            .iter()
            .filter(|r| r.content != ip.as_str())
            .map(|r| r.id.clone())
            .collect();

        Self { create, delete }
    }

    /// Whether nothing needs to be written
    pub fn is_noop(&self) -> bool {
        self.create.is_none() && self.delete.is_empty()
    }
}
