//! Plugin-based registrar registry
//!
//! The registry maps a human-readable registrar name to a client factory and
//! an info URL. It is constructed explicitly and handed to the engine, so
//! tests can substitute their own registrars.
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In uddns-registrar-namecom
//! pub fn register(registry: &RegistrarRegistry, protector: Arc<dyn SecretProtector>) {
//!     registry.register(
//!         "Name.com",
//!         "http://name.com/reseller",
//!         Arc::new(NameComFactory::new(protector)),
//!     );
//! }
//! ```

use crate::error::{Error, Result};
use crate::traits::{RegistrarClient, RegistrarFactory};
use std::sync::{Arc, PoisonError, RwLock};

/// Presentation data for one registered registrar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarInfo {
    /// Registrar name as configured (e.g. "Name.com")
    pub name: String,
    /// Signup or help page shown next to the name
    pub info_url: String,
}

impl RegistrarInfo {
    /// Label for selection lists, e.g. "Name.com (http://name.com/reseller)"
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.info_url)
    }
}

struct Entry {
    info: RegistrarInfo,
    factory: Arc<dyn RegistrarFactory>,
}

/// Registry of registrar client factories
///
/// Entries keep registration order. Lookups are case-sensitive on the
/// registrar name; registering an existing name replaces it in place.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct RegistrarRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl RegistrarRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a registrar factory
    pub fn register(
        &self,
        name: impl Into<String>,
        info_url: impl Into<String>,
        factory: Arc<dyn RegistrarFactory>,
    ) {
        let info = RegistrarInfo {
            name: name.into(),
            info_url: info_url.into(),
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        match entries.iter_mut().find(|e| e.info.name == info.name) {
            Some(existing) => {
                existing.info = info;
                existing.factory = factory;
            }
            None => entries.push(Entry { info, factory }),
        }
    }

    /// Create a fresh client for `name`
    ///
    /// # Errors
    ///
    /// - `Error::Config` (103) when `name` is empty
    /// - `Error::UnsupportedRegistrar` when nothing is registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn RegistrarClient>> {
        let factory = self.factory(name)?;
        factory.create()
    }

    /// Look up the factory for `name`
    pub fn factory(&self, name: &str) -> Result<Arc<dyn RegistrarFactory>> {
        if name.trim().is_empty() {
            return Err(Error::config(
                crate::error::codes::EMPTY_REGISTRAR,
                "Registrar cannot be empty",
            ));
        }

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.info.name == name)
            .map(|e| Arc::clone(&e.factory))
            .ok_or_else(|| Error::UnsupportedRegistrar {
                name: name.to_string(),
            })
    }

    /// Check if a registrar is registered
    pub fn has_registrar(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().any(|e| e.info.name == name)
    }

    /// Info URL of a registrar, if registered
    pub fn info_url(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.info.name == name)
            .map(|e| e.info.info_url.clone())
    }

    /// All registrars in registration order
    pub fn entries(&self) -> Vec<RegistrarInfo> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.info.clone()).collect()
    }
}
