use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Catalog shipped with the deployment; overridden with `CATALOG_PATH`.
const DEFAULT_CATALOG: &str = include_str!("../catalog.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub price: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("duplicate product id {0} in catalog")]
    DuplicateId(u32),
    #[error("catalog contains no products")]
    Empty,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown product id {0}")]
pub struct UnknownProduct(pub i64);

/// Read-only product mapping, loaded once at startup. Lookups go through the
/// id index; listing preserves catalog definition order.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<u32, usize>,
}

impl Catalog {
    /// Loads from `CATALOG_PATH` when set, otherwise the embedded fixture.
    /// Any misconfiguration here is fatal to startup, not a per-request error.
    pub fn load() -> Result<Self, CatalogError> {
        match std::env::var("CATALOG_PATH") {
            Ok(path) => {
                log::info!("Loading catalog from {}", path);
                Self::from_yaml(&std::fs::read_to_string(path)?)
            }
            Err(_) => Self::from_yaml(DEFAULT_CATALOG),
        }
    }

    pub fn from_yaml(source: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_yaml::from_str(source)?;
        Self::new(entries)
    }

    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut by_id = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id, idx).is_some() {
                return Err(CatalogError::DuplicateId(entry.id));
            }
        }
        Ok(Self { entries, by_id })
    }

    pub fn lookup(&self, class_id: i64) -> Result<&CatalogEntry, UnknownProduct> {
        u32::try_from(class_id)
            .ok()
            .and_then(|id| self.by_id.get(&id))
            .map(|&idx| &self.entries[idx])
            .ok_or(UnknownProduct(class_id))
    }

    /// Entries in catalog definition order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| i64::from(e.id)).collect()
    }
}
