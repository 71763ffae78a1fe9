//! Process-local blob registry
//!
//! Creative payloads arrive from the trusted frame as raw bytes. Before
//! delivery to the caller they are converted into locally-resolvable `blob:`
//! references; the registry retains the bytes for the lifetime of the
//! context so the reference stays resolvable.

use std::sync::Arc;

use dashmap::DashMap;
use url::Url;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Blob Registry
// ----------------------------------------------------------------------------

/// Registry of retained creative payloads, addressed by `blob:<uuid>` URLs
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: DashMap<Uuid, Arc<Vec<u8>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain `bytes` and mint a reference that resolves to them
    pub fn publish(&self, bytes: Vec<u8>) -> Url {
        let id = Uuid::new_v4();
        self.blobs.insert(id, Arc::new(bytes));
        Url::parse(&format!("blob:{id}")).expect("blob URLs always parse")
    }

    /// Resolve a previously-minted reference
    pub fn resolve(&self, url: &Url) -> Option<Arc<Vec<u8>>> {
        if url.scheme() != "blob" {
            return None;
        }
        let id = Uuid::parse_str(url.path()).ok()?;
        self.blobs.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a retained payload; its reference stops resolving
    pub fn revoke(&self, url: &Url) -> bool {
        if url.scheme() != "blob" {
            return false;
        }
        match Uuid::parse_str(url.path()) {
            Ok(id) => self.blobs.remove(&id).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
