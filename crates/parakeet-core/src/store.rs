//! Interest-group storage engine
//!
//! Persists interest memberships keyed by owning origin, with per-interest
//! expiration and reader lists. Writes merge: reader sets union idempotently,
//! business names and expirations are last-write-wins. Reads are expiry-aware
//! projections that never mutate the record; expired entries are only
//! physically pruned by the next write that rewrites their namespace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interests::AdInterests;
use crate::storage::StorageBackend;
use crate::types::{SecureOrigin, Timestamp};
use crate::{ParakeetError, Result};

// ----------------------------------------------------------------------------
// Persisted Record Types
// ----------------------------------------------------------------------------

/// A single stored interest: when it lapses and who may read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRecord {
    /// Absolute expiration, unix seconds. Always the value from the most
    /// recent store call; never extended or merged across calls.
    pub expiration: Timestamp,
    /// Readers permitted to observe this interest. Duplicate-free,
    /// insertion-ordered.
    #[serde(default)]
    pub readers: Vec<String>,
}

impl InterestRecord {
    fn new(expiration: Timestamp) -> Self {
        Self {
            expiration,
            readers: Vec::new(),
        }
    }

    /// Whether this record is visible to reads at `now`
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expiration > now
    }

    /// Add a reader if not already present (idempotent union)
    fn add_reader(&mut self, reader: &str) {
        if !self.readers.iter().any(|r| r == reader) {
            self.readers.push(reader.to_string());
        }
    }
}

/// Everything stored for one owning origin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginNamespace {
    /// Vanity business name, last-write-wins; an empty write never clears it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business: Option<String>,
    /// Interests recorded under this origin
    #[serde(default)]
    pub interests: BTreeMap<String, InterestRecord>,
}

/// The whole persisted record: origin → namespace
pub type StoredInterests = BTreeMap<SecureOrigin, OriginNamespace>;

// ----------------------------------------------------------------------------
// Reader-Indexed Projection
// ----------------------------------------------------------------------------

/// Live interests visible to one reader, grouped by owning origin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInterests {
    /// origin → interests the reader may observe there
    pub interests: BTreeMap<SecureOrigin, Vec<String>>,
}

/// The canonical read projection: reader → interests per origin.
///
/// This is the shape the anonymization payload is built from, one entry per
/// destination reader.
pub type ReaderIndex = BTreeMap<String, ReaderInterests>;

// ----------------------------------------------------------------------------
// Interest Store
// ----------------------------------------------------------------------------

/// Storage engine over a byte-level backend.
///
/// Every mutation is a full read-modify-write of the persisted blob. The
/// engine itself is single-threaded; hosts with concurrent callers must put
/// it behind a single-writer serialization point to keep the merge
/// invariants, since interleaved read-modify-write cycles can lose updates.
#[derive(Debug)]
pub struct InterestStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> InterestStore<B> {
    /// Create a store over `backend`
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Record interest memberships for `secure_origin`.
    ///
    /// Ensures the origin's namespace, applies last-write-wins to the
    /// business name and every touched expiration, unions readers
    /// idempotently, prunes entries that had already lapsed at `now`, and
    /// persists the whole record before returning.
    pub fn store_interest_group(
        &mut self,
        record: &AdInterests,
        duration_secs: u64,
        secure_origin: &SecureOrigin,
        now: Timestamp,
    ) -> Result<()> {
        if duration_secs == 0 {
            return Err(ParakeetError::validation(
                "duration must be greater than zero",
            ));
        }

        let mut stored = self.load()?;

        // Namespace by the verified secure origin, never the advertiser
        // origin declared inside the record.
        let namespace = stored.entry(secure_origin.clone()).or_default();

        // Latest non-empty business name clobbers any previous one; this is
        // a vanity value only.
        if let Some(business) = record.business.as_deref().filter(|b| !b.is_empty()) {
            namespace.business = Some(business.to_string());
        }

        let expiration = now.add_seconds(duration_secs);
        for interest in &record.interests {
            let entry = namespace
                .interests
                .entry(interest.clone())
                .or_insert_with(|| InterestRecord::new(expiration));

            // A previous expiration does not matter; the new one is the limit.
            entry.expiration = expiration;

            // Multiple joins can accumulate different readers per interest
            // over time.
            for reader in &record.readers {
                entry.add_reader(reader);
            }
        }

        // Rewriting this namespace is the moment lapsed entries get dropped
        // for real; reads only ever hide them.
        namespace.interests.retain(|_, rec| rec.is_live(now));

        debug!(
            origin = %secure_origin,
            interests = record.interests.len(),
            readers = record.readers.len(),
            "stored interest group"
        );

        self.persist(&stored)
    }

    /// Project all live interests at `now`, indexed per destination reader.
    ///
    /// Pure with respect to stored state and the clock: repeated calls with
    /// the same `now` return identical output and never touch the record.
    pub fn interest_groups(&self, now: Timestamp) -> Result<ReaderIndex> {
        let stored = self.load()?;
        let mut joined: ReaderIndex = BTreeMap::new();

        for (origin, namespace) in &stored {
            for (interest, record) in &namespace.interests {
                if !record.is_live(now) {
                    continue;
                }
                for reader in &record.readers {
                    joined
                        .entry(reader.clone())
                        .or_default()
                        .interests
                        .entry(origin.clone())
                        .or_default()
                        .push(interest.clone());
                }
            }
        }

        Ok(joined)
    }

    /// Decode the full persisted record (expired entries included)
    pub fn snapshot(&self) -> Result<StoredInterests> {
        self.load()
    }

    fn load(&self) -> Result<StoredInterests> {
        let raw = self
            .backend
            .load()
            .map_err(ParakeetError::Storage)?;
        match raw {
            None => Ok(StoredInterests::new()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ParakeetError::storage_corrupted(e.to_string())),
        }
    }

    fn persist(&mut self, stored: &StoredInterests) -> Result<()> {
        let bytes = serde_json::to_vec(stored)?;
        self.backend.store(bytes).map_err(ParakeetError::Storage)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
