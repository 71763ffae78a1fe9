//! Core value types for the PARAKEET engine
//!
//! This module defines the fundamental types used throughout the engine,
//! using newtype patterns for semantic validation and type safety. Clock
//! access goes through the [`TimeSource`] trait so every expiry decision
//! stays injectable for tests.

use core::fmt;
use core::ops::{Add, Sub};
use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ParakeetError, Result};

// ----------------------------------------------------------------------------
// Secure Origin
// ----------------------------------------------------------------------------

/// ASCII serialization of a verified origin (`scheme://host[:port]`).
///
/// A `SecureOrigin` is only ever produced by the calling context or by the
/// transport layer. Origins declared inside untrusted payloads are never
/// promoted into one; that asymmetry is the storage trust boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecureOrigin(String);

impl SecureOrigin {
    /// Derive the origin of a parsed URL.
    ///
    /// Opaque origins (`about:blank`, `data:`, ...) have no storage identity
    /// and are rejected.
    pub fn from_url(url: &Url) -> Result<Self> {
        let origin = url.origin();
        if !matches!(origin, url::Origin::Tuple(..)) {
            return Err(ParakeetError::validation(format!(
                "URL '{url}' has an opaque origin and cannot namespace storage"
            )));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// Get the serialized origin string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecureOrigin {
    type Err = ParakeetError;

    fn from_str(s: &str) -> Result<Self> {
        let url = Url::parse(s)
            .map_err(|e| ParakeetError::validation(format!("invalid origin '{s}': {e}")))?;
        Self::from_url(&url)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Unix timestamp in whole seconds.
///
/// The persisted interest record stores expirations in unix seconds, so the
/// whole engine counts in seconds rather than milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from unix seconds
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current wall-clock timestamp
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_secs())
    }

    /// Get the raw seconds
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to this timestamp
    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0.saturating_add(seconds))
    }
}

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(other))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing timestamps to store and session logic.
///
/// Implementations should provide monotonic timestamps when possible.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard wall-clock implementation of [`TimeSource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually-advanced clock for deterministic tests.
///
/// Clones share the same underlying instant, so a test can hold one handle
/// while the engine under test holds another.
#[derive(Debug, Clone, Default)]
pub struct FixedTimeSource {
    secs: Arc<AtomicU64>,
}

impl FixedTimeSource {
    /// Create a fixed clock starting at `secs`
    pub fn at(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    /// Jump the clock to an absolute value
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// Advance the clock by `secs`
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
