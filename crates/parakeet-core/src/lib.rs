//! PARAKEET Core Engine
//!
//! This crate provides the foundational types, interest-group storage engine,
//! and wire protocol for the PARAKEET anonymized ad-request flow. Pages record
//! interest memberships with per-interest expiry and reader lists; the
//! envelopes defined here carry those operations into an isolated trusted
//! context when private storage is delegated to another origin.
//!
//! Orchestration (transport channel, request correlation, the remote session
//! dispatcher) lives in the `parakeet-runtime` crate.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod envelope;
pub mod errors;
pub mod interests;
pub mod request;
pub mod storage;
pub mod store;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ChannelConfig, ParakeetConfig};
pub use envelope::{
    OperationRequest, OperationResponse, ResponsePayload, ResponseStatus, HANDSHAKE_TOKEN,
};
pub use errors::{ParakeetError, Result, StorageError, TransportError};
pub use interests::AdInterests;
pub use request::{AdProperties, AdRequestConfig, AdTargeting, Geo};
pub use storage::{create_test_backend, FileBackend, MemoryBackend, StorageBackend};
pub use store::{
    InterestRecord, InterestStore, OriginNamespace, ReaderIndex, ReaderInterests, StoredInterests,
};
pub use types::{FixedTimeSource, SecureOrigin, SystemTimeSource, TimeSource, Timestamp};
