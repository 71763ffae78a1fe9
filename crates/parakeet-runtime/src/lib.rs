//! PARAKEET Runtime
//!
//! Tokio-based orchestration for the PARAKEET engine: the transport channel
//! that lazily embeds the trusted frame, the correlator that matches response
//! envelopes to pending operations, the remote session dispatcher that serves
//! proxied operations inside the frame, and the [`Parakeet`] facade that
//! decides, per call, whether an operation runs locally or remotely.
//!
//! Protocol types and the storage engine live in `parakeet-core`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod ads;
pub mod blob;
pub mod channel;
pub mod correlator;
pub mod dispatcher;
pub mod facade;
pub mod ports;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use ads::AdService;
pub use blob::BlobRegistry;
pub use channel::{FrameHandle, FrameLoader, TransportChannel};
pub use correlator::RequestCorrelator;
pub use dispatcher::{InProcessFrameLoader, RemoteSessionDispatcher};
pub use facade::{AdResponse, Parakeet};
pub use ports::{create_message_channel, HandshakeMessage, HostPort, SessionPort};
