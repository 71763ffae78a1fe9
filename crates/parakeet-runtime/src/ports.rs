//! Two-port message channel between host page and trusted frame
//!
//! A message channel is a pair of endpoints: the host keeps one, the other is
//! moved into the one-time handshake delivered to the trusted frame. Rust
//! ownership enforces the transferred-once rule directly; there is no way to
//! hand the session port to two recipients.

use tokio::sync::mpsc;

use parakeet_core::{
    ChannelConfig, OperationRequest, OperationResponse, SecureOrigin, HANDSHAKE_TOKEN,
};

// ----------------------------------------------------------------------------
// Ports
// ----------------------------------------------------------------------------

/// Host-retained endpoint of the message channel
#[derive(Debug)]
pub struct HostPort {
    /// Outgoing operation requests
    pub requests: mpsc::Sender<OperationRequest>,
    /// Incoming response envelopes
    pub responses: mpsc::Receiver<OperationResponse>,
}

/// Frame-side endpoint, transferred exactly once inside the handshake
#[derive(Debug)]
pub struct SessionPort {
    /// Incoming operation requests
    pub requests: mpsc::Receiver<OperationRequest>,
    /// Outgoing response envelopes
    pub responses: mpsc::Sender<OperationResponse>,
}

/// Create a connected port pair with the configured buffer sizes
pub fn create_message_channel(config: &ChannelConfig) -> (HostPort, SessionPort) {
    let (request_tx, request_rx) = mpsc::channel(config.request_buffer_size);
    let (response_tx, response_rx) = mpsc::channel(config.response_buffer_size);

    (
        HostPort {
            requests: request_tx,
            responses: response_rx,
        },
        SessionPort {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

// ----------------------------------------------------------------------------
// Handshake Message
// ----------------------------------------------------------------------------

/// One-time frame-level message that binds a remote session.
///
/// Carries the literal handshake token, the verified origin of the client
/// page, and the moved session port the frame will reply on.
#[derive(Debug)]
pub struct HandshakeMessage {
    pub token: String,
    /// Origin of the page that opened the channel, verified by the transport
    /// layer that delivered this message
    pub client_origin: SecureOrigin,
    pub port: SessionPort,
}

impl HandshakeMessage {
    pub fn new(client_origin: SecureOrigin, port: SessionPort) -> Self {
        Self {
            token: HANDSHAKE_TOKEN.to_string(),
            client_origin,
            port,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
