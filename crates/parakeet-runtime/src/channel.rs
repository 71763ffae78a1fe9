//! Transport channel to the trusted frame
//!
//! Lazily establishes the isolated embedding of the trust origin and the
//! two-port message channel to it. The channel is a one-way state machine
//! (`Uninitialized → Establishing → Ready → Failed`) with `Failed` terminal:
//! a failed channel cannot be retried within the same context; the embedding
//! host must be restarted.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use parakeet_core::{
    ChannelConfig, OperationRequest, OperationResponse, ParakeetError, ResponsePayload, Result,
    SecureOrigin,
};

use crate::blob::BlobRegistry;
use crate::correlator::RequestCorrelator;
use crate::ports::{create_message_channel, HandshakeMessage, HostPort};

// ----------------------------------------------------------------------------
// Frame Loading Seam
// ----------------------------------------------------------------------------

/// Handle to a loaded trusted frame. Owned exclusively by the channel.
#[derive(Debug)]
pub struct FrameHandle {
    handshake: mpsc::Sender<HandshakeMessage>,
}

impl FrameHandle {
    pub fn new(handshake: mpsc::Sender<HandshakeMessage>) -> Self {
        Self { handshake }
    }

    /// Deliver the one-time handshake into the frame
    pub(crate) async fn post_handshake(&self, message: HandshakeMessage) -> Result<()> {
        self.handshake
            .send(message)
            .await
            .map_err(|_| ParakeetError::channel_closed("frame rejected the handshake"))
    }
}

/// Creates the isolated, script-capable but same-origin-restricted embedding
/// of a trust origin.
#[async_trait]
pub trait FrameLoader: Send + Sync {
    /// Load the embedding for `trust_origin`, resolving once its content is
    /// ready to receive the handshake
    async fn load(&self, trust_origin: &Url) -> Result<FrameHandle>;
}

// ----------------------------------------------------------------------------
// Channel State Machine
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum ChannelState {
    Uninitialized,
    Establishing,
    Ready(ReadyChannel),
    Failed,
}

#[derive(Debug)]
struct ReadyChannel {
    requests: mpsc::Sender<OperationRequest>,
    /// Keeps the frame embedding alive for the channel's lifetime
    _frame: FrameHandle,
}

impl ChannelState {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Establishing => "establishing",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Channel
// ----------------------------------------------------------------------------

/// The host page's channel to its trusted frame.
///
/// At most one channel exists per context; establishment is single-flight
/// (a concurrent caller waits for the first establishment to finish rather
/// than creating a second frame) and there is no teardown/recreation path.
pub struct TransportChannel {
    trust_origin: Url,
    client_origin: SecureOrigin,
    loader: Arc<dyn FrameLoader>,
    correlator: Arc<RequestCorrelator>,
    registry: Arc<BlobRegistry>,
    config: ChannelConfig,
    state: Mutex<ChannelState>,
}

impl TransportChannel {
    pub fn new(
        trust_origin: Url,
        client_origin: SecureOrigin,
        loader: Arc<dyn FrameLoader>,
        correlator: Arc<RequestCorrelator>,
        registry: Arc<BlobRegistry>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            trust_origin,
            client_origin,
            loader,
            correlator,
            registry,
            config,
            state: Mutex::new(ChannelState::Uninitialized),
        }
    }

    /// Whether the channel has started (or finished) establishing.
    ///
    /// Once this returns true the trust origin can no longer change.
    pub async fn is_committed(&self) -> bool {
        !matches!(*self.state.lock().await, ChannelState::Uninitialized)
    }

    /// Current state name, for diagnostics
    pub async fn state_name(&self) -> &'static str {
        self.state.lock().await.name()
    }

    /// Ensure the channel is ready, establishing it on first use.
    ///
    /// Ready: no-op. Failed: rejects immediately. Uninitialized: loads the
    /// frame, posts the handshake with the moved session port, and installs
    /// the response pump. The state lock is held across establishment, so a
    /// concurrent caller blocks until the first establishment completes and
    /// then observes its outcome.
    pub async fn ensure(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match &*state {
            ChannelState::Ready(_) => Ok(()),
            ChannelState::Failed => Err(ParakeetError::channel_not_ready(format!(
                "channel to '{}' previously failed; restart required",
                self.trust_origin
            ))),
            ChannelState::Establishing => {
                // Only reachable if a prior establishing call was cancelled
                // mid-flight; the channel is unusable.
                Err(ParakeetError::channel_not_ready(
                    "channel establishment was interrupted",
                ))
            }
            ChannelState::Uninitialized => {
                *state = ChannelState::Establishing;
                match self.establish().await {
                    Ok(ready) => {
                        info!(origin = %self.trust_origin, "transport channel ready");
                        *state = ChannelState::Ready(ready);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(origin = %self.trust_origin, error = %e, "transport channel failed");
                        *state = ChannelState::Failed;
                        Err(e)
                    }
                }
            }
        }
    }

    async fn establish(&self) -> Result<ReadyChannel> {
        let (host_port, session_port) = create_message_channel(&self.config);

        let frame = self.loader.load(&self.trust_origin).await?;
        frame
            .post_handshake(HandshakeMessage::new(
                self.client_origin.clone(),
                session_port,
            ))
            .await?;

        let HostPort {
            requests,
            responses,
        } = host_port;

        let correlator = self.correlator.clone();
        let registry = self.registry.clone();
        tokio::spawn(pump_responses(responses, correlator, registry));

        Ok(ReadyChannel {
            requests,
            _frame: frame,
        })
    }

    /// Send one operation and await its correlated response payload
    pub async fn dispatch(&self, request: OperationRequest) -> Result<ResponsePayload> {
        self.ensure().await?;

        let sender = {
            let state = self.state.lock().await;
            match &*state {
                ChannelState::Ready(ready) => ready.requests.clone(),
                other => {
                    return Err(ParakeetError::channel_not_ready(format!(
                        "channel is {}",
                        other.name()
                    )))
                }
            }
        };

        // Register before transmitting in case the response races the send.
        let id = request.id();
        let pending = self.correlator.register(id);

        if sender.send(request).await.is_err() {
            self.correlator.abandon(id);
            return Err(ParakeetError::channel_closed(
                "trusted frame stopped receiving requests",
            ));
        }

        debug!(%id, "operation dispatched to trusted frame");
        pending
            .await
            .map_err(|_| ParakeetError::channel_closed("pending operation was dropped"))?
    }

    /// Mint a fresh correlation id for an outgoing request
    pub fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Drain responses from the frame into the correlator. When the frame closes
/// its port, every pending operation is rejected; future operations fail at
/// the send instead.
async fn pump_responses(
    mut responses: mpsc::Receiver<OperationResponse>,
    correlator: Arc<RequestCorrelator>,
    registry: Arc<BlobRegistry>,
) {
    while let Some(response) = responses.recv().await {
        correlator.complete(response, &registry);
    }
    correlator.fail_all("trusted frame closed its response port");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
