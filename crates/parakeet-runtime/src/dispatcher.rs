//! Remote session dispatcher
//!
//! Runs inside the trusted frame. Waits for the one-shot `Initialize`
//! handshake, binds to the client origin it carries, then serves typed
//! operation requests against the frame's private store. Every per-request
//! fault is caught and reported as an `Error`-tagged envelope; nothing a
//! client sends can terminate the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use parakeet_core::{
    AdInterests, AdRequestConfig, InterestStore, OperationRequest, OperationResponse,
    ParakeetConfig, ParakeetError, ResponsePayload, Result, SecureOrigin, StorageBackend,
    TimeSource, HANDSHAKE_TOKEN,
};

use crate::ads::{perform_ad_request, AdService, CreativeDelivery};
use crate::channel::{FrameHandle, FrameLoader};
use crate::ports::HandshakeMessage;

// ----------------------------------------------------------------------------
// Remote Session Dispatcher
// ----------------------------------------------------------------------------

/// Dispatcher for one remote storage session.
///
/// Requests are processed strictly one at a time; a reply is sent before the
/// next request is read. Correlation no longer depends on that ordering (ids
/// are explicit), but sequential execution keeps the store free of
/// interleaved read-modify-write cycles.
pub struct RemoteSessionDispatcher<B: StorageBackend, T: TimeSource> {
    handshakes: mpsc::Receiver<HandshakeMessage>,
    store: InterestStore<B>,
    ads: Arc<dyn AdService>,
    time: T,
    serve_ads: bool,
}

impl<B: StorageBackend, T: TimeSource> RemoteSessionDispatcher<B, T> {
    /// Create a dispatcher for the trusted frame's own context.
    ///
    /// Fails if the frame's configuration carries a trust origin: a context
    /// cannot both delegate its storage elsewhere and serve as remote storage.
    pub fn new(
        config: &ParakeetConfig,
        handshakes: mpsc::Receiver<HandshakeMessage>,
        backend: B,
        ads: Arc<dyn AdService>,
        time: T,
    ) -> Result<Self> {
        if config.trust_origin.is_some() {
            return Err(ParakeetError::config_error(
                "cannot act as remote storage while a trust origin is configured",
            ));
        }
        Ok(Self {
            handshakes,
            store: InterestStore::new(backend),
            ads,
            time,
            serve_ads: config.serve_ads,
        })
    }

    /// Run the session to completion.
    ///
    /// Listening: waits for the first well-formed handshake and binds to its
    /// client origin and reply port. Bound: serves requests until the client
    /// closes its port. Binding is one-shot; later handshakes are ignored.
    pub async fn run(mut self) {
        let (client_origin, mut port) = loop {
            let Some(handshake) = self.handshakes.recv().await else {
                debug!("handshake source closed before any session bound");
                return;
            };
            if handshake.token != HANDSHAKE_TOKEN {
                debug!(token = %handshake.token, "ignoring non-handshake frame message");
                continue;
            }
            break (handshake.client_origin, handshake.port);
        };

        info!(client = %client_origin, "remote session bound");

        let mut handshakes_open = true;
        loop {
            tokio::select! {
                request = port.requests.recv() => {
                    let Some(request) = request else {
                        debug!(client = %client_origin, "client closed its request port");
                        break;
                    };
                    let id = request.id();
                    let response = match self.handle(request, &client_origin).await {
                        Ok(payload) => OperationResponse::ok(id, payload),
                        // Faults are reported to the client, never allowed to
                        // terminate the session.
                        Err(error) => {
                            warn!(client = %client_origin, %error, "request failed");
                            OperationResponse::error(id, error.to_string())
                        }
                    };
                    if port.responses.send(response).await.is_err() {
                        debug!(client = %client_origin, "client closed its response port");
                        break;
                    }
                }
                handshake = self.handshakes.recv(), if handshakes_open => {
                    match handshake {
                        Some(_) => debug!("ignoring handshake attempt on bound session"),
                        None => handshakes_open = false,
                    }
                }
            }
        }
    }

    async fn handle(
        &mut self,
        request: OperationRequest,
        client_origin: &SecureOrigin,
    ) -> Result<ResponsePayload> {
        match request {
            OperationRequest::StoreInterestGroup {
                interests,
                duration,
                ..
            } => {
                let parsed = AdInterests::from_json(&interests)?;
                let now = self.time.now();
                // The namespace key is the verified channel origin; any origin
                // declared inside the payload is ignored.
                self.store
                    .store_interest_group(&parsed, duration, client_origin, now)?;
                Ok(ResponsePayload::Empty)
            }
            OperationRequest::RequestAd { config, .. } => {
                let parsed = AdRequestConfig::from_json(&config)?;
                // The remote storage side returns the raw creative; the client
                // converts it into a locally-resolvable reference on delivery.
                perform_ad_request(
                    &self.store,
                    self.ads.as_ref(),
                    parsed,
                    self.time.now(),
                    self.serve_ads,
                    CreativeDelivery::Blob,
                )
                .await
            }
        }
    }
}

impl<B: StorageBackend, T: TimeSource> std::fmt::Debug for RemoteSessionDispatcher<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSessionDispatcher")
            .field("serve_ads", &self.serve_ads)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// In-Process Frame Loader
// ----------------------------------------------------------------------------

/// Loads the trusted frame as an in-process task hosting a dispatcher.
///
/// A real embedding would navigate an isolated browsing context to the trust
/// origin; here the equivalent is spawning the dispatcher that origin's
/// document would run. At most one load is honored, matching the one-frame
/// channel lifecycle.
pub struct InProcessFrameLoader<B: StorageBackend + 'static, T: TimeSource + 'static> {
    handshake_tx: mpsc::Sender<HandshakeMessage>,
    dispatcher: Mutex<Option<RemoteSessionDispatcher<B, T>>>,
}

impl<B: StorageBackend + 'static, T: TimeSource + 'static> InProcessFrameLoader<B, T> {
    /// Build the loader and the dispatcher it will host.
    ///
    /// `config` is the trusted frame's own configuration (it must not have a
    /// trust origin of its own); `backend` is the frame origin's private
    /// storage.
    pub fn new(
        config: &ParakeetConfig,
        backend: B,
        ads: Arc<dyn AdService>,
        time: T,
    ) -> Result<Self> {
        let (handshake_tx, handshake_rx) =
            mpsc::channel(config.channels.handshake_buffer_size);
        let dispatcher =
            RemoteSessionDispatcher::new(config, handshake_rx, backend, ads, time)?;
        Ok(Self {
            handshake_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }
}

#[async_trait]
impl<B: StorageBackend + Sync + 'static, T: TimeSource + 'static> FrameLoader
    for InProcessFrameLoader<B, T>
{
    async fn load(&self, trust_origin: &Url) -> Result<FrameHandle> {
        let Some(dispatcher) = self.dispatcher.lock().await.take() else {
            return Err(ParakeetError::frame_load_failed(
                trust_origin.to_string(),
                "frame already loaded",
            ));
        };
        debug!(origin = %trust_origin, "loading trusted frame");
        tokio::spawn(dispatcher.run());
        Ok(FrameHandle::new(self.handshake_tx.clone()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::create_message_channel;
    use parakeet_core::{FixedTimeSource, MemoryBackend, ResponseStatus};
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    struct NoAds;

    #[async_trait]
    impl AdService for NoAds {
        async fn fetch(&self, _body: &str) -> Result<Vec<u8>> {
            Ok(b"{}".to_vec())
        }
    }

    async fn spawn_bound_session(
        clock: FixedTimeSource,
    ) -> (crate::ports::HostPort, mpsc::Sender<HandshakeMessage>) {
        let config = ParakeetConfig::testing();
        let (handshake_tx, handshake_rx) = mpsc::channel(2);
        let dispatcher = RemoteSessionDispatcher::new(
            &config,
            handshake_rx,
            MemoryBackend::new(),
            Arc::new(NoAds),
            clock,
        )
        .unwrap();
        tokio::spawn(dispatcher.run());

        let (host, session) = create_message_channel(&config.channels);
        let client_origin: SecureOrigin = "https://page.example".parse().unwrap();
        handshake_tx
            .send(HandshakeMessage::new(client_origin, session))
            .await
            .unwrap();
        (host, handshake_tx)
    }

    #[tokio::test]
    async fn test_dispatcher_rejects_trust_origin_config() {
        let mut config = ParakeetConfig::testing();
        config.trust_origin = Some(Url::parse("https://elsewhere.example").unwrap());
        let (_tx, rx) = mpsc::channel(2);
        let err = RemoteSessionDispatcher::new(
            &config,
            rx,
            MemoryBackend::new(),
            Arc::new(NoAds),
            FixedTimeSource::at(0),
        )
        .unwrap_err();
        assert!(matches!(err, ParakeetError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_store_request_acknowledged() {
        let (mut host, _handshakes) = spawn_bound_session(FixedTimeSource::at(0)).await;

        let id = Uuid::new_v4();
        host.requests
            .send(OperationRequest::StoreInterestGroup {
                id,
                interests: r#"{"interests":["sports"],"readers":["net1"]}"#.to_string(),
                duration: 60,
            })
            .await
            .unwrap();

        let response = timeout(Duration::from_secs(1), host.responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.id, id);
        assert_eq!(response.result, ResponseStatus::Ok);
        assert_eq!(response.data, ResponsePayload::Empty);
    }

    #[tokio::test]
    async fn test_fault_becomes_error_envelope_and_session_survives() {
        let (mut host, _handshakes) = spawn_bound_session(FixedTimeSource::at(0)).await;

        // Zero duration fails validation inside the dispatcher.
        let bad_id = Uuid::new_v4();
        host.requests
            .send(OperationRequest::StoreInterestGroup {
                id: bad_id,
                interests: r#"{"interests":["sports"]}"#.to_string(),
                duration: 0,
            })
            .await
            .unwrap();

        let response = timeout(Duration::from_secs(1), host.responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.id, bad_id);
        assert_eq!(response.result, ResponseStatus::Error);

        // The session keeps serving after the fault.
        let good_id = Uuid::new_v4();
        host.requests
            .send(OperationRequest::StoreInterestGroup {
                id: good_id,
                interests: r#"{"interests":["sports"],"readers":["net1"]}"#.to_string(),
                duration: 60,
            })
            .await
            .unwrap();
        let response = timeout(Duration::from_secs(1), host.responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.id, good_id);
        assert_eq!(response.result, ResponseStatus::Ok);
    }

    #[tokio::test]
    async fn test_second_handshake_ignored() {
        let (mut host, handshakes) = spawn_bound_session(FixedTimeSource::at(0)).await;

        // A rebinding attempt from another "client".
        let (second_host, second_session) = create_message_channel(&ParakeetConfig::testing().channels);
        let other: SecureOrigin = "https://attacker.example".parse().unwrap();
        handshakes
            .send(HandshakeMessage::new(other, second_session))
            .await
            .unwrap();

        // The original binding still serves; the second port never binds.
        let id = Uuid::new_v4();
        host.requests
            .send(OperationRequest::StoreInterestGroup {
                id,
                interests: r#"{"interests":["sports"],"readers":["net1"]}"#.to_string(),
                duration: 60,
            })
            .await
            .unwrap();
        let response = timeout(Duration::from_secs(1), host.responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.result, ResponseStatus::Ok);

        let mut second_host = second_host;
        assert!(
            timeout(Duration::from_millis(100), second_host.responses.recv())
                .await
                .is_err(),
            "unbound port must never receive responses"
        );
    }
}
