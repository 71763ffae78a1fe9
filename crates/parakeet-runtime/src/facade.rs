//! PARAKEET context facade
//!
//! One explicitly-constructed context object owns everything that was
//! formerly ambient: the serve-ads flag, the trust origin, the transport
//! channel, the blob registry, and the pending-operation table. Per call it
//! decides whether an operation executes against local storage or is routed
//! through the transport channel into the trusted frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use parakeet_core::{
    AdInterests, AdRequestConfig, InterestStore, OperationRequest, ParakeetConfig, ParakeetError,
    ResponsePayload, Result, SecureOrigin, StorageBackend, TimeSource,
};

use crate::ads::{perform_ad_request, AdService, CreativeDelivery};
use crate::blob::BlobRegistry;
use crate::channel::{FrameLoader, TransportChannel};
use crate::correlator::RequestCorrelator;

// ----------------------------------------------------------------------------
// Ad Response
// ----------------------------------------------------------------------------

/// Result of an ad request, as delivered to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum AdResponse {
    /// Locally-resolvable reference to the served creative
    Creative(Url),
    /// Raw diagnostic payload; returned when ad serving is disabled
    Diagnostics(Value),
}

// ----------------------------------------------------------------------------
// Trust State
// ----------------------------------------------------------------------------

/// Trust origin plus the at-most-one channel derived from it
struct TrustState {
    origin: Option<Url>,
    channel: Option<Arc<TransportChannel>>,
}

// ----------------------------------------------------------------------------
// Parakeet Facade
// ----------------------------------------------------------------------------

/// The page-facing entry point for joining interest groups and requesting
/// anonymized ads.
pub struct Parakeet<B: StorageBackend, T: TimeSource> {
    /// Origin of the embedding page; the local storage namespace
    page_origin: SecureOrigin,
    config: ParakeetConfig,
    serve_ads: AtomicBool,
    store: Mutex<InterestStore<B>>,
    time: T,
    loader: Arc<dyn FrameLoader>,
    ads: Arc<dyn AdService>,
    registry: Arc<BlobRegistry>,
    correlator: Arc<RequestCorrelator>,
    trust: Mutex<TrustState>,
}

impl<B: StorageBackend, T: TimeSource> Parakeet<B, T> {
    /// Create a context for `page_origin`
    pub fn new(
        page_origin: SecureOrigin,
        config: ParakeetConfig,
        backend: B,
        time: T,
        loader: Arc<dyn FrameLoader>,
        ads: Arc<dyn AdService>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(ParakeetError::config_error)?;
        let trust_origin = config.trust_origin.clone();
        let serve_ads = config.serve_ads;
        Ok(Self {
            page_origin,
            config,
            serve_ads: AtomicBool::new(serve_ads),
            store: Mutex::new(InterestStore::new(backend)),
            time,
            loader,
            ads,
            registry: Arc::new(BlobRegistry::new()),
            correlator: Arc::new(RequestCorrelator::new()),
            trust: Mutex::new(TrustState {
                origin: trust_origin,
                channel: None,
            }),
        })
    }

    /// Set whether ads are served or diagnostic data is returned
    pub fn set_serve_ads(&self, serve: bool) {
        self.serve_ads.store(serve, Ordering::SeqCst);
    }

    /// Registry of creative references minted by this context
    pub fn blob_registry(&self) -> &Arc<BlobRegistry> {
        &self.registry
    }

    /// Set (or clear) the origin that privately stores joined interests.
    ///
    /// Fails once the channel to a previous trust origin has begun
    /// establishing; the existing channel is left untouched.
    pub async fn set_trust_origin(&self, origin: Option<Url>) -> Result<()> {
        if let Some(origin) = &origin {
            if !matches!(origin.origin(), url::Origin::Tuple(..)) {
                return Err(ParakeetError::validation(format!(
                    "trust origin '{origin}' must not be opaque"
                )));
            }
        }
        let mut trust = self.trust.lock().await;
        if trust.channel.is_some() {
            return Err(ParakeetError::config_error(
                "unable to change the trust origin after the remote channel has been used",
            ));
        }
        trust.origin = origin;
        Ok(())
    }

    /// Record interest memberships, locally or through the trusted frame
    pub async fn join_interest_group(
        &self,
        interests: AdInterests,
        duration_secs: u64,
    ) -> Result<()> {
        if duration_secs == 0 {
            return Err(ParakeetError::validation(
                "duration must be greater than zero",
            ));
        }

        if let Some(channel) = self.remote_channel().await? {
            let request = OperationRequest::StoreInterestGroup {
                id: channel.next_id(),
                interests: interests.to_json()?,
                duration: duration_secs,
            };
            match channel.dispatch(request).await? {
                ResponsePayload::Empty => Ok(()),
                other => Err(ParakeetError::remote(format!(
                    "unexpected store acknowledgment: {other:?}"
                ))),
            }
        } else {
            debug!(origin = %self.page_origin, "storing interest group locally");
            let mut store = self.store.lock().await;
            store.store_interest_group(
                &interests,
                duration_secs,
                &self.page_origin,
                self.time.now(),
            )
        }
    }

    /// Request anonymized ad content.
    ///
    /// With a trust origin configured the operation is proxied into the
    /// trusted frame and its result returned as-is; otherwise the request
    /// runs against local storage so stored interests never leave this
    /// context.
    pub async fn request_ad(&self, config: AdRequestConfig) -> Result<AdResponse> {
        if let Some(channel) = self.remote_channel().await? {
            let request = OperationRequest::RequestAd {
                id: channel.next_id(),
                config: config.to_json()?,
            };
            let payload = channel.dispatch(request).await?;
            Self::ad_response(payload)
        } else {
            let store = self.store.lock().await;
            let payload = perform_ad_request(
                &store,
                self.ads.as_ref(),
                config,
                self.time.now(),
                self.serve_ads.load(Ordering::SeqCst),
                CreativeDelivery::Reference(self.registry.clone()),
            )
            .await?;
            Self::ad_response(payload)
        }
    }

    /// Channel to the trusted frame, created on first remote use.
    /// `None` when no trust origin is configured.
    async fn remote_channel(&self) -> Result<Option<Arc<TransportChannel>>> {
        let mut trust = self.trust.lock().await;
        if let Some(channel) = &trust.channel {
            return Ok(Some(channel.clone()));
        }
        let Some(origin) = trust.origin.clone() else {
            return Ok(None);
        };
        let channel = Arc::new(TransportChannel::new(
            origin,
            self.page_origin.clone(),
            self.loader.clone(),
            self.correlator.clone(),
            self.registry.clone(),
            self.config.channels.clone(),
        ));
        trust.channel = Some(channel.clone());
        Ok(Some(channel))
    }

    fn ad_response(payload: ResponsePayload) -> Result<AdResponse> {
        match payload {
            ResponsePayload::AdUrl { url } => Ok(AdResponse::Creative(url)),
            ResponsePayload::Diagnostics { body } => Ok(AdResponse::Diagnostics(body)),
            other => Err(ParakeetError::remote(format!(
                "unexpected ad response payload: {other:?}"
            ))),
        }
    }
}
