//! Ad-request flow and the anonymization-service seam
//!
//! The outbound POST to the anonymization endpoint is a collaborator behind
//! [`AdService`]; this module owns everything around it: attaching the live
//! interest projection to the request body, and shaping the service response
//! into a creative reference, raw blob, or diagnostics payload.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use parakeet_core::{
    AdRequestConfig, InterestStore, ResponsePayload, Result, StorageBackend, Timestamp,
};

use crate::blob::BlobRegistry;

// ----------------------------------------------------------------------------
// Ad Service Trait
// ----------------------------------------------------------------------------

/// Collaborator that performs the outbound anonymization-service call
#[async_trait]
pub trait AdService: Send + Sync {
    /// POST `body` to the anonymization endpoint and return the raw response
    async fn fetch(&self, body: &str) -> Result<Vec<u8>>;
}

// ----------------------------------------------------------------------------
// Delivery Mode
// ----------------------------------------------------------------------------

/// How a served creative is handed back to the requester
pub enum CreativeDelivery {
    /// Mint a locally-resolvable `blob:` reference
    Reference(Arc<BlobRegistry>),
    /// Return the raw creative bytes. Used when operating as the remote
    /// storage side; the client converts them on delivery.
    Blob,
}

// ----------------------------------------------------------------------------
// Shared Flow
// ----------------------------------------------------------------------------

/// Execute one ad request against `store` and the anonymization service.
///
/// Joined interest groups are never caller-supplied: whatever the config
/// carried is overwritten with the live reader-indexed projection before the
/// body is built.
pub(crate) async fn perform_ad_request<B: StorageBackend>(
    store: &InterestStore<B>,
    ads: &dyn AdService,
    mut config: AdRequestConfig,
    now: Timestamp,
    serve_ads: bool,
    delivery: CreativeDelivery,
) -> Result<ResponsePayload> {
    config.joined_groups = store.interest_groups(now)?;

    let body = config.to_request_body()?;
    debug!(bytes = body.len(), serve_ads, "sending anonymization request");
    let response = ads.fetch(&body).await?;

    if serve_ads {
        Ok(match delivery {
            CreativeDelivery::Reference(registry) => ResponsePayload::AdUrl {
                url: registry.publish(response),
            },
            CreativeDelivery::Blob => ResponsePayload::AdBlob { bytes: response },
        })
    } else {
        // Ad serving disabled: hand back the raw JSON for diagnostics and
        // effectiveness telemetry.
        let body = serde_json::from_slice(&response)?;
        Ok(ResponsePayload::Diagnostics { body })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parakeet_core::{AdInterests, MemoryBackend, SecureOrigin};
    use std::sync::Mutex;

    /// Canned-response service that records the body it was sent
    struct RecordingService {
        response: Vec<u8>,
        bodies: Mutex<Vec<String>>,
    }

    impl RecordingService {
        fn new(response: &[u8]) -> Self {
            Self {
                response: response.to_vec(),
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdService for RecordingService {
        async fn fetch(&self, body: &str) -> Result<Vec<u8>> {
            self.bodies.lock().unwrap().push(body.to_string());
            Ok(self.response.clone())
        }
    }

    fn seeded_store() -> InterestStore<MemoryBackend> {
        let mut store = InterestStore::new(MemoryBackend::new());
        let origin: SecureOrigin = "https://page.example".parse().unwrap();
        let record = AdInterests {
            interests: vec!["sports".to_string()],
            readers: vec!["net1".to_string()],
            ..AdInterests::default()
        };
        store
            .store_interest_group(&record, 60, &origin, Timestamp::from_secs(0))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_live_projection_attached_and_caller_groups_overwritten() {
        let store = seeded_store();
        let service = RecordingService::new(b"creative");

        let mut config = AdRequestConfig::from_json(
            r#"{ "joinedGroups": { "sneaky": { "interests": {} } } }"#,
        )
        .unwrap();
        config.publisher_code = "pub-1".to_string();

        perform_ad_request(
            &store,
            &service,
            config,
            Timestamp::from_secs(30),
            true,
            CreativeDelivery::Blob,
        )
        .await
        .unwrap();

        let bodies = service.bodies.lock().unwrap();
        let body: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        // The caller-supplied groups are gone; the live projection replaced them.
        assert!(body["joinedGroups"].get("sneaky").is_none());
        assert_eq!(
            body["joinedGroups"]["net1"]["interests"]["https://page.example"],
            serde_json::json!(["sports"])
        );
        assert_eq!(body["publisher-code"], "pub-1");
    }

    #[tokio::test]
    async fn test_blob_delivery_returns_raw_bytes() {
        let store = seeded_store();
        let service = RecordingService::new(b"creative-bytes");

        let payload = perform_ad_request(
            &store,
            &service,
            AdRequestConfig::default(),
            Timestamp::from_secs(0),
            true,
            CreativeDelivery::Blob,
        )
        .await
        .unwrap();

        assert_eq!(
            payload,
            ResponsePayload::AdBlob {
                bytes: b"creative-bytes".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn test_reference_delivery_mints_resolvable_url() {
        let store = seeded_store();
        let service = RecordingService::new(b"creative-bytes");
        let registry = Arc::new(BlobRegistry::new());

        let payload = perform_ad_request(
            &store,
            &service,
            AdRequestConfig::default(),
            Timestamp::from_secs(0),
            true,
            CreativeDelivery::Reference(registry.clone()),
        )
        .await
        .unwrap();

        match payload {
            ResponsePayload::AdUrl { url } => {
                assert_eq!(registry.resolve(&url).unwrap().as_slice(), b"creative-bytes");
            }
            other => panic!("expected a creative reference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_diagnostics_when_serving_disabled() {
        let store = seeded_store();
        let service = RecordingService::new(br#"{"effectiveness": 0.5}"#);

        let payload = perform_ad_request(
            &store,
            &service,
            AdRequestConfig::default(),
            Timestamp::from_secs(0),
            false,
            CreativeDelivery::Blob,
        )
        .await
        .unwrap();

        match payload {
            ResponsePayload::Diagnostics { body } => {
                assert_eq!(body["effectiveness"], 0.5);
            }
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }
}
