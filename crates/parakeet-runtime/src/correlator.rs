//! Request/response correlation
//!
//! Matches asynchronous response envelopes arriving on the channel back to
//! the pending operation that issued them. Correlation is keyed by the
//! explicit id carried in both envelope directions, so replies may arrive in
//! any order and concurrent in-flight operations are safe; nothing here
//! depends on the remote session's reply ordering.

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use parakeet_core::{
    OperationResponse, ParakeetError, ResponsePayload, ResponseStatus, Result,
};

use crate::blob::BlobRegistry;

// ----------------------------------------------------------------------------
// Request Correlator
// ----------------------------------------------------------------------------

/// Completion slot for one in-flight operation
type PendingOperation = oneshot::Sender<Result<ResponsePayload>>;

/// Pending-operation table keyed by correlation id
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: DashMap<Uuid, PendingOperation>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending operation before its request is transmitted, so a
    /// response that races the send still finds its slot.
    pub fn register(&self, id: Uuid) -> oneshot::Receiver<Result<ResponsePayload>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        rx
    }

    /// Drop a registration whose request was never transmitted
    pub fn abandon(&self, id: Uuid) {
        self.pending.remove(&id);
    }

    /// Resolve the pending operation matching `response`.
    ///
    /// Creative blobs are converted into locally-resolvable references before
    /// delivery. Responses with no matching pending operation are dropped.
    pub fn complete(&self, response: OperationResponse, registry: &BlobRegistry) {
        let Some((_, slot)) = self.pending.remove(&response.id) else {
            warn!(id = %response.id, "dropping response with no pending operation");
            return;
        };

        let outcome = match response.result {
            ResponseStatus::Ok => Ok(deliverable(response.data, registry)),
            ResponseStatus::Error => Err(remote_failure(response.data)),
        };

        // A dropped receiver just means the caller went away.
        let _ = slot.send(outcome);
    }

    /// Reject every outstanding operation with a channel failure
    pub fn fail_all(&self, reason: &str) {
        let ids: Vec<Uuid> = self.pending.iter().map(|entry| *entry.key()).collect();
        debug!(pending = ids.len(), reason, "failing all pending operations");
        for id in ids {
            if let Some((_, slot)) = self.pending.remove(&id) {
                let _ = slot.send(Err(ParakeetError::channel_closed(reason)));
            }
        }
    }

    /// Number of operations awaiting responses
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Convert a payload into its deliverable form: blobs become `blob:`
/// references, everything else passes through.
fn deliverable(payload: ResponsePayload, registry: &BlobRegistry) -> ResponsePayload {
    match payload {
        ResponsePayload::AdBlob { bytes } => ResponsePayload::AdUrl {
            url: registry.publish(bytes),
        },
        other => other,
    }
}

fn remote_failure(payload: ResponsePayload) -> ParakeetError {
    match payload {
        ResponsePayload::Failure { message } => ParakeetError::remote(message),
        other => ParakeetError::remote(format!("unexpected error payload: {other:?}")),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_correct_callers() {
        let correlator = RequestCorrelator::new();
        let registry = BlobRegistry::new();

        let first_id = Uuid::new_v4();
        let second_id = Uuid::new_v4();
        let first_rx = correlator.register(first_id);
        let second_rx = correlator.register(second_id);

        // Replies arrive in the opposite order they were issued.
        correlator.complete(
            OperationResponse::ok(
                second_id,
                ResponsePayload::Diagnostics {
                    body: serde_json::json!({"which": "second"}),
                },
            ),
            &registry,
        );
        correlator.complete(
            OperationResponse::ok(
                first_id,
                ResponsePayload::Diagnostics {
                    body: serde_json::json!({"which": "first"}),
                },
            ),
            &registry,
        );

        match first_rx.await.unwrap().unwrap() {
            ResponsePayload::Diagnostics { body } => assert_eq!(body["which"], "first"),
            other => panic!("unexpected payload: {other:?}"),
        }
        match second_rx.await.unwrap().unwrap() {
            ResponsePayload::Diagnostics { body } => assert_eq!(body["which"], "second"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blob_converted_to_reference_before_delivery() {
        let correlator = RequestCorrelator::new();
        let registry = BlobRegistry::new();

        let id = Uuid::new_v4();
        let rx = correlator.register(id);
        correlator.complete(
            OperationResponse::ok(id, ResponsePayload::AdBlob { bytes: vec![7, 8] }),
            &registry,
        );

        match rx.await.unwrap().unwrap() {
            ResponsePayload::AdUrl { url } => {
                assert_eq!(url.scheme(), "blob");
                assert_eq!(registry.resolve(&url).unwrap().as_slice(), &[7, 8]);
            }
            other => panic!("expected a blob reference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_envelope_rejects_caller() {
        let correlator = RequestCorrelator::new();
        let registry = BlobRegistry::new();

        let id = Uuid::new_v4();
        let rx = correlator.register(id);
        correlator.complete(OperationResponse::error(id, "remote store exploded"), &registry);

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, ParakeetError::Remote { .. }));
        assert!(err.to_string().contains("remote store exploded"));
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped() {
        let correlator = RequestCorrelator::new();
        let registry = BlobRegistry::new();

        correlator.complete(
            OperationResponse::ok(Uuid::new_v4(), ResponsePayload::Empty),
            &registry,
        );
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_rejects_every_pending_operation() {
        let correlator = RequestCorrelator::new();

        let rx1 = correlator.register(Uuid::new_v4());
        let rx2 = correlator.register(Uuid::new_v4());
        correlator.fail_all("frame went away");

        for rx in [rx1, rx2] {
            let err = rx.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                ParakeetError::Transport(parakeet_core::TransportError::ChannelClosed { .. })
            ));
        }
        assert_eq!(correlator.pending_len(), 0);
    }
}
