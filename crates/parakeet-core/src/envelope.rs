//! Wire envelopes for the host-page ↔ trusted-frame protocol
//!
//! Requests and responses both carry an explicit correlation id so replies
//! can be matched to their pending operation regardless of arrival order.
//! The envelope payloads that cross the channel are JSON strings of the
//! strongly-typed DTOs; the receiving side re-validates them at its boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Handshake
// ----------------------------------------------------------------------------

/// Literal token sent from host page to trusted frame exactly once, alongside
/// the transferred channel endpoint.
pub const HANDSHAKE_TOKEN: &str = "Initialize";

// ----------------------------------------------------------------------------
// Request Envelope
// ----------------------------------------------------------------------------

/// Operation requests sent from the host page to the trusted frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationRequest {
    /// Record interest memberships in the frame's private store
    StoreInterestGroup {
        id: Uuid,
        /// JSON string of an `AdInterests`
        interests: String,
        /// Validity in seconds for every interest in the payload
        duration: u64,
    },
    /// Run an anonymized ad request from inside the frame
    RequestAd {
        id: Uuid,
        /// JSON string of an `AdRequestConfig`
        config: String,
    },
}

impl OperationRequest {
    /// Correlation id carried by this request
    pub fn id(&self) -> Uuid {
        match self {
            Self::StoreInterestGroup { id, .. } => *id,
            Self::RequestAd { id, .. } => *id,
        }
    }
}

// ----------------------------------------------------------------------------
// Response Envelope
// ----------------------------------------------------------------------------

/// Result tag of a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Error")]
    Error,
}

/// Payload carried inside a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponsePayload {
    /// Acknowledgment with no data (successful store)
    Empty,
    /// Resolved creative reference
    AdUrl { url: Url },
    /// Raw creative bytes; converted to a locally-resolvable reference
    /// before delivery to the caller
    AdBlob { bytes: Vec<u8> },
    /// Raw diagnostic payload returned when ad serving is disabled
    Diagnostics { body: Value },
    /// Rendered error from the remote session
    Failure { message: String },
}

/// Response envelope sent from the trusted frame back to the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    /// Correlation id of the request this answers
    pub id: Uuid,
    pub result: ResponseStatus,
    pub data: ResponsePayload,
}

impl OperationResponse {
    /// Build a success envelope
    pub fn ok(id: Uuid, data: ResponsePayload) -> Self {
        Self {
            id,
            result: ResponseStatus::Ok,
            data,
        }
    }

    /// Build an error envelope carrying a rendered error message
    pub fn error<M: Into<String>>(id: Uuid, message: M) -> Self {
        Self {
            id,
            result: ResponseStatus::Error,
            data: ResponsePayload::Failure {
                message: message.into(),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_request_wire_shape() {
        let id = Uuid::nil();
        let request = OperationRequest::StoreInterestGroup {
            id,
            interests: "{\"interests\":[\"sports\"]}".to_string(),
            duration: 60,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "StoreInterestGroup",
                "id": "00000000-0000-0000-0000-000000000000",
                "interests": "{\"interests\":[\"sports\"]}",
                "duration": 60
            })
        );
    }

    #[test]
    fn test_request_ad_wire_shape() {
        let request = OperationRequest::RequestAd {
            id: Uuid::nil(),
            config: "{}".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "RequestAd");
        assert_eq!(value["config"], "{}");
    }

    #[test]
    fn test_response_result_tags() {
        let ok = OperationResponse::ok(Uuid::nil(), ResponsePayload::Empty);
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["result"], "OK");

        let err = OperationResponse::error(Uuid::nil(), "boom");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["result"], "Error");
        assert_eq!(value["data"]["message"], "boom");
    }

    #[test]
    fn test_envelope_round_trip() {
        let request = OperationRequest::RequestAd {
            id: Uuid::new_v4(),
            config: "{\"publisherCode\":\"pub-1\"}".to_string(),
        };
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: OperationRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, request);

        let response = OperationResponse::ok(
            request.id(),
            ResponsePayload::AdBlob {
                bytes: vec![1, 2, 3],
            },
        );
        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: OperationResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, response);
    }
}
