//! Interest-membership input DTO
//!
//! [`AdInterests`] is the shape a page hands over when joining interest
//! groups. Input arrives from untrusted script, so construction is defensive:
//! any field that does not match the expected shape is coerced to its empty
//! default rather than propagated unchecked.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{ParakeetError, Result};

// ----------------------------------------------------------------------------
// Ad Interests
// ----------------------------------------------------------------------------

/// Interest memberships a page asks to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdInterests {
    /// The advertiser domain adding the user to interest groups. Used for
    /// transparency only; the storage namespace always comes from the
    /// verified calling context, never from this field.
    pub origin: Url,
    /// The business/enterprise that owns the domain, for user transparency.
    pub business: Option<String>,
    /// Ad interests based on activities on the domain.
    pub interests: Vec<String>,
    /// Vector representation models permitted to encode page content.
    /// Accepted but not currently stored.
    pub representations: Vec<String>,
    /// Ad networks allowed to read the interests.
    pub readers: Vec<String>,
}

impl Default for AdInterests {
    fn default() -> Self {
        Self {
            origin: blank_origin(),
            business: None,
            interests: Vec::new(),
            representations: Vec::new(),
            readers: Vec::new(),
        }
    }
}

impl AdInterests {
    /// Build an `AdInterests` from arbitrary JSON, coercing every field that
    /// does not match its expected shape to an empty default.
    pub fn from_value(value: &Value) -> Self {
        let origin = value
            .get("origin")
            .and_then(Value::as_str)
            .and_then(|raw| Url::parse(raw).ok())
            .unwrap_or_else(blank_origin);

        let business = value
            .get("business")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            origin,
            business,
            interests: string_list(value, "interests"),
            representations: string_list(value, "representations"),
            readers: string_list(value, "readers"),
        }
    }

    /// Parse a JSON document into an `AdInterests`.
    ///
    /// A document that is not JSON at all, or whose top level is not an
    /// object, is rejected with a validation error; individual fields inside
    /// a valid object are coerced per [`AdInterests::from_value`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ParakeetError::validation(format!("malformed interests payload: {e}")))?;
        if !value.is_object() {
            return Err(ParakeetError::validation(
                "interests payload must be a JSON object",
            ));
        }
        Ok(Self::from_value(&value))
    }

    /// Serialize for transmission inside a request envelope
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn blank_origin() -> Url {
    // about:blank is the defensive placeholder for a missing or unparseable
    // advertiser origin; it can never become a storage namespace.
    Url::parse("about:blank").expect("about:blank always parses")
}

/// Extract `key` as a list of strings; anything else becomes empty.
fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
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
    fn test_well_formed_payload() {
        let parsed = AdInterests::from_json(
            r#"{
                "origin": "https://advertiser.example",
                "business": "Example Corp",
                "interests": ["sports", "autos"],
                "representations": ["model-a"],
                "readers": ["net1", "net2"]
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.origin.as_str(), "https://advertiser.example/");
        assert_eq!(parsed.business.as_deref(), Some("Example Corp"));
        assert_eq!(parsed.interests, vec!["sports", "autos"]);
        assert_eq!(parsed.readers, vec!["net1", "net2"]);
    }

    #[test]
    fn test_malformed_fields_coerced_to_defaults() {
        let value = json!({
            "origin": 42,
            "business": ["not", "a", "string"],
            "interests": "sports",
            "readers": [1, "net1", null, "net2"]
        });
        let parsed = AdInterests::from_value(&value);

        assert_eq!(parsed.origin.as_str(), "about:blank");
        assert_eq!(parsed.business, None);
        assert!(parsed.interests.is_empty());
        assert!(parsed.representations.is_empty());
        // Non-string elements are dropped, not propagated.
        assert_eq!(parsed.readers, vec!["net1", "net2"]);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(AdInterests::from_json("[1, 2, 3]").is_err());
        assert!(AdInterests::from_json("not json").is_err());
    }

    #[test]
    fn test_envelope_round_trip() {
        let interests = AdInterests {
            origin: Url::parse("https://a.example").unwrap(),
            business: Some("A".to_string()),
            interests: vec!["sports".to_string()],
            representations: Vec::new(),
            readers: vec!["net1".to_string()],
        };
        let json = interests.to_json().unwrap();
        let back = AdInterests::from_json(&json).unwrap();
        assert_eq!(back, interests);
    }
}
