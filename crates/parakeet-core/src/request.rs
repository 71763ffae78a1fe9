//! Ad-request configuration DTOs
//!
//! Strongly-typed value structs for the ad-request flow, built through
//! validating factories that reject or coerce malformed input at the
//! boundary. [`AdRequestConfig::to_request_body`] produces the outbound
//! anonymization-service body, applying the service's kebab-case field
//! names; everywhere else the camelCase page-facing names are used.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::store::ReaderIndex;
use crate::{ParakeetError, Result};

// ----------------------------------------------------------------------------
// Ad Properties
// ----------------------------------------------------------------------------

/// Well-known presentation hints for the requested ad
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdProperties {
    /// Requested orientation, e.g. landscape
    pub orientation: String,
    /// Requested size, e.g. medium, large
    pub size: String,
    /// Requested ad slot, e.g. div-xyz-abc
    pub slot: String,
    /// Requested language, e.g. en-us
    pub lang: String,
    /// Requested ad type, e.g. image/native
    pub adtype: String,
}

// ----------------------------------------------------------------------------
// Geolocation
// ----------------------------------------------------------------------------

/// Relevant geolocation fields, reflecting the OpenRTB geo schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geo {
    /// Latitude from -90.0 to +90.0, where negative is south
    pub lat: Option<f64>,
    /// Longitude from -180.0 to +180.0, where negative is west
    pub lon: Option<f64>,
}

// ----------------------------------------------------------------------------
// Ad Targeting
// ----------------------------------------------------------------------------

/// Contextual targeting information for one ad request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdTargeting {
    /// Contextual interests available at request time
    pub interests: Vec<String>,
    /// Geolocation the requesting site may be aware of. Only the structured
    /// form is accepted; any other shape coerces to `None`.
    #[serde(deserialize_with = "geo_or_none")]
    pub geolocation: Option<Geo>,
}

fn geo_or_none<'de, D>(deserializer: D) -> core::result::Result<Option<Geo>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

// ----------------------------------------------------------------------------
// Ad Request Configuration
// ----------------------------------------------------------------------------

/// Configuration for one anonymized ad request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdRequestConfig {
    /// Origin the anonymizing service requests the ad bundle from
    pub proxied_anonymizing_origin: String,
    /// Presentation hints for the ad network
    pub ad_properties: AdProperties,
    /// Publisher identity registered with the ad network
    pub publisher_code: String,
    /// Ad unit/vertical the publisher registered with the ad network
    pub publisher_ad_unit: String,
    /// Contextual targeting for this request
    pub targeting: AdTargeting,
    /// Signals the anonymizing request service may add or pass through
    pub anonymized_proxied_signals: Vec<String>,
    /// Fallback content source when anonymized flows are unavailable
    pub fallback_source: Option<Url>,
    /// Joined interest groups. Not settable by callers; overwritten with the
    /// live projection before the request body is built.
    pub joined_groups: ReaderIndex,
}

/// Page-facing name → anonymization-service name, applied to the top level
/// of the outbound body.
const BODY_RENAMES: &[(&str, &str)] = &[
    ("proxiedAnonymizingOrigin", "proxied-anonymizing-origin"),
    ("adProperties", "ad-properties"),
    ("publisherCode", "publisher-code"),
    ("publisherAdUnit", "publisher-ad-unit"),
    ("anonymizedProxiedSignals", "anonymized-proxied-signals"),
    ("fallbackSource", "fallback-source"),
];

impl AdRequestConfig {
    /// Parse a JSON document into an `AdRequestConfig`, rejecting documents
    /// whose top level is not an object or whose fields cannot be coerced.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ParakeetError::validation(format!("malformed request config: {e}")))?;
        if !value.is_object() {
            return Err(ParakeetError::validation(
                "request config must be a JSON object",
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| ParakeetError::validation(format!("invalid request config: {e}")))
    }

    /// Serialize for transmission inside a request envelope
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build the outbound anonymization-service body, with field names
    /// rewritten to the service's expectations.
    pub fn to_request_body(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for (from, to) in BODY_RENAMES {
                if let Some(field) = map.remove(*from) {
                    map.insert((*to).to_string(), field);
                }
            }
        }
        Ok(serde_json::to_string(&value)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
