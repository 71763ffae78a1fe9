//! Centralized Configuration Management
//!
//! Consolidates the formerly-ambient engine settings (serve-ads flag, trust
//! origin, channel buffer sizes) into one explicit, validated configuration
//! object owned by the context that uses it.

use serde::{Deserialize, Serialize};
use url::Url;

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for message-channel buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for operation requests (host page → trusted frame)
    pub request_buffer_size: usize,
    /// Buffer size for response envelopes (trusted frame → host page)
    pub response_buffer_size: usize,
    /// Buffer size for frame-level handshake messages
    pub handshake_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_buffer_size: 32,  // operations are caller-paced
            response_buffer_size: 32, // one response per request
            handshake_buffer_size: 8, // a single Initialize plus stragglers
        }
    }
}

impl ChannelConfig {
    /// Create configuration with small buffers for tests
    pub fn testing() -> Self {
        Self {
            request_buffer_size: 4,
            response_buffer_size: 4,
            handshake_buffer_size: 2,
        }
    }
}

// ----------------------------------------------------------------------------
// Engine Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for a PARAKEET context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParakeetConfig {
    /// Serve ad creatives when true; return raw diagnostic payloads when false
    pub serve_ads: bool,
    /// Origin that privately stores joined interest groups. `None` means
    /// interests are silo'd under the current top-level origin.
    pub trust_origin: Option<Url>,
    /// Message-channel buffer sizes
    pub channels: ChannelConfig,
}

impl Default for ParakeetConfig {
    fn default() -> Self {
        Self {
            serve_ads: true,
            trust_origin: None,
            channels: ChannelConfig::default(),
        }
    }
}

impl ParakeetConfig {
    /// Create configuration for tests
    pub fn testing() -> Self {
        Self {
            serve_ads: true,
            trust_origin: None,
            channels: ChannelConfig::testing(),
        }
    }

    /// Validate the configuration, returning a reason string on failure
    pub fn validate(&self) -> core::result::Result<(), String> {
        if self.channels.request_buffer_size == 0 {
            return Err("request_buffer_size must be greater than zero".to_string());
        }
        if self.channels.response_buffer_size == 0 {
            return Err("response_buffer_size must be greater than zero".to_string());
        }
        if self.channels.handshake_buffer_size == 0 {
            return Err("handshake_buffer_size must be greater than zero".to_string());
        }
        if let Some(origin) = &self.trust_origin {
            if !matches!(origin.origin(), url::Origin::Tuple(..)) {
                return Err(format!("trust origin '{origin}' must not be opaque"));
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
