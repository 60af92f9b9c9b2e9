//! Geocoding configuration

use std::time::Duration;

use domain::Viewbox;
use serde::{Deserialize, Serialize};

/// Per-client options applied to every geocoding request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeOptions {
    /// Retries after the first failed attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Identifying client string sent as `User-Agent` (required by the
    /// Nominatim usage policy)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Comma-separated ISO 3166-1 alpha-2 codes to bias results (e.g. "us,ca")
    #[serde(default)]
    pub country_codes: Option<String>,

    /// Preferred search area
    #[serde(default)]
    pub viewbox: Option<Viewbox>,

    /// Only return results inside `viewbox`
    #[serde(default)]
    pub bounded: bool,
}

const fn default_retries() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    concat!(
        "meetingdir/",
        env!("CARGO_PKG_VERSION"),
        " (+https://github.com/meetingdir/meetingdir)"
    )
    .to_string()
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            country_codes: None,
            viewbox: None,
            bounded: false,
        }
    }
}

impl GeocodeOptions {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate the options
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }

        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }

        if let Some(codes) = &self.country_codes {
            let valid = codes.split(',').all(|code| {
                let code = code.trim();
                code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
            });
            if !valid {
                return Err(format!(
                    "country_codes must be comma-separated two-letter codes, got '{codes}'"
                ));
            }
        }

        if self.bounded && self.viewbox.is_none() {
            return Err("bounded requires a viewbox".to_string());
        }

        Ok(())
    }
}

/// Admission limits for outbound geocoding requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitOptions {
    /// Maximum requests started per interval window
    #[serde(default = "default_interval_cap")]
    pub interval_cap: usize,

    /// Interval window length in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Count requests still running at a window boundary against the next
    /// window
    #[serde(default)]
    pub carryover: bool,
}

const fn default_interval_cap() -> usize {
    1
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_concurrency() -> usize {
    1
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            interval_cap: default_interval_cap(),
            interval_ms: default_interval_ms(),
            concurrency: default_concurrency(),
            carryover: false,
        }
    }
}

impl RateLimitOptions {
    /// Interval window as a [`Duration`]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate the limits
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_cap == 0 {
            return Err("interval_cap must be greater than 0".to_string());
        }

        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".to_string());
        }

        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Complete configuration of a geocoding client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub options: GeocodeOptions,

    #[serde(default)]
    pub rate_limit: RateLimitOptions,
}

fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            options: GeocodeOptions::default(),
            rate_limit: RateLimitOptions::default(),
        }
    }
}

impl GeocodingConfig {
    /// Create a configuration suitable for testing against a mock server
    ///
    /// No retries and no interval throttling beyond what tests opt into.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            options: GeocodeOptions {
                retries: 0,
                timeout_ms: 2_000,
                user_agent: "meetingdir-tests/1.0".to_string(),
                ..Default::default()
            },
            rate_limit: RateLimitOptions {
                interval_cap: 100,
                interval_ms: 10,
                concurrency: 4,
                carryover: false,
            },
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }

        url::Url::parse(&self.base_url).map_err(|e| format!("base_url is invalid: {e}"))?;

        self.options.validate()?;
        self.rate_limit.validate()
    }
}
