//! Geocoder configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const MAPBOX_BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";
const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Configuration for the geocoding providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Mapbox access token. Point geocoding is skipped when unset and the
    /// boundary provider supplies points as well.
    pub mapbox_token: Option<String>,

    /// Base URL of the Mapbox forward-geocoding API.
    pub mapbox_base_url: String,

    /// Base URL of the Nominatim API.
    pub nominatim_base_url: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl GeocoderConfig {
    /// Read `MAPBOX_ACCESS_TOKEN` from the environment; provider URLs keep
    /// their public defaults.
    pub fn from_env() -> Self {
        Self {
            mapbox_token: std::env::var("MAPBOX_ACCESS_TOKEN").ok(),
            mapbox_base_url: MAPBOX_BASE_URL.to_string(),
            nominatim_base_url: NOMINATIM_BASE_URL.to_string(),
            timeout: default_timeout(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            mapbox_token: None,
            mapbox_base_url: MAPBOX_BASE_URL.to_string(),
            nominatim_base_url: NOMINATIM_BASE_URL.to_string(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
