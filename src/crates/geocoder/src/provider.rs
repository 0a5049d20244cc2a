//! Forward and boundary geocoding providers.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use hypergraph::{Geometry, SpatialContext};

use crate::config::GeocoderConfig;
use crate::decimate::decimate;
use crate::error::{GeocodeError, Result};

const USER_AGENT: &str = "hyperstruct-geocoder/0.1";

/// Names that mean "no location"; they are discarded before geocoding.
const PLACEHOLDER_NAMES: [&str; 5] = ["unknown", "none", "n/a", "not specified", "unspecified"];

/// Whether a location name is a placeholder rather than a real place.
pub fn is_placeholder_name(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    lowered.is_empty() || PLACEHOLDER_NAMES.contains(&lowered.as_str())
}

#[derive(Deserialize)]
struct MapboxResponse {
    features: Vec<MapboxFeature>,
}

#[derive(Deserialize)]
struct MapboxFeature {
    geometry: MapboxGeometry,
}

#[derive(Deserialize)]
struct MapboxGeometry {
    coordinates: [f64; 2],
}

#[derive(Deserialize)]
struct NominatimPlace {
    lon: String,
    lat: String,
    #[serde(default)]
    geojson: Option<GeoJson>,
}

#[derive(Deserialize)]
struct GeoJson {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Option<Value>,
}

/// Resolves place names to points or capped polygons.
#[derive(Debug, Clone)]
pub struct Geocoder {
    config: GeocoderConfig,
    client: Client,
}

impl Geocoder {
    /// Create a new geocoder with the given configuration.
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { config, client })
    }

    /// Resolve a place name to zero or more spatial contexts.
    ///
    /// Placeholder names resolve to nothing without touching the network.
    /// An empty result means both providers came up dry; the caller decides
    /// whether to store an unresolved placeholder.
    pub async fn expand(&self, name: &str) -> Result<Vec<SpatialContext>> {
        let name = name.trim();
        if is_placeholder_name(name) {
            return Ok(Vec::new());
        }

        if let Some(point) = self.forward_geocode(name).await? {
            return Ok(vec![SpatialContext::new(name, Geometry::Point(Some(point)))]);
        }

        match self.boundary_geocode(name).await? {
            Some(geometry) => Ok(vec![SpatialContext::new(name, geometry)]),
            None => Ok(Vec::new()),
        }
    }

    /// Mapbox forward geocoding: first feature's point, if any.
    async fn forward_geocode(&self, name: &str) -> Result<Option<(f64, f64)>> {
        let Some(token) = &self.config.mapbox_token else {
            return Ok(None);
        };

        let mut url = reqwest::Url::parse(&self.config.mapbox_base_url)
            .map_err(|e| GeocodeError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| GeocodeError::InvalidUrl("mapbox base URL cannot be a base".into()))?
            .push(&format!("{name}.json"));
        url.query_pairs_mut()
            .append_pair("access_token", token)
            .append_pair("limit", "1");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), name, "mapbox geocoding failed");
            return Ok(None);
        }

        let parsed: MapboxResponse = response.json().await?;
        Ok(parsed
            .features
            .into_iter()
            .next()
            .map(|f| (f.geometry.coordinates[0], f.geometry.coordinates[1])))
    }

    /// Nominatim boundary lookup: a decimated polygon when the place has
    /// one, otherwise the provider's point.
    async fn boundary_geocode(&self, name: &str) -> Result<Option<Geometry>> {
        let mut url = reqwest::Url::parse(&self.config.nominatim_base_url)
            .map_err(|e| GeocodeError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| GeocodeError::InvalidUrl("nominatim base URL cannot be a base".into()))?
            .push("search");
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("polygon_geojson", "1")
            .append_pair("polygon_threshold", "0")
            .append_pair("q", name);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), name, "nominatim lookup failed");
            return Ok(None);
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let fallback_point = provider_point(&place);
        let Some(geojson) = place.geojson else {
            return Ok(fallback_point);
        };
        let Some(geometry) = parse_boundary(&geojson) else {
            return Ok(fallback_point);
        };

        // Decimation refuses geometries that cannot fit the vertex cap.
        Ok(decimate(geometry).or(fallback_point))
    }
}

fn provider_point(place: &NominatimPlace) -> Option<Geometry> {
    let lon: f64 = place.lon.parse().ok()?;
    let lat: f64 = place.lat.parse().ok()?;
    Some(Geometry::Point(Some((lon, lat))))
}

fn parse_boundary(geojson: &GeoJson) -> Option<Geometry> {
    let coordinates = geojson.coordinates.as_ref()?;
    match geojson.kind.as_str() {
        "Polygon" => serde_json::from_value(coordinates.clone())
            .ok()
            .map(Geometry::Polygon),
        "MultiPolygon" => serde_json::from_value(coordinates.clone())
            .ok()
            .map(Geometry::MultiPolygon),
        // LineString and anything else falls back to the provider point.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_names_are_rejected() {
        for name in ["unknown", "None", "N/A", " not specified ", "UNSPECIFIED", ""] {
            assert!(is_placeholder_name(name), "{name:?} should be a placeholder");
        }
        assert!(!is_placeholder_name("Isle of Wight"));
    }

    #[test]
    fn polygon_geojson_parses() {
        let geojson = GeoJson {
            kind: "Polygon".to_string(),
            coordinates: Some(serde_json::json!([[
                [-71.0935, 42.3591],
                [-71.0917, 42.3591],
                [-71.0917, 42.3603],
                [-71.0935, 42.3591]
            ]])),
        };
        let Some(Geometry::Polygon(rings)) = parse_boundary(&geojson) else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 4);
    }

    #[test]
    fn linestring_geojson_is_refused() {
        let geojson = GeoJson {
            kind: "LineString".to_string(),
            coordinates: Some(serde_json::json!([[0.0, 0.0], [1.0, 1.0]])),
        };
        assert!(parse_boundary(&geojson).is_none());
    }

    #[test]
    fn provider_point_parses_string_coordinates() {
        let place = NominatimPlace {
            lon: "-1.2345".to_string(),
            lat: "50.6789".to_string(),
            geojson: None,
        };
        assert_eq!(
            provider_point(&place),
            Some(Geometry::Point(Some((-1.2345, 50.6789))))
        );
    }

    #[tokio::test]
    async fn placeholder_expansion_skips_the_network() {
        // An unroutable base URL proves no request is attempted.
        let config = GeocoderConfig {
            mapbox_token: Some("token".into()),
            mapbox_base_url: "http://127.0.0.1:1".into(),
            nominatim_base_url: "http://127.0.0.1:1".into(),
            ..GeocoderConfig::default()
        };
        let geocoder = Geocoder::new(config).unwrap();
        let result = geocoder.expand("unknown").await.unwrap();
        assert!(result.is_empty());
    }
}
