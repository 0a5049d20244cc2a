//! Spatial expansion: location names to geometry.

use geocoder::{is_placeholder_name, Geocoder};
use hypergraph::{SpatialContext, TemporalFact};

use crate::extract::RawTemporalFact;

/// Replace a raw fact's location names with geocoded spatial contexts.
///
/// Placeholder names are dropped; a name neither provider can resolve is
/// kept as an unresolved point so the fact retains its spatial anchor.
pub async fn expand_fact(geocoder: &Geocoder, raw: RawTemporalFact) -> TemporalFact {
    let mut spatial_contexts: Vec<SpatialContext> = Vec::new();

    for name in raw.spatial_contexts.iter().flatten() {
        let name = name.trim();
        if is_placeholder_name(name) {
            continue;
        }
        match geocoder.expand(name).await {
            Ok(resolved) if resolved.is_empty() => {
                spatial_contexts.push(SpatialContext::unresolved(name));
            }
            Ok(resolved) => spatial_contexts.extend(resolved),
            Err(error) => {
                tracing::warn!(%error, name, "geocoding failed, keeping unresolved placeholder");
                spatial_contexts.push(SpatialContext::unresolved(name));
            }
        }
    }

    TemporalFact {
        subjects: raw.subjects,
        objects: raw.objects,
        relation_type: raw.relation_type,
        temporal_intervals: raw.temporal_intervals,
        spatial_contexts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocoder::GeocoderConfig;
    use hypergraph::TemporalInterval;

    fn offline_geocoder() -> Geocoder {
        // Unroutable providers: every real lookup fails fast.
        let config = GeocoderConfig {
            mapbox_token: None,
            mapbox_base_url: "http://127.0.0.1:1".into(),
            nominatim_base_url: "http://127.0.0.1:1".into(),
            ..GeocoderConfig::default()
        };
        Geocoder::new(config).expect("geocoder builds")
    }

    fn raw(locations: Vec<Option<String>>) -> RawTemporalFact {
        RawTemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: locations,
        }
    }

    #[tokio::test]
    async fn nulls_and_placeholders_are_dropped() {
        let geocoder = offline_geocoder();
        let fact = expand_fact(&geocoder, raw(vec![None, Some("unknown".into()), Some("n/a".into())]))
            .await;
        assert!(fact.spatial_contexts.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_names_keep_a_placeholder() {
        let geocoder = offline_geocoder();
        let fact = expand_fact(&geocoder, raw(vec![Some("Atlantis".into())])).await;
        assert_eq!(fact.spatial_contexts.len(), 1);
        assert_eq!(fact.spatial_contexts[0], SpatialContext::unresolved("Atlantis"));
    }

    #[tokio::test]
    async fn fact_fields_carry_over() {
        let geocoder = offline_geocoder();
        let fact = expand_fact(&geocoder, raw(vec![])).await;
        assert_eq!(fact.subjects, vec!["John"]);
        assert_eq!(fact.relation_type, "likes");
        assert_eq!(fact.temporal_intervals.len(), 1);
    }
}
