//! Content-addressed identity and literal escaping.
//!
//! Every Context and Hyperedge id is fully determined by its semantic
//! content, so re-ingesting equivalent data collapses onto the same node.
//! All hashing runs over SHA-1 truncated to the first 16 hex characters.
//!
//! Null temporal bounds normalise to the `__NULL__` token before hashing so
//! "unknown start" has a single identity regardless of how the absence was
//! spelled upstream (`None`, empty string, or the literal `null`).

use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::fact::Geometry;

const NULL_TOKEN: &str = "__NULL__";

/// Escape a string for embedding in a single-quoted Cypher literal.
///
/// Standard Cypher escaping doubles single quotes. Must be applied to every
/// user-supplied string that is interpolated rather than parameterised.
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

fn sha1_hex16(input: &str) -> String {
    let digest = Sha1::digest(input.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn time_key(bound: Option<&str>) -> &str {
    match bound {
        Some(s) if !s.is_empty() && s != "null" => s,
        _ => NULL_TOKEN,
    }
}

/// Signature of a geometry for context identity.
///
/// Points use their coordinates rounded to 6 decimal places; anything else
/// hashes its minified JSON form so byte-identical geometry collapses.
pub fn coordinate_signature(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(Some((lon, lat))) => {
            format!("pt:{}:{}", round6(*lon), round6(*lat))
        }
        _ => {
            let minified = match geometry.coordinates_json() {
                serde_json::Value::Null => "null".to_string(),
                value => value.to_string(),
            };
            format!("geo:{}", sha1_hex16(&minified))
        }
    }
}

/// Deterministic Context node id over `(start, end, name, type, geometry)`.
pub fn context_id(
    start_time: Option<&str>,
    end_time: Option<&str>,
    location_name: &str,
    geometry: &Geometry,
) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        time_key(start_time),
        time_key(end_time),
        escape_single_quotes(location_name),
        escape_single_quotes(geometry.spatial_type()),
        coordinate_signature(geometry),
    );
    format!("ctx_{}", sha1_hex16(&key))
}

/// Deterministic Hyperedge id over `(relation, subjects, objects, contexts)`.
///
/// Subjects and objects are sorted so order of mention is irrelevant;
/// context ids are sorted and deduplicated.
pub fn hyperedge_id(
    relation_type: &str,
    subjects: &[String],
    objects: &[String],
    context_ids: &[String],
) -> String {
    let mut sorted_subjects: Vec<String> =
        subjects.iter().map(|s| escape_single_quotes(s)).collect();
    sorted_subjects.sort();
    let mut sorted_objects: Vec<String> = objects.iter().map(|o| escape_single_quotes(o)).collect();
    sorted_objects.sort();
    let mut sorted_contexts: Vec<String> = context_ids.to_vec();
    sorted_contexts.sort();
    sorted_contexts.dedup();

    let key = [
        escape_single_quotes(relation_type),
        sorted_subjects.join("|"),
        sorted_objects.join("|"),
        sorted_contexts.join("|"),
    ]
    .join("||");
    format!("he_{}", sha1_hex16(&key))
}

/// Random id for a StateChangeEvent node.
pub fn event_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("sce_{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escape_doubles_single_quotes() {
        assert_eq!(escape_single_quotes("the farmers' market"), "the farmers'' market");
        assert_eq!(escape_single_quotes("no quotes"), "no quotes");
    }

    #[test]
    fn point_signature_rounds_to_six_places() {
        let geometry = Geometry::Point(Some((-0.1793591234, 51.4987112345)));
        assert_eq!(coordinate_signature(&geometry), "pt:-0.179359:51.498711");
    }

    #[test]
    fn unresolved_point_and_unknown_share_the_null_signature() {
        let a = coordinate_signature(&Geometry::Point(None));
        let b = coordinate_signature(&Geometry::Unknown);
        assert_eq!(a, b);
        assert!(a.starts_with("geo:"));
    }

    #[test]
    fn polygon_signature_is_stable_across_calls() {
        let geometry = Geometry::Polygon(vec![vec![
            [-71.0935, 42.3591],
            [-71.0917, 42.3591],
            [-71.0917, 42.3603],
            [-71.0935, 42.3591],
        ]]);
        assert_eq!(coordinate_signature(&geometry), coordinate_signature(&geometry.clone()));
    }

    #[test]
    fn null_bounds_collapse_to_one_context_id() {
        let g = Geometry::Unknown;
        let a = context_id(None, None, "unknown", &g);
        let b = context_id(Some(""), Some("null"), "unknown", &g);
        assert_eq!(a, b);
        assert!(a.starts_with("ctx_"));
        assert_eq!(a.len(), 4 + 16);
    }

    #[test]
    fn context_id_distinguishes_locations() {
        let g = Geometry::Unknown;
        let home = context_id(None, None, "home", &g);
        let away = context_id(None, None, "away", &g);
        assert_ne!(home, away);
    }

    #[test]
    fn duplicate_context_ids_do_not_change_hyperedge_identity() {
        let ctx = context_id(Some("2020-01-01T00:00:00"), None, "home", &Geometry::Unknown);
        let once = hyperedge_id("likes", &["John".into()], &["cats".into()], &[ctx.clone()]);
        let twice = hyperedge_id(
            "likes",
            &["John".into()],
            &["cats".into()],
            &[ctx.clone(), ctx],
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn event_ids_are_prefixed_and_unique() {
        let a = event_id();
        let b = event_id();
        assert!(a.starts_with("sce_"));
        assert_eq!(a.len(), 4 + 8);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn hyperedge_id_ignores_mention_order(
            mut subjects in proptest::collection::vec("[A-Za-z ]{1,12}", 1..5),
            mut objects in proptest::collection::vec("[A-Za-z ]{1,12}", 0..5),
        ) {
            let forward = hyperedge_id("relates to", &subjects, &objects, &[]);
            subjects.reverse();
            objects.reverse();
            let reversed = hyperedge_id("relates to", &subjects, &objects, &[]);
            prop_assert_eq!(forward, reversed);
        }
    }
}
