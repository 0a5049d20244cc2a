//! Typed fact records.
//!
//! The wire shapes mirror the JSON the extraction stage produces, so every
//! type here derives serde both ways. `Fact` is internally tagged on
//! `fact_type`, matching the structured-output schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A time window with optionally-open bounds.
///
/// Bounds are ISO-8601 strings in naive UTC, or short descriptor strings
/// ("start of the wedding") when no concrete timestamp could be resolved.
/// `None` means the bound is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalInterval {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl TemporalInterval {
    pub fn new(start_time: Option<String>, end_time: Option<String>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// Both bounds unknown.
    pub fn unknown() -> Self {
        Self {
            start_time: None,
            end_time: None,
        }
    }
}

/// Geometry attached to a spatial context.
///
/// A `Point` may carry no coordinates when geocoding failed; the name is
/// still stored so the fact keeps its spatial anchor.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Option<(f64, f64)>),
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
    Unknown,
}

impl Geometry {
    /// The `spatial_type` property value stored on a Context node.
    pub fn spatial_type(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Unknown => "unknown",
        }
    }

    /// Raw coordinates as a JSON value, `null` when absent.
    pub fn coordinates_json(&self) -> Value {
        match self {
            Geometry::Point(Some((lon, lat))) => serde_json::json!([lon, lat]),
            Geometry::Point(None) | Geometry::Unknown => Value::Null,
            Geometry::Polygon(rings) => serde_json::to_value(rings).unwrap_or(Value::Null),
            Geometry::MultiPolygon(polys) => serde_json::to_value(polys).unwrap_or(Value::Null),
        }
    }

    /// Total vertex count across all rings.
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Point(Some(_)) => 1,
            Geometry::Point(None) | Geometry::Unknown => 0,
            Geometry::Polygon(rings) => rings.iter().map(Vec::len).sum(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .map(|rings| rings.iter().map(Vec::len).sum::<usize>())
                .sum(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SpatialContextWire {
    name: String,
    #[serde(rename = "type")]
    spatial_type: String,
    #[serde(default)]
    coordinates: Option<Value>,
}

/// A named place with resolved geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpatialContextWire", into = "SpatialContextWire")]
pub struct SpatialContext {
    pub name: String,
    pub geometry: Geometry,
}

impl SpatialContext {
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    /// Placeholder for a name that could not be geocoded.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::Point(None),
        }
    }

    /// Context standing in when a fact has no spatial information.
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_string(),
            geometry: Geometry::Unknown,
        }
    }
}

impl TryFrom<SpatialContextWire> for SpatialContext {
    type Error = String;

    fn try_from(wire: SpatialContextWire) -> Result<Self, Self::Error> {
        let geometry = match wire.spatial_type.to_lowercase().as_str() {
            "point" => match wire.coordinates {
                Some(Value::Null) | None => Geometry::Point(None),
                Some(value) => {
                    let pair: [f64; 2] = serde_json::from_value(value)
                        .map_err(|e| format!("invalid point coordinates: {e}"))?;
                    Geometry::Point(Some((pair[0], pair[1])))
                }
            },
            "polygon" => match wire.coordinates {
                Some(Value::Null) | None => Geometry::Unknown,
                Some(value) => Geometry::Polygon(
                    serde_json::from_value(value)
                        .map_err(|e| format!("invalid polygon coordinates: {e}"))?,
                ),
            },
            "multipolygon" => match wire.coordinates {
                Some(Value::Null) | None => Geometry::Unknown,
                Some(value) => Geometry::MultiPolygon(
                    serde_json::from_value(value)
                        .map_err(|e| format!("invalid multipolygon coordinates: {e}"))?,
                ),
            },
            _ => Geometry::Unknown,
        };
        Ok(Self {
            name: wire.name,
            geometry,
        })
    }
}

impl From<SpatialContext> for SpatialContextWire {
    fn from(ctx: SpatialContext) -> Self {
        let coordinates = match ctx.geometry.coordinates_json() {
            Value::Null => None,
            value => Some(value),
        };
        Self {
            name: ctx.name,
            spatial_type: ctx.geometry.spatial_type().to_string(),
            coordinates,
        }
    }
}

/// A fully-resolved spatiotemporal fact ready for the graph writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFact {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    pub relation_type: String,
    #[serde(default)]
    pub temporal_intervals: Vec<TemporalInterval>,
    #[serde(default)]
    pub spatial_contexts: Vec<SpatialContext>,
}

/// Exact-match key identifying an asserted fact: subject set, object set,
/// and relation. Temporal and spatial data take no part in the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRef {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    pub relation_type: String,
}

impl From<&TemporalFact> for FactRef {
    fn from(fact: &TemporalFact) -> Self {
        Self {
            subjects: fact.subjects.clone(),
            objects: fact.objects.clone(),
            relation_type: fact.relation_type.clone(),
        }
    }
}

/// One conjunct of a cause group: a fact and the truth value that triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    #[serde(flatten)]
    pub fact: FactRef,
    pub triggered_by_state: bool,
}

/// A fact whose state must hold for an effect to fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredState {
    #[serde(flatten)]
    pub fact: FactRef,
    pub state: bool,
}

/// A downstream fact this event triggers, with optional extra preconditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(flatten)]
    pub fact: FactRef,
    pub triggers_state: bool,
    #[serde(default)]
    pub additional_required_states: Vec<RequiredState>,
}

/// The moment a fact transitions in truth value.
///
/// `caused_by` is a disjunction of conjunctions: `[[A], [B, C]]` reads
/// "A alone, or B and C together".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub affected_fact: FactRef,
    #[serde(default)]
    pub caused_by: Vec<Vec<Cause>>,
    #[serde(default)]
    pub causes: Vec<Effect>,
}

impl StateChangeEvent {
    /// Skeleton event with empty causality, as seeded before inference.
    pub fn skeleton(fact: &TemporalFact) -> Self {
        Self {
            affected_fact: FactRef::from(fact),
            caused_by: Vec::new(),
            causes: Vec::new(),
        }
    }
}

/// Only the fields a modification changes; everything else stays untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_intervals: Option<Vec<TemporalInterval>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_contexts: Option<Vec<SpatialContext>>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_none()
            && self.objects.is_none()
            && self.relation_type.is_none()
            && self.temporal_intervals.is_none()
            && self.spatial_contexts.is_none()
    }
}

/// A retroactive correction to an already-asserted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub affected_fact: FactRef,
    #[serde(rename = "modify_fields_to")]
    pub changes: FieldChanges,
}

/// Any record the pipeline can hand to the graph writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact_type", rename_all = "snake_case")]
pub enum Fact {
    TemporalFact(TemporalFact),
    StateChangeEvent(StateChangeEvent),
    Modification(Modification),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_context_point_round_trips() {
        let json = serde_json::json!({
            "name": "Imperial College London",
            "type": "Point",
            "coordinates": [-0.179359, 51.498711]
        });
        let ctx: SpatialContext = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(ctx.geometry, Geometry::Point(Some((-0.179359, 51.498711))));
        assert_eq!(serde_json::to_value(&ctx).unwrap(), json);
    }

    #[test]
    fn spatial_context_null_coordinates_parse_as_unresolved_point() {
        let json = serde_json::json!({"name": "nowhere", "type": "Point", "coordinates": null});
        let ctx: SpatialContext = serde_json::from_value(json).unwrap();
        assert_eq!(ctx.geometry, Geometry::Point(None));
        // Serialising drops the null coordinates field entirely.
        let out = serde_json::to_value(&ctx).unwrap();
        assert!(out.get("coordinates").is_none());
    }

    #[test]
    fn polygon_vertex_count_sums_rings() {
        let geometry = Geometry::Polygon(vec![
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]],
            vec![[0.2, 0.2], [0.4, 0.2], [0.3, 0.4], [0.2, 0.2]],
        ]);
        assert_eq!(geometry.vertex_count(), 8);
    }

    #[test]
    fn fact_enum_is_tagged_on_fact_type() {
        let fact = Fact::TemporalFact(TemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: vec![],
        });
        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["fact_type"], "temporal_fact");

        let back: Fact = serde_json::from_value(value).unwrap();
        assert_eq!(back, fact);
    }

    #[test]
    fn state_change_event_parses_nested_causality() {
        let json = serde_json::json!({
            "fact_type": "state_change_event",
            "affected_fact": {
                "subjects": ["Will"],
                "objects": ["Imperial Department of Computing"],
                "relation_type": "works for"
            },
            "caused_by": [[{
                "subjects": ["Will"],
                "objects": ["university"],
                "relation_type": "graduates from",
                "triggered_by_state": true
            }]],
            "causes": []
        });
        let Fact::StateChangeEvent(event) = serde_json::from_value(json).unwrap() else {
            panic!("expected state change event");
        };
        assert_eq!(event.caused_by.len(), 1);
        assert_eq!(event.caused_by[0][0].fact.relation_type, "graduates from");
        assert!(event.caused_by[0][0].triggered_by_state);
    }

    #[test]
    fn modification_only_carries_changed_fields() {
        let json = serde_json::json!({
            "fact_type": "modification",
            "affected_fact": {
                "fact_type": "temporal_fact",
                "subjects": ["John"],
                "objects": ["books"],
                "relation_type": "likes"
            },
            "modify_fields_to": {"objects": ["magazines"]}
        });
        let Fact::Modification(m) = serde_json::from_value(json).unwrap() else {
            panic!("expected modification");
        };
        assert_eq!(m.changes.objects.as_deref(), Some(&["magazines".to_string()][..]));
        assert!(m.changes.subjects.is_none());
        assert!(m.changes.temporal_intervals.is_none());
    }
}
