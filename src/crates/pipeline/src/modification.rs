//! Modification extraction.
//!
//! Parses correction sentences ("Actually, John likes magazines, not
//! books.") into typed [`Modification`] records. Location names inside a
//! spatial change are geocoded before the record reaches the writer.

use serde::Deserialize;
use serde_json::{json, Value};

use geocoder::Geocoder;
use hypergraph::{FactRef, FieldChanges, Modification, SpatialContext, TemporalInterval};
use llm::{ChatClient, ChatMessage, ResponseFormat};

use crate::error::Result;
use crate::extract::validate_against;

const MODIFICATION_SYSTEM_PROMPT: &str = r#"You are a data extraction agent.
Parse sentences that describe corrections to temporal facts into structured JSON.

A temporal fact has: subjects, objects (may be [] - times and locations are NOT objects),
relation_type (exactly one, present tense singular), temporal_intervals
({start_time, end_time}), and spatial_contexts (location names).

RULES:
1. Always set "fact_type" to "modification".
2. "affected_fact" identifies the original fact ONLY by subjects, objects, and relation_type.
3. "modify_fields_to" holds ONLY the fields that change, with their corrected values. Keys are any of subjects, objects, relation_type, temporal_intervals, spatial_contexts. Never repeat unchanged fields, and never set a field to null unless the correction is "becomes unknown".
4. If only one bound of an interval changes, include just that bound.
5. Multiple corrections produce multiple modification objects. Always return an array.

EXAMPLES:
"Actually, John likes magazines, not books." ->
[{"fact_type": "modification",
  "affected_fact": {"subjects": ["John"], "objects": ["books"], "relation_type": "likes"},
  "modify_fields_to": {"objects": ["magazines"]}}]

"Correction: John died in 1996, not 1995." ->
[{"fact_type": "modification",
  "affected_fact": {"subjects": ["John"], "objects": [], "relation_type": "dies"},
  "modify_fields_to": {"temporal_intervals": [
      {"start_time": "1996-01-01T00:00:00", "end_time": "1996-12-31T23:59:59"}]}}]"#;

/// JSON schema the modification extraction must satisfy.
pub fn modification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "modifications": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "fact_type": {"type": "string", "enum": ["modification"]},
                        "affected_fact": {
                            "type": "object",
                            "properties": {
                                "subjects": {"type": "array", "items": {"type": "string"}},
                                "objects": {"type": "array", "items": {"type": "string"}},
                                "relation_type": {"type": "string"}
                            },
                            "required": ["subjects", "objects", "relation_type"]
                        },
                        "modify_fields_to": {
                            "type": "object",
                            "additionalProperties": true
                        }
                    },
                    "required": ["fact_type", "affected_fact", "modify_fields_to"]
                }
            }
        },
        "required": ["modifications"]
    })
}

#[derive(Debug, Deserialize)]
struct RawFieldChanges {
    #[serde(default)]
    subjects: Option<Vec<String>>,
    #[serde(default)]
    objects: Option<Vec<String>>,
    #[serde(default)]
    relation_type: Option<String>,
    #[serde(default)]
    temporal_intervals: Option<Vec<TemporalInterval>>,
    /// Location names; geocoded into full spatial contexts below.
    #[serde(default)]
    spatial_contexts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawModification {
    affected_fact: FactRef,
    modify_fields_to: RawFieldChanges,
}

#[derive(Deserialize)]
struct ModificationEnvelope {
    #[serde(default)]
    modifications: Vec<RawModification>,
}

async fn resolve_spatial_change(
    geocoder: &Geocoder,
    names: Vec<String>,
) -> Vec<SpatialContext> {
    let mut contexts = Vec::new();
    for name in names {
        match geocoder.expand(&name).await {
            Ok(resolved) if resolved.is_empty() => contexts.push(SpatialContext::unresolved(name)),
            Ok(resolved) => contexts.extend(resolved),
            Err(error) => {
                tracing::warn!(%error, name, "geocoding modification target failed");
                contexts.push(SpatialContext::unresolved(name));
            }
        }
    }
    contexts
}

/// Extract modifications from the modification text and geocode any
/// corrected locations.
pub async fn extract_modifications(
    client: &ChatClient,
    geocoder: &Geocoder,
    model: &str,
    modification_text: &str,
) -> Result<Vec<Modification>> {
    let schema = modification_schema();
    let messages = vec![
        ChatMessage::system(MODIFICATION_SYSTEM_PROMPT),
        ChatMessage::user(format!("Modification text:\n{modification_text}")),
    ];
    let response = client
        .chat(
            model,
            messages,
            Some(ResponseFormat::json_schema("modification_schema", schema.clone())),
        )
        .await?;

    let instance: Value = serde_json::from_str(response.trim())?;
    validate_against(&schema, &instance)?;
    let envelope: ModificationEnvelope = serde_json::from_value(instance)?;

    let mut modifications = Vec::with_capacity(envelope.modifications.len());
    for raw in envelope.modifications {
        let spatial_contexts = match raw.modify_fields_to.spatial_contexts {
            Some(names) => Some(resolve_spatial_change(geocoder, names).await),
            None => None,
        };
        modifications.push(Modification {
            affected_fact: raw.affected_fact,
            changes: FieldChanges {
                subjects: raw.modify_fields_to.subjects,
                objects: raw.modify_fields_to.objects,
                relation_type: raw.modify_fields_to.relation_type,
                temporal_intervals: raw.modify_fields_to.temporal_intervals,
                spatial_contexts,
            },
        });
    }
    Ok(modifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_correction_parses() {
        let instance = json!({
            "modifications": [{
                "fact_type": "modification",
                "affected_fact": {
                    "subjects": ["John"], "objects": ["books"], "relation_type": "likes"
                },
                "modify_fields_to": {"objects": ["magazines"]}
            }]
        });
        assert!(validate_against(&modification_schema(), &instance).is_ok());

        let envelope: ModificationEnvelope = serde_json::from_value(instance).unwrap();
        let raw = &envelope.modifications[0];
        assert_eq!(raw.affected_fact.objects, vec!["books"]);
        assert_eq!(raw.modify_fields_to.objects.as_deref(), Some(&["magazines".to_string()][..]));
        assert!(raw.modify_fields_to.temporal_intervals.is_none());
    }

    #[test]
    fn partial_interval_correction_parses() {
        let envelope: ModificationEnvelope = serde_json::from_value(json!({
            "modifications": [{
                "fact_type": "modification",
                "affected_fact": {
                    "subjects": ["Tom"], "objects": ["Physics"], "relation_type": "studies"
                },
                "modify_fields_to": {
                    "temporal_intervals": [{"end_time": "2025-12-31T23:59:59"}]
                }
            }]
        }))
        .unwrap();
        let intervals = envelope.modifications[0]
            .modify_fields_to
            .temporal_intervals
            .as_ref()
            .unwrap();
        assert_eq!(intervals[0].start_time, None);
        assert_eq!(intervals[0].end_time.as_deref(), Some("2025-12-31T23:59:59"));
    }

    #[test]
    fn missing_affected_fact_fails_the_schema() {
        let instance = json!({
            "modifications": [{
                "fact_type": "modification",
                "modify_fields_to": {"objects": ["magazines"]}
            }]
        });
        assert!(validate_against(&modification_schema(), &instance).is_err());
    }
}
