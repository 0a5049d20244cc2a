//! Schema-constrained structured extraction.
//!
//! Parses canonical sentences into raw temporal facts. The LLM response is
//! validated against the declared JSON schema before deserialisation; a
//! response that fails validation drops the sentence with a warning rather
//! than letting malformed facts reach the graph.

use serde::Deserialize;
use serde_json::{json, Value};

use hypergraph::TemporalInterval;
use llm::{ChatClient, ChatMessage, ResponseFormat};

use crate::error::{PipelineError, Result};

const EXTRACT_SYSTEM_PROMPT: &str = r#"You are a data extraction agent.
Parse each sentence in the input text into structured temporal facts.

RULES:
1. Always set "fact_type" to "temporal_fact".
2. The input sentences are formatted as "[Subjects] : relation : [objects] ...":
   - Subjects are everything before the first colon.
   - relation_type is the text between the first and second colon.
   - Objects are everything after the second colon up to the first occurrence of " from " or " at " or the end of the sentence. If nothing appears there, objects is [].
   - Split multiple subjects/objects on the word "and", preserving each entity's internal wording and articles. NEVER split on "&"; an entity containing "&" stays one string.
   - A "from ... to ..." or "at ..." phrase is never an object.
3. Times may be ISO 8601 timestamps (YYYY-MM-DDTHH:MM:SS) or string descriptors, exactly as given. If only one bound is present the other is null; with no time information both are null. Do not convert time zones - timestamps are already UTC.
4. Combinable vs paired contexts:
   - Consecutive "from ... to ..." phrases with no "and" between them are COMBINABLE with every listed location.
   - Pair blocks separated by "and" ("from t1 ... at L1 and from t2 ... at L2") are DISTINCT pairs; keep the pairing and never cross-combine.
5. spatial_contexts holds each location named after "at". With no location, return [null]. Never emit placeholder text.
6. One JSON object per sentence, even when it has several intervals.

EXAMPLES:
- "Alice and Bob : faints : from 2020 to 2021 at the party" -> subjects ["Alice", "Bob"], objects [], relation_type "faints", spatial_contexts ["the party"]
- "The farmers' market : sets up : from 2025-10-07T11:00:00 to unknown from 2025-10-14T11:00:00 to unknown at Imperial College London" -> two combinable intervals, one location
- "The lecture : can run : from 2025-10-01T17:00:00 to 2025-10-01T18:00:00 at London and from 2025-10-01T22:00:00 to 2025-10-01T23:00:00 at Bristol" -> two distinct pairs, never cross-combined"#;

/// JSON schema the extractor's response must satisfy.
pub fn temporal_fact_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "facts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "fact_type": {"type": "string", "enum": ["temporal_fact"]},
                        "subjects": {"type": "array", "items": {"type": "string"}},
                        "objects": {"type": "array", "items": {"type": "string"}},
                        "relation_type": {"type": "string"},
                        "temporal_intervals": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "start_time": {"type": ["string", "null"]},
                                    "end_time": {"type": ["string", "null"]}
                                },
                                "required": ["start_time", "end_time"]
                            }
                        },
                        "spatial_contexts": {
                            "type": "array",
                            "items": {"type": ["string", "null"]}
                        }
                    },
                    "required": [
                        "fact_type", "subjects", "relation_type",
                        "temporal_intervals", "spatial_contexts"
                    ]
                }
            }
        },
        "required": ["facts"]
    })
}

/// A temporal fact before spatial expansion: locations are still names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTemporalFact {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    pub relation_type: String,
    #[serde(default)]
    pub temporal_intervals: Vec<TemporalInterval>,
    #[serde(default)]
    pub spatial_contexts: Vec<Option<String>>,
}

#[derive(Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    facts: Vec<RawTemporalFact>,
}

/// Check an instance against a schema, returning the first violation.
pub(crate) fn validate_against(schema: &Value, instance: &Value) -> Result<()> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| PipelineError::Schema(e.to_string()))?;
    if let Err(mut errors) = compiled.validate(instance) {
        let detail = errors
            .next()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "schema validation failed".to_string());
        return Err(PipelineError::Schema(detail));
    }
    Ok(())
}

/// Extract raw temporal facts from canonical text.
pub async fn extract_facts(
    client: &ChatClient,
    model: &str,
    canonical_text: &str,
) -> Result<Vec<RawTemporalFact>> {
    let schema = temporal_fact_schema();
    let messages = vec![
        ChatMessage::system(EXTRACT_SYSTEM_PROMPT),
        ChatMessage::user(format!("Chunk to process:\n{canonical_text}")),
    ];
    let response = client
        .chat(
            model,
            messages,
            Some(ResponseFormat::json_schema("temporal_fact_schema", schema.clone())),
        )
        .await?;

    let instance: Value = serde_json::from_str(response.trim())?;
    validate_against(&schema, &instance)?;
    let envelope: ExtractionEnvelope = serde_json::from_value(instance)?;
    Ok(envelope.facts)
}

/// Drop placeholder junk before it reaches the graph: `?` and `unknown`
/// entities, empty relations. A fact left with no subjects or no relation
/// is discarded entirely; objects may legitimately end up empty.
pub fn sanitise_fact(mut fact: RawTemporalFact) -> Option<RawTemporalFact> {
    let relation = fact.relation_type.trim();
    if relation.is_empty() || relation.eq_ignore_ascii_case("unknown") || relation == "?" {
        return None;
    }
    fact.relation_type = relation.to_string();

    let clean_entities = |values: &[String]| -> Vec<String> {
        values
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != "?" && !v.eq_ignore_ascii_case("unknown"))
            .collect()
    };
    fact.subjects = clean_entities(&fact.subjects);
    if fact.subjects.is_empty() {
        return None;
    }
    fact.objects = clean_entities(&fact.objects);
    Some(fact)
}
