//! Causal inference over committed facts.
//!
//! Runs once per input text, strictly after every temporal fact committed:
//! the writer matches referenced facts by exact `(subjects, objects,
//! relation)` equality, so a missing target would fail silently.

use serde::Deserialize;
use serde_json::{json, Value};

use hypergraph::{StateChangeEvent, TemporalFact};
use llm::{ChatClient, ChatMessage, ResponseFormat};

use crate::extract::validate_against;

const CAUSAL_SYSTEM_PROMPT: &str = r#"You are a data extraction agent.
Complete the causality fields of the partial structured state facts by analysing the input text.

RULES:
1. Do not change the structure of the input facts - only fill the empty caused_by and causes fields when the text states a genuine causal link.
2. Keep "affected_fact" exactly as provided.
3. Normalise to positive causality: what makes a fact True, and what its being True causes to happen or not happen.
4. Reference facts by their exact subjects, objects, and relation_type from the input, including capitalisation.
5. caused_by is a list of lists: [[A], [B, C]] means "A alone OR (B and C together)". Each reference carries triggered_by_state (true/false).
6. Each causes entry carries triggers_state (true/false) and additional_required_states (extra conditions, may be empty).
7. A fact with no objects keeps "objects": [] in every reference; never omit the field.
8. Leave caused_by and causes empty when there is no genuine causal link.
9. Return ONLY the completed JSON, no commentary.

EXAMPLE:
Text: "Graduating from university caused Will to work for the Imperial Department of Computing from 2020 until 2025."
The event for (Will, [university], graduates from) causes (Will, [Imperial Department of Computing], works for) with triggers_state true, and the works-for event is caused_by [[the graduates-from reference with triggered_by_state true]]."#;

fn fact_reference_properties() -> Value {
    json!({
        "subjects": {"type": "array", "items": {"type": "string"}},
        "objects": {"type": "array", "items": {"type": "string"}},
        "relation_type": {"type": "string"}
    })
}

/// JSON schema the causal completion must satisfy.
pub fn state_event_schema() -> Value {
    let mut cause = fact_reference_properties();
    cause["triggered_by_state"] = json!({"type": "boolean"});
    let mut required_state = fact_reference_properties();
    required_state["state"] = json!({"type": "boolean"});
    let mut effect = fact_reference_properties();
    effect["triggers_state"] = json!({"type": "boolean"});
    effect["additional_required_states"] = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": required_state,
            "required": ["subjects", "objects", "relation_type", "state"]
        }
    });

    json!({
        "type": "object",
        "properties": {
            "state_facts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "fact_type": {"type": "string", "enum": ["state_change_event"]},
                        "affected_fact": {
                            "type": "object",
                            "properties": fact_reference_properties(),
                            "required": ["subjects", "objects", "relation_type"]
                        },
                        "caused_by": {
                            "type": "array",
                            "items": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": cause,
                                    "required": [
                                        "subjects", "objects", "relation_type", "triggered_by_state"
                                    ]
                                }
                            }
                        },
                        "causes": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": effect,
                                "required": [
                                    "subjects", "objects", "relation_type",
                                    "triggers_state", "additional_required_states"
                                ]
                            }
                        }
                    },
                    "required": ["fact_type", "affected_fact", "caused_by", "causes"]
                }
            }
        },
        "required": ["state_facts"]
    })
}

/// One skeleton event per committed fact, with empty causality.
pub fn skeleton_events(facts: &[TemporalFact]) -> Vec<StateChangeEvent> {
    facts.iter().map(StateChangeEvent::skeleton).collect()
}

#[derive(Deserialize)]
struct CausalEnvelope {
    #[serde(default)]
    state_facts: Vec<StateChangeEvent>,
}

/// Fill in `caused_by`/`causes` over the whole input text.
///
/// Any failure - transport, schema, parse - returns the skeletons
/// unchanged so the events still land in the graph without causality.
pub async fn infer_causality(
    client: &ChatClient,
    model: &str,
    whole_text: &str,
    skeletons: Vec<StateChangeEvent>,
) -> Vec<StateChangeEvent> {
    if skeletons.is_empty() {
        return skeletons;
    }

    let skeleton_json = match serde_json::to_string_pretty(
        &skeletons
            .iter()
            .map(|event| {
                let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
                value["fact_type"] = json!("state_change_event");
                value
            })
            .collect::<Vec<_>>(),
    ) {
        Ok(json) => json,
        Err(error) => {
            tracing::warn!(%error, "failed to serialise skeletons");
            return skeletons;
        }
    };

    let schema = state_event_schema();
    let messages = vec![
        ChatMessage::system(CAUSAL_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Input text:\n{whole_text}\n\nPartial structured state facts:\n{skeleton_json}"
        )),
    ];
    let response = match client
        .chat(
            model,
            messages,
            Some(ResponseFormat::json_schema("state_change_event_schema", schema.clone())),
        )
        .await
    {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, "causal inference call failed, keeping skeletons");
            return skeletons;
        }
    };

    let instance: Value = match serde_json::from_str(response.trim()) {
        Ok(instance) => instance,
        Err(error) => {
            tracing::warn!(%error, "causal inference returned malformed JSON, keeping skeletons");
            return skeletons;
        }
    };
    if let Err(error) = validate_against(&schema, &instance) {
        tracing::warn!(%error, "causal inference violated its schema, keeping skeletons");
        return skeletons;
    }
    match serde_json::from_value::<CausalEnvelope>(instance) {
        Ok(envelope) if !envelope.state_facts.is_empty() => envelope.state_facts,
        Ok(_) => skeletons,
        Err(error) => {
            tracing::warn!(%error, "causal inference parse failed, keeping skeletons");
            skeletons
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergraph::TemporalInterval;

    fn fact(subjects: &[&str], objects: &[&str], relation: &str) -> TemporalFact {
        TemporalFact {
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            objects: objects.iter().map(|o| o.to_string()).collect(),
            relation_type: relation.to_string(),
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: vec![],
        }
    }

    #[test]
    fn one_skeleton_per_fact_with_empty_causality() {
        let facts = vec![
            fact(&["Will"], &["university"], "graduates from"),
            fact(&["Will"], &["Imperial"], "works for"),
        ];
        let skeletons = skeleton_events(&facts);
        assert_eq!(skeletons.len(), 2);
        assert!(skeletons.iter().all(|s| s.caused_by.is_empty() && s.causes.is_empty()));
        assert_eq!(skeletons[0].affected_fact.subjects, vec!["Will"]);
    }

    #[test]
    fn completed_causality_passes_the_schema() {
        let instance = json!({
            "state_facts": [{
                "fact_type": "state_change_event",
                "affected_fact": {
                    "subjects": ["Will"], "objects": ["Imperial"], "relation_type": "works for"
                },
                "caused_by": [[{
                    "subjects": ["Will"], "objects": ["university"],
                    "relation_type": "graduates from", "triggered_by_state": true
                }]],
                "causes": []
            }]
        });
        assert!(validate_against(&state_event_schema(), &instance).is_ok());

        let envelope: CausalEnvelope = serde_json::from_value(instance).unwrap();
        assert_eq!(envelope.state_facts.len(), 1);
        assert_eq!(envelope.state_facts[0].caused_by[0][0].fact.relation_type, "graduates from");
    }

    #[test]
    fn missing_trigger_flag_fails_the_schema() {
        let instance = json!({
            "state_facts": [{
                "fact_type": "state_change_event",
                "affected_fact": {
                    "subjects": ["Will"], "objects": [], "relation_type": "dies"
                },
                "caused_by": [[{
                    "subjects": ["X"], "objects": [], "relation_type": "happens"
                }]],
                "causes": []
            }]
        });
        assert!(validate_against(&state_event_schema(), &instance).is_err());
    }
}
