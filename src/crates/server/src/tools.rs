//! Graph tools exposed to the ask loop.

use serde_json::{json, Value};

use graph_store::{GraphStore, SpatioTemporalFilter};
use llm::ToolDefinition;

/// Tool definitions advertised to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            "get_entities_by_relation",
            "Return distinct entity IDs that participate in hyperedges whose relation_type \
             matches the provided relation phrase (case-insensitive, substring allowed).",
            json!({
                "type": "object",
                "properties": {
                    "relation": {
                        "type": "string",
                        "description": "The relation keyword or phrase to search for, e.g. 'study' or 'studies'."
                    }
                },
                "required": ["relation"],
                "additionalProperties": false
            }),
        ),
        ToolDefinition::function(
            "query_facts",
            "Query hyperedges (facts) with optional filters for entities (subjects/objects/any), \
             temporal validity, and spatial context by name or polygon area.",
            json!({
                "type": "object",
                "properties": {
                    "subjects": {"type": "array", "items": {"type": "string"}, "description": "Subject entity IDs to include (any match)."},
                    "objects": {"type": "array", "items": {"type": "string"}, "description": "Object entity IDs to include (any match)."},
                    "entities": {"type": "array", "items": {"type": "string"}, "description": "Entity IDs appearing in either role (any match)."},
                    "start_time": {"type": ["string", "null"], "description": "Start of validity interval (ISO-8601)."},
                    "end_time": {"type": ["string", "null"], "description": "End of validity interval (ISO-8601)."},
                    "at_time": {"type": ["string", "null"], "description": "Instant that must lie within the fact's interval (ISO-8601)."},
                    "location_names": {"type": "array", "items": {"type": "string"}, "description": "Location names for contexts (any match)."},
                    "area_coordinates": {
                        "type": "array",
                        "items": {"type": "array", "items": {"type": "number"}, "minItems": 2, "maxItems": 2},
                        "description": "Polygon as list of [lon, lat] pairs (>=3)."
                    },
                    "include_spatially_unconstrained": {"type": "boolean", "description": "When spatial filters are provided, include facts without spatial context."},
                    "include_temporally_unconstrained": {"type": "boolean", "description": "When temporal filters are provided, include facts without temporal context."},
                    "limit": {"type": "integer", "description": "Max number of facts to return (default 100)."}
                },
                "additionalProperties": false
            }),
        ),
    ]
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value[key]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn opt_string(value: &Value, key: &str) -> Option<String> {
    value[key].as_str().map(str::to_string)
}

/// Execute a named tool against the store, returning a JSON result the
/// validator can inspect. Unknown tools return an error payload.
pub async fn execute_tool(name: &str, arguments: &Value, store: &GraphStore) -> Value {
    match name {
        "get_entities_by_relation" => {
            let relation = opt_string(arguments, "relation").unwrap_or_default();
            if relation.trim().is_empty() {
                return json!({"entities": [], "message": "Empty relation provided"});
            }
            match store.entities_by_relation(relation.trim()).await {
                Ok(entities) => json!({"entities": entities}),
                Err(error) => json!({"entities": [], "error": format!("Graph query failed: {error}")}),
            }
        }
        "query_facts" => {
            let subjects = string_list(arguments, "subjects");
            let objects = string_list(arguments, "objects");
            let entities = string_list(arguments, "entities");
            let mut start_time = opt_string(arguments, "start_time");
            let mut end_time = opt_string(arguments, "end_time");
            if let Some(at) = opt_string(arguments, "at_time") {
                // An instant means containment: use it as both bounds.
                if start_time.is_none() && end_time.is_none() {
                    start_time = Some(at.clone());
                    end_time = Some(at);
                }
            }
            let location_names = {
                let names = string_list(arguments, "location_names");
                (!names.is_empty()).then_some(names)
            };
            let area: Option<Vec<[f64; 2]>> = arguments["area_coordinates"]
                .as_array()
                .map(|pairs| {
                    pairs
                        .iter()
                        .filter_map(|pair| {
                            let lon = pair.get(0)?.as_f64()?;
                            let lat = pair.get(1)?.as_f64()?;
                            Some([lon, lat])
                        })
                        .collect::<Vec<_>>()
                })
                .filter(|pairs| !pairs.is_empty());
            let limit = arguments["limit"].as_i64().unwrap_or(100).max(1);

            let filter = SpatioTemporalFilter {
                start_time,
                end_time,
                location_names,
                location_coordinates: area,
                include_spatially_unconstrained: arguments["include_spatially_unconstrained"]
                    .as_bool()
                    .unwrap_or(false),
                include_temporally_unconstrained: arguments["include_temporally_unconstrained"]
                    .as_bool()
                    .unwrap_or(false),
            };

            let candidates = if filter.is_empty() {
                None
            } else {
                match store.query_spatiotemporal(&filter).await {
                    Ok(ids) => Some(ids),
                    Err(error) => {
                        return json!({"facts": [], "error": format!("Query failed: {error}")})
                    }
                }
            };

            let ids = match store
                .query_fact_ids(candidates.as_ref(), &subjects, &objects, &entities, limit)
                .await
            {
                Ok(ids) => ids,
                Err(error) => return json!({"facts": [], "error": format!("Query failed: {error}")}),
            };
            match store.fetch_hyperedges(Some(&ids)).await {
                Ok(facts) => json!({"facts": facts}),
                Err(error) => json!({"facts": [], "error": format!("Query failed: {error}")}),
            }
        }
        _ => json!({"error": format!("Unknown tool: {name}")}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_cover_both_tools() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.function.name.as_str()).collect();
        assert_eq!(names, vec!["get_entities_by_relation", "query_facts"]);
        assert_eq!(tools[0].kind, "function");
    }

    #[test]
    fn argument_helpers_tolerate_missing_fields() {
        let args = json!({"subjects": ["John", 42]});
        assert_eq!(string_list(&args, "subjects"), vec!["John"]);
        assert!(string_list(&args, "objects").is_empty());
        assert!(opt_string(&args, "start_time").is_none());
    }
}
