//! Modification statements: retroactive edits to an asserted fact.

use hypergraph::{context_id, Modification, SpatialContext, TemporalInterval};

use crate::error::{GraphError, Result};
use crate::locator::{fact_ref_match, ObjectMatch};
use crate::statement::{coordinates_value, Statement};

fn first_bounds(intervals: &[TemporalInterval]) -> (Option<String>, Option<String>) {
    let mut start = None;
    let mut end = None;
    for interval in intervals {
        if start.is_none() {
            start = interval.start_time.clone().filter(|s| !s.is_empty());
        }
        if end.is_none() {
            end = interval.end_time.clone().filter(|s| !s.is_empty());
        }
    }
    (start, end)
}

/// Build the statement applying a modification to its target hyperedge.
///
/// The target is located by exact set equality on subjects/objects plus the
/// relation. When both temporal and spatial fields change, all attached
/// contexts are rewired onto one new content-addressed context and the old
/// contexts are deleted only if nothing else references them; a context
/// shared with another hyperedge survives. Single-sided changes mutate the
/// attached contexts in place, which keeps their identity from this
/// hyperedge's perspective.
pub fn modification_statement(modification: &Modification) -> Result<Statement> {
    let affected = &modification.affected_fact;
    let changes = &modification.changes;
    if affected.subjects.is_empty() || affected.relation_type.is_empty() {
        return Err(GraphError::InvalidRecord(
            "modification has empty subjects or relation".to_string(),
        ));
    }
    if changes.is_empty() {
        return Err(GraphError::InvalidRecord(
            "modification changes no fields".to_string(),
        ));
    }

    let mut statement = Statement::new(String::new())
        .param("mod_rel", affected.relation_type.clone())
        .param("mod_subjs", affected.subjects.clone());
    let objects = if affected.objects.is_empty() {
        ObjectMatch::NoObjects
    } else {
        statement = statement.param("mod_objs", affected.objects.clone());
        ObjectMatch::SetEqual("mod_objs")
    };
    statement
        .text
        .push_str(&fact_ref_match("h", &[], "mod_rel", "mod_subjs", objects, ""));
    statement.text.push('\n');

    if let Some(relation) = &changes.relation_type {
        statement = statement.param("new_rel", relation.clone());
        statement.text.push_str("SET h.relation_type = $new_rel\n");
    }

    let (new_from, new_to) = changes
        .temporal_intervals
        .as_deref()
        .map(first_bounds)
        .unwrap_or((None, None));
    let new_place: Option<&SpatialContext> = changes
        .spatial_contexts
        .as_deref()
        .and_then(|contexts| contexts.first());

    let has_time_change = new_from.is_some() || new_to.is_some();
    if has_time_change && new_place.is_some() {
        let place = new_place.ok_or_else(|| {
            GraphError::InvalidRecord("spatial change without a context".to_string())
        })?;
        let id = context_id(
            new_from.as_deref().filter(|s| *s != "null"),
            new_to.as_deref().filter(|s| *s != "null"),
            &place.name,
            &place.geometry,
        );

        let from_expr = match new_from.as_deref().filter(|s| *s != "null") {
            Some(value) => {
                statement = statement.param("ctx_from", value);
                "$ctx_from".to_string()
            }
            None => "null".to_string(),
        };
        let to_expr = match new_to.as_deref().filter(|s| *s != "null") {
            Some(value) => {
                statement = statement.param("ctx_to", value);
                "$ctx_to".to_string()
            }
            None => "null".to_string(),
        };
        statement = statement
            .param("ctx_name", place.name.clone())
            .param("ctx_stype", place.geometry.spatial_type());
        let (mut next, coords_expr) =
            coordinates_value(&place.geometry).assign(statement, "ctx_coords");
        next.text.push_str(&format!(
            "MERGE (new_ctx:Context {{id: '{id}'}})\n\
             ON CREATE SET new_ctx.from_time = {from_expr}, \
             new_ctx.to_time = {to_expr}, \
             new_ctx.location_name = $ctx_name, \
             new_ctx.spatial_type = $ctx_stype, \
             new_ctx.coordinates = {coords_expr}, \
             new_ctx.certainty = 1.0\n\
             MERGE (h)-[:VALID_IN]->(new_ctx)\n\
             WITH h\n\
             OPTIONAL MATCH (h)-[r_old:VALID_IN]->(old_ctx:Context)\n\
             WHERE old_ctx.id <> '{id}'\n\
             DELETE r_old\n\
             WITH h, collect(DISTINCT old_ctx) AS old_contexts\n\
             FOREACH (c IN [c IN old_contexts WHERE c IS NOT NULL AND NOT (c)<-[:VALID_IN]-() | c] | DETACH DELETE c)\n\
             WITH DISTINCT h\n"
        ));
        statement = next;
    } else {
        // Legacy single-sided path: the context is still semantically the
        // same context from this hyperedge's perspective.
        if has_time_change {
            let mut sets = Vec::new();
            if let Some(from) = &new_from {
                if from == "null" {
                    sets.push("c.from_time = null".to_string());
                } else {
                    statement = statement.param("new_from", from.clone());
                    sets.push("c.from_time = $new_from".to_string());
                }
            }
            if let Some(to) = &new_to {
                if to == "null" {
                    sets.push("c.to_time = null".to_string());
                } else {
                    statement = statement.param("new_to", to.clone());
                    sets.push("c.to_time = $new_to".to_string());
                }
            }
            statement.text.push_str(&format!(
                "WITH h\nMATCH (h)-[:VALID_IN]->(c:Context)\nSET {}\nWITH DISTINCT h\n",
                sets.join(", ")
            ));
        }
        if let Some(place) = new_place {
            statement = statement
                .param("sp_new_name", place.name.clone())
                .param("sp_new_type", place.geometry.spatial_type());
            let (mut next, coords_expr) =
                coordinates_value(&place.geometry).assign(statement, "sp_new_coords");
            next.text.push_str(&format!(
                "WITH h\nMATCH (h)-[:VALID_IN]->(c2:Context)\n\
                 SET c2.location_name = $sp_new_name, c2.spatial_type = $sp_new_type, c2.coordinates = {coords_expr}\n\
                 WITH DISTINCT h\n"
            ));
            statement = next;
        }
    }

    let rewire_subjects = changes.subjects.is_some();
    let rewire_objects = changes.objects.is_some();
    if rewire_subjects {
        statement.text.push_str(
            "OPTIONAL MATCH (h)-[r_sub:CONNECTS {role: 'subject'}]->(:Node)\n\
             DELETE r_sub\n\
             WITH DISTINCT h\n",
        );
        for (i, subject) in changes.subjects.iter().flatten().enumerate() {
            statement = statement.param(format!("ns_{i}_id"), subject.clone());
            statement.text.push_str(&format!(
                "MERGE (ns_{i}:Node {{id: $ns_{i}_id}})\n\
                 SET ns_{i}.type = 'entity'\n\
                 CREATE (h)-[:CONNECTS {{role: 'subject'}}]->(ns_{i})\n"
            ));
        }
    }
    if rewire_objects {
        statement.text.push_str(
            "OPTIONAL MATCH (h)-[r_obj:CONNECTS {role: 'object'}]->(:Node)\n\
             DELETE r_obj\n\
             WITH DISTINCT h\n",
        );
        for (i, object) in changes.objects.iter().flatten().enumerate() {
            statement = statement.param(format!("no_{i}_id"), object.clone());
            statement.text.push_str(&format!(
                "MERGE (no_{i}:Node {{id: $no_{i}_id}})\n\
                 SET no_{i}.type = 'entity'\n\
                 CREATE (h)-[:CONNECTS {{role: 'object'}}]->(no_{i})\n"
            ));
        }
    }
    if rewire_subjects || rewire_objects {
        statement.text.push_str(
            "WITH DISTINCT h\n\
             OPTIONAL MATCH (h)-[:CONNECTS]->(n:Node)\n\
             WITH h, count(n) AS ec\n\
             SET h.entity_count = ec\n",
        );
    }

    statement.text = statement.text.trim_end().to_string();
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergraph::{FactRef, FieldChanges, Geometry};

    fn base(changes: FieldChanges) -> Modification {
        Modification {
            affected_fact: FactRef {
                subjects: vec!["John".into()],
                objects: vec!["books".into()],
                relation_type: "likes".into(),
            },
            changes,
        }
    }

    #[test]
    fn object_rewire_deletes_role_edges_and_recounts() {
        let statement = modification_statement(&base(FieldChanges {
            objects: Some(vec!["magazines".into()]),
            ..FieldChanges::default()
        }))
        .unwrap();
        assert!(statement
            .text
            .contains("OPTIONAL MATCH (h)-[r_obj:CONNECTS {role: 'object'}]->(:Node)"));
        assert!(statement.text.contains("DELETE r_obj"));
        assert!(statement.text.contains("MERGE (no_0:Node {id: $no_0_id})"));
        assert!(statement.text.contains("SET h.entity_count = ec"));
        assert_eq!(statement.params["no_0_id"], "magazines");
        // Subject edges are untouched.
        assert!(!statement.text.contains("r_sub"));
    }

    #[test]
    fn combined_change_rewires_to_one_new_context() {
        let statement = modification_statement(&base(FieldChanges {
            temporal_intervals: Some(vec![TemporalInterval::new(
                Some("2021-01-01T00:00:00".into()),
                None,
            )]),
            spatial_contexts: Some(vec![SpatialContext::new(
                "London",
                Geometry::Point(Some((-0.1276, 51.5072))),
            )]),
            ..FieldChanges::default()
        }))
        .unwrap();
        assert!(statement.text.contains("MERGE (new_ctx:Context {id: 'ctx_"));
        assert!(statement.text.contains("DELETE r_old"));
        // Shared contexts survive: deletion is guarded on remaining edges.
        assert!(statement.text.contains("NOT (c)<-[:VALID_IN]-()"));
        assert_eq!(statement.params["ctx_name"], "London");
    }

    #[test]
    fn combined_change_context_id_matches_creation_identity() {
        let place = SpatialContext::new("London", Geometry::Point(Some((-0.1276, 51.5072))));
        let statement = modification_statement(&base(FieldChanges {
            temporal_intervals: Some(vec![TemporalInterval::new(
                Some("2021-01-01T00:00:00".into()),
                None,
            )]),
            spatial_contexts: Some(vec![place.clone()]),
            ..FieldChanges::default()
        }))
        .unwrap();
        let expected = context_id(
            Some("2021-01-01T00:00:00"),
            None,
            &place.name,
            &place.geometry,
        );
        assert!(statement.text.contains(&expected));
    }

    #[test]
    fn temporal_only_change_updates_in_place() {
        let statement = modification_statement(&base(FieldChanges {
            temporal_intervals: Some(vec![TemporalInterval::new(
                None,
                Some("2025-12-31T23:59:59".into()),
            )]),
            ..FieldChanges::default()
        }))
        .unwrap();
        assert!(statement.text.contains("SET c.to_time = $new_to"));
        assert!(!statement.text.contains("new_ctx"));
        assert!(!statement.text.contains("from_time = $new_from"));
    }

    #[test]
    fn relation_change_is_a_single_set() {
        let statement = modification_statement(&base(FieldChanges {
            relation_type: Some("adores".into()),
            ..FieldChanges::default()
        }))
        .unwrap();
        assert!(statement.text.contains("SET h.relation_type = $new_rel"));
        assert_eq!(statement.params["new_rel"], "adores");
    }

    #[test]
    fn empty_changes_are_rejected() {
        assert!(modification_statement(&base(FieldChanges::default())).is_err());
    }
}
