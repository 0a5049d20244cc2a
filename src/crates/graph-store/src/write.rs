//! Create and append statements for temporal facts.

use hypergraph::{context_id, hyperedge_id, SpatialContext, TemporalFact, TemporalInterval};

use crate::locator::HyperedgeRecord;
use crate::statement::{coordinates_value, Statement};

fn time_bound(bound: &Option<String>) -> Option<&str> {
    bound.as_deref().filter(|s| !s.is_empty() && *s != "null")
}

/// MERGE one context node by its content-addressed id.
///
/// `from_time`/`to_time`/`location_name`/`spatial_type` travel as
/// parameters; absent bounds become literal `null` so unknown bounds never
/// materialise as empty strings. Returns the statement with the context's
/// variable bound to `{var}`.
fn merge_context(
    mut statement: Statement,
    var: &str,
    key: &str,
    interval: &TemporalInterval,
    context: &SpatialContext,
) -> (Statement, String) {
    let start = time_bound(&interval.start_time);
    let end = time_bound(&interval.end_time);
    let id = context_id(start, end, &context.name, &context.geometry);

    statement.text.push_str(&format!("MERGE ({var}:Context {{id: '{id}'}})\n"));

    let from_expr = match start {
        Some(value) => {
            statement = statement.param(format!("from_time_{key}"), value);
            format!("$from_time_{key}")
        }
        None => "null".to_string(),
    };
    let to_expr = match end {
        Some(value) => {
            statement = statement.param(format!("to_time_{key}"), value);
            format!("$to_time_{key}")
        }
        None => "null".to_string(),
    };

    statement = statement
        .param(format!("loc_name_{key}"), context.name.clone())
        .param(format!("stype_{key}"), context.geometry.spatial_type());
    let (mut statement, coords_expr) =
        coordinates_value(&context.geometry).assign(statement, &format!("coords_{key}"));

    statement.text.push_str(&format!(
        "ON CREATE SET {var}.from_time = {from_expr}, \
         {var}.to_time = {to_expr}, \
         {var}.location_name = $loc_name_{key}, \
         {var}.spatial_type = $stype_{key}, \
         {var}.coordinates = {coords_expr}, \
         {var}.certainty = 1.0\n"
    ));
    (statement, id)
}

/// Build the statement creating a fresh hyperedge for a fact.
///
/// Contexts are the cartesian product of the fact's intervals and places,
/// with `unknown` standing in for whichever side is empty. Returns the
/// statement and the deterministic hyperedge id.
pub fn create_fact_statement(fact: &TemporalFact) -> (Statement, String) {
    let mut statement = Statement::new(String::new());

    for (i, subject) in fact.subjects.iter().enumerate() {
        statement = statement.param(format!("subject_{i}_id"), subject.clone());
        statement
            .text
            .push_str(&format!("MERGE (subject_{i}:Node {{id: $subject_{i}_id}})\n"));
        statement.text.push_str(&format!("SET subject_{i}.type = 'entity'\n"));
    }
    for (i, object) in fact.objects.iter().enumerate() {
        statement = statement.param(format!("object_{i}_id"), object.clone());
        statement
            .text
            .push_str(&format!("MERGE (object_{i}:Node {{id: $object_{i}_id}})\n"));
        statement.text.push_str(&format!("SET object_{i}.type = 'entity'\n"));
    }

    let intervals = if fact.temporal_intervals.is_empty() {
        vec![TemporalInterval::unknown()]
    } else {
        fact.temporal_intervals.clone()
    };
    let places = if fact.spatial_contexts.is_empty() {
        vec![SpatialContext::unknown()]
    } else {
        fact.spatial_contexts.clone()
    };

    let mut context_vars = Vec::new();
    let mut context_ids = Vec::new();
    for (i, interval) in intervals.iter().enumerate() {
        for (j, place) in places.iter().enumerate() {
            let var = format!("context_{i}_{j}");
            let (next, id) = merge_context(statement, &var, &format!("{i}_{j}"), interval, place);
            statement = next;
            context_vars.push(var);
            context_ids.push(id);
        }
    }

    let entity_count = fact.subjects.len() + fact.objects.len();
    let he_id = hyperedge_id(&fact.relation_type, &fact.subjects, &fact.objects, &context_ids);
    statement = statement.param("relation_type", fact.relation_type.clone());
    statement
        .text
        .push_str(&format!("MERGE (hyperedge:Hyperedge {{id: '{he_id}'}})\n"));
    statement.text.push_str(&format!(
        "ON CREATE SET hyperedge.relation_type = $relation_type, hyperedge.entity_count = {entity_count}\n"
    ));

    for i in 0..fact.subjects.len() {
        statement.text.push_str(&format!(
            "MERGE (hyperedge)-[:CONNECTS {{role: 'subject'}}]->(subject_{i})\n"
        ));
    }
    for i in 0..fact.objects.len() {
        statement.text.push_str(&format!(
            "MERGE (hyperedge)-[:CONNECTS {{role: 'object'}}]->(object_{i})\n"
        ));
    }
    for var in &context_vars {
        statement
            .text
            .push_str(&format!("MERGE (hyperedge)-[:VALID_IN]->({var})\n"));
    }

    statement.text = statement.text.trim_end().to_string();
    (statement, he_id)
}

/// Build the statement extending an existing hyperedge with whatever the
/// incoming fact adds: subjects, objects, intervals, places.
///
/// New intervals combine with *all* places (existing plus incoming) and new
/// places with all intervals, mirroring the cartesian context model.
/// `entity_count` is recomputed from the live `CONNECTS` edges.
pub fn append_statement(existing: &HyperedgeRecord, fact: &TemporalFact) -> Statement {
    let mut statement =
        Statement::new("MATCH (existing_hyperedge:Hyperedge {id: $hyperedge_id})\n".to_string())
            .param("hyperedge_id", existing.id.clone());

    let new_subjects: Vec<&String> = fact
        .subjects
        .iter()
        .filter(|s| !existing.subjects.contains(s))
        .collect();
    for (i, subject) in new_subjects.iter().enumerate() {
        statement = statement.param(format!("new_subject_{i}_id"), (*subject).clone());
        statement.text.push_str(&format!(
            "MERGE (new_subject_{i}:Node {{id: $new_subject_{i}_id}})\n\
             SET new_subject_{i}.type = 'entity'\n\
             CREATE (existing_hyperedge)-[:CONNECTS {{role: 'subject'}}]->(new_subject_{i})\n"
        ));
    }

    let new_objects: Vec<&String> = fact
        .objects
        .iter()
        .filter(|o| !existing.objects.contains(o))
        .collect();
    for (i, object) in new_objects.iter().enumerate() {
        statement = statement.param(format!("new_object_{i}_id"), (*object).clone());
        statement.text.push_str(&format!(
            "MERGE (new_object_{i}:Node {{id: $new_object_{i}_id}})\n\
             SET new_object_{i}.type = 'entity'\n\
             CREATE (existing_hyperedge)-[:CONNECTS {{role: 'object'}}]->(new_object_{i})\n"
        ));
    }

    let new_intervals: Vec<&TemporalInterval> = fact
        .temporal_intervals
        .iter()
        .filter(|t| !existing.temporal_intervals.contains(t))
        .collect();
    if !new_intervals.is_empty() {
        let mut all_places: Vec<SpatialContext> = existing.spatial_contexts.clone();
        all_places.extend(fact.spatial_contexts.iter().cloned());
        if all_places.is_empty() {
            all_places.push(SpatialContext::unknown());
        }
        for (i, interval) in new_intervals.iter().enumerate() {
            for (j, place) in all_places.iter().enumerate() {
                let var = format!("new_context_{i}_{j}");
                let (next, _) =
                    merge_context(statement, &var, &format!("nt_{i}_{j}"), interval, place);
                statement = next;
                statement
                    .text
                    .push_str(&format!("MERGE (existing_hyperedge)-[:VALID_IN]->({var})\n"));
            }
        }
    }

    let existing_names: Vec<&str> = existing
        .spatial_contexts
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    let new_places: Vec<&SpatialContext> = fact
        .spatial_contexts
        .iter()
        .filter(|c| !existing_names.contains(&c.name.as_str()))
        .collect();
    if !new_places.is_empty() {
        let mut all_intervals: Vec<TemporalInterval> = existing.temporal_intervals.clone();
        all_intervals.extend(fact.temporal_intervals.iter().cloned());
        if all_intervals.is_empty() {
            all_intervals.push(TemporalInterval::unknown());
        }
        for (i, interval) in all_intervals.iter().enumerate() {
            for (j, place) in new_places.iter().enumerate() {
                let var = format!("new_spatial_context_{i}_{j}");
                let (next, _) =
                    merge_context(statement, &var, &format!("ns_{i}_{j}"), interval, place);
                statement = next;
                statement
                    .text
                    .push_str(&format!("MERGE (existing_hyperedge)-[:VALID_IN]->({var})\n"));
            }
        }
    }

    statement.text.push_str(
        "WITH existing_hyperedge\n\
         MATCH (existing_hyperedge)-[:CONNECTS]->(n:Node)\n\
         WITH existing_hyperedge, count(n) AS entity_count\n\
         SET existing_hyperedge.entity_count = entity_count",
    );
    statement
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergraph::Geometry;

    fn fact() -> TemporalFact {
        TemporalFact {
            subjects: vec!["Marie Curie".into()],
            objects: vec!["The Nobel Prize".into()],
            relation_type: "wins".into(),
            temporal_intervals: vec![TemporalInterval::new(
                Some("1903-01-01T00:00:00".into()),
                Some("1903-12-31T23:59:59".into()),
            )],
            spatial_contexts: vec![],
        }
    }

    #[test]
    fn create_merges_entities_contexts_and_edges() {
        let (statement, he_id) = create_fact_statement(&fact());
        assert!(he_id.starts_with("he_"));
        assert!(statement.text.contains("MERGE (subject_0:Node {id: $subject_0_id})"));
        assert!(statement.text.contains("MERGE (object_0:Node {id: $object_0_id})"));
        assert!(statement.text.contains("MERGE (context_0_0:Context {id: 'ctx_"));
        assert!(statement
            .text
            .contains("MERGE (hyperedge)-[:CONNECTS {role: 'subject'}]->(subject_0)"));
        assert!(statement.text.contains("MERGE (hyperedge)-[:VALID_IN]->(context_0_0)"));
        assert!(statement.text.contains("hyperedge.entity_count = 2"));
        assert_eq!(statement.params["subject_0_id"], "Marie Curie");
        // No spatial context: the unknown place stands in.
        assert_eq!(statement.params["loc_name_0_0"], "unknown");
    }

    #[test]
    fn create_is_deterministic_for_reordered_entities() {
        let mut f = fact();
        f.subjects = vec!["Marie Curie".into(), "Pierre Curie".into()];
        let mut swapped = f.clone();
        swapped.subjects.reverse();
        let (_, a) = create_fact_statement(&f);
        let (_, b) = create_fact_statement(&swapped);
        assert_eq!(a, b);
    }

    #[test]
    fn create_emits_cartesian_product_of_contexts() {
        let mut f = fact();
        f.temporal_intervals.push(TemporalInterval::unknown());
        f.spatial_contexts = vec![
            SpatialContext::new("London", Geometry::Point(Some((-0.1276, 51.5072)))),
            SpatialContext::new("Bristol", Geometry::Point(None)),
        ];
        let (statement, _) = create_fact_statement(&f);
        for var in ["context_0_0", "context_0_1", "context_1_0", "context_1_1"] {
            assert!(statement.text.contains(var), "missing {var}");
        }
        // Resolved point goes in as a native literal.
        assert!(statement
            .text
            .contains("point({longitude: -0.1276, latitude: 51.5072})"));
    }

    #[test]
    fn unknown_bounds_are_literal_null() {
        let mut f = fact();
        f.temporal_intervals = vec![TemporalInterval::unknown()];
        let (statement, _) = create_fact_statement(&f);
        assert!(statement.text.contains("context_0_0.from_time = null"));
        assert!(statement.text.contains("context_0_0.to_time = null"));
        assert!(!statement.params.contains_key("from_time_0_0"));
    }

    fn existing() -> HyperedgeRecord {
        HyperedgeRecord {
            id: "he_0123456789abcdef".into(),
            relation_type: "likes".into(),
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: vec![SpatialContext::new("home", Geometry::Point(None))],
            criterion: 1,
        }
    }

    #[test]
    fn append_adds_only_new_objects() {
        let fact = TemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into(), "dogs".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: vec![SpatialContext::new("home", Geometry::Point(None))],
        };
        let statement = append_statement(&existing(), &fact);
        assert_eq!(statement.params["new_object_0_id"], "dogs");
        assert!(!statement.params.values().any(|v| v == "cats"));
        assert!(statement
            .text
            .contains("CREATE (existing_hyperedge)-[:CONNECTS {role: 'object'}]->(new_object_0)"));
        assert!(statement.text.contains("SET existing_hyperedge.entity_count = entity_count"));
    }

    #[test]
    fn append_combines_new_interval_with_all_places() {
        let fact = TemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::new(
                Some("2021-01-01T00:00:00".into()),
                None,
            )],
            spatial_contexts: vec![SpatialContext::new("away", Geometry::Point(None))],
        };
        let statement = append_statement(&existing(), &fact);
        // New interval crosses existing "home" and incoming "away".
        assert!(statement.text.contains("new_context_0_0"));
        assert!(statement.text.contains("new_context_0_1"));
        // New place crosses existing unknown interval and the new one.
        assert!(statement.text.contains("new_spatial_context_0_0"));
        assert!(statement.text.contains("new_spatial_context_1_0"));
    }

    #[test]
    fn append_with_nothing_new_still_recomputes_entity_count() {
        let fact = TemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::unknown()],
            spatial_contexts: vec![SpatialContext::new("home", Geometry::Point(None))],
        };
        let statement = append_statement(&existing(), &fact);
        assert!(!statement.text.contains("new_object"));
        assert!(!statement.text.contains("new_context"));
        assert!(statement.text.contains("count(n) AS entity_count"));
    }
}
