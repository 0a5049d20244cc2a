//! Hyperedge location by exact set equality.
//!
//! Both the append decision and the state-change/modification writers need
//! to find a hyperedge whose subject and object sets are *set-equal* to a
//! target list. Equality is expressed as `collect(DISTINCT ..)` plus size
//! equality and mutual `all .. IN` containment - no path-cardinality
//! tricks. Null temporal bounds are compared through
//! `coalesce(.., '__NULL__')` so unknown bounds match unknown bounds.

use hypergraph::{SpatialContext, TemporalFact, TemporalInterval};
use serde_json::Value;

use crate::statement::Statement;

pub(crate) const NULL_TOKEN: &str = "__NULL__";

/// A hyperedge loaded back from the graph for append diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperedgeRecord {
    pub id: String,
    pub relation_type: String,
    pub subjects: Vec<String>,
    pub objects: Vec<String>,
    pub temporal_intervals: Vec<TemporalInterval>,
    pub spatial_contexts: Vec<SpatialContext>,
    /// Which append criterion matched (1, 2 or 3).
    pub criterion: u8,
}

/// `[start, end]` pairs with nulls collapsed to the comparison token.
pub(crate) fn temporal_time_pairs(intervals: &[TemporalInterval]) -> Vec<Vec<String>> {
    intervals
        .iter()
        .map(|interval| {
            vec![
                interval
                    .start_time
                    .clone()
                    .unwrap_or_else(|| NULL_TOKEN.to_string()),
                interval
                    .end_time
                    .clone()
                    .unwrap_or_else(|| NULL_TOKEN.to_string()),
            ]
        })
        .collect()
}

fn carry_clause(carry: &[&str]) -> String {
    if carry.is_empty() {
        String::new()
    } else {
        format!("{}, ", carry.join(", "))
    }
}

/// How the object side of a locator fragment is constrained.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ObjectMatch<'a> {
    /// Object set must equal the named list parameter.
    SetEqual(&'a str),
    /// The hyperedge must have no object connections (intransitive fact).
    NoObjects,
    /// Object edges are not constrained.
    Any,
}

/// Set-equality match of a hyperedge by relation, subjects, and objects.
/// `suffix` keeps node and collection variables unique when the fragment
/// appears several times in one statement.
pub(crate) fn fact_ref_match(
    hvar: &str,
    carry: &[&str],
    rel_param: &str,
    subj_param: &str,
    objects: ObjectMatch<'_>,
    suffix: &str,
) -> String {
    let carry = carry_clause(carry);
    let mut text = format!(
        "MATCH ({hvar}:Hyperedge {{relation_type: ${rel_param}}})\n\
         MATCH ({hvar})-[:CONNECTS {{role: 'subject'}}]->(s{suffix}:Node)\n\
         WITH {carry}{hvar}, collect(DISTINCT s{suffix}.id) AS subjIds{suffix}\n\
         WHERE size(subjIds{suffix}) = size(${subj_param})\n\
           AND all(x IN subjIds{suffix} WHERE x IN ${subj_param})\n\
           AND all(x IN ${subj_param} WHERE x IN subjIds{suffix})"
    );
    match objects {
        ObjectMatch::SetEqual(obj_param) => {
            text.push_str(&format!(
                "\nMATCH ({hvar})-[:CONNECTS {{role: 'object'}}]->(o{suffix}:Node)\n\
                 WITH {carry}{hvar}, collect(DISTINCT o{suffix}.id) AS objIds{suffix}\n\
                 WHERE size(objIds{suffix}) = size(${obj_param})\n\
                   AND all(x IN objIds{suffix} WHERE x IN ${obj_param})\n\
                   AND all(x IN ${obj_param} WHERE x IN objIds{suffix})"
            ));
        }
        ObjectMatch::NoObjects => {
            text.push_str(&format!(
                "\n  AND NOT EXISTS(({hvar})-[:CONNECTS {{role: 'object'}}]->())"
            ));
        }
        ObjectMatch::Any => {}
    }
    text
}

fn context_time_clause(carry: &[&str]) -> String {
    let carry = carry_clause(carry);
    format!(
        "MATCH (h)-[:VALID_IN]->(c:Context)\n\
         WITH {carry}h, collect(DISTINCT [coalesce(c.from_time, '{NULL_TOKEN}'), coalesce(c.to_time, '{NULL_TOKEN}')]) AS contextTimes\n\
         WHERE size(contextTimes) = size($temporalTimes)\n\
           AND all(x IN contextTimes WHERE x IN $temporalTimes)\n\
           AND all(x IN $temporalTimes WHERE x IN contextTimes)"
    )
}

fn context_name_clause(carry: &[&str]) -> String {
    let carry = carry_clause(carry);
    format!(
        "MATCH (h)-[:VALID_IN]->(c2:Context)\n\
         WITH {carry}h, collect(DISTINCT coalesce(c2.location_name, '{NULL_TOKEN}')) AS contextNames\n\
         WHERE size(contextNames) = size($spatialNames)\n\
           AND all(x IN contextNames WHERE x IN $spatialNames)\n\
           AND all(x IN $spatialNames WHERE x IN contextNames)"
    )
}

const RETURN_FIRST: &str = "RETURN h.id AS hyperedge_id\nORDER BY h.id\nLIMIT 1";

/// Probe query for one append criterion, or `None` when the criterion does
/// not apply to this fact. Tried in order 1, 2, 3:
///
/// 1. `(relation, objects, contexts)` match - the fact may contribute
///    new subjects;
/// 2. `(subjects, relation, objects)` match - new contexts;
/// 3. `(subjects, relation, contexts)` match - new objects.
pub fn criterion_query(criterion: u8, fact: &TemporalFact) -> Option<Statement> {
    let has_times = !fact.temporal_intervals.is_empty();
    let names: Vec<String> = fact
        .spatial_contexts
        .iter()
        .map(|ctx| ctx.name.clone())
        .collect();
    let has_names = !names.is_empty();

    let text = match criterion {
        1 => {
            let mut parts: Vec<String> = Vec::new();
            if fact.objects.is_empty() {
                parts.push(
                    "MATCH (h:Hyperedge {relation_type: $relation})\n\
                     WHERE NOT EXISTS((h)-[:CONNECTS {role: 'object'}]->())"
                        .to_string(),
                );
                if has_times {
                    parts.push(context_time_clause(&[]));
                }
                if has_names {
                    parts.push(context_name_clause(&[]));
                }
            } else {
                parts.push(
                    "MATCH (h:Hyperedge {relation_type: $relation})\n\
                     MATCH (h)-[:CONNECTS {role: 'object'}]->(o:Node)\n\
                     WITH h, collect(DISTINCT o.id) AS objIds\n\
                     WHERE size(objIds) = size($objectsList)\n\
                       AND all(x IN objIds WHERE x IN $objectsList)\n\
                       AND all(x IN $objectsList WHERE x IN objIds)"
                        .to_string(),
                );
                if has_times {
                    parts.push(context_time_clause(&["objIds"]));
                }
                if has_names {
                    parts.push(context_name_clause(&["objIds"]));
                }
            }
            parts.push(RETURN_FIRST.to_string());
            parts.join("\n")
        }
        2 => {
            if fact.subjects.is_empty() {
                return None;
            }
            let objects = if fact.objects.is_empty() {
                ObjectMatch::NoObjects
            } else {
                ObjectMatch::SetEqual("objectsList")
            };
            let mut parts = vec![fact_ref_match("h", &[], "relation", "subjectsList", objects, "")];
            parts.push(RETURN_FIRST.to_string());
            parts.join("\n")
        }
        3 => {
            if fact.subjects.is_empty() {
                return None;
            }
            let mut parts = vec![fact_ref_match(
                "h",
                &[],
                "relation",
                "subjectsList",
                ObjectMatch::Any,
                "",
            )];
            if has_times {
                parts.push(context_time_clause(&["subjIds"]));
            }
            if has_names {
                parts.push(context_name_clause(&["subjIds"]));
            }
            parts.push(RETURN_FIRST.to_string());
            parts.join("\n")
        }
        _ => return None,
    };

    Some(
        Statement::new(text)
            .param("relation", fact.relation_type.clone())
            .param("subjectsList", fact.subjects.clone())
            .param("objectsList", fact.objects.clone())
            .param(
                "temporalTimes",
                Value::from(
                    temporal_time_pairs(&fact.temporal_intervals)
                        .into_iter()
                        .map(Value::from)
                        .collect::<Vec<_>>(),
                ),
            )
            .param("spatialNames", names),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergraph::Geometry;

    fn fact() -> TemporalFact {
        TemporalFact {
            subjects: vec!["John".into()],
            objects: vec!["cats".into()],
            relation_type: "likes".into(),
            temporal_intervals: vec![TemporalInterval::new(
                Some("2020-01-01T00:00:00".into()),
                None,
            )],
            spatial_contexts: vec![SpatialContext::new("home", Geometry::Point(None))],
        }
    }

    #[test]
    fn null_bounds_use_the_comparison_token() {
        let pairs = temporal_time_pairs(&[TemporalInterval::new(
            Some("2020-01-01T00:00:00".into()),
            None,
        )]);
        assert_eq!(pairs, vec![vec!["2020-01-01T00:00:00".to_string(), NULL_TOKEN.to_string()]]);
    }

    #[test]
    fn criterion_one_matches_objects_and_contexts() {
        let statement = criterion_query(1, &fact()).unwrap();
        assert!(statement.text.contains("collect(DISTINCT o.id) AS objIds"));
        assert!(statement.text.contains("contextTimes"));
        assert!(statement.text.contains("contextNames"));
        assert!(statement.text.ends_with("LIMIT 1"));
        assert_eq!(statement.params["relation"], "likes");
    }

    #[test]
    fn criterion_one_without_objects_requires_object_free_hyperedges() {
        let mut f = fact();
        f.objects.clear();
        let statement = criterion_query(1, &f).unwrap();
        assert!(statement
            .text
            .contains("NOT EXISTS((h)-[:CONNECTS {role: 'object'}]->())"));
        assert!(!statement.text.contains("objIds"));
    }

    #[test]
    fn criterion_two_matches_subjects_and_objects_only() {
        let statement = criterion_query(2, &fact()).unwrap();
        assert!(statement.text.contains("subjIds"));
        assert!(statement.text.contains("objIds"));
        assert!(!statement.text.contains("contextTimes"));
    }

    #[test]
    fn criterion_three_matches_subjects_and_contexts() {
        let statement = criterion_query(3, &fact()).unwrap();
        assert!(statement.text.contains("subjIds"));
        assert!(statement.text.contains("contextTimes"));
        assert!(statement.text.contains("contextNames"));
        assert!(!statement.text.contains("objIds"));
    }

    #[test]
    fn empty_interval_set_skips_the_time_clause() {
        let mut f = fact();
        f.temporal_intervals.clear();
        f.spatial_contexts.clear();
        let statement = criterion_query(1, &f).unwrap();
        assert!(!statement.text.contains("contextTimes"));
        assert!(!statement.text.contains("contextNames"));
    }
}
