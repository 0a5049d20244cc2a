//! State-change event statements.

use hypergraph::{event_id, FactRef, StateChangeEvent};

use crate::error::{GraphError, Result};
use crate::locator::{fact_ref_match, ObjectMatch};
use crate::statement::Statement;

fn object_match<'a>(fact: &FactRef, obj_param: &'a str) -> ObjectMatch<'a> {
    if fact.objects.is_empty() {
        ObjectMatch::NoObjects
    } else {
        ObjectMatch::SetEqual(obj_param)
    }
}

fn register_fact_params(statement: Statement, fact: &FactRef, prefix: &str) -> Statement {
    let mut statement = statement
        .param(format!("{prefix}_rel"), fact.relation_type.clone())
        .param(format!("{prefix}_subjs"), fact.subjects.clone());
    if !fact.objects.is_empty() {
        statement = statement.param(format!("{prefix}_objs"), fact.objects.clone());
    }
    statement
}

/// Build the statement creating a state-change event node, wiring it to the
/// affected hyperedge and to every cause, effect, and extra precondition.
///
/// Each referenced fact is located by exact `(subjects, objects, relation)`
/// set equality - the reason the orchestrator only runs causal inference
/// after every temporal fact committed.
pub fn state_event_statement(event: &StateChangeEvent) -> Result<(Statement, String)> {
    let affected = &event.affected_fact;
    if affected.subjects.is_empty() || affected.relation_type.is_empty() {
        return Err(GraphError::InvalidRecord(
            "state change event has empty subjects or relation".to_string(),
        ));
    }

    let sce_id = event_id();
    let mut statement = Statement::new(String::new());
    statement = register_fact_params(statement, affected, "affected");

    statement.text.push_str(&fact_ref_match(
        "h",
        &[],
        "affected_rel",
        "affected_subjs",
        object_match(affected, "affected_objs"),
        "",
    ));
    statement.text.push_str(&format!(
        "\nCREATE (sce:StateChangeEvent {{id: '{sce_id}'}})\n\
         CREATE (sce)-[:AFFECTS_FACT]->(h)\n"
    ));

    // Inbound causation: [[A], [B, C]] reads "A alone OR (B AND C)"; every
    // conjunct gets its own CAUSES_STATE edge into the event.
    for (group_idx, group) in event.caused_by.iter().enumerate() {
        for (cause_idx, cause) in group.iter().enumerate() {
            let prefix = format!("cause_{group_idx}_{cause_idx}");
            let hvar = format!("hc_{group_idx}_{cause_idx}");
            statement = register_fact_params(statement, &cause.fact, &prefix);
            statement.text.push_str("WITH sce\n");
            statement.text.push_str(&fact_ref_match(
                &hvar,
                &["sce"],
                &format!("{prefix}_rel"),
                &format!("{prefix}_subjs"),
                object_match(&cause.fact, &format!("{prefix}_objs")),
                &format!("_c{group_idx}_{cause_idx}"),
            ));
            statement.text.push_str(&format!(
                "\nCREATE ({hvar})-[:CAUSES_STATE {{required_state: {}}}]->(sce)\n",
                cause.triggered_by_state
            ));
        }
    }

    // Outbound causation plus conjunctive extra preconditions.
    for (effect_idx, effect) in event.causes.iter().enumerate() {
        let prefix = format!("effect_{effect_idx}");
        let hvar = format!("he_{effect_idx}");
        statement = register_fact_params(statement, &effect.fact, &prefix);
        statement.text.push_str("WITH sce\n");
        statement.text.push_str(&fact_ref_match(
            &hvar,
            &["sce"],
            &format!("{prefix}_rel"),
            &format!("{prefix}_subjs"),
            object_match(&effect.fact, &format!("{prefix}_objs")),
            &format!("_e{effect_idx}"),
        ));
        statement.text.push_str(&format!(
            "\nCREATE (sce)-[:CAUSES_STATE {{triggers_state: {}}}]->({hvar})\n",
            effect.triggers_state
        ));

        for (req_idx, required) in effect.additional_required_states.iter().enumerate() {
            let prefix = format!("req_{effect_idx}_{req_idx}");
            let rvar = format!("req_{effect_idx}_{req_idx}");
            statement = register_fact_params(statement, &required.fact, &prefix);
            statement.text.push_str(&format!("WITH sce, {hvar}\n"));
            statement.text.push_str(&fact_ref_match(
                &rvar,
                &["sce", hvar.as_str()],
                &format!("{prefix}_rel"),
                &format!("{prefix}_subjs"),
                object_match(&required.fact, &format!("{prefix}_objs")),
                &format!("_r{effect_idx}_{req_idx}"),
            ));
            statement.text.push_str(&format!(
                "\nCREATE (sce)-[:REQUIRES_STATE {{required_state: {}}}]->({rvar})\n",
                required.state
            ));
        }
    }

    statement.text = statement.text.trim_end().to_string();
    Ok((statement, sce_id))
}
