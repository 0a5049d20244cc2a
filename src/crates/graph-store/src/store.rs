//! The Neo4j-backed store.
//!
//! The driver handle is cheap to clone and thread-safe; each statement runs
//! in its own session, and the store never opens multi-statement
//! transactions - per-statement atomicity is what the pipeline relies on.

use std::collections::{HashMap, HashSet};

use neo4rs::Graph;

use hypergraph::{Geometry, Modification, SpatialContext, StateChangeEvent, TemporalFact, TemporalInterval};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::locator::{criterion_query, HyperedgeRecord};
use crate::modify::modification_statement;
use crate::query::{
    geometry_matches_area, spatiotemporal_query, ContextData, HyperedgeData, SpatioTemporalFilter,
};
use crate::state::state_event_statement;
use crate::statement::Statement;
use crate::write::{append_statement, create_fact_statement};

const CONSTRAINTS: [&str; 3] = [
    "CREATE CONSTRAINT node_id_unique IF NOT EXISTS FOR (n:Node) REQUIRE n.id IS UNIQUE",
    "CREATE CONSTRAINT hyperedge_id_unique IF NOT EXISTS FOR (h:Hyperedge) REQUIRE h.id IS UNIQUE",
    "CREATE CONSTRAINT context_id_unique IF NOT EXISTS FOR (c:Context) REQUIRE c.id IS UNIQUE",
];

const INDEXES: [&str; 5] = [
    "CREATE INDEX node_type_index IF NOT EXISTS FOR (n:Node) ON (n.type)",
    "CREATE INDEX hyperedge_relation_index IF NOT EXISTS FOR (h:Hyperedge) ON (h.relation_type)",
    "CREATE INDEX context_spatial_index IF NOT EXISTS FOR (c:Context) ON (c.location_name)",
    "CREATE INDEX context_certainty_index IF NOT EXISTS FOR (c:Context) ON (c.certainty)",
    "CREATE INDEX context_coordinates_index IF NOT EXISTS FOR (c:Context) ON (c.coordinates)",
];

// Selects Point coordinates apart so polygon JSON strings and native
// points come back through distinct, typed columns.
const CONTEXT_COLUMNS: &str = "c.from_time AS from_time, c.to_time AS to_time, \
     c.location_name AS location_name, c.spatial_type AS spatial_type, \
     CASE WHEN c.spatial_type = 'Point' AND c.coordinates IS NOT NULL THEN c.coordinates.longitude ELSE null END AS lon, \
     CASE WHEN c.spatial_type = 'Point' AND c.coordinates IS NOT NULL THEN c.coordinates.latitude ELSE null END AS lat, \
     CASE WHEN c.spatial_type IN ['Polygon', 'MultiPolygon'] THEN c.coordinates ELSE null END AS coordinates_json";

/// Handle to the graph database.
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
    config: GraphConfig,
}

impl GraphStore {
    /// Connect, verify the connection, and initialise schema constraints
    /// and indexes.
    pub async fn connect(config: GraphConfig) -> Result<Self> {
        let driver_config = neo4rs::ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.username)
            .password(&config.password)
            .db(config.database.as_str())
            .build()?;
        let graph = Graph::connect(driver_config).await?;

        let store = Self { graph, config };
        store.graph.run(neo4rs::query("RETURN 1")).await?;
        tracing::info!(uri = %store.config.uri, "connected to graph store");
        store.init_schema().await;
        Ok(store)
    }

    async fn init_schema(&self) {
        for statement in CONSTRAINTS.iter().chain(INDEXES.iter()) {
            if let Err(error) = self.graph.run(neo4rs::query(statement)).await {
                tracing::warn!(%error, statement, "schema statement failed (may already exist)");
            }
        }
    }

    /// Execute a mutation statement, discarding any rows.
    pub async fn execute(&self, statement: Statement) -> Result<()> {
        self.graph.run(statement.into_query()).await?;
        Ok(())
    }

    /// Write a temporal fact, appending to an existing hyperedge when one
    /// of the three criteria matches, creating a fresh one otherwise.
    /// Returns the id of the touched hyperedge.
    pub async fn write_fact(&self, fact: &TemporalFact) -> Result<String> {
        match self.find_appendable(fact).await? {
            Some(existing) => {
                tracing::debug!(
                    hyperedge = %existing.id,
                    criterion = existing.criterion,
                    "appending to existing hyperedge"
                );
                let statement = append_statement(&existing, fact);
                self.execute(statement).await?;
                Ok(existing.id)
            }
            None => {
                let (statement, id) = create_fact_statement(fact);
                self.execute(statement).await?;
                Ok(id)
            }
        }
    }

    /// Write a state-change event and its causation edges. Returns the
    /// event node id.
    pub async fn write_state_event(&self, event: &StateChangeEvent) -> Result<String> {
        let (statement, id) = state_event_statement(event)?;
        self.execute(statement).await?;
        Ok(id)
    }

    /// Apply a modification to its target hyperedge.
    pub async fn apply_modification(&self, modification: &Modification) -> Result<()> {
        let statement = modification_statement(modification)?;
        self.execute(statement).await
    }

    /// Probe the append criteria in order and load the full record of the
    /// first match. A failed probe logs and falls through to the next
    /// criterion.
    pub async fn find_appendable(&self, fact: &TemporalFact) -> Result<Option<HyperedgeRecord>> {
        for criterion in 1..=3u8 {
            let Some(statement) = criterion_query(criterion, fact) else {
                continue;
            };
            let id = match self.single_string(statement, "hyperedge_id").await {
                Ok(id) => id,
                Err(error) => {
                    tracing::warn!(%error, criterion, "append probe failed");
                    continue;
                }
            };
            if let Some(id) = id {
                return Ok(Some(self.load_record(&id, criterion).await?));
            }
        }
        Ok(None)
    }

    async fn single_string(&self, statement: Statement, column: &str) -> Result<Option<String>> {
        let mut rows = self.graph.execute(statement.into_query()).await?;
        match rows.next().await? {
            Some(row) => {
                let value: String = row
                    .get(column)
                    .map_err(|e| GraphError::ResultShape(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn load_record(&self, id: &str, criterion: u8) -> Result<HyperedgeRecord> {
        let head = Statement::new(
            "MATCH (h:Hyperedge {id: $id})\n\
             OPTIONAL MATCH (h)-[:CONNECTS {role: 'subject'}]->(s:Node)\n\
             OPTIONAL MATCH (h)-[:CONNECTS {role: 'object'}]->(o:Node)\n\
             RETURN h.relation_type AS relation_type, \
             collect(DISTINCT s.id) AS subjects, collect(DISTINCT o.id) AS objects",
        )
        .param("id", id);
        let mut rows = self.graph.execute(head.into_query()).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| GraphError::ResultShape(format!("hyperedge {id} disappeared")))?;
        let shape = |e: neo4rs::DeError| GraphError::ResultShape(e.to_string());
        let relation_type: String = row.get("relation_type").map_err(shape)?;
        let subjects: Vec<String> = row.get("subjects").map_err(shape)?;
        let objects: Vec<String> = row.get("objects").map_err(shape)?;

        let contexts = Statement::new(format!(
            "MATCH (h:Hyperedge {{id: $id}})-[:VALID_IN]->(c:Context)\nRETURN {CONTEXT_COLUMNS}"
        ))
        .param("id", id);
        let mut rows = self.graph.execute(contexts.into_query()).await?;
        let mut temporal_intervals = Vec::new();
        let mut spatial_contexts = Vec::new();
        while let Some(row) = rows.next().await? {
            let (interval, context) = context_from_row(&row)?;
            if !temporal_intervals.contains(&interval) {
                temporal_intervals.push(interval);
            }
            if !spatial_contexts.contains(&context) {
                spatial_contexts.push(context);
            }
        }

        Ok(HyperedgeRecord {
            id: id.to_string(),
            relation_type,
            subjects,
            objects,
            temporal_intervals,
            spatial_contexts,
            criterion,
        })
    }

    /// Hyperedge ids matching a spatiotemporal filter. Coordinate areas are
    /// checked in-process against the stored geometry.
    pub async fn query_spatiotemporal(
        &self,
        filter: &SpatioTemporalFilter,
    ) -> Result<HashSet<String>> {
        let statement = match spatiotemporal_query(filter) {
            Some(statement) => statement,
            None => Statement::new("MATCH (h:Hyperedge)\nRETURN DISTINCT h.id AS hyperedge_id"),
        };
        let mut ids = HashSet::new();
        let mut rows = self.graph.execute(statement.into_query()).await?;
        while let Some(row) = rows.next().await? {
            let id: String = row
                .get("hyperedge_id")
                .map_err(|e| GraphError::ResultShape(e.to_string()))?;
            ids.insert(id);
        }

        let Some(area) = filter
            .location_coordinates
            .as_deref()
            .filter(|a| a.len() >= 3)
        else {
            return Ok(ids);
        };
        if ids.is_empty() {
            return Ok(ids);
        }

        let coordinate_filter = if filter.include_spatially_unconstrained {
            "(c.coordinates IS NOT NULL OR c.spatial_type IS NULL)"
        } else {
            "c.coordinates IS NOT NULL"
        };
        let statement = Statement::new(format!(
            "MATCH (h:Hyperedge)-[:VALID_IN]->(c:Context)\n\
             WHERE h.id IN $hyperedge_ids AND {coordinate_filter}\n\
             RETURN h.id AS hyperedge_id, {CONTEXT_COLUMNS}"
        ))
        .param("hyperedge_ids", ids.iter().cloned().collect::<Vec<_>>());

        let mut matching = HashSet::new();
        let mut rows = self.graph.execute(statement.into_query()).await?;
        while let Some(row) = rows.next().await? {
            let id: String = row
                .get("hyperedge_id")
                .map_err(|e| GraphError::ResultShape(e.to_string()))?;
            let (_, context) = context_from_row(&row)?;
            let unconstrained = matches!(context.geometry, Geometry::Unknown);
            if (unconstrained && filter.include_spatially_unconstrained)
                || geometry_matches_area(&context.geometry, area)
            {
                matching.insert(id);
            }
        }
        Ok(matching)
    }

    /// Load hyperedges with their entities and contexts, optionally
    /// restricted to the given ids.
    pub async fn fetch_hyperedges(&self, ids: Option<&[String]>) -> Result<Vec<HyperedgeData>> {
        let id_filter = ids.map(|_| "WHERE h.id IN $hyperedge_ids\n").unwrap_or("");
        let mut head = Statement::new(format!(
            "MATCH (h:Hyperedge)\n{id_filter}\
             OPTIONAL MATCH (h)-[:CONNECTS {{role: 'subject'}}]->(s:Node)\n\
             OPTIONAL MATCH (h)-[:CONNECTS {{role: 'object'}}]->(o:Node)\n\
             WITH h, collect(DISTINCT s.id) AS subjects, collect(DISTINCT o.id) AS objects\n\
             RETURN h.id AS id, h.relation_type AS relation_type, subjects, objects\n\
             ORDER BY id"
        ));
        if let Some(ids) = ids {
            head = head.param("hyperedge_ids", ids.to_vec());
        }

        let shape = |e: neo4rs::DeError| GraphError::ResultShape(e.to_string());
        let mut ordered: Vec<HyperedgeData> = Vec::new();
        let mut rows = self.graph.execute(head.into_query()).await?;
        while let Some(row) = rows.next().await? {
            ordered.push(HyperedgeData {
                id: row.get("id").map_err(shape)?,
                relation_type: row.get("relation_type").map_err(shape)?,
                entities: Vec::new(),
                subjects: row.get("subjects").map_err(shape)?,
                objects: row.get("objects").map_err(shape)?,
                temporal_intervals: Vec::new(),
                spatial_contexts: Vec::new(),
                contexts: Vec::new(),
            });
        }
        let by_id: HashMap<String, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, h)| (h.id.clone(), i))
            .collect();

        let mut contexts = Statement::new(format!(
            "MATCH (h:Hyperedge)-[:VALID_IN]->(c:Context)\n{id_filter}\
             RETURN h.id AS hyperedge_id, c.id AS context_id, {CONTEXT_COLUMNS}"
        ));
        if let Some(ids) = ids {
            contexts = contexts.param("hyperedge_ids", ids.to_vec());
        }
        let mut rows = self.graph.execute(contexts.into_query()).await?;
        while let Some(row) = rows.next().await? {
            let hyperedge_id: String = row.get("hyperedge_id").map_err(shape)?;
            let Some(&index) = by_id.get(&hyperedge_id) else {
                continue;
            };
            let context_id: Option<String> = row.get("context_id").map_err(shape)?;
            let (interval, context) = context_from_row(&row)?;
            let entry = &mut ordered[index];
            entry.contexts.push(ContextData {
                id: context_id,
                from_time: interval.start_time.clone(),
                to_time: interval.end_time.clone(),
                location_name: Some(context.name.clone()),
            });
            if (interval.start_time.is_some() || interval.end_time.is_some())
                && !entry.temporal_intervals.contains(&interval)
            {
                entry.temporal_intervals.push(interval);
            }
            if context.name != "unknown" && !entry.spatial_contexts.contains(&context) {
                entry.spatial_contexts.push(context);
            }
        }

        for entry in &mut ordered {
            entry.entities = entry
                .subjects
                .iter()
                .chain(entry.objects.iter())
                .cloned()
                .collect();
        }
        Ok(ordered)
    }

    /// Entity ids participating in hyperedges whose relation contains the
    /// given phrase (case-insensitive).
    pub async fn entities_by_relation(&self, relation: &str) -> Result<Vec<String>> {
        let statement = Statement::new(
            "MATCH (h:Hyperedge)\n\
             WHERE toLower(h.relation_type) CONTAINS toLower($rel)\n\
             MATCH (h)-[:CONNECTS]->(n:Node)\n\
             RETURN DISTINCT n.id AS entity_id\n\
             ORDER BY entity_id",
        )
        .param("rel", relation);
        let mut entities = Vec::new();
        let mut rows = self.graph.execute(statement.into_query()).await?;
        while let Some(row) = rows.next().await? {
            let id: String = row
                .get("entity_id")
                .map_err(|e| GraphError::ResultShape(e.to_string()))?;
            entities.push(id);
        }
        Ok(entities)
    }

    /// Hyperedge ids filtered by participating entities, on top of an
    /// optional pre-filtered candidate set.
    pub async fn query_fact_ids(
        &self,
        candidates: Option<&HashSet<String>>,
        subjects: &[String],
        objects: &[String],
        entities: &[String],
        limit: i64,
    ) -> Result<Vec<String>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut statement = Statement::new(String::new()).param("limit", limit);
        if let Some(candidates) = candidates {
            statement =
                statement.param("hyperedge_ids", candidates.iter().cloned().collect::<Vec<_>>());
            conditions.push("h.id IN $hyperedge_ids");
        }
        if !subjects.is_empty() {
            statement = statement.param("subjects", subjects.to_vec());
            conditions.push(
                "EXISTS { MATCH (h)-[:CONNECTS {role: 'subject'}]->(ns:Node) WHERE ns.id IN $subjects }",
            );
        }
        if !objects.is_empty() {
            statement = statement.param("objects", objects.to_vec());
            conditions.push(
                "EXISTS { MATCH (h)-[:CONNECTS {role: 'object'}]->(no:Node) WHERE no.id IN $objects }",
            );
        }
        if !entities.is_empty() {
            statement = statement.param("entities", entities.to_vec());
            conditions
                .push("EXISTS { MATCH (h)-[:CONNECTS]->(ne:Node) WHERE ne.id IN $entities }");
        }

        let mut text = String::from("MATCH (h:Hyperedge)\n");
        if !conditions.is_empty() {
            text.push_str(&format!("WHERE {}\n", conditions.join(" AND ")));
        }
        text.push_str("RETURN h.id AS hyperedge_id\nORDER BY hyperedge_id\nLIMIT $limit");
        statement.text = text;

        let mut ids = Vec::new();
        let mut rows = self.graph.execute(statement.into_query()).await?;
        while let Some(row) = rows.next().await? {
            let id: String = row
                .get("hyperedge_id")
                .map_err(|e| GraphError::ResultShape(e.to_string()))?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Delete every node and edge.
    pub async fn clear(&self) -> Result<()> {
        self.graph.run(neo4rs::query("MATCH (n) DETACH DELETE n")).await?;
        Ok(())
    }
}

/// Rebuild an interval and spatial context from a context row selected with
/// [`CONTEXT_COLUMNS`].
fn context_from_row(row: &neo4rs::Row) -> Result<(TemporalInterval, SpatialContext)> {
    let shape = |e: neo4rs::DeError| GraphError::ResultShape(e.to_string());
    let from_time: Option<String> = row.get("from_time").map_err(shape)?;
    let to_time: Option<String> = row.get("to_time").map_err(shape)?;
    let location_name: Option<String> = row.get("location_name").map_err(shape)?;
    let spatial_type: Option<String> = row.get("spatial_type").map_err(shape)?;
    let lon: Option<f64> = row.get("lon").map_err(shape)?;
    let lat: Option<f64> = row.get("lat").map_err(shape)?;
    let coordinates_json: Option<String> = row.get("coordinates_json").map_err(shape)?;

    let geometry = match spatial_type.as_deref() {
        Some("Point") => Geometry::Point(lon.zip(lat)),
        Some("Polygon") => coordinates_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .map_or(Geometry::Unknown, Geometry::Polygon),
        Some("MultiPolygon") => coordinates_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .map_or(Geometry::Unknown, Geometry::MultiPolygon),
        _ => Geometry::Unknown,
    };

    Ok((
        TemporalInterval::new(from_time, to_time),
        SpatialContext::new(location_name.unwrap_or_else(|| "unknown".to_string()), geometry),
    ))
}
