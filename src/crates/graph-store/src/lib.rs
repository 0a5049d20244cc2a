//! Neo4j storage backend for the spatiotemporal hypergraph.
//!
//! Persisted model:
//!
//! - `(:Node {id, type})` - entities
//! - `(:Hyperedge {id, relation_type, entity_count})` - facts
//! - `(:Context {id, from_time, to_time, location_name, spatial_type,
//!   coordinates, certainty})` - spatiotemporal validity contexts
//! - `[:CONNECTS {role}]` hyperedge -> entity
//! - `[:VALID_IN]` hyperedge -> context
//! - `(:StateChangeEvent {id})` with `[:AFFECTS_FACT]`, `[:CAUSES_STATE]`
//!   and `[:REQUIRES_STATE]` edges
//!
//! All mutation statements are built as [`Statement`] values - plain query
//! text plus a JSON parameter map - so the append-vs-create decision and
//! every statement shape can be tested without a live database. User
//! strings always travel as parameters; only structural fragments (counts,
//! role names, booleans) and the deterministic content-addressed ids from
//! [`hypergraph::identity`] are interpolated.

pub mod config;
pub mod error;
pub mod locator;
pub mod modify;
pub mod query;
pub mod state;
pub mod statement;
pub mod store;
pub mod write;

pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use locator::HyperedgeRecord;
pub use query::{HyperedgeData, SpatioTemporalFilter};
pub use statement::Statement;
pub use store::GraphStore;
