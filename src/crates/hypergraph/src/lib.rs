//! Spatiotemporal hypergraph data model.
//!
//! This crate defines the typed records that flow through the ingestion
//! pipeline and into the graph store:
//!
//! - [`TemporalFact`] - a relation over one or more subjects and zero or
//!   more objects, valid in a set of `(interval, place)` contexts
//! - [`StateChangeEvent`] - a causal link between facts
//! - [`Modification`] - a retroactive correction to an asserted fact
//!
//! It also provides the content-addressed identity scheme ([`identity`])
//! shared by every graph mutation, plus the temporal and planar-geometry
//! helpers used on the read side.

pub mod fact;
pub mod identity;
pub mod spatial;
pub mod temporal;

pub use fact::{
    Cause, Effect, Fact, FactRef, FieldChanges, Geometry, Modification, RequiredState,
    SpatialContext, StateChangeEvent, TemporalFact, TemporalInterval,
};
pub use identity::{context_id, coordinate_signature, escape_single_quotes, event_id, hyperedge_id};
