//! Read-side queries: spatiotemporal filtering and data export.

use serde::Serialize;

use hypergraph::{spatial, Geometry, SpatialContext, TemporalInterval};

use crate::statement::Statement;

/// Filter for the spatiotemporal read query.
///
/// When a time window is given, contexts with unknown bounds are excluded
/// unless `include_temporally_unconstrained` is set; the same applies to
/// `include_spatially_unconstrained` for coordinate filtering.
#[derive(Debug, Clone, Default)]
pub struct SpatioTemporalFilter {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location_names: Option<Vec<String>>,
    pub location_coordinates: Option<Vec<[f64; 2]>>,
    pub include_spatially_unconstrained: bool,
    pub include_temporally_unconstrained: bool,
}

impl SpatioTemporalFilter {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.location_names.as_deref().map_or(true, |n| n.is_empty())
            && self
                .location_coordinates
                .as_deref()
                .map_or(true, |c| c.is_empty())
    }
}

/// Candidate-id query for a filter, `None` when no filter applies (the
/// caller then takes every hyperedge).
pub fn spatiotemporal_query(filter: &SpatioTemporalFilter) -> Option<Statement> {
    if filter.is_empty() {
        return None;
    }

    let mut conditions: Vec<String> = Vec::new();
    let mut statement = Statement::new(String::new());

    if let Some(start) = &filter.start_time {
        statement = statement.param("start_time", start.clone());
        if filter.include_temporally_unconstrained {
            conditions.push("(c.to_time IS NULL OR c.to_time >= $start_time)".to_string());
        } else {
            conditions.push("(c.to_time IS NOT NULL AND c.to_time >= $start_time)".to_string());
        }
    }
    if let Some(end) = &filter.end_time {
        statement = statement.param("end_time", end.clone());
        if filter.include_temporally_unconstrained {
            conditions.push("(c.from_time IS NULL OR c.from_time <= $end_time)".to_string());
        } else {
            conditions.push("(c.from_time IS NOT NULL AND c.from_time <= $end_time)".to_string());
        }
    }

    if let Some(names) = filter.location_names.as_deref().filter(|n| !n.is_empty()) {
        statement = statement.param("location_names", names.to_vec());
        conditions.push("c.location_name IN $location_names".to_string());
    } else if filter
        .location_coordinates
        .as_deref()
        .is_some_and(|c| !c.is_empty())
    {
        if filter.include_spatially_unconstrained {
            conditions.push("(c.coordinates IS NOT NULL OR c.spatial_type IS NULL)".to_string());
        } else {
            conditions.push("c.coordinates IS NOT NULL".to_string());
        }
    }

    let mut text = String::from("MATCH (h:Hyperedge)-[:VALID_IN]->(c:Context)\n");
    if !conditions.is_empty() {
        text.push_str(&format!("WHERE {}\n", conditions.join(" AND ")));
    }
    text.push_str("RETURN DISTINCT h.id AS hyperedge_id");
    statement.text = text;
    Some(statement)
}

/// Whether a stored geometry lies in or crosses the query area.
pub fn geometry_matches_area(geometry: &Geometry, area: &[[f64; 2]]) -> bool {
    match geometry {
        Geometry::Point(Some((lon, lat))) => spatial::point_in_polygon([*lon, *lat], area),
        Geometry::Polygon(rings) => rings
            .first()
            .is_some_and(|ring| spatial::polygons_intersect(ring, area)),
        Geometry::MultiPolygon(polys) => polys.iter().any(|rings| {
            rings
                .first()
                .is_some_and(|ring| spatial::polygons_intersect(ring, area))
        }),
        Geometry::Point(None) | Geometry::Unknown => false,
    }
}

/// A context node as exported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ContextData {
    pub id: Option<String>,
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    pub location_name: Option<String>,
}

/// A hyperedge with its connected entities and contexts, in the shape the
/// visualisation and ask tools consume.
#[derive(Debug, Clone, Serialize)]
pub struct HyperedgeData {
    pub id: String,
    pub relation_type: String,
    pub entities: Vec<String>,
    pub subjects: Vec<String>,
    pub objects: Vec<String>,
    pub temporal_intervals: Vec<TemporalInterval>,
    pub spatial_contexts: Vec<SpatialContext>,
    pub contexts: Vec<ContextData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_yields_no_query() {
        assert!(spatiotemporal_query(&SpatioTemporalFilter::default()).is_none());
    }

    #[test]
    fn strict_time_window_excludes_unconstrained_contexts() {
        let filter = SpatioTemporalFilter {
            start_time: Some("2020-01-01T00:00:00".into()),
            end_time: Some("2020-12-31T23:59:59".into()),
            ..SpatioTemporalFilter::default()
        };
        let statement = spatiotemporal_query(&filter).unwrap();
        assert!(statement
            .text
            .contains("(c.to_time IS NOT NULL AND c.to_time >= $start_time)"));
        assert!(statement
            .text
            .contains("(c.from_time IS NOT NULL AND c.from_time <= $end_time)"));
    }

    #[test]
    fn unconstrained_flag_admits_open_bounds() {
        let filter = SpatioTemporalFilter {
            start_time: Some("2020-01-01T00:00:00".into()),
            include_temporally_unconstrained: true,
            ..SpatioTemporalFilter::default()
        };
        let statement = spatiotemporal_query(&filter).unwrap();
        assert!(statement
            .text
            .contains("(c.to_time IS NULL OR c.to_time >= $start_time)"));
    }

    #[test]
    fn location_names_win_over_coordinates() {
        let filter = SpatioTemporalFilter {
            location_names: Some(vec!["Boston".into()]),
            location_coordinates: Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
            ..SpatioTemporalFilter::default()
        };
        let statement = spatiotemporal_query(&filter).unwrap();
        assert!(statement.text.contains("c.location_name IN $location_names"));
        assert!(!statement.text.contains("c.coordinates"));
    }

    #[test]
    fn coordinate_filter_requires_coordinates_unless_unconstrained() {
        let area = Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        let strict = spatiotemporal_query(&SpatioTemporalFilter {
            location_coordinates: area.clone(),
            ..SpatioTemporalFilter::default()
        })
        .unwrap();
        assert!(strict.text.contains("c.coordinates IS NOT NULL"));

        let lax = spatiotemporal_query(&SpatioTemporalFilter {
            location_coordinates: area,
            include_spatially_unconstrained: true,
            ..SpatioTemporalFilter::default()
        })
        .unwrap();
        assert!(lax
            .text
            .contains("(c.coordinates IS NOT NULL OR c.spatial_type IS NULL)"));
    }

    #[test]
    fn point_and_polygon_area_matching() {
        let area = vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        assert!(geometry_matches_area(&Geometry::Point(Some((1.0, 1.0))), &area));
        assert!(!geometry_matches_area(&Geometry::Point(Some((5.0, 5.0))), &area));
        assert!(!geometry_matches_area(&Geometry::Point(None), &area));

        let polygon = Geometry::Polygon(vec![vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]]]);
        assert!(geometry_matches_area(&polygon, &area));
    }
}
