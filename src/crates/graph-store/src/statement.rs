//! Graph mutation statements as plain values.

use serde_json::{Map, Value};

use hypergraph::Geometry;

/// Maximum byte length of a polygon JSON literal before it degrades to null.
pub const MAX_COORDINATES_JSON: usize = 200_000;

/// One parameterised graph statement.
///
/// Parameters are held as JSON and converted to Bolt values at execution
/// time, which keeps builders and their tests free of the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Map<String, Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    /// Attach a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Convert into a driver query.
    pub fn into_query(self) -> neo4rs::Query {
        let mut query = neo4rs::query(&self.text);
        for (key, value) in self.params {
            query = apply_param(query, &key, value);
        }
        query
    }
}

fn apply_param(query: neo4rs::Query, key: &str, value: Value) -> neo4rs::Query {
    match value {
        Value::String(s) => query.param(key, s),
        Value::Bool(b) => query.param(key, b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.param(key, i)
            } else {
                query.param(key, n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Array(items) => {
            // The builders only parameterise flat string lists and the
            // locator's [start, end] pair lists.
            if items.iter().all(Value::is_string) {
                let list: Vec<String> = items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                query.param(key, list)
            } else {
                let nested: Vec<Vec<String>> = items
                    .into_iter()
                    .map(|inner| match inner {
                        Value::Array(pair) => pair
                            .into_iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                        other => vec![other.to_string()],
                    })
                    .collect();
                query.param(key, nested)
            }
        }
        // Nulls are always emitted as literals in the statement text.
        Value::Null | Value::Object(_) => query,
    }
}

/// How a context's coordinates are written.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatesValue {
    /// Interpolated as-is: a `point({...})` constructor or `null`.
    Literal(String),
    /// A polygon JSON string, passed as a parameter.
    Json(String),
}

impl CoordinatesValue {
    /// Render the right-hand side for an assignment, registering a
    /// parameter when the value is a JSON payload.
    pub fn assign(&self, statement: Statement, param_key: &str) -> (Statement, String) {
        match self {
            CoordinatesValue::Literal(literal) => (statement, literal.clone()),
            CoordinatesValue::Json(json) => (
                statement.param(param_key, json.clone()),
                format!("${param_key}"),
            ),
        }
    }
}

/// Coordinates of a geometry as stored on a Context node.
///
/// Points become a native point literal; polygons a compact JSON string;
/// oversized polygons (and absent coordinates) degrade to `null`.
pub fn coordinates_value(geometry: &Geometry) -> CoordinatesValue {
    match geometry {
        Geometry::Point(Some((lon, lat))) => {
            CoordinatesValue::Literal(format!("point({{longitude: {lon}, latitude: {lat}}})"))
        }
        Geometry::Point(None) | Geometry::Unknown => CoordinatesValue::Literal("null".to_string()),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
            let json = geometry.coordinates_json().to_string();
            if json.len() > MAX_COORDINATES_JSON {
                CoordinatesValue::Literal("null".to_string())
            } else {
                CoordinatesValue::Json(json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_coordinates_are_a_native_literal() {
        let value = coordinates_value(&Geometry::Point(Some((-0.1759, 51.4987))));
        assert_eq!(
            value,
            CoordinatesValue::Literal("point({longitude: -0.1759, latitude: 51.4987})".into())
        );
    }

    #[test]
    fn missing_coordinates_are_null() {
        assert_eq!(
            coordinates_value(&Geometry::Point(None)),
            CoordinatesValue::Literal("null".into())
        );
        assert_eq!(
            coordinates_value(&Geometry::Unknown),
            CoordinatesValue::Literal("null".into())
        );
    }

    #[test]
    fn polygon_coordinates_are_compact_json() {
        let geometry = Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]]);
        let CoordinatesValue::Json(json) = coordinates_value(&geometry) else {
            panic!("expected json coordinates");
        };
        assert_eq!(json, "[[[0.0,0.0],[1.0,0.0],[0.0,0.0]]]");
    }

    #[test]
    fn oversized_polygon_degrades_to_null() {
        let ring: Vec<[f64; 2]> = (0..20_000)
            .map(|i| [f64::from(i) * 1.000_001, f64::from(i) * 2.000_002])
            .collect();
        let value = coordinates_value(&Geometry::Polygon(vec![ring]));
        assert_eq!(value, CoordinatesValue::Literal("null".into()));
    }

    #[test]
    fn statement_params_accumulate() {
        let statement = Statement::new("RETURN $a, $b")
            .param("a", "x")
            .param("b", vec!["y".to_string()]);
        assert_eq!(statement.params.len(), 2);
        assert_eq!(statement.params["a"], "x");
    }
}
