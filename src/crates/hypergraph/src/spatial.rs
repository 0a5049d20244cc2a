//! Planar geometry predicates for the read-side coordinate filter.
//!
//! All inputs are `[lon, lat]` pairs. Polygons here are single rings, which
//! is all the 20-vertex-capped stored geometries need.

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (x, y) = (point[0], point[1]);
    let n = polygon.len();
    let mut inside = false;

    let (mut p1x, mut p1y) = (polygon[0][0], polygon[0][1]);
    for i in 0..=n {
        let [p2x, p2y] = polygon[i % n];
        if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
            let crosses = if (p1y - p2y).abs() > f64::EPSILON {
                let x_intersect = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
                (p1x - p2x).abs() < f64::EPSILON || x <= x_intersect
            } else {
                (p1x - p2x).abs() < f64::EPSILON
            };
            if crosses {
                inside = !inside;
            }
        }
        p1x = p2x;
        p1y = p2y;
    }
    inside
}

fn bounding_boxes_overlap(a: &[[f64; 2]], b: &[[f64; 2]]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let bounds = |poly: &[[f64; 2]]| {
        let mut min = [f64::INFINITY, f64::INFINITY];
        let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        for p in poly {
            min[0] = min[0].min(p[0]);
            min[1] = min[1].min(p[1]);
            max[0] = max[0].max(p[0]);
            max[1] = max[1].max(p[1]);
        }
        (min, max)
    };
    let (a_min, a_max) = bounds(a);
    let (b_min, b_max) = bounds(b);
    !(a_max[0] < b_min[0] || b_max[0] < a_min[0] || a_max[1] < b_min[1] || b_max[1] < a_min[1])
}

fn ccw(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    (c[1] - a[1]) * (b[0] - a[0]) > (b[1] - a[1]) * (c[0] - a[0])
}

fn edges_intersect(a1: [f64; 2], a2: [f64; 2], b1: [f64; 2], b2: [f64; 2]) -> bool {
    ccw(a1, b1, b2) != ccw(a2, b1, b2) && ccw(a1, a2, b1) != ccw(a1, a2, b2)
}

/// Whether two polygon rings intersect: containment either way, or any pair
/// of edges crossing. A bounding-box check short-circuits the common miss.
pub fn polygons_intersect(a: &[[f64; 2]], b: &[[f64; 2]]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if !bounding_boxes_overlap(a, b) {
        return false;
    }
    if a.iter().any(|p| point_in_polygon(*p, b)) {
        return true;
    }
    if b.iter().any(|p| point_in_polygon(*p, a)) {
        return true;
    }
    for i in 0..a.len() {
        let a1 = a[i];
        let a2 = a[(i + 1) % a.len()];
        for j in 0..b.len() {
            if edges_intersect(a1, a2, b[j], b[(j + 1) % b.len()]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    #[test]
    fn point_inside_and_outside_square() {
        assert!(point_in_polygon([0.5, 0.5], &unit_square()));
        assert!(!point_in_polygon([1.5, 0.5], &unit_square()));
        assert!(!point_in_polygon([-0.1, -0.1], &unit_square()));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon([0.0, 0.0], &[[0.0, 0.0], [1.0, 1.0]]));
    }

    #[test]
    fn overlapping_squares_intersect() {
        let shifted: Vec<[f64; 2]> = unit_square()
            .iter()
            .map(|p| [p[0] + 0.5, p[1] + 0.5])
            .collect();
        assert!(polygons_intersect(&unit_square(), &shifted));
    }

    #[test]
    fn disjoint_squares_do_not_intersect() {
        let far: Vec<[f64; 2]> = unit_square().iter().map(|p| [p[0] + 5.0, p[1]]).collect();
        assert!(!polygons_intersect(&unit_square(), &far));
    }

    #[test]
    fn containment_counts_as_intersection() {
        let inner = vec![[0.25, 0.25], [0.75, 0.25], [0.75, 0.75], [0.25, 0.75]];
        assert!(polygons_intersect(&unit_square(), &inner));
        assert!(polygons_intersect(&inner, &unit_square()));
    }
}
