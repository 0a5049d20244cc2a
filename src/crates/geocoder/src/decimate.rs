//! Deterministic polygon decimation.
//!
//! Provider polygons can carry thousands of vertices (the UK boundary is a
//! pathological case); stored geometry is capped at [`MAX_VERTICES`] total
//! across all rings. Decimation samples each ring at an even stride, always
//! keeps index 0, trims to the per-ring cap, and re-closes the ring, so the
//! output depends only on the input.

use hypergraph::Geometry;

/// Hard cap on the total vertex count across all rings.
pub const MAX_VERTICES: usize = 20;

/// Minimum vertices a ring keeps regardless of the cap split.
const MIN_RING_VERTICES: usize = 4;

fn close_ring(mut ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    match (ring.first().copied(), ring.last().copied()) {
        (Some(first), Some(last)) if first != last => {
            ring.push(first);
            ring
        }
        _ => ring,
    }
}

fn open_ring(ring: &[[f64; 2]]) -> &[[f64; 2]] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if first == last && ring.len() > 1 => &ring[..ring.len() - 1],
        _ => ring,
    }
}

/// Sample one ring down to at most `target` unique vertices, re-closed.
pub fn decimate_ring(ring: &[[f64; 2]], target: usize) -> Vec<[f64; 2]> {
    let unique = open_ring(ring);
    let n = unique.len();
    if n <= target.max(MIN_RING_VERTICES) {
        return close_ring(unique.to_vec());
    }

    let step = n as f64 / target as f64;
    let mut indices: Vec<usize> = Vec::with_capacity(target);
    let mut k = 0usize;
    while indices.len() < target && (k as f64 * step) < n as f64 {
        let idx = (k as f64 * step) as usize;
        if indices.last() != Some(&idx) {
            indices.push(idx);
        }
        k += 1;
    }
    if !indices.contains(&0) {
        indices.insert(0, 0);
    }
    indices.truncate(target);

    close_ring(indices.into_iter().map(|i| unique[i]).collect())
}

/// Decimate a polygon or multipolygon to the global vertex cap.
///
/// Returns `None` when the geometry has no rings, or has so many rings that
/// even the minimal representation exceeds the cap - the caller falls back
/// to the provider point in both cases.
pub fn decimate(geometry: Geometry) -> Option<Geometry> {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = match &geometry {
        Geometry::Polygon(rings) => vec![rings.clone()],
        Geometry::MultiPolygon(polys) => polys.clone(),
        _ => return Some(geometry),
    };

    let num_rings: usize = polygons.iter().map(Vec::len).sum();
    if num_rings == 0 || num_rings * MIN_RING_VERTICES > MAX_VERTICES {
        return None;
    }
    let per_ring_cap = (MAX_VERTICES / num_rings).max(MIN_RING_VERTICES);

    let simplified: Vec<Vec<Vec<[f64; 2]>>> = polygons
        .iter()
        .map(|rings| {
            rings
                .iter()
                .map(|ring| decimate_ring(ring, per_ring_cap))
                .collect()
        })
        .collect();

    Some(match geometry {
        Geometry::Polygon(_) => Geometry::Polygon(simplified.into_iter().next().unwrap_or_default()),
        _ => Geometry::MultiPolygon(simplified),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle_ring(n: usize) -> Vec<[f64; 2]> {
        let mut ring: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let theta = (i as f64) / (n as f64) * std::f64::consts::TAU;
                [theta.cos(), theta.sin()]
            })
            .collect();
        let first = ring[0];
        ring.push(first);
        ring
    }

    #[test]
    fn small_rings_pass_through_closed() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let out = decimate_ring(&ring, 10);
        assert_eq!(out.first(), out.last());
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn large_ring_is_sampled_to_target() {
        let out = decimate_ring(&circle_ring(1000), 10);
        // Target unique vertices plus the closing duplicate.
        assert_eq!(out.len(), 11);
        assert_eq!(out.first(), out.last());
        assert_eq!(out[0], circle_ring(1000)[0]);
    }

    #[test]
    fn decimation_is_deterministic() {
        let ring = circle_ring(357);
        assert_eq!(decimate_ring(&ring, 7), decimate_ring(&ring, 7));
    }

    #[test]
    fn polygon_respects_global_cap() {
        let geometry = Geometry::Polygon(vec![circle_ring(500)]);
        let Some(Geometry::Polygon(rings)) = decimate(geometry) else {
            panic!("expected polygon");
        };
        let unique: usize = rings.iter().map(|r| r.len() - 1).sum();
        assert!(unique <= MAX_VERTICES);
    }

    #[test]
    fn cap_splits_across_rings() {
        let geometry = Geometry::MultiPolygon(vec![
            vec![circle_ring(100)],
            vec![circle_ring(100)],
            vec![circle_ring(100)],
            vec![circle_ring(100)],
        ]);
        let Some(Geometry::MultiPolygon(polys)) = decimate(geometry) else {
            panic!("expected multipolygon");
        };
        // 20 / 4 rings = 5 unique vertices per ring.
        for rings in &polys {
            assert_eq!(rings[0].len(), 6);
        }
    }

    #[test]
    fn too_many_rings_falls_back() {
        let rings: Vec<Vec<[f64; 2]>> = (0..6).map(|_| circle_ring(10)).collect();
        assert!(decimate(Geometry::Polygon(rings)).is_none());
    }

    #[test]
    fn points_are_untouched() {
        let point = Geometry::Point(Some((1.0, 2.0)));
        assert_eq!(decimate(point.clone()), Some(point));
    }
}
