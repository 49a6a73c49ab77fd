use crate::math::orientation::{canonical_elevation, normalize_azimuth, normalize_elevation};
use crate::math::vector::get_barycentric_coords;
use crate::math::{OrientationKey, Vec3};

/// One elevation ring of the quasi-uniform sphere grid: its canonical elevation
/// (`[-90, 90]`) and the azimuth step chosen so arc-length spacing stays roughly
/// constant (§4.2 step 5).
#[derive(Copy, Clone, Debug)]
struct Band {
    elevation: f32,
    azimuth_step: f32,
    node_count: usize,
}

/// The quasi-uniform azimuth/elevation grid and its "grid step vector" (one azimuth
/// step per elevation band), plus the nearest-node and slopes-method-interpolation
/// queries built on top of it.
#[derive(Clone, Debug)]
pub struct Grid {
    elevation_step: f32,
    bands: Vec<Band>,
}

fn azimuth_step_for(elevation_canonical: f32, target_step: f32) -> f32 {
    let cos_el = elevation_canonical.to_radians().cos();
    if cos_el < 1e-4 {
        // At the poles a single node covers every azimuth.
        return 360.0;
    }
    let raw_step = (target_step / cos_el).min(360.0).max(1e-3);
    let node_count = (360.0 / raw_step).round().max(1.0) as usize;
    360.0 / node_count as f32
}

impl Grid {
    /// Builds bands from south pole to north pole at `elevation_step` degrees,
    /// guaranteeing elevation 0 and azimuth 0 are grid nodes.
    pub fn build(elevation_step: f32) -> Self {
        let elevation_step = if elevation_step <= 0.0 { 5.0 } else { elevation_step };
        let mut elevations = Vec::new();
        let mut e = -90.0;
        while e < 90.0 - 1e-6 {
            elevations.push(e);
            e += elevation_step;
        }
        elevations.push(90.0);

        let bands = elevations
            .into_iter()
            .map(|elevation| {
                let azimuth_step = azimuth_step_for(elevation, elevation_step);
                let node_count = (360.0 / azimuth_step).round().max(1.0) as usize;
                Band { elevation, azimuth_step, node_count }
            })
            .collect();

        Grid { elevation_step, bands }
    }

    pub fn elevation_step(&self) -> f32 {
        self.elevation_step
    }

    /// All grid nodes as normalised `(azimuth, elevation)` keys.
    pub fn nodes(&self) -> Vec<OrientationKey> {
        let mut out = Vec::new();
        for band in &self.bands {
            for i in 0..band.node_count {
                let az = i as f32 * band.azimuth_step;
                out.push(OrientationKey::new(az, band.elevation));
            }
        }
        out
    }

    fn band_index_for(&self, elevation_canonical: f32) -> usize {
        let mut best = 0;
        let mut best_dist = f32::MAX;
        for (i, band) in self.bands.iter().enumerate() {
            let d = (band.elevation - elevation_canonical).abs();
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    fn nearest_azimuth_node(&self, band: &Band, azimuth: f32) -> f32 {
        let steps = (azimuth / band.azimuth_step).round();
        normalize_azimuth(steps * band.azimuth_step)
    }

    /// Nearest stored grid node to `(azimuth, elevation)` in the toolkit's normalised
    /// storage convention. O(1): one band lookup, one azimuth rounding.
    pub fn nearest_node(&self, azimuth: f32, elevation: f32) -> OrientationKey {
        let azimuth = normalize_azimuth(azimuth);
        let elevation_canonical = canonical_elevation(normalize_elevation(elevation));
        let band_idx = self.band_index_for(elevation_canonical);
        let band = &self.bands[band_idx];
        let az_node = self.nearest_azimuth_node(band, azimuth);
        OrientationKey::new(az_node, band.elevation)
    }

    /// Three stored nodes forming a triangle around `(azimuth, elevation)` with
    /// barycentric weights summing to 1 ("slopes method", §4.2). Negative raw weights
    /// (query outside the chosen triangle) are clamped to zero and the remaining
    /// weights renormalised, which is the practical equivalent of "try the adjacent
    /// triangle" for a grid this coarse.
    pub fn interpolation_nodes(&self, azimuth: f32, elevation: f32) -> [(OrientationKey, f32); 3] {
        let azimuth = normalize_azimuth(azimuth);
        let elevation_canonical = canonical_elevation(normalize_elevation(elevation));

        let lo_idx = self.lower_band_index(elevation_canonical);
        let hi_idx = (lo_idx + 1).min(self.bands.len() - 1);
        if lo_idx == hi_idx {
            let node = self.nearest_node(azimuth, elevation);
            return [(node, 1.0), (node, 0.0), (node, 0.0)];
        }

        let lo = &self.bands[lo_idx];
        let hi = &self.bands[hi_idx];

        let lo_az_idx = (azimuth / lo.azimuth_step).floor();
        let lo_az_a = normalize_azimuth(lo_az_idx * lo.azimuth_step);
        let lo_az_b = normalize_azimuth((lo_az_idx + 1.0) * lo.azimuth_step);
        let hi_az_idx = (azimuth / hi.azimuth_step).floor();
        let hi_az_a = normalize_azimuth(hi_az_idx * hi.azimuth_step);
        let hi_az_b = normalize_azimuth((hi_az_idx + 1.0) * hi.azimuth_step);

        // Embed the (azimuth, elevation) patch as points in the z=0 plane so the shared
        // Vec3 barycentric routine can be reused directly. Unwrap azimuth locally so the
        // 0/360 seam does not break the triangle.
        let unwrap = |az: f32, reference: f32| -> f32 {
            if az < reference - 180.0 {
                az + 360.0
            } else if az > reference + 180.0 {
                az - 360.0
            } else {
                az
            }
        };
        let query_az_local = azimuth;
        let p = Vec3::new(query_az_local, elevation_canonical, 0.0);

        let p00 = Vec3::new(unwrap(lo_az_a, query_az_local), lo.elevation, 0.0);
        let p10 = Vec3::new(unwrap(lo_az_b, query_az_local), lo.elevation, 0.0);
        let p01 = Vec3::new(unwrap(hi_az_a, query_az_local), hi.elevation, 0.0);
        let p11 = Vec3::new(unwrap(hi_az_b, query_az_local), hi.elevation, 0.0);

        let u = if (lo_az_b - lo_az_a).abs() > 1e-6 {
            ((query_az_local - lo_az_a) / lo.azimuth_step).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (a, b, c, key_a, key_b, key_c) = if u <= 0.5 {
            (p00, p10, p01, (lo_az_a, lo.elevation), (lo_az_b, lo.elevation), (hi_az_a, hi.elevation))
        } else {
            (p10, p11, p01, (lo_az_b, lo.elevation), (hi_az_b, hi.elevation), (hi_az_a, hi.elevation))
        };

        let (mut alpha, mut beta, mut gamma) = get_barycentric_coords(&p, &a, &b, &c);
        alpha = alpha.max(0.0);
        beta = beta.max(0.0);
        gamma = gamma.max(0.0);
        let sum = alpha + beta + gamma;
        if sum > 1e-6 {
            alpha /= sum;
            beta /= sum;
            gamma /= sum;
        } else {
            alpha = 1.0;
        }

        [
            (OrientationKey::new(key_a.0, key_a.1), alpha),
            (OrientationKey::new(key_b.0, key_b.1), beta),
            (OrientationKey::new(key_c.0, key_c.1), gamma),
        ]
    }

    fn lower_band_index(&self, elevation_canonical: f32) -> usize {
        let mut idx = 0;
        for (i, band) in self.bands.iter().enumerate() {
            if band.elevation <= elevation_canonical + 1e-6 {
                idx = i;
            }
        }
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_includes_equator_and_azimuth_zero() {
        let grid = Grid::build(5.0);
        let nodes = grid.nodes();
        assert!(nodes.iter().any(|n| n.elevation.abs() < 1e-3 && n.azimuth.abs() < 1e-3));
    }

    #[test]
    fn nearest_node_matches_exact_grid_point() {
        let grid = Grid::build(10.0);
        let node = grid.nearest_node(0.0, 0.0);
        assert!(node.azimuth.abs() < 1e-3);
        assert!(node.elevation.abs() < 1e-3);
    }

    #[test]
    fn interpolation_weights_sum_to_one() {
        let grid = Grid::build(5.0);
        let nodes = grid.interpolation_nodes(2.3, 1.1);
        let total: f32 = nodes.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn interpolation_at_exact_node_is_degenerate_to_that_node() {
        let grid = Grid::build(10.0);
        let nodes = grid.interpolation_nodes(0.0, 0.0);
        let hit = nodes.iter().find(|(k, w)| k.azimuth.abs() < 1e-3 && k.elevation.abs() < 1e-3 && *w > 0.99);
        assert!(hit.is_some());
    }
}
