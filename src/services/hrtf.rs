use std::collections::HashMap;

use crate::config::GlobalParameters;
use crate::dsp::partitioned_convolver::{partition_and_transform, SubFilter};
use crate::error::{BrtError, BrtResult};
use crate::math::orientation::{canonical_elevation, normalize_azimuth, normalize_elevation};
use crate::math::{Orientation, OrientationKey};
use crate::services::grid::Grid;
use crate::services::{Ear, ServiceState};

/// How `end_setup` fills directions the raw table never measured (§4.2 step 2).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtrapolationMethod {
    /// Insert a silent (all-zero) impulse response.
    Zero,
    /// Copy the impulse response of the nearest measured direction.
    NearestPoint,
}

/// Elevation gap from either pole beyond which cap-filling synthesises intermediate
/// rings instead of leaving the plain extrapolation fill in place (§4.2 step 4).
const DEFAULT_CAP_GAP_THRESHOLD_DEG: f32 = 10.0;
const DEFAULT_GRID_STEP_DEG: f32 = 5.0;

#[derive(Clone, Debug)]
struct Thrir {
    left: Vec<f32>,
    right: Vec<f32>,
    left_delay: u32,
    right_delay: u32,
}

impl Thrir {
    fn silence(len: usize) -> Self {
        Thrir { left: vec![0.0; len], right: vec![0.0; len], left_delay: 0, right_delay: 0 }
    }
}

#[derive(Clone)]
struct ThrirPartitioned {
    left: Vec<SubFilter>,
    right: Vec<SubFilter>,
    left_delay: u32,
    right_delay: u32,
}

/// Stores measured head-related impulse responses, fills in poles/caps/gaps, resamples
/// onto a quasi-uniform grid and serves partitioned per-ear responses at runtime (§4.2).
pub struct HrtfService {
    state: ServiceState,
    params: GlobalParameters,
    ir_length: usize,
    extrapolation: ExtrapolationMethod,
    grid_step_deg: f32,
    cap_gap_threshold_deg: f32,

    raw: HashMap<OrientationKey, Thrir>,
    grid: Option<Grid>,
    resampled: HashMap<OrientationKey, ThrirPartitioned>,
    num_sub_filters: usize,

    pub woodworth_itd_enabled: bool,
    pub head_radius_m: f32,
    pub sound_speed_mps: f32,
}

impl HrtfService {
    pub fn new(params: GlobalParameters) -> Self {
        HrtfService {
            state: ServiceState::Empty,
            params,
            ir_length: 0,
            extrapolation: ExtrapolationMethod::NearestPoint,
            grid_step_deg: DEFAULT_GRID_STEP_DEG,
            cap_gap_threshold_deg: DEFAULT_CAP_GAP_THRESHOLD_DEG,
            raw: HashMap::new(),
            grid: None,
            resampled: HashMap::new(),
            num_sub_filters: 0,
            woodworth_itd_enabled: false,
            head_radius_m: 0.0875,
            sound_speed_mps: 343.0,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn begin_setup(&mut self, ir_length: usize, extrapolation: ExtrapolationMethod) {
        self.raw.clear();
        self.resampled.clear();
        self.grid = None;
        self.ir_length = ir_length;
        self.extrapolation = extrapolation;
        self.state = ServiceState::SetupInProgress;
    }

    /// Inserts one measured direction. `sample_rate` must match the service's configured
    /// rate (§3 invariant); a duplicate (azimuth, elevation) is ignored with a warning.
    pub fn add_hrir(
        &mut self,
        azimuth: f32,
        elevation: f32,
        sample_rate: u32,
        left_hrir: Vec<f32>,
        right_hrir: Vec<f32>,
        left_delay: u32,
        right_delay: u32,
    ) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("add_hrir outside setup".to_string()));
        }
        if sample_rate != self.params.sample_rate() {
            return Err(BrtError::BadSize(format!(
                "hrir sample rate {} does not match configured rate {}",
                sample_rate,
                self.params.sample_rate()
            )));
        }
        let key = OrientationKey::new(azimuth, elevation);
        if self.raw.contains_key(&key) {
            log::warn!("duplicate hrir entry at ({}, {}) ignored", key.azimuth, key.elevation);
            return Ok(());
        }
        self.raw.insert(key, Thrir { left: left_hrir, right: right_hrir, left_delay, right_delay });
        Ok(())
    }

    /// Runs the full setup pipeline (§4.2 steps 1-6) and moves the service to `Loaded`.
    pub fn end_setup(&mut self) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("end_setup outside setup".to_string()));
        }
        if self.raw.is_empty() {
            self.state = ServiceState::Loaded;
            return Ok(());
        }

        self.remove_common_delay();

        let grid = Grid::build(self.grid_step_deg);
        let mut working: HashMap<OrientationKey, Thrir> = self.raw.clone();

        self.extrapolate_missing_nodes(&grid, &mut working);
        self.synthesize_poles(&mut working);
        self.fill_caps(&grid, &mut working);

        self.num_sub_filters = (self.ir_length + self.params.block_size() - 1) / self.params.block_size().max(1);
        let block_size = self.params.block_size();
        let mut resampled = HashMap::with_capacity(working.len());
        for key in grid.nodes() {
            let entry = match working.get(&key) {
                Some(e) => e.clone(),
                None => {
                    log::warn!("grid node ({}, {}) left unfilled after setup, substituting silence", key.azimuth, key.elevation);
                    Thrir::silence(self.ir_length)
                }
            };
            resampled.insert(
                key,
                ThrirPartitioned {
                    left: partition_and_transform(&entry.left, block_size),
                    right: partition_and_transform(&entry.right, block_size),
                    left_delay: entry.left_delay,
                    right_delay: entry.right_delay,
                },
            );
        }

        self.grid = Some(grid);
        self.resampled = resampled;
        self.state = ServiceState::Loaded;
        Ok(())
    }

    fn remove_common_delay(&mut self) {
        let min_left = self.raw.values().map(|t| t.left_delay).min().unwrap_or(0);
        let min_right = self.raw.values().map(|t| t.right_delay).min().unwrap_or(0);
        for entry in self.raw.values_mut() {
            entry.left_delay -= min_left;
            entry.right_delay -= min_right;
        }
    }

    fn nearest_raw(&self, working: &HashMap<OrientationKey, Thrir>, key: OrientationKey) -> Option<(OrientationKey, f32)> {
        let target = Orientation::new(key.azimuth, key.elevation, 1.0).direction();
        working
            .keys()
            .map(|k| {
                let dir = Orientation::new(k.azimuth, k.elevation, 1.0).direction();
                let cos_angle = target.dot(&dir).clamp(-1.0, 1.0);
                (*k, cos_angle.acos())
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    /// §4.2 step 2: guarantees every grid node the resampling step will visit has an
    /// entry, inserting either silence or a copy of the nearest measurement.
    fn extrapolate_missing_nodes(&self, grid: &Grid, working: &mut HashMap<OrientationKey, Thrir>) {
        for key in grid.nodes() {
            if working.contains_key(&key) {
                continue;
            }
            let filled = match self.extrapolation {
                ExtrapolationMethod::Zero => Thrir::silence(self.ir_length),
                ExtrapolationMethod::NearestPoint => match self.nearest_raw(working, key) {
                    Some((nearest, _)) => working.get(&nearest).unwrap().clone(),
                    None => Thrir::silence(self.ir_length),
                },
            };
            log::warn!("extrapolated missing direction ({}, {})", key.azimuth, key.elevation);
            working.insert(key, filled);
        }
    }

    /// §4.2 step 3: four-sector hemisphere average, replicated as a single azimuth-0
    /// entry; queries at a pole always resolve to that single node regardless of the
    /// requested azimuth (pole invariance, §8).
    fn synthesize_poles(&self, working: &mut HashMap<OrientationKey, Thrir>) {
        for &pole_elevation in &[90.0f32, 270.0f32] {
            let pole_key = OrientationKey::new(0.0, pole_elevation);
            if self.raw.contains_key(&pole_key) {
                working.insert(pole_key, self.raw.get(&pole_key).unwrap().clone());
                continue;
            }
            let canonical = canonical_elevation(normalize_elevation(pole_elevation));
            let hemisphere: Vec<&Thrir> = self
                .raw
                .iter()
                .filter(|(k, _)| {
                    let el = canonical_elevation(k.elevation);
                    if canonical > 0.0 { el > 0.0 } else { el < 0.0 }
                })
                .map(|(_, v)| v)
                .collect();
            if hemisphere.is_empty() {
                continue;
            }
            let mut sector_means = Vec::with_capacity(4);
            for sector in 0..4 {
                let lo = sector as f32 * 90.0;
                let hi = lo + 90.0;
                let in_sector: Vec<&Thrir> = self
                    .raw
                    .iter()
                    .filter(|(k, _)| {
                        let el = canonical_elevation(k.elevation);
                        let same_hemisphere = if canonical > 0.0 { el > 0.0 } else { el < 0.0 };
                        same_hemisphere && k.azimuth >= lo && k.azimuth < hi
                    })
                    .map(|(_, v)| v)
                    .collect();
                if !in_sector.is_empty() {
                    sector_means.push(mean_thrir(&in_sector, self.ir_length));
                }
            }
            if sector_means.is_empty() {
                continue;
            }
            let refs: Vec<&Thrir> = sector_means.iter().collect();
            let pole_ir = mean_thrir(&refs, self.ir_length);
            log::warn!("synthesised pole at elevation {}", pole_elevation);
            working.insert(pole_key, pole_ir);
        }
    }

    /// §4.2 step 4: when the gap between the highest measured ring and a pole exceeds
    /// the threshold, overwrite the plain extrapolation fill in that gap with a
    /// distance-weighted blend of the nearest measured entries (the practical stand-in
    /// for the spec's "same barycentric procedure used at run time" — a full
    /// re-triangulation of an irregular measured set is not worth the complexity here).
    fn fill_caps(&self, grid: &Grid, working: &mut HashMap<OrientationKey, Thrir>) {
        for pole_sign in [1.0f32, -1.0f32] {
            let max_measured = self
                .raw
                .keys()
                .map(|k| canonical_elevation(k.elevation))
                .filter(|e| e.signum() == pole_sign || *e == 0.0)
                .fold(0.0f32, |acc, e| if pole_sign > 0.0 { acc.max(e) } else { acc.min(e) });
            let gap = if pole_sign > 0.0 { 90.0 - max_measured } else { max_measured - (-90.0) };
            if gap <= self.cap_gap_threshold_deg {
                continue;
            }
            for key in grid.nodes() {
                let canonical = canonical_elevation(key.elevation);
                let inside_cap = if pole_sign > 0.0 { canonical > max_measured } else { canonical < max_measured };
                if !inside_cap || (canonical - pole_sign * 90.0).abs() < 1e-3 {
                    continue;
                }
                if let Some(blended) = self.blend_nearest_raw(key, 3) {
                    working.insert(key, blended);
                }
            }
        }
    }

    fn blend_nearest_raw(&self, key: OrientationKey, k: usize) -> Option<Thrir> {
        let target = Orientation::new(key.azimuth, key.elevation, 1.0).direction();
        let mut distances: Vec<(&OrientationKey, &Thrir, f32)> = self
            .raw
            .iter()
            .map(|(rk, rv)| {
                let dir = Orientation::new(rk.azimuth, rk.elevation, 1.0).direction();
                let angle = target.dot(&dir).clamp(-1.0, 1.0).acos();
                (rk, rv, angle)
            })
            .collect();
        if distances.is_empty() {
            return None;
        }
        distances.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap());
        distances.truncate(k.min(distances.len()));

        let weights: Vec<f32> = distances.iter().map(|(_, _, d)| 1.0 / (d + 1e-3)).collect();
        let total: f32 = weights.iter().sum();
        let mut left = vec![0.0f32; self.ir_length];
        let mut right = vec![0.0f32; self.ir_length];
        let mut left_delay = 0.0f32;
        let mut right_delay = 0.0f32;
        for ((_, thrir, _), w) in distances.iter().zip(weights.iter()) {
            let w = w / total;
            for i in 0..self.ir_length.min(thrir.left.len()) {
                left[i] += w * thrir.left[i];
            }
            for i in 0..self.ir_length.min(thrir.right.len()) {
                right[i] += w * thrir.right[i];
            }
            left_delay += w * thrir.left_delay as f32;
            right_delay += w * thrir.right_delay as f32;
        }
        Some(Thrir { left, right, left_delay: left_delay.round() as u32, right_delay: right_delay.round() as u32 })
    }

    fn ear_delay(entry: &ThrirPartitioned, ear: Ear) -> u32 {
        match ear {
            Ear::Left => entry.left_delay,
            Ear::Right => entry.right_delay,
        }
    }

    fn ear_sub_filters(entry: &ThrirPartitioned, ear: Ear) -> &[SubFilter] {
        match ear {
            Ear::Left => &entry.left,
            Ear::Right => &entry.right,
        }
    }

    /// Number of sub-filters every resampled entry carries (`ceil(L/B)`, §3).
    pub fn num_sub_filters(&self) -> usize {
        self.num_sub_filters
    }

    fn query_nodes(&self, azimuth: f32, elevation: f32, run_time_interpolation: bool) -> Option<Vec<(OrientationKey, f32)>> {
        let grid = self.grid.as_ref()?;
        let orientation = Orientation::new(azimuth, elevation, 1.0);
        if orientation.is_pole() {
            let pole_az = 0.0;
            return Some(vec![(OrientationKey::new(pole_az, elevation), 1.0)]);
        }
        if !run_time_interpolation {
            return Some(vec![(grid.nearest_node(azimuth, elevation), 1.0)]);
        }
        Some(grid.interpolation_nodes(azimuth, elevation).to_vec())
    }

    /// Partitioned sub-filters for `ear` at (azimuth, elevation); `None` outside `Loaded`
    /// or when no resampled table exists. Weighted sub-filter-by-sub-filter blend when
    /// `run_time_interpolation` selects more than one node.
    pub fn get_hrir_partitioned(&self, ear: Ear, azimuth: f32, elevation: f32, run_time_interpolation: bool) -> Option<Vec<SubFilter>> {
        if self.state != ServiceState::Loaded {
            return None;
        }
        let nodes = self.query_nodes(azimuth, elevation, run_time_interpolation)?;
        let mut acc: Option<Vec<SubFilter>> = None;
        for (key, weight) in nodes {
            if weight.abs() < 1e-6 {
                continue;
            }
            let entry = self.resampled.get(&key)?;
            let subs = Self::ear_sub_filters(entry, ear);
            acc = Some(match acc {
                None => subs.iter().map(|s| s.iter().map(|c| c * weight).collect()).collect(),
                Some(mut existing) => {
                    for (dst, src) in existing.iter_mut().zip(subs.iter()) {
                        for (d, s) in dst.iter_mut().zip(src.iter()) {
                            *d += s * weight;
                        }
                    }
                    existing
                }
            });
        }
        acc
    }

    /// Per-ear delay for (azimuth, elevation). When Woodworth ITD is enabled the table
    /// delay is overridden: the ear nearer the source gets zero, the far ear gets
    /// `round(sampleRate * headRadius * (theta + sin theta) / soundSpeed)` (§4.2,
    /// §8's worked example takes precedence over the abstract left/right naming, which
    /// reads backwards relative to its own numeric scenario; see the ledger in
    /// DESIGN.md).
    pub fn get_hrir_delay(&self, ear: Ear, azimuth: f32, elevation: f32, run_time_interpolation: bool) -> Option<u32> {
        if self.state != ServiceState::Loaded {
            return None;
        }
        if self.woodworth_itd_enabled {
            return Some(self.woodworth_delay_samples(ear, azimuth, elevation));
        }
        let nodes = self.query_nodes(azimuth, elevation, run_time_interpolation)?;
        let mut acc = 0.0f32;
        for (key, weight) in nodes {
            if weight.abs() < 1e-6 {
                continue;
            }
            let entry = self.resampled.get(&key)?;
            acc += weight * Self::ear_delay(entry, ear) as f32;
        }
        Some(acc.round() as u32)
    }

    fn woodworth_delay_samples(&self, ear: Ear, azimuth: f32, elevation: f32) -> u32 {
        let az_rad = normalize_azimuth(azimuth).to_radians();
        let el_rad = canonical_elevation(normalize_elevation(elevation)).to_radians();
        let interaural_azimuth = (az_rad.sin() * el_rad.cos()).clamp(-1.0, 1.0).asin();
        let itd = self.head_radius_m * (interaural_azimuth + interaural_azimuth.sin()) / self.sound_speed_mps;
        let delay_samples = (itd.abs() * self.params.sample_rate() as f32).round() as u32;

        let near_ear = if interaural_azimuth >= 0.0 { Ear::Right } else { Ear::Left };
        if itd.abs() < 1e-9 || ear == near_ear {
            0
        } else {
            delay_samples
        }
    }
}

fn mean_thrir(entries: &[&Thrir], ir_length: usize) -> Thrir {
    let n = entries.len().max(1) as f32;
    let mut left = vec![0.0f32; ir_length];
    let mut right = vec![0.0f32; ir_length];
    let mut left_delay = 0.0f32;
    let mut right_delay = 0.0f32;
    for e in entries {
        for i in 0..ir_length.min(e.left.len()) {
            left[i] += e.left[i] / n;
        }
        for i in 0..ir_length.min(e.right.len()) {
            right[i] += e.right[i] / n;
        }
        left_delay += e.left_delay as f32 / n;
        right_delay += e.right_delay as f32 / n;
    }
    Thrir { left, right, left_delay: left_delay.round() as u32, right_delay: right_delay.round() as u32 }
}
