use std::collections::HashMap;

use crate::error::{BrtError, BrtResult};
use crate::services::{Ear, ServiceState};

#[derive(Clone, Debug)]
struct SosEntry {
    left: Option<Vec<f32>>,
    right: Option<Vec<f32>>,
}

impl SosEntry {
    fn coefficients_for(&self, ear: Ear) -> Option<&Vec<f32>> {
        match ear {
            Ear::Left => self.left.as_ref(),
            Ear::Right => self.right.as_ref(),
        }
    }
}

fn round_to_step(value: f32, step: f32) -> i32 {
    if step <= 0.0 {
        value.round() as i32
    } else {
        (value / step).round() as i32
    }
}

/// Near-field second-order-section cascade table, keyed by (distance mm, azimuth deg)
/// (§4.3). A query for an ear with no direct measurement falls back to the mirrored
/// azimuth's opposite-ear entry, unchanged, when only one ear was ever measured.
pub struct SosFilterService {
    state: ServiceState,
    azimuth_step: f32,
    distance_step_mm: f32,
    table: HashMap<(i32, i32), SosEntry>,
    raw_azimuths: Vec<f32>,
    raw_distances_mm: Vec<f32>,
}

impl SosFilterService {
    pub fn new() -> Self {
        SosFilterService {
            state: ServiceState::Empty,
            azimuth_step: 1.0,
            distance_step_mm: 1.0,
            table: HashMap::new(),
            raw_azimuths: Vec::new(),
            raw_distances_mm: Vec::new(),
        }
    }

    pub fn begin_setup(&mut self) {
        self.table.clear();
        self.raw_azimuths.clear();
        self.raw_distances_mm.clear();
        self.state = ServiceState::SetupInProgress;
    }

    pub fn add_coefficients(
        &mut self,
        azimuth_deg: f32,
        distance_mm: f32,
        left: Option<Vec<f32>>,
        right: Option<Vec<f32>>,
    ) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("add_coefficients outside setup".to_string()));
        }
        self.raw_azimuths.push(azimuth_deg);
        self.raw_distances_mm.push(distance_mm);
        let key = (distance_mm.round() as i32, azimuth_deg.round() as i32);
        self.table.insert(key, SosEntry { left, right });
        Ok(())
    }

    /// Derives the minimum azimuth and distance step across the stored grid so later
    /// queries can round to the nearest stored sample.
    pub fn end_setup(&mut self) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("end_setup outside setup".to_string()));
        }
        self.azimuth_step = min_positive_gap(&self.raw_azimuths).unwrap_or(1.0);
        self.distance_step_mm = min_positive_gap(&self.raw_distances_mm).unwrap_or(1.0);

        let rebuilt: HashMap<(i32, i32), SosEntry> = self
            .table
            .drain()
            .map(|((dist, az), entry)| {
                let key = (round_to_step(dist as f32, self.distance_step_mm), round_to_step(az as f32, self.azimuth_step));
                (key, entry)
            })
            .collect();
        self.table = rebuilt;
        self.state = ServiceState::Loaded;
        Ok(())
    }

    fn key_for(&self, distance_m: f32, azimuth_deg: f32) -> (i32, i32) {
        (
            round_to_step(distance_m * 1000.0, self.distance_step_mm),
            round_to_step(azimuth_deg, self.azimuth_step),
        )
    }

    /// Nearest-grid-step SOS coefficients for `ear`. Falls back to the mirrored
    /// azimuth's opposite ear when only one ear was measured at that direction.
    pub fn get_sos_filter_coefficients(&self, ear: Ear, distance_m: f32, azimuth_deg: f32) -> Option<Vec<f32>> {
        if self.state != ServiceState::Loaded {
            return None;
        }
        let key = self.key_for(distance_m, azimuth_deg);
        if let Some(entry) = self.table.get(&key) {
            if let Some(c) = entry.coefficients_for(ear) {
                return Some(c.clone());
            }
        }
        let mirrored_key = self.key_for(distance_m, -azimuth_deg);
        if let Some(entry) = self.table.get(&mirrored_key) {
            if let Some(c) = entry.coefficients_for(ear.other()) {
                return Some(c.clone());
            }
        }
        None
    }
}

impl Default for SosFilterService {
    fn default() -> Self {
        Self::new()
    }
}

fn min_positive_gap(values: &[f32]) -> Option<f32> {
    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sorted.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    sorted.windows(2).map(|w| w[1] - w[0]).filter(|d| *d > 1e-6).fold(None, |acc, d| match acc {
        None => Some(d),
        Some(m) if d < m => Some(d),
        Some(m) => Some(m),
    })
}
