use std::collections::HashMap;

use rustfft::num_complex::Complex;

use crate::config::GlobalParameters;
use crate::error::{BrtError, BrtResult};
use crate::math::{Orientation, OrientationKey};
use crate::services::grid::Grid;
use crate::services::ServiceState;

const DEFAULT_GRID_STEP_DEG: f32 = 5.0;

/// A directivity transfer function as a full, interlaced spectrum ready for a
/// single-partition frequency-domain multiply (§4.7): length `2*block_size`.
pub type DirectivitySpectrum = Vec<Complex<f32>>;

/// Stores measured source-directivity transfer functions (half-spectrum real/imag per
/// direction) and serves full interlaced spectra at runtime, sharing the HRTF service's
/// grid and barycentric online interpolator (§4.4).
pub struct DirectivityService {
    state: ServiceState,
    block_size: usize,
    grid_step_deg: f32,
    raw: HashMap<OrientationKey, (Vec<f32>, Vec<f32>)>,
    grid: Option<Grid>,
    resampled: HashMap<OrientationKey, DirectivitySpectrum>,
}

impl DirectivityService {
    pub fn new(params: GlobalParameters) -> Self {
        DirectivityService {
            state: ServiceState::Empty,
            block_size: params.block_size(),
            grid_step_deg: DEFAULT_GRID_STEP_DEG,
            raw: HashMap::new(),
            grid: None,
            resampled: HashMap::new(),
        }
    }

    pub fn begin_setup(&mut self) {
        self.raw.clear();
        self.resampled.clear();
        self.grid = None;
        self.state = ServiceState::SetupInProgress;
    }

    /// `real`/`imag` are the half-spectrum (length `block_size + 1`) of the measured
    /// directivity filter for this direction.
    pub fn add_directivity_tf(&mut self, azimuth: f32, elevation: f32, real: Vec<f32>, imag: Vec<f32>) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("add_directivity_tf outside setup".to_string()));
        }
        let key = OrientationKey::new(azimuth, elevation);
        if self.raw.contains_key(&key) {
            log::warn!("duplicate directivity entry at ({}, {}) ignored", key.azimuth, key.elevation);
            return Ok(());
        }
        self.raw.insert(key, (real, imag));
        Ok(())
    }

    pub fn end_setup(&mut self) -> BrtResult<()> {
        if self.state != ServiceState::SetupInProgress {
            return Err(BrtError::NotAllowed("end_setup outside setup".to_string()));
        }
        if self.raw.is_empty() {
            self.state = ServiceState::Loaded;
            return Ok(());
        }

        let grid = Grid::build(self.grid_step_deg);
        let mut resampled = HashMap::with_capacity(grid.nodes().len());
        for key in grid.nodes() {
            let (real, imag) = match self.raw.get(&key) {
                Some(rv) => rv.clone(),
                None => self.nearest_raw(key).unwrap_or_else(|| (vec![1.0; self.block_size + 1], vec![0.0; self.block_size + 1])),
            };
            resampled.insert(key, Self::mirror_to_full_spectrum(&real, &imag, self.block_size));
        }

        self.grid = Some(grid);
        self.resampled = resampled;
        self.state = ServiceState::Loaded;
        Ok(())
    }

    fn nearest_raw(&self, key: OrientationKey) -> Option<(Vec<f32>, Vec<f32>)> {
        let target = Orientation::new(key.azimuth, key.elevation, 1.0).direction();
        self.raw
            .iter()
            .map(|(k, v)| {
                let dir = Orientation::new(k.azimuth, k.elevation, 1.0).direction();
                (v, target.dot(&dir).clamp(-1.0, 1.0).acos())
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(v, _)| v.clone())
    }

    /// Extends a half-spectrum into the full `2*block_size`-length interlaced spectrum:
    /// mirrors the real part, negates the imaginary part to match the FFT library's
    /// complex-multiplication convention, then fills the conjugate-symmetric upper half.
    fn mirror_to_full_spectrum(real: &[f32], imag: &[f32], block_size: usize) -> DirectivitySpectrum {
        let n = block_size * 2;
        let mut full = vec![Complex::new(0.0, 0.0); n];
        let half_len = block_size + 1;
        for i in 0..half_len.min(real.len()).min(imag.len()) {
            full[i] = Complex::new(real[i], -imag[i]);
        }
        for i in 1..block_size {
            full[n - i] = full[i].conj();
        }
        full
    }

    /// Interlaced spectrum for the listener-relative direction; blends 3 grid nodes when
    /// `run_time_interpolation` is set, bypassing interpolation at the pole singularity.
    pub fn get_directivity_tf(&self, azimuth: f32, elevation: f32, run_time_interpolation: bool) -> Option<DirectivitySpectrum> {
        if self.state != ServiceState::Loaded {
            return None;
        }
        let grid = self.grid.as_ref()?;
        let orientation = Orientation::new(azimuth, elevation, 1.0);
        let nodes: Vec<(OrientationKey, f32)> = if orientation.is_pole() {
            vec![(OrientationKey::new(0.0, elevation), 1.0)]
        } else if !run_time_interpolation {
            vec![(grid.nearest_node(azimuth, elevation), 1.0)]
        } else {
            grid.interpolation_nodes(azimuth, elevation).to_vec()
        };

        let mut acc: Option<DirectivitySpectrum> = None;
        for (key, weight) in nodes {
            if weight.abs() < 1e-6 {
                continue;
            }
            let spectrum = self.resampled.get(&key)?;
            acc = Some(match acc {
                None => spectrum.iter().map(|c| c * weight).collect(),
                Some(mut existing) => {
                    for (d, s) in existing.iter_mut().zip(spectrum.iter()) {
                        *d += s * weight;
                    }
                    existing
                }
            });
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_spectrum_has_conjugate_symmetry() {
        let mut service = DirectivityService::new(GlobalParameters::new(8, 48_000));
        service.begin_setup();
        let half = 9;
        service.add_directivity_tf(0.0, 0.0, vec![1.0; half], vec![0.5; half]).unwrap();
        service.end_setup().unwrap();

        let spectrum = service.get_directivity_tf(0.0, 0.0, false).unwrap();
        assert_eq!(spectrum.len(), 16);
        for i in 1..8 {
            let lower = spectrum[i];
            let upper = spectrum[16 - i];
            assert!((lower.re - upper.re).abs() < 1e-5);
            assert!((lower.im + upper.im).abs() < 1e-5);
        }
    }

    #[test]
    fn pole_query_ignores_azimuth() {
        let mut service = DirectivityService::new(GlobalParameters::new(8, 48_000));
        service.begin_setup();
        service.add_directivity_tf(0.0, 90.0, vec![1.0; 9], vec![0.0; 9]).unwrap();
        service.end_setup().unwrap();

        let a = service.get_directivity_tf(12.0, 90.0, true).unwrap();
        let b = service.get_directivity_tf(250.0, 90.0, true).unwrap();
        assert_eq!(a, b);
    }
}
