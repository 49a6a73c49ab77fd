use crate::dsp::buffer::silence;
use crate::graph::entry_point::EntryPoint;
use crate::graph::exit_point::ExitPoint;
use crate::graph::gate::FiringGate;
use crate::math::Transform;

/// Applies per-source gain as a function of source-listener distance, smoothed with a
/// one-pole exponential attack to avoid clicks when distance changes abruptly (§4.8).
///
/// Gain in dB is `attenuation_db_per_doubling * log2(distance / reference_distance)`,
/// clamped to 0 dB at or inside the reference distance — the "-6.02 dB per doubling"
/// wording in the worked scenario only comes out of a log-base-2 ratio, not the
/// log10 the component description names; the worked numbers are authoritative here
/// (see DESIGN.md).
pub struct DistanceAttenuationProcessor {
    pub input_samples: EntryPoint<Vec<f32>>,
    pub source_position: EntryPoint<Transform>,
    pub listener_position: EntryPoint<Transform>,
    pub output_samples: ExitPoint<Vec<f32>>,

    gate: FiringGate,
    block_size: usize,
    pub enabled: bool,
    pub reference_distance_m: f32,
    pub attenuation_db_per_doubling: f32,
    smoothing_coeff: f32,
    current_gain: Option<f32>,
}

impl DistanceAttenuationProcessor {
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        let attack_ms = 5.0f32;
        let attack_samples = (attack_ms / 1000.0) * sample_rate as f32;
        let smoothing_coeff = (-1.0f32 / attack_samples.max(1.0)).exp();
        DistanceAttenuationProcessor {
            input_samples: EntryPoint::notifying("input_samples"),
            source_position: EntryPoint::notifying("source_position"),
            listener_position: EntryPoint::notifying("listener_position"),
            output_samples: ExitPoint::new("output_samples"),
            gate: FiringGate::new(&["input_samples", "source_position", "listener_position"]),
            block_size,
            enabled: true,
            reference_distance_m: 1.0,
            attenuation_db_per_doubling: -6.02,
            smoothing_coeff,
            current_gain: None,
        }
    }

    pub fn notify_input_samples(&mut self, value: Vec<f32>) {
        self.input_samples.set(value);
        if self.gate.arrive("input_samples") {
            self.update();
        }
    }

    pub fn notify_source_position(&mut self, value: Transform) {
        self.source_position.set(value);
        if self.gate.arrive("source_position") {
            self.update();
        }
    }

    pub fn notify_listener_position(&mut self, value: Transform) {
        self.listener_position.set(value);
        if self.gate.arrive("listener_position") {
            self.update();
        }
    }

    fn target_gain_linear(&self, distance: f32) -> f32 {
        if distance <= self.reference_distance_m {
            return 1.0;
        }
        let gain_db = self.attenuation_db_per_doubling * (distance / self.reference_distance_m).log2();
        10f32.powf(gain_db / 20.0)
    }

    fn update(&mut self) {
        let mut samples = self.input_samples.take().unwrap_or_else(|| silence(self.block_size));

        if !self.enabled {
            self.output_samples.send(samples);
            return;
        }

        let source_pos = self.source_position.get().copied().unwrap_or_default();
        let listener_pos = self.listener_position.get().copied().unwrap_or_default();
        let distance = (source_pos.position - listener_pos.position).len();
        let target = self.target_gain_linear(distance);

        let mut gain = self.current_gain.unwrap_or(target);
        for sample in samples.iter_mut() {
            gain = self.smoothing_coeff * gain + (1.0 - self.smoothing_coeff) * target;
            *sample *= gain;
        }
        self.current_gain = Some(gain);

        self.output_samples.send(samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn doubling_distance_halves_gain_once_converged() {
        let mut proc = DistanceAttenuationProcessor::new(512, 48_000);
        proc.notify_source_position(Transform::from_position(Vec3::new(2.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![1.0; 512]);

        let out = proc.output_samples.last().unwrap();
        assert!((out[511] - 0.5).abs() < 1e-2);
    }

    #[test]
    fn within_reference_distance_is_unattenuated() {
        let mut proc = DistanceAttenuationProcessor::new(8, 48_000);
        proc.notify_source_position(Transform::from_position(Vec3::new(0.5, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![1.0; 8]);

        let out = proc.output_samples.last().unwrap();
        assert!((out[7] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn disabled_is_passthrough() {
        let mut proc = DistanceAttenuationProcessor::new(4, 48_000);
        proc.enabled = false;
        proc.notify_source_position(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(proc.output_samples.last(), Some(vec![1.0, 1.0, 1.0, 1.0]));
    }
}
