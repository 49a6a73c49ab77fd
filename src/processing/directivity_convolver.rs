use std::sync::{Mutex, Weak};

use rustfft::num_complex::Complex;
use rustfft::FFTplanner;

use crate::dsp::buffer::silence;
use crate::error::WarnOnceSite;
use crate::graph::command::Command;
use crate::graph::entry_point::EntryPoint;
use crate::graph::exit_point::ExitPoint;
use crate::graph::gate::FiringGate;
use crate::math::Transform;
use crate::services::directivity::DirectivityService;

/// Filters a source's signal by its measured directivity pattern for the
/// listener-relative direction in the source's own local frame (§4.7): a single-partition
/// frequency-domain multiply, no ring of past blocks needed since the filter length
/// equals the block size.
pub struct DirectivityConvolverProcessor {
    pub input_samples: EntryPoint<Vec<f32>>,
    pub source_position: EntryPoint<Transform>,
    pub listener_position: EntryPoint<Transform>,
    pub source_id: EntryPoint<String>,
    pub directivity_tf: EntryPoint<Weak<Mutex<DirectivityService>>>,
    pub output_samples: ExitPoint<Vec<f32>>,

    gate: FiringGate,
    block_size: usize,
    pub enabled: bool,
    pub interpolation_enabled: bool,
    no_service_warned: WarnOnceSite,
}

impl DirectivityConvolverProcessor {
    pub fn new(block_size: usize) -> Self {
        DirectivityConvolverProcessor {
            input_samples: EntryPoint::notifying("input_samples"),
            source_position: EntryPoint::notifying("source_position"),
            listener_position: EntryPoint::notifying("listener_position"),
            source_id: EntryPoint::latched("source_id"),
            directivity_tf: EntryPoint::latched("directivity_tf"),
            output_samples: ExitPoint::new("output_samples"),
            gate: FiringGate::new(&["input_samples", "source_position", "listener_position"]),
            block_size,
            enabled: true,
            interpolation_enabled: true,
            no_service_warned: WarnOnceSite::new(),
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

    pub fn execute_command(&mut self, cmd: &Command) {
        if !cmd.targets("sourceID", self.source_id.get().map(|s| s.as_str()).unwrap_or("")) {
            return;
        }
        if cmd.address() == "/source/enableDirectivity" {
            if let Some(v) = cmd.bool_param("enabled") {
                self.enabled = v;
            }
        }
    }

    fn update(&mut self) {
        let input = self.input_samples.take().unwrap_or_else(|| silence(self.block_size));

        if !self.enabled {
            self.output_samples.send(input);
            return;
        }

        let service = self
            .directivity_tf
            .get()
            .and_then(|w| w.upgrade());
        let service = match service {
            Some(s) => s,
            None => {
                self.no_service_warned.fire("directivity convolver has no bound service");
                self.output_samples.send(input);
                return;
            }
        };

        // Direction of the listener as seen from the source's own local frame: the pole
        // singularity (listener directly above/below the source) leaves azimuth
        // arbitrary, which the service's pole handling already accounts for.
        let source_pos = self.source_position.get().copied().unwrap_or_default();
        let listener_pos = self.listener_position.get().copied().unwrap_or_default();
        let orientation = Transform::relative_orientation(&source_pos, listener_pos.position);

        let spectrum = {
            let svc = service.lock().unwrap();
            svc.get_directivity_tf(orientation.azimuth, orientation.elevation, self.interpolation_enabled)
        };

        let output = match spectrum {
            Some(spectrum) => Self::convolve_single_partition(&input, &spectrum, self.block_size),
            None => input,
        };
        self.output_samples.send(output);
    }

    fn convolve_single_partition(input: &[f32], spectrum: &[Complex<f32>], block_size: usize) -> Vec<f32> {
        let n = block_size * 2;
        let mut padded = vec![Complex::new(0.0, 0.0); n];
        for (i, s) in input.iter().enumerate() {
            padded[i] = Complex::new(*s, 0.0);
        }
        let mut fwd_planner = FFTplanner::new(false);
        let fft = fwd_planner.plan_fft(n);
        let mut freq = vec![Complex::new(0.0, 0.0); n];
        fft.process(&mut padded, &mut freq);

        for (f, h) in freq.iter_mut().zip(spectrum.iter()) {
            *f *= h;
        }

        let mut inv_planner = FFTplanner::new(true);
        let ifft = inv_planner.plan_fft(n);
        let mut time = vec![Complex::new(0.0, 0.0); n];
        ifft.process(&mut freq, &mut time);

        let scale = 1.0 / n as f32;
        time.iter().take(block_size).map(|c| c.re * scale).collect()
    }
}
