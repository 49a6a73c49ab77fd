use std::sync::{Arc, Mutex, Weak};

use crate::dsp::buffer::{silence, ExpansionDelayLine};
use crate::dsp::partitioned_convolver::PartitionedConvolver;
use crate::error::WarnOnceSite;
use crate::graph::command::Command;
use crate::graph::entry_point::EntryPoint;
use crate::graph::exit_point::ExitPoint;
use crate::graph::gate::FiringGate;
use crate::math::Transform;
use crate::services::hrtf::HrtfService;
use crate::services::Ear;

/// Which measured table a listener is actively rendering against — collapses the
/// original's virtual-inheritance HRTF/HRBRIR hierarchy into a tagged dispatch, since
/// the set of service kinds is closed (§9 design note).
pub enum ListenerService {
    Hrtf(Weak<Mutex<HrtfService>>),
    Hrbrir(Weak<Mutex<HrtfService>>),
}

impl ListenerService {
    fn service(&self) -> &Weak<Mutex<HrtfService>> {
        match self {
            ListenerService::Hrtf(w) => w,
            ListenerService::Hrbrir(w) => w,
        }
    }
}

/// Per-source binaural convolver (§4.6): partitioned FFT convolution per ear, Woodworth
/// or table-driven ITD via the expansion method, and parallax-corrected ear angles.
pub struct HrtfConvolverProcessor {
    pub input_samples: EntryPoint<Vec<f32>>,
    pub source_position: EntryPoint<Transform>,
    pub listener_position: EntryPoint<Transform>,
    pub source_id: EntryPoint<String>,
    pub listener_id: EntryPoint<String>,
    pub listener_hrtf: EntryPoint<Weak<Mutex<HrtfService>>>,
    pub listener_hrbrir: EntryPoint<Weak<Mutex<HrtfService>>>,
    pub left_ear: ExitPoint<Vec<f32>>,
    pub right_ear: ExitPoint<Vec<f32>>,

    gate: FiringGate,
    block_size: usize,
    left_convolver: Option<PartitionedConvolver>,
    right_convolver: Option<PartitionedConvolver>,
    left_delay_line: ExpansionDelayLine,
    right_delay_line: ExpansionDelayLine,

    pub spatialisation_enabled: bool,
    pub interpolation_enabled: bool,
    pub itd_enabled: bool,
    pub parallax_enabled: bool,
    pub head_radius_m: f32,
    pub left_ear_local: crate::math::Vec3,
    pub right_ear_local: crate::math::Vec3,

    inside_head_warned: WarnOnceSite,
    no_service_warned: WarnOnceSite,
}

impl HrtfConvolverProcessor {
    pub fn new(block_size: usize, max_itd_delay_samples: usize, head_radius_m: f32) -> Self {
        let ear_offset = head_radius_m;
        HrtfConvolverProcessor {
            input_samples: EntryPoint::notifying("input_samples"),
            source_position: EntryPoint::notifying("source_position"),
            listener_position: EntryPoint::notifying("listener_position"),
            source_id: EntryPoint::latched("source_id"),
            listener_id: EntryPoint::latched("listener_id"),
            listener_hrtf: EntryPoint::latched("listener_hrtf"),
            listener_hrbrir: EntryPoint::latched("listener_hrbrir"),
            left_ear: ExitPoint::new("left_ear"),
            right_ear: ExitPoint::new("right_ear"),
            gate: FiringGate::new(&["input_samples", "source_position", "listener_position"]),
            block_size,
            left_convolver: None,
            right_convolver: None,
            left_delay_line: ExpansionDelayLine::new(max_itd_delay_samples),
            right_delay_line: ExpansionDelayLine::new(max_itd_delay_samples),
            spatialisation_enabled: true,
            interpolation_enabled: true,
            itd_enabled: true,
            parallax_enabled: true,
            head_radius_m,
            left_ear_local: crate::math::Vec3::new(0.0, 0.0, -ear_offset),
            right_ear_local: crate::math::Vec3::new(0.0, 0.0, ear_offset),
            inside_head_warned: WarnOnceSite::new(),
            no_service_warned: WarnOnceSite::new(),
        }
    }

    pub fn reset_buffers(&mut self) {
        if let Some(c) = self.left_convolver.as_mut() {
            c.reset();
        }
        if let Some(c) = self.right_convolver.as_mut() {
            c.reset();
        }
        self.left_delay_line.reset();
        self.right_delay_line.reset();
    }

    /// Records the arrival of a notifying input; fires `update` once all three have
    /// arrived this tick (§4.1 firing rule).
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
        match cmd.address() {
            "/source/enableSpatialisation" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.spatialisation_enabled = v;
                }
            }
            "/source/enableInterpolation" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.interpolation_enabled = v;
                }
            }
            "/source/enableITD" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.itd_enabled = v;
                }
            }
            "/source/enableParallax" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.parallax_enabled = v;
                }
            }
            "/source/resetBuffers" => self.reset_buffers(),
            _ => {}
        }
    }

    fn ensure_convolver(slot: &mut Option<PartitionedConvolver>, block_size: usize, num_partitions: usize) -> &mut PartitionedConvolver {
        let needs_rebuild = match slot {
            Some(c) => c.num_partitions() != num_partitions,
            None => true,
        };
        if needs_rebuild {
            *slot = Some(PartitionedConvolver::new(block_size, num_partitions));
        }
        slot.as_mut().unwrap()
    }

    fn update(&mut self) {
        let input = self.input_samples.take().unwrap_or_else(|| silence(self.block_size));

        if !self.spatialisation_enabled {
            self.left_ear.send(input.clone());
            self.right_ear.send(input);
            return;
        }

        let resolved = self
            .listener_hrtf
            .get()
            .map(|w| ListenerService::Hrtf(w.clone()))
            .or_else(|| self.listener_hrbrir.get().map(|w| ListenerService::Hrbrir(w.clone())));
        let service_weak = match resolved {
            Some(r) => r.service().clone(),
            None => {
                self.no_service_warned.fire("hrtf convolver has no bound listener service");
                self.left_ear.send(silence(self.block_size));
                self.right_ear.send(silence(self.block_size));
                return;
            }
        };
        let service = match service_weak.upgrade() {
            Some(s) => s,
            None => {
                self.no_service_warned.fire("hrtf convolver's listener service expired");
                self.left_ear.send(silence(self.block_size));
                self.right_ear.send(silence(self.block_size));
                return;
            }
        };

        let source_pos = self.source_position.get().copied().unwrap_or_default();
        let listener_pos = self.listener_position.get().copied().unwrap_or_default();
        let distance = (source_pos.position - listener_pos.position).len();

        if distance <= self.head_radius_m {
            self.inside_head_warned.fire("source is inside the listener's head; passing through unspatialised");
            self.left_ear.send(input.clone());
            self.right_ear.send(input);
            return;
        }

        let center = Transform::relative_orientation(&listener_pos, source_pos.position);

        let (left_orientation, right_orientation) = if self.parallax_enabled {
            let left_origin = Transform::new(listener_pos.transform_point(self.left_ear_local), listener_pos.orientation);
            let right_origin = Transform::new(listener_pos.transform_point(self.right_ear_local), listener_pos.orientation);
            (
                Transform::relative_orientation(&left_origin, source_pos.position),
                Transform::relative_orientation(&right_origin, source_pos.position),
            )
        } else {
            (center, center)
        };

        let (left_out, right_out, left_delay, right_delay) = {
            let svc = service.lock().unwrap();
            let left_subs = svc.get_hrir_partitioned(Ear::Left, left_orientation.azimuth, left_orientation.elevation, self.interpolation_enabled);
            let right_subs = svc.get_hrir_partitioned(Ear::Right, right_orientation.azimuth, right_orientation.elevation, self.interpolation_enabled);
            let (left_delay, right_delay) = if self.itd_enabled {
                (
                    svc.get_hrir_delay(Ear::Left, center.azimuth, center.elevation, self.interpolation_enabled).unwrap_or(0),
                    svc.get_hrir_delay(Ear::Right, center.azimuth, center.elevation, self.interpolation_enabled).unwrap_or(0),
                )
            } else {
                (0, 0)
            };

            let left_out = match left_subs {
                Some(subs) => Self::ensure_convolver(&mut self.left_convolver, self.block_size, subs.len().max(1)).process(&input, &subs),
                None => input.clone(),
            };
            let right_out = match right_subs {
                Some(subs) => Self::ensure_convolver(&mut self.right_convolver, self.block_size, subs.len().max(1)).process(&input, &subs),
                None => input.clone(),
            };
            (left_out, right_out, left_delay, right_delay)
        };

        let mut left_out = left_out;
        let mut right_out = right_out;
        self.left_delay_line.process(&mut left_out, left_delay as usize);
        self.right_delay_line.process(&mut right_out, right_delay as usize);

        self.left_ear.send(left_out);
        self.right_ear.send(right_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalParameters;
    use crate::math::Vec3;
    use crate::services::hrtf::ExtrapolationMethod;

    fn identity_service() -> Arc<Mutex<HrtfService>> {
        let mut svc = HrtfService::new(GlobalParameters::new(4, 48_000));
        svc.begin_setup(1, ExtrapolationMethod::NearestPoint);
        svc.add_hrir(0.0, 0.0, 48_000, vec![1.0], vec![1.0], 0, 0).unwrap();
        svc.end_setup().unwrap();
        Arc::new(Mutex::new(svc))
    }

    #[test]
    fn frontal_identity_hrtf_is_passthrough() {
        let service = identity_service();
        let mut proc = HrtfConvolverProcessor::new(4, 16, 0.0);
        proc.listener_hrtf.set(Arc::downgrade(&service));
        proc.itd_enabled = false;
        proc.parallax_enabled = false;

        proc.notify_source_position(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![1.0, 1.0, 1.0, 1.0]);

        assert_eq!(proc.left_ear.last(), Some(vec![1.0, 1.0, 1.0, 1.0]));
        assert_eq!(proc.right_ear.last(), Some(vec![1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn source_inside_head_passes_through() {
        let service = identity_service();
        let mut proc = HrtfConvolverProcessor::new(4, 16, 0.0875);
        proc.listener_hrtf.set(Arc::downgrade(&service));

        proc.notify_source_position(Transform::from_position(Vec3::new(0.05, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![2.0, 2.0, 2.0, 2.0]);

        assert_eq!(proc.left_ear.last(), Some(vec![2.0, 2.0, 2.0, 2.0]));
        assert_eq!(proc.right_ear.last(), Some(vec![2.0, 2.0, 2.0, 2.0]));
    }

    #[test]
    fn disabled_spatialisation_is_passthrough() {
        let service = identity_service();
        let mut proc = HrtfConvolverProcessor::new(4, 16, 0.0);
        proc.listener_hrtf.set(Arc::downgrade(&service));
        proc.spatialisation_enabled = false;

        proc.notify_source_position(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_input_samples(vec![5.0, 5.0, 5.0, 5.0]);

        assert_eq!(proc.left_ear.last(), Some(vec![5.0, 5.0, 5.0, 5.0]));
    }
}
