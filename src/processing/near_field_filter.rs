use std::sync::{Mutex, Weak};

use crate::dsp::biquad::SosCascade;
use crate::dsp::buffer::silence;
use crate::error::WarnOnceSite;
use crate::graph::entry_point::EntryPoint;
use crate::graph::exit_point::ExitPoint;
use crate::graph::gate::FiringGate;
use crate::math::Transform;
use crate::services::sos::SosFilterService;
use crate::services::Ear;

/// Near-field binaural correction stage (§4.3, §4.9 listener near-field toggle): runs
/// after the HRTF convolver, filtering its already-spatialised `left_ear`/`right_ear`
/// output through an SOS cascade keyed on source-listener distance and interaural
/// azimuth, rather than filtering the dry source signal.
pub struct NearFieldFilterProcessor {
    pub left_input: EntryPoint<Vec<f32>>,
    pub right_input: EntryPoint<Vec<f32>>,
    pub source_position: EntryPoint<Transform>,
    pub listener_position: EntryPoint<Transform>,
    pub sos_tf: EntryPoint<Weak<Mutex<SosFilterService>>>,
    pub left_output: ExitPoint<Vec<f32>>,
    pub right_output: ExitPoint<Vec<f32>>,

    gate: FiringGate,
    block_size: usize,
    pub enabled: bool,
    left_cascade: Option<SosCascade>,
    right_cascade: Option<SosCascade>,
    last_key: Option<(i32, i32)>,
    no_service_warned: WarnOnceSite,
}

impl NearFieldFilterProcessor {
    pub fn new(block_size: usize) -> Self {
        NearFieldFilterProcessor {
            left_input: EntryPoint::notifying("left_input"),
            right_input: EntryPoint::notifying("right_input"),
            source_position: EntryPoint::notifying("source_position"),
            listener_position: EntryPoint::notifying("listener_position"),
            sos_tf: EntryPoint::latched("sos_tf"),
            left_output: ExitPoint::new("left_output"),
            right_output: ExitPoint::new("right_output"),
            gate: FiringGate::new(&["left_input", "right_input", "source_position", "listener_position"]),
            block_size,
            enabled: true,
            left_cascade: None,
            right_cascade: None,
            last_key: None,
            no_service_warned: WarnOnceSite::new(),
        }
    }

    pub fn notify_left_input(&mut self, value: Vec<f32>) {
        self.left_input.set(value);
        if self.gate.arrive("left_input") {
            self.update();
        }
    }

    pub fn notify_right_input(&mut self, value: Vec<f32>) {
        self.right_input.set(value);
        if self.gate.arrive("right_input") {
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

    fn update(&mut self) {
        let mut left = self.left_input.take().unwrap_or_else(|| silence(self.block_size));
        let mut right = self.right_input.take().unwrap_or_else(|| silence(self.block_size));

        if !self.enabled {
            self.left_output.send(left);
            self.right_output.send(right);
            return;
        }

        let service = self.sos_tf.get().and_then(|w| w.upgrade());
        let service = match service {
            Some(s) => s,
            None => {
                self.no_service_warned.fire("near-field filter has no bound sos service");
                self.left_output.send(left);
                self.right_output.send(right);
                return;
            }
        };

        let source_pos = self.source_position.get().copied().unwrap_or_default();
        let listener_pos = self.listener_position.get().copied().unwrap_or_default();
        let orientation = Transform::relative_orientation(&listener_pos, source_pos.position);

        let key = ((orientation.distance * 1000.0).round() as i32, orientation.azimuth.round() as i32);
        if self.last_key != Some(key) {
            let svc = service.lock().unwrap();
            self.left_cascade = svc
                .get_sos_filter_coefficients(Ear::Left, orientation.distance, orientation.azimuth)
                .map(|c| SosCascade::from_flat_coefficients(&c));
            self.right_cascade = svc
                .get_sos_filter_coefficients(Ear::Right, orientation.distance, orientation.azimuth)
                .map(|c| SosCascade::from_flat_coefficients(&c));
            self.last_key = Some(key);
        }

        if let Some(cascade) = self.left_cascade.as_mut() {
            cascade.process_block(&mut left);
        }
        if let Some(cascade) = self.right_cascade.as_mut() {
            cascade.process_block(&mut right);
        }

        self.left_output.send(left);
        self.right_output.send(right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use std::sync::Arc;

    fn identity_sos_service() -> Arc<Mutex<SosFilterService>> {
        let mut svc = SosFilterService::new();
        svc.begin_setup();
        let identity = vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        svc.add_coefficients(0.0, 0.0, Some(identity.clone()), Some(identity)).unwrap();
        svc.end_setup().unwrap();
        Arc::new(Mutex::new(svc))
    }

    #[test]
    fn identity_cascade_is_passthrough() {
        let service = identity_sos_service();
        let mut proc = NearFieldFilterProcessor::new(4);
        proc.sos_tf.set(Arc::downgrade(&service));

        proc.notify_source_position(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_left_input(vec![1.0, 2.0, 3.0, 4.0]);
        proc.notify_right_input(vec![4.0, 3.0, 2.0, 1.0]);

        assert_eq!(proc.left_output.last(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(proc.right_output.last(), Some(vec![4.0, 3.0, 2.0, 1.0]));
    }

    #[test]
    fn disabled_is_passthrough_without_service() {
        let mut proc = NearFieldFilterProcessor::new(4);
        proc.enabled = false;
        proc.notify_source_position(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
        proc.notify_left_input(vec![9.0, 8.0, 7.0, 6.0]);
        proc.notify_right_input(vec![6.0, 7.0, 8.0, 9.0]);

        assert_eq!(proc.left_output.last(), Some(vec![9.0, 8.0, 7.0, 6.0]));
        assert_eq!(proc.right_output.last(), Some(vec![6.0, 7.0, 8.0, 9.0]));
    }
}
