use std::cell::RefCell;
use std::rc::{Rc, Weak as RcWeak};

use crate::dsp::buffer::{add_in_place, mute, silence};
use crate::graph::command::Command;
use crate::graph::exit_point::ExitPoint;
use crate::math::{Transform, Vec3};
use crate::processing::{HrtfConvolverProcessor, NearFieldFilterProcessor};

/// Head geometry a listener carries: radius for the inside-head test and local ear
/// offsets for parallax correction (§3 Listener data model).
#[derive(Copy, Clone, Debug)]
pub struct CranialGeometry {
    pub head_radius_m: f32,
    pub left_ear_local: Vec3,
    pub right_ear_local: Vec3,
}

impl CranialGeometry {
    pub fn new(head_radius_m: f32) -> Self {
        CranialGeometry {
            head_radius_m,
            left_ear_local: Vec3::new(0.0, 0.0, -head_radius_m),
            right_ear_local: Vec3::new(0.0, 0.0, head_radius_m),
        }
    }
}

/// Application-facing stereo receiver (§4.9). Sums every bound `HrtfConvolverProcessor`'s
/// `left_ear` / `right_ear` output into a pair of mix buses for the tick and hands them
/// back (and clears them) via `get_buffers`. Listener-level commands broadcast to every
/// processor currently attached via a weak back-reference, matching the shared-pointer
/// design in §9 (releasing a processor does not keep the listener alive, and vice versa).
pub struct Listener {
    id: String,
    transform: Transform,
    geometry: CranialGeometry,
    mix_left: Vec<f32>,
    mix_right: Vec<f32>,
    block_size: usize,
    processors: Vec<RcWeak<RefCell<HrtfConvolverProcessor>>>,
    near_field_processors: Vec<RcWeak<RefCell<NearFieldFilterProcessor>>>,

    pub transform_exit: ExitPoint<Transform>,
    pub id_exit: ExitPoint<String>,

    pub ambisonics_enabled: bool,
}

impl Listener {
    pub fn new(id: impl Into<String>, block_size: usize, geometry: CranialGeometry) -> Self {
        Listener {
            id: id.into(),
            transform: Transform::default(),
            geometry,
            mix_left: silence(block_size),
            mix_right: silence(block_size),
            block_size,
            processors: Vec::new(),
            near_field_processors: Vec::new(),
            transform_exit: ExitPoint::new("transform"),
            id_exit: ExitPoint::new("id"),
            ambisonics_enabled: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn geometry(&self) -> CranialGeometry {
        self.geometry
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Registers a processor rendering a source for this listener so listener-level
    /// commands (head radius, interpolation/ITD/parallax toggles) reach it.
    pub fn attach_processor(&mut self, processor: RcWeak<RefCell<HrtfConvolverProcessor>>) {
        self.processors.push(processor);
    }

    /// Registers a near-field filter stage rendering a source for this listener so
    /// `/listener/enableNearField` reaches it.
    pub fn attach_near_field_processor(&mut self, processor: RcWeak<RefCell<NearFieldFilterProcessor>>) {
        self.near_field_processors.push(processor);
    }

    pub fn process(&mut self) {
        self.transform_exit.send(self.transform);
        self.id_exit.send(self.id.clone());
    }

    /// Sums one source's contribution into this tick's mix buses.
    pub fn accumulate(&mut self, left: &[f32], right: &[f32]) {
        self.accumulate_left(left);
        self.accumulate_right(right);
    }

    pub fn accumulate_left(&mut self, left: &[f32]) {
        add_in_place(&mut self.mix_left, left);
    }

    pub fn accumulate_right(&mut self, right: &[f32]) {
        add_in_place(&mut self.mix_right, right);
    }

    /// Returns this tick's summed stereo output and clears the mix buses for the next.
    pub fn get_buffers(&mut self) -> (Vec<f32>, Vec<f32>) {
        let left = self.mix_left.clone();
        let right = self.mix_right.clone();
        mute(&mut self.mix_left);
        mute(&mut self.mix_right);
        (left, right)
    }

    fn broadcast(&self, f: impl Fn(&mut HrtfConvolverProcessor)) {
        for weak in &self.processors {
            if let Some(rc) = weak.upgrade() {
                f(&mut rc.borrow_mut());
            }
        }
    }

    fn broadcast_near_field(&self, f: impl Fn(&mut NearFieldFilterProcessor)) {
        for weak in &self.near_field_processors {
            if let Some(rc) = weak.upgrade() {
                f(&mut rc.borrow_mut());
            }
        }
    }

    pub fn execute_command(&mut self, cmd: &Command) {
        if !cmd.targets("listenerID", &self.id) {
            return;
        }
        match cmd.address() {
            "/listener/setHeadRadius" => {
                if let Some(radius) = cmd.float_param("radius") {
                    self.geometry = CranialGeometry::new(radius);
                    self.broadcast(|p| p.head_radius_m = radius);
                }
            }
            "/listener/enableInterpolation" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.broadcast(|p| p.interpolation_enabled = v);
                }
            }
            "/listener/enableITD" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.broadcast(|p| p.itd_enabled = v);
                }
            }
            "/listener/enableParallax" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.broadcast(|p| p.parallax_enabled = v);
                }
            }
            "/listener/enableNearField" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.broadcast_near_field(|p| p.enabled = v);
                }
            }
            "/listener/enableAmbisonics" => {
                if let Some(v) = cmd.bool_param("enabled") {
                    self.ambisonics_enabled = v;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::command::CommandParam;

    #[test]
    fn accumulate_sums_multiple_sources_and_clears_on_read() {
        let mut listener = Listener::new("l-1", 4, CranialGeometry::new(0.0875));
        listener.accumulate(&[1.0, 1.0, 1.0, 1.0], &[0.5, 0.5, 0.5, 0.5]);
        listener.accumulate(&[1.0, 1.0, 1.0, 1.0], &[0.5, 0.5, 0.5, 0.5]);

        let (left, right) = listener.get_buffers();
        assert_eq!(left, vec![2.0, 2.0, 2.0, 2.0]);
        assert_eq!(right, vec![1.0, 1.0, 1.0, 1.0]);

        let (left2, _) = listener.get_buffers();
        assert_eq!(left2, vec![0.0; 4]);
    }

    #[test]
    fn head_radius_command_broadcasts_to_attached_processors() {
        let mut listener = Listener::new("l-1", 4, CranialGeometry::new(0.0875));
        let processor = Rc::new(RefCell::new(HrtfConvolverProcessor::new(4, 16, 0.0875)));
        listener.attach_processor(Rc::downgrade(&processor));

        let cmd = Command::new("/listener/setHeadRadius")
            .with_param("listenerID", CommandParam::Str("l-1".to_string()))
            .with_param("radius", CommandParam::Float(0.1));
        listener.execute_command(&cmd);

        assert!((processor.borrow().head_radius_m - 0.1).abs() < 1e-6);
        assert!((listener.geometry().head_radius_m - 0.1).abs() < 1e-6);
    }

    #[test]
    fn near_field_command_broadcasts_to_attached_processors() {
        let mut listener = Listener::new("l-1", 4, CranialGeometry::new(0.0875));
        let processor = Rc::new(RefCell::new(NearFieldFilterProcessor::new(4)));
        listener.attach_near_field_processor(Rc::downgrade(&processor));
        assert!(processor.borrow().enabled);

        let cmd = Command::new("/listener/enableNearField")
            .with_param("listenerID", CommandParam::Str("l-1".to_string()))
            .with_param("enabled", CommandParam::Bool(false));
        listener.execute_command(&cmd);

        assert!(!processor.borrow().enabled);
    }
}
