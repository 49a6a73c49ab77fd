use crate::dsp::buffer::silence;
use crate::graph::command::Command;
use crate::graph::exit_point::ExitPoint;
use crate::math::{Quat, Transform};

/// Application-facing mono sound emitter (§4.9). Wraps a transform and a one-tick input
/// buffer, and exposes them as the `samples` / `transform` / `id` exit points every
/// downstream processor subscribes to.
pub struct Source {
    id: String,
    transform: Transform,
    block_size: usize,
    pending_buffer: Option<Vec<f32>>,

    pub samples: ExitPoint<Vec<f32>>,
    pub transform_exit: ExitPoint<Transform>,
    pub id_exit: ExitPoint<String>,
}

impl Source {
    pub fn new(id: impl Into<String>, block_size: usize) -> Self {
        Source {
            id: id.into(),
            transform: Transform::default(),
            block_size,
            pending_buffer: None,
            samples: ExitPoint::new("samples"),
            transform_exit: ExitPoint::new("transform"),
            id_exit: ExitPoint::new("id"),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Loads this tick's mono input; the next `process()` call consumes it.
    pub fn set_buffer(&mut self, mono: Vec<f32>) {
        self.pending_buffer = Some(mono);
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Marks this tick's exit points ready: downstream notifying entries fire from this.
    pub fn process(&mut self) {
        self.transform_exit.send(self.transform);
        self.id_exit.send(self.id.clone());
        let buffer = self.pending_buffer.take().unwrap_or_else(|| silence(self.block_size));
        self.samples.send(buffer);
    }

    pub fn execute_command(&mut self, cmd: &Command) {
        if !cmd.targets("sourceID", &self.id) {
            return;
        }
        match cmd.address() {
            "/source/location" => {
                if let Some(location) = cmd.vector3_param("location") {
                    self.transform.position = location;
                }
            }
            "/source/orientation" => {
                let yaw = cmd.float_param("yaw").unwrap_or(0.0);
                let pitch = cmd.float_param("pitch").unwrap_or(0.0);
                let roll = cmd.float_param("roll").unwrap_or(0.0);
                self.transform.orientation = Quat::from_yaw_pitch_roll(yaw, pitch, roll);
            }
            "/source/orientationQuaternion" => {
                if let Some(q) = cmd.quaternion_param("orientation") {
                    self.transform.orientation = q;
                }
            }
            "/source/resetBuffers" => {
                self.pending_buffer = None;
            }
            _ => {}
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::new("", 0)
    }
}
