use super::orientation::Orientation;
use super::quat::Quat;
use super::vector::Vec3;

/// Position + orientation of a source or listener, sent over the `transform` exit point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Transform {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Transform { position, orientation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Transform { position, orientation: Quat::IDENTITY }
    }

    /// Transforms a point given in this transform's local frame into world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation.rotate(local)
    }

    /// Orientation (azimuth, elevation) of `world_point` as seen from `origin`, expressed
    /// in `origin`'s local frame (i.e. rotated by the inverse of `origin`'s orientation).
    pub fn relative_orientation(origin: &Transform, world_point: Vec3) -> Orientation {
        let world_dir = world_point - origin.position;
        let distance = world_dir.len();
        let local_dir = origin.orientation.conjugate().rotate(world_dir);
        Orientation::from_direction(local_dir, distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_orientation_of_coincident_points_is_front() {
        let listener = Transform::from_position(Vec3::new(0.0, 0.0, 0.0));
        let o = Transform::relative_orientation(&listener, Vec3::new(1.0, 0.0, 0.0));
        assert!((o.azimuth).abs() < 1e-3);
        assert!((o.elevation).abs() < 1e-3);
        assert!((o.distance - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ear_world_position_uses_listener_orientation() {
        let listener = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_yaw_pitch_roll(90.0, 0.0, 0.0));
        let right_ear_local = Vec3::new(0.0, 0.0, 0.05);
        let world = listener.transform_point(right_ear_local);
        assert!((world.x - 1.0).abs() < 1e-4);
    }
}
