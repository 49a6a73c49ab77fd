use super::vector::Vec3;

/// Unit quaternion, (x, y, z, w). Used for listener/source orientation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let half = angle_rad * 0.5;
        let s = half.sin();
        let axis = axis.normalized();
        Quat { x: axis.x * s, y: axis.y * s, z: axis.z * s, w: half.cos() }
    }

    /// Matches `Common::CQuaternion::FromYawPitchRoll` in the original source: yaw around
    /// y (up), pitch around x, roll around z, applied yaw * pitch * roll.
    pub fn from_yaw_pitch_roll(yaw_deg: f32, pitch_deg: f32, roll_deg: f32) -> Self {
        let yaw = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw_deg.to_radians());
        let pitch = Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), pitch_deg.to_radians());
        let roll = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), roll_deg.to_radians());
        yaw.mul(&pitch).mul(&roll)
    }

    pub fn mul(&self, rhs: &Quat) -> Quat {
        Quat {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    pub fn conjugate(&self) -> Quat {
        Quat { x: -self.x, y: -self.y, z: -self.z, w: self.w }
    }

    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let uv = qv.cross(&v);
        let uuv = qv.cross(&uv);
        v + (uv.scale(self.w) + uuv).scale(2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_does_not_rotate() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Quat::IDENTITY.rotate(v), v);
    }

    #[test]
    fn yaw_90_maps_front_to_interaural_axis() {
        let q = Quat::from_yaw_pitch_roll(90.0, 0.0, 0.0);
        let front = Vec3::new(1.0, 0.0, 0.0);
        let rotated = q.rotate(front);
        assert!(rotated.x.abs() < 1e-4);
        assert!((rotated.z.abs() - 1.0).abs() < 1e-4);
    }
}
