use super::vector::Vec3;
use std::hash::{Hash, Hasher};

const EQUALITY_RESOLUTION_DEG: f32 = 0.01;

/// A direction plus distance, with the toolkit's normalised azimuth/elevation convention:
/// azimuth in `[0, 360)`, elevation in `[0, 360)` with the north pole at 90 and the south
/// pole at 270 (i.e. canonical elevations `[-90, 90]` folded the same way the original
/// source keeps them, so `-10` and `350` both normalise to the same key).
#[derive(Copy, Clone, Debug)]
pub struct Orientation {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
}

pub fn normalize_azimuth(azimuth: f32) -> f32 {
    let wrapped = azimuth % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

pub fn normalize_elevation(elevation: f32) -> f32 {
    let wrapped = elevation % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Canonical elevation in `[-90, 90]` from the normalised `[0, 360)` storage convention.
pub fn canonical_elevation(normalized_elevation: f32) -> f32 {
    if normalized_elevation <= 90.0 {
        normalized_elevation
    } else {
        normalized_elevation - 360.0
    }
}

impl Orientation {
    pub fn new(azimuth: f32, elevation: f32, distance: f32) -> Self {
        Orientation {
            azimuth: normalize_azimuth(azimuth),
            elevation: normalize_elevation(elevation),
            distance,
        }
    }

    pub fn is_north_pole(&self) -> bool {
        (self.elevation - 90.0).abs() < EQUALITY_RESOLUTION_DEG
    }

    pub fn is_south_pole(&self) -> bool {
        (self.elevation - 270.0).abs() < EQUALITY_RESOLUTION_DEG
    }

    pub fn is_pole(&self) -> bool {
        self.is_north_pole() || self.is_south_pole()
    }

    /// Unit direction for (azimuth, elevation): front (az=0, el=0) is +x, the interaural
    /// axis (az=90) is +z, up (el=90) is +y.
    pub fn direction(&self) -> Vec3 {
        let az_rad = self.azimuth.to_radians();
        let el_rad = canonical_elevation(self.elevation).to_radians();
        Vec3::new(
            el_rad.cos() * az_rad.cos(),
            el_rad.sin(),
            el_rad.cos() * az_rad.sin(),
        )
    }

    pub fn from_direction(dir: Vec3, distance: f32) -> Self {
        let len = dir.len();
        if len < 1e-9 {
            return Orientation::new(0.0, 0.0, distance);
        }
        let n = dir.scale(1.0 / len);
        let elevation_canonical = n.y.clamp(-1.0, 1.0).asin().to_degrees();
        let azimuth = n.z.atan2(n.x).to_degrees();
        Orientation::new(azimuth, elevation_canonical, distance)
    }
}

impl PartialEq for Orientation {
    fn eq(&self, other: &Self) -> bool {
        (self.azimuth - other.azimuth).abs() < EQUALITY_RESOLUTION_DEG
            && (self.elevation - other.elevation).abs() < EQUALITY_RESOLUTION_DEG
    }
}
impl Eq for Orientation {}

impl Hash for Orientation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let az_hundredths = (self.azimuth * 100.0).round() as i32;
        let el_hundredths = (self.elevation * 100.0).round() as i32;
        az_hundredths.hash(state);
        el_hundredths.hash(state);
    }
}

/// Key type for orientation tables: azimuth/elevation only, hashed/compared at 0.01° as
/// above but usable directly as a `HashMap` key (distance is carried separately where it
/// matters, e.g. the SOS filter table).
#[derive(Copy, Clone, Debug)]
pub struct OrientationKey {
    pub azimuth: f32,
    pub elevation: f32,
}

impl OrientationKey {
    pub fn new(azimuth: f32, elevation: f32) -> Self {
        OrientationKey { azimuth: normalize_azimuth(azimuth), elevation: normalize_elevation(elevation) }
    }

    pub fn from_orientation(o: &Orientation) -> Self {
        OrientationKey { azimuth: o.azimuth, elevation: o.elevation }
    }
}

impl PartialEq for OrientationKey {
    fn eq(&self, other: &Self) -> bool {
        (self.azimuth - other.azimuth).abs() < EQUALITY_RESOLUTION_DEG
            && (self.elevation - other.elevation).abs() < EQUALITY_RESOLUTION_DEG
    }
}
impl Eq for OrientationKey {}

impl Hash for OrientationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let az_hundredths = (self.azimuth * 100.0).round() as i32;
        let el_hundredths = (self.elevation * 100.0).round() as i32;
        az_hundredths.hash(state);
        el_hundredths.hash(state);
    }
}
