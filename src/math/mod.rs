//! Vectors, quaternions, transforms and the azimuth/elevation orientation convention
//! shared by every service and processor.

pub mod orientation;
pub mod quat;
pub mod transform;
pub mod vector;

pub use orientation::{normalize_azimuth, normalize_elevation, Orientation, OrientationKey};
pub use quat::Quat;
pub use transform::Transform;
pub use vector::{get_barycentric_coords, Vec3};
