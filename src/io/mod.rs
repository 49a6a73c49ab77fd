//! File-format readers that feed the services' `add_*` setup APIs (§4.10, §6). This
//! crate carries one concrete reader, a compact binary HRIR-sphere format; a
//! SOFA-proper reader is left to a downstream crate.

pub mod binary_reader;

pub use binary_reader::load_hrir_sphere;
