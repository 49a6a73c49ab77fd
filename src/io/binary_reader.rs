use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{BrtError, BrtResult};
use crate::math::{Orientation, Vec3};
use crate::services::hrtf::{ExtrapolationMethod, HrtfService};

const MAGIC: [u8; 4] = *b"HRIR";

/// Loads a little-endian binary HRIR-sphere table into an `HrtfService` being set up
/// (§4.10), grounded directly on the teacher's `HrtfSphere::new` loader.
///
/// Layout: 4-byte magic `HRIR`, `u32` sample rate, `u32` tap count, `u32` vertex count,
/// `u32` index count, that many `u32` triangle-face indices (unused here — the service
/// re-triangulates its own grid rather than reusing the measured mesh), then per vertex:
/// (x, y, z) position as `f32`, `tap count` left HRIR samples, `tap count` right HRIR
/// samples. Cartesian vertex positions are converted to (azimuth, elevation) before
/// `add_hrir` is called, matching the "converts to canonical spherical form" reader
/// contract.
pub fn load_hrir_sphere(
    reader: &mut dyn Read,
    service: &mut HrtfService,
    extrapolation: ExtrapolationMethod,
) -> BrtResult<()> {
    let mut magic = [0u8; 4];
    read_exact(reader, &mut magic)?;
    if magic != MAGIC {
        return Err(BrtError::InvalidParam("not a HRIR sphere file (bad magic)".to_string()));
    }

    let sample_rate = read_u32(reader)?;
    let tap_count = read_u32(reader)? as usize;
    if tap_count == 0 {
        return Err(BrtError::BadSize("hrir sphere has zero-length taps".to_string()));
    }
    let vertex_count = read_u32(reader)? as usize;
    let index_count = read_u32(reader)? as usize;

    for _ in 0..index_count {
        read_u32(reader)?;
    }

    service.begin_setup(tap_count, extrapolation);

    for _ in 0..vertex_count {
        let x = read_f32(reader)?;
        let y = read_f32(reader)?;
        let z = read_f32(reader)?;
        let left = read_samples(reader, tap_count)?;
        let right = read_samples(reader, tap_count)?;

        let orientation = Orientation::from_direction(Vec3::new(x, y, z), Vec3::new(x, y, z).len());
        service.add_hrir(orientation.azimuth, orientation.elevation, sample_rate, left, right, 0, 0)?;
    }

    service.end_setup()
}

fn read_samples(reader: &mut dyn Read, count: usize) -> BrtResult<Vec<f32>> {
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        samples.push(read_f32(reader)?);
    }
    Ok(samples)
}

fn read_exact(reader: &mut dyn Read, buf: &mut [u8]) -> BrtResult<()> {
    reader.read_exact(buf).map_err(io_err)
}

fn read_u32(reader: &mut dyn Read) -> BrtResult<u32> {
    reader.read_u32::<LittleEndian>().map_err(io_err)
}

fn read_f32(reader: &mut dyn Read) -> BrtResult<f32> {
    reader.read_f32::<LittleEndian>().map_err(io_err)
}

fn io_err(e: io::Error) -> BrtError {
    BrtError::BadSize(format!("hrir sphere io error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalParameters;
    use crate::services::Ear;
    use std::io::Cursor;

    fn write_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn single_vertex_sphere() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        write_u32(&mut buf, 48_000);
        write_u32(&mut buf, 2);
        write_u32(&mut buf, 1);
        write_u32(&mut buf, 0);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.0);
        write_f32(&mut buf, 0.0);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.5);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.5);
        buf
    }

    #[test]
    fn loads_single_vertex_sphere() {
        let bytes = single_vertex_sphere();
        let mut cursor = Cursor::new(bytes);
        let mut service = HrtfService::new(GlobalParameters::new(4, 48_000));
        load_hrir_sphere(&mut cursor, &mut service, ExtrapolationMethod::NearestPoint).unwrap();

        let subs = service.get_hrir_partitioned(Ear::Left, 0.0, 0.0, false);
        assert!(subs.is_some());
    }

    #[test]
    fn rejects_sample_rate_mismatch() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        write_u32(&mut buf, 44_100);
        write_u32(&mut buf, 2);
        write_u32(&mut buf, 1);
        write_u32(&mut buf, 0);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.0);
        write_f32(&mut buf, 0.0);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.5);
        write_f32(&mut buf, 1.0);
        write_f32(&mut buf, 0.5);

        let mut cursor = Cursor::new(buf);
        let mut service = HrtfService::new(GlobalParameters::new(4, 48_000));
        let err = load_hrir_sphere(&mut cursor, &mut service, ExtrapolationMethod::NearestPoint).unwrap_err();
        assert_eq!(err, BrtError::BadSize(
            "hrir sample rate 44100 does not match configured rate 48000".to_string(),
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![b'X', b'X', b'X', b'X'];
        write_u32(&mut buf, 48_000);
        let mut cursor = Cursor::new(buf);
        let mut service = HrtfService::new(GlobalParameters::new(4, 48_000));
        assert!(load_hrir_sphere(&mut cursor, &mut service, ExtrapolationMethod::NearestPoint).is_err());
    }
}
