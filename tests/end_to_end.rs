//! End-to-end scenarios exercising the services and processors together through their
//! public APIs, one per documented rendering scenario.

use std::sync::{Arc, Mutex};

use brt_sound::config::GlobalParameters;
use brt_sound::math::{Transform, Vec3};
use brt_sound::processing::{DistanceAttenuationProcessor, HrtfConvolverProcessor};
use brt_sound::services::hrtf::{ExtrapolationMethod, HrtfService};
use brt_sound::services::sos::SosFilterService;
use brt_sound::services::Ear;

fn identity_service(block_size: usize, sample_rate: u32) -> Arc<Mutex<HrtfService>> {
    let mut svc = HrtfService::new(GlobalParameters::new(block_size, sample_rate));
    svc.begin_setup(1, ExtrapolationMethod::NearestPoint);
    svc.add_hrir(0.0, 0.0, sample_rate, vec![1.0], vec![1.0], 0, 0).unwrap();
    svc.end_setup().unwrap();
    Arc::new(Mutex::new(svc))
}

#[test]
fn scenario_1_frontal_identity_hrtf_is_exact_passthrough() {
    let block_size = 512;
    let service = identity_service(block_size, 48_000);

    let mut proc = HrtfConvolverProcessor::new(block_size, 64, 0.0);
    proc.listener_hrtf.set(Arc::downgrade(&service));
    proc.itd_enabled = false;
    proc.parallax_enabled = false;

    proc.notify_source_position(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
    proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
    proc.notify_input_samples(vec![1.0; block_size]);

    let left = proc.left_ear.last().unwrap();
    let right = proc.right_ear.last().unwrap();
    for sample in left.iter().chain(right.iter()) {
        assert!((sample - 1.0).abs() < 1e-3);
    }
}

#[test]
fn scenario_2_pure_woodworth_itd_delays_the_contralateral_ear() {
    let block_size = 64;
    let sample_rate = 48_000u32;
    let head_radius = 0.0875f32;
    let sound_speed = 343.0f32;
    let service = identity_service(block_size, sample_rate);
    {
        let mut svc = service.lock().unwrap();
        svc.woodworth_itd_enabled = true;
        svc.head_radius_m = head_radius;
        svc.sound_speed_mps = sound_speed;
    }

    let mut proc = HrtfConvolverProcessor::new(block_size, 64, head_radius);
    proc.listener_hrtf.set(Arc::downgrade(&service));
    proc.parallax_enabled = false;

    // Azimuth +90 degrees: source on the right, at distance 1 from the listener.
    let az = std::f32::consts::FRAC_PI_2;
    proc.notify_source_position(Transform::from_position(Vec3::new(az.cos(), 0.0, az.sin())));
    proc.notify_listener_position(Transform::from_position(Vec3::ZERO));

    let mut impulse = vec![0.0; block_size];
    impulse[0] = 1.0;
    proc.notify_input_samples(impulse);

    let right = proc.right_ear.last().unwrap();
    let left = proc.left_ear.last().unwrap();

    let right_peak = right.iter().enumerate().max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap()).unwrap().0;
    let left_peak = left.iter().enumerate().max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap()).unwrap().0;

    assert_eq!(right_peak, 0, "near ear should receive the impulse with zero delay");
    assert!(left_peak > 0, "far ear should be delayed relative to the near ear");

    // The formula's own prediction, cross-checked against what the processor produced.
    let theta = (az.sin()).asin();
    let expected_itd_samples = (head_radius * (theta + theta.sin()) / sound_speed * sample_rate as f32).round() as usize;
    assert!((left_peak as i64 - expected_itd_samples as i64).abs() <= 1);
}

#[test]
fn scenario_3_distance_attenuation_halves_gain_at_double_distance() {
    let block_size = 512;
    let mut proc = DistanceAttenuationProcessor::new(block_size, 48_000);
    proc.reference_distance_m = 1.0;
    proc.attenuation_db_per_doubling = -6.02;

    proc.notify_source_position(Transform::from_position(Vec3::new(2.0, 0.0, 0.0)));
    proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
    proc.notify_input_samples(vec![1.0; block_size]);

    let out = proc.output_samples.last().unwrap();
    assert!((out[block_size - 1] - 0.5).abs() < 1e-2);
}

#[test]
fn scenario_4_near_field_sos_symmetry_mirrors_single_ear_entry() {
    let mut service = SosFilterService::new();
    service.begin_setup();
    let coeffs = vec![0.1, 0.2, 0.3, 1.0, -0.4, 0.05];
    service.add_coefficients(30.0, 200.0, Some(coeffs.clone()), None).unwrap();
    service.end_setup().unwrap();

    let mirrored = service.get_sos_filter_coefficients(Ear::Right, 0.2, -30.0).unwrap();
    assert_eq!(mirrored, coeffs);
}

#[test]
fn scenario_5_online_interpolation_sweep_is_continuous_and_exact_at_nodes() {
    let block_size = 4;
    let sample_rate = 48_000u32;
    let mut service = HrtfService::new(GlobalParameters::new(block_size, sample_rate));
    service.begin_setup(1, ExtrapolationMethod::NearestPoint);
    for az in (0..360).step_by(5) {
        let amplitude = 1.0 + (az as f32 / 360.0);
        service.add_hrir(az as f32, 0.0, sample_rate, vec![amplitude], vec![amplitude], 0, 0).unwrap();
    }
    service.end_setup().unwrap();

    let mut previous: Option<Vec<f32>> = None;
    let mut max_step = 0.0f32;
    let mut az = 0.0f32;
    while az <= 5.0 + 1e-6 {
        let subs = service.get_hrir_partitioned(Ear::Left, az, 0.0, true).unwrap();
        let spectrum: Vec<f32> = subs[0].iter().map(|c| c.re).collect();

        if let Some(prev) = &previous {
            let l2: f32 = spectrum.iter().zip(prev.iter()).map(|(a, b)| (a - b).powi(2)).sum::<f32>().sqrt();
            assert!(l2 < 0.2, "interpolation jumped too much between adjacent queries: {}", l2);
            max_step = max_step.max(l2);
        }
        previous = Some(spectrum);
        az += 0.1;
    }
    assert!(max_step > 0.0, "sweep should show some continuous variation between grid nodes");

    let at_zero = service.get_hrir_partitioned(Ear::Left, 0.0, 0.0, true).unwrap();
    let at_zero_no_interp = service.get_hrir_partitioned(Ear::Left, 0.0, 0.0, false).unwrap();
    for (a, b) in at_zero[0].iter().zip(at_zero_no_interp[0].iter()) {
        assert!((a.re - b.re).abs() < 1e-4, "interpolation should be exact at a grid node");
    }
}

#[test]
fn scenario_6_source_inside_head_passes_through_unspatialised() {
    let block_size = 4;
    let head_radius = 0.0875;
    let service = identity_service(block_size, 48_000);

    let mut proc = HrtfConvolverProcessor::new(block_size, 64, head_radius);
    proc.listener_hrtf.set(Arc::downgrade(&service));

    proc.notify_source_position(Transform::from_position(Vec3::new(0.05, 0.0, 0.0)));
    proc.notify_listener_position(Transform::from_position(Vec3::ZERO));
    proc.notify_input_samples(vec![3.0, -1.0, 2.0, 0.5]);

    assert_eq!(proc.left_ear.last(), Some(vec![3.0, -1.0, 2.0, 0.5]));
    assert_eq!(proc.right_ear.last(), Some(vec![3.0, -1.0, 2.0, 0.5]));
}
