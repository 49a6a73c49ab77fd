use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::FFTplanner;

/// One sub-filter of a partitioned impulse response: `B` taps zero-padded to `2*B` and
/// forward-transformed. `THRIRPartitioned`'s per-ear sub-filter list is `Vec<SubFilter>`.
pub type SubFilter = Vec<Complex<f32>>;

/// Splits a time-domain impulse response into `ceil(len/block_size)` sub-filters of
/// length `2*block_size`, each zero-padded and FFT'd. Grounded on the teacher's
/// `make_hrtf`/`read_hrir` zero-pad-then-FFT pattern in `hrtf.rs`, generalised from a
/// single whole-IR transform to per-partition transforms.
pub fn partition_and_transform(ir: &[f32], block_size: usize) -> Vec<SubFilter> {
    let num_partitions = (ir.len() + block_size - 1) / block_size.max(1);
    let mut planner = FFTplanner::new(false);
    let fft = planner.plan_fft(block_size * 2);

    (0..num_partitions.max(1))
        .map(|k| {
            let start = k * block_size;
            let end = (start + block_size).min(ir.len());
            let mut padded = vec![Complex::zero(); block_size * 2];
            if start < end {
                for (i, sample) in ir[start..end].iter().enumerate() {
                    padded[i] = Complex::new(*sample, 0.0);
                }
            }
            let mut spectrum = vec![Complex::zero(); block_size * 2];
            fft.process(&mut padded, &mut spectrum);
            spectrum
        })
        .collect()
}

/// Uniformly-partitioned, overlap-add frequency-domain convolver (§4.5). Holds a ring of
/// the `P` most recent input spectra and an overlap-add tail of length `B`.
pub struct PartitionedConvolver {
    block_size: usize,
    ring: Vec<Vec<Complex<f32>>>,
    head: usize,
    overlap: Vec<f32>,
    fft: std::sync::Arc<dyn rustfft::FFT<f32>>,
    ifft: std::sync::Arc<dyn rustfft::FFT<f32>>,
}

impl PartitionedConvolver {
    pub fn new(block_size: usize, num_partitions: usize) -> Self {
        let num_partitions = num_partitions.max(1);
        let mut fwd_planner = FFTplanner::new(false);
        let mut inv_planner = FFTplanner::new(true);
        PartitionedConvolver {
            block_size,
            ring: vec![vec![Complex::zero(); block_size * 2]; num_partitions],
            head: 0,
            overlap: vec![0.0; block_size],
            fft: fwd_planner.plan_fft(block_size * 2),
            ifft: inv_planner.plan_fft(block_size * 2),
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.ring.len()
    }

    pub fn reset(&mut self) {
        for spectrum in self.ring.iter_mut() {
            for c in spectrum.iter_mut() {
                *c = Complex::zero();
            }
        }
        self.head = 0;
        for s in self.overlap.iter_mut() {
            *s = 0.0;
        }
    }

    /// Convolves one input block (length `block_size`) against `sub_filters` (one
    /// sub-filter per partition, as produced by [`partition_and_transform`] or a
    /// service's resampled table), returning one output block of the same length.
    pub fn process(&mut self, input: &[f32], sub_filters: &[SubFilter]) -> Vec<f32> {
        let b = self.block_size;
        let p = self.ring.len();
        debug_assert_eq!(input.len(), b);

        let mut padded = vec![Complex::zero(); b * 2];
        for (i, sample) in input.iter().enumerate() {
            padded[i] = Complex::new(*sample, 0.0);
        }
        self.fft.process(&mut padded, &mut self.ring[self.head]);
        self.head = (self.head + 1) % p;

        let mut acc = vec![Complex::zero(); b * 2];
        for k in 0..p {
            let idx = (self.head + p - 1 - k) % p;
            if let Some(h_k) = sub_filters.get(k) {
                for (a, (r, h)) in acc.iter_mut().zip(self.ring[idx].iter().zip(h_k.iter())) {
                    *a += r * h;
                }
            }
        }

        let mut time = vec![Complex::zero(); b * 2];
        self.ifft.process(&mut acc, &mut time);

        let scale = 1.0 / (b * 2) as f32;
        let mut output = vec![0.0f32; b];
        for i in 0..b {
            output[i] = time[i].re * scale + self.overlap[i];
        }
        for i in 0..b {
            self.overlap[i] = time[b + i].re * scale;
        }
        output
    }
}
