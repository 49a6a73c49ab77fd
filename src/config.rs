/// Process-wide block size and sample rate, mirroring the original's
/// `Common::CGlobalParameters`. Passed by value to every service and processor that
/// needs `B` or the sample rate, instead of read from a global singleton.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlobalParameters {
    block_size: usize,
    sample_rate: u32,
}

impl GlobalParameters {
    /// `block_size` should be a power of two; a non-power-of-two value is accepted with
    /// a warning rather than rejected outright (§7: `InvalidParam`, warning-grade).
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        if !block_size.is_power_of_two() {
            log::warn!(
                "block size {} is not a power of two; uniformly-partitioned convolution still \
                 works but FFT performance will suffer",
                block_size
            );
        }
        GlobalParameters { block_size, sample_rate }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for GlobalParameters {
    fn default() -> Self {
        GlobalParameters::new(512, 48_000)
    }
}
