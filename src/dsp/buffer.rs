/// A block of mono samples. Plain `Vec<f32>` alias, matching the teacher's habit of
/// passing raw sample slices around rather than wrapping them in a newtype.
pub type MonoBuffer = Vec<f32>;

pub fn silence(len: usize) -> MonoBuffer {
    vec![0.0; len]
}

pub fn mute(buffer: &mut [f32]) {
    for s in buffer.iter_mut() {
        *s = 0.0;
    }
}

pub fn add_in_place(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s;
    }
}

/// Applies a delay of `delay` samples to `block` using the expansion method (§4.6 step 7
/// / §4.8): concatenate the saved tail from the previous call in front of the current
/// block, emit the first `block.len()` samples, save the new tail.
///
/// `tail` must have capacity for the maximum delay the caller will ever request; only
/// the first `delay` samples of it are meaningful.
pub struct ExpansionDelayLine {
    tail: Vec<f32>,
    max_delay: usize,
}

impl ExpansionDelayLine {
    pub fn new(max_delay: usize) -> Self {
        ExpansionDelayLine { tail: vec![0.0; max_delay], max_delay }
    }

    pub fn reset(&mut self) {
        for s in self.tail.iter_mut() {
            *s = 0.0;
        }
    }

    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    /// Processes one block in place, applying `delay` (`<= max_delay`) samples of
    /// expansion delay.
    pub fn process(&mut self, block: &mut [f32], delay: usize) {
        let delay = delay.min(self.max_delay);
        if delay == 0 {
            return;
        }
        let len = block.len();
        let mut expanded = Vec::with_capacity(delay + len);
        expanded.extend_from_slice(&self.tail[..delay]);
        expanded.extend_from_slice(block);

        block.copy_from_slice(&expanded[..len]);

        let new_tail_start = expanded.len() - delay;
        self.tail[..delay].copy_from_slice(&expanded[new_tail_start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_delay_shifts_impulse_within_block() {
        let mut line = ExpansionDelayLine::new(8);
        let mut block1 = vec![0.0; 8];
        block1[0] = 1.0;
        line.process(&mut block1, 3);
        assert_eq!(block1, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

        let mut block2 = vec![0.0; 8];
        line.process(&mut block2, 3);
        assert_eq!(block2, vec![0.0; 8]);
    }

    #[test]
    fn expansion_delay_carries_tail_across_blocks() {
        let mut line = ExpansionDelayLine::new(4);
        let mut block1 = vec![0.0; 4];
        block1[3] = 1.0;
        line.process(&mut block1, 2);
        assert_eq!(block1, vec![0.0, 0.0, 0.0, 0.0]);

        let mut block2 = vec![0.0; 4];
        line.process(&mut block2, 2);
        assert_eq!(block2, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_delay_is_passthrough() {
        let mut line = ExpansionDelayLine::new(4);
        let mut block = vec![1.0, 2.0, 3.0];
        let before = block.clone();
        line.process(&mut block, 0);
        assert_eq!(block, before);
    }
}
