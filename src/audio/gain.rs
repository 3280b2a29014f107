/// Scalar volume stage placed after the analyser, so volume changes never
/// show up in the measured spectrum.
#[derive(Debug, Clone)]
pub struct GainNode {
    value: f32,
    ramp: Option<Ramp>,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

impl GainNode {
    pub fn new(value: f32) -> Self {
        Self { value, ramp: None }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Final value once any ramp in flight completes.
    pub fn target(&self) -> f32 {
        self.ramp.map_or(self.value, |r| r.to)
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.ramp = None;
    }

    /// Move linearly from the current value to `target` over `seconds` of
    /// rendered audio. A zero duration steps immediately.
    pub fn linear_ramp_to(&mut self, target: f32, seconds: f32) {
        if seconds <= 0.0 {
            self.set_value(target);
            return;
        }
        self.ramp = Some(Ramp {
            from: self.value,
            to: target,
            duration: seconds,
            elapsed: 0.0,
        });
    }

    pub fn process(&mut self, block: &mut [f32], channels: usize, sample_rate: u32) {
        if channels == 0 {
            return;
        }
        let Some(mut ramp) = self.ramp else {
            if self.value != 1.0 {
                block.iter_mut().for_each(|s| *s *= self.value);
            }
            return;
        };

        let step = 1.0 / sample_rate.max(1) as f32;
        for frame in block.chunks_mut(channels) {
            ramp.elapsed = (ramp.elapsed + step).min(ramp.duration);
            self.value = ramp.from + (ramp.to - ramp.from) * (ramp.elapsed / ramp.duration);
            frame.iter_mut().for_each(|s| *s *= self.value);
        }

        if ramp.elapsed >= ramp.duration {
            self.value = ramp.to;
            self.ramp = None;
        } else {
            self.ramp = Some(ramp);
        }
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_is_linear_and_completes() {
        let mut gain = GainNode::new(0.0);
        gain.linear_ramp_to(1.0, 0.1);

        // 0.05 s at 1 kHz is halfway.
        let mut block = vec![1.0; 50];
        gain.process(&mut block, 1, 1000);
        assert!((gain.value() - 0.5).abs() < 1e-4);
        assert!(block.windows(2).all(|w| w[1] >= w[0]));

        let mut block = vec![1.0; 100];
        gain.process(&mut block, 1, 1000);
        assert_eq!(gain.value(), 1.0);
        assert_eq!(gain.target(), 1.0);
        assert_eq!(block[99], 1.0);
    }

    #[test]
    fn test_zero_duration_steps() {
        let mut gain = GainNode::new(1.0);
        gain.linear_ramp_to(0.25, 0.0);
        let mut block = vec![1.0, 1.0];
        gain.process(&mut block, 2, 44100);
        assert_eq!(block, vec![0.25, 0.25]);
    }
}
