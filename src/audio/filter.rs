//! Low-pass / high-pass biquads for the optional filter chain.
//!
//! Coefficients follow the Audio EQ Cookbook and are recomputed lazily when
//! the sample rate of the incoming block changes.

use std::f32::consts::PI;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::LowPass => write!(f, "low-pass"),
            FilterKind::HighPass => write!(f, "high-pass"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    fn new(kind: FilterKind, cutoff: f32, q: f32, sample_rate: f32) -> Self {
        let q = q.max(0.5);
        // Keep the cutoff strictly inside (0, nyquist).
        let cutoff = cutoff.clamp(1.0, sample_rate * 0.49);
        let omega = 2.0 * PI * cutoff / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => ((1.0 - cos_omega) / 2.0, 1.0 - cos_omega, (1.0 - cos_omega) / 2.0),
            FilterKind::HighPass => ((1.0 + cos_omega) / 2.0, -(1.0 + cos_omega), (1.0 + cos_omega) / 2.0),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I history for one channel.
#[derive(Debug, Clone, Copy, Default)]
struct History {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    cutoff: f32,
    q: f32,
    sample_rate: u32,
    coefficients: Option<Coefficients>,
    history: Vec<History>,
}

impl BiquadFilter {
    pub fn new(kind: FilterKind, cutoff: f32, q: f32) -> Self {
        Self {
            kind,
            cutoff,
            q,
            sample_rate: 0,
            coefficients: None,
            history: Vec::new(),
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Filter an interleaved block in place.
    pub fn process(&mut self, block: &mut [f32], channels: usize, sample_rate: u32) {
        if channels == 0 || sample_rate == 0 {
            return;
        }
        if self.sample_rate != sample_rate || self.coefficients.is_none() {
            self.sample_rate = sample_rate;
            self.coefficients = Some(Coefficients::new(self.kind, self.cutoff, self.q, sample_rate as f32));
        }
        if self.history.len() != channels {
            self.history = vec![History::default(); channels];
        }
        let Some(c) = self.coefficients else {
            return;
        };

        for frame in block.chunks_mut(channels) {
            for (sample, h) in frame.iter_mut().zip(self.history.iter_mut()) {
                let x = *sample;
                let y = c.b0 * x + c.b1 * h.x1 + c.b2 * h.x2 - c.a1 * h.y1 - c.a2 * h.y2;
                h.x2 = h.x1;
                h.x1 = x;
                h.y2 = h.y1;
                h.y1 = y;
                *sample = y;
            }
        }
    }
}
