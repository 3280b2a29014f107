use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transform size used for metric-quality analysis (1024 usable bins).
pub const ANALYSIS_FFT_SIZE: usize = 2048;

/// Transform size used when the tap only feeds the draw loop (128 bins).
pub const VISUAL_FFT_SIZE: usize = 256;

/// Frames pushed through the graph per processing block.
pub const RENDER_QUANTUM: usize = 512;

/// Analysis graph configuration for a `SignalTap`.
///
/// Two profiles exist: `analysis()` trades draw-loop headroom for frequency
/// resolution, `visual()` does the opposite. `Default` is the analysis profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapConfig {
    pub fft_size: usize,
    /// Exponential smoothing between consecutive transforms, 0.0 = raw.
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Length of the linear volume ramp applied at the gain node.
    pub volume_ramp_seconds: f32,
    /// How far ahead of the device the graph keeps the output queue filled.
    /// Snapshots lead the audible signal by this much, so keep it short.
    pub output_latency_frames: usize,
}

impl TapConfig {
    pub fn analysis() -> Self {
        Self {
            fft_size: ANALYSIS_FFT_SIZE,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            volume_ramp_seconds: 0.1,
            output_latency_frames: RENDER_QUANTUM * 2,
        }
    }

    pub fn visual() -> Self {
        Self {
            fft_size: VISUAL_FFT_SIZE,
            smoothing_time_constant: 0.85,
            ..Self::analysis()
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self::analysis()
    }
}

/// Optional filter chain inserted between the source and the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub highpass_hz: Option<f32>,
    pub lowpass_hz: Option<f32>,
    pub q: f32,
}

impl FilterSettings {
    pub fn is_empty(&self) -> bool {
        self.highpass_hz.is_none() && self.lowpass_hz.is_none()
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            highpass_hz: None,
            lowpass_hz: None,
            q: std::f32::consts::FRAC_1_SQRT_2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformStyle {
    /// `sin(index * 0.1)` oscillation scaled by each sample's amplitude.
    Stylized,
    /// Sample value mapped linearly around the midline (128 = centre).
    Literal,
}

/// Tunables shared by every render strategy.
///
/// Colors are straight RGBA bytes so an options file stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub background: [u8; 4],

    // Bars
    pub bar_height_ratio: f32,
    pub bar_gap: f32,
    pub gradient_bottom: [u8; 4],
    pub gradient_top: [u8; 4],

    // Waveform
    pub waveform_style: WaveformStyle,
    pub waveform_amplitude: f32,
    pub line_width: f32,
    pub line_color: [u8; 4],

    // Radial
    pub radial_base_ratio: f32,
    pub radial_spike_ratio: f32,
    pub radial_line_width: f32,

    // Particles
    pub particle_stride: usize,
    pub particle_threshold: f32,
    pub particle_max_radius: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: [10, 10, 18, 255],
            bar_height_ratio: 0.8,
            bar_gap: 1.0,
            gradient_bottom: [40, 0, 90, 255],
            gradient_top: [120, 220, 255, 255],
            waveform_style: WaveformStyle::Stylized,
            waveform_amplitude: 0.5,
            line_width: 2.0,
            line_color: [0, 230, 180, 255],
            radial_base_ratio: 0.25,
            radial_spike_ratio: 0.25,
            radial_line_width: 2.0,
            particle_stride: 4,
            particle_threshold: 0.1,
            particle_max_radius: 12.0,
        }
    }
}

impl RenderOptions {
    /// Load options from a JSON file; missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(&path)?;
        let options = serde_json::from_str(&json)?;
        Ok(options)
    }
}
