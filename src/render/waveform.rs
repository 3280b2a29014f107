use glam::Vec2;
use rand_pcg::Pcg32;

use super::{RenderStrategy, Rgba, Surface};
use crate::audio::SnapshotDomain;
use crate::config::{RenderOptions, WaveformStyle};

/// A single polyline across the surface, one point per sample.
///
/// The stylized variant draws frequency data as `sin(i * 0.1)` scaled by
/// each bin's amplitude. The literal variant plots the time-domain
/// waveform, 128 being the midline.
pub struct Waveform;

impl Waveform {
    pub fn point(index: usize, value: u8, len: usize, width: f32, height: f32, options: &RenderOptions) -> Vec2 {
        let x = if len > 1 {
            index as f32 * width / (len - 1) as f32
        } else {
            width / 2.0
        };
        let mid = height / 2.0;
        let y = match options.waveform_style {
            WaveformStyle::Stylized => {
                let amplitude = value as f32 / 255.0 * height * options.waveform_amplitude;
                mid + (index as f32 * 0.1).sin() * amplitude
            }
            WaveformStyle::Literal => value as f32 / 128.0 * mid,
        };
        Vec2::new(x, y)
    }
}

impl RenderStrategy for Waveform {
    fn name(&self) -> &'static str {
        "waveform"
    }

    fn domain(&self, options: &RenderOptions) -> SnapshotDomain {
        match options.waveform_style {
            WaveformStyle::Stylized => SnapshotDomain::Frequency,
            WaveformStyle::Literal => SnapshotDomain::TimeDomain,
        }
    }

    fn draw(&self, surface: &mut Surface, data: &[u8], options: &RenderOptions, _rng: &mut Pcg32) {
        surface.clear(options.background.into());
        if data.is_empty() {
            return;
        }

        let (width, height) = (surface.width(), surface.height());
        let points = data
            .iter()
            .enumerate()
            .map(|(i, &v)| Self::point(i, v, data.len(), width, height, options));
        surface.stroke_polyline(points, options.line_width, Rgba::from(options.line_color));
    }
}
