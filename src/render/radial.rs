use glam::Vec2;
use rand_pcg::Pcg32;
use std::f32::consts::{FRAC_PI_2, TAU};

use super::{RenderStrategy, Rgba, Surface};
use crate::config::RenderOptions;

/// Spiked ring centred on the surface; spike length encodes each bin.
pub struct Radial;

impl Radial {
    /// Inner and outer end of spike `index`, starting at twelve o'clock.
    pub fn spike(index: usize, value: u8, len: usize, width: f32, height: f32, options: &RenderOptions) -> (Vec2, Vec2) {
        let center = Vec2::new(width / 2.0, height / 2.0);
        let extent = width.min(height);
        let base = extent * options.radial_base_ratio;
        let length = value as f32 / 255.0 * extent * options.radial_spike_ratio;

        let angle = index as f32 / len.max(1) as f32 * TAU - FRAC_PI_2;
        let direction = Vec2::new(angle.cos(), angle.sin());
        (center + direction * base, center + direction * (base + length))
    }
}

impl RenderStrategy for Radial {
    fn name(&self) -> &'static str {
        "radial"
    }

    fn draw(&self, surface: &mut Surface, data: &[u8], options: &RenderOptions, _rng: &mut Pcg32) {
        surface.clear(options.background.into());
        let (width, height) = (surface.width(), surface.height());
        let len = data.len();

        for (i, &value) in data.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let (inner, outer) = Self::spike(i, value, len, width, height, options);
            let hue = i as f32 / len as f32 * 360.0;
            surface.stroke_line(inner, outer, options.radial_line_width, Rgba::from_hsl(hue, 0.8, 0.6));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_spike_length_scales_with_amplitude() {
        let options = RenderOptions::default();
        let (inner, outer) = Radial::spike(0, 255, 4, 200.0, 100.0, &options);
        // Base radius 25, full spike 25, pointing up from (100, 50).
        assert!((inner - Vec2::new(100.0, 25.0)).length() < 1e-3);
        assert!((outer - Vec2::new(100.0, 0.0)).length() < 1e-3);

        let (inner, outer) = Radial::spike(1, 0, 4, 200.0, 100.0, &options);
        assert!((inner - outer).length() < 1e-3);
        assert!((inner - Vec2::new(125.0, 50.0)).length() < 1e-3);
    }

    #[test]
    fn test_spikes_paint_outside_base_ring() {
        let options = RenderOptions::default();
        let background = Rgba::from(options.background);
        let mut surface = Surface::new(100.0, 100.0, 1.0);
        let mut rng = Pcg32::seed_from_u64(3);

        Radial.draw(&mut surface, &[255; 8], &options, &mut rng);
        // Straight up from the centre, between base (25) and tip (50).
        assert_ne!(surface.pixel(50, 12), Some(background));
        assert_eq!(surface.pixel(50, 50), Some(background));
    }
}
