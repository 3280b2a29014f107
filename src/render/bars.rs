use rand_pcg::Pcg32;

use super::{RenderStrategy, Rgba, Surface};
use crate::config::RenderOptions;

/// Vertical bars across the full width, one per bin.
pub struct Bars;

impl RenderStrategy for Bars {
    fn name(&self) -> &'static str {
        "bars"
    }

    fn draw(&self, surface: &mut Surface, data: &[u8], options: &RenderOptions, _rng: &mut Pcg32) {
        surface.clear(options.background.into());
        if data.is_empty() {
            return;
        }

        let width = surface.width();
        let height = surface.height();
        let bottom = Rgba::from(options.gradient_bottom);
        let top = Rgba::from(options.gradient_top);

        let slot = width / data.len() as f32;
        // Narrow slots get no gap, or the bars would vanish.
        let bar_width = if slot > options.bar_gap * 2.0 { slot - options.bar_gap } else { slot };

        for (i, &value) in data.iter().enumerate() {
            let bar_height = value as f32 / 255.0 * height * options.bar_height_ratio;
            if bar_height <= 0.0 {
                continue;
            }
            let x = i as f32 * slot;
            surface.fill_rect_gradient(x, height - bar_height, bar_width, bar_height, bottom, top);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn filled_rows(surface: &Surface, x: u32, background: Rgba) -> u32 {
        let (_, height) = surface.physical_size();
        (0..height)
            .filter(|&y| surface.pixel(x, y) != Some(background))
            .count() as u32
    }

    #[test]
    fn test_bar_heights_follow_samples() {
        let options = RenderOptions::default();
        let background = Rgba::from(options.background);
        let mut surface = Surface::new(40.0, 100.0, 1.0);
        let mut rng = Pcg32::seed_from_u64(0);

        Bars.draw(&mut surface, &[255, 0, 128, 64], &options, &mut rng);

        // Full-scale bar reaches 80% of the height.
        assert_eq!(filled_rows(&surface, 2, background), 80);
        assert_eq!(filled_rows(&surface, 12, background), 0);
        assert_eq!(filled_rows(&surface, 22, background), 40);
        assert_eq!(filled_rows(&surface, 32, background), 20);
    }

    #[test]
    fn test_bars_scale_with_pixel_ratio() {
        let options = RenderOptions::default();
        let background = Rgba::from(options.background);
        let mut surface = Surface::new(40.0, 100.0, 2.0);
        let mut rng = Pcg32::seed_from_u64(0);

        Bars.draw(&mut surface, &[255, 0, 0, 0], &options, &mut rng);
        assert_eq!(filled_rows(&surface, 4, background), 160);
    }

    #[test]
    fn test_taller_bars_are_lighter_at_the_top() {
        let options = RenderOptions::default();
        let mut surface = Surface::new(10.0, 100.0, 1.0);
        let mut rng = Pcg32::seed_from_u64(0);

        Bars.draw(&mut surface, &[255], &options, &mut rng);
        let top = surface.pixel(5, 21).unwrap();
        let bottom = surface.pixel(5, 99).unwrap();
        assert!(top.g > bottom.g);
    }
}
