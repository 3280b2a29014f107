use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::{RenderStrategy, Rgba, Surface};
use crate::config::RenderOptions;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub center: Vec2,
    pub radius: f32,
    pub opacity: f32,
    pub color: Rgba,
}

/// Randomly placed circles, one per loud enough sample in every
/// `particle_stride`-th bin. Stride and threshold bound the density.
pub struct Particles;

impl Particles {
    pub fn spawn<'a>(
        data: &'a [u8],
        width: f32,
        height: f32,
        options: &'a RenderOptions,
        rng: &'a mut Pcg32,
    ) -> impl Iterator<Item = Particle> + 'a {
        let len = data.len();
        data.iter()
            .enumerate()
            .step_by(options.particle_stride.max(1))
            .filter_map(move |(i, &value)| {
                let amplitude = value as f32 / 255.0;
                if amplitude <= options.particle_threshold || width <= 0.0 || height <= 0.0 {
                    return None;
                }
                let center = Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
                Some(Particle {
                    center,
                    radius: amplitude * options.particle_max_radius,
                    opacity: amplitude,
                    color: Rgba::from_hsl(i as f32 / len as f32 * 360.0, 0.9, 0.6),
                })
            })
    }
}

impl RenderStrategy for Particles {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn draw(&self, surface: &mut Surface, data: &[u8], options: &RenderOptions, rng: &mut Pcg32) {
        surface.clear(options.background.into());
        let (width, height) = (surface.width(), surface.height());
        for particle in Self::spawn(data, width, height, options, rng) {
            surface.fill_circle(particle.center, particle.radius, particle.color.with_alpha(particle.opacity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_stride_and_threshold_bound_the_count() {
        let options = RenderOptions::default();
        let mut rng = Pcg32::seed_from_u64(42);

        // 26 / 255 is just over the 0.1 threshold, 25 / 255 is under.
        let mut data = vec![25u8; 64];
        for i in (0..64).step_by(8) {
            data[i] = 26;
        }
        data[1] = 255; // off-stride, never sampled
        let count = Particles::spawn(&data, 100.0, 100.0, &options, &mut rng).count();
        assert_eq!(count, 8);

        let count = Particles::spawn(&[255; 128], 100.0, 100.0, &options, &mut rng).count();
        assert_eq!(count, 32);
    }

    #[test]
    fn test_particles_stay_in_bounds_and_scale() {
        let options = RenderOptions::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let data: Vec<u8> = (0..=255u8).collect();

        for _ in 0..20 {
            for p in Particles::spawn(&data, 320.0, 180.0, &options, &mut rng) {
                assert!((0.0..320.0).contains(&p.center.x));
                assert!((0.0..180.0).contains(&p.center.y));
                assert!(p.opacity > 0.1 && p.opacity <= 1.0);
                assert!((p.radius - p.opacity * options.particle_max_radius).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_positions_change_between_frames() {
        let options = RenderOptions::default();
        let mut rng = Pcg32::seed_from_u64(9);
        let first: Vec<_> = Particles::spawn(&[200; 16], 100.0, 100.0, &options, &mut rng).collect();
        let second: Vec<_> = Particles::spawn(&[200; 16], 100.0, 100.0, &options, &mut rng).collect();
        assert_eq!(first.len(), second.len());
        assert_ne!(first[0].center, second[0].center);
    }
}
