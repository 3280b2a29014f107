/// Banded loudness summary of one frequency snapshot, every field in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandMetrics {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub volume: f32,
    pub peak: f32,
}

/// Reduce a frequency snapshot to bass/mid/treble/volume/peak.
///
/// Bins `[0, L/10)` are bass, `[L/10, L/2)` mid and `[L/2, L)` treble, with
/// both edges floored. Each band mean divides by the bins it actually
/// summed, so empty bands at tiny lengths read as zero.
pub fn compute_band_metrics(snapshot: &[u8]) -> BandMetrics {
    let len = snapshot.len();
    if len == 0 {
        return BandMetrics::default();
    }

    // floor(len * 0.1) and floor(len * 0.5), without float rounding.
    let bass_end = len / 10;
    let mid_end = len / 2;

    let bass = band_mean(&snapshot[..bass_end]);
    let mid = band_mean(&snapshot[bass_end..mid_end]);
    let treble = band_mean(&snapshot[mid_end..]);
    let volume = (bass + mid + treble) / 3.0;
    let peak = snapshot.iter().copied().max().unwrap_or(0) as f32;

    BandMetrics {
        bass: bass / 255.0,
        mid: mid / 255.0,
        treble: treble / 255.0,
        volume: volume / 255.0,
        peak: peak / 255.0,
    }
}

fn band_mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().map(|&v| v as f32).sum::<f32>() / bins.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_empty_snapshot_is_zero() {
        assert_eq!(compute_band_metrics(&[]), BandMetrics::default());
    }

    #[test]
    fn test_extremes() {
        assert_eq!(compute_band_metrics(&[0; 1024]), BandMetrics::default());

        let full = compute_band_metrics(&[255; 1024]);
        for value in [full.bass, full.mid, full.treble, full.volume, full.peak] {
            assert!(approx(value, 1.0));
        }
    }

    #[test]
    fn test_ten_bin_scenario() {
        let snapshot = [25, 50, 75, 100, 125, 150, 175, 200, 225, 250];
        let m = compute_band_metrics(&snapshot);
        assert!(approx(m.bass, 25.0 / 255.0));
        assert!(approx(m.mid, 87.5 / 255.0));
        assert!(approx(m.treble, 200.0 / 255.0));
        assert!(approx(m.volume, (25.0 + 87.5 + 200.0) / 3.0 / 255.0));
        assert!(approx(m.peak, 250.0 / 255.0));
    }

    #[test]
    fn test_ten_bin_boundaries() {
        // Only index 0 is bass.
        let mut snapshot = [0u8; 10];
        snapshot[0] = 255;
        let m = compute_band_metrics(&snapshot);
        assert!(approx(m.bass, 1.0));
        assert_eq!(m.mid, 0.0);

        // Indices 1..=4 are mid.
        let mut snapshot = [0u8; 10];
        snapshot[1..5].fill(255);
        let m = compute_band_metrics(&snapshot);
        assert_eq!(m.bass, 0.0);
        assert!(approx(m.mid, 1.0));
        assert_eq!(m.treble, 0.0);

        // Indices 5..=9 are treble.
        let mut snapshot = [0u8; 10];
        snapshot[5..].fill(255);
        let m = compute_band_metrics(&snapshot);
        assert_eq!(m.mid, 0.0);
        assert!(approx(m.treble, 1.0));
    }

    #[test]
    fn test_short_snapshots_do_not_divide_by_zero() {
        for len in 1..10 {
            let m = compute_band_metrics(&vec![200u8; len]);
            for value in [m.bass, m.mid, m.treble, m.volume, m.peak] {
                assert!(value.is_finite());
                assert!((0.0..=1.0).contains(&value));
            }
        }
        // L = 1: no bass or mid bins, everything lands in treble.
        let m = compute_band_metrics(&[255]);
        assert_eq!(m.bass, 0.0);
        assert_eq!(m.mid, 0.0);
        assert!(approx(m.treble, 1.0));
    }

    #[test]
    fn test_fields_stay_in_unit_range() {
        let mut rng = Pcg32::seed_from_u64(7);
        for len in [1usize, 7, 10, 128, 1024] {
            let snapshot: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let m = compute_band_metrics(&snapshot);
            for value in [m.bass, m.mid, m.treble, m.volume, m.peak] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }
}
