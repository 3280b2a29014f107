use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use spectral_player::audio::{compute_band_metrics, AnalyserNode};
use spectral_player::config::RenderOptions;
use spectral_player::render::{Surface, VisualizationMode};
use std::hint::black_box;

fn spectrum(len: usize) -> Vec<u8> {
    (0..len).map(|i| (255 - (i * 255 / len)) as u8).collect()
}

fn bench_band_metrics(c: &mut Criterion) {
    let snapshot = spectrum(1024);
    c.benchmark_group("band_metrics")
        .bench_function("1024_bins", |b| {
            b.iter(|| black_box(compute_band_metrics(black_box(&snapshot))));
        });
}

fn bench_analyser(c: &mut Criterion) {
    let mut node = AnalyserNode::new(2048, 0.8, -100.0, -30.0).unwrap();
    let block: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
    let mut out = vec![0u8; node.frequency_bin_count()];

    c.benchmark_group("analyser")
        .bench_function("fft_2048_snapshot", |b| {
            b.iter(|| {
                node.push_interleaved(&block, 2);
                node.get_byte_frequency_data(&mut out);
                black_box(&out);
            });
        });
}

fn bench_strategies(c: &mut Criterion) {
    let options = RenderOptions::default();
    let snapshot = spectrum(1024);
    let mut rng = Pcg32::seed_from_u64(1);
    let mut group = c.benchmark_group("render_1280x720_2x");

    for mode in VisualizationMode::ALL {
        let mut surface = Surface::new(1280.0, 720.0, 2.0);
        group.bench_function(mode.to_string(), |b| {
            b.iter(|| {
                mode.strategy().draw(&mut surface, black_box(&snapshot), &options, &mut rng);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_band_metrics, bench_analyser, bench_strategies);
criterion_main!(benches);
