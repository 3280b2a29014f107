use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::error::GraphError;

/// Real-time spectrum node.
///
/// Keeps the most recent `fft_size` mono samples in a ring and, on demand,
/// produces byte-scaled magnitude or waveform data. Frequency output is a
/// Blackman-windowed transform, smoothed over time and mapped from the
/// `[min_decibels, max_decibels]` range onto 0..=255.
pub struct AnalyserNode {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,

    ring: Vec<f32>,
    write_pos: usize,

    // Reused every poll so capturing a snapshot never allocates.
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl AnalyserNode {
    pub fn new(fft_size: usize, smoothing: f32, min_decibels: f32, max_decibels: f32) -> Result<Self, GraphError> {
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(GraphError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let fft_scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Ok(Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
            fft,
            window,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch,
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn smoothing_time_constant(&self) -> f32 {
        self.smoothing
    }

    /// Feed an interleaved block; channels are averaged down to mono.
    pub fn push_interleaved(&mut self, block: &[f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in block.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            self.ring[self.write_pos] = mono;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Ring contents from oldest to newest.
    fn ordered_samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.ring[self.write_pos..]
            .iter()
            .chain(self.ring[..self.write_pos].iter())
            .copied()
    }

    /// Fill `out` with byte-scaled magnitudes for the first `out.len()` bins.
    pub fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        let samples = self.ring[self.write_pos..]
            .iter()
            .chain(self.ring[..self.write_pos].iter());
        for ((slot, &sample), &w) in self.fft_buffer.iter_mut().zip(samples).zip(self.window.iter()) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (prev, bin) in self.smoothed.iter_mut().zip(self.fft_buffer.iter()) {
            let magnitude = bin.norm() * scale;
            let value = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if value.is_finite() { value } else { 0.0 };
        }

        let range = self.max_decibels - self.min_decibels;
        for (byte, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *byte = if magnitude <= 0.0 {
                0
            } else {
                let db = 20.0 * magnitude.log10();
                (255.0 * (db - self.min_decibels) / range).clamp(0.0, 255.0) as u8
            };
        }
    }

    /// Fill `out` with the first `out.len()` samples of the current window,
    /// where 128 is silence.
    pub fn get_byte_time_domain_data(&self, out: &mut [u8]) {
        for (byte, sample) in out.iter_mut().zip(self.ordered_samples()) {
            *byte = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_rejects_bad_fft_size() {
        assert!(matches!(AnalyserNode::new(1000, 0.8, -100.0, -30.0), Err(GraphError::InvalidFftSize(1000))));
        assert!(AnalyserNode::new(16, 0.8, -100.0, -30.0).is_err());
    }

    #[test]
    fn test_silence_reads_zero_and_midline() {
        let mut node = AnalyserNode::new(256, 0.8, -100.0, -30.0).unwrap();
        let mut freq = vec![7u8; 128];
        let mut time = vec![7u8; 128];
        node.get_byte_frequency_data(&mut freq);
        node.get_byte_time_domain_data(&mut time);
        assert!(freq.iter().all(|&v| v == 0));
        assert!(time.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_tone_peaks_in_its_bin() {
        let sample_rate = 44100.0;
        let mut node = AnalyserNode::new(2048, 0.0, -100.0, -30.0).unwrap();
        // Bin 100 of a 2048-point transform.
        let freq = 100.0 * sample_rate / 2048.0;
        node.push_interleaved(&tone(freq, sample_rate, 2048), 1);

        let mut out = vec![0u8; 1024];
        node.get_byte_frequency_data(&mut out);
        let peak_bin = out
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        assert!((99..=101).contains(&peak_bin));
        assert!(out[100] > 200);
        assert!(out[900] < out[100] / 2);
    }

    #[test]
    fn test_smoothing_slows_decay() {
        let mut raw = AnalyserNode::new(256, 0.0, -100.0, -30.0).unwrap();
        let mut smooth = AnalyserNode::new(256, 0.85, -100.0, -30.0).unwrap();
        let signal = tone(1000.0, 44100.0, 256);
        let mut out_raw = vec![0u8; 128];
        let mut out_smooth = vec![0u8; 128];

        for node in [&mut raw, &mut smooth] {
            node.push_interleaved(&signal, 1);
        }
        for _ in 0..10 {
            raw.get_byte_frequency_data(&mut out_raw);
            smooth.get_byte_frequency_data(&mut out_smooth);
        }
        for node in [&mut raw, &mut smooth] {
            node.push_interleaved(&vec![0.0; 256], 1);
        }
        raw.get_byte_frequency_data(&mut out_raw);
        smooth.get_byte_frequency_data(&mut out_smooth);

        assert!(out_raw.iter().all(|&v| v == 0));
        assert!(out_smooth.iter().any(|&v| v > 0));
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let node_block = [1.0, -1.0, 0.5, 0.5];
        let mut node = AnalyserNode::new(32, 0.8, -100.0, -30.0).unwrap();
        node.push_interleaved(&node_block, 2);
        let mut out = vec![0u8; 32];
        node.get_byte_time_domain_data(&mut out);
        assert_eq!(out[30], 128);
        assert_eq!(out[31], 192);
    }
}
