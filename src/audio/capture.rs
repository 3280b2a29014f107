use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::MediaSource;

/// Device blocks that may sit in the channel before new ones are dropped.
const INPUT_QUEUE_BLOCKS: usize = 32;

/// Default input device exposed as a mono media source.
///
/// The device callback runs on cpal's thread and hands mono blocks over a
/// bounded channel. Nothing pulls while the media is paused or the context
/// is suspended, so once the channel is full the callback drops blocks
/// instead of queueing them.
pub struct LiveInput {
    _stream: Stream,
    buffer: InputBuffer,
    sample_rate: u32,
}

impl LiveInput {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        let supported = device
            .default_input_config()
            .map_err(|e| anyhow::anyhow!("Failed to get default input config: {}", e))?;
        info!(
            "Capturing from '{}' ({}Hz, {} channels)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0,
            supported.channels()
        );

        let sample_rate = supported.sample_rate().0;
        let (sender, receiver) = crossbeam_channel::bounded(INPUT_QUEUE_BLOCKS);
        let dropped = Arc::new(AtomicUsize::new(0));
        let stream = open_capture(&device, &supported.into(), sender, Arc::clone(&dropped))?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            // Half a second; older input is dropped if nobody pulls.
            buffer: InputBuffer::new(receiver, dropped, sample_rate as usize / 2),
            sample_rate,
        })
    }
}

fn open_capture(
    device: &Device,
    config: &StreamConfig,
    sender: Sender<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if !forward_block(data, channels, &sender) {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        },
        |err| warn!("Capture stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Mix interleaved `data` down to mono and offer it to `sender` without
/// blocking. Returns false when the block was dropped.
fn forward_block(data: &[f32], channels: usize, sender: &Sender<Vec<f32>>) -> bool {
    let mono: Vec<f32> = match channels {
        0 => return false,
        1 => data.to_vec(),
        n => data
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    };
    // Full or disconnected: the block is lost either way.
    sender.try_send(mono).is_ok()
}

/// Receiving side of the capture channel, trimmed to a fixed backlog.
struct InputBuffer {
    receiver: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
    max_pending: usize,
    dropped: Arc<AtomicUsize>,
}

impl InputBuffer {
    fn new(receiver: Receiver<Vec<f32>>, dropped: Arc<AtomicUsize>, max_pending: usize) -> Self {
        Self {
            receiver,
            pending: VecDeque::new(),
            max_pending,
            dropped,
        }
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        self.pending.extend(self.receiver.try_iter().flatten());
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            debug!("Capture queue full, dropped {} blocks", dropped);
        }
        if self.pending.len() > self.max_pending {
            let excess = self.pending.len() - self.max_pending;
            self.pending.drain(..excess);
        }

        let n = self.pending.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(self.pending.drain(..n)) {
            *slot = sample;
        }
        n
    }
}

impl MediaSource for LiveInput {
    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        self.buffer.read(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_block_is_averaged_to_mono() {
        let (sender, receiver) = crossbeam_channel::bounded(4);
        assert!(forward_block(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, &sender));
        assert_eq!(receiver.try_recv().unwrap(), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_full_queue_drops_new_blocks() {
        let (sender, receiver) = crossbeam_channel::bounded(2);
        assert!(forward_block(&[0.1; 4], 1, &sender));
        assert!(forward_block(&[0.2; 4], 1, &sender));
        assert!(!forward_block(&[0.3; 4], 1, &sender));
        assert_eq!(receiver.len(), 2);

        drop(receiver);
        assert!(!forward_block(&[0.4; 4], 1, &sender));
    }

    #[test]
    fn test_backlog_is_trimmed_to_newest_samples() {
        let (sender, receiver) = crossbeam_channel::bounded(8);
        let dropped = Arc::new(AtomicUsize::new(3));
        let mut buffer = InputBuffer::new(receiver, Arc::clone(&dropped), 4);
        for value in [1.0, 2.0, 3.0] {
            assert!(forward_block(&[value; 2], 1, &sender));
        }

        let mut out = [0.0; 8];
        assert_eq!(buffer.read(&mut out), 4);
        assert_eq!(out[..4], [2.0, 2.0, 3.0, 3.0]);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
        assert_eq!(buffer.read(&mut out), 0);
    }
}
