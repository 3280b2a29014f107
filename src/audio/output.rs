use anyhow::Result;
use log::info;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};

/// Where the destination node sends rendered audio.
pub trait AudioOutput {
    fn write(&mut self, block: &[f32], channels: u16, sample_rate: u32);

    /// Frames written but not yet played.
    fn queued_frames(&self) -> usize;

    fn set_paused(&mut self, _paused: bool) {}
}

/// Speaker output through a rodio sink. Each rendered block is queued as
/// its own buffer; rodio resamples to the device rate.
pub struct RodioOutput {
    #[allow(dead_code)]
    stream: OutputStream,
    #[allow(dead_code)]
    stream_handle: OutputStreamHandle,
    sink: Sink,
    block_frames: usize,
}

impl RodioOutput {
    pub fn open() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        info!("Audio output stream opened");

        Ok(Self {
            stream,
            stream_handle,
            sink,
            block_frames: 0,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn write(&mut self, block: &[f32], channels: u16, sample_rate: u32) {
        if block.is_empty() || channels == 0 {
            return;
        }
        self.block_frames = block.len() / channels as usize;
        self.sink
            .append(SamplesBuffer::new(channels, sample_rate, block.to_vec()));
    }

    fn queued_frames(&self) -> usize {
        self.sink.len() * self.block_frames
    }

    fn set_paused(&mut self, paused: bool) {
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }
}

/// Discards audio; used headless and in tests.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn write(&mut self, _block: &[f32], _channels: u16, _sample_rate: u32) {}

    fn queued_frames(&self) -> usize {
        0
    }
}
