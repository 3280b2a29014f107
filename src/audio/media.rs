use anyhow::Result;
use log::info;
use rodio::{Decoder, Source};
use std::cell::{Ref, RefCell, RefMut};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;

/// Anything that can feed interleaved `f32` frames into the analysis graph.
pub trait MediaSource {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Copy up to `out.len()` interleaved samples; returns how many were written.
    fn read(&mut self, out: &mut [f32]) -> usize;

    fn ended(&self) -> bool {
        false
    }

    fn rewind(&mut self) {}
}

/// A fully decoded file held in memory with a play cursor.
pub struct DecodedMedia {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    position: usize,
}

impl DecodedMedia {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(&path)?);
        let source = Decoder::new(file)?;
        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let samples: Vec<f32> = source.convert_samples().collect();
        let media = Self::from_samples(samples, channels, sample_rate);

        info!(
            "Decoded {:?} ({}Hz, {} channels, {:.1}s)",
            path.as_ref(),
            sample_rate,
            channels,
            media.duration_seconds()
        );

        Ok(media)
    }

    pub fn from_samples(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            position: 0,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.channels as f32 / self.sample_rate as f32
    }
}

impl MediaSource for DecodedMedia {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = &self.samples[self.position.min(self.samples.len())..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }

    fn ended(&self) -> bool {
        self.position >= self.samples.len()
    }

    fn rewind(&mut self) {
        self.position = 0;
    }
}

/// A playable element: a source plus transport state and display metadata.
pub struct MediaElement {
    source: Option<Box<dyn MediaSource>>,
    paused: bool,
    title: String,
    artist: Option<String>,
    // Id of the audio context currently tapping this element, if any.
    tapped_by: Option<u32>,
}

impl MediaElement {
    pub fn new(source: Box<dyn MediaSource>, title: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            paused: true,
            title: title.into(),
            artist: None,
            tapped_by: None,
        }
    }

    /// Open a file; a stem of the form `Artist - Title` fills in both fields.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stem = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".to_string());
        let media = DecodedMedia::open(&path)?;
        Ok(match split_artist_title(&stem) {
            Some((artist, title)) => Self::new(Box::new(media), title).with_artist(artist),
            None => Self::new(Box::new(media), stem),
        })
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn play(&mut self) {
        if self.ended() {
            if let Some(source) = self.source.as_mut() {
                source.rewind();
            }
        }
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended()
    }

    pub fn ended(&self) -> bool {
        self.source.as_ref().map_or(true, |s| s.ended())
    }

    /// A released element, or one with no channels or rate, cannot be tapped.
    pub fn is_valid(&self) -> bool {
        self.source
            .as_ref()
            .map_or(false, |s| s.channels() > 0 && s.sample_rate() > 0)
    }

    pub fn format(&self) -> Option<(u16, u32)> {
        self.source.as_ref().map(|s| (s.channels(), s.sample_rate()))
    }

    /// Pull samples for the graph. Paused elements produce nothing.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        if self.paused {
            return 0;
        }
        self.source.as_mut().map_or(0, |s| s.read(out))
    }

    /// Drop the underlying source, as when the element is discarded.
    pub fn release(&mut self) {
        self.source = None;
        self.paused = true;
    }

    pub(crate) fn tapped_by(&self) -> Option<u32> {
        self.tapped_by
    }

    pub(crate) fn set_tapped_by(&mut self, context: Option<u32>) {
        self.tapped_by = context;
    }
}

fn split_artist_title(stem: &str) -> Option<(&str, &str)> {
    let (artist, title) = stem.split_once(" - ")?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist, title))
}

/// Shared, externally owned handle to a media element.
///
/// Everything runs on the UI thread, so the handle is `Rc<RefCell<_>>`.
/// Two handles refer to the same element when they share the allocation.
#[derive(Clone)]
pub struct MediaHandle(Rc<RefCell<MediaElement>>);

impl MediaHandle {
    pub fn new(element: MediaElement) -> Self {
        Self(Rc::new(RefCell::new(element)))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(MediaElement::open(path)?))
    }

    pub fn borrow(&self) -> Ref<'_, MediaElement> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, MediaElement> {
        self.0.borrow_mut()
    }

    pub fn same_element(&self, other: &MediaHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn play(&self) {
        self.0.borrow_mut().play();
    }

    pub fn pause(&self) {
        self.0.borrow_mut().pause();
    }

    pub fn is_playing(&self) -> bool {
        self.0.borrow().is_playing()
    }

    pub fn ended(&self) -> bool {
        self.0.borrow().ended()
    }

    pub fn title(&self) -> String {
        self.0.borrow().title().to_string()
    }

    pub fn artist(&self) -> Option<String> {
        self.0.borrow().artist().map(str::to_string)
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("title", &self.0.borrow().title)
            .finish()
    }
}
