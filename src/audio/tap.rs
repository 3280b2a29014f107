use crossbeam_channel::Receiver;
use log::{debug, info, warn};

use super::context::{AnalysisContext, ContextState, ResumeOutcome};
use super::filter::FilterKind;
use super::graph::NodeId;
use super::media::MediaHandle;
use super::output::{AudioOutput, NullOutput, RodioOutput};
use super::SnapshotDomain;
use crate::config::{FilterSettings, TapConfig};
use crate::error::TapError;

/// Opens the device the destination node plays into.
pub type OutputOpener = Box<dyn FnMut() -> anyhow::Result<Box<dyn AudioOutput>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unconnected,
    Connected,
    Severed,
}

/// Binding between one media element and the analysis graph.
#[derive(Debug)]
pub struct AudioLink {
    media: MediaHandle,
    source: Option<NodeId>,
    state: LinkState,
    bypassed: bool,
}

impl AudioLink {
    pub fn media(&self) -> &MediaHandle {
        &self.media
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Connected straight to the destination because the analysis path
    /// could not be attached. Audio plays, snapshots stay flat.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

/// Live tap into the playing audio.
///
/// Every graph operation is caught here and stored in `last_error`; the
/// public methods never fail across this boundary. Before `initialize`
/// (or after `teardown`) snapshots are empty, which callers read as
/// "no data yet".
pub struct SignalTap {
    config: TapConfig,
    open_output: OutputOpener,
    context: Option<AnalysisContext>,
    state_changes: Option<Receiver<ContextState>>,
    user_activation: bool,
    // Suspended on request; not undone by `poll_state_changes`.
    parked: bool,

    analyser: Option<NodeId>,
    gain: Option<NodeId>,
    filters: Vec<NodeId>,
    filter_settings: FilterSettings,
    link: Option<AudioLink>,

    frequency: Vec<u8>,
    time_domain: Vec<u8>,

    volume: f32,
    muted: bool,
    last_error: Option<TapError>,
}

impl SignalTap {
    /// Tap playing through the default output device.
    pub fn new(config: TapConfig) -> Self {
        Self::with_output(
            config,
            Box::new(|| -> anyhow::Result<Box<dyn AudioOutput>> { Ok(Box::new(RodioOutput::open()?)) }),
        )
    }

    /// Tap that renders into a discarding output.
    pub fn headless(config: TapConfig) -> Self {
        Self::with_output(
            config,
            Box::new(|| -> anyhow::Result<Box<dyn AudioOutput>> { Ok(Box::new(NullOutput)) }),
        )
    }

    pub fn with_output(config: TapConfig, open_output: OutputOpener) -> Self {
        Self {
            config,
            open_output,
            context: None,
            state_changes: None,
            user_activation: false,
            parked: false,
            analyser: None,
            gain: None,
            filters: Vec::new(),
            filter_settings: FilterSettings::default(),
            link: None,
            frequency: Vec::new(),
            time_domain: Vec::new(),
            volume: 1.0,
            muted: false,
            last_error: None,
        }
    }

    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&AnalysisContext> {
        self.context.as_ref()
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_ref().map(AnalysisContext::state)
    }

    pub fn is_ready(&self) -> bool {
        self.analyser.is_some() && matches!(self.context_state(), Some(s) if s != ContextState::Closed)
    }

    pub fn is_suspended(&self) -> bool {
        self.context_state() == Some(ContextState::Suspended)
    }

    pub fn link(&self) -> Option<&AudioLink> {
        self.link.as_ref()
    }

    pub fn last_error(&self) -> Option<&TapError> {
        self.last_error.as_ref()
    }

    fn record(&mut self, error: TapError) {
        warn!("{}", error);
        self.last_error = Some(error);
    }

    /// Create the graph if needed and try to start it. Safe to call on
    /// every user interaction; a resume that is still pending is not an
    /// error. Returns whether the tap is ready to serve snapshots.
    pub fn initialize(&mut self) -> bool {
        match self.try_initialize() {
            Ok(()) => true,
            Err(error) => {
                self.record(error);
                false
            }
        }
    }

    fn try_initialize(&mut self) -> Result<(), TapError> {
        if self.context.is_some() {
            self.resume_if_suspended();
            return Ok(());
        }

        let output = (self.open_output)().map_err(|e| TapError::InitializationFailure(e.to_string()))?;
        let mut ctx = AnalysisContext::new(output);
        let state_changes = ctx.subscribe();

        let analyser = ctx
            .create_analyser(
                self.config.fft_size,
                self.config.smoothing_time_constant,
                self.config.min_decibels,
                self.config.max_decibels,
            )
            .map_err(|e| TapError::InitializationFailure(e.to_string()))?;
        let gain = ctx.create_gain(self.effective_volume())?;
        let destination = ctx.destination();
        ctx.connect(analyser, gain)?;
        ctx.connect(gain, destination)?;

        if self.user_activation {
            ctx.grant_user_activation();
        }
        if ctx.resume()? == ResumeOutcome::Pending {
            info!("Audio context {} suspended until a user gesture", ctx.id());
        }

        let bins = self.config.frequency_bin_count();
        self.frequency = vec![0; bins];
        self.time_domain = vec![0; bins];
        self.analyser = Some(analyser);
        self.gain = Some(gain);
        self.state_changes = Some(state_changes);
        info!(
            "Signal tap initialized (fft {}, smoothing {:.2}, context {})",
            self.config.fft_size,
            self.config.smoothing_time_constant,
            ctx.id()
        );
        self.context = Some(ctx);
        self.last_error = None;
        Ok(())
    }

    /// Record a user gesture and retry a pending resume.
    pub fn grant_user_activation(&mut self) {
        self.user_activation = true;
        if let Some(ctx) = self.context.as_mut() {
            ctx.grant_user_activation();
        }
        self.resume_if_suspended();
    }

    /// Handle a play/pause gesture. The gesture that unlocks a suspended
    /// context starts playback instead of toggling it. Returns whether the
    /// media is playing afterwards.
    pub fn play_pause_gesture(&mut self, media: &MediaHandle) -> bool {
        let unlocking = !self.user_activation || self.is_suspended();
        self.grant_user_activation();
        if unlocking || !media.is_playing() {
            media.play();
        } else {
            media.pause();
        }
        media.is_playing()
    }

    /// Park the context, e.g. while the window is hidden. A later
    /// `resume_if_suspended` picks it back up.
    pub fn suspend(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.suspend();
            self.parked = true;
        }
    }

    /// Best-effort, non-blocking resume.
    pub fn resume_if_suspended(&mut self) {
        self.parked = false;
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        if ctx.state() != ContextState::Suspended {
            return;
        }
        if let Err(error) = ctx.resume() {
            self.record(TapError::InitializationFailure(error.to_string()));
        }
    }

    /// Drain context state notifications, returning the latest one. A
    /// context that went back to suspended on its own after the user
    /// already unlocked audio is resumed straight away.
    pub fn poll_state_changes(&mut self) -> Option<ContextState> {
        let receiver = self.state_changes.as_ref()?;
        let latest = receiver.try_iter().last();
        if let Some(state) = latest {
            debug!("Audio context state changed to {:?}", state);
            if state == ContextState::Suspended && self.user_activation && !self.parked {
                self.resume_if_suspended();
            }
        }
        latest
    }

    /// Bind `media` as the signal source, severing any previous link first.
    pub fn connect(&mut self, media: &MediaHandle) -> bool {
        match self.try_connect(media) {
            Ok(()) => true,
            Err(error) => {
                self.record(error);
                false
            }
        }
    }

    fn try_connect(&mut self, media: &MediaHandle) -> Result<(), TapError> {
        if self.context.is_none() {
            return Err(TapError::ConnectionFailure(
                "analysis context is not initialized".to_string(),
            ));
        }
        self.sever();

        let Some(ctx) = self.context.as_mut() else {
            return Err(TapError::ConnectionFailure(
                "analysis context is not initialized".to_string(),
            ));
        };
        let source = ctx.create_media_source(media)?;
        self.link = Some(AudioLink {
            media: media.clone(),
            source: Some(source),
            state: LinkState::Unconnected,
            bypassed: false,
        });

        let wired = self.wire_source();
        if let Err(error) = wired {
            self.bypass(source)?;
            return Err(TapError::ConnectionFailure(format!(
                "analysis path unavailable, playing without analysis: {}",
                error
            )));
        }
        if let Some(link) = self.link.as_mut() {
            link.state = LinkState::Connected;
        }

        info!("Connected '{}' to the signal tap", media.title());
        Ok(())
    }

    /// Route the source straight to the destination so playback survives a
    /// failed analysis attachment.
    fn bypass(&mut self, source: NodeId) -> Result<(), TapError> {
        let Some(ctx) = self.context.as_mut() else {
            return Ok(());
        };
        ctx.disconnect(source);
        for id in self.filters.drain(..) {
            ctx.remove_node(id)?;
        }
        let destination = ctx.destination();
        ctx.connect(source, destination)?;
        if let Some(link) = self.link.as_mut() {
            link.state = LinkState::Connected;
            link.bypassed = true;
        }
        Ok(())
    }

    /// (Re)build `source -> [high-pass] -> [low-pass] -> analyser`.
    fn wire_source(&mut self) -> Result<(), TapError> {
        let (Some(ctx), Some(analyser)) = (self.context.as_mut(), self.analyser) else {
            return Err(TapError::InitializationFailure("analyser node is missing".to_string()));
        };
        let Some(source) = self.link.as_ref().and_then(|link| link.source) else {
            return Ok(());
        };

        ctx.disconnect(source);
        for id in self.filters.drain(..) {
            ctx.remove_node(id)?;
        }

        let settings = self.filter_settings;
        if let Some(hz) = settings.highpass_hz {
            self.filters.push(ctx.create_filter(FilterKind::HighPass, hz, settings.q)?);
        }
        if let Some(hz) = settings.lowpass_hz {
            self.filters.push(ctx.create_filter(FilterKind::LowPass, hz, settings.q)?);
        }

        let mut previous = source;
        for &filter in &self.filters {
            ctx.connect(previous, filter)?;
            previous = filter;
        }
        ctx.connect(previous, analyser)?;
        Ok(())
    }

    fn sever(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if link.state == LinkState::Severed {
            return;
        }

        if let Some(ctx) = self.context.as_mut() {
            for id in self.filters.drain(..) {
                if let Err(error) = ctx.remove_node(id) {
                    debug!("Filter {} already gone: {}", id, error);
                }
            }
            if let Some(source) = link.source.take() {
                if let Err(error) = ctx.remove_node(source) {
                    debug!("Source {} already gone: {}", source, error);
                }
            }
        }
        self.filters.clear();
        link.state = LinkState::Severed;
        info!("Severed link to '{}'", link.media.title());
    }

    /// Insert or remove the low/high-pass stages ahead of the analyser.
    pub fn set_filters(&mut self, settings: FilterSettings) {
        self.filter_settings = settings;
        let rewire = self
            .link
            .as_ref()
            .map_or(false, |l| l.state == LinkState::Connected && !l.bypassed);
        if rewire {
            if let Err(error) = self.wire_source() {
                self.record(error);
            }
        }
    }

    pub fn filter_settings(&self) -> FilterSettings {
        self.filter_settings
    }

    pub fn frequency_snapshot(&mut self) -> &[u8] {
        if let (Some(ctx), Some(id)) = (self.context.as_mut(), self.analyser) {
            if let Some(node) = ctx.analyser_mut(id) {
                node.get_byte_frequency_data(&mut self.frequency);
            }
        }
        &self.frequency
    }

    pub fn time_domain_snapshot(&mut self) -> &[u8] {
        if let (Some(ctx), Some(id)) = (self.context.as_ref(), self.analyser) {
            if let Some(node) = ctx.analyser(id) {
                node.get_byte_time_domain_data(&mut self.time_domain);
            }
        }
        &self.time_domain
    }

    pub fn snapshot(&mut self, domain: SnapshotDomain) -> &[u8] {
        match domain {
            SnapshotDomain::Frequency => self.frequency_snapshot(),
            SnapshotDomain::TimeDomain => self.time_domain_snapshot(),
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    fn apply_gain(&mut self) {
        let target = self.effective_volume();
        let ramp = self.config.volume_ramp_seconds;
        if let (Some(ctx), Some(id)) = (self.context.as_mut(), self.gain) {
            if let Some(gain) = ctx.gain_mut(id) {
                gain.linear_ramp_to(target, ramp);
            }
        }
    }

    /// Clamp to [0, 1] and ramp the gain node there. NaN is ignored.
    pub fn set_volume(&mut self, level: f32) {
        if level.is_nan() {
            return;
        }
        self.volume = level.clamp(0.0, 1.0);
        self.apply_gain();
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_gain();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Render `frames` frames of audio through the graph.
    pub fn pump(&mut self, frames: usize) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.render(frames);
        }
    }

    /// Render just enough to keep the output queue at the configured latency.
    pub fn pump_to_latency(&mut self) {
        let queued = self.context.as_ref().map_or(0, AnalysisContext::queued_frames);
        let deficit = self.config.output_latency_frames.saturating_sub(queued);
        if deficit > 0 {
            self.pump(deficit);
        }
    }

    /// Sever the link, close the context and drop the buffers. Idempotent,
    /// and fine to call before `initialize` ever succeeded.
    pub fn teardown(&mut self) {
        self.sever();
        if let Some(mut ctx) = self.context.take() {
            ctx.close();
            info!("Signal tap torn down (context {})", ctx.id());
        }
        self.analyser = None;
        self.gain = None;
        self.filters.clear();
        self.state_changes = None;
        self.frequency = Vec::new();
        self.time_domain = Vec::new();
    }
}

impl Drop for SignalTap {
    fn drop(&mut self) {
        self.teardown();
    }
}
