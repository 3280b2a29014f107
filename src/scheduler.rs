use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::audio::{compute_band_metrics, BandMetrics, SignalTap, SnapshotDomain};
use crate::config::RenderOptions;
use crate::render::{Surface, VisualizationMode};

/// Anything that can hand out analyser snapshots to the frame loop.
pub trait SnapshotSource {
    fn snapshot(&mut self, domain: SnapshotDomain) -> &[u8];
    fn is_ready(&self) -> bool;
    fn is_suspended(&self) -> bool;
    fn resume_if_suspended(&mut self);
}

impl SnapshotSource for SignalTap {
    fn snapshot(&mut self, domain: SnapshotDomain) -> &[u8] {
        SignalTap::snapshot(self, domain)
    }

    fn is_ready(&self) -> bool {
        SignalTap::is_ready(self)
    }

    fn is_suspended(&self) -> bool {
        SignalTap::is_suspended(self)
    }

    fn resume_if_suspended(&mut self) {
        SignalTap::resume_if_suspended(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Source of display-refresh callbacks.
pub trait FrameClock {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlSignal {
    Playback(bool),
    Mode(VisualizationMode),
    Resized { width: f32, height: f32, scale_factor: f32 },
}

/// Sending half of the scheduler's control channel.
#[derive(Debug, Clone)]
pub struct SchedulerControls {
    sender: Sender<ControlSignal>,
}

impl SchedulerControls {
    pub fn send(&self, signal: ControlSignal) {
        // A closed channel means the scheduler is gone; nothing left to steer.
        let _ = self.sender.send(signal);
    }

    pub fn set_playing(&self, playing: bool) {
        self.send(ControlSignal::Playback(playing));
    }

    pub fn set_mode(&self, mode: VisualizationMode) {
        self.send(ControlSignal::Mode(mode));
    }

    pub fn resize(&self, width: f32, height: f32, scale_factor: f32) {
        self.send(ControlSignal::Resized { width, height, scale_factor });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    ReadyPaused,
    ReadyRunning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub ticks: u64,
    pub pulls: u64,
    pub renders: u64,
    pub resumes: u64,
}

/// Per-frame orchestration of snapshot pulls, band metrics and painting.
///
/// Every tick drains the control channel first, so playback, mode and
/// resize changes all land before anything is painted. While running, a
/// tick does exactly one pull and one draw. While paused or idle it does
/// neither but still books the next tick, keeping the loop hot.
pub struct FrameScheduler<C: FrameClock> {
    clock: C,
    pending: Option<FrameToken>,
    sender: Sender<ControlSignal>,
    controls: Receiver<ControlSignal>,
    state: SchedulerState,
    playing: bool,
    mode: VisualizationMode,
    options: RenderOptions,
    surface: Surface,
    rng: Pcg32,
    metrics: BandMetrics,
    stats: FrameStats,
    torn_down: bool,
}

impl<C: FrameClock> FrameScheduler<C> {
    pub fn new(clock: C, surface: Surface, options: RenderOptions, mode: VisualizationMode) -> Self {
        let (sender, controls) = unbounded();
        Self {
            clock,
            pending: None,
            sender,
            controls,
            state: SchedulerState::Idle,
            playing: false,
            mode,
            options,
            surface,
            rng: Pcg32::seed_from_u64(rand::random()),
            metrics: BandMetrics::default(),
            stats: FrameStats::default(),
            torn_down: false,
        }
    }

    /// Replace the particle RNG with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Pcg32::seed_from_u64(seed);
        self
    }

    pub fn controls(&self) -> SchedulerControls {
        SchedulerControls { sender: self.sender.clone() }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn metrics(&self) -> BandMetrics {
        self.metrics
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    /// Book the first tick. No-op after teardown or while a tick is pending.
    pub fn start(&mut self) {
        if self.torn_down || self.pending.is_some() {
            return;
        }
        self.pending = Some(self.clock.request_frame());
        info!("Frame loop started in {} mode", self.mode);
    }

    /// Run the pending tick. Returns whether anything was painted.
    ///
    /// Without a pending tick (never started, cancelled, or torn down) this
    /// does nothing at all.
    pub fn on_frame<S: SnapshotSource + ?Sized>(&mut self, source: &mut S) -> bool {
        if self.pending.take().is_none() {
            return false;
        }
        self.stats.ticks += 1;
        self.apply_controls();

        self.state = match (source.is_ready(), self.playing) {
            (false, _) => SchedulerState::Idle,
            (true, false) => SchedulerState::ReadyPaused,
            (true, true) => SchedulerState::ReadyRunning,
        };

        let painted = self.state == SchedulerState::ReadyRunning;
        if painted {
            if source.is_suspended() {
                source.resume_if_suspended();
                self.stats.resumes += 1;
            }

            let strategy = self.mode.strategy();
            let domain = strategy.domain(&self.options);
            let data = source.snapshot(domain);
            self.stats.pulls += 1;
            if domain == SnapshotDomain::Frequency {
                self.metrics = compute_band_metrics(data);
            }
            strategy.draw(&mut self.surface, data, &self.options, &mut self.rng);
            self.stats.renders += 1;
        }

        if self.stats.ticks % 120 == 0 {
            debug!(
                "Frame {}: {:?}, {} renders, bass {:.2} mid {:.2} treble {:.2}",
                self.stats.ticks,
                self.state,
                self.stats.renders,
                self.metrics.bass,
                self.metrics.mid,
                self.metrics.treble
            );
        }

        self.pending = Some(self.clock.request_frame());
        painted
    }

    fn apply_controls(&mut self) {
        while let Ok(signal) = self.controls.try_recv() {
            match signal {
                ControlSignal::Playback(playing) => self.playing = playing,
                ControlSignal::Mode(mode) => {
                    if mode != self.mode {
                        info!("Visualization mode: {} -> {}", self.mode, mode);
                        self.mode = mode;
                    }
                }
                ControlSignal::Resized { width, height, scale_factor } => {
                    if self.surface.resize(width, height, scale_factor) {
                        debug!("Surface resized to {}x{} @ {}", width, height, scale_factor);
                    }
                }
            }
        }
    }

    /// Cancel the pending tick; every later `on_frame` is a no-op.
    pub fn teardown(&mut self) {
        if let Some(token) = self.pending.take() {
            self.clock.cancel_frame(token);
        }
        if !self.torn_down {
            self.torn_down = true;
            info!("Frame loop stopped after {} ticks", self.stats.ticks);
        }
    }
}

impl<C: FrameClock> Drop for FrameScheduler<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TapConfig, WaveformStyle};

    #[derive(Default)]
    struct ManualClock {
        next: u64,
        requested: Vec<FrameToken>,
        cancelled: Vec<FrameToken>,
    }

    impl FrameClock for ManualClock {
        fn request_frame(&mut self) -> FrameToken {
            self.next += 1;
            let token = FrameToken(self.next);
            self.requested.push(token);
            token
        }

        fn cancel_frame(&mut self, token: FrameToken) {
            self.cancelled.push(token);
        }
    }

    struct FakeSource {
        ready: bool,
        suspended: bool,
        buffer: Vec<u8>,
        pulls: Vec<SnapshotDomain>,
        resumes: usize,
    }

    impl FakeSource {
        fn ready(buffer: Vec<u8>) -> Self {
            Self {
                ready: true,
                suspended: false,
                buffer,
                pulls: Vec::new(),
                resumes: 0,
            }
        }
    }

    impl SnapshotSource for FakeSource {
        fn snapshot(&mut self, domain: SnapshotDomain) -> &[u8] {
            self.pulls.push(domain);
            &self.buffer
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        fn resume_if_suspended(&mut self) {
            self.resumes += 1;
        }
    }

    fn scheduler() -> FrameScheduler<ManualClock> {
        FrameScheduler::new(
            ManualClock::default(),
            Surface::new(64.0, 32.0, 1.0),
            RenderOptions::default(),
            VisualizationMode::Bars,
        )
        .with_seed(5)
    }

    #[test]
    fn test_paused_does_no_work_but_keeps_ticking() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![200; 16]);
        scheduler.start();

        for _ in 0..10 {
            assert!(!scheduler.on_frame(&mut source));
        }
        assert_eq!(scheduler.state(), SchedulerState::ReadyPaused);
        assert!(source.pulls.is_empty());
        assert_eq!(scheduler.stats().renders, 0);
        assert_eq!(scheduler.clock().requested.len(), 11);
    }

    #[test]
    fn test_running_pulls_and_renders_once_per_tick() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![200; 16]);
        scheduler.controls().set_playing(true);
        scheduler.start();

        for tick in 1..=5u64 {
            assert!(scheduler.on_frame(&mut source));
            assert_eq!(source.pulls.len() as u64, tick);
            assert_eq!(scheduler.stats().renders, tick);
        }
        assert_eq!(scheduler.state(), SchedulerState::ReadyRunning);
        assert!(source.pulls.iter().all(|&d| d == SnapshotDomain::Frequency));
    }

    #[test]
    fn test_playback_toggle_picked_up_within_one_tick() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![10; 16]);
        let controls = scheduler.controls();
        scheduler.start();

        assert!(!scheduler.on_frame(&mut source));
        controls.set_playing(true);
        assert!(scheduler.on_frame(&mut source));
        controls.set_playing(false);
        assert!(!scheduler.on_frame(&mut source));
        assert_eq!(source.pulls.len(), 1);
    }

    #[test]
    fn test_idle_until_source_ready() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(Vec::new());
        source.ready = false;
        scheduler.controls().set_playing(true);
        scheduler.start();

        assert!(!scheduler.on_frame(&mut source));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        source.ready = true;
        assert!(scheduler.on_frame(&mut source));
        assert_eq!(scheduler.state(), SchedulerState::ReadyRunning);
    }

    #[test]
    fn test_mode_switch_applies_on_next_tick() {
        let mut scheduler = scheduler();
        scheduler.set_options(RenderOptions {
            waveform_style: WaveformStyle::Literal,
            ..RenderOptions::default()
        });
        let mut source = FakeSource::ready(vec![128; 16]);
        let controls = scheduler.controls();
        controls.set_playing(true);
        scheduler.start();

        scheduler.on_frame(&mut source);
        controls.set_mode(VisualizationMode::Waveform);
        assert_eq!(scheduler.mode(), VisualizationMode::Bars);
        scheduler.on_frame(&mut source);

        assert_eq!(scheduler.mode(), VisualizationMode::Waveform);
        assert_eq!(source.pulls, vec![SnapshotDomain::Frequency, SnapshotDomain::TimeDomain]);
    }

    #[test]
    fn test_bars_to_radial_repaints_on_next_tick() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![255; 16]);
        let controls = scheduler.controls();
        let background = crate::render::Rgba::from(scheduler.options().background);
        controls.set_playing(true);
        scheduler.start();

        assert!(scheduler.on_frame(&mut source));
        // Bars fill up from the bottom edge; the space above centre stays clear.
        assert_ne!(scheduler.surface().pixel(1, 31), Some(background));
        assert_eq!(scheduler.surface().pixel(32, 4), Some(background));

        controls.set_mode(VisualizationMode::Radial);
        assert!(scheduler.on_frame(&mut source));
        assert_eq!(scheduler.mode(), VisualizationMode::Radial);
        // The first spike points straight up from the centre; the corner is clear.
        assert_ne!(scheduler.surface().pixel(32, 4), Some(background));
        assert_eq!(scheduler.surface().pixel(1, 31), Some(background));
        assert_eq!(source.pulls, vec![SnapshotDomain::Frequency, SnapshotDomain::Frequency]);
    }

    #[test]
    fn test_resize_lands_before_paint() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![255; 8]);
        let controls = scheduler.controls();
        controls.set_playing(true);
        controls.resize(100.0, 50.0, 2.0);
        scheduler.start();

        assert!(scheduler.on_frame(&mut source));
        assert_eq!(scheduler.surface().physical_size(), (200, 100));
        // The full-height bar reaches the bottom row of the new buffer.
        let background = crate::render::Rgba::from(scheduler.options().background);
        assert_ne!(scheduler.surface().pixel(5, 99), Some(background));
    }

    #[test]
    fn test_metrics_follow_frequency_pulls() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![255; 10]);
        scheduler.controls().set_playing(true);
        scheduler.start();

        scheduler.on_frame(&mut source);
        assert_eq!(scheduler.metrics().peak, 1.0);

        source.buffer = vec![0; 10];
        scheduler.on_frame(&mut source);
        assert_eq!(scheduler.metrics(), BandMetrics::default());
    }

    #[test]
    fn test_suspended_source_is_resumed_without_skipping_frame() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![50; 16]);
        source.suspended = true;
        scheduler.controls().set_playing(true);
        scheduler.start();

        assert!(scheduler.on_frame(&mut source));
        assert!(scheduler.on_frame(&mut source));
        assert_eq!(source.resumes, 2);
        assert_eq!(scheduler.stats().resumes, 2);
        assert_eq!(source.pulls.len(), 2);
    }

    #[test]
    fn test_teardown_cancels_pending_tick() {
        let mut scheduler = scheduler();
        let mut source = FakeSource::ready(vec![50; 16]);
        scheduler.controls().set_playing(true);
        scheduler.start();
        scheduler.on_frame(&mut source);

        scheduler.teardown();
        assert!(!scheduler.has_pending_frame());
        assert_eq!(scheduler.clock().cancelled, vec![FrameToken(2)]);

        for _ in 0..3 {
            assert!(!scheduler.on_frame(&mut source));
        }
        scheduler.start();
        assert!(!scheduler.has_pending_frame());
        assert_eq!(source.pulls.len(), 1);

        scheduler.teardown();
        assert_eq!(scheduler.clock().cancelled.len(), 1);
    }

    #[test]
    fn test_drives_headless_tap() {
        let mut tap = SignalTap::headless(TapConfig::visual());
        let mut scheduler = scheduler();
        scheduler.controls().set_playing(true);
        scheduler.start();

        // Not initialized yet: nothing to pull.
        assert!(!scheduler.on_frame(&mut tap));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert!(tap.initialize());
        assert!(scheduler.on_frame(&mut tap));
        assert_eq!(tap.frequency_snapshot().len(), 128);
        assert_eq!(scheduler.metrics(), BandMetrics::default());
    }

    #[test]
    fn test_running_tick_wakes_parked_tap() {
        let mut tap = SignalTap::headless(TapConfig::visual());
        tap.grant_user_activation();
        assert!(tap.initialize());
        tap.suspend();
        assert!(tap.is_suspended());

        let mut scheduler = scheduler();
        scheduler.controls().set_playing(true);
        scheduler.start();
        assert!(scheduler.on_frame(&mut tap));
        assert_eq!(scheduler.stats().resumes, 1);
        assert!(!tap.is_suspended());
    }
}
