use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    event::{ElementState, Event, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use spectral_player::audio::{LiveInput, MediaElement, MediaHandle, SignalTap};
use spectral_player::config::{FilterSettings, RenderOptions, TapConfig};
use spectral_player::graphics::GraphicsEngine;
use spectral_player::render::{Surface, VisualizationMode};
use spectral_player::scheduler::{FrameClock, FrameScheduler, FrameToken, SchedulerControls};
use spectral_player::ui::{OverlayModel, UiAction, UserInterface};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// 2048-point transform, 1024 bins
    Analysis,
    /// 256-point transform, 128 bins
    Visual,
}

#[derive(Parser, Debug)]
#[command(name = "spectral-player")]
#[command(about = "Audio player with a live spectrum visualizer")]
struct Args {
    /// Audio files to play in order (WAV, MP3, OGG, FLAC)
    files: Vec<PathBuf>,

    /// Visualization mode
    #[arg(long, short, value_enum, default_value_t = VisualizationMode::Bars)]
    mode: VisualizationMode,

    /// Output volume (0.0 - 1.0)
    #[arg(long, default_value = "0.8")]
    volume: f32,

    /// Analyser resolution
    #[arg(long, value_enum, default_value_t = Profile::Analysis)]
    profile: Profile,

    /// Visualize the default input device instead of files
    #[arg(long)]
    input: bool,

    /// JSON file overriding render options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Low-pass cutoff ahead of the analyser, in Hz
    #[arg(long)]
    lowpass: Option<f32>,

    /// High-pass cutoff ahead of the analyser, in Hz
    #[arg(long)]
    highpass: Option<f32>,
}

/// Ticks are driven by winit redraw requests.
struct WindowClock {
    window: Arc<Window>,
    next: u64,
}

impl FrameClock for WindowClock {
    fn request_frame(&mut self) -> FrameToken {
        self.next += 1;
        self.window.request_redraw();
        FrameToken(self.next)
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        // winit cannot retract a redraw request; the scheduler ignores the
        // stale event instead.
        debug!("Cancelled frame {:?}", token);
    }
}

struct Playlist {
    files: Vec<PathBuf>,
    index: usize,
}

impl Playlist {
    /// Open the track at `index`, skipping files that fail to decode.
    fn open_from(&mut self, index: usize, forward: bool) -> Option<MediaHandle> {
        let len = self.files.len();
        for attempt in 0..len {
            let i = if forward {
                (index + attempt) % len
            } else {
                (index % len + len - attempt) % len
            };
            match MediaHandle::open(&self.files[i]) {
                Ok(media) => {
                    self.index = i;
                    info!("Track {}/{}: {}", i + 1, len, media.title());
                    return Some(media);
                }
                Err(e) => warn!("Skipping {}: {:#}", self.files[i].display(), e),
            }
        }
        None
    }

    fn next(&mut self) -> Option<MediaHandle> {
        if self.files.is_empty() {
            return None;
        }
        self.open_from(self.index + 1, true)
    }

    fn previous(&mut self) -> Option<MediaHandle> {
        if self.files.is_empty() {
            return None;
        }
        self.open_from(self.index + self.files.len() - 1, false)
    }
}

/// Swap the playing element, carrying over play state, and re-bind the tap.
fn change_track(tap: &mut SignalTap, current: &mut Option<MediaHandle>, next: MediaHandle) {
    let was_playing = current.as_ref().map_or(true, MediaHandle::is_playing);
    if let Some(old) = current.take() {
        old.pause();
    }
    if !tap.connect(&next) {
        warn!("Playing '{}' without visualization", next.title());
    }
    if was_playing {
        next.play();
    }
    *current = Some(next);
}

fn toggle_playback(tap: &mut SignalTap, media: Option<&MediaHandle>) {
    match media {
        Some(media) => {
            if tap.play_pause_gesture(media) {
                info!("Playing");
            } else {
                info!("Paused");
            }
        }
        // Still counts as a user gesture.
        None => tap.grant_user_activation(),
    }
}

fn overlay_model(tap: &SignalTap, media: Option<&MediaHandle>, scheduler: &FrameScheduler<WindowClock>) -> OverlayModel {
    let status = if let Some(error) = tap.last_error() {
        Some(error.to_string())
    } else if tap.is_suspended() {
        Some("Audio suspended, press Space to start".to_string())
    } else {
        None
    };
    OverlayModel {
        title: media.map(MediaHandle::title).unwrap_or_default(),
        artist: media.and_then(MediaHandle::artist),
        playing: media.map_or(false, MediaHandle::is_playing),
        metrics: scheduler.metrics(),
        mode: Some(scheduler.mode()),
        volume: tap.volume(),
        muted: tap.is_muted(),
        status,
    }
}

fn apply_action(
    action: UiAction,
    tap: &mut SignalTap,
    playlist: &mut Playlist,
    current: &mut Option<MediaHandle>,
    controls: &SchedulerControls,
) {
    match action {
        UiAction::TogglePlayback => toggle_playback(tap, current.as_ref()),
        UiAction::NextTrack => {
            if let Some(next) = playlist.next() {
                change_track(tap, current, next);
            }
        }
        UiAction::PreviousTrack => {
            if let Some(previous) = playlist.previous() {
                change_track(tap, current, previous);
            }
        }
        UiAction::SetMode(mode) => controls.set_mode(mode),
        UiAction::SetVolume(level) => tap.set_volume(level),
        UiAction::SetMuted(muted) => tap.set_muted(muted),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.files.is_empty() && !args.input {
        anyhow::bail!("Nothing to play: pass audio files or --input");
    }

    let options = match &args.options {
        Some(path) => RenderOptions::load(path)?,
        None => RenderOptions::default(),
    };
    let config = match args.profile {
        Profile::Analysis => TapConfig::analysis(),
        Profile::Visual => TapConfig::visual(),
    };

    info!("Starting Spectral Player");
    info!("Mode: {}, profile: {:?}, fft size: {}", args.mode, args.profile, config.fft_size);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Spectral Player")
            .with_inner_size(winit::dpi::LogicalSize::new(1200, 800))
            .build(&event_loop)?,
    );

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(Arc::clone(&window)))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);

    let mut tap = SignalTap::new(config);
    tap.set_filters(FilterSettings {
        highpass_hz: args.highpass,
        lowpass_hz: args.lowpass,
        ..FilterSettings::default()
    });
    tap.set_volume(args.volume);
    if !tap.initialize() {
        warn!("Signal tap unavailable, visualizer will stay blank");
    }

    let mut playlist = Playlist {
        files: args.files.clone(),
        index: 0,
    };
    let mut current = if args.input {
        // Monitoring a microphone through the speakers would feed back.
        tap.set_muted(true);
        let live = LiveInput::open()?;
        Some(MediaHandle::new(MediaElement::new(Box::new(live), "Live input")))
    } else {
        playlist.open_from(0, true)
    };
    match &current {
        Some(media) => {
            tap.connect(media);
            media.play();
        }
        None => anyhow::bail!("None of the given files could be opened"),
    }

    let scale_factor = window.scale_factor() as f32;
    let size = window.inner_size();
    let surface = Surface::new(
        size.width as f32 / scale_factor,
        size.height as f32 / scale_factor,
        scale_factor,
    );
    let clock = WindowClock {
        window: Arc::clone(&window),
        next: 0,
    };
    let mut scheduler = FrameScheduler::new(clock, surface, options, args.mode);
    let controls = scheduler.controls();
    let mut was_playing = None;
    scheduler.start();

    info!("Player initialized; press Space to start audio");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => {
                if ui.handle_event(&event, &window_clone) {
                    return;
                }
                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested - cleaning up...");
                        scheduler.teardown();
                        tap.teardown();
                        elwt.exit();
                    }
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => tap.grant_user_activation(),
                    WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                        let action = match event.physical_key {
                            PhysicalKey::Code(KeyCode::Escape) => {
                                info!("Escape pressed - cleaning up...");
                                scheduler.teardown();
                                tap.teardown();
                                elwt.exit();
                                None
                            }
                            PhysicalKey::Code(KeyCode::Space) => Some(UiAction::TogglePlayback),
                            PhysicalKey::Code(KeyCode::KeyN) => Some(UiAction::NextTrack),
                            PhysicalKey::Code(KeyCode::KeyP) => Some(UiAction::PreviousTrack),
                            PhysicalKey::Code(KeyCode::KeyM) => Some(UiAction::SetMuted(!tap.is_muted())),
                            PhysicalKey::Code(KeyCode::ArrowUp) => Some(UiAction::SetVolume(tap.volume() + 0.05)),
                            PhysicalKey::Code(KeyCode::ArrowDown) => Some(UiAction::SetVolume(tap.volume() - 0.05)),
                            PhysicalKey::Code(KeyCode::Tab) => Some(UiAction::SetMode(scheduler.mode().next())),
                            PhysicalKey::Code(KeyCode::Digit1) => Some(UiAction::SetMode(VisualizationMode::Bars)),
                            PhysicalKey::Code(KeyCode::Digit2) => Some(UiAction::SetMode(VisualizationMode::Waveform)),
                            PhysicalKey::Code(KeyCode::Digit3) => Some(UiAction::SetMode(VisualizationMode::Radial)),
                            PhysicalKey::Code(KeyCode::Digit4) => Some(UiAction::SetMode(VisualizationMode::Particles)),
                            PhysicalKey::Code(KeyCode::F1) => {
                                ui.toggle();
                                None
                            }
                            _ => None,
                        };
                        if let Some(action) = action {
                            apply_action(action, &mut tap, &mut playlist, &mut current, &controls);
                        }
                    }
                    WindowEvent::Occluded(true) => {
                        if !current.as_ref().map_or(false, MediaHandle::is_playing) {
                            debug!("Window hidden while idle, suspending audio");
                            tap.suspend();
                        }
                    }
                    WindowEvent::Occluded(false) => tap.resume_if_suspended(),
                    WindowEvent::Resized(physical_size) => {
                        graphics_engine.resize(physical_size);
                        let scale = window_clone.scale_factor() as f32;
                        controls.resize(
                            physical_size.width as f32 / scale,
                            physical_size.height as f32 / scale,
                            scale,
                        );
                    }
                    WindowEvent::RedrawRequested => {
                        scheduler.on_frame(&mut tap);

                        let model = overlay_model(&tap, current.as_ref(), &scheduler);
                        let mut actions = Vec::new();
                        let result = graphics_engine.render(scheduler.surface(), |device, queue, encoder, view, size| {
                            actions = ui.render(encoder, view, device, queue, &window_clone, size, &model)?;
                            Ok(())
                        });
                        if let Err(e) = result {
                            error!("Render error: {}", e);
                        }
                        for action in actions {
                            apply_action(action, &mut tap, &mut playlist, &mut current, &controls);
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                tap.pump_to_latency();
                if let Some(state) = tap.poll_state_changes() {
                    info!("Audio context is now {:?}", state);
                }

                let finished = current
                    .as_ref()
                    .map_or(false, |media| media.ended() && !media.borrow().is_paused());
                if finished {
                    info!("Track finished");
                    if let Some(media) = &current {
                        media.pause();
                    }
                    // The playlist wraps around.
                    if let Some(next) = playlist.next() {
                        change_track(&mut tap, &mut current, next);
                        if let Some(media) = &current {
                            media.play();
                        }
                    }
                }

                let playing = current.as_ref().map_or(false, MediaHandle::is_playing);
                if was_playing != Some(playing) {
                    controls.set_playing(playing);
                    was_playing = Some(playing);
                }

                elwt.set_control_flow(ControlFlow::WaitUntil(Instant::now() + Duration::from_millis(10)));
            }
            _ => {}
        }
    })?;

    Ok(())
}
