use anyhow::Result;
use egui_wgpu::Renderer;
use egui_winit::State;
use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::{event::WindowEvent, window::Window};

use crate::audio::BandMetrics;
use crate::graphics::GraphicsEngine;
use crate::render::VisualizationMode;

/// Everything the overlay shows for one frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayModel {
    pub title: String,
    pub artist: Option<String>,
    pub playing: bool,
    pub metrics: BandMetrics,
    pub mode: Option<VisualizationMode>,
    pub volume: f32,
    pub muted: bool,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    TogglePlayback,
    NextTrack,
    PreviousTrack,
    SetMode(VisualizationMode),
    SetVolume(f32),
    SetMuted(bool),
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_controls: bool,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );

        let renderer = Renderer::new(&graphics_engine.device, graphics_engine.config.format, None, 1);

        Self {
            context,
            state: egui_state,
            renderer,
            show_controls: true,
        }
    }

    /// Returns whether egui consumed the event.
    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn toggle(&mut self) {
        self.show_controls = !self.show_controls;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        size_in_pixels: [u32; 2],
        model: &OverlayModel,
    ) -> Result<Vec<UiAction>> {
        let raw_input = self.state.take_egui_input(window);

        let show_controls = self.show_controls;
        let mut actions = Vec::new();
        let full_output = self.context.run(raw_input, |ctx| {
            if show_controls {
                actions = Self::ui_content(ctx, model);
            }
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(actions)
    }

    fn ui_content(ctx: &egui::Context, model: &OverlayModel) -> Vec<UiAction> {
        let mut actions = Vec::new();

        egui::Window::new("Now Playing")
            .default_pos([10.0, 10.0])
            .default_width(260.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading(if model.title.is_empty() { "No track" } else { model.title.as_str() });
                if let Some(artist) = &model.artist {
                    ui.label(artist);
                }

                ui.horizontal(|ui| {
                    if ui.button("Prev").clicked() {
                        actions.push(UiAction::PreviousTrack);
                    }
                    if ui.button(if model.playing { "Pause" } else { "Play" }).clicked() {
                        actions.push(UiAction::TogglePlayback);
                    }
                    if ui.button("Next").clicked() {
                        actions.push(UiAction::NextTrack);
                    }
                });

                ui.separator();

                for (label, value) in [
                    ("Bass", model.metrics.bass),
                    ("Mid", model.metrics.mid),
                    ("Treble", model.metrics.treble),
                    ("Volume", model.metrics.volume),
                    ("Peak", model.metrics.peak),
                ] {
                    ui.horizontal(|ui| {
                        ui.label(format!("{:<6}", label));
                        ui.add(egui::ProgressBar::new(value).desired_width(160.0));
                    });
                }

                ui.separator();

                if let Some(current) = model.mode {
                    ui.horizontal(|ui| {
                        for mode in VisualizationMode::ALL {
                            if ui.radio(current == mode, mode.to_string()).clicked() && mode != current {
                                actions.push(UiAction::SetMode(mode));
                            }
                        }
                    });
                }

                ui.horizontal(|ui| {
                    let mut volume = model.volume;
                    if ui.add(egui::Slider::new(&mut volume, 0.0..=1.0).text("Volume")).changed() {
                        actions.push(UiAction::SetVolume(volume));
                    }
                    let mut muted = model.muted;
                    if ui.checkbox(&mut muted, "Mute").changed() {
                        actions.push(UiAction::SetMuted(muted));
                    }
                });

                if let Some(status) = &model.status {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_RED, status);
                }

                ui.separator();
                ui.label("Space play/pause, N/P track, 1-4 mode, F1 hide");
            });

        actions
    }
}
