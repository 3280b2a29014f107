use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;
use winit::window::Window;

use super::{FrameTexture, PresentPipeline, Vertex, VertexBuffer};
use crate::render::Surface;

/// Presents the CPU-painted [`Surface`] in a window, with an optional
/// overlay pass drawn on top.
pub struct GraphicsEngine {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,

    pipeline: PresentPipeline,
    texture_layout: wgpu::BindGroupLayout,
    frame: Option<FrameTexture>,
    quad: VertexBuffer,
}

impl GraphicsEngine {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let texture_layout = FrameTexture::bind_group_layout(&device);
        let pipeline = PresentPipeline::new(&device, surface_format, &texture_layout);
        let quad = VertexBuffer::new(&device, &Vertex::FULLSCREEN_QUAD);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            texture_layout,
            frame: None,
            quad,
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Upload `frame`, draw it, then hand the encoder to `overlay`.
    pub fn render<F>(&mut self, frame: &Surface, overlay: F) -> Result<()>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView, [u32; 2]) -> Result<()>,
    {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let (width, height) = frame.physical_size();
        if width > 0 && height > 0 {
            if self.frame.as_ref().map(FrameTexture::size) != Some((width, height)) {
                debug!("Recreating frame texture at {}x{}", width, height);
                self.frame = Some(FrameTexture::new(&self.device, &self.texture_layout, width, height));
            }
        } else {
            self.frame = None;
        }
        if let Some(texture) = &self.frame {
            texture.upload(&self.queue, frame.pixels());
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(texture) = &self.frame {
                render_pass.set_pipeline(self.pipeline.pipeline());
                render_pass.set_bind_group(0, texture.bind_group(), &[]);
                render_pass.set_vertex_buffer(0, self.quad.buffer.slice(..));
                render_pass.draw(0..self.quad.vertex_count, 0..1);
            }
        }

        overlay(
            &self.device,
            &self.queue,
            &mut encoder,
            &view,
            [self.config.width, self.config.height],
        )?;

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
