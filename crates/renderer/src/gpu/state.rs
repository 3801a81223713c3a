use std::time::Instant;

use anyhow::{Context as AnyhowContext, Result};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::catalog::{self, BlendMode};
use crate::chain::EffectChain;
use crate::plan::PassUniforms;
use crate::source::PixelSource;
use crate::viewport::{fit_contain, PlaneSize};

use super::context::GpuContext;
use super::pipeline::{
    build_fragment_module, create_input_group, create_render_pipeline, create_uniform_resources,
    PassLayouts, Pipeline, SourceTexture,
};

/// Background behind the letterboxed image.
const LETTERBOX_CLEAR: wgpu::Color = wgpu::Color {
    r: 0.1647,
    g: 0.1647,
    b: 0.1647,
    a: 1.0,
};

const FULL_FRAME: PlaneSize = PlaneSize {
    width: 1.0,
    height: 1.0,
};

/// Pass-through pass used when the chain is empty, so the display is never
/// blank: the source renders directly to the screen with neutral settings.
struct FallbackPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    input_group: wgpu::BindGroup,
    uniforms: PassUniforms,
}

impl FallbackPass {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PassLayouts,
        surface_format: wgpu::TextureFormat,
        source: &SourceTexture,
    ) -> Result<Self> {
        let template = catalog::identity_template();
        let fragment_module = build_fragment_module(device, template)
            .context("identity fallback program failed validation")?;
        let pipeline =
            create_render_pipeline(device, layouts, &fragment_module, surface_format, "fallback identity pass");
        let (uniform_buffer, uniform_group) = create_uniform_resources(device, layouts, "fallback uniforms");
        let input_group = create_input_group(device, layouts, &source.view, "fallback input");
        let uniforms =
            PassUniforms::merged(template, |_| None, source.width, source.height, BlendMode::Normal);
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        Ok(Self {
            pipeline,
            uniform_buffer,
            uniform_group,
            input_group,
            uniforms,
        })
    }

    fn dispose(self) {
        self.uniform_buffer.destroy();
    }
}

/// Owns every GPU resource of the running viewer and drives the per-frame
/// pass loop. All structural edits flow through [`GpuState::set_chain`] /
/// [`GpuState::replace_source`], which build the replacement generation
/// first and only dispose the previous one once the build succeeded; a
/// failed rebuild leaves the old pipeline rendering.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PassLayouts,
    source: SourceTexture,
    pipeline: Pipeline,
    fallback: FallbackPass,
    plane: PlaneSize,
    started: Instant,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        pixels: &PixelSource,
        chain: &EffectChain,
    ) -> Result<Self>
    where
        T: raw_window_handle::HasDisplayHandle + raw_window_handle::HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let layouts = PassLayouts::new(&context.device);

        Self::check_source_dimensions(&context.device, pixels)?;
        let source = SourceTexture::upload(&context.device, &context.queue, pixels);
        let pipeline = Pipeline::compile(
            &context.device,
            &context.queue,
            &layouts,
            context.surface_format,
            &source,
            chain,
        )?;
        let fallback = FallbackPass::new(
            &context.device,
            &context.queue,
            &layouts,
            context.surface_format,
            &source,
        )?;
        let plane = fit_contain(source.width, source.height, context.size.width, context.size.height);

        Ok(Self {
            context,
            layouts,
            source,
            pipeline,
            fallback,
            plane,
            started: Instant::now(),
        })
    }

    fn check_source_dimensions(device: &wgpu::Device, pixels: &PixelSource) -> Result<()> {
        let max_dimension = device.limits().max_texture_dimension_2d;
        if pixels.width > max_dimension || pixels.height > max_dimension {
            anyhow::bail!(
                "image is {}x{} but the GPU caps textures at {max_dimension}",
                pixels.width,
                pixels.height
            );
        }
        Ok(())
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Viewport resize: reconfigures the surface and refits the display
    /// plane. Render targets are deliberately untouched; they track the
    /// source image, not the window.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.plane = fit_contain(self.source.width, self.source.height, new_size.width, new_size.height);
    }

    /// Recompiles the pipeline for a structurally edited chain. On failure
    /// the previous pipeline stays installed and keeps rendering.
    pub(crate) fn set_chain(&mut self, chain: &EffectChain) -> Result<()> {
        let next = Pipeline::compile(
            &self.context.device,
            &self.context.queue,
            &self.layouts,
            self.context.surface_format,
            &self.source,
            chain,
        )?;
        let previous = std::mem::replace(&mut self.pipeline, next);
        previous.dispose();
        debug!(passes = self.pipeline.len(), "pipeline recompiled");
        Ok(())
    }

    /// Installs a freshly decoded source image and recompiles the pipeline
    /// against it. The old texture and passes are only released after the
    /// replacements built successfully.
    pub(crate) fn replace_source(&mut self, pixels: &PixelSource, chain: &EffectChain) -> Result<()> {
        Self::check_source_dimensions(&self.context.device, pixels)?;
        let next_source = SourceTexture::upload(&self.context.device, &self.context.queue, pixels);

        let next_pipeline = match Pipeline::compile(
            &self.context.device,
            &self.context.queue,
            &self.layouts,
            self.context.surface_format,
            &next_source,
            chain,
        ) {
            Ok(pipeline) => pipeline,
            Err(error) => {
                next_source.destroy();
                return Err(error);
            }
        };
        let next_fallback = match FallbackPass::new(
            &self.context.device,
            &self.context.queue,
            &self.layouts,
            self.context.surface_format,
            &next_source,
        ) {
            Ok(fallback) => fallback,
            Err(error) => {
                next_pipeline.dispose();
                next_source.destroy();
                return Err(error);
            }
        };

        std::mem::replace(&mut self.pipeline, next_pipeline).dispose();
        std::mem::replace(&mut self.fallback, next_fallback).dispose();
        std::mem::replace(&mut self.source, next_source).destroy();
        self.plane = fit_contain(
            self.source.width,
            self.source.height,
            self.context.size.width,
            self.context.size.height,
        );
        debug!(
            width = self.source.width,
            height = self.source.height,
            "source image replaced"
        );
        Ok(())
    }

    /// In-place parameter update on the live pipeline; no rebuild.
    pub(crate) fn set_parameter(&mut self, index: usize, name: &str, value: f32) {
        self.pipeline.set_parameter(index, name, value);
    }

    /// In-place blend-mode update on the live pipeline; no rebuild.
    pub(crate) fn set_blend(&mut self, index: usize, blend: BlendMode) {
        self.pipeline.set_blend(index, blend);
    }

    /// Renders one frame: uniforms first, then every pass strictly in
    /// chain order. Passes 0..N-2 draw full-frame into their own targets;
    /// the final pass (or the identity fallback when the chain is empty)
    /// draws the fitted plane into the swapchain.
    pub(crate) fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let surface_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let seconds = self.started.elapsed().as_secs_f32();

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let count = self.pipeline.len();
        if count == 0 {
            self.fallback.uniforms.set_plane_scale(self.plane);
            self.context.queue.write_buffer(
                &self.fallback.uniform_buffer,
                0,
                bytemuck::bytes_of(&self.fallback.uniforms),
            );

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fallback pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(LETTERBOX_CLEAR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.fallback.pipeline);
            render_pass.set_bind_group(0, &self.fallback.uniform_group, &[]);
            render_pass.set_bind_group(1, &self.fallback.input_group, &[]);
            render_pass.draw(0..6, 0..1);
        } else {
            // Each pass owns its uniform buffer, so all writes can land
            // before the encoder is submitted without bleeding into each
            // other.
            for (index, pass) in self.pipeline.passes.iter_mut().enumerate() {
                if pass.time_dependent {
                    pass.uniforms.set_time(seconds);
                }
                let is_final = index + 1 == count;
                pass.uniforms
                    .set_plane_scale(if is_final { self.plane } else { FULL_FRAME });
                self.context
                    .queue
                    .write_buffer(&pass.uniform_buffer, 0, bytemuck::bytes_of(&pass.uniforms));
            }

            for (index, pass) in self.pipeline.passes.iter().enumerate() {
                let is_final = index + 1 == count;
                let (attachment, clear) = if is_final {
                    (&surface_view, LETTERBOX_CLEAR)
                } else {
                    (&pass.target.view, wgpu::Color::TRANSPARENT)
                };

                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("effect pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: attachment,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                render_pass.set_pipeline(&pass.pipeline);
                render_pass.set_bind_group(0, &pass.uniform_group, &[]);
                render_pass.set_bind_group(1, &pass.input_group, &[]);
                render_pass.draw(0..6, 0..1);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
