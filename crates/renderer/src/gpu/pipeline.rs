use std::borrow::Cow;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use tracing::{debug, warn};
use wgpu::naga::ShaderStage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::catalog::{self, BlendMode, EffectKind, EffectTemplate};
use crate::chain::EffectChain;
use crate::plan::{plan_chain, PassInput, PassUniforms};
use crate::shaders;
use crate::source::PixelSource;

/// Offscreen pass format. Floating point so precision survives long
/// chains, and 16-bit because 32-bit floats are not filterable without an
/// optional device feature.
pub(crate) const RENDER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Resources shared by every pass of every pipeline generation: bind group
/// layouts, the quad vertex module, the pipeline layout, and the one linear
/// sampler all inputs are read through.
pub(crate) struct PassLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub input_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub vertex_module: wgpu::ShaderModule,
    pub linear_sampler: wgpu::Sampler,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass input layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &input_layout],
            push_constant_ranges: &[],
        });

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pass quad vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(shaders::VERTEX_SOURCE),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pass input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            uniform_layout,
            input_layout,
            pipeline_layout,
            vertex_module,
            linear_sampler,
        }
    }
}

/// The uploaded source image on the GPU. Exactly one exists at a time;
/// replacement destroys the previous texture.
pub(crate) struct SourceTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl SourceTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, pixels: &PixelSource) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("source image"),
                size: wgpu::Extent3d {
                    width: pixels.width,
                    height: pixels.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            &pixels.pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width: pixels.width,
            height: pixels.height,
        }
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

/// One pass's offscreen output buffer, sized to the source image's native
/// pixels regardless of the viewport.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// One realised pass: program, offscreen target, input wiring (baked into
/// `input_group`), and the CPU copy of its uniform block.
pub(crate) struct CompiledPass {
    pub kind: EffectKind,
    pub pipeline: wgpu::RenderPipeline,
    pub target: RenderTarget,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_group: wgpu::BindGroup,
    pub input_group: wgpu::BindGroup,
    pub uniforms: PassUniforms,
    pub time_dependent: bool,
}

/// The compiled pipeline: compiled passes in chain order.
pub(crate) struct Pipeline {
    pub passes: Vec<CompiledPass>,
}

impl Pipeline {
    /// Realises the chain against the given source texture.
    ///
    /// Builds everything before touching the caller's state, so a failure
    /// here leaves whatever pipeline is currently installed untouched; the
    /// caller only swaps (and disposes the old generation) on `Ok`. An
    /// effect program that fails validation is substituted with the
    /// identity program instead of failing the compile.
    pub fn compile(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PassLayouts,
        surface_format: wgpu::TextureFormat,
        source: &SourceTexture,
        chain: &EffectChain,
    ) -> Result<Self> {
        let plans = plan_chain(chain, source.width, source.height);
        let count = plans.len();
        let mut passes: Vec<CompiledPass> = Vec::with_capacity(count);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        for (index, plan) in plans.into_iter().enumerate() {
            let is_final = index + 1 == count;
            let template = catalog::template(plan.kind);

            let fragment_module = match build_fragment_module(device, template) {
                Ok(module) => module,
                Err(error) => {
                    warn!(kind = %plan.kind, error = %error, "effect program failed validation; substituting identity");
                    build_fragment_module(device, catalog::identity_template())
                        .context("identity fallback program failed validation")?
                }
            };

            let target = RenderTarget::new(
                device,
                plan.target_width,
                plan.target_height,
                &format!("pass {index} target ({})", plan.kind),
            );

            let input_view = match plan.input {
                PassInput::Source => &source.view,
                PassInput::PriorPass(prior) => &passes[prior].target.view,
            };
            let input_group = create_input_group(device, layouts, input_view, &format!("pass {index} input"));

            let (uniform_buffer, uniform_group) =
                create_uniform_resources(device, layouts, &format!("pass {index} uniforms"));
            queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&plan.uniforms));

            let target_format = if is_final { surface_format } else { RENDER_TARGET_FORMAT };
            let pipeline = create_render_pipeline(
                device,
                layouts,
                &fragment_module,
                target_format,
                &format!("pass {index} ({})", plan.kind),
            );

            debug!(
                index,
                kind = %plan.kind,
                input = ?plan.input,
                width = plan.target_width,
                height = plan.target_height,
                "compiled pass"
            );

            passes.push(CompiledPass {
                kind: plan.kind,
                pipeline,
                target,
                uniform_buffer,
                uniform_group,
                input_group,
                uniforms: plan.uniforms,
                time_dependent: plan.time_dependent,
            });
        }

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            for pass in passes {
                pass.target.texture.destroy();
                pass.uniform_buffer.destroy();
            }
            return Err(anyhow!("GPU allocation failed while compiling the pipeline: {error}"));
        }

        Ok(Self { passes })
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// In-place parameter update; never recompiles, never reallocates.
    /// A name outside the pass's schema is a silent no-op.
    pub fn set_parameter(&mut self, index: usize, name: &str, value: f32) {
        if let Some(pass) = self.passes.get_mut(index) {
            let template = catalog::template(pass.kind);
            if !pass.uniforms.set_param(template, name, value) {
                tracing::trace!(kind = %pass.kind, name, "parameter not present on pass; ignoring");
            }
        }
    }

    /// In-place blend-mode update on one pass.
    pub fn set_blend(&mut self, index: usize, blend: BlendMode) {
        if let Some(pass) = self.passes.get_mut(index) {
            pass.uniforms.set_blend(blend);
        }
    }

    /// Releases every GPU resource this generation owns. GPU memory is not
    /// reclaimed behind our back, so superseded targets are destroyed
    /// eagerly instead of waiting for their handles to drop.
    pub fn dispose(self) {
        for pass in self.passes {
            pass.target.texture.destroy();
            pass.uniform_buffer.destroy();
        }
    }
}

/// Compiles one effect's wrapped GLSL, surfacing validation errors through
/// an error scope instead of the global uncaptured-error handler.
pub(crate) fn build_fragment_module(
    device: &wgpu::Device,
    template: &EffectTemplate,
) -> Result<wgpu::ShaderModule> {
    let source = shaders::fragment_source(template);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(template.name),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("{error}"));
    }
    Ok(module)
}

pub(crate) fn create_uniform_resources(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    label: &str,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<PassUniforms>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layouts.uniform_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    });
    (buffer, group)
}

pub(crate) fn create_input_group(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    input_view: &wgpu::TextureView,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layouts.input_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(input_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&layouts.linear_sampler),
            },
        ],
    })
}

pub(crate) fn create_render_pipeline(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    fragment_module: &wgpu::ShaderModule,
    target_format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layouts.vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
