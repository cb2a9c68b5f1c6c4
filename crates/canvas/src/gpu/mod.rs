//! wgpu implementation of [`GraphicsBackend`].
//!
//! Each compiled program owns its render pipeline plus a std140 uniform
//! buffer whose members were lowered out of the submitted GLSL (see
//! [`compile`]). `set_uniform` writes by name into a CPU scratch copy; the
//! next draw uploads it.

mod compile;
mod context;
mod layout;

use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::{Context as AnyhowContext, Result};
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::backend::{CompileFailure, GraphicsBackend, ProgramId, Stage, StageLog};
use crate::types::{UniformType, UniformValue};
use context::GpuContext;
use layout::UniformBlockLayout;

/// Full-screen quad as two triangles of vec2 positions.
const QUAD_VERTICES: [f32; 12] = [
    -1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
];

/// Parses and validates a fragment source without touching a GPU device,
/// using the same lowering pipeline as [`WgpuCanvas`]. On failure returns the
/// log a failing compile would produce for the fragment stage.
pub fn check_fragment_source(source: &str) -> Result<(), String> {
    let lowered = compile::lower_stage_source(source);
    let interface = compile::merge_interfaces(&[&lowered.interface])?;
    let prelude = compile::block_prelude(&interface);
    let wrapped = format!("{prelude}{}", lowered.text);
    compile::build_module(
        &wrapped,
        ShaderStage::Fragment,
        compile::prelude_line_count(&prelude),
    )
    .map(|_| ())
}

/// Tightly packed RGBA8 pixels read back from an offscreen render.
pub struct SnapshotImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

struct UniformBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ProgramResources {
    pipeline: wgpu::RenderPipeline,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    layout: UniformBlockLayout,
    scratch: Vec<u8>,
    uniforms: Option<UniformBinding>,
    dirty: bool,
}

pub struct WgpuCanvas {
    context: GpuContext,
    quad: wgpu::Buffer,
    programs: HashMap<u64, ProgramResources>,
    next_program: u64,
}

impl WgpuCanvas {
    /// Brings up the GPU context against `target`. This is the one fatal
    /// path: no adapter or device means the canvas cannot exist.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        initial_size: (u32, u32),
    ) -> Result<Self> {
        let context = GpuContext::new(target, initial_size)?;
        let quad = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("canvas quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Ok(Self {
            context,
            quad,
            programs: HashMap::new(),
            next_program: 1,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.context.size
    }

    /// Renders one fresh frame into an offscreen target and reads it back.
    ///
    /// Exporting always redraws rather than reusing the presented frame,
    /// which the compositor may already have cleared.
    pub fn snapshot(&mut self, program: Option<ProgramId>) -> Result<Option<SnapshotImage>> {
        let Some(program) = program else {
            return Ok(None);
        };
        let Some(resources) = self.programs.get_mut(&program.raw()) else {
            return Ok(None);
        };
        let (width, height) = self.context.size;
        let device = &self.context.device;
        let format = wgpu::TextureFormat::Rgba8Unorm;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("canvas snapshot target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // The resident pipeline targets the swapchain format; build a
        // transient one for the copyable target.
        let pipeline = create_pipeline(
            device,
            &resources.pipeline_layout,
            &resources.vertex_module,
            &resources.fragment_module,
            format,
        );

        if resources.dirty {
            if let Some(binding) = &resources.uniforms {
                self.context
                    .queue
                    .write_buffer(&binding.buffer, 0, &resources.scratch);
            }
            resources.dirty = false;
        }

        let bytes_per_row =
            (width * 4).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas snapshot readback"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canvas snapshot"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas snapshot pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            if let Some(binding) = &resources.uniforms {
                pass.set_bind_group(0, &binding.bind_group, &[]);
            }
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..6, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("failed to flush GPU queue for snapshot readback")?;
        receiver
            .recv()
            .context("snapshot map callback dropped")?
            .context("failed to map snapshot buffer")?;

        let data = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            rgba.extend_from_slice(&data[start..start + (width * 4) as usize]);
        }
        drop(data);
        readback.unmap();

        Ok(Some(SnapshotImage {
            width,
            height,
            rgba,
        }))
    }
}

impl GraphicsBackend for WgpuCanvas {
    fn compile_program(
        &mut self,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramId, CompileFailure> {
        let lowered_vertex = compile::lower_stage_source(vertex);
        let lowered_fragment = compile::lower_stage_source(fragment);
        let interface =
            compile::merge_interfaces(&[&lowered_vertex.interface, &lowered_fragment.interface])
                .map_err(|message| CompileFailure::single(Stage::Link, message))?;

        let prelude = compile::block_prelude(&interface);
        let prelude_lines = compile::prelude_line_count(&prelude);
        let wrapped_vertex = format!("{prelude}{}", lowered_vertex.text);
        let wrapped_fragment = format!("{prelude}{}", lowered_fragment.text);

        let vertex_result =
            compile::build_module(&wrapped_vertex, ShaderStage::Vertex, prelude_lines);
        let fragment_result =
            compile::build_module(&wrapped_fragment, ShaderStage::Fragment, prelude_lines);

        let mut stages = Vec::new();
        if let Err(log) = &vertex_result {
            stages.push(StageLog {
                stage: Stage::Vertex,
                log: log.clone(),
            });
        }
        if let Err(log) = &fragment_result {
            stages.push(StageLog {
                stage: Stage::Fragment,
                log: log.clone(),
            });
        }
        if !stages.is_empty() {
            return Err(CompileFailure { stages });
        }

        // naga accepted both stages; hand the same wrapped GLSL to wgpu.
        let device = &self.context.device;
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("canvas vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(wrapped_vertex),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("canvas fragment"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(wrapped_fragment),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
        });

        let layout = UniformBlockLayout::new(&interface);
        let mut bind_group_layouts = Vec::new();
        let uniform_layout = if layout.is_empty() {
            None
        } else {
            Some(
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("canvas uniform layout"),
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
                }),
            )
        };
        if let Some(uniform_layout) = &uniform_layout {
            bind_group_layouts.push(uniform_layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("canvas pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &vertex_module,
            &fragment_module,
            self.context.surface_format,
        );

        let uniforms = uniform_layout.map(|uniform_layout| {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("canvas uniform buffer"),
                size: layout.size() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("canvas uniform bind group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            UniformBinding { buffer, bind_group }
        });

        let id = self.next_program;
        self.next_program += 1;
        let scratch = vec![0u8; layout.size()];
        self.programs.insert(
            id,
            ProgramResources {
                pipeline,
                pipeline_layout,
                vertex_module,
                fragment_module,
                layout,
                scratch,
                uniforms,
                dirty: true,
            },
        );
        tracing::debug!(program = id, uniforms = interface.len(), "program linked");
        Ok(ProgramId::new(id))
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.raw());
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        _ty: UniformType,
        value: &UniformValue,
    ) {
        let Some(resources) = self.programs.get_mut(&program.raw()) else {
            return;
        };
        // An absent member means the declared uniform went unused; not an error.
        if resources.layout.write(&mut resources.scratch, name, value) {
            resources.dirty = true;
        }
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn draw(&mut self, program: Option<ProgramId>) {
        let Some(program) = program else {
            return;
        };
        let Some(resources) = self.programs.get_mut(&program.raw()) else {
            return;
        };

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context
                    .surface
                    .configure(&self.context.device, &self.context.config);
                match self.context.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(error) => {
                        tracing::warn!(%error, "surface unavailable after reconfigure; skipping frame");
                        return;
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "could not acquire surface texture; skipping frame");
                return;
            }
        };

        if resources.dirty {
            if let Some(binding) = &resources.uniforms {
                self.context
                    .queue
                    .write_buffer(&binding.buffer, 0, &resources.scratch);
            }
            resources.dirty = false;
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("canvas draw"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&resources.pipeline);
            if let Some(binding) = &resources.uniforms {
                pass.set_bind_group(0, &binding.bind_group, &[]);
            }
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..6, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    pipeline_layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("canvas pipeline"),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2],
            }],
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
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
