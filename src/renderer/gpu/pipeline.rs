use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::renderer::device::ProgramKind;
use crate::renderer::gpu::textures::DEPTH_FORMAT;
use crate::renderer::uniforms::ShaderGlobals;
use crate::renderer::vertex::Vertex;

/// Fluent builder over `wgpu::RenderPipelineDescriptor` with the defaults
/// every program here starts from.
pub(crate) struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    fragment_entry: Option<&'a str>,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            shader,
            fragment_entry: Some("fs_main"),
            vertex_buffers: Vec::new(),
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    pub(crate) fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    /// No fragment stage; only depth is written.
    pub(crate) fn depth_only(mut self) -> Self {
        self.fragment_entry = None;
        self
    }

    pub(crate) fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub(crate) fn with_color_target(
        mut self,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.color_targets.push(Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    pub(crate) fn with_depth_stencil(
        self,
        format: wgpu::TextureFormat,
        depth_write: bool,
        depth_compare: wgpu::CompareFunction,
    ) -> Self {
        self.with_depth_stencil_biased(format, depth_write, depth_compare, 0, 0.0)
    }

    /// Depth state with slope-scaled bias, for shadow casters.
    pub(crate) fn with_depth_stencil_biased(
        mut self,
        format: wgpu::TextureFormat,
        depth_write: bool,
        depth_compare: wgpu::CompareFunction,
        constant_bias: i32,
        slope_bias: f32,
    ) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: constant_bias,
                slope_scale: slope_bias,
                clamp: 0.0,
            },
        });
        self
    }

    pub(crate) fn with_culling(mut self, enabled: bool) -> Self {
        self.primitive.cull_mode = enabled.then_some(wgpu::Face::Back);
        self
    }

    pub(crate) fn build(self) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: Some("vs_main"),
                    buffers: &self.vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: self.fragment_entry.map(|entry| wgpu::FragmentState {
                    module: self.shader,
                    entry_point: Some(entry),
                    targets: &self.color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: self.primitive,
                depth_stencil: self.depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}

/// WGSL source for a program: the shared globals block followed by the
/// program's own stages.
pub(crate) fn shader_source(kind: ProgramKind) -> String {
    let common = include_str!("../../shader/common.wgsl");
    let body = match kind {
        ProgramKind::Entity => include_str!("../../shader/entity.wgsl"),
        ProgramKind::Terrain => include_str!("../../shader/terrain.wgsl"),
        ProgramKind::Water => include_str!("../../shader/water.wgsl"),
        ProgramKind::Shadow => include_str!("../../shader/shadow.wgsl"),
    };
    format!("{}\n{}", common, body)
}

/// Byte stride between per-draw uniform snapshots in the dynamic buffer.
pub(crate) fn uniform_stride(device: &wgpu::Device) -> u64 {
    let align = device.limits().min_uniform_buffer_offset_alignment as u64;
    let size = std::mem::size_of::<ShaderGlobals>() as u64;
    size.div_ceil(align) * align
}

/// Bind group layouts shared by every program.
pub(crate) struct ProgramLayouts {
    pub(crate) globals: wgpu::BindGroupLayout,
    pub(crate) textures: wgpu::BindGroupLayout,
    lit: wgpu::PipelineLayout,
    depth_only: wgpu::PipelineLayout,
}

impl ProgramLayouts {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GlobalsLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<ShaderGlobals>() as u64),
                },
                count: None,
            }],
        });

        let color_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TextureUnitsLayout"),
            entries: &[
                color_entry(0),
                color_entry(1),
                color_entry(2),
                color_entry(3),
                color_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let lit = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LitPipelineLayout"),
            bind_group_layouts: &[&globals, &textures],
            push_constant_ranges: &[],
        });
        let depth_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("DepthOnlyPipelineLayout"),
            bind_group_layouts: &[&globals],
            push_constant_ranges: &[],
        });

        Self {
            globals,
            textures,
            lit,
            depth_only,
        }
    }
}

/// Compiled pipelines for one program, one per culling mode.
pub(crate) struct ProgramPipelines {
    pub(crate) kind: ProgramKind,
    culled: wgpu::RenderPipeline,
    unculled: wgpu::RenderPipeline,
}

impl ProgramPipelines {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &ProgramLayouts,
        kind: ProgramKind,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let source = shader_source(kind);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let build = |culling: bool| {
            let layout = if kind.is_depth_only() {
                &layouts.depth_only
            } else {
                &layouts.lit
            };
            let builder = PipelineBuilder::new(device, layout, &shader)
                .with_label(kind.label())
                .with_vertex_buffer(Vertex::layout())
                .with_culling(culling);
            match kind {
                ProgramKind::Shadow => builder
                    .depth_only()
                    .with_depth_stencil_biased(
                        DEPTH_FORMAT,
                        true,
                        wgpu::CompareFunction::LessEqual,
                        2,
                        2.0,
                    )
                    .build(),
                ProgramKind::Water => builder
                    .with_color_target(color_format, Some(wgpu::BlendState::ALPHA_BLENDING))
                    .with_depth_stencil(DEPTH_FORMAT, true, wgpu::CompareFunction::Less)
                    .build(),
                ProgramKind::Entity | ProgramKind::Terrain => builder
                    .with_color_target(color_format, None)
                    .with_depth_stencil(DEPTH_FORMAT, true, wgpu::CompareFunction::Less)
                    .build(),
            }
        };

        // water is seen from both sides
        let culled = if kind == ProgramKind::Water {
            build(false)
        } else {
            build(true)
        };
        let unculled = build(false);

        Self {
            kind,
            culled,
            unculled,
        }
    }

    pub(crate) fn pipeline(&self, culling: bool) -> &wgpu::RenderPipeline {
        if culling {
            &self.culled
        } else {
            &self.unculled
        }
    }
}

/// Cache of compiled programs keyed by kind; creating the same program twice
/// reuses the pipelines.
#[derive(Default)]
pub(crate) struct PipelineCache {
    compiled: HashMap<ProgramKind, std::rc::Rc<ProgramPipelines>>,
}

impl PipelineCache {
    pub(crate) fn get_or_build(
        &mut self,
        device: &wgpu::Device,
        layouts: &ProgramLayouts,
        kind: ProgramKind,
        color_format: wgpu::TextureFormat,
    ) -> std::rc::Rc<ProgramPipelines> {
        self.compiled
            .entry(kind)
            .or_insert_with(|| {
                log::info!("Compiling {}", kind.label());
                std::rc::Rc::new(ProgramPipelines::new(device, layouts, kind, color_format))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_sources_include_globals_block() {
        for kind in [
            ProgramKind::Entity,
            ProgramKind::Terrain,
            ProgramKind::Water,
            ProgramKind::Shadow,
        ] {
            let source = shader_source(kind);
            assert!(source.contains("struct Globals"), "{kind:?}");
            assert!(source.contains("fn vs_main"), "{kind:?}");
        }
    }

    #[test]
    fn shadow_shader_has_no_fragment_stage() {
        assert!(!shader_source(ProgramKind::Shadow).contains("fn fs_main"));
        assert!(shader_source(ProgramKind::Water).contains("fn fs_main"));
    }
}
