//! [`GpuBackend`] implementation on top of wgpu.
//!
//! Programs are WGSL modules compiled from a [`ShaderRegistry`]. Each capture
//! records into its own command encoder and is submitted at `end_capture`, so
//! a target's texture is ready to sample once its capture has ended.

use std::sync::Arc;

use ahash::HashMap;

use crate::backend::{BackendError, BlendState, GpuBackend, ParamInfo, ParamValue};
use crate::pipeline::{
    create_program_pipeline, create_render_texture, IMAGE_BINDING, PARAMS_BINDING,
    SAMPLER_BINDING,
};

mod construction;
mod program;
mod readback;

pub use program::ShaderRegistry;

use program::{ParamSlot, ProgramLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamHandle(usize);

/// A sampled texture. Cloning shares the underlying GPU texture.
#[derive(Debug, Clone)]
pub struct WgpuTexture {
    texture: Arc<wgpu::Texture>,
    view: Arc<wgpu::TextureView>,
    width: u32,
    height: u32,
}

impl WgpuTexture {
    fn new(texture: wgpu::Texture, width: u32, height: u32) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture: Arc::new(texture),
            view: Arc::new(view),
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[derive(Debug)]
pub struct WgpuTarget {
    color: WgpuTexture,
}

struct CompiledProgram {
    name: String,
    layout: ProgramLayout,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<(usize, BlendState), wgpu::RenderPipeline>,
    uniforms: Vec<u8>,
    image: Option<WgpuTexture>,
}

struct ActiveCapture {
    encoder: wgpu::CommandEncoder,
    view: Arc<wgpu::TextureView>,
    width: u32,
    height: u32,
    cleared: bool,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    registry: ShaderRegistry,
    programs: Vec<CompiledProgram>,
    program_names: HashMap<String, ProgramHandle>,
    blend_stack: Vec<BlendState>,
    capture: Option<ActiveCapture>,
}

impl WgpuBackend {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Register extra WGSL programs. Programs already compiled are not
    /// affected.
    pub fn registry_mut(&mut self) -> &mut ShaderRegistry {
        &mut self.registry
    }

    fn current_blend(&self) -> BlendState {
        self.blend_stack
            .last()
            .copied()
            .unwrap_or(BlendState::REPLACE)
    }

    fn compile(&self, name: &str) -> Result<CompiledProgram, BackendError> {
        let source = self.registry.module_source(name)?;
        // Validate up front so a bad source surfaces as an error rather than
        // a device-level panic.
        let layout = program::reflect(name, &source)?;

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let bind_group_layout =
            crate::pipeline::create_program_bind_group_layout(&self.device, layout.has_uniforms());
        let uniforms = vec![0; layout.uniform_size as usize];

        Ok(CompiledProgram {
            name: name.to_owned(),
            layout,
            module,
            bind_group_layout,
            pipelines: HashMap::default(),
            uniforms,
            image: None,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        sampler: &wgpu::Sampler,
        program: &CompiledProgram,
        image: &WgpuTexture,
    ) -> wgpu::BindGroup {
        use wgpu::util::DeviceExt;

        let params_buffer = program.layout.has_uniforms().then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blur_params_buffer"),
                contents: &program.uniforms,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: IMAGE_BINDING,
                resource: wgpu::BindingResource::TextureView(&image.view),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        if let Some(buffer) = params_buffer.as_ref() {
            entries.push(wgpu::BindGroupEntry {
                binding: PARAMS_BINDING,
                resource: buffer.as_entire_binding(),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_program_bg"),
            layout: &program.bind_group_layout,
            entries: &entries,
        })
    }
}

fn clear_pass(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("blur_clear_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}

impl GpuBackend for WgpuBackend {
    type Program = ProgramHandle;
    type Param = ParamHandle;
    type Texture = WgpuTexture;
    type Target = WgpuTarget;

    fn load_program(&mut self, name: &str) -> Result<ProgramHandle, BackendError> {
        if let Some(handle) = self.program_names.get(name) {
            return Ok(*handle);
        }

        let program = self.compile(name)?;
        let handle = ProgramHandle(self.programs.len());
        self.programs.push(program);
        self.program_names.insert(name.to_owned(), handle);
        Ok(handle)
    }

    fn param_count(&self, program: &ProgramHandle) -> usize {
        self.programs
            .get(program.0)
            .map_or(0, |program| program.layout.params.len())
    }

    fn param_info(&self, program: &ProgramHandle, index: usize) -> Option<ParamInfo> {
        let program = self.programs.get(program.0)?;
        program
            .layout
            .params
            .get(index)
            .map(|param| param.info.clone())
    }

    fn param_by_index(&self, program: &ProgramHandle, index: usize) -> Option<ParamHandle> {
        let program = self.programs.get(program.0)?;
        (index < program.layout.params.len()).then_some(ParamHandle(index))
    }

    fn param_by_name(&self, program: &ProgramHandle, name: &str) -> Option<ParamHandle> {
        let program = self.programs.get(program.0)?;
        program.layout.index_of(name).map(ParamHandle)
    }

    fn set_param(&mut self, program: &ProgramHandle, param: ParamHandle, value: ParamValue<'_>) {
        let Some(program) = self.programs.get_mut(program.0) else {
            return;
        };
        let Some(reflected) = program.layout.params.get(param.0) else {
            return;
        };

        let written = match reflected.slot {
            ParamSlot::Uniform { offset, size } => program::write_param(
                &mut program.uniforms,
                reflected.info.ty,
                offset,
                size,
                value,
            ),
            ParamSlot::Image => false,
        };
        if !written {
            log::warn!(
                "Ignoring value {:?} for parameter `{}` of type {:?} in program {}",
                value,
                reflected.info.name,
                reflected.info.ty,
                program.name
            );
        }
    }

    fn set_texture(&mut self, program: &ProgramHandle, param: ParamHandle, texture: &WgpuTexture) {
        let Some(program) = self.programs.get_mut(program.0) else {
            return;
        };
        match program.layout.params.get(param.0) {
            Some(reflected) if reflected.slot == ParamSlot::Image => {
                program.image = Some(texture.clone());
            }
            _ => log::warn!("Parameter {:?} of program {} is not a texture", param, program.name),
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<WgpuTarget, BackendError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(BackendError::TargetUnavailable {
                width,
                height,
                reason: format!("dimensions must be within 1..={max}"),
            });
        }

        let texture = create_render_texture(&self.device, width, height, "blur_target");
        Ok(WgpuTarget {
            color: WgpuTexture::new(texture, width, height),
        })
    }

    fn target_size(&self, target: &WgpuTarget) -> (u32, u32) {
        target.color.size()
    }

    fn target_texture(&self, target: &WgpuTarget) -> WgpuTexture {
        target.color.clone()
    }

    fn begin_capture(&mut self, target: &WgpuTarget, width: u32, height: u32) -> bool {
        if self.capture.is_some() {
            log::warn!("Capture already in progress");
            return false;
        }
        let (target_width, target_height) = target.color.size();
        if width == 0 || height == 0 || width > target_width || height > target_height {
            return false;
        }

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blur_capture_encoder"),
            });
        self.capture = Some(ActiveCapture {
            encoder,
            view: target.color.view.clone(),
            width,
            height,
            cleared: false,
        });
        true
    }

    fn draw_sprite(&mut self, program: &ProgramHandle, width: u32, height: u32) {
        let blend = self.current_blend();
        let Some(capture) = self.capture.as_mut() else {
            log::warn!("draw_sprite called outside a capture");
            return;
        };
        let Some(program) = self.programs.get_mut(program.0) else {
            return;
        };
        let Some(image) = program.image.as_ref() else {
            log::warn!("Program {} has no input texture bound", program.name);
            return;
        };

        let bind_group = Self::create_bind_group(&self.device, &self.sampler, program, image);
        let width = width.min(capture.width) as f32;
        let height = height.min(capture.height) as f32;

        for pass_index in 0..program.layout.passes.len() {
            let pipeline = program
                .pipelines
                .entry((pass_index, blend))
                .or_insert_with(|| {
                    create_program_pipeline(
                        &self.device,
                        &program.bind_group_layout,
                        &program.module,
                        &program.layout.passes[pass_index],
                        blend,
                    )
                });

            let load = if capture.cleared {
                wgpu::LoadOp::Load
            } else {
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
            };
            let mut render_pass = capture
                .encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("blur_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &capture.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            render_pass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
            drop(render_pass);

            capture.cleared = true;
        }
    }

    fn end_capture(&mut self, target: &WgpuTarget) {
        let Some(mut capture) = self.capture.take() else {
            log::warn!("end_capture called without a capture");
            return;
        };
        if !Arc::ptr_eq(&capture.view, &target.color.view) {
            log::warn!("end_capture target differs from the captured one");
        }
        if !capture.cleared {
            clear_pass(&mut capture.encoder, &capture.view);
        }
        self.queue.submit(std::iter::once(capture.encoder.finish()));
    }

    fn push_blend_state(&mut self, state: BlendState) {
        self.blend_stack.push(state);
    }

    fn pop_blend_state(&mut self) {
        if self.blend_stack.pop().is_none() {
            log::warn!("pop_blend_state called with an empty blend stack");
        }
    }
}
