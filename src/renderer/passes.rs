use crate::backend::{BlendState, GpuBackend, ParamValue};
use crate::effect::ResolvedProgram;
use crate::kernel::KernelTable;

use super::plan::PassBindings;

pub(super) struct PassRequest<'a, B: GpuBackend> {
    pub program: &'a ResolvedProgram<B>,
    pub target: &'a B::Target,
    pub input: &'a B::Texture,
    pub bindings: &'a PassBindings,
    /// Present for Gaussian programs only.
    pub kernel: Option<&'a KernelTable>,
    pub width: u32,
    pub height: u32,
}

/// Upload a pass's parameters and run one capture cycle into its target.
/// Returns `false` if the capture could not begin.
pub(super) fn run_pass<B: GpuBackend>(backend: &mut B, request: PassRequest<'_, B>) -> bool {
    let PassRequest {
        program,
        target,
        input,
        bindings,
        kernel,
        width,
        height,
    } = request;
    let handle = &program.handle;

    if let Some(image) = program.param(backend, "image") {
        backend.set_texture(handle, image, input);
    }
    set_named(backend, program, "radius", ParamValue::Float(bindings.radius));

    if let Some(kernel) = kernel {
        set_named(backend, program, "weight", ParamValue::Bytes(kernel.weight_bytes()));
        set_named(backend, program, "offset", ParamValue::Bytes(kernel.offset_bytes()));
        set_named(
            backend,
            program,
            "kernel_size",
            ParamValue::Int(kernel.effective_len() as i32),
        );
    }

    if let Some(step) = bindings.texel_step {
        set_named(backend, program, "texel_step", ParamValue::Vec2(step));
    }
    if let (Some(dir), Some(param)) = (bindings.dir, program.dir) {
        backend.set_param(handle, param, ParamValue::Vec2(dir));
    }
    if let Some(center) = bindings.radial_center {
        set_named(backend, program, "radial_center", ParamValue::Vec2(center));
    }
    if let (Some(size), Some(param)) = (bindings.uv_size, program.uv_size) {
        backend.set_param(handle, param, ParamValue::Vec2(size));
    }
    if let Some(band) = bindings.tilt_shift {
        set_named(backend, program, "top", ParamValue::Float(band.top));
        set_named(backend, program, "bottom", ParamValue::Float(band.bottom));
        set_named(backend, program, "radius_i", ParamValue::Int(band.radius));
    }

    backend.push_blend_state(BlendState::STRAIGHT_ALPHA_OVER);
    let captured = backend.begin_capture(target, width, height);
    if captured {
        backend.draw_sprite(handle, width, height);
        backend.end_capture(target);
    }
    backend.pop_blend_state();
    captured
}

// Parameters a program does not declare are skipped.
fn set_named<B: GpuBackend>(
    backend: &mut B,
    program: &ResolvedProgram<B>,
    name: &str,
    value: ParamValue<'_>,
) {
    if let Some(param) = program.param(backend, name) {
        backend.set_param(&program.handle, param, value);
    }
}
