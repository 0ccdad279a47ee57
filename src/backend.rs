//! The interface the blur stage needs from a GPU backend.
//!
//! The model is effect-style: a program exposes named parameters, values are
//! set on those parameters, and a draw uses whatever values are set at the
//! time. Rendering into a target happens inside a capture scope
//! (`begin_capture` → `draw_sprite` → `end_capture`).

/// Type of a program parameter, as reported by [`GpuBackend::param_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Float,
    Int,
    Vec2,
    Vec4,
    /// Raw block of the given size in bytes, e.g. a packed `f32` array.
    Bytes(u32),
    Texture,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: ParamType,
}

/// Value uploaded to a non-texture parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<'a> {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Bytes(&'a [u8]),
}

/// Blend factors understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

/// Additive blend equation with separate color and alpha factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Overwrite the destination.
    pub const REPLACE: BlendState = BlendState {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
        },
    };

    /// Straight-alpha source-over, used while writing blur passes.
    pub const STRAIGHT_ALPHA_OVER: BlendState = BlendState {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("no shader source registered under `{0}`")]
    SourceNotFound(String),
    #[error("shader program `{name}` failed to compile: {message}")]
    CompilationFailed { name: String, message: String },
    #[error("render target of {width}x{height} could not be created: {reason}")]
    TargetUnavailable {
        width: u32,
        height: u32,
        reason: String,
    },
}

/// Operations the blur stage issues against the GPU.
///
/// Calls are synchronous from the caller's point of view; any asynchronous
/// GPU execution is the implementation's business.
pub trait GpuBackend {
    type Program: Clone;
    type Param: Copy + PartialEq + std::fmt::Debug;
    type Texture: Clone;
    type Target;

    /// Compile or load the program registered under `name`.
    fn load_program(&mut self, name: &str) -> Result<Self::Program, BackendError>;

    fn param_count(&self, program: &Self::Program) -> usize;

    fn param_info(&self, program: &Self::Program, index: usize) -> Option<ParamInfo>;

    fn param_by_index(&self, program: &Self::Program, index: usize) -> Option<Self::Param>;

    fn param_by_name(&self, program: &Self::Program, name: &str) -> Option<Self::Param>;

    /// Set a value for the next draw with `program`.
    fn set_param(&mut self, program: &Self::Program, param: Self::Param, value: ParamValue<'_>);

    fn set_texture(&mut self, program: &Self::Program, param: Self::Param, texture: &Self::Texture);

    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target, BackendError>;

    fn target_size(&self, target: &Self::Target) -> (u32, u32);

    /// The texture a target renders into, readable once its capture has ended.
    fn target_texture(&self, target: &Self::Target) -> Self::Texture;

    /// Start rendering into `target`. Returns `false` if the target cannot be
    /// bound, in which case no draws may be issued and `end_capture` must not
    /// be called.
    fn begin_capture(&mut self, target: &Self::Target, width: u32, height: u32) -> bool;

    /// Draw a full-surface sprite with `program`, once per technique pass the
    /// program declares.
    fn draw_sprite(&mut self, program: &Self::Program, width: u32, height: u32);

    fn end_capture(&mut self, target: &Self::Target);

    fn push_blend_state(&mut self, state: BlendState);

    fn pop_blend_state(&mut self);
}
