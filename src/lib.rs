//! Multi-pass GPU blur stage for a video compositing pipeline.
//!
//! A [`BlurFilter`] turns a [`BlurConfig`] into a sequence of ping-pong render
//! passes against any [`GpuBackend`]. [`WgpuBackend`] is the bundled backend.

pub use wgpu;

mod backend;
mod compositor;
mod config;
mod effect;
pub mod kernel;
mod pipeline;
mod renderer;
pub mod settings;
mod wgpu_backend;

pub use backend::{
    BackendError, BlendComponent, BlendFactor, BlendState, GpuBackend, ParamInfo, ParamType,
    ParamValue,
};
pub use compositor::{BackgroundCompositor, PassthroughCompositor, TextureBackgroundCompositor};
pub use config::{
    is_legal, legal_variants, variant_options, BlurConfig, BlurFamily, BlurVariant, ConfigError,
    MAX_PASSES, MAX_RADIUS,
};
pub use effect::{EffectResolver, ProgramId, ResolvedProgram, COMPOSITE_PROGRAM};
pub use kernel::{KernelSampler, KernelTable, KERNEL_CAPACITY};
pub use pipeline::TARGET_FORMAT;
#[cfg(feature = "render_metrics")]
pub use renderer::FrameMetrics;
pub use renderer::{
    BlurFilter, FrameStats, PassBindings, PassKind, PassPlan, RenderError, RenderSurfaces,
    TiltShiftBand,
};
pub use settings::{SettingValue, Settings};
pub use wgpu_backend::{
    ParamHandle, ProgramHandle, ShaderRegistry, WgpuBackend, WgpuTarget, WgpuTexture,
};
