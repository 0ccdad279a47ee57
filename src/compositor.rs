//! Pre-blur background compositing.
//!
//! The blur passes never read the caller's input directly: the input is first
//! handed to a [`BackgroundCompositor`], and whatever texture it returns is the
//! first pass's input.

use crate::backend::{BlendState, GpuBackend};
use crate::config::BlurConfig;
use crate::effect::COMPOSITE_PROGRAM;

pub trait BackgroundCompositor<B: GpuBackend> {
    /// Composite `input` against the background. `None` means no texture is
    /// available this frame and the blur is skipped.
    fn composite_against_background(
        &mut self,
        backend: &mut B,
        input: &B::Texture,
        config: &BlurConfig,
    ) -> Option<B::Texture>;
}

/// Uses the input as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompositor;

impl<B: GpuBackend> BackgroundCompositor<B> for PassthroughCompositor {
    fn composite_against_background(
        &mut self,
        _backend: &mut B,
        input: &B::Texture,
        _config: &BlurConfig,
    ) -> Option<B::Texture> {
        Some(input.clone())
    }
}

/// Draws an optional background texture, then the input over it with
/// source-over blending, into a render target it owns. Without a background
/// this still copies the input into its own target.
pub struct TextureBackgroundCompositor<B: GpuBackend> {
    background: Option<B::Texture>,
    program: Option<B::Program>,
    target: Option<B::Target>,
}

impl<B: GpuBackend> Default for TextureBackgroundCompositor<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GpuBackend> TextureBackgroundCompositor<B> {
    pub fn new() -> Self {
        Self {
            background: None,
            program: None,
            target: None,
        }
    }

    pub fn set_background(&mut self, background: Option<B::Texture>) {
        self.background = background;
    }

    pub fn background(&self) -> Option<&B::Texture> {
        self.background.as_ref()
    }

    fn ensure_program(&mut self, backend: &mut B) -> Option<B::Program> {
        if self.program.is_none() {
            match backend.load_program(COMPOSITE_PROGRAM) {
                Ok(program) => self.program = Some(program),
                Err(error) => {
                    log::warn!("Failed to load background composite program: {error}");
                    return None;
                }
            }
        }
        self.program.clone()
    }

    fn ensure_target(&mut self, backend: &mut B, width: u32, height: u32) -> Option<&B::Target> {
        let stale = match &self.target {
            Some(target) => backend.target_size(target) != (width, height),
            None => true,
        };
        if stale {
            match backend.create_target(width, height) {
                Ok(target) => self.target = Some(target),
                Err(error) => {
                    log::warn!("Failed to allocate background composite target: {error}");
                    self.target = None;
                    return None;
                }
            }
        }
        self.target.as_ref()
    }
}

impl<B: GpuBackend> BackgroundCompositor<B> for TextureBackgroundCompositor<B> {
    fn composite_against_background(
        &mut self,
        backend: &mut B,
        input: &B::Texture,
        config: &BlurConfig,
    ) -> Option<B::Texture> {
        let (width, height) = config.size();
        let program = self.ensure_program(backend)?;
        let image = backend.param_by_name(&program, "image")?;
        let background = self.background.clone();
        let target = self.ensure_target(backend, width, height)?;

        if !backend.begin_capture(target, width, height) {
            return None;
        }

        if let Some(background) = background.as_ref() {
            backend.push_blend_state(BlendState::REPLACE);
            backend.set_texture(&program, image, background);
            backend.draw_sprite(&program, width, height);
            backend.pop_blend_state();
        }

        backend.push_blend_state(BlendState::STRAIGHT_ALPHA_OVER);
        backend.set_texture(&program, image, input);
        backend.draw_sprite(&program, width, height);
        backend.pop_blend_state();

        backend.end_capture(target);
        Some(backend.target_texture(target))
    }
}
