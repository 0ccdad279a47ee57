//! Pass orchestration: one [`BlurFilter`] per filter instance drives the
//! per-frame sequence of blur passes against a [`GpuBackend`].

#[cfg(feature = "render_metrics")]
use std::time::Instant;

use crate::backend::{BackendError, GpuBackend};
use crate::compositor::BackgroundCompositor;
use crate::config::{BlurConfig, BlurFamily, BlurVariant};
use crate::effect::{EffectResolver, ProgramId};
use crate::kernel::{KernelSampler, KernelTable};

#[cfg(feature = "render_metrics")]
mod metrics;
mod passes;
mod plan;
mod surfaces;

#[cfg(feature = "render_metrics")]
pub use metrics::FrameMetrics;
pub use plan::{PassBindings, PassKind, PassPlan, TiltShiftBand};
pub use surfaces::RenderSurfaces;

/// What a successfully rendered frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub program: ProgramId,
    /// Number of capture cycles issued.
    pub passes: u32,
}

/// Why a frame's render step was skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no blur program available for {family} {variant}")]
    ProgramUnavailable {
        family: BlurFamily,
        variant: BlurVariant,
    },
    #[error("input texture is not available")]
    InputUnavailable,
    #[error("background composite produced no texture")]
    CompositeUnavailable,
    #[error("working surface has zero size ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },
    #[error(transparent)]
    Target(#[from] BackendError),
    #[error("render target capture could not begin")]
    CaptureFailed,
}

/// Blur stage state owned by one filter instance.
pub struct BlurFilter<B: GpuBackend> {
    config: BlurConfig,
    sampler: KernelSampler,
    resolver: EffectResolver<B>,
    surfaces: RenderSurfaces<B::Target>,
    #[cfg(feature = "render_metrics")]
    metrics: metrics::BlurMetricsTracker,
}

impl<B: GpuBackend> BlurFilter<B> {
    pub fn new(config: BlurConfig) -> Self {
        let mut filter = Self {
            config,
            sampler: KernelSampler::new(),
            resolver: EffectResolver::new(),
            surfaces: RenderSurfaces::new(),
            #[cfg(feature = "render_metrics")]
            metrics: metrics::BlurMetricsTracker::default(),
        };
        filter.refresh_kernel();
        filter
    }

    pub fn config(&self) -> &BlurConfig {
        &self.config
    }

    /// Replace the configuration. The kernel is resampled only if the radius
    /// changed; programs are resolved lazily on the next frame.
    pub fn update(&mut self, config: BlurConfig) {
        self.config = config;
        self.refresh_kernel();
    }

    /// Resize the working surfaces. Targets are reallocated on the next frame.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.config.set_size(width, height);
    }

    pub fn kernel(&self) -> &KernelTable {
        self.sampler.table()
    }

    pub fn kernel_sampler(&self) -> &KernelSampler {
        &self.sampler
    }

    pub fn surfaces(&self) -> &RenderSurfaces<B::Target> {
        &self.surfaces
    }

    /// Texture holding the last completed frame's output.
    pub fn output_texture(&self, backend: &B) -> Option<B::Texture> {
        self.surfaces
            .output()
            .map(|target| backend.target_texture(target))
    }

    pub fn resolver(&self) -> &EffectResolver<B> {
        &self.resolver
    }

    /// Drop cached programs, e.g. after the backend lost its device. They are
    /// reloaded on the next frame.
    pub fn reset_programs(&mut self) {
        self.resolver.clear();
    }

    fn refresh_kernel(&mut self) {
        if self.config.family() == BlurFamily::Gaussian {
            self.sampler.refresh(self.config.radius());
        }
    }

    /// Render one frame.
    ///
    /// On error the blur targets are untouched unless the error is
    /// [`RenderError::CaptureFailed`], and the previous output stays current.
    /// A capture failure after the previous output's slot was overwritten
    /// leaves no output at all, never a partially blurred one. The compositor
    /// may already have drawn into its own target before an error.
    pub fn render<C>(
        &mut self,
        backend: &mut B,
        compositor: &mut C,
        input: Option<&B::Texture>,
    ) -> Result<FrameStats, RenderError>
    where
        C: BackgroundCompositor<B>,
    {
        #[cfg(feature = "render_metrics")]
        let frame_started_at = Instant::now();

        let result = self.render_passes(backend, compositor, input);

        #[cfg(feature = "render_metrics")]
        self.metrics
            .record_frame(frame_started_at, Instant::now(), result.as_ref().ok());

        if let Err(error) = &result {
            log::debug!("Skipping blur frame: {error}");
        }
        result
    }

    fn render_passes<C>(
        &mut self,
        backend: &mut B,
        compositor: &mut C,
        input: Option<&B::Texture>,
    ) -> Result<FrameStats, RenderError>
    where
        C: BackgroundCompositor<B>,
    {
        self.refresh_kernel();

        let family = self.config.family();
        let variant = self.config.variant();
        let program = self
            .resolver
            .resolve(backend, family, variant)
            .ok_or(RenderError::ProgramUnavailable { family, variant })?;
        let plan = PassPlan::for_config(&self.config)
            .ok_or(RenderError::ProgramUnavailable { family, variant })?;

        let input = input.ok_or(RenderError::InputUnavailable)?;
        let (width, height) = self.config.size();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptySurface { width, height });
        }

        let mut current_input = compositor
            .composite_against_background(backend, input, &self.config)
            .ok_or(RenderError::CompositeUnavailable)?;

        self.surfaces.ensure(backend, width, height)?;

        let kernel = match family {
            BlurFamily::Gaussian => Some(self.sampler.table()),
            BlurFamily::Box => None,
        };

        // Start on the slot that does not hold the previous output. Later
        // passes of a multi-pass frame overwrite it, so it is dropped first.
        let mut front = None;
        let mut passes = 0;
        for _ in 0..plan.repetitions {
            for &kind in &plan.steps {
                let back = self.surfaces.back_index(front);
                self.surfaces.claim(back);
                let Some(target) = self.surfaces.slot(back) else {
                    return Err(RenderError::CaptureFailed);
                };

                let bindings = PassBindings::for_pass(&self.config, kind);
                let request = passes::PassRequest {
                    program,
                    target,
                    input: &current_input,
                    bindings: &bindings,
                    kernel,
                    width,
                    height,
                };
                if !passes::run_pass(backend, request) {
                    return Err(RenderError::CaptureFailed);
                }

                passes += 1;
                front = Some(back);
                current_input = backend.target_texture(target);
            }
        }

        if let Some(front) = front {
            self.surfaces.commit(front);
        }

        Ok(FrameStats {
            program: program.id,
            passes,
        })
    }

    #[cfg(feature = "render_metrics")]
    pub fn metrics(&self) -> FrameMetrics {
        self.metrics.snapshot()
    }

    #[cfg(feature = "render_metrics")]
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }
}
