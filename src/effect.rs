//! Effect resolution: which shader program a blur needs, and loading it.
//!
//! Loading is separated from use. A program is compiled through the backend
//! the first time a family/variant pair needs it and kept in a small cache
//! keyed by program identity, so switching variants back and forth does not
//! recompile. Parameters every pass touches are resolved once at load time.

use std::num::NonZeroUsize;

use ahash::{HashMap, HashMapExt};
use lru::LruCache;

use crate::backend::{BackendError, GpuBackend};
use crate::config::{BlurFamily, BlurVariant};

/// Name of the background-composite program.
pub const COMPOSITE_PROGRAM: &str = "composite";

/// Identity of a blur shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramId {
    Box1d,
    BoxRadial,
    BoxTiltShift,
    Gaussian1d,
    GaussianRadial,
    GaussianMotion,
}

impl ProgramId {
    pub const ALL: [ProgramId; 6] = [
        ProgramId::Box1d,
        ProgramId::BoxRadial,
        ProgramId::BoxTiltShift,
        ProgramId::Gaussian1d,
        ProgramId::GaussianRadial,
        ProgramId::GaussianMotion,
    ];

    /// The program a family/variant pair renders with, or `None` for a pair
    /// the family does not support.
    pub fn for_blur(family: BlurFamily, variant: BlurVariant) -> Option<Self> {
        match (family, variant) {
            (BlurFamily::Box, BlurVariant::Area | BlurVariant::Directional) => {
                Some(ProgramId::Box1d)
            }
            (BlurFamily::Box, BlurVariant::Zoom) => Some(ProgramId::BoxRadial),
            (BlurFamily::Box, BlurVariant::TiltShift) => Some(ProgramId::BoxTiltShift),
            (BlurFamily::Gaussian, BlurVariant::Area | BlurVariant::Directional) => {
                Some(ProgramId::Gaussian1d)
            }
            (BlurFamily::Gaussian, BlurVariant::Zoom) => Some(ProgramId::GaussianRadial),
            (BlurFamily::Gaussian, BlurVariant::Motion) => Some(ProgramId::GaussianMotion),
            (BlurFamily::Box, BlurVariant::Motion)
            | (BlurFamily::Gaussian, BlurVariant::TiltShift) => None,
        }
    }

    /// Name the program's source is registered under in the backend.
    pub fn source_name(self) -> &'static str {
        match self {
            ProgramId::Box1d => "box_1d",
            ProgramId::BoxRadial => "box_radial",
            ProgramId::BoxTiltShift => "box_tiltshift",
            ProgramId::Gaussian1d => "gaussian_1d",
            ProgramId::GaussianRadial => "gaussian_radial",
            ProgramId::GaussianMotion => "gaussian_motion",
        }
    }

    pub fn family(self) -> BlurFamily {
        match self {
            ProgramId::Box1d | ProgramId::BoxRadial | ProgramId::BoxTiltShift => BlurFamily::Box,
            ProgramId::Gaussian1d | ProgramId::GaussianRadial | ProgramId::GaussianMotion => {
                BlurFamily::Gaussian
            }
        }
    }
}

/// A loaded program plus the parameter handles cached at load time.
pub struct ResolvedProgram<B: GpuBackend> {
    pub id: ProgramId,
    pub handle: B::Program,
    pub uv_size: Option<B::Param>,
    pub dir: Option<B::Param>,
}

impl<B: GpuBackend> ResolvedProgram<B> {
    fn load(backend: &mut B, id: ProgramId) -> Result<Self, BackendError> {
        let handle = backend.load_program(id.source_name())?;

        let mut uv_size = None;
        let mut dir = None;
        for index in 0..backend.param_count(&handle) {
            let Some(info) = backend.param_info(&handle, index) else {
                continue;
            };
            match info.name.as_str() {
                "uv_size" => uv_size = backend.param_by_index(&handle, index),
                "dir" => dir = backend.param_by_index(&handle, index),
                _ => {}
            }
        }

        log::info!("Loaded blur program {}", id.source_name());
        Ok(Self {
            id,
            handle,
            uv_size,
            dir,
        })
    }

    /// Look up a parameter that is not cached at load time.
    pub fn param(&self, backend: &B, name: &str) -> Option<B::Param> {
        backend.param_by_name(&self.handle, name)
    }
}

/// Cache of loaded blur programs, one slot per program identity.
pub struct EffectResolver<B: GpuBackend> {
    loaded: LruCache<ProgramId, ResolvedProgram<B>>,
    // Consecutive failed loads per program, reset by a successful load.
    failures: HashMap<ProgramId, u32>,
}

impl<B: GpuBackend> Default for EffectResolver<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GpuBackend> EffectResolver<B> {
    pub fn new() -> Self {
        let capacity =
            NonZeroUsize::new(ProgramId::ALL.len()).unwrap_or(NonZeroUsize::MIN);
        Self {
            loaded: LruCache::new(capacity),
            failures: HashMap::new(),
        }
    }

    /// The program for a family/variant pair, loading it on first use.
    /// Returns `None` if the pair has no program or loading failed; a failed
    /// load is retried on the next call.
    pub fn resolve(
        &mut self,
        backend: &mut B,
        family: BlurFamily,
        variant: BlurVariant,
    ) -> Option<&ResolvedProgram<B>> {
        let id = ProgramId::for_blur(family, variant)?;
        self.load(backend, id)
    }

    pub fn load(&mut self, backend: &mut B, id: ProgramId) -> Option<&ResolvedProgram<B>> {
        if !self.loaded.contains(&id) {
            match ResolvedProgram::load(backend, id) {
                Ok(program) => {
                    self.failures.remove(&id);
                    self.loaded.put(id, program);
                }
                Err(error) => {
                    let attempts = self.failures.entry(id).or_insert(0);
                    *attempts += 1;
                    // Loads are retried every frame; only the first failure warns.
                    if *attempts == 1 {
                        log::warn!("Failed to load blur program {}: {}", id.source_name(), error);
                    } else {
                        log::debug!(
                            "Failed to load blur program {} (attempt {}): {}",
                            id.source_name(),
                            attempts,
                            error
                        );
                    }
                    return None;
                }
            }
        }
        self.loaded.get(&id)
    }

    pub fn is_loaded(&self, id: ProgramId) -> bool {
        self.loaded.contains(&id)
    }

    /// Consecutive failed loads of `id` since its last successful load.
    pub fn failed_attempts(&self, id: ProgramId) -> u32 {
        self.failures.get(&id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
        self.failures.clear();
    }
}
