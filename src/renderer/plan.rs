use smallvec::{smallvec, SmallVec};

use crate::config::{BlurConfig, BlurFamily, BlurVariant};
use crate::effect::ProgramId;

/// Sampling direction of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Horizontal,
    Vertical,
    /// Along the configured angle.
    Directional,
    /// Towards the configured center.
    Radial,
}

/// Passes one frame issues: `steps` run in order, `repetitions` times, each
/// repetition reading the previous one's output.
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub program: ProgramId,
    pub steps: SmallVec<[PassKind; 2]>,
    pub repetitions: u32,
}

impl PassPlan {
    pub fn for_config(config: &BlurConfig) -> Option<Self> {
        let program = ProgramId::for_blur(config.family(), config.variant())?;
        let (steps, repetitions): (SmallVec<[PassKind; 2]>, u32) = match config.variant() {
            BlurVariant::Area => {
                let repetitions = match config.family() {
                    BlurFamily::Box => config.passes(),
                    BlurFamily::Gaussian => 1,
                };
                (
                    smallvec![PassKind::Horizontal, PassKind::Vertical],
                    repetitions,
                )
            }
            BlurVariant::TiltShift => (
                smallvec![PassKind::Horizontal, PassKind::Vertical],
                config.passes(),
            ),
            BlurVariant::Directional | BlurVariant::Motion => {
                (smallvec![PassKind::Directional], 1)
            }
            BlurVariant::Zoom => (smallvec![PassKind::Radial], 1),
        };

        Some(Self {
            program,
            steps,
            repetitions: repetitions.max(1),
        })
    }

    /// Capture cycles a full frame issues.
    pub fn pass_count(&self) -> u32 {
        self.steps.len() as u32 * self.repetitions
    }
}

/// Focus band of a tilt-shift pass, in normalized surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltShiftBand {
    pub top: f32,
    /// Already flipped: `1 - tilt_shift_bottom`.
    pub bottom: f32,
    pub radius: i32,
}

/// Values uploaded for one pass, besides the input image and kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassBindings {
    pub radius: f32,
    /// Distance between two samples in texture coordinates.
    pub texel_step: Option<[f32; 2]>,
    /// Unit sampling direction.
    pub dir: Option<[f32; 2]>,
    pub radial_center: Option<[f32; 2]>,
    pub uv_size: Option<[f32; 2]>,
    pub tilt_shift: Option<TiltShiftBand>,
}

impl PassBindings {
    pub fn for_pass(config: &BlurConfig, kind: PassKind) -> Self {
        let (width, height) = config.size();
        let (width, height) = (width.max(1) as f32, height.max(1) as f32);

        let mut bindings = Self {
            radius: config.radius(),
            texel_step: None,
            dir: None,
            radial_center: None,
            uv_size: None,
            tilt_shift: None,
        };

        match kind {
            PassKind::Horizontal => bindings.texel_step = Some([1.0 / width, 0.0]),
            PassKind::Vertical => bindings.texel_step = Some([0.0, 1.0 / height]),
            PassKind::Directional => {
                let radians = -config.angle() * std::f32::consts::PI / 180.0;
                let (sin, cos) = radians.sin_cos();
                bindings.texel_step = Some([cos / width, sin / height]);
                bindings.dir = Some([cos, sin]);
            }
            PassKind::Radial => {
                let (x, y) = config.center();
                bindings.radial_center = Some([x, y]);
                bindings.uv_size = Some([width, height]);
            }
        }

        if config.variant() == BlurVariant::TiltShift {
            let (top, bottom) = config.tilt_shift();
            bindings.tilt_shift = Some(TiltShiftBand {
                top,
                bottom: 1.0 - bottom,
                radius: config.radius() as i32,
            });
            bindings.uv_size = Some([width, height]);
        }

        bindings
    }
}
