//! Blur configuration: kernel family, spatial variant and the numeric knobs
//! each variant reads every frame.
//!
//! A [`BlurConfig`] can only hold a family/variant pair that is legal, so the
//! render path never has to handle an impossible combination.

use std::fmt;

/// Largest radius accepted from configuration.
pub const MAX_RADIUS: f32 = 250.0;

/// Upper bound on box-blur repetitions per frame.
pub const MAX_PASSES: u32 = 10;

/// Top-level kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurFamily {
    Box,
    Gaussian,
}

impl BlurFamily {
    pub const ALL: [BlurFamily; 2] = [BlurFamily::Box, BlurFamily::Gaussian];

    /// Stable integer id used by the settings boundary.
    pub fn id(self) -> i64 {
        match self {
            BlurFamily::Box => 1,
            BlurFamily::Gaussian => 2,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            BlurFamily::Box => "Box",
            BlurFamily::Gaussian => "Gaussian",
        }
    }
}

impl fmt::Display for BlurFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Spatial pattern of the blur within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurVariant {
    Area,
    Directional,
    Zoom,
    Motion,
    TiltShift,
}

impl BlurVariant {
    pub const ALL: [BlurVariant; 5] = [
        BlurVariant::Area,
        BlurVariant::Directional,
        BlurVariant::Zoom,
        BlurVariant::Motion,
        BlurVariant::TiltShift,
    ];

    /// Stable integer id used by the settings boundary.
    pub fn id(self) -> i64 {
        match self {
            BlurVariant::Area => 1,
            BlurVariant::Directional => 2,
            BlurVariant::Zoom => 3,
            BlurVariant::Motion => 4,
            BlurVariant::TiltShift => 5,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|variant| variant.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            BlurVariant::Area => "Area",
            BlurVariant::Directional => "Directional",
            BlurVariant::Zoom => "Zoom",
            BlurVariant::Motion => "Motion",
            BlurVariant::TiltShift => "Tilt-Shift",
        }
    }
}

impl fmt::Display for BlurVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const BOX_VARIANTS: [BlurVariant; 4] = [
    BlurVariant::Area,
    BlurVariant::Directional,
    BlurVariant::Zoom,
    BlurVariant::TiltShift,
];

const GAUSSIAN_VARIANTS: [BlurVariant; 4] = [
    BlurVariant::Area,
    BlurVariant::Directional,
    BlurVariant::Zoom,
    BlurVariant::Motion,
];

/// Variants a family supports, in selection-list order.
pub fn legal_variants(family: BlurFamily) -> &'static [BlurVariant] {
    match family {
        BlurFamily::Box => &BOX_VARIANTS,
        BlurFamily::Gaussian => &GAUSSIAN_VARIANTS,
    }
}

pub fn is_legal(family: BlurFamily, variant: BlurVariant) -> bool {
    legal_variants(family).contains(&variant)
}

/// `(label, id)` pairs for populating a variant selection list.
pub fn variant_options(family: BlurFamily) -> Vec<(&'static str, i64)> {
    legal_variants(family)
        .iter()
        .map(|variant| (variant.label(), variant.id()))
        .collect()
}

/// Errors raised at the configuration boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{variant} blur is not available for the {family} family")]
    IllegalVariant {
        family: BlurFamily,
        variant: BlurVariant,
    },
    #[error("unknown blur family id {0}")]
    UnknownFamily(i64),
    #[error("unknown blur variant id {0}")]
    UnknownVariant(i64),
    #[error("setting `{key}` has the wrong type, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
    },
}

/// Everything the blur stage reads per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurConfig {
    family: BlurFamily,
    variant: BlurVariant,
    radius: f32,
    passes: u32,
    angle: f32,
    center_x: f32,
    center_y: f32,
    tilt_shift_top: f32,
    tilt_shift_bottom: f32,
    width: u32,
    height: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            family: BlurFamily::Gaussian,
            variant: BlurVariant::Area,
            radius: 10.0,
            passes: 1,
            angle: 0.0,
            center_x: 0.5,
            center_y: 0.5,
            tilt_shift_top: 0.25,
            tilt_shift_bottom: 0.25,
            width: 0,
            height: 0,
        }
    }
}

impl BlurConfig {
    pub fn new(family: BlurFamily, variant: BlurVariant) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.set_blur(family, variant)?;
        Ok(config)
    }

    /// Switch family and variant together. The config is left untouched when
    /// the pair is illegal.
    pub fn set_blur(
        &mut self,
        family: BlurFamily,
        variant: BlurVariant,
    ) -> Result<(), ConfigError> {
        if !is_legal(family, variant) {
            return Err(ConfigError::IllegalVariant { family, variant });
        }
        self.family = family;
        self.variant = variant;
        Ok(())
    }

    pub fn family(&self) -> BlurFamily {
        self.family
    }

    pub fn variant(&self) -> BlurVariant {
        self.variant
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    /// `(top, bottom)` band boundaries, each measured from its own edge.
    pub fn tilt_shift(&self) -> (f32, f32) {
        (self.tilt_shift_top, self.tilt_shift_bottom)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = clamp_or(radius, 0.0, MAX_RADIUS, 0.0);
    }

    pub fn set_passes(&mut self, passes: u32) {
        self.passes = passes.clamp(1, MAX_PASSES);
    }

    pub fn set_angle(&mut self, degrees: f32) {
        self.angle = if degrees.is_finite() { degrees } else { 0.0 };
    }

    pub fn set_center(&mut self, x: f32, y: f32) {
        self.center_x = clamp_or(x, 0.0, 1.0, 0.5);
        self.center_y = clamp_or(y, 0.0, 1.0, 0.5);
    }

    pub fn set_tilt_shift(&mut self, top: f32, bottom: f32) {
        self.tilt_shift_top = clamp_or(top, 0.0, 1.0, 0.0);
        self.tilt_shift_bottom = clamp_or(bottom, 0.0, 1.0, 0.0);
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.set_radius(radius);
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.set_passes(passes);
        self
    }

    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.set_angle(degrees);
        self
    }

    pub fn with_center(mut self, x: f32, y: f32) -> Self {
        self.set_center(x, y);
        self
    }

    pub fn with_tilt_shift(mut self, top: f32, bottom: f32) -> Self {
        self.set_tilt_shift(top, bottom);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.set_size(width, height);
        self
    }
}

// NaN falls back to `fallback` rather than poisoning every later frame.
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}
