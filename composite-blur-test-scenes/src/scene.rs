use composite_blur::{BlurConfig, BlurFamily, BlurVariant, ProgramId};

use crate::expectations::ParamExpectation;

pub const CANVAS_WIDTH: u32 = 64;
pub const CANVAS_HEIGHT: u32 = 48;

/// A configuration plus what one frame rendered with it must look like.
pub struct Scenario {
    pub label: &'static str,
    pub config: BlurConfig,
    pub program: ProgramId,
    /// Parameter expectations for each pass, in order. Its length is the
    /// expected number of capture cycles.
    pub passes: Vec<Vec<ParamExpectation>>,
}

fn config(family: BlurFamily, variant: BlurVariant) -> BlurConfig {
    match BlurConfig::new(family, variant) {
        Ok(config) => config,
        Err(error) => panic!("scenario uses an illegal pair: {error}"),
    }
}

/// Box/TiltShift at 1080p: one horizontal and one vertical pass with the
/// focus band flipped into `bottom`.
pub fn tilt_shift_1080p() -> Scenario {
    let band = |texel_step| {
        vec![
            ParamExpectation::Vec2("texel_step", texel_step),
            ParamExpectation::Float("top", 0.2),
            ParamExpectation::Float("bottom", 0.7),
            ParamExpectation::Int("radius_i", 10),
            ParamExpectation::Float("radius", 10.0),
            ParamExpectation::Vec2("uv_size", [1920.0, 1080.0]),
        ]
    };

    Scenario {
        label: "box_tiltshift_1080p",
        config: config(BlurFamily::Box, BlurVariant::TiltShift)
            .with_radius(10.0)
            .with_passes(1)
            .with_tilt_shift(0.2, 0.3)
            .with_size(1920, 1080),
        program: ProgramId::BoxTiltShift,
        passes: vec![band([1.0 / 1920.0, 0.0]), band([0.0, 1.0 / 1080.0])],
    }
}

/// Gaussian/Zoom around the center: a single radial pass.
pub fn gaussian_zoom() -> Scenario {
    Scenario {
        label: "gaussian_zoom_center",
        config: config(BlurFamily::Gaussian, BlurVariant::Zoom)
            .with_radius(6.0)
            .with_passes(4)
            .with_center(0.5, 0.5)
            .with_size(CANVAS_WIDTH, CANVAS_HEIGHT),
        program: ProgramId::GaussianRadial,
        passes: vec![vec![
            ParamExpectation::Vec2("radial_center", [0.5, 0.5]),
            ParamExpectation::Vec2("uv_size", [CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32]),
            ParamExpectation::Float("radius", 6.0),
            ParamExpectation::Unset("texel_step"),
        ]],
    }
}

/// Box/Area repeated `passes` times, alternating horizontal and vertical.
pub fn box_area(passes: u32) -> Scenario {
    let horizontal = [1.0 / CANVAS_WIDTH as f32, 0.0];
    let vertical = [0.0, 1.0 / CANVAS_HEIGHT as f32];
    let steps = (0..passes)
        .flat_map(|_| [horizontal, vertical])
        .map(|step| {
            vec![
                ParamExpectation::Vec2("texel_step", step),
                ParamExpectation::Float("radius", 4.0),
            ]
        })
        .collect();

    Scenario {
        label: "box_area",
        config: config(BlurFamily::Box, BlurVariant::Area)
            .with_radius(4.0)
            .with_passes(passes)
            .with_size(CANVAS_WIDTH, CANVAS_HEIGHT),
        program: ProgramId::Box1d,
        passes: steps,
    }
}

/// Gaussian/Motion along 90°: one pass with a unit direction pointing up
/// the surface and the kernel size of the sampled table.
pub fn gaussian_motion() -> Scenario {
    Scenario {
        label: "gaussian_motion_90",
        config: config(BlurFamily::Gaussian, BlurVariant::Motion)
            .with_radius(4.0)
            .with_angle(90.0)
            .with_passes(3)
            .with_size(CANVAS_WIDTH, CANVAS_HEIGHT),
        program: ProgramId::GaussianMotion,
        passes: vec![vec![
            ParamExpectation::Vec2("dir", [0.0, -1.0]),
            ParamExpectation::Int("kernel_size", 7),
            ParamExpectation::Float("radius", 4.0),
        ]],
    }
}

/// Box/Directional ignores `passes`.
pub fn box_directional() -> Scenario {
    Scenario {
        label: "box_directional_0",
        config: config(BlurFamily::Box, BlurVariant::Directional)
            .with_radius(3.0)
            .with_angle(0.0)
            .with_passes(5)
            .with_size(CANVAS_WIDTH, CANVAS_HEIGHT),
        program: ProgramId::Box1d,
        passes: vec![vec![
            ParamExpectation::Vec2("texel_step", [1.0 / CANVAS_WIDTH as f32, 0.0]),
            ParamExpectation::Float("radius", 3.0),
        ]],
    }
}

pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        tilt_shift_1080p(),
        gaussian_zoom(),
        box_area(1),
        box_area(3),
        gaussian_motion(),
        box_directional(),
    ]
}

/// Opaque black/white checkerboard with `cell`-pixel squares, RGBA8.
pub fn checkerboard_rgba(width: u32, height: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for row in 0..height {
        for col in 0..width {
            let is_white = (row / cell + col / cell) % 2 == 0;
            let value = if is_white { 255 } else { 0 };
            let offset = ((row * width + col) * 4) as usize;
            pixels[offset..offset + 3].fill(value);
            pixels[offset + 3] = 255;
        }
    }
    pixels
}
