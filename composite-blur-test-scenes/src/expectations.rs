use crate::recording::{DrawCall, RecordedValue, RecordingBackend};

/// Expected value of one parameter at draw time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamExpectation {
    Float(&'static str, f32),
    Int(&'static str, i32),
    Vec2(&'static str, [f32; 2]),
    /// The parameter must not have been set.
    Unset(&'static str),
}

const FLOAT_TOLERANCE: f32 = 1e-5;

fn close(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() <= FLOAT_TOLERANCE
}

/// Validates the parameters recorded for a draw.
///
/// Returns a list of human-readable failure descriptions. An empty list means
/// all expectations passed.
pub fn check_draw(label: &str, draw: &DrawCall, expectations: &[ParamExpectation]) -> Vec<String> {
    let mut failures = Vec::new();

    for expectation in expectations {
        let (name, matches) = match expectation {
            ParamExpectation::Float(name, expected) => (
                *name,
                matches!(draw.params.get(*name), Some(RecordedValue::Float(v)) if close(*v, *expected)),
            ),
            ParamExpectation::Int(name, expected) => (
                *name,
                matches!(draw.params.get(*name), Some(RecordedValue::Int(v)) if v == expected),
            ),
            ParamExpectation::Vec2(name, [x, y]) => (
                *name,
                matches!(
                    draw.params.get(*name),
                    Some(RecordedValue::Vec2([ax, ay])) if close(*ax, *x) && close(*ay, *y)
                ),
            ),
            ParamExpectation::Unset(name) => (*name, !draw.params.contains_key(*name)),
        };

        if !matches {
            failures.push(format!(
                "[{}] `{}` on {}: expected {:?} but got {:?}",
                label,
                name,
                draw.program,
                expectation,
                draw.params.get(name),
            ));
        }
    }

    failures
}

/// Validates the number of completed capture cycles.
pub fn check_capture_cycles(label: &str, backend: &RecordingBackend, expected: usize) -> Vec<String> {
    let actual = backend.capture_cycles();
    if actual == expected {
        Vec::new()
    } else {
        vec![format!(
            "[{label}] expected {expected} capture cycles but got {actual}"
        )]
    }
}

/// A single pixel-color expectation to validate after a GPU render.
pub struct PixelExpectation {
    pub x: u32,
    pub y: u32,
    pub expected: [u8; 4],
    /// Per-channel tolerance for comparison (default 5).
    pub tolerance: u8,
    /// Human-readable label for failure messages.
    pub label: &'static str,
}

impl PixelExpectation {
    pub fn new(x: u32, y: u32, rgba: [u8; 4], label: &'static str) -> Self {
        Self {
            x,
            y,
            expected: rgba,
            tolerance: 5,
            label,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Validates pixel expectations against tightly packed RGBA8 data.
pub fn check_pixels(
    pixel_data: &[u8],
    width: u32,
    height: u32,
    expectations: &[PixelExpectation],
) -> Vec<String> {
    let mut failures = Vec::new();
    let stride = (width as usize) * 4;

    for expectation in expectations {
        if expectation.x >= width || expectation.y >= height {
            failures.push(format!(
                "[{}] pixel ({},{}) is outside canvas {}×{}",
                expectation.label, expectation.x, expectation.y, width, height,
            ));
            continue;
        }

        let offset = (expectation.y as usize) * stride + (expectation.x as usize) * 4;
        let Some(actual) = pixel_data.get(offset..offset + 4) else {
            failures.push(format!(
                "[{}] pixel ({},{}) is out of bounds (buffer len {})",
                expectation.label,
                expectation.x,
                expectation.y,
                pixel_data.len(),
            ));
            continue;
        };

        let tolerance = expectation.tolerance as i16;
        let matches = actual
            .iter()
            .zip(expectation.expected)
            .all(|(actual, expected)| channel_matches(*actual, expected, tolerance));

        if !matches {
            failures.push(format!(
                "[{}] pixel ({},{}) expected rgba{:?} ±{} but got rgba{:?}",
                expectation.label,
                expectation.x,
                expectation.y,
                expectation.expected,
                expectation.tolerance,
                actual,
            ));
        }
    }

    failures
}

fn channel_matches(actual: u8, expected: u8, tolerance: i16) -> bool {
    let diff = (actual as i16) - (expected as i16);
    diff.abs() <= tolerance
}
