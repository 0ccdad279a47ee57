pub mod expectations;
pub mod recording;
pub mod scene;

pub use expectations::{check_capture_cycles, check_draw, check_pixels, ParamExpectation, PixelExpectation};
pub use recording::{DrawCall, RecordedValue, RecordingBackend, RecordingEvent, TextureRef};
pub use scene::{all_scenarios, checkerboard_rgba, Scenario, CANVAS_HEIGHT, CANVAS_WIDTH};
