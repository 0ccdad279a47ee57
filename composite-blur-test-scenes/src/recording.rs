//! A [`GpuBackend`] that records every call instead of drawing.

use std::collections::{BTreeMap, HashSet};

use composite_blur::{
    BackendError, BlendState, GpuBackend, ParamInfo, ParamType, ParamValue, COMPOSITE_PROGRAM,
};

/// Identity of a texture handed around by the recording backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    /// Supplied by the test, e.g. the filter input or a background.
    External(u32),
    /// The texture behind target `id`.
    Target(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Bytes(Vec<u8>),
    Texture(TextureRef),
}

impl RecordedValue {
    fn from_param(value: ParamValue<'_>) -> Self {
        match value {
            ParamValue::Float(v) => RecordedValue::Float(v),
            ParamValue::Int(v) => RecordedValue::Int(v),
            ParamValue::Vec2(v) => RecordedValue::Vec2(v),
            ParamValue::Bytes(v) => RecordedValue::Bytes(v.to_vec()),
        }
    }
}

/// One `draw_sprite` call with everything that was bound at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: String,
    /// Target of the enclosing capture, if there was one.
    pub target: Option<usize>,
    pub blend: Option<BlendState>,
    pub width: u32,
    pub height: u32,
    pub params: BTreeMap<String, RecordedValue>,
}

impl DrawCall {
    pub fn image(&self) -> Option<TextureRef> {
        match self.params.get("image") {
            Some(RecordedValue::Texture(texture)) => Some(*texture),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    LoadProgram { name: String, ok: bool },
    CreateTarget { id: usize, width: u32, height: u32 },
    BeginCapture { target: usize, width: u32, height: u32, ok: bool },
    Draw(DrawCall),
    EndCapture { target: usize },
    PushBlend(BlendState),
    PopBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingProgram(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingParam {
    program: usize,
    index: usize,
}

#[derive(Debug)]
pub struct RecordingTarget {
    id: usize,
    width: u32,
    height: u32,
}

impl RecordingTarget {
    pub fn id(&self) -> usize {
        self.id
    }
}

struct LoadedProgram {
    name: String,
    params: Vec<ParamInfo>,
    values: BTreeMap<String, RecordedValue>,
}

fn param(name: &str, ty: ParamType) -> ParamInfo {
    ParamInfo {
        name: name.to_owned(),
        ty,
    }
}

/// Parameter tables matching the bundled WGSL programs.
pub fn builtin_params(program: &str) -> Option<Vec<ParamInfo>> {
    let kernel = || {
        vec![
            param("weight", ParamType::Bytes(512)),
            param("offset", ParamType::Bytes(512)),
        ]
    };
    let mut params = vec![param("image", ParamType::Texture)];
    match program {
        "box_1d" => params.extend([
            param("texel_step", ParamType::Vec2),
            param("radius", ParamType::Float),
        ]),
        "box_radial" => params.extend([
            param("radial_center", ParamType::Vec2),
            param("uv_size", ParamType::Vec2),
            param("radius", ParamType::Float),
        ]),
        "box_tiltshift" => params.extend([
            param("texel_step", ParamType::Vec2),
            param("uv_size", ParamType::Vec2),
            param("radius", ParamType::Float),
            param("radius_i", ParamType::Int),
            param("top", ParamType::Float),
            param("bottom", ParamType::Float),
        ]),
        "gaussian_1d" => {
            params.extend(kernel());
            params.extend([
                param("texel_step", ParamType::Vec2),
                param("radius", ParamType::Float),
                param("kernel_size", ParamType::Int),
            ]);
        }
        "gaussian_radial" => {
            params.extend(kernel());
            params.extend([
                param("radial_center", ParamType::Vec2),
                param("uv_size", ParamType::Vec2),
                param("radius", ParamType::Float),
                param("kernel_size", ParamType::Int),
            ]);
        }
        "gaussian_motion" => {
            params.extend(kernel());
            params.extend([
                param("dir", ParamType::Vec2),
                param("radius", ParamType::Float),
                param("kernel_size", ParamType::Int),
            ]);
        }
        COMPOSITE_PROGRAM => {}
        _ => return None,
    }
    Some(params)
}

/// Records calls and hands out opaque handles. Programs default to the
/// parameter tables of the bundled shaders; tests can override or break them.
#[derive(Default)]
pub struct RecordingBackend {
    programs: Vec<LoadedProgram>,
    overrides: BTreeMap<String, Vec<ParamInfo>>,
    failing_programs: HashSet<String>,
    fail_targets: bool,
    fail_captures: bool,
    fail_capture_at: Option<usize>,
    capture_attempts: usize,
    next_target_id: usize,
    active_capture: Option<usize>,
    blend_stack: Vec<BlendState>,
    events: Vec<RecordingEvent>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every load of `name` fail until [`Self::restore_program`].
    pub fn fail_program(&mut self, name: &str) {
        self.failing_programs.insert(name.to_owned());
    }

    pub fn restore_program(&mut self, name: &str) {
        self.failing_programs.remove(name);
    }

    /// Replace the parameter table reported for `name`.
    pub fn override_params(&mut self, name: &str, params: Vec<ParamInfo>) {
        self.overrides.insert(name.to_owned(), params);
    }

    pub fn fail_target_creation(&mut self, fail: bool) {
        self.fail_targets = fail;
    }

    pub fn fail_captures(&mut self, fail: bool) {
        self.fail_captures = fail;
    }

    /// Make only the `n`th `begin_capture` from now fail (1-based).
    pub fn fail_nth_capture(&mut self, n: usize) {
        self.fail_capture_at = Some(self.capture_attempts + n);
    }

    /// Targets drawn into since the last [`Self::clear_events`], in order.
    pub fn written_targets(&self) -> Vec<usize> {
        self.draws()
            .into_iter()
            .filter_map(|draw| draw.target)
            .collect()
    }

    pub fn events(&self) -> &[RecordingEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Every draw, in issue order.
    pub fn draws(&self) -> Vec<&DrawCall> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RecordingEvent::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Draws made with the given program.
    pub fn draws_with(&self, program: &str) -> Vec<&DrawCall> {
        self.draws()
            .into_iter()
            .filter(|draw| draw.program == program)
            .collect()
    }

    /// Completed begin/end pairs.
    pub fn capture_cycles(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, RecordingEvent::EndCapture { .. }))
            .count()
    }

    pub fn program_loads(&self, name: &str) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, RecordingEvent::LoadProgram { name: loaded, .. } if loaded == name)
            })
            .count()
    }

    pub fn targets_created(&self) -> usize {
        self.next_target_id
    }

    pub fn blend_depth(&self) -> usize {
        self.blend_stack.len()
    }

    fn program(&self, program: &RecordingProgram) -> Option<&LoadedProgram> {
        self.programs.get(program.0)
    }
}

impl GpuBackend for RecordingBackend {
    type Program = RecordingProgram;
    type Param = RecordingParam;
    type Texture = TextureRef;
    type Target = RecordingTarget;

    fn load_program(&mut self, name: &str) -> Result<RecordingProgram, BackendError> {
        let params = if self.failing_programs.contains(name) {
            None
        } else {
            self.overrides
                .get(name)
                .cloned()
                .or_else(|| builtin_params(name))
        };

        self.events.push(RecordingEvent::LoadProgram {
            name: name.to_owned(),
            ok: params.is_some(),
        });

        let Some(params) = params else {
            return Err(BackendError::CompilationFailed {
                name: name.to_owned(),
                message: "load failure requested by test".to_owned(),
            });
        };

        self.programs.push(LoadedProgram {
            name: name.to_owned(),
            params,
            values: BTreeMap::new(),
        });
        Ok(RecordingProgram(self.programs.len() - 1))
    }

    fn param_count(&self, program: &RecordingProgram) -> usize {
        self.program(program).map_or(0, |program| program.params.len())
    }

    fn param_info(&self, program: &RecordingProgram, index: usize) -> Option<ParamInfo> {
        self.program(program)?.params.get(index).cloned()
    }

    fn param_by_index(&self, program: &RecordingProgram, index: usize) -> Option<RecordingParam> {
        let loaded = self.program(program)?;
        (index < loaded.params.len()).then_some(RecordingParam {
            program: program.0,
            index,
        })
    }

    fn param_by_name(&self, program: &RecordingProgram, name: &str) -> Option<RecordingParam> {
        let index = self
            .program(program)?
            .params
            .iter()
            .position(|param| param.name == name)?;
        Some(RecordingParam {
            program: program.0,
            index,
        })
    }

    fn set_param(&mut self, program: &RecordingProgram, param: RecordingParam, value: ParamValue<'_>) {
        if param.program != program.0 {
            return;
        }
        let Some(loaded) = self.programs.get_mut(program.0) else {
            return;
        };
        if let Some(info) = loaded.params.get(param.index) {
            let name = info.name.clone();
            loaded.values.insert(name, RecordedValue::from_param(value));
        }
    }

    fn set_texture(&mut self, program: &RecordingProgram, param: RecordingParam, texture: &TextureRef) {
        if param.program != program.0 {
            return;
        }
        let Some(loaded) = self.programs.get_mut(program.0) else {
            return;
        };
        if let Some(info) = loaded.params.get(param.index) {
            let name = info.name.clone();
            loaded.values.insert(name, RecordedValue::Texture(*texture));
        }
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<RecordingTarget, BackendError> {
        if self.fail_targets || width == 0 || height == 0 {
            return Err(BackendError::TargetUnavailable {
                width,
                height,
                reason: "target creation disabled".to_owned(),
            });
        }

        let id = self.next_target_id;
        self.next_target_id += 1;
        self.events
            .push(RecordingEvent::CreateTarget { id, width, height });
        Ok(RecordingTarget { id, width, height })
    }

    fn target_size(&self, target: &RecordingTarget) -> (u32, u32) {
        (target.width, target.height)
    }

    fn target_texture(&self, target: &RecordingTarget) -> TextureRef {
        TextureRef::Target(target.id)
    }

    fn begin_capture(&mut self, target: &RecordingTarget, width: u32, height: u32) -> bool {
        self.capture_attempts += 1;
        let ok = !self.fail_captures
            && self.fail_capture_at != Some(self.capture_attempts)
            && self.active_capture.is_none();
        self.events.push(RecordingEvent::BeginCapture {
            target: target.id,
            width,
            height,
            ok,
        });
        if ok {
            self.active_capture = Some(target.id);
        }
        ok
    }

    fn draw_sprite(&mut self, program: &RecordingProgram, width: u32, height: u32) {
        let Some(loaded) = self.programs.get(program.0) else {
            return;
        };
        self.events.push(RecordingEvent::Draw(DrawCall {
            program: loaded.name.clone(),
            target: self.active_capture,
            blend: self.blend_stack.last().copied(),
            width,
            height,
            params: loaded.values.clone(),
        }));
    }

    fn end_capture(&mut self, target: &RecordingTarget) {
        self.active_capture = None;
        self.events
            .push(RecordingEvent::EndCapture { target: target.id });
    }

    fn push_blend_state(&mut self, state: BlendState) {
        self.blend_stack.push(state);
        self.events.push(RecordingEvent::PushBlend(state));
    }

    fn pop_blend_state(&mut self) {
        self.blend_stack.pop();
        self.events.push(RecordingEvent::PopBlend);
    }
}
