//! Built-in WGSL sources and uniform-block reflection.
//!
//! Every program is a fragment-only WGSL source appended to a shared prelude
//! (fullscreen vertex stage plus the `image`/`image_sampler` bindings). Its
//! parameters are the `image` texture followed by the members of the uniform
//! struct bound at `@group(0) @binding(2)`. Each `@fragment` entry point is one
//! technique pass.

use ahash::HashMap;

use crate::backend::{BackendError, ParamInfo, ParamType, ParamValue};
use crate::pipeline::{IMAGE_BINDING, PARAMS_BINDING};

const PRELUDE: &str = include_str!("../../shaders/prelude.wgsl");

const BUILTIN_SOURCES: [(&str, &str); 7] = [
    ("box_1d", include_str!("../../shaders/box_1d.wgsl")),
    ("box_radial", include_str!("../../shaders/box_radial.wgsl")),
    ("box_tiltshift", include_str!("../../shaders/box_tiltshift.wgsl")),
    ("gaussian_1d", include_str!("../../shaders/gaussian_1d.wgsl")),
    ("gaussian_radial", include_str!("../../shaders/gaussian_radial.wgsl")),
    ("gaussian_motion", include_str!("../../shaders/gaussian_motion.wgsl")),
    ("composite", include_str!("../../shaders/composite.wgsl")),
];

/// Fragment sources the backend can compile, by program name.
#[derive(Debug, Clone)]
pub struct ShaderRegistry {
    sources: HashMap<String, String>,
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            sources: HashMap::default(),
        };
        for (name, source) in BUILTIN_SOURCES {
            registry.register(name, source);
        }
        registry
    }
}

impl ShaderRegistry {
    /// Register or replace a fragment source. It is compiled after the prelude.
    pub fn register(&mut self, name: &str, fragment_source: &str) {
        self.sources
            .insert(name.to_owned(), fragment_source.to_owned());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Full WGSL module source for a program.
    pub fn module_source(&self, name: &str) -> Result<String, BackendError> {
        let fragment = self
            .sources
            .get(name)
            .ok_or_else(|| BackendError::SourceNotFound(name.to_owned()))?;
        Ok(format!("{PRELUDE}\n{fragment}"))
    }
}

/// Where a parameter lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParamSlot {
    Image,
    /// Byte range in the uniform block.
    Uniform { offset: u32, size: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedParam {
    pub info: ParamInfo,
    pub slot: ParamSlot,
}

/// Result of parsing and validating a program module.
#[derive(Debug, Clone)]
pub(crate) struct ProgramLayout {
    pub params: Vec<ReflectedParam>,
    pub uniform_size: u32,
    /// Fragment entry points in declaration order.
    pub passes: Vec<String>,
}

impl ProgramLayout {
    pub fn has_uniforms(&self) -> bool {
        self.uniform_size > 0
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|param| param.info.name == name)
    }
}

pub(crate) fn reflect(name: &str, source: &str) -> Result<ProgramLayout, BackendError> {
    let compilation_failed = |message: String| BackendError::CompilationFailed {
        name: name.to_owned(),
        message,
    };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|error| compilation_failed(error.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|error| compilation_failed(error.to_string()))?;

    let mut params = Vec::new();
    let mut uniform_size = 0;

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        if binding.group != 0 {
            continue;
        }

        match (binding.binding, global.space) {
            (IMAGE_BINDING, naga::AddressSpace::Handle) => params.push(ReflectedParam {
                info: ParamInfo {
                    name: global.name.clone().unwrap_or_else(|| "image".to_owned()),
                    ty: ParamType::Texture,
                },
                slot: ParamSlot::Image,
            }),
            (PARAMS_BINDING, naga::AddressSpace::Uniform) => {
                let naga::TypeInner::Struct { members, span } = &module.types[global.ty].inner
                else {
                    return Err(compilation_failed(
                        "parameter block must be a struct".to_owned(),
                    ));
                };
                uniform_size = *span;

                for member in members {
                    let Some(member_name) = member.name.clone() else {
                        continue;
                    };
                    let inner = &module.types[member.ty].inner;
                    let size = inner.size(module.to_ctx());
                    params.push(ReflectedParam {
                        info: ParamInfo {
                            name: member_name,
                            ty: param_type(inner, size),
                        },
                        slot: ParamSlot::Uniform {
                            offset: member.offset,
                            size,
                        },
                    });
                }
            }
            _ => {}
        }
    }

    let passes: Vec<String> = module
        .entry_points
        .iter()
        .filter(|entry| entry.stage == naga::ShaderStage::Fragment)
        .map(|entry| entry.name.clone())
        .collect();
    if passes.is_empty() {
        return Err(compilation_failed("no fragment entry point".to_owned()));
    }

    Ok(ProgramLayout {
        params,
        uniform_size,
        passes,
    })
}

fn param_type(inner: &naga::TypeInner, size: u32) -> ParamType {
    use naga::{Scalar, TypeInner, VectorSize};

    match inner {
        TypeInner::Scalar(Scalar::F32) => ParamType::Float,
        TypeInner::Scalar(Scalar::I32) => ParamType::Int,
        TypeInner::Vector {
            size: VectorSize::Bi,
            scalar: Scalar::F32,
        } => ParamType::Vec2,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar: Scalar::F32,
        } => ParamType::Vec4,
        TypeInner::Array { .. } => ParamType::Bytes(size),
        _ => ParamType::Unknown,
    }
}

/// Write `value` into a uniform block at `offset`. Returns `false` if the
/// value does not fit the parameter's type.
pub(crate) fn write_param(
    block: &mut [u8],
    ty: ParamType,
    offset: u32,
    size: u32,
    value: ParamValue<'_>,
) -> bool {
    let bytes: &[u8] = match (ty, &value) {
        (ParamType::Float, ParamValue::Float(v)) => bytemuck::bytes_of(v),
        (ParamType::Int, ParamValue::Int(v)) => bytemuck::bytes_of(v),
        (ParamType::Vec2, ParamValue::Vec2(v)) => bytemuck::bytes_of(v),
        (ParamType::Bytes(_), ParamValue::Bytes(v)) => *v,
        _ => return false,
    };

    let start = offset as usize;
    let len = bytes.len().min(size as usize);
    let Some(dst) = block.get_mut(start..start + len) else {
        return false;
    };
    dst.copy_from_slice(&bytes[..len]);
    true
}
