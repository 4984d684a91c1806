//! Compile and link checks over WGSL, plus the resource reflection the
//! pipeline layout and uniform cache are built from.
//!
//! Resource contract:
//! - `@group(0) @binding(0)`: the uniform block (optional), shared by both stages
//! - `@group(1)`: sampled 2D textures (one per texture slot) and one sampler

use std::collections::BTreeSet;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::render::batch::error::ShaderError;
use crate::render::batch::vertex::VertexLayout;

use super::source::{ShaderSources, Stage};

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

/// A named member of the uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    /// Byte offset inside the block.
    pub offset: u32,
    /// Byte size of the whole member.
    pub size: u32,
    /// Element stride and length, for fixed-size array members.
    pub array: Option<ArrayShape>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ArrayShape {
    pub stride: u32,
    pub len: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    /// Byte size of the block as declared.
    pub size: u32,
    pub fields: Vec<UniformField>,
}

impl UniformBlock {
    /// Buffer size: the declared size rounded up to uniform alignment.
    pub fn buffer_size(&self) -> u64 {
        wgpu::util::align_to(self.size.max(16) as u64, 16)
    }
}

/// Everything the pipeline needs to know about a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub uniform: Option<UniformBlock>,
    /// Texture bindings of group 1 in slot order (ascending binding number).
    pub textures: Vec<u32>,
    pub sampler: Option<u32>,
}

impl Reflection {
    #[inline]
    pub fn texture_slots(&self) -> u32 {
        self.textures.len() as u32
    }
}

/// Parses and validates one stage. The diagnostic carries source spans.
pub fn compile(stage: Stage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        diagnostic: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            diagnostic: e.emit_to_string(source),
        })?;

    Ok(module)
}

/// Compiles both stages and links them against `layout`.
pub fn build(sources: &ShaderSources, layout: &VertexLayout) -> Result<Reflection, ShaderError> {
    let vertex = compile(Stage::Vertex, &sources.vertex)?;
    let fragment = compile(Stage::Fragment, &sources.fragment)?;
    link(&vertex, &fragment, layout)
}

fn link_error(reason: impl Into<String>) -> ShaderError {
    ShaderError::Link {
        reason: reason.into(),
    }
}

/// Checks the stage interfaces and merges the resources of both stages.
pub fn link(
    vertex: &naga::Module,
    fragment: &naga::Module,
    layout: &VertexLayout,
) -> Result<Reflection, ShaderError> {
    let vs = single_entry(vertex, Stage::Vertex)?;
    let fs = single_entry(fragment, Stage::Fragment)?;

    for location in input_locations(vertex, vs) {
        if !layout.provides(location) {
            return Err(link_error(format!(
                "vertex input @location({location}) has no matching vertex attribute"
            )));
        }
    }

    let outputs: BTreeSet<u32> = output_locations(vertex, vs).into_iter().collect();
    for location in input_locations(fragment, fs) {
        if !outputs.contains(&location) {
            return Err(link_error(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            )));
        }
    }

    let vs_res = resources(vertex, Stage::Vertex)?;
    let fs_res = resources(fragment, Stage::Fragment)?;

    let uniform = match (vs_res.uniform, fs_res.uniform) {
        (Some(a), Some(b)) if a.size != b.size => {
            return Err(link_error(format!(
                "uniform block size differs between stages ({} vs {} bytes)",
                a.size, b.size
            )));
        }
        (Some(mut a), Some(b)) => {
            for field in b.fields {
                if !a.fields.iter().any(|f| f.name == field.name) {
                    a.fields.push(field);
                }
            }
            Some(a)
        }
        (a, b) => a.or(b),
    };

    let sampler = match (vs_res.sampler, fs_res.sampler) {
        (Some(a), Some(b)) if a != b => {
            return Err(link_error("stages declare the sampler at different bindings"));
        }
        (a, b) => a.or(b),
    };

    let textures: BTreeSet<u32> = vs_res.textures.into_iter().chain(fs_res.textures).collect();
    if !textures.is_empty() && sampler.is_none() {
        return Err(link_error("textures are declared without a sampler"));
    }
    if let Some(s) = sampler {
        if textures.contains(&s) {
            return Err(link_error(format!("binding {s} of group {TEXTURE_GROUP} is declared twice")));
        }
    }

    Ok(Reflection {
        vertex_entry: vs.name.clone(),
        fragment_entry: fs.name.clone(),
        uniform,
        textures: textures.into_iter().collect(),
        sampler,
    })
}

fn single_entry(module: &naga::Module, stage: Stage) -> Result<&naga::EntryPoint, ShaderError> {
    let mut entries = module.entry_points.iter().filter(|ep| ep.stage == stage.naga());
    match (entries.next(), entries.next()) {
        (Some(ep), None) => Ok(ep),
        (None, _) => Err(link_error(format!("{stage} stage has no @{stage} entry point"))),
        (Some(_), Some(_)) => Err(link_error(format!(
            "{stage} stage declares more than one @{stage} entry point"
        ))),
    }
}

/// User locations of an argument or result, looking through structs.
fn locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(*location),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn input_locations(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<u32> {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn output_locations(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<u32> {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

#[derive(Default)]
struct StageResources {
    uniform: Option<UniformBlock>,
    textures: Vec<u32>,
    sampler: Option<u32>,
}

fn resources(module: &naga::Module, stage: Stage) -> Result<StageResources, ShaderError> {
    let mut res = StageResources::default();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let inner = &module.types[var.ty].inner;

        match var.space {
            naga::AddressSpace::Uniform => {
                if binding.group != UNIFORM_GROUP || binding.binding != UNIFORM_BINDING {
                    return Err(link_error(format!(
                        "{stage} uniform `{name}` must be at @group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING})"
                    )));
                }
                res.uniform = Some(uniform_block(module, name, var.ty));
            }
            naga::AddressSpace::Handle => {
                if binding.group != TEXTURE_GROUP {
                    return Err(link_error(format!(
                        "{stage} resource `{name}` must be in @group({TEXTURE_GROUP})"
                    )));
                }
                match inner {
                    naga::TypeInner::Image {
                        dim: naga::ImageDimension::D2,
                        arrayed: false,
                        class: naga::ImageClass::Sampled { .. },
                    } => res.textures.push(binding.binding),
                    naga::TypeInner::Sampler { comparison: false } => {
                        if res.sampler.replace(binding.binding).is_some() {
                            return Err(link_error(format!("{stage} stage declares more than one sampler")));
                        }
                    }
                    other => {
                        return Err(link_error(format!(
                            "{stage} resource `{name}` has unsupported type {other:?}"
                        )));
                    }
                }
            }
            other => {
                return Err(link_error(format!(
                    "{stage} resource `{name}` uses unsupported address space {other:?}"
                )));
            }
        }
    }

    Ok(res)
}

fn uniform_block(module: &naga::Module, var_name: &str, ty: naga::Handle<naga::Type>) -> UniformBlock {
    let gctx = module.to_ctx();
    let inner = &module.types[ty].inner;

    let fields = match inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| Some(field(module, m.name.clone()?, m.offset, m.ty)))
            .collect(),
        // A bare `var<uniform> name: T` is addressed by the variable name.
        _ => vec![field(module, var_name.to_string(), 0, ty)],
    };

    UniformBlock {
        size: inner.size(gctx),
        fields,
    }
}

fn field(module: &naga::Module, name: String, offset: u32, ty: naga::Handle<naga::Type>) -> UniformField {
    let inner = &module.types[ty].inner;
    let array = match inner {
        naga::TypeInner::Array {
            size: naga::ArraySize::Constant(len),
            stride,
            ..
        } => Some(ArrayShape {
            stride: *stride,
            len: len.get(),
        }),
        _ => None,
    };

    UniformField {
        name,
        offset,
        size: inner.size(module.to_ctx()),
        array,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::batch::shader::DEFAULT_SHADER;

    fn default_reflection() -> Reflection {
        let sources = ShaderSources::parse(DEFAULT_SHADER).unwrap();
        build(&sources, &VertexLayout::standard()).unwrap()
    }

    const VS: &str = "
        struct Out { @builtin(position) pos: vec4<f32>, @location(0) color: vec4<f32> }
        @vertex
        fn vs_main(@location(0) p: vec3<f32>, @location(1) c: vec4<f32>) -> Out {
            var o: Out;
            o.pos = vec4<f32>(p, 1.0);
            o.color = c;
            return o;
        }
    ";

    const FS: &str = "
        @fragment
        fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
            return color;
        }
    ";

    fn link_sources(vs: &str, fs: &str) -> Result<Reflection, ShaderError> {
        build(&ShaderSources::new(vs, fs), &VertexLayout::standard())
    }

    // ── bundled shader ────────────────────────────────────────────────────

    #[test]
    fn default_shader_links() {
        let r = default_reflection();
        assert_eq!(r.vertex_entry, "vs_main");
        assert_eq!(r.fragment_entry, "fs_main");
        assert_eq!(r.textures, (0..8).collect::<Vec<u32>>());
        assert_eq!(r.sampler, Some(8));
        assert_eq!(r.texture_slots(), 8);
    }

    #[test]
    fn default_shader_uniform_layout() {
        let block = default_reflection().uniform.unwrap();
        assert_eq!(block.size, 192);
        assert_eq!(block.buffer_size(), 192);

        let mvp = block.fields.iter().find(|f| f.name == "mvp").unwrap();
        assert_eq!((mvp.offset, mvp.size, mvp.array), (0, 64, None));

        let slots = block.fields.iter().find(|f| f.name == "slots").unwrap();
        assert_eq!(slots.offset, 64);
        assert_eq!(slots.array, Some(ArrayShape { stride: 16, len: 8 }));
    }

    // ── compile ───────────────────────────────────────────────────────────

    #[test]
    fn syntax_error_reports_stage_and_diagnostic() {
        let err = compile(Stage::Vertex, "fn broken( {").unwrap_err();
        match err {
            ShaderError::Compile { stage, diagnostic } => {
                assert_eq!(stage, Stage::Vertex);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_error_is_a_compile_error() {
        // Type mismatch: returns a vec3 where a vec4 is declared.
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec3<f32>(1.0); }";
        assert!(matches!(
            compile(Stage::Fragment, src),
            Err(ShaderError::Compile { stage: Stage::Fragment, .. })
        ));
    }

    // ── link ──────────────────────────────────────────────────────────────

    #[test]
    fn minimal_program_links_without_resources() {
        let r = link_sources(VS, FS).unwrap();
        assert!(r.uniform.is_none());
        assert!(r.textures.is_empty());
        assert_eq!(r.sampler, None);
    }

    #[test]
    fn missing_vertex_entry_fails_link() {
        let err = link_sources(FS, FS).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err:?}");
    }

    #[test]
    fn vertex_input_outside_layout_fails_link() {
        let vs = "
            @vertex
            fn vs_main(@location(5) p: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(p, 1.0);
            }
        ";
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = link_sources(vs, fs).unwrap_err();
        assert_eq!(
            err,
            ShaderError::Link {
                reason: "vertex input @location(5) has no matching vertex attribute".to_string()
            }
        );
    }

    #[test]
    fn fragment_input_not_written_fails_link() {
        let fs = "
            @fragment
            fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> {
                return vec4<f32>(uv, 0.0, 1.0);
            }
        ";
        assert!(matches!(link_sources(VS, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn uniform_at_wrong_binding_fails_link() {
        let vs = "
            @group(0) @binding(1) var<uniform> scale: f32;
            @vertex
            fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(p * scale, 1.0);
            }
        ";
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(matches!(link_sources(vs, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn bare_uniform_is_named_after_variable() {
        let vs = "
            @group(0) @binding(0) var<uniform> scale: f32;
            @vertex
            fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(p * scale, 1.0);
            }
        ";
        let fs = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let block = link_sources(vs, fs).unwrap().uniform.unwrap();
        assert_eq!(block.fields.len(), 1);
        assert_eq!(block.fields[0].name, "scale");
        assert_eq!(block.fields[0].size, 4);
        assert_eq!(block.buffer_size(), 16);
    }

    #[test]
    fn textures_without_sampler_fail_link() {
        let fs = "
            @group(1) @binding(0) var t0: texture_2d<f32>;
            @fragment
            fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
                return color * textureLoad(t0, vec2<i32>(0, 0), 0);
            }
        ";
        assert!(matches!(link_sources(VS, fs), Err(ShaderError::Link { .. })));
    }
}
