//! scene.json schema: serde-shaped entry structs and their conversion into
//! the contract model.
//!
//! The file format is deliberately forgiving (defaults everywhere), the
//! contract model is not. Everything strict happens in `into_scene`, which
//! also runs [`SceneDesc::validate`] so a loaded scene is always structurally
//! sound.

use std::path::{Path, PathBuf};

use relume_core::EngineError;

use crate::{
    BlendFactor, BlendMode, CullMode, LayerDesc, LayerKind, MacroDef, MeshRef, RasterStages,
    RenderState, SceneDesc, SizeSpec, SsboBinding, SsboDesc, StageSource, TargetDesc, TargetKind,
    Topology,
};

fn default_true() -> bool {
    true
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_clear_depth() -> f32 {
    1.0
}

fn default_groups() -> [u32; 3] {
    [1, 1, 1]
}

/// A stage reference: either a path string or an inline source block.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum StageEntry {
    Inline { inline: String },
    Path(String),
}

impl StageEntry {
    fn into_source(self) -> StageSource {
        match self {
            StageEntry::Path(p) => StageSource::File(PathBuf::from(p)),
            StageEntry::Inline { inline } => StageSource::Inline(inline),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MacroEntry {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(untagged)]
pub enum SizeEntry {
    Pixels { width: u32, height: u32 },
    Fraction(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKindEntry {
    Color,
    Depth,
}

fn default_target_kind() -> TargetKindEntry {
    TargetKindEntry::Color
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TargetEntry {
    pub name: String,
    pub size: SizeEntry,
    #[serde(default = "default_target_kind")]
    pub kind: TargetKindEntry,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SsboEntry {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SsboBindingEntry {
    pub name: String,
    pub binding: u32,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorEntry {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl FactorEntry {
    fn to_factor(self) -> BlendFactor {
        match self {
            FactorEntry::Zero => BlendFactor::Zero,
            FactorEntry::One => BlendFactor::One,
            FactorEntry::SrcColor => BlendFactor::SrcColor,
            FactorEntry::OneMinusSrcColor => BlendFactor::OneMinusSrcColor,
            FactorEntry::DstColor => BlendFactor::DstColor,
            FactorEntry::OneMinusDstColor => BlendFactor::OneMinusDstColor,
            FactorEntry::SrcAlpha => BlendFactor::SrcAlpha,
            FactorEntry::OneMinusSrcAlpha => BlendFactor::OneMinusSrcAlpha,
            FactorEntry::DstAlpha => BlendFactor::DstAlpha,
            FactorEntry::OneMinusDstAlpha => BlendFactor::OneMinusDstAlpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendPreset {
    Off,
    Alpha,
    Additive,
}

/// Blend is a named preset or an explicit factor pair.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(untagged)]
pub enum BlendEntry {
    Pair { src: FactorEntry, dst: FactorEntry },
    Named(BlendPreset),
}

impl BlendEntry {
    fn to_mode(self) -> Option<BlendMode> {
        match self {
            BlendEntry::Named(BlendPreset::Off) => None,
            BlendEntry::Named(BlendPreset::Alpha) => Some(BlendMode::ALPHA),
            BlendEntry::Named(BlendPreset::Additive) => Some(BlendMode::ADDITIVE),
            BlendEntry::Pair { src, dst } => Some(BlendMode {
                src: src.to_factor(),
                dst: dst.to_factor(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullEntry {
    Off,
    Front,
    Back,
}

fn default_cull() -> CullEntry {
    CullEntry::Off
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyEntry {
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

fn default_topology() -> TopologyEntry {
    TopologyEntry::Triangles
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ComputeEntry {
    pub shader: StageEntry,
    #[serde(default = "default_groups")]
    pub groups: [u32; 3],
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClearEntry {
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default = "default_clear_color")]
    pub color: [f32; 4],
    #[serde(default = "default_clear_depth")]
    pub depth: f32,
}

/// One layer as written in the file. The layer's kind is inferred from which
/// keys are present: `compute`, `clear`, or the raster stage fields. Exactly
/// one of those shapes must be used.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LayerEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub macros: Vec<MacroEntry>,

    #[serde(default)]
    pub compute: Option<ComputeEntry>,
    #[serde(default)]
    pub clear: Option<ClearEntry>,

    #[serde(default)]
    pub vertex: Option<StageEntry>,
    #[serde(default)]
    pub fragment: Option<StageEntry>,
    #[serde(default)]
    pub geometry: Option<StageEntry>,

    #[serde(default)]
    pub blend: Option<BlendEntry>,
    #[serde(default)]
    pub depth_test: bool,
    #[serde(default)]
    pub depth_write: bool,
    #[serde(default = "default_cull")]
    pub cull: CullEntry,
    #[serde(default = "default_topology")]
    pub topology: TopologyEntry,

    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub ssbos: Vec<SsboBindingEntry>,
}

impl LayerEntry {
    fn has_raster_fields(&self) -> bool {
        self.vertex.is_some() || self.fragment.is_some() || self.geometry.is_some()
    }

    fn into_layer(self) -> Result<LayerDesc, String> {
        let shapes = self.compute.is_some() as u8
            + self.clear.is_some() as u8
            + self.has_raster_fields() as u8;
        if shapes != 1 {
            return Err(format!(
                "layer '{}' must declare exactly one of: vertex/fragment stages, 'compute', 'clear'",
                self.name
            ));
        }

        let macros = self.macros.into_iter().map(MacroEntry::into_def).collect();
        let ssbos: Vec<SsboBinding> = self
            .ssbos
            .into_iter()
            .map(|b| SsboBinding {
                name: b.name,
                binding: b.binding,
                offset: b.offset,
            })
            .collect();

        let kind = if let Some(c) = self.compute {
            if !self.outputs.is_empty() {
                return Err(format!(
                    "compute layer '{}' cannot declare outputs",
                    self.name
                ));
            }
            LayerKind::Compute {
                stage: c.shader.into_source(),
                groups: c.groups,
                ssbos,
            }
        } else if let Some(c) = self.clear {
            if !ssbos.is_empty() {
                return Err(format!("clear layer '{}' cannot bind ssbos", self.name));
            }
            LayerKind::Clear {
                outputs: c.outputs,
                color: c.color,
                depth: c.depth,
            }
        } else {
            let vertex = self
                .vertex
                .ok_or_else(|| format!("layer '{}' is missing a vertex stage", self.name))?;
            let fragment = self
                .fragment
                .ok_or_else(|| format!("layer '{}' is missing a fragment stage", self.name))?;
            LayerKind::Standard {
                stages: RasterStages {
                    vertex: vertex.into_source(),
                    fragment: fragment.into_source(),
                    geometry: self.geometry.map(StageEntry::into_source),
                },
                state: RenderState {
                    blend: self.blend.and_then(BlendEntry::to_mode),
                    depth_test: self.depth_test,
                    depth_write: self.depth_write,
                    cull: match self.cull {
                        CullEntry::Off => CullMode::Off,
                        CullEntry::Front => CullMode::Front,
                        CullEntry::Back => CullMode::Back,
                    },
                    topology: match self.topology {
                        TopologyEntry::Triangles => Topology::Triangles,
                        TopologyEntry::TriangleStrip => Topology::TriangleStrip,
                        TopologyEntry::Lines => Topology::Lines,
                        TopologyEntry::LineStrip => Topology::LineStrip,
                        TopologyEntry::Points => Topology::Points,
                    },
                },
                mesh: match self.mesh {
                    Some(name) => MeshRef::Named(name),
                    None => MeshRef::FullscreenTriangle,
                },
                outputs: self.outputs,
                ssbos,
            }
        };

        Ok(LayerDesc {
            name: self.name,
            enabled: self.enabled,
            macros,
            kind,
        })
    }
}

impl MacroEntry {
    fn into_def(self) -> MacroDef {
        MacroDef {
            name: self.name,
            value: self.value,
        }
    }
}

/// Top-level scene.json shape.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub macros: Vec<MacroEntry>,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    #[serde(default)]
    pub ssbos: Vec<SsboEntry>,
    #[serde(default)]
    pub shared_uniforms: Vec<String>,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
}

impl SceneFile {
    /// Convert into the contract model and validate it.
    pub fn into_scene(self) -> Result<SceneDesc, String> {
        let scene = SceneDesc {
            macros: self.macros.into_iter().map(MacroEntry::into_def).collect(),
            targets: self
                .targets
                .into_iter()
                .map(|t| TargetDesc {
                    name: t.name,
                    size: match t.size {
                        SizeEntry::Fraction(f) => SizeSpec::Relative(f),
                        SizeEntry::Pixels { width, height } => SizeSpec::Absolute { width, height },
                    },
                    kind: match t.kind {
                        TargetKindEntry::Color => TargetKind::Color,
                        TargetKindEntry::Depth => TargetKind::Depth,
                    },
                })
                .collect(),
            ssbos: self
                .ssbos
                .into_iter()
                .map(|s| SsboDesc {
                    name: s.name,
                    size_bytes: s.size_bytes,
                })
                .collect(),
            shared_uniforms: self.shared_uniforms,
            layers: self
                .layers
                .into_iter()
                .map(LayerEntry::into_layer)
                .collect::<Result<Vec<_>, _>>()?,
        };
        scene.validate()?;
        Ok(scene)
    }
}

/// Load and validate a scene description from a JSON file.
pub fn load_scene(path: &Path) -> Result<SceneDesc, EngineError> {
    let file: SceneFile = relume_core::load_typed_json(path)?;
    file.into_scene().map_err(|msg| EngineError::InvalidScene {
        path: path.to_path_buf(),
        msg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<SceneDesc, String> {
        let file: SceneFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        file.into_scene()
    }

    #[test]
    fn minimal_raster_layer_gets_defaults() {
        let scene = parse(
            r#"{
                "layers": [
                    { "name": "main", "vertex": "fs.vert", "fragment": "main.frag" }
                ]
            }"#,
        )
        .expect("minimal scene should parse");

        assert_eq!(scene.layers.len(), 1);
        let layer = &scene.layers[0];
        assert!(layer.enabled);
        match &layer.kind {
            LayerKind::Standard {
                stages,
                state,
                mesh,
                outputs,
                ssbos,
            } => {
                assert_eq!(
                    stages.fragment,
                    StageSource::File(PathBuf::from("main.frag"))
                );
                assert!(stages.geometry.is_none());
                assert_eq!(*state, RenderState::default());
                assert_eq!(*mesh, MeshRef::FullscreenTriangle);
                assert!(outputs.is_empty());
                assert!(ssbos.is_empty());
            }
            other => panic!("expected standard layer, got {other:?}"),
        }
    }

    #[test]
    fn full_scene_parses_all_layer_kinds() {
        let scene = parse(
            r#"{
                "macros": [ { "name": "TRAIL", "value": "1" } ],
                "targets": [
                    { "name": "trail", "size": 1.0 },
                    { "name": "sim", "size": { "width": 512, "height": 512 } }
                ],
                "ssbos": [ { "name": "particles", "size_bytes": 1048576 } ],
                "shared_uniforms": [ "gain" ],
                "layers": [
                    {
                        "name": "step",
                        "compute": { "shader": "step.comp", "groups": [64, 1, 1] },
                        "ssbos": [ { "name": "particles", "binding": 0 } ]
                    },
                    { "name": "wipe", "clear": { "outputs": ["trail"] } },
                    {
                        "name": "draw",
                        "vertex": "fs.vert",
                        "fragment": "draw.frag",
                        "blend": "additive",
                        "outputs": ["trail"],
                        "ssbos": [ { "name": "particles", "binding": 0 } ]
                    }
                ]
            }"#,
        )
        .expect("full scene should parse");

        assert_eq!(scene.targets.len(), 2);
        assert_eq!(scene.shared_uniforms, vec!["gain".to_string()]);
        assert!(matches!(scene.layers[0].kind, LayerKind::Compute { groups: [64, 1, 1], .. }));
        assert!(matches!(scene.layers[1].kind, LayerKind::Clear { .. }));
        match &scene.layers[2].kind {
            LayerKind::Standard { state, .. } => {
                assert_eq!(state.blend, Some(BlendMode::ADDITIVE));
            }
            other => panic!("expected standard layer, got {other:?}"),
        }
    }

    #[test]
    fn mixed_stage_shapes_are_rejected() {
        let err = parse(
            r#"{
                "layers": [
                    {
                        "name": "bad",
                        "fragment": "a.frag",
                        "vertex": "a.vert",
                        "compute": { "shader": "a.comp" }
                    }
                ]
            }"#,
        )
        .expect_err("raster + compute must be rejected");
        assert!(err.contains("exactly one"), "unexpected err: {err}");
    }

    #[test]
    fn raster_layer_without_fragment_is_rejected() {
        let err = parse(
            r#"{ "layers": [ { "name": "bad", "vertex": "a.vert" } ] }"#,
        )
        .expect_err("missing fragment must be rejected");
        assert!(err.contains("missing a fragment"), "unexpected err: {err}");
    }

    #[test]
    fn inline_stage_source_is_supported() {
        let scene = parse(
            r#"{
                "layers": [
                    {
                        "name": "main",
                        "vertex": { "inline": "void main(){}" },
                        "fragment": "main.frag"
                    }
                ]
            }"#,
        )
        .expect("inline stage should parse");

        match &scene.layers[0].kind {
            LayerKind::Standard { stages, .. } => {
                assert_eq!(stages.vertex, StageSource::Inline("void main(){}".into()));
            }
            other => panic!("expected standard layer, got {other:?}"),
        }
    }

    #[test]
    fn explicit_blend_pair_is_supported() {
        let scene = parse(
            r#"{
                "layers": [
                    {
                        "name": "main",
                        "vertex": "a.vert",
                        "fragment": "a.frag",
                        "blend": { "src": "src_alpha", "dst": "one" }
                    }
                ]
            }"#,
        )
        .expect("blend pair should parse");

        match &scene.layers[0].kind {
            LayerKind::Standard { state, .. } => {
                assert_eq!(
                    state.blend,
                    Some(BlendMode {
                        src: BlendFactor::SrcAlpha,
                        dst: BlendFactor::One,
                    })
                );
            }
            other => panic!("expected standard layer, got {other:?}"),
        }
    }

    #[test]
    fn conversion_runs_structural_validation() {
        let err = parse(
            r#"{
                "layers": [
                    { "name": "a", "vertex": "v", "fragment": "f", "outputs": ["ghost"] }
                ]
            }"#,
        )
        .expect_err("dangling output must be rejected");
        assert!(err.contains("undeclared target"), "unexpected err: {err}");
    }
}
