#![forbid(unsafe_code)]

//! relume scene vocabulary: the ordered pass list and everything a pass
//! declares.
//!
//! This crate is **contract-only**: no windowing, no OS policy, no GL
//! handles. A scene is data; the runtime backend decides how to realize it.
//! Layer kinds are a closed sum type so executors match exhaustively instead
//! of probing.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod schema;

pub use schema::load_scene;

use std::collections::HashSet;
use std::path::PathBuf;

use relume_core::ShaderStage;

/// Identity of a layer inside one scene: its declaration index.
///
/// Execution order and identity are the same thing by contract; reordering
/// layers is a scene edit, not a runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

/// Name of the implicit default target backed by the host surface size.
pub const SCREEN_TARGET: &str = "screen";

// -------------------------------------------------------------------------------------------------
// Stage sources
// -------------------------------------------------------------------------------------------------

/// Where one stage's root source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSource {
    File(PathBuf),
    Inline(String),
}

impl StageSource {
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            StageSource::File(p) => Some(p),
            StageSource::Inline(_) => None,
        }
    }
}

/// The raster half of the stage pairing rule: vertex + fragment mandatory,
/// geometry optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterStages {
    pub vertex: StageSource,
    pub fragment: StageSource,
    pub geometry: Option<StageSource>,
}

/// Exactly one of {compute} XOR {vertex, fragment, geometry}; the enum is
/// the invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderStageSet {
    Raster(RasterStages),
    Compute(StageSource),
}

impl ShaderStageSet {
    /// Stages in compile order.
    pub fn stages(&self) -> Vec<(ShaderStage, &StageSource)> {
        match self {
            ShaderStageSet::Raster(r) => {
                let mut v = vec![
                    (ShaderStage::Vertex, &r.vertex),
                    (ShaderStage::Fragment, &r.fragment),
                ];
                if let Some(g) = &r.geometry {
                    v.push((ShaderStage::Geometry, g));
                }
                v
            }
            ShaderStageSet::Compute(c) => vec![(ShaderStage::Compute, c)],
        }
    }

    /// The stage whose flattened text drives uniform ordering (fragment for
    /// raster sets, compute otherwise).
    pub fn reflection_stage(&self) -> ShaderStage {
        match self {
            ShaderStageSet::Raster(_) => ShaderStage::Fragment,
            ShaderStageSet::Compute(_) => ShaderStage::Compute,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Render state
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
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

/// Source/destination factor pair; `None` at the use site means blending off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendMode {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendMode {
    pub const ALPHA: BlendMode = BlendMode {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    pub const ADDITIVE: BlendMode = BlendMode {
        src: BlendFactor::One,
        dst: BlendFactor::One,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    Off,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// Fixed-function state one standard layer draws with. The executor applies
/// this before the draw and resets everything to `RenderState::default()`
/// after the last layer so external rendering (UI) is unaffected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub blend: Option<BlendMode>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull: CullMode,
    pub topology: Topology,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: None,
            depth_test: false,
            depth_write: false,
            cull: CullMode::Off,
            topology: Topology::Triangles,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Targets, buffers, macros, meshes
// -------------------------------------------------------------------------------------------------

/// Declared size of a render target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    Absolute { width: u32, height: u32 },
    /// Fraction of the host surface (1.0 = full size).
    Relative(f32),
}

impl SizeSpec {
    /// Concrete pixel size against the current surface, floored at 1x1.
    pub fn resolve(&self, surface_w: i32, surface_h: i32) -> (i32, i32) {
        match *self {
            SizeSpec::Absolute { width, height } => (width.max(1) as i32, height.max(1) as i32),
            SizeSpec::Relative(f) => {
                let w = (surface_w.max(1) as f32 * f).round() as i32;
                let h = (surface_h.max(1) as f32 * f).round() as i32;
                (w.max(1), h.max(1))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Color,
    Depth,
}

/// A named offscreen texture layers can write and later layers can sample
/// (previous-frame contents, via the swap chain).
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDesc {
    pub name: String,
    pub size: SizeSpec,
    pub kind: TargetKind,
}

/// Scene-level shader storage buffer declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsboDesc {
    pub name: String,
    pub size_bytes: u64,
}

/// A layer's request to see a declared SSBO at a binding index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsboBinding {
    pub name: String,
    pub binding: u32,
    /// Byte offset into the buffer; 0 binds the whole buffer.
    pub offset: u64,
}

/// A preprocessor definition injected by the source resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    pub value: Option<String>,
}

impl MacroDef {
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn valued(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn to_define_line(&self) -> String {
        match &self.value {
            Some(v) => format!("#define {} {}", self.name, v),
            None => format!("#define {}", self.name),
        }
    }
}

/// What geometry a standard layer draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshRef {
    /// The runtime's own fullscreen triangle.
    FullscreenTriangle,
    /// A mesh the host registered by name.
    Named(String),
}

impl Default for MeshRef {
    fn default() -> Self {
        MeshRef::FullscreenTriangle
    }
}

// -------------------------------------------------------------------------------------------------
// Layers and scene
// -------------------------------------------------------------------------------------------------

/// The closed set of pass kinds the executor understands.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Standard {
        stages: RasterStages,
        state: RenderState,
        mesh: MeshRef,
        /// Declared output targets; empty means draw to `screen`.
        outputs: Vec<String>,
        ssbos: Vec<SsboBinding>,
    },
    Compute {
        stage: StageSource,
        /// Fixed dispatch group counts (x, y, z).
        groups: [u32; 3],
        ssbos: Vec<SsboBinding>,
    },
    Clear {
        outputs: Vec<String>,
        color: [f32; 4],
        depth: f32,
    },
}

/// One pass in the scene's ordered list.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDesc {
    pub name: String,
    pub enabled: bool,
    /// Layer-level macros, injected after the scene-level ones.
    pub macros: Vec<MacroDef>,
    pub kind: LayerKind,
}

impl LayerDesc {
    /// Stage set for compilable layers; `None` for clear layers.
    pub fn stage_set(&self) -> Option<ShaderStageSet> {
        match &self.kind {
            LayerKind::Standard { stages, .. } => Some(ShaderStageSet::Raster(stages.clone())),
            LayerKind::Compute { stage, .. } => Some(ShaderStageSet::Compute(stage.clone())),
            LayerKind::Clear { .. } => None,
        }
    }

    /// Output target names this layer writes (empty = screen only).
    pub fn outputs(&self) -> &[String] {
        match &self.kind {
            LayerKind::Standard { outputs, .. } => outputs,
            LayerKind::Clear { outputs, .. } => outputs,
            LayerKind::Compute { .. } => &[],
        }
    }

    pub fn ssbo_bindings(&self) -> &[SsboBinding] {
        match &self.kind {
            LayerKind::Standard { ssbos, .. } => ssbos,
            LayerKind::Compute { ssbos, .. } => ssbos,
            LayerKind::Clear { .. } => &[],
        }
    }
}

/// The full scene description consumed by the runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDesc {
    /// Scene-level macros, injected before every layer's own.
    pub macros: Vec<MacroDef>,
    pub targets: Vec<TargetDesc>,
    pub ssbos: Vec<SsboDesc>,
    /// Uniform names kept in lock-step across layers by the reflection layer.
    pub shared_uniforms: Vec<String>,
    pub layers: Vec<LayerDesc>,
}

impl SceneDesc {
    pub fn layer(&self, id: LayerId) -> Option<&LayerDesc> {
        self.layers.get(id.0 as usize)
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        (0..self.layers.len() as u32).map(LayerId)
    }

    /// Look up a declared target by name, or by decimal index into the
    /// declaration list (the binding-comment protocol allows both).
    pub fn target_by_ref(&self, name_or_index: &str) -> Option<&TargetDesc> {
        if let Ok(idx) = name_or_index.parse::<usize>() {
            return self.targets.get(idx);
        }
        self.targets.iter().find(|t| t.name == name_or_index)
    }

    /// Structural validation. Catches what the schema's types cannot:
    /// dangling names, duplicates, degenerate sizes and group counts.
    pub fn validate(&self) -> Result<(), String> {
        let mut target_names: HashSet<&str> = HashSet::new();
        for t in &self.targets {
            if t.name.is_empty() {
                return Err("target with empty name".to_string());
            }
            if t.name == SCREEN_TARGET {
                return Err(format!("target name '{SCREEN_TARGET}' is reserved"));
            }
            if !target_names.insert(t.name.as_str()) {
                return Err(format!("duplicate target name '{}'", t.name));
            }
            if let SizeSpec::Relative(f) = t.size {
                if !(f > 0.0) {
                    return Err(format!("target '{}' has non-positive relative size", t.name));
                }
            }
        }

        let mut ssbo_names: HashSet<&str> = HashSet::new();
        for s in &self.ssbos {
            if s.name.is_empty() {
                return Err("ssbo with empty name".to_string());
            }
            if !ssbo_names.insert(s.name.as_str()) {
                return Err(format!("duplicate ssbo name '{}'", s.name));
            }
            if s.size_bytes == 0 {
                return Err(format!("ssbo '{}' has zero size", s.name));
            }
        }

        let mut layer_names: HashSet<&str> = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                return Err("layer with empty name".to_string());
            }
            if !layer_names.insert(layer.name.as_str()) {
                return Err(format!("duplicate layer name '{}'", layer.name));
            }

            for out in layer.outputs() {
                if out != SCREEN_TARGET && !target_names.contains(out.as_str()) {
                    return Err(format!(
                        "layer '{}' writes undeclared target '{out}'",
                        layer.name
                    ));
                }
            }

            let mut bound: HashSet<u32> = HashSet::new();
            for b in layer.ssbo_bindings() {
                if !ssbo_names.contains(b.name.as_str()) {
                    return Err(format!(
                        "layer '{}' binds undeclared ssbo '{}'",
                        layer.name, b.name
                    ));
                }
                if !bound.insert(b.binding) {
                    return Err(format!(
                        "layer '{}' binds index {} twice",
                        layer.name, b.binding
                    ));
                }
            }

            if let LayerKind::Compute { groups, .. } = &layer.kind {
                if groups.contains(&0) {
                    return Err(format!(
                        "layer '{}' dispatches zero groups ({:?})",
                        layer.name, groups
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_layer(name: &str, outputs: Vec<String>) -> LayerDesc {
        LayerDesc {
            name: name.to_string(),
            enabled: true,
            macros: vec![],
            kind: LayerKind::Standard {
                stages: RasterStages {
                    vertex: StageSource::Inline("void main(){}".into()),
                    fragment: StageSource::Inline("void main(){}".into()),
                    geometry: None,
                },
                state: RenderState::default(),
                mesh: MeshRef::default(),
                outputs,
                ssbos: vec![],
            },
        }
    }

    #[test]
    fn valid_scene_passes_validation() {
        let scene = SceneDesc {
            targets: vec![TargetDesc {
                name: "feedback".into(),
                size: SizeSpec::Relative(1.0),
                kind: TargetKind::Color,
            }],
            layers: vec![standard_layer("draw", vec!["feedback".into()])],
            ..SceneDesc::default()
        };
        scene.validate().expect("scene should validate");
    }

    #[test]
    fn undeclared_output_is_rejected() {
        let scene = SceneDesc {
            layers: vec![standard_layer("draw", vec!["nonesuch".into()])],
            ..SceneDesc::default()
        };
        let err = scene.validate().expect_err("must reject dangling target");
        assert!(err.contains("undeclared target"), "unexpected err: {err}");
    }

    #[test]
    fn screen_target_name_is_reserved() {
        let scene = SceneDesc {
            targets: vec![TargetDesc {
                name: SCREEN_TARGET.into(),
                size: SizeSpec::Relative(1.0),
                kind: TargetKind::Color,
            }],
            ..SceneDesc::default()
        };
        let err = scene.validate().expect_err("must reject reserved name");
        assert!(err.contains("reserved"), "unexpected err: {err}");
    }

    #[test]
    fn duplicate_layer_names_are_rejected() {
        let scene = SceneDesc {
            layers: vec![standard_layer("a", vec![]), standard_layer("a", vec![])],
            ..SceneDesc::default()
        };
        let err = scene.validate().expect_err("must reject duplicates");
        assert!(err.contains("duplicate layer name"), "unexpected err: {err}");
    }

    #[test]
    fn zero_compute_groups_are_rejected() {
        let scene = SceneDesc {
            layers: vec![LayerDesc {
                name: "sim".into(),
                enabled: true,
                macros: vec![],
                kind: LayerKind::Compute {
                    stage: StageSource::Inline("void main(){}".into()),
                    groups: [64, 0, 1],
                    ssbos: vec![],
                },
            }],
            ..SceneDesc::default()
        };
        let err = scene.validate().expect_err("must reject zero groups");
        assert!(err.contains("zero groups"), "unexpected err: {err}");
    }

    #[test]
    fn size_spec_resolution_floors_at_one_pixel() {
        let tiny = SizeSpec::Relative(0.001);
        assert_eq!(tiny.resolve(100, 100), (1, 1));

        let half = SizeSpec::Relative(0.5);
        assert_eq!(half.resolve(1920, 1080), (960, 540));

        let abs = SizeSpec::Absolute {
            width: 256,
            height: 128,
        };
        assert_eq!(abs.resolve(1, 1), (256, 128));
    }

    #[test]
    fn target_lookup_accepts_name_or_index() {
        let scene = SceneDesc {
            targets: vec![
                TargetDesc {
                    name: "a".into(),
                    size: SizeSpec::Relative(1.0),
                    kind: TargetKind::Color,
                },
                TargetDesc {
                    name: "b".into(),
                    size: SizeSpec::Relative(1.0),
                    kind: TargetKind::Color,
                },
            ],
            ..SceneDesc::default()
        };

        assert_eq!(scene.target_by_ref("b").map(|t| t.name.as_str()), Some("b"));
        assert_eq!(scene.target_by_ref("1").map(|t| t.name.as_str()), Some("b"));
        assert!(scene.target_by_ref("2").is_none());
    }
}
