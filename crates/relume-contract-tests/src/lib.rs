//! Cross-crate contracts for the backend-agnostic half of the engine.
//!
//! Golden scene fixtures and hot-reload flows live in the test modules. The
//! compile witness below exists to ensure the public surface hosts wire
//! against remains usable. It is not shipped or run; it must only build.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use relume_core::{BuildReport, FrameInputs, NullFeed, RgbaPixels, ShaderStage, TextureFeed};
use relume_reflect::{classify_uniform, GpuType, SharedUniforms, UniformValue, ValueStore};
use relume_scene::{
    LayerDesc, LayerId, LayerKind, MacroDef, MeshRef, RasterStages, RenderState, SceneDesc,
    StageSource,
};
use relume_source::SourceResolver;
use relume_watch::{ChangeDetector, WatchConfig};

#[allow(dead_code)]
pub fn _compile_witness() {
    // A scene builds and validates using only public constructors.
    // Avoid `Default` for the layer: hosts spell these fields out.
    let scene = SceneDesc {
        macros: vec![MacroDef::valued("QUALITY", "2")],
        layers: vec![LayerDesc {
            name: "paint".to_string(),
            enabled: true,
            macros: vec![MacroDef::flag("FAST")],
            kind: LayerKind::Standard {
                stages: RasterStages {
                    vertex: StageSource::Inline("void main() {}".to_string()),
                    fragment: StageSource::Inline("void main() {}".to_string()),
                    geometry: None,
                },
                state: RenderState::default(),
                mesh: MeshRef::default(),
                outputs: Vec::new(),
                ssbos: Vec::new(),
            },
        }],
        ..SceneDesc::default()
    };
    let _ = scene.validate();

    // Resolution and change detection wire together through plain paths.
    let mut resolver = SourceResolver::new();
    let _ = resolver.resolve_inline("void main() {}", Path::new("."), &scene.macros);

    let mut detector = ChangeDetector::detached(WatchConfig::default());
    detector.set_stage_deps(LayerId(0), ShaderStage::Fragment, &BTreeSet::<PathBuf>::new());
    let _ = detector.drain(Instant::now());

    // Reflection stores must remain constructible with backend-agnostic values.
    let _class = classify_uniform("gain", GpuType::Float, "uniform float gain;");
    let mut values = ValueStore::new();
    values.insert("gain", GpuType::Float, &[UniformValue::Float(1.0)]);
    let mut shared = SharedUniforms::new(["gain".to_string()]);
    let _ = shared.publish("gain", GpuType::Float, &[UniformValue::Float(1.0)]);

    // The input seam stays pull-based; producers live behind the trait.
    let mut feed = NullFeed;
    let _ = feed.poll_rgba();
    let _ = RgbaPixels::solid(2, 2, [0, 0, 0, 255]);

    let _report = BuildReport::ok("paint", false, 3);
    let _ = FrameInputs::default().clamped_size();
}


mod hot_reload;
