use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glow::HasContext;

use relume_core::{BuildReport, EngineError, FrameInputs, RgbaPixels, ShaderStage, StageDiagnostic};
use relume_reflect::{SharedUniforms, UniformClass, UniformValue};
use relume_scene::{LayerId, SceneDesc, StageSource};
use relume_source::SourceResolver;

use crate::blit::Blitter;
use crate::exec::{execute_layers, LayerExec};
use crate::mesh::MeshRegistry;
use crate::program::{build_program, CompiledProgram};
use crate::reflect::{reflect_program, UniformReflectionContext};
use crate::ssbo::SsboPool;
use crate::swapchain::SwapChain;
use crate::texture::TextureCache;

/// Per-layer build state. `program` is always the last program that linked;
/// a failed rebuild leaves it untouched so the layer keeps rendering.
struct LayerSlot {
    program: Option<CompiledProgram>,
    reflection: UniformReflectionContext,
    /// Files each stage depends on, recorded for the most recent rebuild
    /// attempt whether or not it succeeded. Hosts register watches off this
    /// so a broken include tree still retriggers on edit.
    watch_deps: Vec<(ShaderStage, BTreeSet<PathBuf>)>,
}

impl LayerSlot {
    fn empty() -> Self {
        Self {
            program: None,
            reflection: UniformReflectionContext::empty(),
            watch_deps: Vec::new(),
        }
    }
}

/// Host-facing summary of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStatus {
    pub id: LayerId,
    pub name: String,
    pub enabled: bool,
    /// False until the first successful build (always false for clear
    /// layers, which have nothing to compile).
    pub built: bool,
    pub uniform_count: usize,
}

/// One scene live on one GL context: programs, targets, buffers, reflection
/// state and the source resolver, owned together so hot reloads and frames
/// never race.
///
/// All GPU mutation happens through `&mut self` methods that take the
/// context, on whatever thread owns that context.
pub struct RenderSession {
    scene: SceneDesc,
    scene_dir: PathBuf,
    resolver: SourceResolver,
    shared: SharedUniforms,
    layers: Vec<LayerSlot>,
    swap: SwapChain,
    meshes: MeshRegistry,
    ssbos: SsboPool,
    textures: TextureCache,
    scratch_fbo: glow::NativeFramebuffer,
    blitter: Blitter,
}

impl RenderSession {
    /// Create the GPU scaffolding for a validated scene. No shader is
    /// compiled yet; call [`rebuild_all`](Self::rebuild_all) next and show
    /// its reports.
    pub unsafe fn new(
        gl: &glow::Context,
        scene: SceneDesc,
        scene_dir: impl Into<PathBuf>,
        surface_w: i32,
        surface_h: i32,
    ) -> Result<Self, EngineError> {
        scene.validate().map_err(EngineError::Validate)?;

        let swap = SwapChain::new(gl, &scene.targets, surface_w, surface_h)?;
        let meshes = MeshRegistry::new(gl)?;
        let ssbos = SsboPool::new(gl, &scene.ssbos)?;
        let scratch_fbo = gl
            .create_framebuffer()
            .map_err(|e| EngineError::GlCreate(format!("create_framebuffer failed: {e:?}")))?;
        let blitter = Blitter::new(gl)?;

        let shared = SharedUniforms::new(scene.shared_uniforms.iter().cloned());
        let layers = scene.layers.iter().map(|_| LayerSlot::empty()).collect();

        Ok(Self {
            scene,
            scene_dir: scene_dir.into(),
            resolver: SourceResolver::new(),
            shared,
            layers,
            swap,
            meshes,
            ssbos,
            textures: TextureCache::new(),
            scratch_fbo,
            blitter,
        })
    }

    pub fn scene(&self) -> &SceneDesc {
        &self.scene
    }

    pub fn layer_statuses(&self) -> Vec<LayerStatus> {
        self.scene
            .layers
            .iter()
            .zip(&self.layers)
            .enumerate()
            .map(|(i, (desc, slot))| LayerStatus {
                id: LayerId(i as u32),
                name: desc.name.clone(),
                enabled: desc.enabled,
                built: slot.program.is_some(),
                uniform_count: slot.reflection.uniforms.len(),
            })
            .collect()
    }

    // ---------------------------------------------------------------------------------------------
    // Rebuilding
    // ---------------------------------------------------------------------------------------------

    /// Drop a cached source file after a change notification so the next
    /// rebuild rereads it from disk.
    pub fn invalidate_source(&mut self, path: &Path) {
        self.resolver.invalidate(path);
    }

    /// Rebuild every compilable layer in scene order.
    pub unsafe fn rebuild_all(&mut self, gl: &glow::Context) -> Vec<BuildReport> {
        let ids: Vec<LayerId> = self.scene.layer_ids().collect();
        ids.into_iter()
            .filter_map(|id| self.rebuild_layer(gl, id))
            .collect()
    }

    /// Rebuild one layer: resolve, compile, link, reflect, migrate values.
    /// Returns `None` when the id is unknown or the layer has nothing to
    /// compile.
    pub unsafe fn rebuild_layer(&mut self, gl: &glow::Context, id: LayerId) -> Option<BuildReport> {
        let index = id.0 as usize;
        let desc = self.scene.layer(id)?;
        let stage_set = desc.stage_set()?;
        let name = desc.name.clone();
        let mut macros = self.scene.macros.clone();
        macros.extend(desc.macros.iter().cloned());

        // Resolve every stage up front, collecting failures so the report
        // covers all broken stages of this edit at once.
        let mut resolved = Vec::new();
        let mut watch_deps: Vec<(ShaderStage, BTreeSet<PathBuf>)> = Vec::new();
        let mut diagnostics = Vec::new();
        for (stage, source) in stage_set.stages() {
            let (root, result) = match source {
                StageSource::Inline(text) => (
                    None,
                    self.resolver.resolve_inline(text, &self.scene_dir, &macros),
                ),
                StageSource::File(p) => {
                    let full = if p.is_absolute() {
                        p.clone()
                    } else {
                        self.scene_dir.join(p)
                    };
                    let r = self.resolver.resolve_file(&full, &macros);
                    (Some(full), r)
                }
            };
            match result {
                Ok(src) => {
                    watch_deps.push((stage, src.deps.clone()));
                    resolved.push((stage, src));
                }
                Err(e) => {
                    // Keep watching the root so fixing the file retriggers.
                    let deps = root.into_iter().collect();
                    watch_deps.push((stage, deps));
                    diagnostics.push(StageDiagnostic {
                        stage,
                        log: e.to_string(),
                    });
                }
            }
        }

        let deps_changed = self.layers[index].watch_deps != watch_deps;
        self.layers[index].watch_deps = watch_deps;

        if !diagnostics.is_empty() {
            return Some(BuildReport::failed(name, EngineError::StageCompile { diagnostics }));
        }

        let compiled = match build_program(gl, resolved) {
            Ok(c) => c,
            Err(e) => return Some(BuildReport::failed(name, e)),
        };

        let previous = self.layers[index].reflection.value_store();
        let flattened = compiled
            .source_for(stage_set.reflection_stage())
            .map(|s| s.text.clone())
            .unwrap_or_default();
        let ctx = reflect_program(gl, compiled.program, &flattened, &previous, &self.shared);

        // First build of a shared name seeds the canonical value; later
        // builds republish what they just adopted, which is a no-op.
        for u in &ctx.uniforms {
            if matches!(u.class, UniformClass::Value(_)) {
                self.shared.publish(&u.name, u.ty, &u.values);
            }
        }

        let uniform_count = ctx.uniforms.len();
        let slot = &mut self.layers[index];
        if let Some(mut old) = slot.program.replace(compiled) {
            old.destroy(gl);
        }
        slot.reflection = ctx;

        Some(BuildReport::ok(name, deps_changed, uniform_count))
    }

    /// Files each stage of a layer currently depends on, for watch
    /// registration.
    pub fn stage_deps(&self, id: LayerId) -> &[(ShaderStage, BTreeSet<PathBuf>)] {
        self.layers
            .get(id.0 as usize)
            .map(|s| s.watch_deps.as_slice())
            .unwrap_or(&[])
    }

    // ---------------------------------------------------------------------------------------------
    // Frame loop
    // ---------------------------------------------------------------------------------------------

    /// Render every enabled layer, then present the screen target to the
    /// default framebuffer.
    pub unsafe fn render_frame(&mut self, gl: &glow::Context, inputs: &FrameInputs) {
        let execs: Vec<LayerExec<'_>> = self
            .scene
            .layers
            .iter()
            .zip(&self.layers)
            .map(|(desc, slot)| LayerExec {
                desc,
                program: slot.program.as_ref().map(|p| p.program),
                reflection: &slot.reflection,
            })
            .collect();
        execute_layers(
            gl,
            &self.scene,
            &execs,
            &mut self.swap,
            &self.meshes,
            &self.ssbos,
            &mut self.textures,
            self.scratch_fbo,
            &self.scene_dir,
            inputs,
        );

        let (w, h) = inputs.clamped_size();
        self.blitter
            .blit(gl, self.meshes.fullscreen(), self.swap.write_screen().tex, w, h);
    }

    /// Resize every render target for a new surface size, synchronously.
    /// Zero or negative sizes (minimized window) are ignored.
    pub unsafe fn resize(&mut self, gl: &glow::Context, w: i32, h: i32) {
        self.swap.resize_surface(gl, w, h);
    }

    // ---------------------------------------------------------------------------------------------
    // Host-driven state
    // ---------------------------------------------------------------------------------------------

    pub fn set_layer_enabled(&mut self, id: LayerId, enabled: bool) -> bool {
        match self.scene.layers.get_mut(id.0 as usize) {
            Some(desc) => {
                desc.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn uniforms(&self, id: LayerId) -> Option<&UniformReflectionContext> {
        self.layers.get(id.0 as usize).map(|s| &s.reflection)
    }

    /// Set a user-editable uniform. Rejected (returns false) for unknown
    /// names, builtins, samplers and type mismatches. A shared name is
    /// propagated to every layer in the same call.
    pub fn set_uniform_value(&mut self, id: LayerId, name: &str, values: &[UniformValue]) -> bool {
        let ty = {
            let Some(slot) = self.layers.get_mut(id.0 as usize) else {
                return false;
            };
            let Some(u) = slot.reflection.uniform_mut(name) else {
                return false;
            };
            if !matches!(u.class, UniformClass::Value(_)) {
                return false;
            }
            if values.is_empty() || values.iter().any(|v| v.gpu_type() != u.ty) {
                return false;
            }
            let n = u.values.len().min(values.len());
            u.values[..n].clone_from_slice(&values[..n]);
            u.ty
        };

        if self.shared.is_shared(name) {
            self.shared.publish(name, ty, values);
            for slot in &mut self.layers {
                if let Some(u) = slot.reflection.uniform_mut(name) {
                    if u.ty == ty && matches!(u.class, UniformClass::Value(_)) {
                        let n = u.values.len().min(values.len());
                        u.values[..n].clone_from_slice(&values[..n]);
                    }
                }
            }
        }
        true
    }

    pub unsafe fn register_mesh(
        &mut self,
        gl: &glow::Context,
        name: impl Into<String>,
        verts: &[f32],
    ) -> Result<(), EngineError> {
        self.meshes.register(gl, name, verts)
    }

    /// Hand a decoded image to the sampler cache. Relative paths are taken
    /// relative to the scene file, matching binding comments.
    pub unsafe fn register_file_texture(
        &mut self,
        gl: &glow::Context,
        path: impl Into<PathBuf>,
        pixels: &RgbaPixels,
    ) -> Result<(), EngineError> {
        let path = path.into();
        let full = if path.is_absolute() {
            path
        } else {
            self.scene_dir.join(path)
        };
        self.textures.register_file(gl, full, pixels)
    }

    /// Upload this frame's external input texture (`input or ...` bindings).
    pub unsafe fn update_input(
        &mut self,
        gl: &glow::Context,
        pixels: &RgbaPixels,
    ) -> Result<(), EngineError> {
        self.textures.update_input(gl, pixels)
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        for slot in &mut self.layers {
            if let Some(mut p) = slot.program.take() {
                p.destroy(gl);
            }
        }
        self.swap.destroy(gl);
        self.meshes.destroy(gl);
        self.ssbos.destroy(gl);
        self.textures.destroy(gl);
        self.blitter.destroy(gl);
        gl.delete_framebuffer(self.scratch_fbo);
    }
}
