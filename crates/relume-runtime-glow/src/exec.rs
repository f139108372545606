use std::path::Path;

use glow::HasContext;

use relume_core::FrameInputs;
use relume_reflect::{TextureBinding, UniformClass};
use relume_scene::{
    BlendFactor, CullMode, LayerDesc, LayerKind, RenderState, SceneDesc, TargetKind, Topology,
};

use crate::mesh::MeshRegistry;
use crate::reflect::{apply_builtin, apply_value, UniformReflectionContext};
use crate::ssbo::SsboPool;
use crate::swapchain::SwapChain;
use crate::target::RenderTarget;
use crate::texture::{BuiltinTexture, TextureCache};

pub(crate) fn blend_factor_gl(f: BlendFactor) -> u32 {
    match f {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

pub(crate) fn topology_gl(t: Topology) -> u32 {
    match t {
        Topology::Triangles => glow::TRIANGLES,
        Topology::TriangleStrip => glow::TRIANGLE_STRIP,
        Topology::Lines => glow::LINES,
        Topology::LineStrip => glow::LINE_STRIP,
        Topology::Points => glow::POINTS,
    }
}

pub(crate) unsafe fn apply_render_state(gl: &glow::Context, state: &RenderState) {
    match &state.blend {
        Some(mode) => {
            gl.enable(glow::BLEND);
            gl.blend_func(blend_factor_gl(mode.src), blend_factor_gl(mode.dst));
        }
        None => gl.disable(glow::BLEND),
    }
    if state.depth_test {
        gl.enable(glow::DEPTH_TEST);
        gl.depth_func(glow::LESS);
    } else {
        gl.disable(glow::DEPTH_TEST);
    }
    gl.depth_mask(state.depth_write);
    match state.cull {
        CullMode::Off => gl.disable(glow::CULL_FACE),
        CullMode::Back => {
            gl.enable(glow::CULL_FACE);
            gl.cull_face(glow::BACK);
        }
        CullMode::Front => {
            gl.enable(glow::CULL_FACE);
            gl.cull_face(glow::FRONT);
        }
    }
}

/// One compilable layer as the executor sees it: the descriptor, the last
/// successfully linked program (if any) and its reflection.
pub(crate) struct LayerExec<'a> {
    pub desc: &'a LayerDesc,
    pub program: Option<glow::NativeProgram>,
    pub reflection: &'a UniformReflectionContext,
}

/// Run every enabled layer in scene order against the front buffer set,
/// then return the pipeline to default state.
///
/// Swapping first means all reads in this frame see the previous frame's
/// buffers, including a layer sampling its own output target.
pub(crate) unsafe fn execute_layers(
    gl: &glow::Context,
    scene: &SceneDesc,
    layers: &[LayerExec<'_>],
    swap: &mut SwapChain,
    meshes: &MeshRegistry,
    ssbos: &SsboPool,
    textures: &mut TextureCache,
    scratch_fbo: glow::NativeFramebuffer,
    scene_dir: &Path,
    inputs: &FrameInputs,
) {
    swap.swap();

    for layer in layers {
        if !layer.desc.enabled {
            continue;
        }
        match &layer.desc.kind {
            LayerKind::Clear {
                outputs,
                color,
                depth,
            } => clear_pass(gl, swap, outputs, *color, *depth),

            LayerKind::Compute { groups, ssbos: binds, .. } => {
                let Some(program) = layer.program else {
                    continue;
                };
                gl.use_program(Some(program));
                apply_uniforms(gl, layer.reflection, inputs);
                bind_samplers(gl, layer.reflection, scene, swap, textures, scene_dir);
                ssbos.bind_layer(gl, binds);
                gl.dispatch_compute(groups[0], groups[1], groups[2]);
                gl.memory_barrier(glow::ALL_BARRIER_BITS);
            }

            LayerKind::Standard {
                state,
                mesh,
                outputs,
                ssbos: binds,
                ..
            } => {
                let Some(program) = layer.program else {
                    continue;
                };
                let bound = bind_outputs(gl, swap, scratch_fbo, outputs);
                gl.viewport(0, 0, bound.w, bound.h);
                apply_render_state(gl, state);
                gl.use_program(Some(program));
                apply_uniforms(gl, layer.reflection, inputs);
                bind_samplers(gl, layer.reflection, scene, swap, textures, scene_dir);
                ssbos.bind_layer(gl, binds);
                meshes.draw(gl, mesh, topology_gl(state.topology));
                release_outputs(gl, scratch_fbo, &bound);
            }
        }
    }

    apply_render_state(gl, &RenderState::default());
    gl.use_program(None);
    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
}

// -------------------------------------------------------------------------------------------------
// Output binding
// -------------------------------------------------------------------------------------------------

struct BoundOutputs {
    w: i32,
    h: i32,
    /// Color attachments composed on the scratch framebuffer, zero when a
    /// target's own framebuffer was used directly.
    scratch_colors: usize,
    scratch_depth: bool,
}

unsafe fn bind_outputs(
    gl: &glow::Context,
    swap: &SwapChain,
    scratch: glow::NativeFramebuffer,
    outputs: &[String],
) -> BoundOutputs {
    let direct = |rt: &RenderTarget| {
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(rt.fbo));
        BoundOutputs {
            w: rt.w,
            h: rt.h,
            scratch_colors: 0,
            scratch_depth: false,
        }
    };

    if outputs.is_empty() {
        return direct(swap.write_screen());
    }
    if outputs.len() == 1 {
        if let Some(rt) = swap.write_target(&outputs[0]) {
            return direct(rt);
        }
        tracing::debug!(target = %outputs[0], "unknown output target");
        return direct(swap.write_screen());
    }

    // Several outputs: compose them on the scratch framebuffer.
    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(scratch));
    let mut color_slots = Vec::new();
    let mut scratch_depth = false;
    let mut size = None;
    for name in outputs {
        let Some(rt) = swap.write_target(name) else {
            tracing::debug!(target = %name, "unknown output target");
            continue;
        };
        if size.is_none() {
            size = Some((rt.w, rt.h));
        }
        match rt.kind {
            TargetKind::Color => {
                let slot = glow::COLOR_ATTACHMENT0 + color_slots.len() as u32;
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    slot,
                    glow::TEXTURE_2D,
                    Some(rt.tex),
                    0,
                );
                color_slots.push(slot);
            }
            TargetKind::Depth => {
                if scratch_depth {
                    tracing::debug!(target = %name, "second depth output ignored");
                    continue;
                }
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    Some(rt.tex),
                    0,
                );
                scratch_depth = true;
            }
        }
    }
    if color_slots.is_empty() {
        gl.draw_buffers(&[glow::NONE]);
    } else {
        gl.draw_buffers(&color_slots);
    }
    let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
    if status != glow::FRAMEBUFFER_COMPLETE {
        tracing::debug!(status, "scratch framebuffer incomplete");
    }
    let (w, h) = size.unwrap_or((1, 1));
    BoundOutputs {
        w,
        h,
        scratch_colors: color_slots.len(),
        scratch_depth,
    }
}

/// Detach everything the layer composed on the scratch framebuffer so the
/// next user starts clean.
unsafe fn release_outputs(
    gl: &glow::Context,
    scratch: glow::NativeFramebuffer,
    bound: &BoundOutputs,
) {
    if bound.scratch_colors == 0 && !bound.scratch_depth {
        return;
    }
    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(scratch));
    for i in 0..bound.scratch_colors {
        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0 + i as u32,
            glow::TEXTURE_2D,
            None,
            0,
        );
    }
    if bound.scratch_depth {
        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::DEPTH_ATTACHMENT,
            glow::TEXTURE_2D,
            None,
            0,
        );
    }
    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
}

unsafe fn clear_pass(
    gl: &glow::Context,
    swap: &SwapChain,
    outputs: &[String],
    color: [f32; 4],
    depth: f32,
) {
    // A preceding layer may have left depth writes masked off.
    gl.depth_mask(true);
    if outputs.is_empty() {
        clear_target(gl, swap.write_screen(), color, depth);
        return;
    }
    for name in outputs {
        if let Some(rt) = swap.write_target(name) {
            clear_target(gl, rt, color, depth);
        }
    }
}

unsafe fn clear_target(gl: &glow::Context, rt: &RenderTarget, color: [f32; 4], depth: f32) {
    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(rt.fbo));
    match rt.kind {
        TargetKind::Color => {
            gl.clear_color(color[0], color[1], color[2], color[3]);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
        TargetKind::Depth => {
            gl.clear_depth_f32(depth);
            gl.clear(glow::DEPTH_BUFFER_BIT);
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Uniform and sampler application
// -------------------------------------------------------------------------------------------------

unsafe fn apply_uniforms(
    gl: &glow::Context,
    ctx: &UniformReflectionContext,
    inputs: &FrameInputs,
) {
    for u in &ctx.uniforms {
        match &u.class {
            UniformClass::Builtin(kind) => {
                if let Some(Some(loc)) = u.locations.first() {
                    apply_builtin(gl, loc, *kind, u.ty, inputs);
                }
            }
            UniformClass::Value(_) => {
                for (k, value) in u.values.iter().enumerate() {
                    if let Some(Some(loc)) = u.locations.get(k) {
                        apply_value(gl, loc, value);
                    }
                }
            }
            // Samplers are bound by `bind_samplers`.
            UniformClass::Sampler(_) => {}
        }
    }
}

/// Resolve every bound sampler to a texture and assign units in uniform
/// order. Reads of swap-chain targets always come from the back set, so a
/// layer can sample any target, its own output included, without hazards.
unsafe fn bind_samplers(
    gl: &glow::Context,
    ctx: &UniformReflectionContext,
    scene: &SceneDesc,
    swap: &SwapChain,
    textures: &mut TextureCache,
    scene_dir: &Path,
) {
    let mut unit: u32 = 0;
    for u in &ctx.uniforms {
        let UniformClass::Sampler(Some(binding)) = &u.class else {
            continue;
        };
        let Some(Some(loc)) = u.locations.first() else {
            continue;
        };

        let tex = resolve_binding_texture(
            gl,
            binding.prefer_input,
            &binding.source,
            scene,
            swap,
            textures,
            scene_dir,
        );
        let Some(tex) = tex else {
            continue;
        };
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.uniform_1_i32(Some(loc), unit as i32);
        unit += 1;
    }
    gl.active_texture(glow::TEXTURE0);
}

unsafe fn resolve_binding_texture(
    gl: &glow::Context,
    prefer_input: bool,
    source: &TextureBinding,
    scene: &SceneDesc,
    swap: &SwapChain,
    textures: &mut TextureCache,
    scene_dir: &Path,
) -> Option<glow::NativeTexture> {
    if prefer_input {
        if let Some(tex) = textures.input() {
            return Some(tex);
        }
    }
    match source {
        TextureBinding::Target(name_or_index) => {
            let name = scene
                .target_by_ref(name_or_index)
                .map(|t| t.name.as_str())
                .unwrap_or(name_or_index.as_str());
            match swap.read_target(name) {
                Some(rt) => Some(rt.tex),
                None => {
                    tracing::debug!(target = %name, "sampler references unknown target");
                    fallback_black(gl, textures)
                }
            }
        }
        TextureBinding::Builtin(name) => match BuiltinTexture::from_name(name) {
            Some(which) => textures.builtin(gl, which).ok(),
            None => {
                tracing::debug!(builtin = %name, "unknown builtin texture");
                fallback_black(gl, textures)
            }
        },
        TextureBinding::File(path) => {
            let full = if path.is_absolute() {
                path.clone()
            } else {
                scene_dir.join(path)
            };
            match textures.file(&full) {
                Some(tex) => Some(tex),
                None => {
                    tracing::debug!(path = %full.display(), "texture file not registered");
                    fallback_black(gl, textures)
                }
            }
        }
    }
}

unsafe fn fallback_black(
    gl: &glow::Context,
    textures: &mut TextureCache,
) -> Option<glow::NativeTexture> {
    textures.builtin(gl, BuiltinTexture::Black).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factors_map_to_gl() {
        assert_eq!(blend_factor_gl(BlendFactor::One), glow::ONE);
        assert_eq!(
            blend_factor_gl(BlendFactor::OneMinusSrcAlpha),
            glow::ONE_MINUS_SRC_ALPHA
        );
        assert_eq!(blend_factor_gl(BlendFactor::DstColor), glow::DST_COLOR);
    }

    #[test]
    fn topologies_map_to_gl() {
        assert_eq!(topology_gl(Topology::Triangles), glow::TRIANGLES);
        assert_eq!(topology_gl(Topology::LineStrip), glow::LINE_STRIP);
        assert_eq!(topology_gl(Topology::Points), glow::POINTS);
    }
}
