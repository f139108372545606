use glow::HasContext;

use relume_core::EngineError;

use crate::mesh::FullscreenTriangle;
use crate::program::build_internal;

const BLIT_VERT: &str = r#"#version 330 core
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

const BLIT_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_color;
uniform sampler2D u_tex;
void main() {
    frag_color = texture(u_tex, v_uv);
}
"#;

/// Draws a texture over the default framebuffer. The final step of every
/// frame presents the screen target's front buffer through this.
pub struct Blitter {
    program: glow::NativeProgram,
    loc_tex: Option<glow::NativeUniformLocation>,
}

impl Blitter {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, EngineError> {
        let program = build_internal(gl, BLIT_VERT, BLIT_FRAG)?;
        let loc_tex = gl.get_uniform_location(program, "u_tex");
        Ok(Self { program, loc_tex })
    }

    pub unsafe fn blit(
        &self,
        gl: &glow::Context,
        fs_tri: &FullscreenTriangle,
        tex: glow::NativeTexture,
        w: i32,
        h: i32,
    ) {
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        gl.viewport(0, 0, w.max(1), h.max(1));
        gl.disable(glow::DEPTH_TEST);
        gl.disable(glow::BLEND);
        gl.use_program(Some(self.program));
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        if let Some(loc) = &self.loc_tex {
            gl.uniform_1_i32(Some(loc), 0);
        }
        fs_tri.draw(gl);
        gl.bind_texture(glow::TEXTURE_2D, None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_program(self.program);
    }
}
