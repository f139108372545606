use glow::HasContext;

use relume_core::EngineError;
use relume_scene::TargetKind;

/// One offscreen attachment: an FBO with a single texture bound to it.
///
/// `resize` reallocates storage but keeps the GL object ids stable, so
/// anything holding `fbo`/`tex` across a resize stays valid.
pub struct RenderTarget {
    pub fbo: glow::NativeFramebuffer,
    pub tex: glow::NativeTexture,
    pub w: i32,
    pub h: i32,
    pub kind: TargetKind,
}

pub unsafe fn create_render_target(
    gl: &glow::Context,
    w: i32,
    h: i32,
    kind: TargetKind,
) -> Result<RenderTarget, EngineError> {
    let w = w.max(1);
    let h = h.max(1);

    let tex = gl
        .create_texture()
        .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    alloc_storage(gl, kind, w, h);
    let filter = match kind {
        TargetKind::Color => glow::LINEAR,
        TargetKind::Depth => glow::NEAREST,
    };
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);
    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_WRAP_S,
        glow::CLAMP_TO_EDGE as i32,
    );
    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_WRAP_T,
        glow::CLAMP_TO_EDGE as i32,
    );
    gl.bind_texture(glow::TEXTURE_2D, None);

    let fbo = match gl.create_framebuffer() {
        Ok(f) => f,
        Err(e) => {
            gl.delete_texture(tex);
            return Err(EngineError::GlCreate(format!(
                "create_framebuffer failed: {e:?}"
            )));
        }
    };
    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
    match kind {
        TargetKind::Color => {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
        }
        TargetKind::Depth => {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
            // Depth-only framebuffer: no color writes.
            gl.draw_buffers(&[glow::NONE]);
        }
    }

    let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
    if status != glow::FRAMEBUFFER_COMPLETE {
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        gl.delete_framebuffer(fbo);
        gl.delete_texture(tex);
        return Err(EngineError::GlCreate(format!(
            "framebuffer incomplete: 0x{status:x}"
        )));
    }
    gl.bind_framebuffer(glow::FRAMEBUFFER, None);

    Ok(RenderTarget {
        fbo,
        tex,
        w,
        h,
        kind,
    })
}

unsafe fn alloc_storage(gl: &glow::Context, kind: TargetKind, w: i32, h: i32) {
    match kind {
        TargetKind::Color => gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            w,
            h,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            None,
        ),
        TargetKind::Depth => gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::DEPTH_COMPONENT24 as i32,
            w,
            h,
            0,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_INT,
            None,
        ),
    }
}

impl RenderTarget {
    /// Reallocate storage at a new size. Contents after a resize are
    /// undefined until the next clear or full-target draw.
    pub unsafe fn resize(&mut self, gl: &glow::Context, w: i32, h: i32) {
        let w = w.max(1);
        let h = h.max(1);
        if w == self.w && h == self.h {
            return;
        }
        gl.bind_texture(glow::TEXTURE_2D, Some(self.tex));
        alloc_storage(gl, self.kind, w, h);
        gl.bind_texture(glow::TEXTURE_2D, None);
        self.w = w;
        self.h = h;
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_framebuffer(self.fbo);
        gl.delete_texture(self.tex);
    }
}
