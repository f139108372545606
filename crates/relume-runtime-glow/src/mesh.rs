use std::collections::HashMap;

use glow::HasContext;

use relume_core::EngineError;
use relume_scene::MeshRef;

/// Single clip-space triangle covering the screen; the overshoot past
/// x=1/y=1 is clipped away, so no diagonal seam ever shows.
pub struct FullscreenTriangle {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

/// pos.xy + uv per vertex.
const FS_TRI_VERTS: [f32; 12] = [
    -1.0, -1.0, 0.0, 0.0, //
    3.0, -1.0, 2.0, 0.0, //
    -1.0, 3.0, 0.0, 2.0,
];

impl FullscreenTriangle {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, EngineError> {
        let (vao, vbo) = upload_interleaved(gl, &FS_TRI_VERTS)?;
        Ok(Self { vao, vbo })
    }

    pub unsafe fn draw(&self, gl: &glow::Context) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

/// A host-registered mesh with the same interleaved pos2+uv2 layout the
/// fullscreen triangle uses.
pub struct Mesh {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    vertex_count: i32,
}

impl Mesh {
    /// `verts` is interleaved `[x, y, u, v]` per vertex.
    pub unsafe fn from_vertices(gl: &glow::Context, verts: &[f32]) -> Result<Self, EngineError> {
        if verts.is_empty() || verts.len() % 4 != 0 {
            return Err(EngineError::Validate(format!(
                "mesh vertex data must be a non-empty multiple of 4 floats, got {}",
                verts.len()
            )));
        }
        let (vao, vbo) = upload_interleaved(gl, verts)?;
        Ok(Self {
            vao,
            vbo,
            vertex_count: (verts.len() / 4) as i32,
        })
    }

    pub unsafe fn draw(&self, gl: &glow::Context, mode: u32) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(mode, 0, self.vertex_count);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

unsafe fn upload_interleaved(
    gl: &glow::Context,
    verts: &[f32],
) -> Result<(glow::NativeVertexArray, glow::NativeBuffer), EngineError> {
    let vao = gl
        .create_vertex_array()
        .map_err(|e| EngineError::GlCreate(format!("create_vertex_array failed: {e:?}")))?;
    let vbo = match gl.create_buffer() {
        Ok(b) => b,
        Err(e) => {
            gl.delete_vertex_array(vao);
            return Err(EngineError::GlCreate(format!("create_buffer failed: {e:?}")));
        }
    };
    gl.bind_vertex_array(Some(vao));
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    gl.buffer_data_u8_slice(
        glow::ARRAY_BUFFER,
        bytemuck::cast_slice(verts),
        glow::STATIC_DRAW,
    );
    gl.enable_vertex_attrib_array(0);
    gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 4 * 4, 0);
    gl.enable_vertex_attrib_array(1);
    gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 4 * 4, 2 * 4);
    gl.bind_vertex_array(None);
    Ok((vao, vbo))
}

/// Meshes a layer can reference: the runtime's own fullscreen triangle and
/// whatever the host registered by name.
pub struct MeshRegistry {
    fullscreen: FullscreenTriangle,
    named: HashMap<String, Mesh>,
}

impl MeshRegistry {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, EngineError> {
        Ok(Self {
            fullscreen: FullscreenTriangle::new(gl)?,
            named: HashMap::new(),
        })
    }

    pub unsafe fn register(
        &mut self,
        gl: &glow::Context,
        name: impl Into<String>,
        verts: &[f32],
    ) -> Result<(), EngineError> {
        let mesh = Mesh::from_vertices(gl, verts)?;
        if let Some(mut old) = self.named.insert(name.into(), mesh) {
            old.destroy(gl);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn fullscreen(&self) -> &FullscreenTriangle {
        &self.fullscreen
    }

    /// Draw the referenced mesh. A named mesh that was never registered
    /// draws nothing; the gap is reported at build time, not per frame.
    pub unsafe fn draw(&self, gl: &glow::Context, mesh: &MeshRef, mode: u32) {
        match mesh {
            MeshRef::FullscreenTriangle => self.fullscreen.draw(gl),
            MeshRef::Named(name) => {
                if let Some(m) = self.named.get(name) {
                    m.draw(gl, mode);
                } else {
                    tracing::debug!(mesh = %name, "unregistered mesh; layer drew nothing");
                }
            }
        }
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        self.fullscreen.destroy(gl);
        for (_, mut mesh) in self.named.drain() {
            mesh.destroy(gl);
        }
    }
}
