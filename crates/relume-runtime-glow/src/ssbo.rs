use std::collections::HashMap;

use glow::HasContext;

use relume_core::EngineError;
use relume_scene::{SsboBinding, SsboDesc};

/// Scene-declared shader storage buffers, allocated once and rebound per
/// layer at whatever index slots the layer asks for.
pub struct SsboPool {
    buffers: HashMap<String, (glow::NativeBuffer, u64)>,
}

impl SsboPool {
    pub unsafe fn new(gl: &glow::Context, descs: &[SsboDesc]) -> Result<Self, EngineError> {
        let mut pool = Self {
            buffers: HashMap::new(),
        };
        for d in descs {
            let buf = match gl.create_buffer() {
                Ok(b) => b,
                Err(e) => {
                    pool.destroy(gl);
                    return Err(EngineError::GlCreate(format!("create_buffer failed: {e:?}")));
                }
            };
            gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(buf));
            gl.buffer_data_size(
                glow::SHADER_STORAGE_BUFFER,
                d.size_bytes as i32,
                glow::DYNAMIC_COPY,
            );
            pool.buffers.insert(d.name.clone(), (buf, d.size_bytes));
        }
        gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
        Ok(pool)
    }

    /// Bind one layer's declared ranges before it runs. Scene validation
    /// guarantees the names exist; the guard covers nothing else.
    pub unsafe fn bind_layer(&self, gl: &glow::Context, bindings: &[SsboBinding]) {
        for b in bindings {
            let Some((buf, size)) = self.buffers.get(&b.name) else {
                tracing::debug!(ssbo = %b.name, "binding references undeclared buffer");
                continue;
            };
            if b.offset == 0 {
                gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, b.binding, Some(*buf));
            } else {
                let len = size.saturating_sub(b.offset);
                if len == 0 {
                    tracing::debug!(ssbo = %b.name, offset = b.offset, "offset past end of buffer");
                    continue;
                }
                gl.bind_buffer_range(
                    glow::SHADER_STORAGE_BUFFER,
                    b.binding,
                    Some(*buf),
                    b.offset as i32,
                    len as i32,
                );
            }
        }
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        for (_, (buf, _)) in self.buffers.drain() {
            gl.delete_buffer(buf);
        }
    }
}
