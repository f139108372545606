use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glow::HasContext;

use relume_core::{EngineError, RgbaPixels};

/// Procedurally generated stock textures, addressable from binding
/// comments as `builtin <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTexture {
    White,
    Black,
    Checker,
    Noise,
}

impl BuiltinTexture {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "white" => Some(BuiltinTexture::White),
            "black" => Some(BuiltinTexture::Black),
            "checker" => Some(BuiltinTexture::Checker),
            "noise" => Some(BuiltinTexture::Noise),
            _ => None,
        }
    }

    fn pixels(self) -> RgbaPixels {
        match self {
            BuiltinTexture::White => RgbaPixels::solid(4, 4, [255, 255, 255, 255]),
            BuiltinTexture::Black => RgbaPixels::solid(4, 4, [0, 0, 0, 255]),
            BuiltinTexture::Checker => checker_pixels(),
            BuiltinTexture::Noise => noise_pixels(),
        }
    }
}

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;
const NOISE_SIZE: u32 = 64;

fn checker_pixels() -> RgbaPixels {
    let mut bytes = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let on = ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0;
            let v = if on { 255 } else { 0 };
            bytes.extend_from_slice(&[v, v, v, 255]);
        }
    }
    RgbaPixels {
        width: CHECKER_SIZE,
        height: CHECKER_SIZE,
        bytes,
    }
}

fn xorshift(state: &mut u32) -> u32 {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    *state
}

/// Fixed-seed noise so every session sees the same texture.
fn noise_pixels() -> RgbaPixels {
    let mut state: u32 = 0x9e37_79b9;
    let mut bytes = Vec::with_capacity((NOISE_SIZE * NOISE_SIZE * 4) as usize);
    for _ in 0..NOISE_SIZE * NOISE_SIZE {
        let r = (xorshift(&mut state) & 0xff) as u8;
        let g = (xorshift(&mut state) & 0xff) as u8;
        let b = (xorshift(&mut state) & 0xff) as u8;
        bytes.extend_from_slice(&[r, g, b, 255]);
    }
    RgbaPixels {
        width: NOISE_SIZE,
        height: NOISE_SIZE,
        bytes,
    }
}

/// Session-owned sampler sources: lazily created builtins, host-registered
/// file textures and the per-frame external input texture.
///
/// Decoding image files is not this crate's job; the host decodes and
/// hands `RgbaPixels` in through `register_file`.
pub struct TextureCache {
    builtins: HashMap<BuiltinTexture, glow::NativeTexture>,
    files: HashMap<PathBuf, glow::NativeTexture>,
    input: Option<(glow::NativeTexture, u32, u32)>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
            files: HashMap::new(),
            input: None,
        }
    }

    pub unsafe fn builtin(
        &mut self,
        gl: &glow::Context,
        which: BuiltinTexture,
    ) -> Result<glow::NativeTexture, EngineError> {
        if let Some(tex) = self.builtins.get(&which) {
            return Ok(*tex);
        }
        let tex = upload_pixels(gl, &which.pixels())?;
        self.builtins.insert(which, tex);
        Ok(tex)
    }

    /// Upload a decoded image under its path. Replaces any previous
    /// registration for the same path.
    pub unsafe fn register_file(
        &mut self,
        gl: &glow::Context,
        path: PathBuf,
        pixels: &RgbaPixels,
    ) -> Result<(), EngineError> {
        let tex = upload_pixels(gl, pixels)?;
        if let Some(old) = self.files.insert(path, tex) {
            gl.delete_texture(old);
        }
        Ok(())
    }

    pub fn file(&self, path: &Path) -> Option<glow::NativeTexture> {
        self.files.get(path).copied()
    }

    /// Upload this frame's external input. Storage is respecified whenever
    /// the frame size changes, otherwise the existing texture is refilled.
    pub unsafe fn update_input(
        &mut self,
        gl: &glow::Context,
        pixels: &RgbaPixels,
    ) -> Result<(), EngineError> {
        if let Some((tex, w, h)) = self.input {
            if w == pixels.width && h == pixels.height {
                gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    0,
                    0,
                    w as i32,
                    h as i32,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelUnpackData::Slice(&pixels.bytes),
                );
                gl.bind_texture(glow::TEXTURE_2D, None);
                return Ok(());
            }
            // Resolution changed (rare). Reallocate.
            gl.delete_texture(tex);
            self.input = None;
        }
        let tex = upload_pixels(gl, pixels)?;
        self.input = Some((tex, pixels.width, pixels.height));
        Ok(())
    }

    pub fn input(&self) -> Option<glow::NativeTexture> {
        self.input.map(|(tex, _, _)| tex)
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        for (_, tex) in self.builtins.drain() {
            gl.delete_texture(tex);
        }
        for (_, tex) in self.files.drain() {
            gl.delete_texture(tex);
        }
        if let Some((tex, _, _)) = self.input.take() {
            gl.delete_texture(tex);
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

unsafe fn upload_pixels(
    gl: &glow::Context,
    pixels: &RgbaPixels,
) -> Result<glow::NativeTexture, EngineError> {
    let tex = gl
        .create_texture()
        .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        glow::RGBA8 as i32,
        pixels.width as i32,
        pixels.height as i32,
        0,
        glow::RGBA,
        glow::UNSIGNED_BYTE,
        Some(&pixels.bytes),
    );
    set_sampling_params(gl);
    gl.bind_texture(glow::TEXTURE_2D, None);
    Ok(tex)
}

unsafe fn set_sampling_params(gl: &glow::Context) {
    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_MIN_FILTER,
        glow::LINEAR as i32,
    );
    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_MAG_FILTER,
        glow::LINEAR as i32,
    );
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_map_and_reject() {
        assert_eq!(BuiltinTexture::from_name("noise"), Some(BuiltinTexture::Noise));
        assert_eq!(BuiltinTexture::from_name("white"), Some(BuiltinTexture::White));
        assert_eq!(BuiltinTexture::from_name("plasma"), None);
    }

    #[test]
    fn checker_alternates_cells() {
        let px = checker_pixels();
        assert_eq!(px.width, CHECKER_SIZE);
        assert_eq!(px.bytes.len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
        // (0,0) cell is on, the cell to its right is off.
        assert_eq!(px.bytes[0], 255);
        let next_cell = (CHECKER_CELL * 4) as usize;
        assert_eq!(px.bytes[next_cell], 0);
    }

    #[test]
    fn noise_is_deterministic_and_opaque() {
        let a = noise_pixels();
        let b = noise_pixels();
        assert_eq!(a.bytes, b.bytes);
        assert!(a.bytes.chunks_exact(4).all(|px| px[3] == 255));
    }
}
