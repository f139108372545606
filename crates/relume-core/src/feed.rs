/// A decoded RGBA8 frame handed across the input seam.
#[derive(Clone, Debug)]
pub struct RgbaPixels {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, row-major, `width * height * 4` bytes.
    pub bytes: Vec<u8>,
}

impl RgbaPixels {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut bytes = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            bytes.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            bytes,
        }
    }
}

/// Pull-based contract for external texture producers (video decoders,
/// capture devices, image loaders).
///
/// The runtime polls once per frame on the render thread; producers keep
/// their own threading behind this seam. Returning `None` means "no new
/// frame" and the previously uploaded texture stays bound.
pub trait TextureFeed {
    fn poll_rgba(&mut self) -> Option<RgbaPixels>;
}

/// A feed that always reports "no new frame".
#[derive(Debug, Default)]
pub struct NullFeed;

impl TextureFeed for NullFeed {
    #[inline]
    fn poll_rgba(&mut self) -> Option<RgbaPixels> {
        None
    }
}
