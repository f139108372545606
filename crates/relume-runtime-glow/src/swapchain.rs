use glow::HasContext;

use relume_core::EngineError;
use relume_scene::{SizeSpec, TargetDesc, TargetKind, SCREEN_TARGET};

use crate::target::{create_render_target, RenderTarget};

/// Double-buffered render targets: two full sets of every declared target
/// plus the implicit `screen` target at slot 0.
///
/// Each frame draws into the front set while the back set (last frame's
/// front) stays readable, so a layer can sample any target's previous
/// contents without read/write hazards. `swap` flips the roles; nothing is
/// copied.
pub struct SwapChain {
    names: Vec<String>,
    sizes: Vec<SizeSpec>,
    buffers: [Vec<RenderTarget>; 2],
    front: FrontIndex,
    surface: (i32, i32),
}

/// Which of the two sets is the front. A frame writes the front set and
/// reads the back set; `flip` runs once per frame before any layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrontIndex(usize);

impl FrontIndex {
    fn flip(&mut self) {
        self.0 ^= 1;
    }

    /// Set written this frame.
    fn write(self) -> usize {
        self.0
    }

    /// Set read this frame: the previous frame's write set.
    fn read(self) -> usize {
        self.0 ^ 1
    }
}

/// Slot layout shared by both buffers: `screen` first, declared targets
/// after it in declaration order.
fn target_layout(targets: &[TargetDesc]) -> (Vec<String>, Vec<TargetKind>, Vec<SizeSpec>) {
    let mut names = Vec::with_capacity(targets.len() + 1);
    let mut kinds = Vec::with_capacity(targets.len() + 1);
    let mut sizes = Vec::with_capacity(targets.len() + 1);

    names.push(SCREEN_TARGET.to_string());
    kinds.push(TargetKind::Color);
    sizes.push(SizeSpec::Relative(1.0));

    for t in targets {
        names.push(t.name.clone());
        kinds.push(t.kind);
        sizes.push(t.size);
    }
    (names, kinds, sizes)
}

impl SwapChain {
    pub unsafe fn new(
        gl: &glow::Context,
        targets: &[TargetDesc],
        surface_w: i32,
        surface_h: i32,
    ) -> Result<Self, EngineError> {
        let (names, kinds, sizes) = target_layout(targets);
        let surface = (surface_w.max(1), surface_h.max(1));

        let mut buffers = [Vec::new(), Vec::new()];
        let mut failure = None;
        'alloc: for buf in &mut buffers {
            for (kind, size) in kinds.iter().zip(&sizes) {
                let (w, h) = size.resolve(surface.0, surface.1);
                match create_render_target(gl, w, h, *kind) {
                    Ok(rt) => buf.push(rt),
                    Err(e) => {
                        failure = Some(e);
                        break 'alloc;
                    }
                }
            }
        }
        if let Some(e) = failure {
            for buf in &mut buffers {
                for rt in buf.iter_mut() {
                    rt.destroy(gl);
                }
            }
            return Err(e);
        }

        Ok(Self {
            names,
            sizes,
            buffers,
            front: FrontIndex::default(),
            surface,
        })
    }

    /// Flip front and back sets. Call once per frame, before any layer runs.
    pub fn swap(&mut self) {
        self.front.flip();
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Front-set target: this frame's draw destination.
    pub fn write_target(&self, name: &str) -> Option<&RenderTarget> {
        self.index_of(name)
            .map(|i| &self.buffers[self.front.write()][i])
    }

    /// Back-set target: last frame's contents, safe to sample while the
    /// front set is being written.
    pub fn read_target(&self, name: &str) -> Option<&RenderTarget> {
        self.index_of(name)
            .map(|i| &self.buffers[self.front.read()][i])
    }

    pub fn write_screen(&self) -> &RenderTarget {
        &self.buffers[self.front.write()][0]
    }

    pub fn surface_size(&self) -> (i32, i32) {
        self.surface
    }

    /// Reallocate every target of both sets for a new surface size, in one
    /// synchronous pass so no frame ever sees mixed sizes. A zero or
    /// negative size (minimized window) is ignored.
    pub unsafe fn resize_surface(&mut self, gl: &glow::Context, w: i32, h: i32) {
        if w <= 0 || h <= 0 {
            return;
        }
        if (w, h) == self.surface {
            return;
        }
        self.surface = (w, h);
        for buf in &mut self.buffers {
            for (rt, size) in buf.iter_mut().zip(&self.sizes) {
                let (tw, th) = size.resolve(w, h);
                rt.resize(gl, tw, th);
            }
        }
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        for buf in &mut self.buffers {
            for rt in buf.iter_mut() {
                rt.destroy(gl);
            }
            buf.clear();
        }
    }
}
