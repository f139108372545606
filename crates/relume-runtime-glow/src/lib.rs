//! OpenGL runtime for relume, built on `glow`.
//!
//! This crate intentionally contains no windowing, no GL-context creation
//! and no file-watch policy: the host owns the context and the event loop,
//! passes `&glow::Context` in, and decides when [`RenderSession::rebuild`]
//! runs. Everything here is the GPU half of the engine: program builds,
//! uniform reflection, target swap chains and per-frame execution.
//!
//! GL objects are released through explicit `destroy(&mut self, gl)` calls
//! rather than `Drop`, because dropping requires a live context reference.

#![allow(clippy::missing_safety_doc)]

mod blit;
mod exec;
mod mesh;
mod program;
mod reflect;
mod session;
mod ssbo;
mod swapchain;
mod target;
mod texture;

pub use blit::Blitter;
pub use mesh::{FullscreenTriangle, Mesh, MeshRegistry};
pub use program::CompiledProgram;
pub use reflect::{ReflectedUniform, UniformReflectionContext};
pub use session::{LayerStatus, RenderSession};
pub use ssbo::SsboPool;
pub use swapchain::SwapChain;
pub use target::RenderTarget;
pub use texture::{BuiltinTexture, TextureCache};
