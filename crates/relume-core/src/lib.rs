#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! Shared vocabulary for the relume engine.
//!
//! This crate is contract-only: the error taxonomy, the per-frame host
//! snapshot, the pull-based texture feed seam, stage identifiers, and typed
//! JSON loading. No GL handles, no windowing, no watch policy.

pub mod config;
pub mod error;
pub mod feed;
pub mod frame;
pub mod report;
pub mod stage;

pub use config::{load_typed_json, read_source};
pub use error::{EngineError, StageDiagnostic};
pub use feed::{NullFeed, RgbaPixels, TextureFeed};
pub use frame::{FrameInputs, IDENTITY_VIEW};
pub use report::{BuildOk, BuildReport};
pub use stage::ShaderStage;
