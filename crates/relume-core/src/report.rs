use crate::error::EngineError;

/// Outcome of one layer's rebuild attempt, surfaced to the host for display
/// (log line, on-screen overlay, editor diagnostics).
#[derive(Debug)]
pub struct BuildReport {
    pub layer: String,
    pub outcome: Result<BuildOk, EngineError>,
}

/// Success payload of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOk {
    /// The include dependency set differs from the previous build, so file
    /// watches must be re-registered for this layer.
    pub deps_changed: bool,
    /// Active uniforms found by reflection after the link.
    pub uniform_count: usize,
}

impl BuildReport {
    pub fn ok(layer: impl Into<String>, deps_changed: bool, uniform_count: usize) -> Self {
        Self {
            layer: layer.into(),
            outcome: Ok(BuildOk {
                deps_changed,
                uniform_count,
            }),
        }
    }

    pub fn failed(layer: impl Into<String>, err: EngineError) -> Self {
        Self {
            layer: layer.into(),
            outcome: Err(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}
