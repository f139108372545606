use std::fmt;
use std::path::PathBuf;

use crate::stage::ShaderStage;

/// One stage's compiler output, with the resolver's file names already
/// substituted back into the driver log where possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDiagnostic {
    pub stage: ShaderStage,
    pub log: String,
}

impl fmt::Display for StageDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.log)
    }
}

/// Engine-level errors used across relume crates.
///
/// Contract rule: this type lives in `relume-core` and can be re-exported by
/// runtimes. Recoverable failures (stage compile, link) never tear down the
/// session; fatal ones (`Io`, `FileVanished`) are expected to end the process
/// after logging.
#[derive(Debug)]
pub enum EngineError {
    // ---- I/O and configuration (fatal taxonomy) ----
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    InvalidScene {
        path: PathBuf,
        msg: String,
    },

    /// A watched file produced a change event but is gone from disk.
    /// Continuing would render against stale in-memory source.
    FileVanished {
        path: PathBuf,
    },

    // ---- Build pipeline (recoverable taxonomy) ----
    /// Every failing stage of one build attempt, collected before bailing so
    /// the author sees all broken stages at once.
    StageCompile {
        diagnostics: Vec<StageDiagnostic>,
    },

    Link(String),
    Validate(String),

    // ---- Backend object creation ----
    GlCreate(String),

    // ---- Fallback ----
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    /// True for the taxonomy class that must end the process. Continuing
    /// against vanished or unreadable sources renders stale state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Io { .. } | EngineError::FileVanished { .. }
        )
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Io { path, source } => {
                write!(f, "io error at {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "json parse error at {}: {}", path.display(), source)
            }
            EngineError::InvalidScene { path, msg } => {
                write!(f, "invalid scene at {}: {}", path.display(), msg)
            }
            EngineError::FileVanished { path } => {
                write!(f, "watched file vanished: {}", path.display())
            }

            EngineError::StageCompile { diagnostics } => {
                write!(f, "shader compile error")?;
                for d in diagnostics {
                    write!(f, "\n{d}")?;
                }
                Ok(())
            }
            EngineError::Link(msg) => write!(f, "program link error: {msg}"),
            EngineError::Validate(msg) => write!(f, "program validation error: {msg}"),

            EngineError::GlCreate(msg) => write!(f, "backend object creation failed: {msg}"),

            EngineError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
