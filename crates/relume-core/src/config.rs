//! Typed JSON loading helpers.
//!
//! Domain schemas live with their owning crates (the scene schema in
//! `relume-scene`); this module only provides the load/parse plumbing so
//! every config path reports errors the same way.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::EngineError;

/// Read `path` and deserialize it as `T`.
///
/// I/O failure here is the fatal taxonomy: callers at startup propagate it
/// and exit, per the error-handling contract.
pub fn load_typed_json<T: DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
    let bytes = fs::read(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a UTF-8 source file (shader roots, includes).
pub fn read_source(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Probe {
        name: String,
        count: u32,
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("relume_core_{tag}_{ts}.json"))
    }

    #[test]
    fn typed_json_roundtrip() {
        let p = temp_path("probe");
        fs::write(&p, r#"{ "name": "blur", "count": 3 }"#).unwrap();

        let probe: Probe = load_typed_json(&p).expect("valid json should parse");
        assert_eq!(
            probe,
            Probe {
                name: "blur".into(),
                count: 3
            }
        );

        let _ = fs::remove_file(p);
    }

    #[test]
    fn missing_file_is_io_error() {
        let p = temp_path("missing");
        let err = load_typed_json::<Probe>(&p).expect_err("missing file must fail");
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_json_is_json_error() {
        let p = temp_path("broken");
        fs::write(&p, "{ not json").unwrap();

        let err = load_typed_json::<Probe>(&p).expect_err("broken json must fail");
        assert!(matches!(err, EngineError::Json { .. }));
        assert!(!err.is_fatal());

        let _ = fs::remove_file(p);
    }
}
