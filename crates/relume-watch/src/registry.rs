//! The watch registry: which files feed which layers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use relume_core::ShaderStage;
use relume_scene::LayerId;

/// Absolute file path → (layer, stage) associations. Directories, not
/// files, are the unit of OS-level watching, so the registry also derives
/// the parent-directory set.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    assoc: HashMap<PathBuf, HashSet<(LayerId, ShaderStage)>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dependency set for one (layer, stage). Paths from the
    /// stage's previous resolution that no longer appear stop triggering it.
    pub fn set_stage_deps(&mut self, layer: LayerId, stage: ShaderStage, deps: &BTreeSet<PathBuf>) {
        let key = (layer, stage);
        self.assoc.retain(|path, set| {
            if !deps.contains(path) {
                set.remove(&key);
            }
            !set.is_empty() || deps.contains(path)
        });
        for dep in deps {
            self.assoc.entry(dep.clone()).or_default().insert(key);
        }
    }

    /// Drop every association for a layer (layer removed or scene reloaded).
    pub fn clear_layer(&mut self, layer: LayerId) {
        self.assoc.retain(|_, set| {
            set.retain(|(l, _)| *l != layer);
            !set.is_empty()
        });
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.assoc.contains_key(path)
    }

    pub fn layers_for(&self, path: &Path) -> BTreeSet<LayerId> {
        self.assoc
            .get(path)
            .map(|set| set.iter().map(|(l, _)| *l).collect())
            .unwrap_or_default()
    }

    /// Parent directories of every registered file.
    pub fn dirs(&self) -> BTreeSet<PathBuf> {
        self.assoc
            .keys()
            .filter_map(|p| p.parent())
            .map(Path::to_path_buf)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assoc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assoc.is_empty()
    }
}
