#![forbid(unsafe_code)]

//! Change detection: OS file-system events in, per-layer dirty flags out.
//!
//! The notify backend delivers events on its own thread; the callback does
//! nothing but push small [`FsEvent`]s into a bounded channel. The main
//! thread calls [`ChangeDetector::drain`] once per frame, routing events
//! through the registry and a trailing debounce so editor save bursts
//! collapse into one rebuild per layer. No GL or compile work ever happens
//! off the main thread.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

mod debounce;
mod registry;

pub use debounce::Debouncer;
pub use registry::WatchRegistry;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use notify::{EventKind, RecursiveMode, Watcher};
use relume_core::{EngineError, ShaderStage};
use relume_scene::LayerId;

/// How long the notify callback may wait for queue space before dropping an
/// event. The main thread drains every frame, so a full queue means frames
/// have stopped.
const HANDOFF_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period a file must hold before its layers rebuild.
    pub debounce: Duration,
    /// Treat any watched change as a whole-scene reload.
    pub hard_reload: bool,
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            hard_reload: false,
            channel_capacity: 256,
        }
    }
}

/// One file-system observation, reduced to what routing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub removed: bool,
}

/// What one frame's drain produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainOutcome {
    pub dirty_layers: BTreeSet<LayerId>,
    /// Scene file changed, or hard-reload mode saw any watched change.
    pub scene_dirty: bool,
    /// Every file behind the fired keys. Hosts invalidate these in their
    /// source cache before rebuilding.
    pub changed_paths: BTreeSet<PathBuf>,
    /// Watched files that no longer exist on disk. Non-empty is fatal by
    /// policy; rendering against stale in-memory source is worse than
    /// failing loudly.
    pub vanished: Vec<PathBuf>,
}

impl DrainOutcome {
    pub fn is_empty(&self) -> bool {
        self.dirty_layers.is_empty() && !self.scene_dirty && self.vanished.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DirtyKey {
    Layer(LayerId),
    Scene,
}

/// Background-fed, main-thread-drained change detector.
pub struct ChangeDetector {
    cfg: WatchConfig,
    registry: WatchRegistry,
    scene_files: BTreeSet<PathBuf>,
    debounce: Debouncer<DirtyKey>,
    /// Paths behind each pending key, checked for existence when the key
    /// fires.
    pending: HashMap<DirtyKey, BTreeSet<PathBuf>>,
    watcher: Option<notify::RecommendedWatcher>,
    watched_dirs: BTreeSet<PathBuf>,
    tx: Sender<FsEvent>,
    rx: Receiver<FsEvent>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("cfg", &self.cfg)
            .field("registered_files", &self.registry.len())
            .field("watched_dirs", &self.watched_dirs)
            .field("os_watcher", &self.watcher.is_some())
            .finish()
    }
}

impl ChangeDetector {
    /// Detector with a live OS watcher.
    pub fn new(cfg: WatchConfig) -> Result<Self, EngineError> {
        let mut detector = Self::detached(cfg);
        let tx = detector.tx.clone();
        let watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(ev) => {
                    // Editors emit modify/create/remove/rename salvos; access
                    // events are noise.
                    let kind_ok = matches!(
                        ev.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    );
                    if !kind_ok {
                        return;
                    }
                    let removed = matches!(ev.kind, EventKind::Remove(_));
                    for path in ev.paths {
                        let event = FsEvent { path, removed };
                        if tx.send_timeout(event, HANDOFF_TIMEOUT).is_err() {
                            tracing::warn!("change queue full, dropping file event");
                        }
                    }
                }
                Err(e) => tracing::warn!("file watcher error: {e}"),
            },
        )
        .map_err(|e| EngineError::other(format!("failed to create file watcher: {e}")))?;
        detector.watcher = Some(watcher);
        Ok(detector)
    }

    /// Detector without an OS watcher; events arrive only via [`inject`].
    /// Used by tests and embedders that forward their own events.
    ///
    /// [`inject`]: ChangeDetector::inject
    pub fn detached(cfg: WatchConfig) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(cfg.channel_capacity.max(1));
        Self {
            debounce: Debouncer::new(cfg.debounce),
            cfg,
            registry: WatchRegistry::new(),
            scene_files: BTreeSet::new(),
            pending: HashMap::new(),
            watcher: None,
            watched_dirs: BTreeSet::new(),
            tx,
            rx,
        }
    }

    pub fn hard_reload(&self) -> bool {
        self.cfg.hard_reload
    }

    pub fn set_hard_reload(&mut self, on: bool) {
        self.cfg.hard_reload = on;
    }

    /// Replace the watched dependency set for one (layer, stage), updating
    /// directory watches to match.
    pub fn set_stage_deps(&mut self, layer: LayerId, stage: ShaderStage, deps: &BTreeSet<PathBuf>) {
        self.registry.set_stage_deps(layer, stage, deps);
        self.sync_watches();
    }

    pub fn clear_layer(&mut self, layer: LayerId) {
        self.registry.clear_layer(layer);
        self.sync_watches();
    }

    /// Watch the scene description itself; a change marks the whole scene.
    pub fn watch_scene_file(&mut self, path: &Path) {
        self.scene_files.insert(path.to_path_buf());
        self.sync_watches();
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn watched_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.watched_dirs
    }

    /// Push one event as if it came from the OS watcher.
    pub fn inject(&self, event: FsEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Route everything the watcher produced since the last frame, then
    /// release keys whose debounce window has closed. Call once per frame on
    /// the main thread.
    pub fn drain(&mut self, now: Instant) -> DrainOutcome {
        while let Ok(ev) = self.rx.try_recv() {
            self.route(ev, now);
        }

        let mut out = DrainOutcome::default();
        for key in self.debounce.ready(now) {
            let paths = self.pending.remove(&key).unwrap_or_default();
            for path in &paths {
                if !path.exists() {
                    out.vanished.push(path.clone());
                }
            }
            out.changed_paths.extend(paths);
            match key {
                DirtyKey::Scene => out.scene_dirty = true,
                DirtyKey::Layer(id) => {
                    out.dirty_layers.insert(id);
                }
            }
        }
        out
    }

    fn route(&mut self, ev: FsEvent, now: Instant) {
        let is_scene = self.scene_files.contains(&ev.path);
        let layers = self.registry.layers_for(&ev.path);
        if !is_scene && layers.is_empty() {
            // Unrelated file in a watched directory (editor temp files and
            // the like).
            return;
        }

        tracing::debug!(path = %ev.path.display(), removed = ev.removed, "change detected");

        if is_scene || self.cfg.hard_reload {
            self.debounce.note(DirtyKey::Scene, now);
            self.pending
                .entry(DirtyKey::Scene)
                .or_default()
                .insert(ev.path);
            return;
        }

        for layer in layers {
            let key = DirtyKey::Layer(layer);
            self.debounce.note(key, now);
            self.pending.entry(key).or_default().insert(ev.path.clone());
        }
    }

    fn sync_watches(&mut self) {
        let mut needed = self.registry.dirs();
        for scene in &self.scene_files {
            if let Some(dir) = scene.parent() {
                needed.insert(dir.to_path_buf());
            }
        }

        if let Some(watcher) = self.watcher.as_mut() {
            for gone in self.watched_dirs.difference(&needed) {
                let _ = watcher.unwatch(gone);
            }
            for added in needed.difference(&self.watched_dirs) {
                if let Err(e) = watcher.watch(added, RecursiveMode::NonRecursive) {
                    tracing::warn!("failed to watch {}: {e}", added.display());
                }
            }
        }
        self.watched_dirs = needed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const WINDOW: Duration = Duration::from_millis(150);

    fn temp_tree(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("relume_watch_{tag}_{ts}"));
        fs::create_dir_all(&p).expect("create temp tree");
        p
    }

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, "x").expect("write file");
        path
    }

    fn detector() -> ChangeDetector {
        ChangeDetector::detached(WatchConfig {
            debounce: WINDOW,
            ..WatchConfig::default()
        })
    }

    fn changed(path: &Path) -> FsEvent {
        FsEvent {
            path: path.to_path_buf(),
            removed: false,
        }
    }

    #[test]
    fn burst_collapses_to_one_dirty_layer() {
        let tree = temp_tree("burst");
        let frag = touch(&tree, "a.frag");

        let mut det = detector();
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag.clone()].into_iter().collect(),
        );

        for _ in 0..5 {
            assert!(det.inject(changed(&frag)));
        }

        let t0 = Instant::now();
        assert!(det.drain(t0).is_empty(), "burst still inside the window");

        let out = det.drain(t0 + WINDOW);
        assert_eq!(out.dirty_layers, [LayerId(0)].into_iter().collect());
        assert_eq!(out.changed_paths, [frag].into_iter().collect());
        assert!(!out.scene_dirty);
        assert!(out.vanished.is_empty());

        assert!(det.drain(t0 + WINDOW * 2).is_empty(), "fires exactly once");

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn shared_include_marks_every_dependent_layer() {
        let tree = temp_tree("shared");
        let common = touch(&tree, "inc/common.glsl");

        let mut det = detector();
        let deps: BTreeSet<PathBuf> = [common.clone()].into_iter().collect();
        det.set_stage_deps(LayerId(0), ShaderStage::Fragment, &deps);
        det.set_stage_deps(LayerId(2), ShaderStage::Fragment, &deps);

        det.inject(changed(&common));
        let t0 = Instant::now();
        det.drain(t0);
        let out = det.drain(t0 + WINDOW);

        assert_eq!(
            out.dirty_layers,
            [LayerId(0), LayerId(2)].into_iter().collect()
        );

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn unregistered_paths_are_ignored() {
        let tree = temp_tree("ignore");
        let frag = touch(&tree, "a.frag");
        let noise = touch(&tree, "a.frag.swp");

        let mut det = detector();
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag].into_iter().collect(),
        );

        det.inject(changed(&noise));
        let t0 = Instant::now();
        det.drain(t0);
        assert!(det.drain(t0 + WINDOW).is_empty());

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn hard_reload_promotes_any_change_to_scene_dirty() {
        let tree = temp_tree("hard");
        let frag = touch(&tree, "a.frag");

        let mut det = ChangeDetector::detached(WatchConfig {
            debounce: WINDOW,
            hard_reload: true,
            ..WatchConfig::default()
        });
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag.clone()].into_iter().collect(),
        );

        det.inject(changed(&frag));
        let t0 = Instant::now();
        det.drain(t0);
        let out = det.drain(t0 + WINDOW);

        assert!(out.scene_dirty);
        assert!(out.dirty_layers.is_empty());

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn scene_file_changes_mark_the_scene() {
        let tree = temp_tree("scene");
        let scene = touch(&tree, "scene.json");

        let mut det = detector();
        det.watch_scene_file(&scene);

        det.inject(changed(&scene));
        let t0 = Instant::now();
        det.drain(t0);
        let out = det.drain(t0 + WINDOW);

        assert!(out.scene_dirty);

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn vanished_watched_file_is_reported() {
        let tree = temp_tree("vanish");
        let frag = touch(&tree, "a.frag");

        let mut det = detector();
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag.clone()].into_iter().collect(),
        );

        det.inject(FsEvent {
            path: frag.clone(),
            removed: true,
        });
        fs::remove_file(&frag).expect("remove watched file");

        let t0 = Instant::now();
        det.drain(t0);
        let out = det.drain(t0 + WINDOW);

        assert_eq!(out.vanished, vec![frag]);

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn atomic_save_rename_is_not_a_vanish() {
        let tree = temp_tree("rename");
        let frag = touch(&tree, "a.frag");

        let mut det = detector();
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag.clone()].into_iter().collect(),
        );

        // Remove event followed by the rename landing; by the time the
        // debounce window closes the file is back.
        det.inject(FsEvent {
            path: frag.clone(),
            removed: true,
        });
        det.inject(changed(&frag));

        let t0 = Instant::now();
        det.drain(t0);
        let out = det.drain(t0 + WINDOW);

        assert!(out.vanished.is_empty());
        assert_eq!(out.dirty_layers, [LayerId(0)].into_iter().collect());

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn watched_dirs_track_registration() {
        let tree = temp_tree("dirs");
        let frag = touch(&tree, "shaders/a.frag");
        let inc = touch(&tree, "shaders/inc/common.glsl");
        let scene = touch(&tree, "scene.json");

        let mut det = detector();
        det.set_stage_deps(
            LayerId(0),
            ShaderStage::Fragment,
            &[frag, inc].into_iter().collect(),
        );
        det.watch_scene_file(&scene);

        let dirs = det.watched_dirs();
        assert!(dirs.contains(&tree.join("shaders")));
        assert!(dirs.contains(&tree.join("shaders/inc")));
        assert!(dirs.contains(&tree));

        det.clear_layer(LayerId(0));
        let dirs = det.watched_dirs();
        assert!(!dirs.contains(&tree.join("shaders")));
        assert!(dirs.contains(&tree), "scene dir survives layer removal");

        let _ = fs::remove_dir_all(tree);
    }
}
