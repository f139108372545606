#![forbid(unsafe_code)]

//! `#include` flattening for live shader sources.
//!
//! The resolver turns a root file (or inline string) into one compilable
//! source string: includes spliced recursively with `#line` markers, nested
//! `#version` directives demoted to comments, macro defines injected after
//! the root's first line. Every file visited lands in the dependency set so
//! the watcher can register it.
//!
//! File contents are served from an explicit cache: resolving the same tree
//! twice without an `invalidate` call yields byte-identical output even if
//! the disk changed underneath. The change detector owns invalidation.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Component, Path, PathBuf};

use relume_scene::MacroDef;

/// Pseudo file name used for inline stage sources in the `#line` table.
pub const INLINE_NAME: &str = "<inline>";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to read shader source '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("include cycle detected: {chain}")]
    Cycle { chain: String },
}

/// Flattened text for one stage plus everything needed to trace it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub text: String,
    /// Every file that contributed, root included. Watch registration works
    /// off this set; comparing it across rebuilds detects dependency churn.
    pub deps: BTreeSet<PathBuf>,
    /// `#line` source-string-number table: index i names the file the
    /// marker refers to.
    pub files: Vec<PathBuf>,
}

impl ResolvedSource {
    pub fn file_for_index(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }
}

/// File-content cache with explicit invalidation.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<PathBuf, String>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `path`, reading from disk only on a cache miss.
    fn read(&mut self, path: &Path) -> Result<String, ResolveError> {
        if let Some(text) = self.entries.get(path) {
            return Ok(text.clone());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ResolveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.entries.insert(path.to_path_buf(), text.clone());
        Ok(text)
    }

    /// Drop one cached file. Returns whether it was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(&normalize_path(path)).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flattens include trees into single compilable strings.
#[derive(Debug, Default)]
pub struct SourceResolver {
    cache: SourceCache,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a cached file so the next resolve re-reads it from disk.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.cache.invalidate(path)
    }

    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
    }

    /// Flatten `root` and its include tree. `macros` are injected after the
    /// root's first line, scene-level entries before layer-level ones by
    /// caller convention.
    pub fn resolve_file(
        &mut self,
        root: &Path,
        macros: &[MacroDef],
    ) -> Result<ResolvedSource, ResolveError> {
        let root = normalize_path(root);
        let mut walk = Walk::new(&mut self.cache, macros);
        walk.splice_file(&root, true)?;
        Ok(walk.finish())
    }

    /// Flatten an inline source. Includes are resolved relative to
    /// `base_dir`; the inline text itself contributes no dependency.
    pub fn resolve_inline(
        &mut self,
        text: &str,
        base_dir: &Path,
        macros: &[MacroDef],
    ) -> Result<ResolvedSource, ResolveError> {
        let mut walk = Walk::new(&mut self.cache, macros);
        let idx = walk.file_index(Path::new(INLINE_NAME));
        walk.splice_text(text, base_dir, idx, true)?;
        Ok(walk.finish())
    }
}

struct Walk<'a> {
    cache: &'a mut SourceCache,
    macros: &'a [MacroDef],
    deps: BTreeSet<PathBuf>,
    files: Vec<PathBuf>,
    /// Currently-resolving stack; membership means a cycle.
    resolving: Vec<PathBuf>,
    version_kept: bool,
    out: String,
}

impl<'a> Walk<'a> {
    fn new(cache: &'a mut SourceCache, macros: &'a [MacroDef]) -> Self {
        Self {
            cache,
            macros,
            deps: BTreeSet::new(),
            files: Vec::new(),
            resolving: Vec::new(),
            version_kept: false,
            out: String::new(),
        }
    }

    fn finish(self) -> ResolvedSource {
        ResolvedSource {
            text: self.out,
            deps: self.deps,
            files: self.files,
        }
    }

    fn file_index(&mut self, path: &Path) -> usize {
        if let Some(i) = self.files.iter().position(|p| p == path) {
            return i;
        }
        self.files.push(path.to_path_buf());
        self.files.len() - 1
    }

    fn splice_file(&mut self, path: &Path, is_root: bool) -> Result<(), ResolveError> {
        if self.resolving.iter().any(|p| p == path) {
            let mut chain: Vec<String> = self
                .resolving
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(ResolveError::Cycle {
                chain: chain.join(" -> "),
            });
        }

        let text = self.cache.read(path)?;
        self.deps.insert(path.to_path_buf());
        let idx = self.file_index(path);
        let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

        self.resolving.push(path.to_path_buf());
        let result = self.splice_text(&text, &dir, idx, is_root);
        self.resolving.pop();
        result
    }

    fn splice_text(
        &mut self,
        text: &str,
        dir: &Path,
        idx: usize,
        is_root: bool,
    ) -> Result<(), ResolveError> {
        let mut line_no = 0usize;
        for line in text.lines() {
            line_no += 1;

            if let Some(inc) = parse_include(line) {
                let target = normalize_path(&dir.join(inc));
                let target_idx = self.file_index(&target);
                self.out.push_str(&format!("#line 1 {target_idx}\n"));
                self.splice_file(&target, false)?;
                self.out.push_str(&format!("#line {} {idx}\n", line_no + 1));
            } else if is_version_line(line) {
                // Only the root's first #version stays active.
                if is_root && !self.version_kept {
                    self.version_kept = true;
                    self.out.push_str(line);
                } else {
                    self.out.push_str("// ");
                    self.out.push_str(line);
                }
                self.out.push('\n');
            } else {
                self.out.push_str(line);
                self.out.push('\n');
            }

            if is_root && line_no == 1 {
                self.inject_macros(idx);
            }
        }

        // Empty root: defines are all there is.
        if is_root && line_no == 0 && !self.macros.is_empty() {
            for m in self.macros {
                self.out.push_str(&m.to_define_line());
                self.out.push('\n');
            }
        }

        Ok(())
    }

    fn inject_macros(&mut self, root_idx: usize) {
        if self.macros.is_empty() {
            return;
        }
        for m in self.macros {
            self.out.push_str(&m.to_define_line());
            self.out.push('\n');
        }
        // Defines consumed line numbers; point the next line back at root
        // line 2.
        self.out.push_str(&format!("#line 2 {root_idx}\n"));
    }
}

/// `#include "path"` scan; first quoted string on the line wins. Lines
/// without a properly quoted path pass through untouched.
fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn is_version_line(line: &str) -> bool {
    line.trim_start().starts_with("#version")
}

/// Lexical cleanup of `.` and `..` components so cycle detection and cache
/// keys are stable across spelling variants of the same path.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_tree(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("relume_source_{tag}_{ts}"));
        fs::create_dir_all(&p).expect("create temp tree");
        p
    }

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    #[test]
    fn plain_file_passes_through_with_root_dep() {
        let tree = temp_tree("plain");
        let root = write(&tree, "main.frag", "#version 330 core\nvoid main() {}\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert_eq!(resolved.text, "#version 330 core\nvoid main() {}\n");
        assert_eq!(resolved.deps.len(), 1);
        assert!(resolved.deps.contains(&normalize_path(&root)));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn include_is_spliced_with_line_markers() {
        let tree = temp_tree("splice");
        let root = write(
            &tree,
            "main.frag",
            "#version 330 core\n#include \"inc/common.glsl\"\nvoid main() {}\n",
        );
        let common = write(&tree, "inc/common.glsl", "float lift() { return 1.0; }\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert_eq!(
            resolved.text,
            "#version 330 core\n\
             #line 1 1\n\
             float lift() { return 1.0; }\n\
             #line 3 0\n\
             void main() {}\n"
        );
        assert!(resolved.deps.contains(&normalize_path(&common)));
        assert_eq!(resolved.files.len(), 2);
        assert_eq!(resolved.file_for_index(1), Some(normalize_path(&common).as_path()));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn nested_version_directives_are_demoted() {
        let tree = temp_tree("version");
        let root = write(
            &tree,
            "main.frag",
            "#version 330 core\n#include \"common.glsl\"\n",
        );
        write(&tree, "common.glsl", "#version 450\nfloat x = 0.0;\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert!(resolved.text.contains("// #version 450\n"));
        assert!(resolved.text.starts_with("#version 330 core\n"));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn macros_are_injected_after_first_line() {
        let tree = temp_tree("macros");
        let root = write(&tree, "main.frag", "#version 330 core\nvoid main() {}\n");

        let macros = vec![MacroDef::flag("FAST"), MacroDef::valued("COUNT", "4")];
        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &macros).expect("resolve");

        assert_eq!(
            resolved.text,
            "#version 330 core\n\
             #define FAST\n\
             #define COUNT 4\n\
             #line 2 0\n\
             void main() {}\n"
        );

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn resolve_is_idempotent_until_invalidated() {
        let tree = temp_tree("cached");
        let root = write(
            &tree,
            "main.frag",
            "#version 330 core\n#include \"common.glsl\"\n",
        );
        let common = write(&tree, "common.glsl", "float a = 1.0;\n");

        let mut resolver = SourceResolver::new();
        let first = resolver.resolve_file(&root, &[]).expect("first resolve");
        let second = resolver.resolve_file(&root, &[]).expect("second resolve");
        assert_eq!(first, second);

        // Disk changes are masked until the cache entry is dropped.
        write(&tree, "common.glsl", "float a = 2.0;\n");
        let stale = resolver.resolve_file(&root, &[]).expect("stale resolve");
        assert_eq!(stale.text, first.text);

        assert!(resolver.invalidate(&common));
        let fresh = resolver.resolve_file(&root, &[]).expect("fresh resolve");
        assert!(fresh.text.contains("float a = 2.0;"));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn include_cycle_is_reported_not_recursed() {
        let tree = temp_tree("cycle");
        let root = write(&tree, "a.glsl", "#include \"b.glsl\"\n");
        write(&tree, "b.glsl", "#include \"a.glsl\"\n");

        let mut resolver = SourceResolver::new();
        let err = resolver
            .resolve_file(&root, &[])
            .expect_err("cycle must be rejected");

        match err {
            ResolveError::Cycle { chain } => {
                assert!(chain.contains("a.glsl"), "chain should name a.glsl: {chain}");
                assert!(chain.contains("b.glsl"), "chain should name b.glsl: {chain}");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn self_include_is_a_cycle() {
        let tree = temp_tree("selfref");
        let root = write(&tree, "a.glsl", "#include \"a.glsl\"\n");

        let mut resolver = SourceResolver::new();
        let err = resolver
            .resolve_file(&root, &[])
            .expect_err("self include must be rejected");
        assert!(matches!(err, ResolveError::Cycle { .. }));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn includes_resolve_relative_to_including_file() {
        let tree = temp_tree("relative");
        let root = write(&tree, "main.frag", "#include \"sub/x.glsl\"\n");
        write(&tree, "sub/x.glsl", "#include \"y.glsl\"\nfloat x = 0.0;\n");
        let y = write(&tree, "sub/y.glsl", "float y = 0.0;\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert!(resolved.deps.contains(&normalize_path(&y)));
        assert!(resolved.text.contains("float y = 0.0;"));
        assert!(resolved.text.contains("float x = 0.0;"));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn unquoted_include_passes_through() {
        let tree = temp_tree("unquoted");
        let root = write(&tree, "main.frag", "#include common.glsl\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert_eq!(resolved.text, "#include common.glsl\n");
        assert_eq!(resolved.deps.len(), 1);

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn commented_include_is_ignored() {
        let tree = temp_tree("commented");
        let root = write(&tree, "main.frag", "// #include \"gone.glsl\"\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert_eq!(resolved.text, "// #include \"gone.glsl\"\n");
        assert_eq!(resolved.deps.len(), 1);

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn inline_source_resolves_includes_against_base_dir() {
        let tree = temp_tree("inline");
        write(&tree, "common.glsl", "float a = 1.0;\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver
            .resolve_inline(
                "#version 330 core\n#include \"common.glsl\"\n",
                &tree,
                &[MacroDef::flag("INLINE")],
            )
            .expect("resolve inline");

        assert!(resolved.text.contains("#define INLINE\n"));
        assert!(resolved.text.contains("float a = 1.0;"));
        // The inline body itself is not a watchable file.
        assert_eq!(resolved.deps.len(), 1);
        assert_eq!(resolved.file_for_index(0), Some(Path::new(INLINE_NAME)));

        let _ = fs::remove_dir_all(tree);
    }

    #[test]
    fn dotted_path_spellings_share_one_cache_entry() {
        let tree = temp_tree("dotted");
        let root = write(
            &tree,
            "main.frag",
            "#include \"./inc/../inc/common.glsl\"\n",
        );
        let common = write(&tree, "inc/common.glsl", "float a = 1.0;\n");

        let mut resolver = SourceResolver::new();
        let resolved = resolver.resolve_file(&root, &[]).expect("resolve");

        assert!(resolved.deps.contains(&normalize_path(&common)));
        // Spelled with dots, stored clean: invalidation by the plain path
        // must hit the same entry.
        assert!(resolver.invalidate(&common));

        let _ = fs::remove_dir_all(tree);
    }
}
