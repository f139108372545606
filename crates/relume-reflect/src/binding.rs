//! The sampler binding-comment mini-protocol.
//!
//! A sampler declaration names its source in a trailing line comment:
//!
//! ```glsl
//! uniform sampler2D tex;   // textures/grain.png
//! uniform sampler2D lut;   // builtin checker
//! uniform sampler2D prev;  // target feedback
//! uniform sampler2D src;   // input or builtin black
//! ```
//!
//! Existing shader content depends on these exact matching rules; changes
//! here are format changes.

use std::path::PathBuf;

/// Where a sampler's texture comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureBinding {
    /// Image file, relative to the scene's directory.
    File(PathBuf),
    /// Packaged resource texture by id.
    Builtin(String),
    /// Declared render target (previous-frame contents), by name or by
    /// decimal declaration index.
    Target(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    /// `input or ` prefix: prefer an externally supplied input texture,
    /// falling back to `source` when none is present.
    pub prefer_input: bool,
    pub source: TextureBinding,
}

/// Parse one binding comment. `None` means the comment does not name a
/// usable source and the sampler stays unbound.
pub fn parse_binding_comment(text: &str) -> Option<SamplerBinding> {
    let text = text.trim();
    let (prefer_input, body) = match text.strip_prefix("input or") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            (true, rest.trim_start())
        }
        _ => (false, text),
    };

    let source = if let Some(id) = keyword_arg(body, "builtin") {
        TextureBinding::Builtin(id.to_string())
    } else if let Some(name) = keyword_arg(body, "target") {
        TextureBinding::Target(name.to_string())
    } else if body.is_empty() {
        return None;
    } else {
        TextureBinding::File(PathBuf::from(body))
    };

    Some(SamplerBinding {
        prefer_input,
        source,
    })
}

/// `keyword <arg>`: keyword must be followed by whitespace and a non-empty
/// argument. `builtin_tiles.png` is a path, not a keyword.
fn keyword_arg<'a>(body: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let arg = rest.trim();
    if arg.is_empty() {
        None
    } else {
        Some(arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_binds_a_file() {
        let b = parse_binding_comment(" textures/grain.png ").expect("path should bind");
        assert!(!b.prefer_input);
        assert_eq!(b.source, TextureBinding::File(PathBuf::from("textures/grain.png")));
    }

    #[test]
    fn builtin_keyword_binds_a_resource() {
        let b = parse_binding_comment("builtin checker").expect("builtin should bind");
        assert_eq!(b.source, TextureBinding::Builtin("checker".to_string()));
    }

    #[test]
    fn target_keyword_binds_by_name_or_index() {
        let by_name = parse_binding_comment("target feedback").expect("target should bind");
        assert_eq!(by_name.source, TextureBinding::Target("feedback".to_string()));

        let by_index = parse_binding_comment("target 0").expect("target index should bind");
        assert_eq!(by_index.source, TextureBinding::Target("0".to_string()));
    }

    #[test]
    fn input_or_prefix_sets_preference() {
        let b = parse_binding_comment("input or builtin black").expect("should bind");
        assert!(b.prefer_input);
        assert_eq!(b.source, TextureBinding::Builtin("black".to_string()));

        let b = parse_binding_comment("input or textures/fallback.png").expect("should bind");
        assert!(b.prefer_input);
        assert_eq!(
            b.source,
            TextureBinding::File(PathBuf::from("textures/fallback.png"))
        );
    }

    #[test]
    fn keyword_lookalike_paths_stay_paths() {
        let b = parse_binding_comment("builtin_tiles.png").expect("should bind as file");
        assert_eq!(b.source, TextureBinding::File(PathBuf::from("builtin_tiles.png")));

        let b = parse_binding_comment("input_frames/a.png").expect("should bind as file");
        assert!(!b.prefer_input);
        assert_eq!(
            b.source,
            TextureBinding::File(PathBuf::from("input_frames/a.png"))
        );
    }

    #[test]
    fn empty_or_argless_comments_do_not_bind() {
        assert_eq!(parse_binding_comment(""), None);
        assert_eq!(parse_binding_comment("   "), None);
        assert_eq!(parse_binding_comment("builtin"), None);
        assert_eq!(parse_binding_comment("target "), None);
        assert_eq!(parse_binding_comment("input or "), None);
    }
}
