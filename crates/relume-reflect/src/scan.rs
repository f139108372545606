//! Flattened-source scanning: declaration lookup for binding comments and
//! first-occurrence ordering for stable UI layout.

/// Byte offset of the first whole-identifier occurrence of `word`.
pub fn first_occurrence(haystack: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(word) {
        let at = from + pos;
        let end = at + word.len();
        let before_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// GL reports array uniforms as `name[0]`; strip the subscript for source
/// scanning.
pub fn base_name(name: &str) -> &str {
    match name.find('[') {
        Some(at) => &name[..at],
        None => name,
    }
}

/// Does this line actively declare uniform `name`? Commented-out lines do
/// not count.
fn declares_uniform(line: &str, name: &str) -> bool {
    let code = line.trim_start();
    if code.starts_with("//") {
        return false;
    }
    let stmt = match code.split_once(';') {
        Some((stmt, _)) => stmt,
        None => return false,
    };
    first_occurrence(stmt, "uniform").is_some() && first_occurrence(stmt, name).is_some()
}

/// Trailing comment on the line declaring `name`, trimmed. `None` when the
/// declaration has no comment or was not found; the first declaration line
/// wins.
pub fn sampler_comment<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let base = base_name(name);
    for line in source.lines() {
        if !declares_uniform(line, base) {
            continue;
        }
        let (_, after) = line.split_once(';')?;
        let (_, comment) = after.split_once("//")?;
        return Some(comment.trim());
    }
    None
}

/// Sort key for UI ordering: position of the uniform's first textual
/// occurrence, with unfound names (padded built-in arrays and the like)
/// sinking to the end.
pub fn occurrence_key(source: &str, name: &str) -> usize {
    first_occurrence(source, base_name(name)).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
#version 330 core
uniform float gain;
uniform sampler2D prev; // target feedback
uniform sampler2D tex;  // input or textures/a.png
// uniform sampler2D prev; // target stale
uniform float gain_fine;
uniform float levels[4];
void main() {}
";

    #[test]
    fn whole_word_search_skips_longer_identifiers() {
        assert!(first_occurrence("float gain_fine;", "gain").is_none());
        assert_eq!(first_occurrence("float gain;", "gain"), Some(6));
        assert!(first_occurrence("regained", "gain").is_none());
    }

    #[test]
    fn sampler_comment_is_taken_from_the_declaration_line() {
        assert_eq!(sampler_comment(SOURCE, "prev"), Some("target feedback"));
        assert_eq!(sampler_comment(SOURCE, "tex"), Some("input or textures/a.png"));
    }

    #[test]
    fn uncommented_declaration_yields_none() {
        assert_eq!(sampler_comment(SOURCE, "gain"), None);
    }

    #[test]
    fn commented_out_declarations_are_skipped() {
        let source = "\
// uniform sampler2D prev; // target stale
uniform sampler2D prev; // target fresh
";
        assert_eq!(sampler_comment(source, "prev"), Some("target fresh"));
    }

    #[test]
    fn array_names_scan_by_base_name() {
        assert_eq!(base_name("levels[0]"), "levels");
        assert!(occurrence_key(SOURCE, "levels[0]") < usize::MAX);
    }

    #[test]
    fn occurrence_keys_order_by_declaration() {
        let gain = occurrence_key(SOURCE, "gain");
        let prev = occurrence_key(SOURCE, "prev");
        let fine = occurrence_key(SOURCE, "gain_fine");
        assert!(gain < prev, "gain declared before prev");
        assert!(prev < fine, "prev declared before gain_fine");
        assert_eq!(occurrence_key(SOURCE, "absent"), usize::MAX);
    }
}
