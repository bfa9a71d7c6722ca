use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Unicode clean-up of extracted text.
///
/// NFC normalization, ligature expansion (ff, fi, fl, ffi, ffl) and removal
/// of the replacement character left behind by failed glyph decoding.
pub fn normalize_glyphs(text: &str) -> String {
    let mut result: String = text.nfc().collect();

    let ligatures = [
        ("\u{FB00}", "ff"),
        ("\u{FB01}", "fi"),
        ("\u{FB02}", "fl"),
        ("\u{FB03}", "ffi"),
        ("\u{FB04}", "ffl"),
    ];
    for (lig, replacement) in &ligatures {
        result = result.replace(lig, replacement);
    }

    result.replace('\u{FFFD}', "")
}

/// Final whitespace pass over a joined paragraph.
///
/// 1. Runs of non-newline whitespace become one space.
/// 2. Leading newline runs (and the spaces before them) are dropped.
/// 3. Any remaining newline run, with the spaces before it, is removed.
pub fn collapse_whitespace(text: &str) -> String {
    static RE_SPACES: OnceLock<Regex> = OnceLock::new();
    static RE_LEADING: OnceLock<Regex> = OnceLock::new();
    static RE_BREAKS: OnceLock<Regex> = OnceLock::new();

    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r"[^\S\n]+").unwrap());
    let re_leading = RE_LEADING.get_or_init(|| Regex::new(r"^ *\n+").unwrap());
    let re_breaks = RE_BREAKS.get_or_init(|| Regex::new(r" *\n+").unwrap());

    let result = re_spaces.replace_all(text, " ");
    let result = re_leading.replace(&result, "");
    re_breaks.replace_all(&result, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(normalize_glyphs("Hello world."), "Hello world.");
        assert_eq!(collapse_whitespace("Hello world."), "Hello world.");
    }

    #[test]
    fn test_ligature_fix() {
        assert_eq!(normalize_glyphs("\u{FB01}nd"), "find");
        assert_eq!(normalize_glyphs("a\u{FB04}e"), "affle");
    }

    #[test]
    fn test_nfc_normalization() {
        let result = normalize_glyphs("caf\u{0065}\u{0301}");
        assert_eq!(result, "caf\u{00E9}");
    }

    #[test]
    fn test_replacement_char_removed() {
        assert_eq!(normalize_glyphs("Hello\u{FFFD}World"), "HelloWorld");
    }

    #[test]
    fn test_space_runs_collapse() {
        assert_eq!(collapse_whitespace("a   b\t\tc"), "a b c");
    }

    #[test]
    fn test_leading_newlines_stripped() {
        assert_eq!(collapse_whitespace("\n\nBody text"), "Body text");
        assert_eq!(collapse_whitespace("  \nBody"), "Body");
    }

    #[test]
    fn test_inner_newline_runs_removed() {
        assert_eq!(collapse_whitespace("Title \n\nBody"), "TitleBody");
        assert_eq!(collapse_whitespace("Title\nBody"), "TitleBody");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace("\n"), "");
    }
}
