//! Text normalization shared by catalog producers and the resolver
//!
//! Both sides must normalize identically or matches silently fail, so
//! every string entering the catalog and every claimed citation goes
//! through [`normalize`].

/// Maximum characters kept per normalized entry
pub const MAX_ENTRY_CHARS: usize = 200;

/// Trim, collapse whitespace, unify quotes and slashes, cap length
///
/// ```rust
/// use court_catalog::normalize;
///
/// assert_eq!(normalize("  “StateGraph”\tin  src\\graph.py "), "'StateGraph' in src/graph.py");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let unified: String = text
        .chars()
        .map(|c| match c {
            '"' | '`' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}' => '\'',
            '\\' => '/',
            other => other,
        })
        .collect();

    let collapsed = collapse_whitespace(&unified);
    collapsed.chars().take(MAX_ENTRY_CHARS).collect::<String>().trim_end().to_string()
}

/// Comparison key for case-insensitive substring matching
///
/// Lowercases and treats `_` and `-` as word separators, so
/// `stategraph_detected` and `StateGraph Detected` compare equal.
#[must_use]
pub fn fold(normalized: &str) -> String {
    let spaced: String = normalized
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    collapse_whitespace(&spaced)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_max_chars() {
        let long = "x".repeat(500);
        assert_eq!(normalize(&long).chars().count(), MAX_ENTRY_CHARS);
    }

    #[test]
    fn cap_counts_characters_not_bytes() {
        let long = "é".repeat(300);
        assert_eq!(normalize(&long).chars().count(), MAX_ENTRY_CHARS);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn fold_unifies_separators_and_case() {
        assert_eq!(fold("stategraph_detected: true"), "stategraph detected: true");
        assert_eq!(fold("StateGraph  Detected"), "stategraph detected");
        assert_eq!(fold("add-conditional-edges"), "add conditional edges");
    }
}
