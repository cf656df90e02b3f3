//! Recovery of structured data embedded in free text

use serde::de::DeserializeOwned;

/// First balanced `{...}` object in `text`
///
/// Braces inside string literals (including escaped quotes) are ignored,
/// so an argument like `"uses {placeholders}"` does not end the object.
///
/// ```rust
/// use court_llm::extract_json_object;
///
/// let text = "Sure! ```json\n{\"score\": 4, \"argument\": \"a } inside\"}\n``` done";
/// assert_eq!(
///     extract_json_object(text),
///     Some("{\"score\": 4, \"argument\": \"a } inside\"}")
/// );
/// ```
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `raw` as `T`, directly or from its first embedded object
#[must_use]
pub fn salvage<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    serde_json::from_str(extract_json_object(trimmed)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        score: u8,
    }

    #[test]
    fn nested_objects_are_balanced() {
        let text = r#"prefix {"a": {"b": {}}, "c": 1} suffix {"d": 2}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": {}}, "c": 1}"#));
    }

    #[test]
    fn escaped_quotes_do_not_close_strings() {
        let text = r#"{"argument": "he said \"{\" loudly", "score": 2}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn unbalanced_text_yields_nothing() {
        assert_eq!(extract_json_object("{\"score\": 3"), None);
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn salvage_validates_shape() {
        assert_eq!(salvage::<Verdict>("noise {\"score\": 3} noise"), Some(Verdict { score: 3 }));
        assert_eq!(salvage::<Verdict>("{\"score\": \"high\"}"), None);
    }
}
