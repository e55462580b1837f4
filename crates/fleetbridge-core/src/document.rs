//! Tax-document normalization.
//!
//! Documents (national business/person registration numbers) are the primary
//! join key between the Source inventory and the Target customer registry.
//! Both systems format them inconsistently, so every comparison goes through
//! [`normalize_document`] first.

/// Normalize a raw tax-document string to its digits-only form.
///
/// Source snapshots occasionally carry an escaped-slash artifact
/// (`"25.994.179\/0001-70"`), which is removed before stripping every
/// non-digit character. `None` and digit-free input yield an empty string;
/// this function never fails.
///
/// Idempotent: normalizing an already-normalized value is a no-op.
#[must_use]
pub fn normalize_document(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    raw.replace("\\/", "/")
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(
            normalize_document(Some("25.729.197/0001-36")),
            "25729197000136"
        );
    }

    #[test]
    fn test_strips_escaped_slash_artifact() {
        assert_eq!(
            normalize_document(Some("25.994.179\\/0001-70")),
            "25994179000170"
        );
    }

    #[test]
    fn test_none_yields_empty() {
        assert_eq!(normalize_document(None), "");
    }

    #[test]
    fn test_digit_free_input_yields_empty() {
        assert_eq!(normalize_document(Some("no digits here")), "");
        assert_eq!(normalize_document(Some("")), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = ["25.729.197/0001-36", "123 456", "abc", ""];
        for raw in inputs {
            let once = normalize_document(Some(raw));
            let twice = normalize_document(Some(once.as_str()));
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_output_is_digits_only() {
        let out = normalize_document(Some("a1b2c3-4/5.6\\/78"));
        assert!(out.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(out, "12345678");
    }
}
