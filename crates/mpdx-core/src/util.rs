//! Shared utility functions used across multiple modules.

use uuid::Uuid;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Generate a local identifier for a record the server has not seen yet.
///
/// UUID v7 keeps locally created records time-sortable.
pub fn new_local_id() -> String {
    Uuid::now_v7().to_string()
}

/// Compare two optional strings treating `None` and `""` as equal.
pub fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or_default() == b.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" /tmp/mpdx.db ".to_string())),
            Some("/tmp/mpdx.db".to_string())
        );
    }

    #[test]
    fn local_ids_are_unique() {
        assert_ne!(new_local_id(), new_local_id());
    }

    #[test]
    fn same_text_treats_missing_as_empty() {
        assert!(same_text(None, Some("")));
        assert!(same_text(Some("a"), Some("a")));
        assert!(!same_text(Some("a"), None));
        assert!(!same_text(Some("a"), Some("A")));
    }
}
