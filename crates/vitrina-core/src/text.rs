//! Text cleanup applied to scraped fields before persistence.

/// Collapse newlines to spaces, trim, and upper-case.
///
/// Used for product names and image alt texts.
#[must_use]
pub fn normalize_upper(text: &str) -> String {
    text.replace('\n', " ").trim().to_uppercase()
}

/// Collapse newlines to spaces, trim, and lower-case.
///
/// Used for product descriptions.
#[must_use]
pub fn normalize_lower(text: &str) -> String {
    text.replace('\n', " ").trim().to_lowercase()
}

/// Strip trailing `"| <code>"` metadata from a color label.
///
/// Sites append internal color codes after a pipe (`"NEGRO | 0000"`); only
/// the human-readable part is a usable map key. Returns `None` when nothing
/// readable remains.
#[must_use]
pub fn clean_color_name(raw: &str) -> Option<String> {
    let cleaned = raw.split('|').next().unwrap_or("").trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_collapses_newlines_and_trims() {
        assert_eq!(normalize_upper("  Camisa\nOversize  "), "CAMISA OVERSIZE");
    }

    #[test]
    fn lower_collapses_newlines_and_trims() {
        assert_eq!(
            normalize_lower("Camisa de algodón\ncon cuello solapa"),
            "camisa de algodón con cuello solapa"
        );
    }

    #[test]
    fn color_name_drops_pipe_suffix() {
        assert_eq!(clean_color_name("NEGRO | 0000").as_deref(), Some("NEGRO"));
    }

    #[test]
    fn color_name_without_suffix_is_trimmed() {
        assert_eq!(clean_color_name("  BLANCO ROTO  ").as_deref(), Some("BLANCO ROTO"));
    }

    #[test]
    fn color_name_empty_after_cleaning_is_none() {
        assert_eq!(clean_color_name(" | 0000"), None);
        assert_eq!(clean_color_name("   "), None);
    }
}
