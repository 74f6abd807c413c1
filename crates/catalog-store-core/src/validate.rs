//! Input validation, applied before any mutation.

use crate::error::{CatalogError, Result};

/// Trim `value` and reject it when nothing remains.
pub fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}

/// Validate an add-item request, returning the trimmed name and category.
pub fn new_item<'a>(name: &'a str, category: &'a str, image: &[u8]) -> Result<(&'a str, &'a str)> {
    let name = required("name", name)?;
    let category = required("category", category)?;
    if image.is_empty() {
        return Err(CatalogError::validation("image", "must not be empty"));
    }
    Ok((name, category))
}

/// Search keywords must contain something other than whitespace.
///
/// The keyword itself is returned untrimmed so that `" shirt"` keeps its
/// leading space when matched.
pub fn keyword(keyword: &str) -> Result<&str> {
    if keyword.trim().is_empty() {
        return Err(CatalogError::validation("keyword", "must not be empty"));
    }
    Ok(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("name", "  Red Shirt \n").unwrap(), "Red Shirt");
    }

    #[test]
    fn test_new_item_names_the_missing_field() {
        let err = new_item("", "Clothing", b"img").unwrap_err();
        assert!(err.to_string().contains("name"));

        let err = new_item("Shirt", "   ", b"img").unwrap_err();
        assert!(err.to_string().contains("category"));

        let err = new_item("Shirt", "Clothing", b"").unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(matches!(
            keyword(""),
            Err(CatalogError::Validation { field: "keyword", .. })
        ));
        assert!(keyword("  ").is_err());
        assert_eq!(keyword(" shirt").unwrap(), " shirt");
    }
}
