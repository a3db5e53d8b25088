use thiserror::Error;

/// Excel's maximum worksheet name length.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Errors raised when validating a worksheet name.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("sheet name cannot be empty")]
    Empty,
    #[error("sheet name exceeds {MAX_SHEET_NAME_LEN} characters: {0:?}")]
    TooLong(String),
    #[error("sheet name contains forbidden character {ch:?}: {name:?}")]
    ForbiddenChar { name: String, ch: char },
    #[error("sheet name cannot start or end with an apostrophe: {0:?}")]
    ApostropheEdge(String),
}

/// Validate a worksheet name against Excel's rules.
///
/// The template's own sheet names are odd but legal (`INSERT- HYDRAULICS`
/// has a stray space, `INSERT C1-ABUT` mixes separators); validation must
/// accept them verbatim since the cell map addresses sheets by exact name.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.is_empty() {
        return Err(SheetNameError::Empty);
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong(name.to_string()));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(SheetNameError::ForbiddenChar {
            name: name.to_string(),
            ch,
        });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::ApostropheEdge(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_sheet_names_are_valid() {
        for name in [
            "INSERT- HYDRAULICS",
            "INSERT C1-ABUT",
            "INSERT ESTIMATE",
            "STABILITY CHECK FOR PIER",
            "Deck Anchorage",
        ] {
            assert_eq!(validate_sheet_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        assert_eq!(validate_sheet_name(""), Err(SheetNameError::Empty));
        assert!(matches!(
            validate_sheet_name("HYDRAULICS/2024"),
            Err(SheetNameError::ForbiddenChar { ch: '/', .. })
        ));
        assert!(matches!(
            validate_sheet_name("'quoted'"),
            Err(SheetNameError::ApostropheEdge(_))
        ));
        assert!(matches!(
            validate_sheet_name(&"x".repeat(32)),
            Err(SheetNameError::TooLong(_))
        ));
    }
}
