//! Naming policy for elements and workspaces.
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`is_valid_name`] | Length and character-class check |
//! | [`validate_unique`] | Uniqueness against a set of names |
//! | [`validate_name_against`] | Both of the above |
//! | [`generate_unique_default_name`] | `"{Type} {N}"` with the smallest free `N` |
//! | [`is_default_generated`] / [`default_suffix`] | Recognise generated names |
//! | [`suggest_unique_name`] | Conflict-free variant of a workspace name |
//! | [`slugify`] | Filesystem-safe form of a name |

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::element::ElementKind;

/// Minimum length of a workspace name.
pub const WORKSPACE_MIN_NAME_LEN: usize = 3;

/// Why a candidate name was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name must be at least {min} characters long.")]
    TooShort { min: usize },

    #[error("Name can only contain letters, numbers, spaces, underscores, and hyphens.")]
    InvalidCharacters,

    #[error("A name '{0}' already exists.")]
    Conflict(String),
}

/// Letters, digits, space, underscore, hyphen.
pub fn default_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_ -]+$").expect("name pattern regex"))
}

fn default_generated_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let kinds: Vec<String> = ElementKind::ALL
            .iter()
            .map(|kind| kind.display_name().replace(' ', r"\s+"))
            .collect();
        Regex::new(&format!(r"^({})\s+(\d+)$", kinds.join("|"))).expect("default name regex")
    })
}

fn numbered_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*?)([ _\-.,])(\d+)$").expect("numbered suffix regex"))
}

/// Check length (in characters) and character class.
///
/// `pattern` defaults to [`default_pattern`].
pub fn is_valid_name(name: &str, min_len: usize, pattern: Option<&Regex>) -> Result<(), NameError> {
    if name.chars().count() < min_len {
        return Err(NameError::TooShort { min: min_len });
    }
    let pattern = pattern.unwrap_or(default_pattern());
    if !pattern.is_match(name) {
        return Err(NameError::InvalidCharacters);
    }
    Ok(())
}

/// Case-sensitive uniqueness check. `exclude` removes one name from the
/// comparison set, typically the element's own current name.
pub fn validate_unique<'a, I>(name: &str, existing: I, exclude: Option<&str>) -> Result<(), NameError>
where
    I: IntoIterator<Item = &'a str>,
{
    let clash = existing
        .into_iter()
        .filter(|other| Some(*other) != exclude)
        .any(|other| other == name);
    if clash {
        return Err(NameError::Conflict(name.to_string()));
    }
    Ok(())
}

/// [`is_valid_name`] followed by [`validate_unique`].
pub fn validate_name_against<'a, I>(
    name: &str,
    existing: I,
    min_len: usize,
    exclude: Option<&str>,
) -> Result<(), NameError>
where
    I: IntoIterator<Item = &'a str>,
{
    is_valid_name(name, min_len, None)?;
    validate_unique(name, existing, exclude)
}

/// `"{type_display_name} {i}"` for the smallest unused `i >= 1`.
pub fn generate_unique_default_name<'a, I>(type_display_name: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = existing.into_iter().collect();
    (1..)
        .map(|i| format!("{type_display_name} {i}"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_default()
}

/// Whether `name` looks like `"{Kind} {N}"` for one of the element kinds.
pub fn is_default_generated(name: &str) -> bool {
    default_generated_pattern().is_match(name)
}

/// The `N` of a default-generated name.
pub fn default_suffix(name: &str) -> Option<u64> {
    default_generated_pattern()
        .captures(name)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// A valid name derived from `base` that is not in `existing`.
///
/// `base` itself is returned when it is already valid and free. A trailing
/// `<delimiter><number>` (delimiter one of space, `-`, `_`, `.`, `,`) is
/// incremented; other names get `_2`, `_3`, ... appended. Characters the
/// name grammar rejects are replaced with `_`.
pub fn suggest_unique_name<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = existing.into_iter().collect();
    let usable = |candidate: &str| {
        is_valid_name(candidate, WORKSPACE_MIN_NAME_LEN, None).is_ok() && !taken.contains(&candidate)
    };
    if usable(base) {
        return base.to_string();
    }

    let (raw_prefix, raw_delim, mut counter) = match numbered_suffix_pattern().captures(base) {
        Some(caps) => {
            let number: u64 = caps[3].parse().unwrap_or(1);
            (caps[1].to_string(), caps[2].to_string(), number.saturating_add(1))
        }
        None if base.is_empty() => ("Workspace".to_string(), "_".to_string(), 2),
        None => (base.to_string(), "_".to_string(), 2),
    };

    let mut prefix = sanitize(&raw_prefix).trim().to_string();
    if prefix.is_empty() {
        prefix = "Workspace".to_string();
    }
    let delim = match raw_delim.as_str() {
        " " | "-" | "_" => raw_delim.as_str(),
        _ => "_",
    };

    loop {
        let candidate = format!("{prefix}{delim}{counter}");
        if usable(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Replace characters outside the name grammar with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Filesystem-safe form of an element name: alphanumerics, `_` and `-` are
/// kept, everything else becomes `_`. A blank name becomes `"screen"`.
pub fn slugify(name: &str) -> String {
    let trimmed = name.trim();
    let source = if trimmed.is_empty() { "screen" } else { trimmed };
    source
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("Lens 1", 1, None).is_ok());
        assert!(is_valid_name("a-b_c", 3, None).is_ok());
        assert_eq!(is_valid_name("ab", 3, None), Err(NameError::TooShort { min: 3 }));
        assert_eq!(is_valid_name("", 1, None), Err(NameError::TooShort { min: 1 }));
        assert_eq!(is_valid_name("lens#1", 1, None), Err(NameError::InvalidCharacters));
        assert_eq!(is_valid_name("f.100", 1, None), Err(NameError::InvalidCharacters));
    }

    #[test]
    fn test_custom_pattern() {
        let digits = Regex::new(r"^\d+$").unwrap();
        assert!(is_valid_name("123", 1, Some(&digits)).is_ok());
        assert!(is_valid_name("Lens", 1, Some(&digits)).is_err());
    }

    #[test]
    fn test_validate_unique_with_exclude() {
        let names = ["Lens 1", "Screen 1"];
        assert!(validate_unique("Lens 2", names, None).is_ok());
        assert_eq!(
            validate_unique("Lens 1", names, None),
            Err(NameError::Conflict("Lens 1".into()))
        );
        assert!(validate_unique("Lens 1", names, Some("Lens 1")).is_ok());
        // Uniqueness is case-sensitive.
        assert!(validate_unique("lens 1", names, None).is_ok());
    }

    #[test]
    fn test_generate_unique_default_name_fills_gaps() {
        assert_eq!(generate_unique_default_name("Lens", []), "Lens 1");
        let names = ["Lens 1", "Lens 3"];
        assert_eq!(generate_unique_default_name("Lens", names), "Lens 2");
        assert_eq!(
            generate_unique_default_name("Aperture Result", ["Aperture Result 1"]),
            "Aperture Result 2"
        );
    }

    #[test]
    fn test_default_generated_detection() {
        assert!(is_default_generated("Aperture 2"));
        assert!(is_default_generated("Aperture  Result 7"));
        assert!(is_default_generated("Target Intensity 1"));
        assert!(!is_default_generated("Aperture"));
        assert!(!is_default_generated("My Lens 1"));
        assert!(!is_default_generated("Mirror 1"));
        assert_eq!(default_suffix("Screen 12"), Some(12));
        assert_eq!(default_suffix("Screen"), None);
    }

    #[test]
    fn test_suggest_unique_name() {
        assert_eq!(suggest_unique_name("Bench", []), "Bench");
        assert_eq!(suggest_unique_name("Bench", ["Bench"]), "Bench_2");
        assert_eq!(suggest_unique_name("Bench 4", ["Bench 4"]), "Bench 5");
        assert_eq!(suggest_unique_name("Bench-4", ["Bench-4", "Bench-5"]), "Bench-6");
        assert_eq!(suggest_unique_name("Bench.4", ["Bench.4"]), "Bench_5");
        assert_eq!(suggest_unique_name("a,1", []), "a_2");
        assert_eq!(suggest_unique_name("", []), "Workspace_2");
        assert_eq!(suggest_unique_name("x!", []), "x__2");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Screen 1"), "Screen_1");
        assert_eq!(slugify("  far-field/cam  "), "far-field_cam");
        assert_eq!(slugify(""), "screen");
        assert_eq!(slugify("   "), "screen");
    }
}
