//! Culture tags attached to users.

use std::fmt;

/// Longest culture tag a user record can hold.
pub const MAX_CULTURE_LEN: usize = 10;

/// Cultures the application knows by name.
///
/// Users may still carry any tag up to [`MAX_CULTURE_LEN`] characters; this enum
/// only names the common ones and the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Culture {
    Us,
    #[default]
    Uk,
}

const CULTURE_TAGS: [(Culture, &str); 2] = [(Culture::Us, "en-US"), (Culture::Uk, "en-GB")];

impl Culture {
    /// The IETF tag for this culture.
    pub const fn tag(self) -> &'static str {
        match self {
            Culture::Us => "en-US",
            Culture::Uk => "en-GB",
        }
    }

    /// Look a culture up by tag, ignoring ASCII case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        CULTURE_TAGS
            .iter()
            .find(|(_, t)| t.eq_ignore_ascii_case(tag.trim()))
            .map(|(c, _)| *c)
    }

    pub fn all() -> impl Iterator<Item = Culture> {
        CULTURE_TAGS.iter().map(|(c, _)| *c)
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A culture tag is storable when it is non-blank and at most [`MAX_CULTURE_LEN`] characters.
pub fn is_valid_culture(tag: &str) -> bool {
    !tag.trim().is_empty() && tag.chars().count() <= MAX_CULTURE_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_culture_is_en_gb() {
        assert_eq!(Culture::default().tag(), "en-GB");
        assert_eq!(Culture::default().to_string(), "en-GB");
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(Culture::from_tag("en-US"), Some(Culture::Us));
        assert_eq!(Culture::from_tag("EN-gb"), Some(Culture::Uk));
        assert_eq!(Culture::from_tag("de-DE"), None);
    }

    #[test]
    fn test_every_tag_round_trips() {
        for culture in Culture::all() {
            assert_eq!(Culture::from_tag(culture.tag()), Some(culture));
        }
    }

    #[test]
    fn test_is_valid_culture() {
        assert!(is_valid_culture("en-US"));
        assert!(is_valid_culture("zh-Hant-TW"));
        assert!(!is_valid_culture("zh-Hant-TWX"));
        assert!(!is_valid_culture(""));
        assert!(!is_valid_culture("   "));
    }
}
