//! Versioned extraction patterns.
//!
//! Each field is located by one regular expression. The field value is the
//! first capture group that took part in the match, so a pattern may offer
//! alternatives (quoted vs. unquoted attribute values) in separate groups.
//! A page-layout change means replacing one pattern here or overriding it
//! in configuration; the extraction logic stays the same.

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Version tag of the built-in pattern set.
pub const BUILTIN_VERSION: &str = "v1";

/// Text of the first element whose `class` contains the `mapname` token.
/// Leading opening tags (`<b>`, `<span ..>`) are skipped; closing tags are not.
pub const MAP_NAME_PATTERN: &str = r#"(?i)<[a-z][a-z0-9]*\b[^>]*?\bclass\s*=\s*["']?(?:[^"'>]*\s)?mapname(?:\s[^"'>]*)?(?:["'][^>]*)?>(?:\s*<[a-z][^>]*>)*([^<]*)"#;

/// `src` of the first `<img>` tag: double-quoted, single-quoted or bare.
pub const IMAGE_URL_PATTERN: &str =
    r#"(?i)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]*))"#;

/// `N` or `N/M` after the word "Player(s)", an optional colon and any tags in between.
pub const PLAYERS_PATTERN: &str =
    r#"(?i)\bplayers?\b(?:["'][^>]*>)?\s*:?\s*(?:<[^>]*>\s*)*(\d+(?:\s*/\s*\d+)?)"#;

// The regex crate matches in linear time; the limit only bounds compiled size.
const COMPILED_SIZE_LIMIT: usize = 1 << 20;

static BUILTIN: LazyLock<Arc<ExtractionRules>> = LazyLock::new(|| {
    Arc::new(
        ExtractionRules::from_patterns(
            BUILTIN_VERSION,
            MAP_NAME_PATTERN,
            IMAGE_URL_PATTERN,
            PLAYERS_PATTERN,
        )
        .expect("built-in extraction patterns compile - this is a bug"),
    )
});

/// The three fields a listing page is mined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    MapName,
    ImageUrl,
    Players,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::MapName, Field::ImageUrl, Field::Players];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::MapName => "map_name",
            Field::ImageUrl => "image_url",
            Field::Players => "players",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid pattern for {field}: {reason}")]
    InvalidPattern { field: Field, reason: String },
}

/// A compiled pattern for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field: Field,
    regex: Regex,
}

impl FieldRule {
    /// Compile `pattern` for `field`. The pattern needs at least one capture group.
    ///
    /// ```
    /// use mapwatch_extract::{Field, FieldRule};
    ///
    /// assert!(FieldRule::new(Field::Players, r"online:\s*(\d+)").is_ok());
    /// assert!(FieldRule::new(Field::Players, r"online:\s*\d+").is_err());
    /// ```
    pub fn new(field: Field, pattern: &str) -> Result<Self, ExtractError> {
        let regex = RegexBuilder::new(pattern)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()
            .map_err(|e| ExtractError::InvalidPattern {
                field,
                reason: e.to_string(),
            })?;
        if regex.captures_len() < 2 {
            return Err(ExtractError::InvalidPattern {
                field,
                reason: "pattern has no capture group".into(),
            });
        }
        Ok(Self { field, regex })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// First match in document order, trimmed. A blank capture yields `None`;
    /// later matches are not consulted.
    pub(crate) fn apply<'h>(&self, html: &'h str) -> Option<&'h str> {
        let caps = self.regex.captures(html)?;
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().trim())
            .filter(|value| !value.is_empty())
    }
}

/// A versioned set of one rule per field.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    version: String,
    map_name: FieldRule,
    image_url: FieldRule,
    players: FieldRule,
}

impl ExtractionRules {
    /// Shared handle to the built-in `v1` rules, compiled once per process.
    pub fn builtin() -> Arc<ExtractionRules> {
        Arc::clone(&BUILTIN)
    }

    /// Compile a replacement rule set.
    ///
    /// ```
    /// use mapwatch_extract::rules::{ExtractionRules, IMAGE_URL_PATTERN, PLAYERS_PATTERN};
    ///
    /// let rules = ExtractionRules::from_patterns(
    ///     "site-2024",
    ///     r#"<h2 id="current-map">([^<]*)</h2>"#,
    ///     IMAGE_URL_PATTERN,
    ///     PLAYERS_PATTERN,
    /// )
    /// .unwrap();
    /// assert_eq!(rules.version(), "site-2024");
    /// ```
    pub fn from_patterns(
        version: impl Into<String>,
        map_name: &str,
        image_url: &str,
        players: &str,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            version: version.into(),
            map_name: FieldRule::new(Field::MapName, map_name)?,
            image_url: FieldRule::new(Field::ImageUrl, image_url)?,
            players: FieldRule::new(Field::Players, players)?,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rule(&self, field: Field) -> &FieldRule {
        match field {
            Field::MapName => &self.map_name,
            Field::ImageUrl => &self.image_url,
            Field::Players => &self.players,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_compile_once() {
        let a = ExtractionRules::builtin();
        let b = ExtractionRules::builtin();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.version(), BUILTIN_VERSION);
        for field in Field::ALL {
            assert_eq!(a.rule(field).field(), field);
        }
    }

    #[test]
    fn rejects_pattern_without_group() {
        let err = ExtractionRules::from_patterns("x", "mapname", IMAGE_URL_PATTERN, PLAYERS_PATTERN)
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InvalidPattern {
                field: Field::MapName,
                ..
            }
        ));
    }

    #[test]
    fn rejects_uncompilable_pattern() {
        let err = FieldRule::new(Field::ImageUrl, "(unclosed").unwrap_err();
        assert!(err.to_string().starts_with("invalid pattern for image_url"));
    }

    #[test]
    fn first_participating_group_is_the_value() {
        let rule = FieldRule::new(Field::ImageUrl, IMAGE_URL_PATTERN).unwrap();
        assert_eq!(rule.apply(r#"<img src='a.png'>"#), Some("a.png"));
        assert_eq!(rule.apply(r#"<img src=b.png alt="x">"#), Some("b.png"));
        assert_eq!(rule.apply(r#"<IMG alt="x" SRC="c.png">"#), Some("c.png"));
    }

    #[test]
    fn blank_capture_is_none() {
        let rule = FieldRule::new(Field::ImageUrl, IMAGE_URL_PATTERN).unwrap();
        assert_eq!(rule.apply(r#"<img src="  "><img src="later.png">"#), None);
    }

    #[test]
    fn bare_empty_src_is_none() {
        let rule = FieldRule::new(Field::ImageUrl, IMAGE_URL_PATTERN).unwrap();
        assert_eq!(rule.apply(r#"<img src=><img src="later.png">"#), None);
        assert_eq!(rule.apply(r#"<img alt=x src=><img src=later.png>"#), None);
        assert_eq!(rule.apply("<img src=bare.png>"), Some("bare.png"));
    }
}
