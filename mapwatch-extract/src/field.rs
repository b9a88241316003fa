use serde::Serialize;
use std::fmt;

/// Result of extracting one field from a page.
///
/// `Found` never carries an empty string: an empty capture is reported as
/// `NotFound` because it is not a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "Option<String>")]
pub enum ExtractedField {
    Found(String),
    NotFound,
}

impl ExtractedField {
    /// Build a field from captured text, trimming it and mapping blank text to `NotFound`.
    ///
    /// ```
    /// use mapwatch_extract::ExtractedField;
    ///
    /// assert_eq!(ExtractedField::found("  Dust Bowl "), ExtractedField::Found("Dust Bowl".into()));
    /// assert_eq!(ExtractedField::found("   "), ExtractedField::NotFound);
    /// ```
    pub fn found(text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim();
        if text.is_empty() {
            Self::NotFound
        } else {
            Self::Found(text.to_owned())
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Found(text) => Some(text),
            Self::NotFound => None,
        }
    }

    pub fn into_option(self) -> Option<String> {
        self.into()
    }
}

impl From<ExtractedField> for Option<String> {
    fn from(field: ExtractedField) -> Self {
        match field {
            ExtractedField::Found(text) => Some(text),
            ExtractedField::NotFound => None,
        }
    }
}

impl fmt::Display for ExtractedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(text) => f.write_str(text),
            Self::NotFound => f.write_str("not found"),
        }
    }
}

/// The three fields of one listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFields {
    pub map_name: ExtractedField,
    pub image_url: ExtractedField,
    pub players: ExtractedField,
}

impl PageFields {
    pub fn not_found() -> Self {
        Self {
            map_name: ExtractedField::NotFound,
            image_url: ExtractedField::NotFound,
            players: ExtractedField::NotFound,
        }
    }

    /// True when none of the three fields could be located.
    pub fn is_empty(&self) -> bool {
        !(self.map_name.is_found() || self.image_url.is_found() || self.players.is_found())
    }
}
