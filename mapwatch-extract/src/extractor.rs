use crate::field::{ExtractedField, PageFields};
use crate::rules::{ExtractionRules, Field};
use std::sync::Arc;

/// Locates the map name, preview image URL and player count in a listing page.
///
/// Cloning is cheap; the compiled rules are shared and never mutated, so one
/// extractor can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Arc<ExtractionRules>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Extractor backed by the built-in rules.
    pub fn new() -> Self {
        Self {
            rules: ExtractionRules::builtin(),
        }
    }

    /// Extractor backed by a replacement rule set.
    pub fn with_rules(rules: impl Into<Arc<ExtractionRules>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    pub fn map_name(&self, html: impl AsRef<str>) -> ExtractedField {
        self.extract(Field::MapName, html.as_ref())
    }

    /// The URL is returned exactly as written; relative URLs stay relative.
    pub fn image_url(&self, html: impl AsRef<str>) -> ExtractedField {
        self.extract(Field::ImageUrl, html.as_ref())
    }

    /// Player count text as written (`"12"` or `"12/24"`), not parsed.
    pub fn number_of_players(&self, html: impl AsRef<str>) -> ExtractedField {
        self.extract(Field::Players, html.as_ref())
    }

    pub fn extract(&self, field: Field, html: &str) -> ExtractedField {
        if html.is_empty() {
            return ExtractedField::NotFound;
        }
        match self.rules.rule(field).apply(html) {
            Some(value) => ExtractedField::Found(value.to_owned()),
            None => {
                tracing::trace!(
                    field = %field,
                    rules = self.rules.version(),
                    html_len = html.len(),
                    "extract.not_found"
                );
                ExtractedField::NotFound
            }
        }
    }

    /// All three fields. An absent document resolves every field to `NotFound`.
    pub fn extract_all<S: AsRef<str>>(&self, html: Option<S>) -> PageFields {
        let Some(html) = html else {
            return PageFields::not_found();
        };
        let html = html.as_ref();
        PageFields {
            map_name: self.map_name(html),
            image_url: self.image_url(html),
            players: self.number_of_players(html),
        }
    }
}
