//! Pattern-based extraction of map name, preview image and player count
//! from a game-server listing page.
//!
//! - [`Extractor`]: runs one compiled rule per field over raw HTML text
//! - [`ExtractionRules`]: versioned, replaceable pattern set (built-in `v1`)
//! - [`ExtractedField`]: `Found(text)` or `NotFound`; absence is never an error
//!
//! No DOM is built. Each field is located with a regular expression, so
//! malformed markup is tolerated as long as the field's own context matches.
//!
//! ```rust
//! use mapwatch_extract::{ExtractedField, Extractor};
//!
//! let html = r#"<div class="mapname">Dust Bowl</div>
//!     <img src="http://example.com/dust.jpg"> Players: 12/24"#;
//!
//! let extractor = Extractor::new();
//! assert_eq!(extractor.map_name(html), ExtractedField::found("Dust Bowl"));
//! assert_eq!(extractor.image_url(html).as_deref(), Some("http://example.com/dust.jpg"));
//! assert_eq!(extractor.number_of_players(html).as_deref(), Some("12/24"));
//! ```

pub mod extractor;
pub mod field;
pub mod rules;

pub use extractor::Extractor;
pub use field::{ExtractedField, PageFields};
pub use rules::{ExtractError, ExtractionRules, Field, FieldRule};
