//! URL extraction.

use regex::Regex;

use crate::item::Item;
use crate::stage::{BoundSettings, NoSettings, Stage, StageDefinition, StageError, StageStatus};

const URL_PATTERN: &str = r#"(?i)\b(?:https?|ftp)://[^\s<>"'`]+"#;

/// Characters that end a sentence rather than a URL.
const TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Extracts http, https and ftp URLs.
pub struct UrlExtractor {
    pattern: Regex,
}

impl Stage for UrlExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&self, item: &mut Item) -> StageStatus {
        for unit in item.units_mut() {
            let spans: Vec<_> = self
                .pattern
                .find_iter(unit.data())
                .map(|m| {
                    let trimmed = m.as_str().trim_end_matches(TRAILING);
                    m.start()..m.start() + trimmed.len()
                })
                .collect();

            for span in spans {
                unit.annotate("url", span);
            }
        }
        StageStatus::Success
    }
}

impl StageDefinition for UrlExtractor {
    const NAME: &'static str = "UrlExtractor";
    type Settings = NoSettings;

    fn create() -> Result<Self, StageError> {
        let pattern = Regex::new(URL_PATTERN).map_err(|e| StageError::Instantiation(e.to_string()))?;
        Ok(Self { pattern })
    }

    fn configure(&mut self, _settings: BoundSettings<NoSettings>) -> Result<(), StageError> {
        Ok(())
    }
}
