//! E-mail address extraction.

use regex::Regex;

use crate::item::Item;
use crate::stage::{BoundSettings, NoSettings, Stage, StageDefinition, StageError, StageStatus};

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}";

/// Extracts e-mail addresses; the default stage when none are configured.
pub struct EmailExtractor {
    pattern: Regex,
}

impl Stage for EmailExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&self, item: &mut Item) -> StageStatus {
        super::annotate_matches(item, &self.pattern, 0, "email");
        StageStatus::Success
    }
}

impl StageDefinition for EmailExtractor {
    const NAME: &'static str = "EmailExtractor";
    type Settings = NoSettings;

    fn create() -> Result<Self, StageError> {
        let pattern = Regex::new(EMAIL_PATTERN).map_err(|e| StageError::Instantiation(e.to_string()))?;
        Ok(Self { pattern })
    }

    fn configure(&mut self, _settings: BoundSettings<NoSettings>) -> Result<(), StageError> {
        Ok(())
    }
}
