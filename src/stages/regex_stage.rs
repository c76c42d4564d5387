//! Configurable pattern extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::stage::{BoundSettings, Stage, StageDefinition, StageError, StageSettings, StageStatus};

fn default_kind() -> String {
    "regex".to_string()
}

/// Settings for [`RegexExtractor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexSettings {
    /// Pattern in `regex` crate syntax
    pub pattern: String,
    /// Capture group whose text is extracted; 0 is the whole match
    #[serde(default)]
    pub group: usize,
    /// Kind recorded on each extraction
    #[serde(default = "default_kind")]
    pub kind: String,
}

impl RegexSettings {
    pub fn new(pattern: impl Into<String>, group: usize, kind: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            group,
            kind: kind.into(),
        }
    }
}

impl StageSettings for RegexSettings {}

/// Extracts every match of a configured pattern.
///
/// The stage cannot run without settings: configuring it with an empty payload
/// fails.
#[derive(Default)]
pub struct RegexExtractor {
    pattern: Option<Regex>,
    group: usize,
    kind: String,
}

impl Stage for RegexExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&self, item: &mut Item) -> StageStatus {
        match &self.pattern {
            Some(pattern) => {
                super::annotate_matches(item, pattern, self.group, &self.kind);
                StageStatus::Success
            }
            None => StageStatus::failure("no pattern configured"),
        }
    }
}

impl StageDefinition for RegexExtractor {
    const NAME: &'static str = "RegexExtractor";
    type Settings = RegexSettings;

    fn create() -> Result<Self, StageError> {
        Ok(Self::default())
    }

    fn configure(&mut self, settings: BoundSettings<RegexSettings>) -> Result<(), StageError> {
        let settings = settings.required()?;
        let pattern = Regex::new(&settings.pattern)
            .map_err(|e| StageError::InvalidSettings(format!("invalid pattern: {}", e)))?;

        if settings.group >= pattern.captures_len() {
            return Err(StageError::InvalidSettings(format!(
                "pattern has no capture group {}",
                settings.group
            )));
        }

        self.pattern = Some(pattern);
        self.group = settings.group;
        self.kind = settings.kind;
        Ok(())
    }
}
