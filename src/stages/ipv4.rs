//! IPv4 address extraction.

use std::ops::Range;

use regex::Regex;

use crate::item::Item;
use crate::stage::{BoundSettings, NoSettings, Stage, StageDefinition, StageError, StageStatus};

const OCTET: &str = r"(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])";

/// Extracts dotted-quad IPv4 addresses.
pub struct Ipv4Extractor {
    pattern: Regex,
}

impl Stage for Ipv4Extractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&self, item: &mut Item) -> StageStatus {
        for unit in item.units_mut() {
            let spans: Vec<_> = self
                .pattern
                .find_iter(unit.data())
                .map(|m| m.range())
                .filter(|span| is_standalone(unit.data().as_bytes(), span))
                .collect();

            for span in spans {
                unit.annotate("ipv4", span);
            }
        }
        StageStatus::Success
    }
}

impl StageDefinition for Ipv4Extractor {
    const NAME: &'static str = "Ipv4Extractor";
    type Settings = NoSettings;

    fn create() -> Result<Self, StageError> {
        let pattern = format!(r"\b(?:{o}\.){{3}}{o}\b", o = OCTET);
        let pattern = Regex::new(&pattern).map_err(|e| StageError::Instantiation(e.to_string()))?;
        Ok(Self { pattern })
    }

    fn configure(&mut self, _settings: BoundSettings<NoSettings>) -> Result<(), StageError> {
        Ok(())
    }
}

/// Reject matches that are part of a longer dotted number such as `1.2.3.4.5`.
///
/// The regex crate has no lookaround, so the neighbours are checked here without
/// consuming them; adjacent addresses separated by one character all match.
fn is_standalone(text: &[u8], span: &Range<usize>) -> bool {
    let before = span.start.checked_sub(1).map(|i| text[i]);
    if matches!(before, Some(b'0'..=b'9' | b'.')) {
        return false;
    }

    match text.get(span.end) {
        Some(b'0'..=b'9') => false,
        Some(b'.') => !matches!(text.get(span.end + 1), Some(b'0'..=b'9')),
        _ => true,
    }
}
