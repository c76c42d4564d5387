//! Per-document working item.
//!
//! An [`Item`] holds one [`TextUnit`] per selected record field for the duration of a
//! single pipeline run. Stages read the units and attach [`Extraction`]s to them; the
//! item is dropped once the results have been aggregated into the record.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A value extracted by a stage from a text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Entity kind reported by the stage (e.g. "email", "url")
    pub kind: String,
    /// Byte offset of the first covered character in the unit's data
    pub start: usize,
    /// Byte offset one past the last covered character
    pub end: usize,
    /// Extracted value
    pub value: String,
}

/// One field's text content, named by the field it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    name: String,
    data: String,
    #[serde(default)]
    extractions: Vec<Extraction>,
}

impl TextUnit {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            extractions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn extractions(&self) -> &[Extraction] {
        &self.extractions
    }

    /// Attach an extraction covering `span` of this unit's data.
    ///
    /// Returns `None` without attaching anything when the span is empty, out of
    /// bounds, or does not fall on character boundaries.
    pub fn annotate(&mut self, kind: impl Into<String>, span: Range<usize>) -> Option<&Extraction> {
        if span.start >= span.end {
            return None;
        }
        let value = self.data.get(span.clone())?.to_string();

        self.extractions.push(Extraction {
            kind: kind.into(),
            start: span.start,
            end: span.end,
            value,
        });
        self.extractions.last()
    }

    /// Attach a value that is not a literal slice of the data (e.g. a normalized form).
    ///
    /// The span records where the value was derived from and is not checked.
    pub fn add_extraction(&mut self, kind: impl Into<String>, span: Range<usize>, value: impl Into<String>) {
        self.extractions.push(Extraction {
            kind: kind.into(),
            start: span.start,
            end: span.end,
            value: value.into(),
        });
    }

    pub fn clear_extractions(&mut self) {
        self.extractions.clear();
    }
}

/// Working container for one pipeline run.
///
/// Units are kept in creation order; unit names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    units: Vec<TextUnit>,
}

impl Item {
    /// Create an empty item.
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Create a text unit named after its source field.
    ///
    /// If a unit with the same name already exists its data is replaced and its
    /// extractions are cleared.
    pub fn create_text(&mut self, name: impl Into<String>, data: impl Into<String>) -> &mut TextUnit {
        let name = name.into();
        let data = data.into();

        match self.units.iter().position(|u| u.name == name) {
            Some(index) => {
                let unit = &mut self.units[index];
                unit.data = data;
                unit.extractions.clear();
                unit
            }
            None => {
                self.units.push(TextUnit::new(name, data));
                let last = self.units.len() - 1;
                &mut self.units[last]
            }
        }
    }

    pub fn unit(&self, name: &str) -> Option<&TextUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn unit_mut(&mut self, name: &str) -> Option<&mut TextUnit> {
        self.units.iter_mut().find(|u| u.name == name)
    }

    pub fn has_unit(&self, name: &str) -> bool {
        self.unit(name).is_some()
    }

    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut TextUnit> {
        self.units.iter_mut()
    }

    /// Names of all units, in creation order.
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.name.as_str())
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Total number of extractions across all units.
    pub fn extraction_count(&self) -> usize {
        self.units.iter().map(|u| u.extractions.len()).sum()
    }

    /// All extractions paired with the unit they were attached to.
    pub fn extractions(&self) -> impl Iterator<Item = (&TextUnit, &Extraction)> {
        self.units
            .iter()
            .flat_map(|unit| unit.extractions.iter().map(move |e| (unit, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_empty_item() {
        let item = Item::new();
        assert_eq!(item.unit_count(), 0);
        assert_eq!(item.extraction_count(), 0);
    }

    #[test]
    fn test_create_and_lookup_units() {
        let mut item = Item::new();
        item.create_text("body", "hello");
        item.create_text("title", "greeting");

        assert!(item.has_unit("body"));
        assert!(!item.has_unit("footer"));
        assert_eq!(item.unit("title").map(TextUnit::data), Some("greeting"));
        assert_eq!(item.unit_names().collect::<Vec<_>>(), vec!["body", "title"]);
    }

    #[test]
    fn test_recreating_unit_replaces_data() {
        let mut item = Item::new();
        item.create_text("body", "a@b.io").annotate("email", 0..6);
        item.create_text("body", "replaced");

        assert_eq!(item.unit_count(), 1);
        assert_eq!(item.unit("body").map(TextUnit::data), Some("replaced"));
        assert_eq!(item.extraction_count(), 0);
    }

    #[test]
    fn test_annotate_slices_data() {
        let mut unit = TextUnit::new("body", "contact jane@example.com now");
        let extraction = unit.annotate("email", 8..24).cloned().unwrap();

        assert_eq!(extraction.value, "jane@example.com");
        assert_eq!(extraction.kind, "email");
    }

    #[test]
    fn test_annotate_rejects_bad_spans() {
        let mut unit = TextUnit::new("body", "héllo");

        assert!(unit.annotate("x", 3..3).is_none());
        assert!(unit.annotate("x", 0..50).is_none());
        // byte 2 falls inside the two-byte 'é'
        assert!(unit.annotate("x", 0..2).is_none());
        assert!(unit.extractions().is_empty());
    }

    #[test]
    fn test_extractions_iterates_all_units() {
        let mut item = Item::new();
        item.create_text("a", "one two").annotate("word", 0..3);
        {
            let unit = item.create_text("b", "three");
            unit.annotate("word", 0..5);
            unit.add_extraction("number", 0..5, "3");
        }

        let values: Vec<_> = item.extractions().map(|(_, e)| e.value.as_str()).collect();
        assert_eq!(values, vec!["one", "three", "3"]);
        assert_eq!(item.extraction_count(), 3);
    }
}
