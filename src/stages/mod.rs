//! Built-in extraction stages.
//!
//! These are small pattern-based extractors; richer extractors are expected to be
//! registered by the embedding application through [`StageRegistry::register`].

use regex::Regex;

use crate::item::Item;
use crate::registry::StageRegistry;

pub mod email;
pub mod ipv4;
pub mod regex_stage;
pub mod url;

pub use email::EmailExtractor;
pub use ipv4::Ipv4Extractor;
pub use regex_stage::{RegexExtractor, RegexSettings};
pub use url::UrlExtractor;

/// Register every built-in stage.
pub fn register_builtins(registry: &mut StageRegistry) {
    registry.register::<EmailExtractor>();
    registry.register::<UrlExtractor>();
    registry.register::<Ipv4Extractor>();
    registry.register::<RegexExtractor>();
}

/// Annotate every match of `pattern` (capture `group`) in every unit of the item.
pub(crate) fn annotate_matches(item: &mut Item, pattern: &Regex, group: usize, kind: &str) {
    for unit in item.units_mut() {
        let spans: Vec<_> = pattern
            .captures_iter(unit.data())
            .filter_map(|caps| caps.get(group))
            .map(|m| m.range())
            .collect();

        for span in spans {
            unit.annotate(kind, span);
        }
    }
}
