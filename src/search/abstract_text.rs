//! Rebuilds plain-text abstracts from the API's word -> positions index.

use std::collections::BTreeMap;

use serde_json::Value;

/// Reconstructs an abstract from an inverted index.
///
/// Each word is placed at every listed position; occupied positions are
/// joined with single spaces in ascending order, so gaps are skipped. When
/// two words claim the same position the one visited last wins. Anything
/// malformed (not an object, an empty object, a non-array entry, or a
/// position that is not a non-negative integer) yields an empty string.
#[must_use]
pub fn reconstruct_abstract(inverted: &Value) -> String {
    let Some(map) = inverted.as_object() else {
        return String::new();
    };
    if map.is_empty() {
        return String::new();
    }

    let mut slots: BTreeMap<u64, &str> = BTreeMap::new();
    for (word, positions) in map {
        let Some(positions) = positions.as_array() else {
            return String::new();
        };
        for position in positions {
            let Some(position) = position.as_u64() else {
                return String::new();
            };
            slots.insert(position, word.as_str());
        }
    }

    slots
        .into_values()
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
