use serde_yaml::{Mapping, Sequence, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Preferred output order for root keys of Kubernetes manifests.
pub const MANIFEST_KEY_ORDER: &[&str] = &[
    "apiVersion",
    "kind",
    "metadata",
    "namespace",
    "spec",
    "resources",
    "images",
    "patches",
];

/// Errors produced while parsing, merging or re-encoding documents.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The input text is not a well-formed YAML document.
    #[error("failed to parse YAML from {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A document root is not a mapping.
    #[error("expected mapping at document root ({0})")]
    Structure(&'static str),

    /// A node could not be serialized to its canonical text form.
    #[error("failed to encode YAML node: {0}")]
    Encode(#[from] serde_yaml::Error),
}

/// Parse `text` into a document, naming `name` in any error.
pub fn parse_document(name: &str, text: &str) -> Result<Value, MergeError> {
    serde_yaml::from_str(text).map_err(|source| MergeError::Parse {
        name: name.to_string(),
        source,
    })
}

/// Merge two parsed documents into a new one.
///
/// Root keys listed in `key_order` come first, in that order. A key present
/// in both documents is combined with [`merge_values`]; leftover keys follow
/// in document order, `base`'s before `overlay`'s, each key emitted exactly
/// once. Both roots must be mappings.
pub fn merge_documents(
    base: &Value,
    overlay: &Value,
    key_order: &[&str],
) -> Result<Value, MergeError> {
    let base_map = root_mapping(base, "base")?;
    let overlay_map = root_mapping(overlay, "overlay")?;

    let mut merged = Mapping::new();
    let mut seen: HashSet<Value> = HashSet::new();

    for &key in key_order {
        let merged_value = match (base_map.get(key), overlay_map.get(key)) {
            (Some(a), Some(b)) => merge_values(a, b)?,
            (Some(a), None) => a.clone(),
            (None, Some(b)) => b.clone(),
            (None, None) => continue,
        };
        merged.insert(Value::from(key), merged_value);
        seen.insert(Value::from(key));
    }

    // Keys not covered by key_order keep their document order, base first
    for (key, value) in base_map.iter().chain(overlay_map.iter()) {
        if !seen.contains(key) {
            merged.insert(key.clone(), value.clone());
            seen.insert(key.clone());
        }
    }

    Ok(Value::Mapping(merged))
}

/// Per-key merge rule: two sequences merge uniquely, any other combination
/// takes the overlay value. Nested mappings are not merged recursively.
pub fn merge_values(base: &Value, overlay: &Value) -> Result<Value, MergeError> {
    match (base, overlay) {
        (Value::Sequence(a), Value::Sequence(b)) => {
            Ok(Value::Sequence(merge_sequences_unique(a, b)?))
        }
        _ => Ok(overlay.clone()),
    }
}

/// Append the items of both sequences, skipping every item whose canonical
/// serialized text was already emitted.
pub fn merge_sequences_unique(base: &Sequence, overlay: &Sequence) -> Result<Sequence, MergeError> {
    let mut merged = Sequence::new();
    let mut seen: HashSet<String> = HashSet::new();

    for item in base.iter().chain(overlay.iter()) {
        let canonical = serde_yaml::to_string(item)?;
        if seen.insert(canonical) {
            merged.push(item.clone());
        }
    }

    Ok(merged)
}

fn root_mapping<'a>(doc: &'a Value, name: &'static str) -> Result<&'a Mapping, MergeError> {
    match doc {
        Value::Mapping(map) => Ok(map),
        _ => Err(MergeError::Structure(name)),
    }
}
