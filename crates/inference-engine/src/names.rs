//! Class id to label mapping

use std::collections::BTreeMap;

use crate::InferenceError;

/// Class names indexed by model class id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassNames(BTreeMap<usize, String>);

impl ClassNames {
    /// Names listed in class-id order
    pub fn from_list(names: &[String]) -> Self {
        Self(names.iter().cloned().enumerate().collect())
    }

    /// Parse the `names` metadata written by Ultralytics exports,
    /// e.g. `{0: 'mata_buka', 1: 'mata_tutup'}`.
    pub fn parse_metadata(raw: &str) -> Result<Self, InferenceError> {
        let body = raw
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| InferenceError::InvalidClassNames(format!("not a dict: {}", raw)))?;

        let mut names = BTreeMap::new();
        let mut rest = body.trim();

        while !rest.is_empty() {
            let (key, after_key) = rest.split_once(':').ok_or_else(|| {
                InferenceError::InvalidClassNames(format!("missing ':' in {}", rest))
            })?;
            let id: usize = key.trim().parse().map_err(|_| {
                InferenceError::InvalidClassNames(format!("bad class id '{}'", key.trim()))
            })?;

            let after_key = after_key.trim_start();
            let quote = after_key
                .chars()
                .next()
                .filter(|c| *c == '\'' || *c == '"')
                .ok_or_else(|| {
                    InferenceError::InvalidClassNames(format!("unquoted name for class {}", id))
                })?;
            let value = &after_key[1..];
            let end = value.find(quote).ok_or_else(|| {
                InferenceError::InvalidClassNames(format!("unterminated name for class {}", id))
            })?;

            names.insert(id, value[..end].to_string());

            rest = value[end + 1..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        Ok(Self(names))
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.0.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
