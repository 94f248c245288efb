use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GenerationError;

/// Identifies one section to generate and the rules its content must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Unique key, also the key in the aggregated document.
    pub name: String,
    pub constraints: SectionConstraints,
    /// false ⇒ the section is a deterministic copy of source data, no LLM call.
    pub uses_generation: bool,
}

impl SectionSpec {
    pub fn generated(name: &str, constraints: SectionConstraints) -> Self {
        Self {
            name: name.to_string(),
            constraints,
            uses_generation: true,
        }
    }

    pub fn copied(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraints: SectionConstraints::default(),
            uses_generation: false,
        }
    }
}

/// Length and count bounds. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionConstraints {
    pub min_chars: Option<usize>,
    pub max_chars: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub max_item_chars: Option<usize>,
}

impl SectionConstraints {
    pub fn char_band(min: usize, max: usize) -> Self {
        Self {
            min_chars: Some(min),
            max_chars: Some(max),
            ..Default::default()
        }
    }

    pub fn exact_items(count: usize, max_item_chars: usize) -> Self {
        Self {
            min_items: Some(count),
            max_items: Some(count),
            max_item_chars: Some(max_item_chars),
            ..Default::default()
        }
    }

    /// Checks a text block against the character band.
    pub fn check_text(&self, label: &str, text: &str) -> Result<(), GenerationError> {
        let len = text.trim().chars().count();
        if let Some(min) = self.min_chars {
            if len < min {
                return Err(GenerationError::Validation(format!(
                    "{label} has {len} characters, minimum is {min}"
                )));
            }
        }
        if let Some(max) = self.max_chars {
            if len > max {
                return Err(GenerationError::Validation(format!(
                    "{label} has {len} characters, maximum is {max}"
                )));
            }
        }
        Ok(())
    }

    /// Checks an ordered list against the item-count bounds and the per-item length cap.
    pub fn check_items(&self, label: &str, items: &[String]) -> Result<(), GenerationError> {
        let count = items.len();
        match (self.min_items, self.max_items) {
            (Some(min), Some(max)) if min == max && count != min => {
                return Err(GenerationError::Validation(format!(
                    "{label} has {count} items, expected exactly {min}"
                )));
            }
            (Some(min), _) if count < min => {
                return Err(GenerationError::Validation(format!(
                    "{label} has {count} items, minimum is {min}"
                )));
            }
            (_, Some(max)) if count > max => {
                return Err(GenerationError::Validation(format!(
                    "{label} has {count} items, maximum is {max}"
                )));
            }
            _ => {}
        }

        if items.iter().any(|i| i.trim().is_empty()) {
            return Err(GenerationError::Validation(format!(
                "{label} contains an empty item"
            )));
        }

        if let Some(cap) = self.max_item_chars {
            if let Some(long) = items.iter().find(|i| i.chars().count() > cap) {
                return Err(GenerationError::Validation(format!(
                    "{label} item exceeds {cap} characters: {:?}",
                    long.chars().take(40).collect::<String>()
                )));
            }
        }
        Ok(())
    }
}

/// Structured payload of one section: field → value (text blocks, ordered
/// lists, or lists of records). Field order is preserved for templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionContent(IndexMap<String, Value>);

impl SectionContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
