//! Pure normalization of provider reply payloads into a [`PromptList`].
//! Providers in this domain reply in a dozen structurally-different JSON
//! shapes; everything here is tolerant — unrecognized shapes yield an
//! empty list, never an error.

pub mod fence;

use serde_json::Value;

use crate::normalize::fence::strip_code_fence;

/// Direct string fields checked on a single-object payload, in order.
const OBJECT_TEXT_FIELDS: &[&str] = &["output", "text", "prompt", "result"];

/// Ordered sequence of trimmed, non-empty prompt strings. The first
/// element conventionally carries analysis text, subsequent elements the
/// generated variants. An empty list is a valid "no match" result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromptList(Vec<String>);

impl PromptList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for PromptList {
    fn from(prompts: Vec<String>) -> Self {
        Self(prompts)
    }
}

impl IntoIterator for PromptList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Per-feature extraction overrides. Features differ only in which field
/// carries analysis text and which direct fields count as prompt text, so
/// the variations are a value, not forked function bodies.
#[derive(Debug, Clone)]
pub struct ExtractStrategy {
    /// Field whose text is always placed first in the result.
    pub analysis_field: &'static str,
    /// Direct string fields checked on each list element, in order.
    pub text_fields: &'static [&'static str],
}

impl Default for ExtractStrategy {
    fn default() -> Self {
        Self {
            analysis_field: "analysis_text",
            text_fields: &["prompt", "text", "output"],
        }
    }
}

enum Extracted {
    Prompt(String),
    Analysis(String),
}

/// Normalize an arbitrary payload into a [`PromptList`].
///
/// Resolution order, first match wins per item:
/// 1. a bare string is one artifact;
/// 2. list elements are matched independently — model-turn content part,
///    nested `input.prompt`, direct text fields, then the analysis field
///    (analysis text is reordered to the front of the result: the
///    consuming UI renders it ahead of the generated variants);
/// 3. a single object is walked through its known nesting shapes;
/// 4. anything else yields an empty list.
pub fn normalize(payload: &Value, strategy: &ExtractStrategy) -> PromptList {
    let mut prompts: Vec<String> = Vec::new();

    match payload {
        Value::String(text) => push_clean(&mut prompts, text),
        Value::Array(items) => {
            let mut leading: Vec<String> = Vec::new();
            for item in items {
                match extract_list_item(item, strategy) {
                    Some(Extracted::Analysis(text)) => push_clean(&mut leading, &text),
                    Some(Extracted::Prompt(text)) => push_clean(&mut prompts, &text),
                    None => {}
                }
            }
            if !leading.is_empty() {
                leading.append(&mut prompts);
                prompts = leading;
            }
        }
        Value::Object(_) => extract_object(payload, strategy, &mut prompts),
        _ => {}
    }

    PromptList(prompts)
}

/// Normalize with the default extraction strategy.
pub fn normalize_default(payload: &Value) -> PromptList {
    normalize(payload, &ExtractStrategy::default())
}

fn extract_list_item(item: &Value, strategy: &ExtractStrategy) -> Option<Extracted> {
    if let Some(text) = item.as_str() {
        return Some(Extracted::Prompt(text.to_string()));
    }
    if let Some(text) = content_part_text(item) {
        return Some(Extracted::Prompt(text.to_string()));
    }
    if let Some(text) = item.pointer("/input/prompt").and_then(Value::as_str) {
        return Some(Extracted::Prompt(text.to_string()));
    }
    for field in strategy.text_fields {
        if let Some(text) = item.get(field).and_then(Value::as_str) {
            return Some(Extracted::Prompt(text.to_string()));
        }
    }
    if let Some(text) = item.get(strategy.analysis_field).and_then(Value::as_str) {
        return Some(Extracted::Analysis(text.to_string()));
    }
    None
}

fn extract_object(object: &Value, strategy: &ExtractStrategy, out: &mut Vec<String>) {
    if let Some(text) = content_part_text(object) {
        push_clean(out, text);
        return;
    }

    if let Some(items) = object.get("input").and_then(Value::as_array) {
        let mut found = false;
        for sub in items {
            if let Some(text) = sub.get("prompt").and_then(Value::as_str) {
                push_clean(out, text);
                found = true;
            }
        }
        if found {
            return;
        }
    }

    if let Some(items) = object.get("variants").and_then(Value::as_array) {
        let mut found = false;
        for variant in items {
            if let Some(text) = variant.as_str() {
                push_clean(out, text);
                found = true;
            }
        }
        if found {
            return;
        }
    }

    for field in OBJECT_TEXT_FIELDS {
        if let Some(text) = object.get(field).and_then(Value::as_str) {
            push_clean(out, text);
        }
    }
    if let Some(text) = object.get(strategy.analysis_field).and_then(Value::as_str) {
        push_clean(out, text);
    }
}

/// Model-turn shape: `{"content": {"parts": [{"text": ...}, ...]}}` —
/// only the first part's text is taken.
fn content_part_text(value: &Value) -> Option<&str> {
    value.pointer("/content/parts/0/text").and_then(Value::as_str)
}

fn push_clean(out: &mut Vec<String>, raw: &str) {
    let cleaned = strip_code_fence(raw);
    if !cleaned.is_empty() {
        out.push(cleaned);
    }
}
