//! Backend response normalization
//!
//! Turns free text from any vision backend into a validated
//! [`Classification`] or a [`NormalizeError`]. All text heuristics live
//! here: fence stripping, brace extraction, vocabulary matching, score
//! coercion and the critique retention rule.

use aiia_common::models::{Category, Classification, ScoreScale};
use aiia_common::taxonomy::Taxonomy;
use serde_json::{Map, Value};
use thiserror::Error;

pub const MIN_TAGS: usize = 2;
pub const MAX_TAGS: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("No JSON object in response")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown category: {0}")]
    InvalidCategory(String),

    #[error("Subcategory not in vocabulary: {0}")]
    InvalidSubcategory(String),

    #[error("Need 2-5 vocabulary tags, got {0} usable")]
    InvalidTags(usize),

    #[error("Score is not numeric: {0}")]
    InvalidScore(String),
}

/// Backend-independent normalizer, configured once per run
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    taxonomy: Taxonomy,
    scale: ScoreScale,
    gallery_critique: bool,
    critique_threshold: u8,
}

impl ResponseNormalizer {
    pub fn new(
        taxonomy: Taxonomy,
        scale: ScoreScale,
        gallery_critique: bool,
        critique_threshold: u8,
    ) -> Self {
        Self {
            taxonomy,
            scale,
            gallery_critique,
            critique_threshold,
        }
    }

    pub fn scale(&self) -> ScoreScale {
        self.scale
    }

    /// Parse and validate one backend response
    pub fn normalize(&self, raw: &str) -> Result<Classification, NormalizeError> {
        let object = parse_object(raw)?;

        let category_label = required_str(&object, "category")?;
        let category = Category::from_label(category_label)
            .ok_or_else(|| NormalizeError::InvalidCategory(category_label.to_string()))?;

        let subcategory_label = required_str(&object, "subcategory")?;
        let subcategory = self
            .taxonomy
            .match_subcategory(subcategory_label)
            .ok_or_else(|| NormalizeError::InvalidSubcategory(subcategory_label.to_string()))?
            .to_string();

        let tags = self.normalize_tags(object.get("tags").ok_or(NormalizeError::MissingField("tags"))?)?;

        let score = self
            .scale
            .clamp(parse_score(object.get("score").ok_or(NormalizeError::MissingField("score"))?)?);

        let critique = object
            .get("critique")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("n/a"))
            .map(str::to_string);

        let critique = if self.gallery_critique {
            Some(critique.ok_or(NormalizeError::MissingField("critique"))?)
        } else {
            // Critique explains low scores; praise for high ones is dropped
            critique.filter(|_| score <= self.critique_threshold)
        };

        Ok(Classification {
            category,
            subcategory,
            tags,
            score,
            scale: self.scale,
            critique,
        })
    }

    /// Map tags onto the vocabulary, dedupe, keep at most five
    fn normalize_tags(&self, value: &Value) -> Result<Vec<String>, NormalizeError> {
        let labels: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::String(s) => s.split(',').map(str::to_string).collect(),
            _ => return Err(NormalizeError::InvalidTags(0)),
        };

        let mut tags: Vec<String> = Vec::new();
        for label in &labels {
            match self.taxonomy.match_tag(label) {
                Some(canonical) if !tags.iter().any(|t| t == canonical) => {
                    tags.push(canonical.to_string())
                }
                Some(_) => {}
                None => tracing::trace!(tag = %label.trim(), "Dropping tag outside vocabulary"),
            }
        }

        tags.truncate(MAX_TAGS);
        if tags.len() < MIN_TAGS {
            return Err(NormalizeError::InvalidTags(tags.len()));
        }
        Ok(tags)
    }
}

/// Extract the JSON object from backend text
fn parse_object(raw: &str) -> Result<Map<String, Value>, NormalizeError> {
    let candidate = extract_json(raw).ok_or(NormalizeError::NoJson)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(NormalizeError::NoJson),
        Err(e) => Err(NormalizeError::InvalidJson(e.to_string())),
    }
}

/// Strip markdown fences and surrounding prose, returning the `{...}` span
pub fn extract_json(raw: &str) -> Option<&str> {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        // Skip an info string such as `json`
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, NormalizeError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField(field))
}

/// Accept integers, floats (rounded) and numeric strings like `"8"` or `"8/10"`
fn parse_score(value: &Value) -> Result<i64, NormalizeError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .ok_or_else(|| NormalizeError::InvalidScore(n.to_string())),
        Value::String(s) => {
            let head = s.split('/').next().unwrap_or("").trim();
            head.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
                .ok_or_else(|| NormalizeError::InvalidScore(s.clone()))
        }
        other => Err(NormalizeError::InvalidScore(other.to_string())),
    }
}
