//! Canonicalization of raw layer data.
//!
//! The normalizer runs before any merging, so two sources that spell the same
//! provider or date differently still collide on the same identity.

use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::Error;
use crate::provider_id::{KnownProviders, ProviderId};
use crate::source::Layer;

/// How provider identifiers not seen before are treated.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'k> {
    /// Only identifiers already in the set are accepted. Used for anything
    /// supplied at query time.
    Strict(&'k KnownProviders),
    /// Any well-formed identifier is accepted. Used while building a catalog.
    Build,
}

/// Input to [`normalize_provider_id`]: either an identifier that has already
/// been validated, or raw text.
#[derive(Debug, Clone, Copy)]
pub enum ProviderInput<'a> {
    Id(&'a ProviderId),
    Text(&'a str),
}

impl<'a> From<&'a ProviderId> for ProviderInput<'a> {
    fn from(value: &'a ProviderId) -> Self {
        ProviderInput::Id(value)
    }
}

impl<'a> From<&'a str> for ProviderInput<'a> {
    fn from(value: &'a str) -> Self {
        ProviderInput::Text(value)
    }
}

pub fn normalize_provider_id<'a>(
    input: impl Into<ProviderInput<'a>>,
    mode: Mode<'_>,
) -> Result<ProviderId, Error> {
    let text = match input.into() {
        ProviderInput::Id(id) => return Ok(id.clone()),
        ProviderInput::Text(text) => text,
    };

    let id = ProviderId::parse(text)?;

    match mode {
        Mode::Build => Ok(id),
        Mode::Strict(known) => match known.get(id.as_str()) {
            Some(known) => Ok(known.clone()),
            None => Err(Error::UnknownProvider(id.to_string())),
        },
    }
}

/// Rewrites `YYYY/M/D` or `YYYY-M-D` into zero-padded ISO-8601. Anything that
/// does not parse as a plausible date is returned unchanged.
pub fn normalize_date(input: &str) -> String {
    let dashed = input.replace('/', "-");

    let parts: Vec<&str> = dashed.split('-').collect();

    let [year, month, day] = parts.as_slice() else {
        return input.to_string();
    };

    let parsed = (year.parse::<u32>(), month.parse::<u32>(), day.parse::<u32>());

    match parsed {
        (Ok(year), Ok(month), Ok(day))
            if (1000..=9999).contains(&year)
                && (1..=12).contains(&month)
                && (1..=31).contains(&day) =>
        {
            format!("{year:04}-{month:02}-{day:02}")
        }
        _ => input.to_string(),
    }
}

lazy_static! {
    static ref MODALITIES: HashMap<&'static str, &'static str> = HashMap::from([
        ("text", "text"),
        ("image", "image"),
        ("audio", "audio"),
        ("video", "video"),
        ("code", "code"),
        ("document", "document"),
        ("embedding", "embedding"),
        ("pdf", "pdf"),
    ]);
}

/// Maps known modality strings to their canonical tag. Unknown strings pass
/// through verbatim and duplicates are dropped.
pub fn normalize_modalities<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());

    for value in values {
        let raw = value.as_ref();
        let lowered = raw.trim().to_ascii_lowercase();

        let tag = match MODALITIES.get(lowered.as_str()) {
            Some(tag) => tag.to_string(),
            None => raw.to_string(),
        };

        if !out.contains(&tag) {
            out.push(tag);
        }
    }

    out
}

/// A layer flattened into provider records and model records. Each model
/// record carries its `provider` field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedLayer {
    pub providers: Vec<Map<String, Value>>,
    pub models: Vec<Map<String, Value>>,
}

const DATE_FIELDS: [&str; 2] = ["release_date", "last_updated"];

/// Splits a raw layer into normalized provider and model records.
///
/// Providers whose key is not a well-formed identifier are skipped with a
/// warning, as are model entries that are not objects.
pub fn normalize_layer(layer: &Layer) -> NormalizedLayer {
    let mut out = NormalizedLayer::default();

    for (key, record) in layer {
        let provider = match normalize_provider_id(key.as_str(), Mode::Build) {
            Ok(provider) => provider,
            Err(err) => {
                tracing::warn!(provider = %key, "skipping provider: {}", err);
                continue;
            }
        };

        let mut record = match record {
            Value::Object(record) => record.clone(),
            _ => {
                tracing::warn!(provider = %provider, "skipping provider: record is not an object");
                continue;
            }
        };

        let models = record.remove("models");
        record.insert("id".to_string(), Value::String(provider.to_string()));
        out.providers.push(record);

        let Some(Value::Array(models)) = models else {
            continue;
        };

        for model in models {
            let Value::Object(mut model) = model else {
                tracing::warn!(provider = %provider, "skipping model: entry is not an object");
                continue;
            };

            model.insert("provider".to_string(), Value::String(provider.to_string()));
            normalize_model_fields(&mut model);
            out.models.push(model);
        }
    }

    out
}

fn normalize_model_fields(model: &mut Map<String, Value>) {
    for field in DATE_FIELDS {
        if let Some(Value::String(date)) = model.get_mut(field) {
            *date = normalize_date(date);
        }
    }

    if let Some(Value::Object(modalities)) = model.get_mut("modalities") {
        for direction in ["input", "output"] {
            let Some(Value::Array(values)) = modalities.get_mut(direction) else {
                continue;
            };

            let strings: Vec<&str> = values.iter().filter_map(Value::as_str).collect();

            // Leave lists with non-string entries for the validator to reject.
            if strings.len() != values.len() {
                continue;
            }

            let normalized = normalize_modalities(&strings);
            *values = normalized.into_iter().map(Value::String).collect();
        }
    }
}
