//! Textual encodings of a (provider, model) pair.
//!
//! A model is addressed as `provider:model` (colon form) or `model@provider`
//! (at form). Once the provider is known separately, the pair form skips
//! string parsing altogether.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;
use crate::model::Model;
use crate::normalize::{normalize_provider_id, Mode, ProviderInput};
use crate::provider_id::{KnownProviders, ProviderId};
use crate::snapshot::Snapshot;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpecFormat {
    /// `provider:model`
    #[default]
    Colon,
    /// `model@provider`
    At,
}

impl SpecFormat {
    fn separator(self) -> char {
        match self {
            SpecFormat::Colon => ':',
            SpecFormat::At => '@',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ProviderId,
    pub model: String,
}

/// Anything that can be turned into a [`ModelSpec`].
#[derive(Debug, Clone, Copy)]
pub enum SpecInput<'a> {
    Literal(&'a str),
    Pair(ProviderInput<'a>, &'a str),
}

impl<'a> From<&'a str> for SpecInput<'a> {
    fn from(literal: &'a str) -> Self {
        SpecInput::Literal(literal)
    }
}

impl<'a> From<(&'a ProviderId, &'a str)> for SpecInput<'a> {
    fn from((provider, model): (&'a ProviderId, &'a str)) -> Self {
        SpecInput::Pair(provider.into(), model)
    }
}

impl<'a> From<(&'a str, &'a str)> for SpecInput<'a> {
    fn from((provider, model): (&'a str, &'a str)) -> Self {
        SpecInput::Pair(provider.into(), model)
    }
}

fn invalid(literal: &str, detail: &str) -> Error {
    Error::InvalidFormat(format!("\"{literal}\": {detail}"))
}

fn infer_format(literal: &str) -> Result<SpecFormat, Error> {
    match (literal.contains(':'), literal.contains('@')) {
        (true, true) => Err(Error::AmbiguousFormat(literal.to_string())),
        (true, false) => Ok(SpecFormat::Colon),
        (false, true) => Ok(SpecFormat::At),
        (false, false) => Err(invalid(literal, "expected provider:model or model@provider")),
    }
}

/// Parses a spec literal. Without an explicit `format`, a literal holding both
/// separators is rejected as ambiguous; with one, the other separator is just
/// part of the model id.
pub fn parse(
    literal: &str,
    format: Option<SpecFormat>,
    known: &KnownProviders,
) -> Result<ModelSpec, Error> {
    let literal = literal.trim();

    // An inferred format never sees both separators, so only an explicit
    // format lets the other separator through into the model id.
    let format = match format {
        Some(format) => format,
        None => infer_format(literal)?,
    };

    let (provider, model) = match format {
        SpecFormat::Colon => literal.split_once(':'),
        SpecFormat::At => literal.rsplit_once('@').map(|(model, provider)| (provider, model)),
    }
    .ok_or_else(|| invalid(literal, &format!("missing '{}'", format.separator())))?;

    if provider.is_empty() {
        return Err(invalid(literal, "provider is empty"));
    }

    if provider.contains([':', '@']) {
        return Err(invalid(literal, "provider contains a separator"));
    }

    if model.is_empty() {
        return Err(invalid(literal, "model is empty"));
    }

    let provider = normalize_provider_id(provider, Mode::Strict(known))?;

    Ok(ModelSpec {
        provider,
        model: model.to_string(),
    })
}

impl ModelSpec {
    pub fn new(provider: ProviderId, model: impl Into<String>) -> ModelSpec {
        ModelSpec {
            provider,
            model: model.into(),
        }
    }

    /// Builds a spec from any of its encodings.
    pub fn from_input<'a>(
        input: impl Into<SpecInput<'a>>,
        format: Option<SpecFormat>,
        known: &KnownProviders,
    ) -> Result<ModelSpec, Error> {
        match input.into() {
            SpecInput::Literal(literal) => parse(literal, format, known),
            SpecInput::Pair(provider, model) => {
                if model.is_empty() {
                    return Err(Error::InvalidFormat("model is empty".to_string()));
                }

                Ok(ModelSpec {
                    provider: normalize_provider_id(provider, Mode::Strict(known))?,
                    model: model.to_string(),
                })
            }
        }
    }

    pub fn format(&self, format: SpecFormat) -> String {
        match format {
            SpecFormat::Colon => format!("{}:{}", self.provider, self.model),
            SpecFormat::At => format!("{}@{}", self.model, self.provider),
        }
    }

    /// The canonical model this spec names, following aliases.
    pub fn resolve<'s>(&self, snapshot: &'s Snapshot) -> Result<&'s Model, Error> {
        snapshot
            .model(self.provider.as_str(), &self.model)
            .ok_or_else(|| Error::NotFound(self.to_string()))
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(SpecFormat::Colon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> KnownProviders {
        ["openai", "provider", "test", "amazon_bedrock"]
            .into_iter()
            .map(|p| ProviderId::parse(p).unwrap())
            .collect()
    }

    fn pair(spec: &ModelSpec) -> (&str, &str) {
        (spec.provider.as_str(), spec.model.as_str())
    }

    #[test]
    fn both_forms_parse_to_the_same_pair() {
        let known = known();

        let colon = parse("openai:gpt-4o", None, &known).unwrap();
        let at = parse("gpt-4o@openai", None, &known).unwrap();

        assert_eq!(colon, at);
        assert_eq!(colon.format(SpecFormat::Colon), "openai:gpt-4o");
        assert_eq!(at.format(SpecFormat::At), "gpt-4o@openai");
    }

    #[test]
    fn trims_and_normalizes() {
        let spec = parse("  Amazon-Bedrock:anthropic.claude-v2:1 \n", None, &known()).unwrap();

        assert_eq!(pair(&spec), ("amazon_bedrock", "anthropic.claude-v2:1"));
    }

    #[test]
    fn ambiguous_literals() {
        let known = known();

        assert_eq!(
            parse("provider:model@test", None, &known).unwrap_err().reason(),
            "ambiguous_format"
        );

        let colon = parse("provider:model@test", Some(SpecFormat::Colon), &known).unwrap();
        assert_eq!(pair(&colon), ("provider", "model@test"));

        let at = parse("provider:model@test", Some(SpecFormat::At), &known).unwrap();
        assert_eq!(pair(&at), ("test", "provider:model"));
    }

    #[test]
    fn at_form_splits_on_the_last_at() {
        let spec = parse("me@host@openai", Some(SpecFormat::At), &known()).unwrap();

        assert_eq!(pair(&spec), ("openai", "me@host"));
    }

    #[test]
    fn malformed_literals() {
        let known = known();

        for (literal, reason) in [
            ("gpt-4o", "invalid_format"),
            (":gpt-4o", "invalid_format"),
            ("openai:", "invalid_format"),
            ("gpt-4o@", "invalid_format"),
            ("@openai", "invalid_format"),
            ("bad id:gpt-4o", "bad_provider"),
            ("nobody:gpt-4o", "unknown_provider"),
        ] {
            let err = parse(literal, None, &known).unwrap_err();
            assert_eq!(err.reason(), reason, "{literal}");
        }

        assert_eq!(
            parse("openai", Some(SpecFormat::Colon), &known).unwrap_err().reason(),
            "invalid_format"
        );
    }

    #[test]
    fn pair_input() {
        let known = known();
        let openai = ProviderId::parse("openai").unwrap();

        let spec = ModelSpec::from_input((&openai, "gpt-4o"), None, &known).unwrap();
        assert_eq!(spec.to_string(), "openai:gpt-4o");

        let spec = ModelSpec::from_input(("OpenAI", "gpt-4o"), None, &known).unwrap();
        assert_eq!(pair(&spec), ("openai", "gpt-4o"));

        let spec = ModelSpec::from_input("gpt-4o@openai", None, &known).unwrap();
        assert_eq!(pair(&spec), ("openai", "gpt-4o"));
    }

    #[test]
    fn format_names() {
        assert_eq!("at".parse::<SpecFormat>().unwrap(), SpecFormat::At);
        assert_eq!(SpecFormat::Colon.to_string(), "colon");
    }
}
