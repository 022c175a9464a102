//! Provider identifiers and the registry of known providers.
//!
//! A [`ProviderId`] is a unique per-provider identifier: lowercase ASCII
//! letters, digits and underscores, at most 255 bytes. Identifiers enter the
//! system in two ways. While a catalog is being built, any well-formed
//! identifier found in the source data is accepted. On the query path (model
//! specs supplied by users), an identifier is only accepted if it is already in
//! a [`KnownProviders`] set, so runtime input can never grow the namespace.
//!
//! The `Display` and `FromStr` forms are part of the CLI and should remain stable.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The longest accepted provider identifier, in bytes.
pub const MAX_PROVIDER_ID_LEN: usize = 255;

lazy_static! {
    static ref PROVIDER_ID_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_-]{1,255}$").expect("provider id pattern is valid");

    /// Providers the packaged catalog ships with. Strict lookups accept these
    /// even before a catalog has been published.
    static ref BUILTIN_PROVIDERS: BTreeSet<ProviderId> = [
        "alibaba",
        "amazon_bedrock",
        "anthropic",
        "azure",
        "cerebras",
        "cohere",
        "deepseek",
        "fireworks_ai",
        "google",
        "google_vertex",
        "groq",
        "huggingface",
        "mistral",
        "ollama",
        "openai",
        "openrouter",
        "perplexity",
        "togetherai",
        "xai",
    ]
    .into_iter()
    .map(|id| ProviderId(id.to_string()))
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    /// Validates and canonicalizes textual input: case is folded and hyphens
    /// become underscores.
    pub fn parse(input: &str) -> Result<ProviderId, Error> {
        if input.len() > MAX_PROVIDER_ID_LEN || !PROVIDER_ID_PATTERN.is_match(input) {
            return Err(Error::BadProvider(input.to_string()));
        }

        Ok(ProviderId(input.to_ascii_lowercase().replace('-', "_")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::parse(s)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProviderId::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A closed set of provider identifiers accepted by strict normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownProviders {
    ids: BTreeSet<ProviderId>,
}

impl KnownProviders {
    pub fn empty() -> KnownProviders {
        KnownProviders::default()
    }

    /// The providers the packaged catalog ships with.
    pub fn builtin() -> KnownProviders {
        KnownProviders {
            ids: BUILTIN_PROVIDERS.clone(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&ProviderId> {
        self.ids.get(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderId> {
        self.ids.iter()
    }
}

impl Extend<ProviderId> for KnownProviders {
    fn extend<T: IntoIterator<Item = ProviderId>>(&mut self, iter: T) {
        self.ids.extend(iter)
    }
}

impl FromIterator<ProviderId> for KnownProviders {
    fn from_iter<T: IntoIterator<Item = ProviderId>>(iter: T) -> Self {
        KnownProviders {
            ids: iter.into_iter().collect(),
        }
    }
}
