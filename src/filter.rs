//! Allow/deny filtering of models.
//!
//! Patterns are either exact model ids or globs where `*` matches any run of
//! characters. Globs are compiled once, to anchored regular expressions, when
//! the filter is built; deciding visibility never compiles anything.
//!
//! For a given provider and model id:
//!
//! 1. a matching deny pattern always hides the model;
//! 2. an `"all"` allow list shows everything else;
//! 3. once any provider has allow patterns configured, a provider with no
//!    patterns of its own is hidden entirely;
//! 4. otherwise the model is shown if its provider has no allow patterns or
//!    one of them matches.
//!
//! Matching is case-sensitive and against the raw model id, never an alias.

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;
use crate::normalize::{normalize_provider_id, Mode};
use crate::provider_id::ProviderId;

/// A single compiled model id pattern.
#[derive(Clone)]
pub enum Pattern {
    Exact(String),
    Glob { raw: String, regex: Regex },
}

impl Pattern {
    pub fn compile(raw: &str) -> Result<Pattern, Error> {
        if !raw.contains('*') {
            return Ok(Pattern::Exact(raw.to_string()));
        }

        let body = raw
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{body}$"))
            .map_err(|err| Error::InvalidPattern(format!("{raw}: {err}")))?;

        Ok(Pattern::Glob {
            raw: raw.to_string(),
            regex,
        })
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            Pattern::Exact(exact) => exact == id,
            Pattern::Glob { regex, .. } => regex.is_match(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Exact(raw) | Pattern::Glob { raw, .. } => raw,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Patterns keyed by provider.
pub type PatternMap = BTreeMap<ProviderId, Vec<Pattern>>;

/// Compiles a provider → pattern list mapping. Provider keys are normalized in
/// build mode; a malformed key is an error.
pub fn compile_patterns(raw: &BTreeMap<String, Vec<String>>) -> Result<PatternMap, Error> {
    let mut compiled = PatternMap::new();

    for (provider, patterns) in raw {
        let provider = normalize_provider_id(provider.as_str(), Mode::Build)?;

        let patterns = patterns
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        compiled.entry(provider).or_default().extend(patterns);
    }

    Ok(compiled)
}

/// Like [`compile_patterns`], but a malformed provider key only costs its own
/// entry. Used for user-facing filter config.
fn compile_patterns_lenient(
    raw: &BTreeMap<String, Vec<String>>,
    list: &str,
) -> Result<PatternMap, Error> {
    let mut compiled = PatternMap::new();

    for (provider, patterns) in raw {
        let provider = match normalize_provider_id(provider.as_str(), Mode::Build) {
            Ok(provider) => provider,
            Err(err) => {
                tracing::warn!(provider = %provider, list, "ignoring filter entry: {}", err);
                continue;
            }
        };

        let patterns = patterns
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        compiled.entry(provider).or_default().extend(patterns);
    }

    Ok(compiled)
}

fn any_match(patterns: &[Pattern], id: &str) -> bool {
    patterns.iter().any(|p| p.matches(id))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllMarker {
    #[default]
    All,
}

/// The configured form of the allow list: `"all"` or a table of patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowSpec {
    All(AllMarker),
    Providers(BTreeMap<String, Vec<String>>),
}

impl Default for AllowSpec {
    fn default() -> Self {
        AllowSpec::All(AllMarker::All)
    }
}

/// The compiled allow list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Allow {
    All,
    Providers(PatternMap),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    allow: Allow,
    deny: PatternMap,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            allow: Allow::All,
            deny: PatternMap::new(),
        }
    }
}

impl Filter {
    /// Compiles the configured allow and deny lists. Entries keyed by a
    /// malformed provider id are skipped with a warning.
    pub fn compile(
        allow: &AllowSpec,
        deny: &BTreeMap<String, Vec<String>>,
    ) -> Result<Filter, Error> {
        let allow = match allow {
            AllowSpec::All(_) => Allow::All,
            AllowSpec::Providers(map) => Allow::Providers(compile_patterns_lenient(map, "allow")?),
        };

        Ok(Filter {
            allow,
            deny: compile_patterns_lenient(deny, "deny")?,
        })
    }

    pub fn allows(&self, provider: &str, id: &str) -> bool {
        if let Some(deny) = self.deny.get(provider) {
            if any_match(deny, id) {
                return false;
            }
        }

        let map = match &self.allow {
            Allow::All => return true,
            Allow::Providers(map) => map,
        };

        let patterns: &[Pattern] = map.get(provider).map(Vec::as_slice).unwrap_or(&[]);

        if !map.is_empty() && patterns.is_empty() {
            return false;
        }

        patterns.is_empty() || any_match(patterns, id)
    }

    pub fn allow(&self) -> &Allow {
        &self.allow
    }

    pub fn deny(&self) -> &PatternMap {
        &self.deny
    }

    /// Every provider named anywhere in the filter.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderId> {
        let allowed = match &self.allow {
            Allow::All => None,
            Allow::Providers(map) => Some(map.keys()),
        };

        allowed.into_iter().flatten().chain(self.deny.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, Vec<&str>)]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn glob_is_anchored_and_escaped() {
        let pattern = Pattern::compile("gpt-5-*").unwrap();
        assert!(pattern.matches("gpt-5-pro"));
        assert!(!pattern.matches("xgpt-5-pro"));

        let pattern = Pattern::compile("a.b*").unwrap();
        assert!(pattern.matches("a.bc"));
        assert!(!pattern.matches("aXbc"));

        let pattern = Pattern::compile("*-legacy").unwrap();
        assert!(pattern.matches("claude-3-haiku-legacy"));
        assert!(!pattern.matches("claude-3-haiku-legacy-2"));
    }

    #[test]
    fn exact_is_case_sensitive() {
        let pattern = Pattern::compile("gpt-3").unwrap();
        assert!(pattern.matches("gpt-3"));
        assert!(!pattern.matches("GPT-3"));
        assert!(!pattern.matches("gpt-3.5"));
    }

    #[test]
    fn deny_beats_allow() {
        let filter = Filter::compile(
            &AllowSpec::Providers(table(&[("p", vec!["x*"])])),
            &table(&[("p", vec!["x1"])]),
        )
        .unwrap();

        assert!(!filter.allows("p", "x1"));
        assert!(filter.allows("p", "x2"));
        assert!(!filter.allows("p", "y1"));
    }

    #[test]
    fn allow_all_only_consults_deny() {
        let filter = Filter::compile(&AllowSpec::default(), &table(&[("p", vec!["*-legacy"])])).unwrap();

        assert!(filter.allows("p", "m"));
        assert!(!filter.allows("p", "m-legacy"));
        assert!(filter.allows("q", "m-legacy"));
    }

    #[test]
    fn explicit_allow_map_excludes_unlisted_providers() {
        let filter = Filter::compile(
            &AllowSpec::Providers(table(&[("p", vec!["m*"]), ("q", vec![])])),
            &BTreeMap::new(),
        )
        .unwrap();

        // Absent key.
        assert!(!filter.allows("r", "m1"));
        // Present key with no patterns.
        assert!(!filter.allows("q", "m1"));
        assert!(filter.allows("p", "m1"));
    }

    #[test]
    fn empty_allow_map_restricts_nothing() {
        let filter = Filter::compile(&AllowSpec::Providers(BTreeMap::new()), &BTreeMap::new()).unwrap();

        assert!(filter.allows("anyone", "anything"));
    }

    #[test]
    fn allow_spec_deserializes_both_shapes() {
        let all: AllowSpec = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, AllowSpec::default());

        let map: AllowSpec = serde_json::from_str(r#"{"openai": ["gpt-*"]}"#).unwrap();
        assert_eq!(map, AllowSpec::Providers(table(&[("openai", vec!["gpt-*"])])));
    }

    #[test]
    fn malformed_provider_keys_are_rejected() {
        let err = compile_patterns(&table(&[("bad key", vec!["x"])])).unwrap_err();

        assert_eq!(err.reason(), "bad_provider");
    }

    #[test]
    fn malformed_filter_keys_are_skipped() {
        let filter = Filter::compile(
            &AllowSpec::Providers(table(&[("p", vec!["m*"]), ("bad key", vec!["m1"])])),
            &table(&[("bad key", vec!["x"]), ("p", vec!["m2"])]),
        )
        .unwrap();

        assert_eq!(filter.providers().map(ProviderId::as_str).collect::<Vec<_>>(), vec!["p", "p"]);
        assert!(filter.allows("p", "m1"));
        assert!(!filter.allows("p", "m2"));
    }
}
