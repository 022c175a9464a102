//! Capability-based model selection.

use std::str::FromStr;

use crate::error::Error;
use crate::model::{Capabilities, Model};
use crate::provider_id::ProviderId;
use crate::snapshot::Snapshot;

/// A capability flag that can be checked on a model.
///
/// `reasoning` and `tools` stand for `reasoning.enabled` and `tools.enabled`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
pub enum Capability {
    #[strum(to_string = "chat")]
    Chat,
    #[strum(to_string = "embeddings")]
    Embeddings,
    #[strum(to_string = "reasoning", serialize = "reasoning.enabled")]
    Reasoning,
    #[strum(to_string = "tools", serialize = "tools.enabled")]
    Tools,
    #[strum(to_string = "tools.streaming")]
    ToolsStreaming,
    #[strum(to_string = "tools.strict")]
    ToolsStrict,
    #[strum(to_string = "tools.parallel")]
    ToolsParallel,
    #[strum(to_string = "json.native")]
    JsonNative,
    #[strum(to_string = "json.schema")]
    JsonSchema,
    #[strum(to_string = "json.strict")]
    JsonStrict,
    #[strum(to_string = "streaming.text")]
    StreamingText,
    #[strum(to_string = "streaming.tool_calls")]
    StreamingToolCalls,
}

impl Capability {
    pub fn parse(name: &str) -> Result<Capability, Error> {
        Capability::from_str(name.trim()).map_err(|_| Error::UnknownCapability(name.to_string()))
    }

    /// The flag's value, or `None` when the model does not say.
    pub fn lookup(self, caps: &Capabilities) -> Option<bool> {
        match self {
            Capability::Chat => caps.chat,
            Capability::Embeddings => caps.embeddings,
            Capability::Reasoning => caps.reasoning?.enabled,
            Capability::Tools => caps.tools?.enabled,
            Capability::ToolsStreaming => caps.tools?.streaming,
            Capability::ToolsStrict => caps.tools?.strict,
            Capability::ToolsParallel => caps.tools?.parallel,
            Capability::JsonNative => caps.json?.native,
            Capability::JsonSchema => caps.json?.schema,
            Capability::JsonStrict => caps.json?.strict,
            Capability::StreamingText => caps.streaming?.text,
            Capability::StreamingToolCalls => caps.streaming?.tool_calls,
        }
    }

    pub fn of(self, model: &Model) -> Option<bool> {
        model.capabilities.as_ref().and_then(|caps| self.lookup(caps))
    }
}

/// A capability paired with the value it is checked against.
///
/// A predicate only holds when the model states the value explicitly: an
/// absent flag neither satisfies a requirement nor trips a prohibition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub capability: Capability,
    pub expected: bool,
}

impl Predicate {
    pub fn new(capability: Capability, expected: bool) -> Predicate {
        Predicate {
            capability,
            expected,
        }
    }

    pub fn holds(&self, model: &Model) -> bool {
        self.capability.of(model) == Some(self.expected)
    }
}

impl From<Capability> for Predicate {
    fn from(capability: Capability) -> Self {
        Predicate::new(capability, true)
    }
}

/// Parses `name` or `name=true|false`.
impl FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name, Some(value.trim())),
            None => (s, None),
        };

        let expected = match value {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(Error::InvalidFormat(format!(
                    "predicate value \"{other}\" is not true or false"
                )))
            }
        };

        Ok(Predicate::new(Capability::parse(name)?, expected))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub require: Vec<Predicate>,
    pub forbid: Vec<Predicate>,
    /// Overrides the catalog's preference order.
    pub prefer: Option<Vec<ProviderId>>,
    /// Restricts the search to one provider.
    pub scope: Option<ProviderId>,
}

impl SelectOptions {
    pub fn accepts(&self, model: &Model) -> bool {
        self.require.iter().all(|p| p.holds(model)) && !self.forbid.iter().any(|p| p.holds(model))
    }
}

/// Providers in the order they are searched.
fn provider_order<'s>(snapshot: &'s Snapshot, opts: &'s SelectOptions) -> Vec<&'s ProviderId> {
    if let Some(scope) = &opts.scope {
        return vec![scope];
    }

    let prefer = opts.prefer.as_deref().unwrap_or(snapshot.prefer());

    let mut order: Vec<&ProviderId> = Vec::new();

    for id in prefer.iter().chain(snapshot.providers().map(|p| &p.id)) {
        if !order.contains(&id) {
            order.push(id);
        }
    }

    order
}

fn matching<'s>(
    snapshot: &'s Snapshot,
    opts: &'s SelectOptions,
) -> impl Iterator<Item = &'s Model> + 's {
    let filter = snapshot.filter();

    provider_order(snapshot, opts)
        .into_iter()
        .flat_map(move |provider| snapshot.models(provider.as_str()))
        .filter(move |model| opts.accepts(model))
        .filter(move |model| filter.allows(model.provider.as_str(), &model.id))
}

/// The first matching model in provider order.
pub fn select(snapshot: &Snapshot, opts: &SelectOptions) -> Result<(ProviderId, String), Error> {
    matching(snapshot, opts)
        .next()
        .map(|model| (model.provider.clone(), model.id.clone()))
        .ok_or(Error::NoMatch)
}

/// Every matching model, in the order [`select`] would consider them.
pub fn candidates(snapshot: &Snapshot, opts: &SelectOptions) -> Vec<(ProviderId, String)> {
    matching(snapshot, opts)
        .map(|model| (model.provider.clone(), model.id.clone()))
        .collect()
}
