//! The immutable, indexed result of one pipeline run.
//!
//! A [`Snapshot`] is never mutated once built. Indexes:
//!
//! - providers by id;
//! - models by provider, then by id (which doubles as the per-provider grouping);
//! - aliases by provider, then by alias, resolving to a canonical model id.
//!
//! Every alias resolves to an indexed model and every indexed model belongs to
//! an indexed provider; models referring to unknown providers are dropped while
//! indexing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::filter::Filter;
use crate::model::{Model, Provider};
use crate::provider_id::{KnownProviders, ProviderId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotMeta {
    /// Publication counter; zero until the snapshot is published.
    pub epoch: u64,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over the indexed content, used to detect no-op reloads.
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    providers: BTreeMap<ProviderId, Provider>,
    models: BTreeMap<ProviderId, BTreeMap<String, Model>>,
    aliases: BTreeMap<ProviderId, BTreeMap<String, String>>,
    filter: Filter,
    prefer: Vec<ProviderId>,
    meta: SnapshotMeta,
}

/// The part of a snapshot that identifies its content. Timestamps and the
/// epoch are left out so identical inputs give identical digests.
#[derive(Serialize)]
struct Content<'s> {
    providers: &'s BTreeMap<ProviderId, Provider>,
    models: &'s BTreeMap<ProviderId, BTreeMap<String, Model>>,
    aliases: &'s BTreeMap<ProviderId, BTreeMap<String, String>>,
    filter: &'s Filter,
    prefer: &'s [ProviderId],
}

impl Snapshot {
    pub fn build(
        providers: Vec<Provider>,
        models: Vec<Model>,
        filter: Filter,
        prefer: Vec<ProviderId>,
    ) -> Snapshot {
        let providers: BTreeMap<ProviderId, Provider> =
            providers.into_iter().map(|p| (p.id.clone(), p)).collect();

        let models = index_models(&providers, models);
        let aliases = index_aliases(&models);

        let digest = digest(&Content {
            providers: &providers,
            models: &models,
            aliases: &aliases,
            filter: &filter,
            prefer: &prefer,
        });

        Snapshot {
            providers,
            models,
            aliases,
            filter,
            prefer,
            meta: SnapshotMeta {
                epoch: 0,
                generated_at: Utc::now(),
                digest,
            },
        }
    }

    /// Stamps the publication epoch. Only the store calls this, immediately
    /// before the snapshot becomes visible.
    pub(crate) fn with_epoch(mut self, epoch: u64) -> Snapshot {
        self.meta.epoch = epoch;
        self
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn epoch(&self) -> u64 {
        self.meta.epoch
    }

    pub fn digest(&self) -> &str {
        &self.meta.digest
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Preferred providers, in order.
    pub fn prefer(&self) -> &[ProviderId] {
        &self.prefer
    }

    /// Providers in catalog order.
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// The models of one provider in catalog order. Unknown providers have none.
    pub fn models(&self, provider: &str) -> impl Iterator<Item = &Model> {
        self.models.get(provider).into_iter().flat_map(|m| m.values())
    }

    pub fn all_models(&self) -> impl Iterator<Item = &Model> {
        self.models.values().flat_map(|m| m.values())
    }

    pub fn model_count(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    /// Looks up a model by id or alias.
    pub fn model(&self, provider: &str, id: &str) -> Option<&Model> {
        let models = self.models.get(provider)?;

        if let Some(model) = models.get(id) {
            return Some(model);
        }

        let canonical = self.resolve_alias(provider, id)?;

        models.get(canonical)
    }

    pub fn resolve_alias(&self, provider: &str, alias: &str) -> Option<&str> {
        self.aliases
            .get(provider)
            .and_then(|aliases| aliases.get(alias))
            .map(String::as_str)
    }

    /// The provider ids of this snapshot, for strict normalization.
    pub fn known_providers(&self) -> KnownProviders {
        self.providers.keys().cloned().collect()
    }
}

fn index_models(
    providers: &BTreeMap<ProviderId, Provider>,
    models: Vec<Model>,
) -> BTreeMap<ProviderId, BTreeMap<String, Model>> {
    let mut index: BTreeMap<ProviderId, BTreeMap<String, Model>> = BTreeMap::new();

    for model in models {
        if !providers.contains_key(&model.provider) {
            tracing::warn!(
                provider = %model.provider,
                model = %model.id,
                "dropping model: provider is not in the catalog"
            );
            continue;
        }

        index
            .entry(model.provider.clone())
            .or_default()
            .insert(model.id.clone(), model);
    }

    index
}

fn index_aliases(
    models: &BTreeMap<ProviderId, BTreeMap<String, Model>>,
) -> BTreeMap<ProviderId, BTreeMap<String, String>> {
    let mut index: BTreeMap<ProviderId, BTreeMap<String, String>> = BTreeMap::new();

    for (provider, by_id) in models {
        let mut aliases = BTreeMap::new();

        for model in by_id.values() {
            for alias in &model.aliases {
                if alias == &model.id {
                    continue;
                }

                if by_id.contains_key(alias) {
                    tracing::warn!(
                        provider = %provider,
                        alias = %alias,
                        "ignoring alias of {}: it names another model",
                        model.id
                    );
                    continue;
                }

                match aliases.entry(alias.clone()) {
                    Entry::Vacant(entry) => {
                        entry.insert(model.id.clone());
                    }
                    Entry::Occupied(entry) => {
                        tracing::warn!(
                            provider = %provider,
                            alias = %alias,
                            "ignoring alias of {}: already an alias of {}",
                            model.id,
                            entry.get()
                        );
                    }
                }
            }
        }

        if !aliases.is_empty() {
            index.insert(provider.clone(), aliases);
        }
    }

    index
}

fn digest(content: &Content<'_>) -> String {
    let mut hasher = Sha256::new();

    // Every key is a string and every value derives Serialize.
    serde_json::to_writer(&mut hasher, content).expect("catalog content always serializes");

    format!("{:x}", hasher.finalize())
}
