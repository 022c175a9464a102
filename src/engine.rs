//! The build pipeline.
//!
//! [`build`] runs every stage in order and either returns a complete
//! [`Snapshot`] or fails; nothing is published here. Stages:
//!
//! 1. load every source, lowest precedence first, then the runtime overrides
//! 2. normalize each layer into provider and model records
//! 3. fold the layers through the merger, applying provider exclude patterns
//! 4. validate the merged records
//! 5. enrich the surviving models, dropping any whose provider was rejected
//! 6. apply the allow/deny filter
//! 7. check viability, then index into a snapshot

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::enrich::enrich_models;
use crate::error::Error;
use crate::filter::{AllowSpec, Filter, PatternMap};
use crate::merge::{compile_excludes, merge_models, merge_providers, provider_excludes, MergePolicy};
use crate::normalize::{normalize_layer, normalize_provider_id, Mode, NormalizedLayer};
use crate::provider_id::ProviderId;
use crate::snapshot::Snapshot;
use crate::source::{BaselineSource, Layer, Source};
use crate::validate::{ensure_viable, validate_models, validate_providers, SchemaValidator, SerdeValidator};

/// Everything a pipeline run depends on. Kept by the store so a catalog can
/// be rebuilt later with the same inputs.
#[derive(Clone)]
pub struct BuildOptions {
    /// Sources in precedence order, lowest first.
    pub sources: Vec<Arc<dyn Source>>,
    pub allow: AllowSpec,
    pub deny: BTreeMap<String, Vec<String>>,
    pub prefer: Vec<String>,
    /// Applied on top of every source.
    pub runtime_overrides: Option<Layer>,
    pub validator: Arc<dyn SchemaValidator>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            sources: vec![Arc::new(BaselineSource)],
            allow: AllowSpec::default(),
            deny: BTreeMap::new(),
            prefer: Vec::new(),
            runtime_overrides: None,
            validator: Arc::new(SerdeValidator),
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("sources", &self.sources)
            .field("allow", &self.allow)
            .field("deny", &self.deny)
            .field("prefer", &self.prefer)
            .field("runtime_overrides", &self.runtime_overrides.is_some())
            .finish_non_exhaustive()
    }
}

impl BuildOptions {
    /// Options with no sources at all.
    pub fn empty() -> BuildOptions {
        BuildOptions {
            sources: Vec::new(),
            ..BuildOptions::default()
        }
    }

    pub fn with_source(mut self, source: impl Source + 'static) -> BuildOptions {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_allow(mut self, allow: AllowSpec) -> BuildOptions {
        self.allow = allow;
        self
    }

    pub fn with_deny(mut self, deny: BTreeMap<String, Vec<String>>) -> BuildOptions {
        self.deny = deny;
        self
    }

    pub fn with_prefer<S: Into<String>>(mut self, prefer: impl IntoIterator<Item = S>) -> BuildOptions {
        self.prefer = prefer.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_runtime_overrides(mut self, layer: Layer) -> BuildOptions {
        self.runtime_overrides = Some(layer);
        self
    }

    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> BuildOptions {
        self.validator = Arc::new(validator);
        self
    }
}

/// Runs the whole pipeline once.
pub fn build(opts: &BuildOptions) -> Result<Snapshot, Error> {
    let layers = load_layers(opts)?;
    tracing::debug!(layers = layers.len(), "loaded source layers");

    let normalized: Vec<NormalizedLayer> = layers.iter().map(normalize_layer).collect();

    let (providers, models) = fold_layers(normalized)?;
    tracing::debug!(
        providers = providers.len(),
        models = models.len(),
        "merged layers"
    );

    let providers = validate_providers(opts.validator.as_ref(), providers);
    let models = validate_models(opts.validator.as_ref(), models);
    tracing::debug!(
        dropped_providers = providers.dropped,
        dropped_models = models.dropped,
        "validated records"
    );

    let providers = providers.valid;
    let mut models = enrich_models(models.valid);

    let before = models.len();
    models.retain(|model| providers.iter().any(|p| p.id == model.provider));
    if before != models.len() {
        tracing::warn!(
            dropped = before - models.len(),
            "dropping models whose provider is not in the catalog"
        );
    }

    let filter = Filter::compile(&opts.allow, &opts.deny)?;

    let before = models.len();
    models.retain(|model| filter.allows(model.provider.as_str(), &model.id));
    tracing::debug!(hidden = before - models.len(), "applied filter");

    ensure_viable(&providers, &models)?;

    let prefer = normalize_prefer(&opts.prefer);

    let snapshot = Snapshot::build(providers, models, filter, prefer);

    warn_unknown_providers(&snapshot);

    tracing::debug!(
        providers = snapshot.providers().count(),
        models = snapshot.model_count(),
        digest = %snapshot.digest(),
        "indexed catalog"
    );

    Ok(snapshot)
}

/// Loads each source in order. A failing source contributes nothing; the run
/// only fails here when no layer at all is left.
fn load_layers(opts: &BuildOptions) -> Result<Vec<Layer>, Error> {
    let mut layers = Vec::with_capacity(opts.sources.len() + 1);
    let mut last_error = None;

    for source in &opts.sources {
        match source.load() {
            Ok(layer) => layers.push(layer),
            Err(error) => {
                tracing::warn!(
                    source = source.name(),
                    reason = error.reason(),
                    "source contributed nothing: {}",
                    error
                );

                last_error = Some(Error::Source {
                    source_name: source.name().to_string(),
                    error,
                });
            }
        }
    }

    if let Some(overrides) = opts.runtime_overrides.as_ref().filter(|l| !l.is_empty()) {
        layers.push(overrides.clone());
    }

    if layers.is_empty() {
        return Err(last_error.unwrap_or(Error::EmptyCatalog));
    }

    Ok(layers)
}

type Records = Vec<serde_json::Map<String, serde_json::Value>>;

fn fold_layers(layers: Vec<NormalizedLayer>) -> Result<(Records, Records), Error> {
    let policy = MergePolicy::CATALOG;
    let none = PatternMap::new();

    let mut providers = Vec::new();
    let mut models = Vec::new();

    for layer in layers {
        providers = merge_providers(providers, layer.providers, &policy);
        models = merge_models(models, layer.models, &none, &policy);
    }

    // Exclude patterns are only known once every layer had its say.
    let excludes = compile_excludes(&provider_excludes(&providers))?;

    let before = models.len();
    let models = merge_models(models, Vec::new(), &excludes, &policy);
    tracing::debug!(excluded = before - models.len(), "applied exclude patterns");

    Ok((providers, models))
}

fn normalize_prefer(prefer: &[String]) -> Vec<ProviderId> {
    let mut out: Vec<ProviderId> = Vec::with_capacity(prefer.len());

    for raw in prefer {
        match normalize_provider_id(raw.as_str(), Mode::Build) {
            Ok(id) if !out.contains(&id) => out.push(id),
            Ok(_) => {}
            Err(err) => tracing::warn!(provider = %raw, "ignoring preferred provider: {}", err),
        }
    }

    out
}

fn warn_unknown_providers(snapshot: &Snapshot) {
    let filter = snapshot.filter().providers();
    let prefer = snapshot.prefer().iter();

    for id in filter.chain(prefer) {
        if !snapshot.has_provider(id.as_str()) {
            tracing::warn!(provider = %id, "configured provider is not in the catalog");
        }
    }
}
