//! Process-wide publication of the current catalog.
//!
//! The store is a single-writer broadcast cell. Publishing swaps the snapshot
//! reference and bumps the epoch in one step; readers clone the current
//! `Arc<Snapshot>` and never observe a half-published catalog.

use lazy_static::lazy_static;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::engine::{self, BuildOptions};
use crate::error::Error;
use crate::model::{Model, Provider};
use crate::provider_id::{KnownProviders, ProviderId};
use crate::query::{self, SelectOptions};
use crate::snapshot::Snapshot;
use crate::spec::{self, ModelSpec, SpecFormat};

/// What subscribers see: the current snapshot, if any, and the epoch of the
/// last publication.
#[derive(Default)]
pub struct Publication {
    snapshot: Option<Arc<Snapshot>>,
    epoch: u64,
    opts: Option<BuildOptions>,
}

impl Publication {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("epoch", &self.epoch)
            .field("digest", &self.snapshot.as_ref().map(|s| s.digest()))
            .finish()
    }
}

/// The result of [`Store::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A new snapshot is now current.
    Published { epoch: u64, digest: String },
    /// The rebuilt catalog matched the current one, which was kept.
    Unchanged { epoch: u64 },
}

impl LoadOutcome {
    pub fn epoch(&self) -> u64 {
        match self {
            LoadOutcome::Published { epoch, .. } | LoadOutcome::Unchanged { epoch } => *epoch,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, LoadOutcome::Published { .. })
    }
}

pub struct Store {
    tx: watch::Sender<Publication>,
}

lazy_static! {
    static ref GLOBAL: Store = Store::new();
}

/// The process-wide store.
pub fn global() -> &'static Store {
    &GLOBAL
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Store").field(&*self.tx.borrow()).finish()
    }
}

impl Store {
    pub fn new() -> Store {
        Store {
            tx: watch::Sender::new(Publication::default()),
        }
    }

    /// Publishes `snapshot` unconditionally and returns its epoch. `opts`, when
    /// given, is kept for [`Store::reload`].
    pub fn put(&self, snapshot: Snapshot, opts: Option<BuildOptions>) -> u64 {
        let mut epoch = 0;

        self.tx.send_modify(|state| {
            state.epoch += 1;
            state.snapshot = Some(Arc::new(snapshot.with_epoch(state.epoch)));

            if opts.is_some() {
                state.opts = opts;
            }

            epoch = state.epoch;
        });

        tracing::info!(epoch, "published catalog");

        epoch
    }

    /// Builds a catalog from `opts` and publishes it, unless its content is
    /// identical to the current snapshot.
    pub fn load(&self, opts: BuildOptions) -> Result<LoadOutcome, Error> {
        let snapshot = engine::build(&opts)?;
        let digest = snapshot.digest().to_string();

        let mut outcome = LoadOutcome::Unchanged { epoch: 0 };

        self.tx.send_if_modified(|state| {
            state.opts = Some(opts);

            let unchanged = state
                .snapshot
                .as_ref()
                .is_some_and(|current| current.digest() == digest);

            if unchanged {
                outcome = LoadOutcome::Unchanged { epoch: state.epoch };
                return false;
            }

            state.epoch += 1;
            state.snapshot = Some(Arc::new(snapshot.with_epoch(state.epoch)));

            outcome = LoadOutcome::Published {
                epoch: state.epoch,
                digest: digest.clone(),
            };

            true
        });

        match &outcome {
            LoadOutcome::Published { epoch, digest } => {
                tracing::info!(epoch, digest = %digest, "published catalog")
            }
            LoadOutcome::Unchanged { epoch } => {
                tracing::debug!(epoch, "catalog unchanged, keeping current snapshot")
            }
        }

        Ok(outcome)
    }

    /// Rebuilds with the options of the last load.
    pub fn reload(&self) -> Result<LoadOutcome, Error> {
        let opts = self.tx.borrow().opts.clone().ok_or(Error::NotLoaded)?;

        self.load(opts)
    }

    /// Drops the current snapshot. The epoch keeps counting from where it was.
    pub fn clear(&self) {
        self.tx.send_modify(|state| {
            state.snapshot = None;
            state.opts = None;
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Publication> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().snapshot.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    fn current(&self) -> Result<Arc<Snapshot>, Error> {
        self.snapshot().ok_or(Error::NotLoaded)
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.snapshot()
            .map(|s| s.providers().cloned().collect())
            .unwrap_or_default()
    }

    pub fn models(&self, provider: &str) -> Vec<Model> {
        self.snapshot()
            .map(|s| s.models(provider).cloned().collect())
            .unwrap_or_default()
    }

    pub fn provider(&self, id: &str) -> Result<Provider, Error> {
        self.current()?
            .provider(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Looks up a model by id or alias.
    pub fn model(&self, provider: &str, id: &str) -> Result<Model, Error> {
        self.current()?
            .model(provider, id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{provider}:{id}")))
    }

    /// The registry of provider ids runtime input may name.
    pub fn known_providers(&self) -> KnownProviders {
        let mut known = KnownProviders::builtin();

        if let Some(snapshot) = self.snapshot() {
            known.extend(snapshot.known_providers().iter().cloned());
        }

        known
    }

    pub fn parse_spec(&self, literal: &str, format: Option<SpecFormat>) -> Result<ModelSpec, Error> {
        spec::parse(literal, format, &self.known_providers())
    }

    pub fn select(&self, opts: &SelectOptions) -> Result<(ProviderId, String), Error> {
        match self.snapshot() {
            Some(snapshot) => query::select(&snapshot, opts),
            None => Err(Error::NoMatch),
        }
    }

    pub fn candidates(&self, opts: &SelectOptions) -> Vec<(ProviderId, String)> {
        self.snapshot()
            .map(|snapshot| query::candidates(&snapshot, opts))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Layer, StaticSource};
    use serde_json::json;

    fn opts(models: &[&str]) -> BuildOptions {
        let models: Vec<_> = models.iter().map(|id| json!({"id": id})).collect();
        let layer: Layer = serde_json::from_value(json!({"acme": {"models": models}})).unwrap();

        BuildOptions::empty().with_source(StaticSource::new("test", layer))
    }

    #[test]
    fn load_is_idempotent() {
        let store = Store::new();

        let first = store.load(opts(&["a-1"])).unwrap();
        let second = store.load(opts(&["a-1"])).unwrap();

        assert!(first.is_published());
        assert_eq!(second, LoadOutcome::Unchanged { epoch: 1 });
        assert_eq!(store.epoch(), 1);
        assert_eq!(store.snapshot().unwrap().epoch(), 1);

        let third = store.load(opts(&["a-1", "a-2"])).unwrap();
        assert_eq!(third.epoch(), 2);
        assert_eq!(store.models("acme").len(), 2);
    }

    #[test]
    fn put_always_publishes() {
        let store = Store::new();
        let snapshot = engine::build(&opts(&["a-1"])).unwrap();

        assert_eq!(store.put(snapshot.clone(), None), 1);
        assert_eq!(store.put(snapshot, None), 2);
        assert_eq!(store.reload(), Err(Error::NotLoaded));
    }

    #[test]
    fn clear_keeps_epoch_monotonic() {
        let store = Store::new();
        store.load(opts(&["a-1"])).unwrap();

        store.clear();
        assert!(store.snapshot().is_none());
        assert_eq!(store.epoch(), 1);
        assert_eq!(store.model("acme", "a-1"), Err(Error::NotLoaded));

        assert_eq!(store.load(opts(&["a-1"])).unwrap().epoch(), 2);
    }

    #[test]
    fn reload_reuses_options() {
        let store = Store::new();
        store.load(opts(&["a-1"])).unwrap();

        assert_eq!(store.reload().unwrap(), LoadOutcome::Unchanged { epoch: 1 });
    }

    #[test]
    fn put_with_options_enables_reload() {
        let store = Store::new();
        let snapshot = engine::build(&opts(&["a-1"])).unwrap();

        assert_eq!(store.put(snapshot, Some(opts(&["a-1", "a-2"]))), 1);
        assert_eq!(store.models("acme").len(), 1);

        assert_eq!(store.reload().unwrap().epoch(), 2);
        assert_eq!(store.models("acme").len(), 2);
    }

    #[test]
    fn lookups() {
        let store = Store::new();
        store.load(opts(&["a-1"])).unwrap();

        assert_eq!(store.model("acme", "a-1").unwrap().id, "a-1");
        assert_eq!(store.model("acme", "nope").unwrap_err().reason(), "not_found");
        assert_eq!(store.provider("acme").unwrap().id.as_str(), "acme");
        assert!(store.known_providers().contains("acme"));
        assert!(store.known_providers().contains("openai"));
    }

    #[test]
    fn subscribers_see_publications() {
        let store = Store::new();
        let mut rx = store.subscribe();

        store.load(opts(&["a-1"])).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().epoch(), 1);

        store.load(opts(&["a-1"])).unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn readers_never_see_a_partial_snapshot() {
        let store = Store::new();
        let small = engine::build(&opts(&["a-1"])).unwrap();
        let large = engine::build(&opts(&["a-1", "a-2", "a-3"])).unwrap();
        let (small_digest, large_digest) = (small.digest().to_string(), large.digest().to_string());

        store.put(small.clone(), None);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        let snapshot = store.snapshot().unwrap();
                        let expected = if snapshot.digest() == small_digest { 1 } else { 3 };

                        assert!(snapshot.digest() == small_digest || snapshot.digest() == large_digest);
                        assert_eq!(snapshot.model_count(), expected);
                    }
                });
            }

            for i in 0..200 {
                let next = if i % 2 == 0 { large.clone() } else { small.clone() };
                store.put(next, None);
            }
        });

        assert_eq!(store.epoch(), 201);
    }
}
