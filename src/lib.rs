//! A layered, in-memory catalog of LLM providers and their models.
//!
//! Raw layers from one or more [`Source`]s are normalized, merged, validated,
//! enriched, filtered and indexed into an immutable [`Snapshot`], which a
//! [`Store`] publishes for concurrent readers.
//!
//! ```no_run
//! use modelcat::{BuildOptions, Capability, SelectOptions};
//!
//! let store = modelcat::store::global();
//! store.load(BuildOptions::default().with_prefer(["anthropic"]))?;
//!
//! let spec = store.parse_spec("openai:gpt-4o-mini", None)?;
//! let (provider, model) = store.select(&SelectOptions {
//!     require: vec![Capability::Tools.into()],
//!     ..SelectOptions::default()
//! })?;
//! # let _ = (spec, provider, model);
//! # Ok::<(), modelcat::Error>(())
//! ```

pub mod config;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod provider_id;
pub mod query;
pub mod snapshot;
pub mod source;
pub mod spec;
pub mod store;
pub mod validate;

pub use config::Config;
pub use engine::{build, BuildOptions};
pub use error::Error;
pub use filter::{AllowSpec, Filter};
pub use model::{Capabilities, Model, Provider};
pub use provider_id::{KnownProviders, ProviderId};
pub use query::{Capability, Predicate, SelectOptions};
pub use snapshot::Snapshot;
pub use source::{BaselineSource, FileSource, Layer, Source, SourceError, StaticSource};
pub use spec::{ModelSpec, SpecFormat};
pub use store::{LoadOutcome, Store};
