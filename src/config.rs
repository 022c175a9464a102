use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::BuildOptions;
use crate::error::Error;
use crate::filter::AllowSpec;
use crate::source::{BaselineSource, FileSource, Layer, Source, StaticSource};
use crate::spec::SpecFormat;

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The catalog packaged with the crate
    #[default]
    Baseline,
    /// A JSON or TOML layer on disk
    File,
    /// A layer written directly in the config
    Inline,
}

#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig::default()]
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub allow: AllowSpec,
    #[serde(default)]
    pub deny: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub prefer: Vec<String>,
    #[serde(default)]
    pub spec_format: SpecFormat,
    /// Sources in precedence order, lowest first
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Applied after every listed source
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: Layer,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow: AllowSpec::default(),
            deny: BTreeMap::new(),
            prefer: Vec::new(),
            spec_format: SpecFormat::default(),
            sources: default_sources(),
            overrides: Layer::new(),
        }
    }
}

impl SourceConfig {
    fn to_source(&self, index: usize) -> Result<Arc<dyn Source>, Error> {
        let source: Arc<dyn Source> = match self.kind {
            SourceKind::Baseline => Arc::new(BaselineSource),
            SourceKind::File => {
                let path = self.path.as_ref().ok_or_else(|| Error::Config {
                    path: format!("sources[{index}]"),
                    detail: "a file source needs a path".to_string(),
                })?;

                Arc::new(FileSource::new(path))
            }
            SourceKind::Inline => {
                let name = self.name.clone().unwrap_or_else(|| format!("inline[{index}]"));

                Arc::new(StaticSource::new(name, self.layer.clone().unwrap_or_default()))
            }
        };

        Ok(source)
    }
}

impl Config {
    pub fn build_options(&self) -> Result<BuildOptions, Error> {
        let mut sources = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| source.to_source(i))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.overrides.is_empty() {
            sources.push(Arc::new(StaticSource::new("overrides", self.overrides.clone())));
        }

        Ok(BuildOptions {
            sources,
            allow: self.allow.clone(),
            deny: self.deny.clone(),
            prefer: self.prefer.clone(),
            ..BuildOptions::default()
        })
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/modelcat/config.toml", ".modelcat.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/modelcat.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_toml<S: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> Result<S, Error> {
    toml::de::from_str(raw).map_err(|err| Error::Config {
        path: path.display().to_string(),
        detail: err.to_string(),
    })
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => {
                let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

                extra.push(path.join("."));
            }
        }

        path.pop();
    }
}

/// Dotted paths of keys present in `raw` that `config` does not use.
pub fn extra_fields(path: &Path, config: &Config, raw: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = parse_toml(path, raw)?;

    let config: toml::Table = {
        let serialized = toml::ser::to_string(config).map_err(|err| Error::Config {
            path: path.display().to_string(),
            detail: format!("failed to reserialize config: {err}"),
        })?;

        parse_toml(path, &serialized)?
    };

    let mut extra = Vec::new();

    extra_fields_helper(&mut Vec::new(), &user_config, &config, &mut extra);

    Ok(extra)
}

pub fn parse_config(path: &Path, raw: &str) -> Result<Config, Error> {
    let config: Config = parse_toml(path, raw)?;

    for key in extra_fields(path, &config, raw)? {
        tracing::warn!(path = %path.display(), "config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

/// Reads the config at `config`, or the first one found on the search path.
/// No config at all means defaults.
pub fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    let config_path = config.or_else(get_config_path);

    if let Some(path) = config_path {
        let raw = std::fs::read_to_string(&path).map_err(|err| Error::Config {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "read config");

        parse_config(&path, &raw)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AllMarker;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
allow = { openai = ["gpt-4o*"], anthropic = [] }
prefer = ["anthropic", "openai"]
spec_format = "at"
editor = "vim"

[deny]
openai = ["*-preview"]

[[sources]]
kind = "baseline"

[[sources]]
kind = "file"
path = "/var/lib/modelcat/extra.json"
colour = "blue"

[overrides.openai]
name = "OpenAI (proxy)"
"#;

    #[test]
    fn defaults() {
        let config: Config = parse_config(Path::new("empty.toml"), "").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.allow, AllowSpec::All(AllMarker::All));
        assert_eq!(config.sources, vec![SourceConfig::default()]);
    }

    #[test]
    fn parses_every_section() {
        let config = parse_config(Path::new("sample.toml"), SAMPLE).unwrap();

        assert_eq!(config.spec_format, SpecFormat::At);
        assert_eq!(config.prefer, vec!["anthropic", "openai"]);
        assert_eq!(config.deny["openai"], vec!["*-preview"]);
        assert!(matches!(&config.allow, AllowSpec::Providers(map) if map["anthropic"].is_empty()));
        assert_eq!(config.sources[1].kind, SourceKind::File);
        assert_eq!(config.overrides["openai"]["name"], "OpenAI (proxy)");
    }

    #[test]
    fn reports_extra_fields() {
        let path = Path::new("sample.toml");
        let config = parse_config(path, SAMPLE).unwrap();

        // Array-of-table entries are not descended into.
        assert_eq!(extra_fields(path, &config, SAMPLE).unwrap(), vec!["editor"]);
    }

    #[test]
    fn build_options_follow_source_order() {
        let config = parse_config(Path::new("sample.toml"), SAMPLE).unwrap();
        let opts = config.build_options().unwrap();

        let names: Vec<&str> = opts.sources.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["baseline", "file:/var/lib/modelcat/extra.json", "overrides"]
        );
        assert_eq!(opts.prefer, vec!["anthropic", "openai"]);
    }

    #[test]
    fn file_source_without_path() {
        let config = parse_config(Path::new("bad.toml"), "[[sources]]\nkind = \"file\"\n").unwrap();

        assert_eq!(config.build_options().unwrap_err().reason(), "bad_config");
    }

    #[test]
    fn read_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "prefer = [\"openai\"]\n").unwrap();

        let config = read_config(Some(path)).unwrap();
        assert_eq!(config.prefer, vec!["openai"]);

        let missing = read_config(Some(dir.path().join("missing.toml"))).unwrap_err();
        assert_eq!(missing.reason(), "bad_config");

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "prefer = [").unwrap();
        assert_eq!(read_config(Some(broken)).unwrap_err().reason(), "bad_config");
    }
}
