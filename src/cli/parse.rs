use modelcat::{SpecFormat, Store};

use crate::{
    cli::list::{format_output, table::Table},
    die, warn, ParseArgs,
};

#[derive(serde::Serialize)]
struct Parsed {
    provider: String,
    model: String,
    colon: String,
    at: String,
    /// The catalog id the model spec resolves to, following aliases.
    resolved: Option<String>,
}

impl From<Parsed> for Table {
    fn from(parsed: Parsed) -> Self {
        let mut tab = Table::new(vec!["FIELD", "VALUE"]);

        tab.add_row(vec!["provider".to_string(), parsed.provider]);
        tab.add_row(vec!["model".to_string(), parsed.model]);
        tab.add_row(vec!["colon".to_string(), parsed.colon]);
        tab.add_row(vec!["at".to_string(), parsed.at]);
        tab.add_row(vec!["resolved".to_string(), parsed.resolved.unwrap_or_else(|| "-".to_string())]);

        tab
    }
}

pub(crate) fn parse_cmd(store: &Store, args: &ParseArgs) {
    let spec = match store.parse_spec(&args.spec, args.spec_format) {
        Ok(spec) => spec,
        Err(err) => die!("{}", err),
    };

    let resolved = match store.snapshot() {
        Some(snapshot) => spec.resolve(&snapshot).ok().map(|m| m.id.clone()),
        None => None,
    };

    if resolved.is_none() {
        warn!("{} is not in the catalog", spec);
    }

    let parsed = Parsed {
        provider: spec.provider.to_string(),
        model: spec.model.clone(),
        colon: spec.format(SpecFormat::Colon),
        at: spec.format(SpecFormat::At),
        resolved,
    };

    format_output(parsed, args.format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_as_a_table() {
        crate::color::configure_color(crate::cli::ColorMode::Off);

        let parsed = Parsed {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            colon: "openai:gpt-4o".to_string(),
            at: "gpt-4o@openai".to_string(),
            resolved: None,
        };

        assert_eq!(
            Table::from(parsed).to_string(),
            "FIELD     VALUE\n\
             provider  openai\n\
             model     gpt-4o\n\
             colon     openai:gpt-4o\n\
             at        gpt-4o@openai\n\
             resolved  -\n"
        );
    }
}
