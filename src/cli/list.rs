use table::{IntoTable, Table};
pub(crate) mod table;

use modelcat::{Model, ModelSpec, Provider, SpecFormat, Store};

use crate::{cli::provider_or_die, die, ListArgs, ListObject, ListingFormat};

#[derive(serde::Serialize)]
struct ModelListing {
    spec: String,
    name: Option<String>,
    context: Option<u64>,
    output: Option<u64>,
    deprecated: bool,
}

impl ModelListing {
    fn new(model: &Model, format: SpecFormat) -> ModelListing {
        let limits = model.limits.unwrap_or_default();

        ModelListing {
            spec: ModelSpec::new(model.provider.clone(), model.id.as_str()).format(format),
            name: model.name.clone(),
            context: limits.context,
            output: limits.output,
            deprecated: model.deprecated,
        }
    }
}

fn or_unknown(value: Option<u64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "unknown".to_string(),
    }
}

impl From<Vec<ModelListing>> for Table {
    fn from(value: Vec<ModelListing>) -> Self {
        let mut tab = Table::new(vec!["MODEL", "CONTEXT", "OUTPUT", "STATUS", "NAME"]);

        for model in value {
            tab.add_row(vec![
                model.spec,
                or_unknown(model.context),
                or_unknown(model.output),
                if model.deprecated {
                    "deprecated".to_string()
                } else {
                    "active".to_string()
                },
                model.name.unwrap_or_default(),
            ]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct ProviderListing {
    provider: String,
    models: usize,
    name: Option<String>,
    base_url: Option<String>,
}

impl From<Vec<ProviderListing>> for Table {
    fn from(value: Vec<ProviderListing>) -> Self {
        let mut tab = Table::new(vec!["PROVIDER", "MODELS", "NAME", "BASE_URL"]);

        for provider in value {
            tab.add_row(vec![
                provider.provider,
                provider.models.to_string(),
                provider.name.unwrap_or_default(),
                provider.base_url.unwrap_or_default(),
            ]);
        }

        tab
    }
}

fn get_providers(store: &Store) -> Vec<ProviderListing> {
    store
        .providers()
        .into_iter()
        .map(|provider: Provider| ProviderListing {
            models: store.models(provider.id.as_str()).len(),
            provider: provider.id.to_string(),
            name: provider.name,
            base_url: provider.base_url,
        })
        .collect()
}

fn get_models(store: &Store, provider: Option<&str>, format: SpecFormat) -> Vec<ModelListing> {
    let models: Vec<Model> = match provider {
        Some(provider) => {
            let id = provider_or_die(&store.known_providers(), provider);

            store.models(id.as_str())
        }
        None => store
            .providers()
            .iter()
            .flat_map(|p| store.models(p.id.as_str()))
            .collect(),
    };

    models.iter().map(|m| ModelListing::new(m, format)).collect()
}

pub(crate) fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize listing: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) fn list_cmd(store: &Store, spec_format: SpecFormat, args: &ListArgs) {
    let format = args.format;

    match &args.object {
        ListObject::Models(args) => {
            let models = get_models(store, args.provider.as_deref(), spec_format);
            format_output(models, format);
        }
        ListObject::Providers => {
            let providers = get_providers(store);
            format_output(providers, format);
        }
    }
}
