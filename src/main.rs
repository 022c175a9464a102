mod cli;
mod color;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{list::list_cmd, parse::parse_cmd, select::select_cmd, ColorMode};
use modelcat::{config::read_config, Predicate, SpecFormat};
use tracing_subscriber::EnvFilter;

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "modelcat")]
#[command(
    about = "Query a layered catalog of LLM providers and models",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from this file instead of the search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers or models
    List(ListArgs),
    /// Pick a model by capability
    Select(SelectArgs),
    /// Parse a model spec and render it in every format
    Parse(ParseArgs),
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Models in the catalog
    Models(ListModelArgs),
    /// Providers
    Providers,
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified provider
    #[arg(short, long)]
    provider: Option<String>,
}

#[derive(Parser, Default)]
pub(crate) struct SelectArgs {
    /// Capabilities the model must have, e.g. `tools` or `json.strict=false`
    #[arg(short, long, value_delimiter = ',')]
    require: Vec<Predicate>,
    /// Capabilities the model must not have
    #[arg(long, value_delimiter = ',')]
    forbid: Vec<Predicate>,
    /// Providers to search first, in order
    #[arg(short, long, value_delimiter = ',')]
    prefer: Vec<String>,
    /// Only search this provider
    #[arg(short, long)]
    scope: Option<String>,
    /// Print every match instead of the first
    #[arg(short, long)]
    all: bool,
    /// Render specs in this format
    #[arg(short, long)]
    format: Option<SpecFormat>,
}

#[derive(Parser)]
pub(crate) struct ParseArgs {
    /// A model spec, `provider:model` or `model@provider`
    spec: String,
    /// Parse the model spec as this format instead of inferring it
    #[arg(long)]
    spec_format: Option<SpecFormat>,
    /// Output format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

fn init_logging(color: ColorMode) {
    let filter = EnvFilter::try_from_env("MODELCAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);

    color::configure_color(color);
    init_logging(color);

    let config = match read_config(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    let opts = match config.build_options() {
        Ok(opts) => opts,
        Err(err) => die!("{}", err),
    };

    let store = modelcat::store::global();

    if let Err(err) = store.load(opts) {
        die!("failed to load the catalog: {}", err);
    }

    match &cli.command {
        Commands::List(args) => list_cmd(store, config.spec_format, args),
        Commands::Select(args) => select_cmd(store, config.spec_format, args),
        Commands::Parse(args) => parse_cmd(store, args),
    }
}
