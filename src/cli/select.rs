use modelcat::{ModelSpec, SelectOptions, SpecFormat, Store};

use crate::{
    cli::provider_or_die,
    color::{MaybePaint, DIM, MODEL, PROVIDER},
    die, SelectArgs,
};

fn print_spec(provider: &str, model: &str, format: SpecFormat) {
    let (first, sep, second) = match format {
        SpecFormat::Colon => (PROVIDER.maybe_paint(provider), ":", MODEL.maybe_paint(model)),
        SpecFormat::At => (MODEL.maybe_paint(model), "@", PROVIDER.maybe_paint(provider)),
    };

    println!("{}{}{}", first, DIM.maybe_paint(sep), second);
}

pub(crate) fn select_cmd(store: &Store, spec_format: SpecFormat, args: &SelectArgs) {
    let known = store.known_providers();

    let prefer = if args.prefer.is_empty() {
        None
    } else {
        Some(args.prefer.iter().map(|p| provider_or_die(&known, p)).collect())
    };

    let opts = SelectOptions {
        require: args.require.clone(),
        forbid: args.forbid.clone(),
        prefer,
        scope: args.scope.as_deref().map(|p| provider_or_die(&known, p)),
    };

    let format = args.format.unwrap_or(spec_format);

    if args.all {
        let candidates = store.candidates(&opts);

        if candidates.is_empty() {
            die!("{}", modelcat::Error::NoMatch);
        }

        for (provider, model) in candidates {
            print_spec(provider.as_str(), &model, format);
        }

        return;
    }

    match store.select(&opts) {
        Ok((provider, model)) => {
            let spec = ModelSpec::new(provider, model);

            print_spec(spec.provider.as_str(), &spec.model, format);
        }
        Err(err) => die!("{}", err),
    }
}
