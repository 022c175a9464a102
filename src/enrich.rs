//! Deterministic derivations applied to validated models.
//!
//! Enrichment only ever fills gaps: a value any source supplied is kept, and a
//! capability group no source mentioned is left absent.

use crate::model::{Capabilities, Json, Model, Reasoning, Streaming, Tools};

/// The family of a model id is every `-` separated segment but the last.
/// Single-segment ids have no family.
pub fn derive_family(id: &str) -> Option<String> {
    let (family, _) = id.rsplit_once('-')?;

    Some(family.to_string())
}

pub fn enrich_model(mut model: Model) -> Model {
    if model.family.is_none() {
        model.family = derive_family(&model.id);
    }

    if model.provider_model_id.is_none() {
        model.provider_model_id = Some(model.id.clone());
    }

    if let Some(capabilities) = model.capabilities.as_mut() {
        fill_capabilities(capabilities);
    }

    model
}

pub fn enrich_models(models: Vec<Model>) -> Vec<Model> {
    models.into_iter().map(enrich_model).collect()
}

fn fill(field: &mut Option<bool>, default: bool) {
    field.get_or_insert(default);
}

fn fill_capabilities(caps: &mut Capabilities) {
    fill(&mut caps.chat, true);
    fill(&mut caps.embeddings, false);

    if let Some(Reasoning { enabled, .. }) = caps.reasoning.as_mut() {
        fill(enabled, false);
    }

    if let Some(Tools {
        enabled,
        streaming,
        strict,
        parallel,
    }) = caps.tools.as_mut()
    {
        fill(enabled, false);
        fill(streaming, false);
        fill(strict, false);
        fill(parallel, false);
    }

    if let Some(Json {
        native,
        schema,
        strict,
    }) = caps.json.as_mut()
    {
        fill(native, false);
        fill(schema, false);
        fill(strict, false);
    }

    if let Some(Streaming { text, tool_calls }) = caps.streaming.as_mut() {
        fill(text, true);
        fill(tool_calls, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_id::ProviderId;

    fn model(id: &str) -> Model {
        Model::new(ProviderId::parse("p").unwrap(), id)
    }

    #[test]
    fn family() {
        assert_eq!(derive_family("gpt-4o-mini").as_deref(), Some("gpt-4o"));
        assert_eq!(derive_family("claude-3"), Some("claude".to_string()));
        assert_eq!(derive_family("llama3"), None);
    }

    #[test]
    fn fills_only_absent_scalars() {
        let mut m = model("gpt-4o-mini");
        m.family = Some("gpt-4o-family".to_string());

        let enriched = enrich_model(m);

        assert_eq!(enriched.family.as_deref(), Some("gpt-4o-family"));
        assert_eq!(enriched.provider_model_id.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn fills_siblings_inside_present_groups_only() {
        let mut m = model("m");
        m.capabilities = Some(Capabilities {
            tools: Some(Tools {
                enabled: Some(true),
                ..Tools::default()
            }),
            streaming: Some(Streaming::default()),
            ..Capabilities::default()
        });

        let caps = enrich_model(m).capabilities.unwrap();

        assert_eq!(caps.chat, Some(true));
        assert_eq!(caps.embeddings, Some(false));
        assert_eq!(
            caps.tools,
            Some(Tools {
                enabled: Some(true),
                streaming: Some(false),
                strict: Some(false),
                parallel: Some(false),
            })
        );
        assert_eq!(
            caps.streaming,
            Some(Streaming {
                text: Some(true),
                tool_calls: Some(false),
            })
        );
        assert!(caps.reasoning.is_none());
        assert!(caps.json.is_none());
    }

    #[test]
    fn absent_capabilities_are_not_fabricated() {
        assert!(enrich_model(model("m")).capabilities.is_none());
    }
}
