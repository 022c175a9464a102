//! Record acceptance.
//!
//! The schema itself lives behind [`SchemaValidator`]; the catalog only relies
//! on it to turn an untyped record into a canonical typed one or reject it.
//! Batch validation never fails: rejected records are dropped, counted and
//! logged, and the survivors keep their relative order.

use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::merge::Record;
use crate::model::{Model, Provider};

pub trait SchemaValidator: Send + Sync {
    fn validate_provider(&self, record: &Record) -> Result<Provider, Error>;

    fn validate_model(&self, record: &Record) -> Result<Model, Error>;
}

/// Validates records by deserializing them into the typed model, plus the
/// structural checks serde cannot express.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeValidator;

const MAX_MODEL_ID_LEN: usize = 512;

fn check_id(record: &Record) -> Result<&str, Error> {
    match record.get("id") {
        None | Some(Value::Null) => Err(Error::MissingId),
        Some(Value::String(id)) if id.trim().is_empty() => {
            Err(Error::InvalidId("id is blank".to_string()))
        }
        Some(Value::String(id)) if id.len() > MAX_MODEL_ID_LEN => {
            Err(Error::InvalidId(format!("id is longer than {MAX_MODEL_ID_LEN} bytes")))
        }
        Some(Value::String(id)) if id.chars().any(|c| c.is_whitespace() || c.is_control()) => {
            Err(Error::InvalidId(format!("\"{id}\" contains whitespace")))
        }
        Some(Value::String(id)) => Ok(id),
        Some(other) => Err(Error::InvalidId(format!("id {other} is not a string"))),
    }
}

fn check_url(field: &str, value: Option<&str>) -> Result<(), Error> {
    match value {
        Some(value) => Url::parse(value)
            .map(|_| ())
            .map_err(|err| Error::InvalidProvider(format!("{field} \"{value}\": {err}"))),
        None => Ok(()),
    }
}

impl SchemaValidator for SerdeValidator {
    fn validate_provider(&self, record: &Record) -> Result<Provider, Error> {
        check_id(record)?;

        let provider: Provider = serde_json::from_value(Value::Object(record.clone()))
            .map_err(|err| Error::InvalidProvider(err.to_string()))?;

        check_url("base_url", provider.base_url.as_deref())?;
        check_url("doc", provider.doc.as_deref())?;

        Ok(provider)
    }

    fn validate_model(&self, record: &Record) -> Result<Model, Error> {
        let id = check_id(record)?;

        if matches!(record.get("provider"), None | Some(Value::Null)) {
            return Err(Error::MissingProvider(id.to_string()));
        }

        serde_json::from_value(Value::Object(record.clone()))
            .map_err(|err| Error::InvalidModel(format!("{id}: {err}")))
    }
}

/// Validated records plus the number rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated<T> {
    pub valid: Vec<T>,
    pub dropped: usize,
}

pub fn validate_providers(
    validator: &dyn SchemaValidator,
    records: Vec<Record>,
) -> Validated<Provider> {
    let mut out = Validated {
        valid: Vec::with_capacity(records.len()),
        dropped: 0,
    };

    for record in records {
        match validator.validate_provider(&record) {
            Ok(provider) => out.valid.push(provider),
            Err(err) => {
                let provider = record.get("id").and_then(Value::as_str).unwrap_or("?");

                tracing::warn!(
                    provider,
                    reason = err.reason(),
                    "dropping provider: {}",
                    err
                );
                out.dropped += 1;
            }
        }
    }

    out
}

pub fn validate_models(validator: &dyn SchemaValidator, records: Vec<Record>) -> Validated<Model> {
    let mut out = Validated {
        valid: Vec::with_capacity(records.len()),
        dropped: 0,
    };

    for record in records {
        match validator.validate_model(&record) {
            Ok(model) => out.valid.push(model),
            Err(err) => {
                let provider = record.get("provider").and_then(Value::as_str).unwrap_or("?");
                let model = record.get("id").and_then(Value::as_str).unwrap_or("?");

                tracing::warn!(
                    provider,
                    model,
                    reason = err.reason(),
                    "dropping model: {}",
                    err
                );
                out.dropped += 1;
            }
        }
    }

    out
}

/// The single hard failure of the pipeline: a catalog needs at least one
/// provider and one model.
pub fn ensure_viable(providers: &[Provider], models: &[Model]) -> Result<(), Error> {
    if providers.is_empty() || models.is_empty() {
        return Err(Error::EmptyCatalog);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn model_reasons() {
        let v = SerdeValidator;

        let cases = [
            (json!({"provider": "p"}), "missing_id"),
            (json!({"id": "m"}), "missing_provider"),
            (json!({"id": "", "provider": "p"}), "invalid_id"),
            (json!({"id": "has space", "provider": "p"}), "invalid_id"),
            (json!({"id": 7, "provider": "p"}), "invalid_id"),
            (json!({"id": "m", "provider": "bad provider"}), "invalid_model"),
            (json!({"id": "m", "provider": "p", "limits": {"context": -1}}), "invalid_model"),
        ];

        for (input, reason) in cases {
            let err = v.validate_model(&record(input.clone())).unwrap_err();
            assert_eq!(err.reason(), reason, "{input}");
        }
    }

    #[test]
    fn provider_urls_are_checked() {
        let v = SerdeValidator;

        assert!(v
            .validate_provider(&record(json!({"id": "p", "base_url": "https://api.example.com/v1"})))
            .is_ok());

        let err = v
            .validate_provider(&record(json!({"id": "p", "base_url": "not a url"})))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid_provider");
    }

    #[test]
    fn batch_drops_and_counts() {
        let result = validate_models(
            &SerdeValidator,
            vec![
                record(json!({"id": "a", "provider": "p"})),
                record(json!({"provider": "p"})),
                record(json!({"id": "b", "provider": "p"})),
            ],
        );

        assert_eq!(result.dropped, 1);
        let ids: Vec<&str> = result.valid.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn viability() {
        let provider: Provider = serde_json::from_value(json!({"id": "p"})).unwrap();
        let model: Model = serde_json::from_value(json!({"id": "m", "provider": "p"})).unwrap();

        assert_eq!(ensure_viable(&[], &[model.clone()]), Err(Error::EmptyCatalog));
        assert_eq!(ensure_viable(&[provider.clone()], &[]), Err(Error::EmptyCatalog));
        assert!(ensure_viable(&[provider], &[model]).is_ok());
    }
}
