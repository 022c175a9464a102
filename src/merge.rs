//! Precedence-aware merging of layered records.
//!
//! Layers are folded left to right: the accumulated result is the *base* and
//! each new layer is the *override*. Records are untyped JSON objects at this
//! point so that nested structures merge field by field no matter how sparse a
//! layer is.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::Error;
use crate::filter::{compile_patterns, PatternMap};

pub type Record = Map<String, Value>;

/// Which operand wins a conflict between two non-mergeable values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precedence {
    /// The override wins. This is how layers are folded.
    #[default]
    Override,
    /// The base wins; the override only fills gaps.
    Base,
}

/// Field-specific list handling on top of the plain structural merge.
#[derive(Debug, Clone)]
pub struct MergePolicy {
    /// List fields whose values are unioned, base order first.
    pub union_keys: &'static [&'static str],
    /// List fields where an empty override keeps the base list.
    pub keep_on_empty: &'static [&'static str],
    pub precedence: Precedence,
}

impl MergePolicy {
    /// The policy used when folding catalog layers.
    pub const CATALOG: MergePolicy = MergePolicy {
        union_keys: &["aliases", "tags"],
        keep_on_empty: &["exclude_models"],
        precedence: Precedence::Override,
    };

    pub fn with_precedence(mut self, precedence: Precedence) -> MergePolicy {
        self.precedence = precedence;
        self
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::CATALOG
    }
}

/// Structurally merges `over` into `base`.
///
/// Objects merge key by key, recursively. A `null` override never erases a
/// base value. Every other conflict is settled by the policy.
pub fn merge(base: &Value, over: &Value, policy: &MergePolicy) -> Value {
    merge_value(None, base, over, policy)
}

pub fn merge_records(base: &Record, over: &Record, policy: &MergePolicy) -> Record {
    let mut out = base.clone();

    for (key, over_value) in over {
        let merged = match base.get(key) {
            Some(base_value) => merge_value(Some(key), base_value, over_value, policy),
            None => over_value.clone(),
        };

        out.insert(key.clone(), merged);
    }

    out
}

fn merge_value(key: Option<&str>, base: &Value, over: &Value, policy: &MergePolicy) -> Value {
    match (base, over) {
        (_, Value::Null) => base.clone(),
        (Value::Null, _) => over.clone(),
        (Value::Object(base), Value::Object(over)) => {
            Value::Object(merge_records(base, over, policy))
        }
        (Value::Array(base_items), Value::Array(over_items)) => {
            let key = key.unwrap_or_default();

            if policy.union_keys.iter().any(|k| *k == key) {
                Value::Array(union(base_items, over_items))
            } else if policy.keep_on_empty.iter().any(|k| *k == key) && over_items.is_empty() {
                base.clone()
            } else {
                pick(base, over, policy)
            }
        }
        _ => pick(base, over, policy),
    }
}

fn pick(base: &Value, over: &Value, policy: &MergePolicy) -> Value {
    match policy.precedence {
        Precedence::Override => over.clone(),
        Precedence::Base => base.clone(),
    }
}

fn union(base: &[Value], over: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(base.len() + over.len());

    for value in base.iter().chain(over) {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }

    out
}

/// Joins two record lists on a key. The result keeps base order; base records
/// with a counterpart in `over` are combined in place, and override-only
/// records are appended in their original order. Records for which `key_of`
/// returns `None` cannot be joined and are passed through.
fn join_by<K, F, C>(base: Vec<Record>, over: Vec<Record>, key_of: F, mut combine: C) -> Vec<Record>
where
    K: Eq + std::hash::Hash,
    F: Fn(&Record) -> Option<K>,
    C: FnMut(&Record, &Record) -> Record,
{
    let mut over_index: HashMap<K, usize> = HashMap::new();
    let mut over_slots: Vec<Option<Record>> = Vec::with_capacity(over.len());
    let mut unkeyed = Vec::new();

    for record in over {
        match key_of(&record) {
            Some(key) => {
                // A key repeated within one layer: the later record wins.
                if let Some(&slot) = over_index.get(&key) {
                    over_slots[slot] = Some(record);
                } else {
                    over_index.insert(key, over_slots.len());
                    over_slots.push(Some(record));
                }
            }
            None => unkeyed.push(record),
        }
    }

    let mut out = Vec::with_capacity(base.len() + over_slots.len());

    for record in base {
        let taken = key_of(&record)
            .and_then(|key| over_index.get(&key).copied())
            .and_then(|slot| over_slots[slot].take());

        match taken {
            Some(over) => out.push(combine(&record, &over)),
            None => out.push(record),
        }
    }

    out.extend(over_slots.into_iter().flatten());
    out.extend(unkeyed);

    out
}

fn string_field<'r>(record: &'r Record, field: &str) -> Option<&'r str> {
    record.get(field).and_then(Value::as_str)
}

/// Ordered merge where overriding items replace base items wholesale.
pub fn merge_list_by_id(base: Vec<Record>, over: Vec<Record>, id_key: &str) -> Vec<Record> {
    join_by(
        base,
        over,
        |record| string_field(record, id_key).map(str::to_string),
        |_, over| over.clone(),
    )
}

/// Outer join of provider records by `id`, merging conflicts structurally.
pub fn merge_providers(base: Vec<Record>, over: Vec<Record>, policy: &MergePolicy) -> Vec<Record> {
    join_by(
        base,
        over,
        |record| string_field(record, "id").map(str::to_string),
        |base, over| merge_records(base, over, policy),
    )
}

/// Outer join of model records by `(provider, id)`, merging conflicts
/// structurally, then dropping every model an exclude pattern matches.
pub fn merge_models(
    base: Vec<Record>,
    over: Vec<Record>,
    excludes: &PatternMap,
    policy: &MergePolicy,
) -> Vec<Record> {
    let merged = join_by(base, over, model_key, |base, over| {
        merge_records(base, over, policy)
    });

    if excludes.is_empty() {
        return merged;
    }

    merged
        .into_iter()
        .filter(|record| !is_excluded(record, excludes))
        .collect()
}

fn model_key(record: &Record) -> Option<(String, String)> {
    let provider = string_field(record, "provider")?;
    let id = string_field(record, "id")?;

    Some((provider.to_string(), id.to_string()))
}

fn is_excluded(record: &Record, excludes: &PatternMap) -> bool {
    let (Some(provider), Some(id)) = (string_field(record, "provider"), string_field(record, "id"))
    else {
        return false;
    };

    excludes
        .get(provider)
        .is_some_and(|patterns| patterns.iter().any(|p| p.matches(id)))
}

/// Compiles exclude lists of the form provider → patterns.
pub fn compile_excludes(raw: &BTreeMap<String, Vec<String>>) -> Result<PatternMap, Error> {
    compile_patterns(raw)
}

/// Collects the `exclude_models` lists carried by provider records.
pub fn provider_excludes(providers: &[Record]) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for provider in providers {
        let Some(id) = string_field(provider, "id") else {
            continue;
        };

        let Some(Value::Array(patterns)) = provider.get("exclude_models") else {
            continue;
        };

        let patterns = patterns.iter().filter_map(Value::as_str).map(str::to_string);

        out.entry(id.to_string()).or_default().extend(patterns);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn records(values: Value) -> Vec<Record> {
        match values {
            Value::Array(items) => items.into_iter().map(record).collect(),
            other => panic!("not an array: {other}"),
        }
    }

    fn excludes(entries: &[(&str, Vec<&str>)]) -> PatternMap {
        let raw = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect();

        compile_excludes(&raw).unwrap()
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let merged = merge(
            &json!({"limits": {"context": 8192, "output": 4096}, "name": "A"}),
            &json!({"limits": {"context": 128000}, "name": "B"}),
            &MergePolicy::CATALOG,
        );

        assert_eq!(
            merged,
            json!({"limits": {"context": 128000, "output": 4096}, "name": "B"})
        );
    }

    #[test]
    fn list_policies() {
        let merged = merge(
            &json!({"aliases": ["a", "b"], "exclude_models": ["x*"], "env": ["OLD"]}),
            &json!({"aliases": ["b", "c"], "exclude_models": [], "env": ["NEW"]}),
            &MergePolicy::CATALOG,
        );

        assert_eq!(
            merged,
            json!({"aliases": ["a", "b", "c"], "exclude_models": ["x*"], "env": ["NEW"]})
        );
    }

    #[test]
    fn null_never_erases() {
        let merged = merge(&json!({"name": "A"}), &json!({"name": null}), &MergePolicy::CATALOG);

        assert_eq!(merged, json!({"name": "A"}));
    }

    #[test]
    fn base_precedence_only_fills_gaps() {
        let policy = MergePolicy::CATALOG.with_precedence(Precedence::Base);
        let merged = merge(
            &json!({"name": "A", "limits": {"context": 1}}),
            &json!({"name": "B", "doc": "d", "limits": {"context": 2, "output": 3}}),
            &policy,
        );

        assert_eq!(
            merged,
            json!({"name": "A", "doc": "d", "limits": {"context": 1, "output": 3}})
        );
    }

    #[test]
    fn list_by_id_replaces_in_place_and_appends() {
        let merged = merge_list_by_id(
            records(json!([{"id": 1, "v": "a"}, {"id": "x", "v": "a"}, {"id": "y", "v": "a"}])),
            records(json!([{"id": "z", "v": "b"}, {"id": "x", "v": "b"}, {"id": "w", "v": "b"}])),
            "id",
        );

        assert_eq!(
            Value::Array(merged.into_iter().map(Value::Object).collect()),
            json!([
                {"id": 1, "v": "a"},
                {"id": "x", "v": "b"},
                {"id": "y", "v": "a"},
                {"id": "z", "v": "b"},
                {"id": "w", "v": "b"}
            ])
        );
    }

    #[test]
    fn providers_outer_join() {
        let merged = merge_providers(
            records(json!([{"id": "a", "name": "A", "env": ["A_KEY"]}, {"id": "b"}])),
            records(json!([{"id": "a", "name": "A2"}, {"id": "c"}])),
            &MergePolicy::CATALOG,
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], record(json!({"id": "a", "name": "A2", "env": ["A_KEY"]})));
        assert_eq!(merged[2]["id"], json!("c"));
    }

    #[test]
    fn disjoint_models_union() {
        let merged = merge_models(
            records(json!([{"provider": "p", "id": "m1"}])),
            records(json!([{"provider": "p", "id": "m2"}, {"provider": "q", "id": "m1"}])),
            &PatternMap::new(),
            &MergePolicy::CATALOG,
        );

        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn colliding_model_takes_override_scalars_over_base_nesting() {
        let merged = merge_models(
            records(json!([{
                "provider": "p", "id": "m", "name": "Old",
                "limits": {"context": 8192, "output": 1024}
            }])),
            records(json!([{
                "provider": "p", "id": "m", "name": "New",
                "limits": {"output": 2048}
            }])),
            &PatternMap::new(),
            &MergePolicy::CATALOG,
        );

        assert_eq!(
            merged,
            vec![record(json!({
                "provider": "p", "id": "m", "name": "New",
                "limits": {"context": 8192, "output": 2048}
            }))]
        );
    }

    #[test]
    fn excludes_drop_matching_models() {
        let merged = merge_models(
            records(json!([
                {"provider": "openai", "id": "gpt-3"},
                {"provider": "openai", "id": "gpt-5-pro"},
                {"provider": "openai", "id": "gpt-4o-mini"},
                {"provider": "other", "id": "gpt-3"}
            ])),
            Vec::new(),
            &excludes(&[("openai", vec!["gpt-3", "gpt-5-*"])]),
            &MergePolicy::CATALOG,
        );

        let ids: Vec<(String, String)> = merged.iter().filter_map(model_key).collect();
        assert_eq!(
            ids,
            vec![
                ("openai".to_string(), "gpt-4o-mini".to_string()),
                ("other".to_string(), "gpt-3".to_string()),
            ]
        );
    }

    #[test]
    fn unkeyed_records_pass_through() {
        let merged = merge_models(
            records(json!([{"provider": "p", "name": "no id"}])),
            records(json!([{"id": "no provider"}])),
            &PatternMap::new(),
            &MergePolicy::CATALOG,
        );

        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn provider_excludes_are_collected() {
        let collected = provider_excludes(&records(json!([
            {"id": "openai", "exclude_models": ["gpt-3", 4]},
            {"id": "anthropic"}
        ])));

        assert_eq!(collected.len(), 1);
        assert_eq!(collected["openai"], vec!["gpt-3".to_string()]);
    }
}
