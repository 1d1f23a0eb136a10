use anyhow::{Result, bail};
use serde_json::{Map, Value};

/// A request body assembled from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// JSON object to send.
    pub body: Value,
    /// Override keys that were dropped because the template has no such field.
    pub ignored: Vec<String>,
}

impl Payload {
    /// Builds a fresh body from `template`.
    ///
    /// `fixed` values are always written. `overrides` only replace keys the
    /// template already has, or keys listed in `extra_keys`; null overrides are
    /// skipped. The template itself is never modified.
    pub fn assemble(
        template: &Map<String, Value>,
        fixed: Vec<(&str, Value)>,
        overrides: &Map<String, Value>,
        extra_keys: &[&str],
    ) -> Result<Self> {
        let mut body = template.clone();
        for (key, value) in fixed {
            if key.is_empty() {
                bail!("payload field name must not be empty");
            }
            body.insert(key.to_string(), value);
        }

        let mut ignored = Vec::new();
        for (key, value) in overrides {
            if value.is_null() {
                continue;
            }
            if body.contains_key(key) || extra_keys.contains(&key.as_str()) {
                body.insert(key.clone(), value.clone());
            } else {
                ignored.push(key.clone());
            }
        }

        if !ignored.is_empty() {
            tracing::warn!(
                keys = ?ignored,
                "ignoring request fields not present in the template"
            );
        }

        Ok(Self {
            body: Value::Object(body),
            ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn overrides_replace_only_template_keys() {
        let template = map(json!({"resolution": ["low"], "coverage": 50, "location": null}));
        let overrides = map(json!({"coverage": 80, "cloud_cover": 10}));

        let p = Payload::assemble(
            &template,
            vec![("location", json!({"type": "Polygon"}))],
            &overrides,
            &[],
        )
        .unwrap();

        assert_eq!(
            p.body,
            json!({"resolution": ["low"], "coverage": 80, "location": {"type": "Polygon"}})
        );
        assert_eq!(p.ignored, vec!["cloud_cover".to_string()]);
    }

    #[test]
    fn never_adds_keys_absent_from_template() {
        let template = map(json!({"a": 1, "b": 2}));
        let overrides = map(json!({"c": 3, "d": 4, "a": 9}));

        let p = Payload::assemble(&template, vec![], &overrides, &[]).unwrap();
        let keys: Vec<&String> = p.body.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(p.body["a"], 9);
        assert_eq!(p.body["b"], 2);
    }

    #[test]
    fn template_is_not_mutated_between_calls() {
        let template = map(json!({"name": "default", "start_date": "x"}));

        let first = Payload::assemble(
            &template,
            vec![("start_date", json!("2024-01-01"))],
            &map(json!({"name": "first"})),
            &[],
        )
        .unwrap();
        let second = Payload::assemble(&template, vec![], &Map::new(), &[]).unwrap();

        assert_eq!(first.body["name"], "first");
        assert_eq!(second.body["name"], "default");
        assert_eq!(second.body["start_date"], "x");
        assert_eq!(template["name"], "default");
    }

    #[test]
    fn extra_keys_and_null_overrides() {
        let template = map(json!({"name": "p"}));
        let overrides = map(json!({"search_id": "s-1", "name": null}));

        let p = Payload::assemble(&template, vec![], &overrides, &["search_id"]).unwrap();
        assert_eq!(p.body, json!({"name": "p", "search_id": "s-1"}));
        assert!(p.ignored.is_empty());
    }
}
