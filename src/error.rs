use anyhow::anyhow;
use serde_json::Value;

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorItem {
    #[serde(default)]
    pub(crate) message: Option<Value>,
    #[serde(default)]
    pub(crate) field: Option<Value>,
}

impl ApiErrorItem {
    fn describe(&self) -> Option<String> {
        let message = self.message.as_ref().and_then(text)?;
        let field = match &self.field {
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(text)
                .collect::<Vec<_>>()
                .join("."),
            Some(other) => text(other).unwrap_or_default(),
            None => String::new(),
        };
        if field.is_empty() {
            Some(message)
        } else {
            Some(format!("{}: {}", field, message))
        }
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Collects human-readable lines from an error body, tolerating odd shapes per field.
pub(crate) fn error_lines(body: &Value) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    lines.extend(body.get("message").and_then(text));
    lines.extend(body.get("detail").and_then(text));

    match body.get("errors") {
        // {"errors":[{"message":...,"field":...}]}
        Some(Value::Array(items)) => {
            for item in items {
                match serde_json::from_value::<ApiErrorItem>(item.clone()) {
                    Ok(e) => lines.extend(e.describe()),
                    Err(_) => lines.extend(text(item)),
                }
            }
        }
        // {"errors":{"aoi":["is invalid"]}}
        Some(Value::Object(fields)) => {
            for (field, messages) in fields {
                match messages {
                    Value::Array(ms) => {
                        lines.extend(ms.iter().filter_map(text).map(|m| format!("{}: {}", field, m)))
                    }
                    other => lines.extend(text(other).map(|m| format!("{}: {}", field, m))),
                }
            }
        }
        Some(other) => lines.extend(text(other)),
        None => {}
    }

    if lines.is_empty() && !body.is_null() {
        lines.push(body.to_string());
    }
    lines
}

pub(crate) fn format_api_error(status: u16, url: &str, body: &Value) -> anyhow::Error {
    let lines = error_lines(body);

    if status == 401 || status == 403 {
        return anyhow!(
            "EarthCache authentication failed (HTTP {}).\n- Check that key.txt holds a valid API key with no surrounding text\n\nServer message: {}\nrequest: {}",
            status,
            lines.join("\n"),
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}",
        status,
        url,
        lines.join("\n")
    )
}
