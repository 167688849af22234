//! Request bodies as seen by save detection.

use std::borrow::Cow;

use serde_json::Value;

/// Decoded body of an observed request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestPayload {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` pairs, in order.
    Form(Vec<(String, String)>),
    Json(Value),
    Text(String),
}

impl RequestPayload {
    /// Decode `body` using the declared content type, sniffing when absent.
    pub fn parse(content_type: Option<&str>, body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::Empty;
        }
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

        let looks_json = matches!(body.trim_start().as_bytes().first(), Some(b'{' | b'['));
        if (content_type.contains("json") || (content_type.is_empty() && looks_json))
            && let Ok(value) = serde_json::from_str(body)
        {
            return Self::Json(value);
        }

        let looks_form = !body.contains(char::is_whitespace) && body.contains('=');
        if content_type.contains("x-www-form-urlencoded") || (content_type.is_empty() && looks_form) {
            let pairs = url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            return Self::Form(pairs);
        }

        Self::Text(body.to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Form(pairs) => pairs.is_empty(),
            Self::Json(value) => value.is_null(),
            Self::Text(text) => text.is_empty(),
        }
    }

    /// Top-level field by name. Form fields win on first occurrence.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match self {
            Self::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| Cow::Borrowed(v.as_str())),
            Self::Json(Value::Object(map)) => map.get(name).map(|value| match value {
                Value::String(s) => Cow::Borrowed(s.as_str()),
                other => Cow::Owned(other.to_string()),
            }),
            _ => None,
        }
    }
}
