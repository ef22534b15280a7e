use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub use crate::extract::ScrapeResult;

/// Body of `POST /api/scrape-url`.
///
/// `url` is `None` when the field is absent or falsy (`null`, `false`, `0`,
/// `""`). A truthy non-string value is kept as its JSON text so it later
/// fails URL parsing instead of being treated as missing.
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub url: Option<String>,
}

fn falsy_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    })
}
