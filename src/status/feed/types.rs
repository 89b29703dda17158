use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusPayload {
    #[serde(default)]
    pub services: Vec<RawService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawService {
    #[serde(default, deserialize_with = "text_or_absent")]
    pub service_name: Option<String>,
    #[serde(default, alias = "url", deserialize_with = "text_or_absent")]
    pub redirect_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub status_type: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub event_status: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub date_posted: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub epoch_start_date: Option<i64>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "text_or_absent")]
    pub users_affected: Option<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub affected_services: Vec<String>,
}

/// Upstream ids show up both quoted and bare.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        Some(serde_json::Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// Free-text fields: anything other than a string counts as absent.
fn text_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        _ => None,
    })
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        Some(serde_json::Value::String(text)) => vec![text],
        _ => Vec::new(),
    })
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64)),
        Some(serde_json::Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
