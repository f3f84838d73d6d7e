use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Status given to every question when it is first recorded.
pub const QUESTION_STATUS_OPEN: &str = "open";

/// Something the agent experienced or was told. Never rewritten after append.
///
/// Episodes can be written by producers other than this crate, so everything
/// except `payload` and `tags` is optional when a line is read back, and a
/// non-string `summary` is kept as its JSON text. The timestamp is kept as
/// stored, whatever its format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl Episode {
    /// Tags carried inside the payload (`payload.tags`), if it holds a list.
    pub fn payload_tags(&self) -> Vec<String> {
        match self.payload.get("tags") {
            Some(Value::Array(items)) => items.iter().map(value_to_text).collect(),
            _ => Vec::new(),
        }
    }
}

/// An episode that has not been appended yet. The memory log assigns the
/// identifier and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub source: String,
    pub event_type: String,
    pub summary: String,
    pub payload: Map<String, Value>,
    pub tags: Vec<String>,
}

impl NewEpisode {
    pub fn new(event_type: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            source: "system".to_string(),
            event_type: event_type.into(),
            summary: summary.into(),
            payload: Map::new(),
            tags: vec![],
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// The model's narrative over one window of episodes.
///
/// Lines written before records carried identifiers still load: `id` is
/// optional on read and the timestamp is kept as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "required_text")]
    pub text: String,
    /// Episodes that were in context when this reflection was produced.
    #[serde(default, deserialize_with = "null_as_default")]
    pub linked_episodes: Vec<String>,
}

impl Reflection {
    pub fn new(text: impl Into<String>, linked_episodes: Vec<String>) -> Self {
        Self {
            id: Some(new_id()),
            timestamp: Some(now_timestamp()),
            text: text.into(),
            linked_episodes,
        }
    }
}

/// An open-ended question raised during a reflection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "required_text")]
    pub text: String,
    #[serde(default)]
    pub context_episode_id: Option<String>,
    #[serde(default = "open_status")]
    pub status: String,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        context_episode_id: Option<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(new_id()),
            timestamp: Some(now_timestamp()),
            text: text.into(),
            context_episode_id,
            status: status.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == QUESTION_STATUS_OPEN
    }
}

/// Fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time in the stored form, RFC 3339 in UTC.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn open_status() -> String {
    QUESTION_STATUS_OPEN.to_string()
}

/// Render a JSON value as text: strings verbatim, anything else as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_to_text(&value)),
    })
}

fn required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(&Value::deserialize(deserializer)?))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
