//! Externally authored episodes: a JSON file describing one event, turned
//! into a [`NewEpisode`] for the memory log.
//!
//! Required keys: `event_type`, `source`, `summary`, `content`. Optional:
//! `event_tags` and `payload_tags` (lists) and `type`. Payload-level tags
//! stay inside the payload; event-level tags go on the episode itself.

use std::path::Path;

use serde_json::{Map, Value};

use ms_types::memory::{value_to_text, NewEpisode};

use crate::error::{Error, Result};

const REQUIRED_KEYS: [&str; 4] = ["event_type", "source", "summary", "content"];

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeUpload {
    pub event_type: String,
    pub source: String,
    pub summary: String,
    pub content: Value,
    pub event_tags: Vec<String>,
    pub payload_tags: Vec<String>,
    /// Optional free-form `type` carried into the payload.
    pub kind: Option<Value>,
}

impl EpisodeUpload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let Value::Object(mut map) = serde_json::from_str::<Value>(json)? else {
            return Err(Error::InvalidEpisode(
                "Episode JSON must be an object".into(),
            ));
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidEpisode(format!(
                "Episode JSON missing required keys: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            event_type: required_string(&map, "event_type")?,
            source: required_string(&map, "source")?,
            summary: value_to_text(&map["summary"]),
            event_tags: tag_list(&map, "event_tags")?,
            payload_tags: tag_list(&map, "payload_tags")?,
            kind: map.remove("type"),
            content: map.remove("content").unwrap_or(Value::Null),
        })
    }

    pub fn into_new_episode(self) -> NewEpisode {
        let mut payload = Map::new();
        payload.insert("summary".into(), Value::String(self.summary.clone()));
        payload.insert("content".into(), self.content);
        payload.insert(
            "tags".into(),
            Value::Array(self.payload_tags.into_iter().map(Value::String).collect()),
        );
        if let Some(kind) = self.kind {
            payload.insert("type".into(), kind);
        }

        NewEpisode::new(self.event_type, self.summary)
            .with_source(self.source)
            .with_payload(payload)
            .with_tags(self.event_tags)
    }
}

fn required_string(map: &Map<String, Value>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::InvalidEpisode(format!("'{key}' must be a string."))),
    }
}

fn tag_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().map(value_to_text).collect()),
        Some(_) => Err(Error::InvalidEpisode(format!("'{key}' must be a list."))),
    }
}
