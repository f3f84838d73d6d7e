//! Memory log — three append-only JSONL files under the memory directory.
//!
//! Each record is one line written with a single `write_all`. Reads take the
//! last `limit` well-formed records in file order; blank and malformed lines
//! are skipped rather than failing the read.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use ms_types::memory::{new_id, now_timestamp, Episode, NewEpisode, Question, Reflection};

use crate::config;
use crate::error::Result;

pub const EPISODES_FILE: &str = "episodes.jsonl";
pub const REFLECTIONS_FILE: &str = "reflections.jsonl";
pub const QUESTIONS_FILE: &str = "questions.jsonl";

#[derive(Debug, Clone)]
pub struct MemoryLog {
    dir: PathBuf,
}

impl MemoryLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(config::memory_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn episodes_path(&self) -> PathBuf {
        self.dir.join(EPISODES_FILE)
    }

    pub fn reflections_path(&self) -> PathBuf {
        self.dir.join(REFLECTIONS_FILE)
    }

    pub fn questions_path(&self) -> PathBuf {
        self.dir.join(QUESTIONS_FILE)
    }

    // --- Episodes ---

    /// Append an episode, assigning its identifier and timestamp.
    pub fn append_episode(&self, new: NewEpisode) -> Result<Episode> {
        let episode = Episode {
            id: Some(new_id()),
            timestamp: Some(now_timestamp()),
            source: Some(new.source),
            event_type: Some(new.event_type),
            summary: Some(new.summary),
            payload: new.payload,
            tags: new.tags,
        };
        append_line(&self.episodes_path(), &episode)?;
        debug!(
            "Appended episode {} ({})",
            episode.id.as_deref().unwrap_or_default(),
            episode.event_type.as_deref().unwrap_or_default()
        );
        Ok(episode)
    }

    pub fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        read_last(&self.episodes_path(), limit)
    }

    // --- Reflections ---

    pub fn append_reflection(&self, text: &str, linked_episodes: Vec<String>) -> Result<Reflection> {
        let reflection = Reflection::new(text, linked_episodes);
        append_line(&self.reflections_path(), &reflection)?;
        debug!(
            "Appended reflection {} linked to {} episodes",
            reflection.id.as_deref().unwrap_or_default(),
            reflection.linked_episodes.len()
        );
        Ok(reflection)
    }

    pub fn recent_reflections(&self, limit: usize) -> Result<Vec<Reflection>> {
        read_last(&self.reflections_path(), limit)
    }

    // --- Questions ---

    pub fn append_question(
        &self,
        text: &str,
        context_episode_id: Option<String>,
        status: &str,
    ) -> Result<Question> {
        let question = Question::new(text, context_episode_id, status);
        append_line(&self.questions_path(), &question)?;
        debug!(
            "Appended question {} ({})",
            question.id.as_deref().unwrap_or_default(),
            question.status
        );
        Ok(question)
    }

    pub fn recent_questions(&self, limit: usize) -> Result<Vec<Question>> {
        read_last(&self.questions_path(), limit)
    }
}

fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

fn read_last<T: DeserializeOwned>(path: &Path, limit: usize) -> Result<Vec<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records: Vec<T> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping malformed line {} in {}: {}", idx + 1, path.display(), e);
                None
            }
        })
        .collect();

    let skip = records.len().saturating_sub(limit);
    Ok(records.split_off(skip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_types::memory::QUESTION_STATUS_OPEN;

    fn log() -> (tempfile::TempDir, MemoryLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::new(dir.path().join("memory"));
        (dir, log)
    }

    #[test]
    fn missing_files_read_empty() {
        let (_dir, log) = log();
        assert!(log.recent_episodes(20).unwrap().is_empty());
        assert!(log.recent_reflections(5).unwrap().is_empty());
        assert!(log.recent_questions(5).unwrap().is_empty());
    }

    #[test]
    fn append_episode_assigns_unique_ids() {
        let (_dir, log) = log();
        let a = log.append_episode(NewEpisode::new("note", "first")).unwrap();
        let b = log.append_episode(NewEpisode::new("note", "second")).unwrap();
        assert!(a.id.is_some());
        assert_ne!(a.id, b.id);
        assert!(a.timestamp.is_some());
        assert_eq!(a.source.as_deref(), Some("system"));
    }

    #[test]
    fn recent_returns_last_k_in_order() {
        let (_dir, log) = log();
        for i in 0..7 {
            log.append_reflection(&format!("reflection {i}"), vec![]).unwrap();
        }

        let recent = log.recent_reflections(3).unwrap();
        let texts: Vec<_> = recent.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["reflection 4", "reflection 5", "reflection 6"]);

        assert_eq!(log.recent_reflections(7).unwrap().len(), 7);
        assert_eq!(log.recent_reflections(50).unwrap().len(), 7);
        assert!(log.recent_reflections(0).unwrap().is_empty());
    }

    #[test]
    fn reads_are_idempotent() {
        let (_dir, log) = log();
        for i in 0..4 {
            log.append_episode(NewEpisode::new("note", format!("ep {i}")))
                .unwrap();
        }
        let first = log.recent_episodes(3).unwrap();
        let second = log.recent_episodes(3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (_dir, log) = log();
        log.append_episode(NewEpisode::new("note", "good one")).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(log.episodes_path())
                .unwrap();
            file.write_all(b"{ this is not json\n\n   \n").unwrap();
        }
        log.append_episode(NewEpisode::new("note", "good two")).unwrap();

        let episodes = log.recent_episodes(20).unwrap();
        let summaries: Vec<_> = episodes
            .iter()
            .map(|e| e.summary.as_deref().unwrap())
            .collect();
        assert_eq!(summaries, vec!["good one", "good two"]);
    }

    #[test]
    fn each_record_is_one_line() {
        let (_dir, log) = log();
        log.append_episode(NewEpisode::new("note", "multi\nline\nsummary"))
            .unwrap();
        log.append_question("Why?", None, QUESTION_STATUS_OPEN).unwrap();

        let episodes = std::fs::read_to_string(log.episodes_path()).unwrap();
        assert_eq!(episodes.lines().count(), 1);
        let questions = std::fs::read_to_string(log.questions_path()).unwrap();
        assert_eq!(questions.lines().count(), 1);
    }

    #[test]
    fn question_roundtrip_keeps_context_and_status() {
        let (_dir, log) = log();
        let saved = log
            .append_question("What is rain?", Some("ep3".into()), QUESTION_STATUS_OPEN)
            .unwrap();
        log.append_question("Why is the sky blue?", None, "answered")
            .unwrap();

        let questions = log.recent_questions(10).unwrap();
        assert_eq!(questions[0], saved);
        assert_eq!(questions[0].context_episode_id.as_deref(), Some("ep3"));
        assert!(questions[0].is_open());
        assert_eq!(questions[1].status, "answered");
        assert_eq!(questions[1].context_episode_id, None);
    }

    #[test]
    fn hand_written_episode_lines_are_read() {
        let (_dir, log) = log();
        std::fs::create_dir_all(log.dir()).unwrap();
        std::fs::write(
            log.episodes_path(),
            "{\"id\": \"ep1\", \"event_type\": \"upload\", \"summary\": [1, 2]}\n",
        )
        .unwrap();
        let episodes = log.recent_episodes(5).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id.as_deref(), Some("ep1"));
        assert_eq!(episodes[0].summary.as_deref(), Some("[1,2]"));
    }

    #[test]
    fn records_without_ids_are_read() {
        let (_dir, log) = log();
        std::fs::create_dir_all(log.dir()).unwrap();
        std::fs::write(
            log.reflections_path(),
            "{\"timestamp\":\"2024-01-01T00:00:00+00:00\",\"text\":\"earlier thought\",\"linked_episodes\":[\"ep1\"]}\n",
        )
        .unwrap();
        std::fs::write(
            log.questions_path(),
            "{\"timestamp\":\"2024-01-01T00:00:00+00:00\",\"text\":\"Why?\",\"context_episode_id\":\"ep1\",\"status\":\"open\"}\n",
        )
        .unwrap();

        let reflections = log.recent_reflections(5).unwrap();
        assert_eq!(reflections.len(), 1);
        assert_eq!(reflections[0].id, None);
        assert_eq!(reflections[0].text, "earlier thought");

        let questions = log.recent_questions(5).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].context_episode_id.as_deref(), Some("ep1"));
        assert!(questions[0].is_open());

        // New records still land after the old ones.
        log.append_reflection("new thought", vec![]).unwrap();
        let texts: Vec<_> = log
            .recent_reflections(5)
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["earlier thought", "new thought"]);
    }

    #[test]
    fn naive_episode_timestamp_is_read() {
        let (_dir, log) = log();
        std::fs::create_dir_all(log.dir()).unwrap();
        std::fs::write(
            log.episodes_path(),
            "{\"id\":\"ep9\",\"timestamp\":\"2024-01-01T00:00:00\",\"event_type\":\"note\",\"summary\":\"naive ts\"}\n",
        )
        .unwrap();

        let episodes = log.recent_episodes(20).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id.as_deref(), Some("ep9"));
        assert_eq!(episodes[0].timestamp.as_deref(), Some("2024-01-01T00:00:00"));
    }
}
