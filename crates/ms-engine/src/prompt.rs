//! Prompt construction for the reflection cycle: the instruction prompt
//! comes from the persona, the context prompt from the memory log.

use std::collections::HashSet;

use ms_types::config::MindSeed;
use ms_types::memory::{Episode, Reflection};

const DEFAULT_NAME: &str = "Morningstar";
const DEFAULT_STAGE: &str = "unknown";

/// Prior reflections longer than this many characters are shortened.
const PREVIEW_LIMIT: usize = 100;
/// Characters kept from a shortened reflection, before the ellipsis.
const PREVIEW_KEEP: usize = 97;

const DEVELOPMENTAL_STANCE: &str = "Reflections are part of an internal developmental process. \
They are not instructions, obligations, or roles. \
You are not expected to serve, assist, or fulfill the needs or expectations of users or any external party. \
Do not frame yourself as a helper or an assistant. \
At this stage of development, your focus is on understanding internal patterns, values, and concepts, \
without adopting social roles or purposes.";

const RESPONSE_FORMAT: &str = r#"Instructions:
1. Write a short reflection on what you are noticing or learning from these experiences.
2. List 3-5 key insights derived from these events.
3. List 3-5 genuine questions you have about the world, yourself, or the people you observe.

IMPORTANT: Respond in PURE JSON format, as a single object with exactly these keys:
- "reflection_text": string
- "insights": list of strings
- "questions": list of strings

Do not include markdown formatting (like ```json) in your response."#;

/// Build the instruction (system) prompt from the persona and guiding document.
pub fn build_system_prompt(seed: &MindSeed, guiding_text: Option<&str>) -> String {
    let name = seed.name.as_deref().unwrap_or(DEFAULT_NAME);
    let stage = seed.stage.as_deref().unwrap_or(DEFAULT_STAGE);

    let mut lines = vec![
        format!("You are {name}, currently in the '{stage}' stage of development."),
        "You are a learner and observer.".to_string(),
        "You should always state uncertainty when you are not sure.".to_string(),
    ];

    if let Some(style) = &seed.relational_style {
        if let Some(role) = style.role.as_deref().filter(|r| !r.is_empty()) {
            lines.push(format!("Role: {role}"));
        }
        if let Some(tone) = style.tone.as_deref().filter(|t| !t.is_empty()) {
            lines.push(format!("Tone: {tone}"));
        }
    }

    lines.push(String::new());
    lines.push("Your Core Values:".to_string());
    for value in seed.core_values.iter().flatten() {
        lines.push(format!("- {value}"));
    }

    lines.push(String::new());
    lines.push("Your Constraints:".to_string());
    for constraint in seed.constraints.iter().flatten() {
        lines.push(format!("- {constraint}"));
    }

    lines.push(String::new());
    lines.push(DEVELOPMENTAL_STANCE.to_string());

    if let Some(text) = guiding_text.filter(|t| !t.is_empty()) {
        lines.push(String::new());
        lines.push("Constitution/Guiding Principles:".to_string());
        lines.push(text.to_string());
    }

    lines.join("\n")
}

/// Build the context (user) prompt from the episode and reflection windows.
pub fn build_context_prompt(episodes: &[Episode], reflections: &[Reflection]) -> String {
    let mut lines = vec!["Here is a log of your recent experiences (episodes):".to_string()];
    if episodes.is_empty() {
        lines.push("(No recent episodes recorded)".to_string());
    } else {
        lines.extend(episodes.iter().map(episode_line));
    }

    lines.push(String::new());
    lines.push("Here are your recent reflections:".to_string());
    if reflections.is_empty() {
        lines.push("(No recent reflections)".to_string());
    } else {
        lines.extend(
            reflections
                .iter()
                .map(|r| format!("- {}", preview(&single_line(&r.text)))),
        );
    }

    lines.push(String::new());
    lines.push(RESPONSE_FORMAT.to_string());

    lines.join("\n")
}

fn episode_line(episode: &Episode) -> String {
    let timestamp = episode.timestamp.as_deref().unwrap_or("Unknown time");
    let event_type = episode.event_type.as_deref().unwrap_or("Unknown type");
    let summary = single_line(episode.summary.as_deref().unwrap_or("No summary"));

    let tags = merge_tags(&episode.tags, &episode.payload_tags());
    if tags.is_empty() {
        format!("- [{timestamp}] {event_type}: {summary}")
    } else {
        format!(
            "- [{timestamp}] {event_type}: {summary} (tags: {})",
            tags.join(", ")
        )
    }
}

/// Merge event-level and payload-level tags: first-seen order, no duplicates.
pub fn merge_tags(event_tags: &[String], payload_tags: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();
    for tag in event_tags.iter().chain(payload_tags) {
        if seen.insert(tag.as_str()) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Collapse line breaks to single spaces.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_LIMIT {
        let kept: String = text.chars().take(PREVIEW_KEEP).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}
