//! Reflection cycle: reads the persona and recent memory, asks the model to
//! reflect, and appends the reflection and its questions to the memory log.
//!
//! A response that ignores the JSON format still yields a reflection: the raw
//! text becomes the body and no questions are recorded. Only configuration,
//! transport and persistence problems fail a cycle.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use ms_types::memory::{value_to_text, Question, Reflection, QUESTION_STATUS_OPEN};

use crate::config::ConfigStore;
use crate::error::Result;
use crate::llm::TextGenerator;
use crate::memory::MemoryLog;
use crate::prompt;

/// Most recent episodes placed in context.
pub const EPISODE_WINDOW: usize = 20;
/// Most recent prior reflections placed in context.
pub const REFLECTION_WINDOW: usize = 5;

/// Records appended by one cycle, in creation order.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub reflection: Reflection,
    pub questions: Vec<Question>,
}

/// The model's answer after fence stripping and fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub reflection_text: String,
    /// Parsed but not persisted.
    pub insights: Vec<String>,
    pub questions: Vec<String>,
}

/// Run one reflection cycle. Calls the generator exactly once.
pub async fn run_cycle(
    config: &ConfigStore,
    memory: &MemoryLog,
    llm: &dyn TextGenerator,
) -> Result<CycleOutcome> {
    info!("Starting reflection cycle");

    // 1. Persona and guiding document
    let seed = config.load_persona()?;
    let guiding_text = config.load_guiding_text()?;

    // 2. Context windows, oldest first
    let episodes = memory.recent_episodes(EPISODE_WINDOW)?;
    let reflections = memory.recent_reflections(REFLECTION_WINDOW)?;
    info!(
        "Reflecting over {} episodes and {} prior reflections",
        episodes.len(),
        reflections.len()
    );

    // 3. Prompts
    let system_prompt = prompt::build_system_prompt(&seed, guiding_text.as_deref());
    let user_prompt = prompt::build_context_prompt(&episodes, &reflections);

    // 4. Generate
    let response = llm.generate(&system_prompt, &user_prompt).await?;

    // 5. Parse
    let parsed = parse_response(&response);
    debug!(
        "Parsed {} insights and {} questions",
        parsed.insights.len(),
        parsed.questions.len()
    );

    // 6. Persist. Every question points at the newest episode in the window.
    let linked_episodes: Vec<String> = episodes.iter().filter_map(|e| e.id.clone()).collect();
    let context_episode_id = episodes.last().and_then(|e| e.id.clone());

    let reflection = memory.append_reflection(&parsed.reflection_text, linked_episodes)?;

    let mut questions = Vec::with_capacity(parsed.questions.len());
    for text in &parsed.questions {
        let question =
            memory.append_question(text, context_episode_id.clone(), QUESTION_STATUS_OPEN)?;
        questions.push(question);
    }

    info!(
        "Reflection cycle complete: reflection {} with {} questions",
        reflection.id.as_deref().unwrap_or_default(),
        questions.len()
    );
    Ok(CycleOutcome {
        reflection,
        questions,
    })
}

/// Parse the model's response, falling back to the raw text as the
/// reflection body when it is not a JSON object.
pub fn parse_response(raw: &str) -> ParsedResponse {
    match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(map)) => from_object(map),
        Ok(other) => {
            warn!("LLM response is JSON but not an object ({}); using raw text", kind_of(&other));
            fallback(raw)
        }
        Err(e) => {
            warn!("LLM response is not valid JSON ({e}); using raw text");
            fallback(raw)
        }
    }
}

fn from_object(map: Map<String, Value>) -> ParsedResponse {
    let insights = string_list(map.get("insights"));
    let questions = string_list(map.get("questions"));
    let reflection_text = match map.get("reflection_text") {
        Some(Value::Null) | None => Value::Object(map).to_string(),
        Some(value) => value_to_text(value),
    };

    ParsedResponse {
        reflection_text,
        insights,
        questions,
    }
}

fn fallback(raw: &str) -> ParsedResponse {
    ParsedResponse {
        reflection_text: raw.to_string(),
        insights: Vec::new(),
        questions: Vec::new(),
    }
}

/// A list field as strings. A lone string counts as a one-item list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(value_to_text)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Remove a surrounding markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
