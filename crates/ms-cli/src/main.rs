use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ms_engine::episode_upload::EpisodeUpload;
use ms_engine::{config, snapshot, ConfigStore, CycleOutcome, LlmClient, MemoryLog};
use ms_types::memory::NewEpisode;

#[derive(Parser)]
#[command(name = "morningstar", version, about = "Morningstar — reflection cycles over an append-only memory log")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log the boot episode, then run the first reflection
    FirstBreath,
    /// Run one reflection cycle
    Reflect,
    /// Append one episode described by a JSON file
    LogEpisode {
        /// Path to a JSON file describing the episode
        path: PathBuf,
    },
    /// Bundle the project's source and docs into one file for an LLM
    Snapshot {
        /// Project root (defaults to the current directory)
        root: Option<PathBuf>,
    },
    /// Validate the persona and report LLM settings (writes default settings if absent)
    CheckConfig,
    /// Show current status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,hyper_util=warn,hyper=warn,reqwest=warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigStore::open_default();
    let memory = MemoryLog::open_default();

    match cli.command {
        Commands::FirstBreath => {
            memory
                .append_episode(
                    NewEpisode::new(
                        "system_boot",
                        "Morningstar Seed initialized for the first time.",
                    )
                    .with_tags(["first_breath", "boot"]),
                )
                .context("Failed to log boot episode")?;
            let outcome = reflect(&config, &memory)
                .await
                .context("First breath failed")?;
            print_outcome("=== Morningstar First Breath ===", &outcome);
            Ok(())
        }
        Commands::Reflect => {
            let outcome = reflect(&config, &memory).await?;
            print_outcome("=== Morningstar Reflection ===", &outcome);
            Ok(())
        }
        Commands::LogEpisode { path } => log_episode(&memory, &path),
        Commands::Snapshot { root } => {
            let root = match root {
                Some(root) => root,
                None => std::env::current_dir()?,
            };
            let snapshot = snapshot::create_snapshot(&root)
                .with_context(|| format!("Failed to snapshot {}", root.display()))?;
            for file in &snapshot.files {
                println!("  + {}", file.display());
            }
            println!("\nSnapshot created.");
            println!("Upload this file to your LLM: {}", snapshot.path.display());
            Ok(())
        }
        Commands::CheckConfig => check_config(&config),
        Commands::Status => status(&config, &memory),
    }
}

async fn reflect(config: &ConfigStore, memory: &MemoryLog) -> Result<CycleOutcome> {
    let settings = config
        .load_settings()
        .context("Failed to load settings")?;
    let client = LlmClient::new(settings.llm);
    let outcome = ms_engine::run_cycle(config, memory, &client)
        .await
        .context("Reflection cycle failed")?;
    Ok(outcome)
}

fn print_outcome(title: &str, outcome: &CycleOutcome) {
    let reflection = &outcome.reflection;
    println!("{title}\n");
    println!("Reflection ID: {}", reflection.id.as_deref().unwrap_or("N/A"));
    println!(
        "Timestamp:     {}\n",
        reflection.timestamp.as_deref().unwrap_or("N/A")
    );
    println!("{}", reflection.text);
    println!("\nQuestions:");

    if outcome.questions.is_empty() {
        println!("(no questions)");
    }
    for q in &outcome.questions {
        println!(
            "- [{} @ {}] {}",
            q.id.as_deref().unwrap_or("N/A"),
            q.timestamp.as_deref().unwrap_or("N/A"),
            q.text
        );
    }
}

fn log_episode(memory: &MemoryLog, path: &Path) -> Result<()> {
    let upload = EpisodeUpload::from_path(path)
        .with_context(|| format!("Failed to load episode from {}", path.display()))?;
    let payload_tags = upload.payload_tags.clone();
    let episode = memory
        .append_episode(upload.into_new_episode())
        .context("Failed to log episode")?;

    println!("=== Logged Episode ===");
    println!("ID:           {}", episode.id.as_deref().unwrap_or("N/A"));
    println!(
        "Timestamp:    {}",
        episode.timestamp.as_deref().unwrap_or("N/A")
    );
    println!("Source:       {}", episode.source.as_deref().unwrap_or_default());
    println!("Type:         {}", episode.event_type.as_deref().unwrap_or_default());
    println!("Summary:      {}", episode.summary.as_deref().unwrap_or_default());
    println!("Event Tags:   {}", join_or_none(&episode.tags));
    println!("Payload Tags: {}", join_or_none(&payload_tags));
    Ok(())
}

fn join_or_none(tags: &[String]) -> String {
    if tags.is_empty() {
        "(none)".to_string()
    } else {
        tags.join(", ")
    }
}

fn check_config(config: &ConfigStore) -> Result<()> {
    let seed = config.load_persona().context("Failed to load persona")?;
    let problems = seed.validate();

    println!("Persona:  {}", config.mind_seed_path().display());
    if problems.is_empty() {
        println!("  OK ({})", seed.name.as_deref().unwrap_or("unnamed"));
    }
    for problem in &problems {
        println!("  - {problem}");
    }

    match config.load_guiding_text()? {
        Some(text) => println!(
            "Guiding document: {} characters",
            text.chars().count()
        ),
        None => println!("Guiding document: (none)"),
    }

    if config.init_settings()? {
        println!("Settings: wrote defaults to {}", config.settings_path().display());
    }
    let settings = config.load_settings()?;
    println!("LLM provider: {}", settings.llm.provider);
    println!(
        "LLM model:    {}",
        settings.llm.model.as_deref().unwrap_or("not set")
    );
    println!(
        "LLM API key:  {}",
        if settings.llm.api_key.is_some() { "configured" } else { "not set" }
    );

    if !problems.is_empty() {
        anyhow::bail!("persona has {} problem(s)", problems.len());
    }
    Ok(())
}

fn status(config: &ConfigStore, memory: &MemoryLog) -> Result<()> {
    let settings = config.load_settings()?;
    let episodes = memory.recent_episodes(usize::MAX)?;
    let reflections = memory.recent_reflections(usize::MAX)?;
    let questions = memory.recent_questions(usize::MAX)?;
    let open = questions.iter().filter(|q| q.is_open()).count();

    println!("Morningstar v{}", env!("CARGO_PKG_VERSION"));
    println!("Home:        {}", config::morningstar_home().display());
    println!("Config:      {}", config.dir().display());
    println!("Memory:      {}", memory.dir().display());
    println!("Episodes:    {}", episodes.len());
    println!("Reflections: {}", reflections.len());
    println!("Questions:   {} ({open} open)", questions.len());
    if let Some(stamp) = reflections.last().and_then(|r| r.timestamp.as_deref()) {
        println!("Last reflection: {stamp}");
    }
    println!("LLM:         {} @ {}", settings.llm.provider, settings.llm.endpoint());
    println!(
        "Model:       {}",
        settings.llm.model.as_deref().unwrap_or("not set")
    );
    println!(
        "API Key:     {}",
        if settings.llm.api_key.is_some() { "configured" } else { "not set" }
    );
    Ok(())
}
