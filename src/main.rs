//! `formcoach` - exercise repetition counting and form feedback
//!
//! Replays recorded pose landmark streams through the coaching engine and
//! keeps the remote workout session in sync.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use console::Style;
use log::{info, warn};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cli::{Cli, Commands, ConfigCommand};
use formcoach_core::config::CoachConfig;
use formcoach_core::output::OutputFormatter;
use formcoach_core::store::SessionStore;
use formcoach_core::{
    CompletionOutcome, Credential, ExerciseKind, HttpSessionStore, InMemorySessionStore, PoseFrame,
    ThresholdConfig, Workout, WorkoutConfig, WorkoutEntry, WorkoutEvent,
};

mod cli;
mod logger;
mod replay;

/// Options for one replayed workout
struct ReplayArgs {
    exercise: String,
    input: Option<PathBuf>,
    fps: u32,
    offline: bool,
    token: Option<String>,
    thresholds: Option<(f64, f64)>,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", version_line());
        return Ok(());
    }

    // config commands must work on a broken config, so validation waits
    let loaded = CoachConfig::load_unvalidated();
    let log = loaded
        .as_ref()
        .map(|config| config.log.clone())
        .unwrap_or_default();
    logger::init(
        logger::level_filter(&log.level, cli.verbose),
        cli.verbose,
        log.file.as_deref(),
    )
    .context("Failed to initialize logging")?;

    match cli.command {
        Some(Commands::Replay {
            exercise,
            input,
            fps,
            offline,
            token,
            up,
            down,
            json,
        }) => {
            let mut config = validated(loaded)?;
            let args = ReplayArgs {
                exercise,
                input,
                fps,
                offline,
                token,
                thresholds: up.zip(down),
                json,
            };
            run_replay(&mut config, args).await?;
        }
        Some(Commands::History { token, limit, json }) => {
            let mut config = validated(loaded)?;
            run_history(&mut config, token, limit, json).await?;
        }
        Some(Commands::Config { cmd }) => {
            handle_config(cmd.unwrap_or(ConfigCommand::Show), loaded)?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

fn version_line() -> String {
    format!(
        "{} v{} ({})",
        Style::new().blue().apply_to("formcoach"),
        env!("CARGO_PKG_VERSION"),
        env!("GIT_REVISION")
    )
}

fn validated(loaded: formcoach_core::Result<CoachConfig>) -> Result<CoachConfig> {
    let config = loaded.context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Apply a `--token` override and turn the result into a credential
fn credential_for(config: &mut CoachConfig, token: Option<String>) -> Result<Option<Credential>> {
    if let Some(token) = token {
        config.token = Some(token);
    }
    config.credential().context("Invalid store token")
}

async fn run_replay(config: &mut CoachConfig, args: ReplayArgs) -> Result<()> {
    let exercise: ExerciseKind = args.exercise.parse()?;
    let credential = credential_for(config, args.token)?;

    let mut thresholds = config.thresholds_for(exercise);
    if let Some((up, down)) = args.thresholds {
        thresholds = ThresholdConfig::new(up, down)?;
    }
    let workout_config = WorkoutConfig::new(exercise).with_thresholds(thresholds)?;

    let store: Arc<dyn SessionStore> = if args.offline {
        Arc::new(InMemorySessionStore::new())
    } else {
        Arc::new(HttpSessionStore::new(&config.store).context("Failed to set up the session store")?)
    };

    let reader = replay::open(args.input.as_deref()).await?;
    let (frames_tx, frames_rx) = mpsc::channel::<PoseFrame>(64);
    let queue = frames_tx.clone();

    let (workout, mut events) = Workout::start(workout_config, store, credential, frames_rx)?;

    let mut formatter = OutputFormatter::new();
    if !args.json {
        formatter.print_start(exercise);
    }

    let mut feeder = tokio::spawn(replay::pump(reader, args.fps, frames_tx));
    let mut feeding = true;

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Err(e) = emit(&mut formatter, exercise, &event, args.json) {
                    warn!("Failed to print event: {}", e);
                }
            }
            result = &mut feeder, if feeding => {
                feeding = false;
                match result {
                    Ok(Ok(sent)) => info!("Replayed {} frames", sent),
                    Ok(Err(e)) => warn!("Frame stream ended early: {:#}", e),
                    Err(e) => warn!("Frame reader failed: {}", e),
                }
                frames_drained(&queue).await;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping workout");
                break;
            }
        }
    }

    let stopped = workout.stop().await?;
    // the driver has exited, so this drains to the end
    while let Some(event) = events.recv().await {
        emit(&mut formatter, exercise, &event, args.json)?;
    }

    if args.json {
        println!("{}", serde_json::to_string(&json!({ "event": "summary", "summary": stopped.summary }))?);
    } else {
        formatter.print_summary(&stopped.summary);
    }

    let outcome = stopped.completion.await.context("Completion task failed")?;
    if args.json {
        println!("{}", serde_json::to_string(&outcome_json(&outcome))?);
    } else {
        formatter.print_outcome(&outcome);
        if !outcome.is_persisted() {
            for line in logger::recent_problems(5) {
                eprintln!("  {}", line);
            }
        }
    }

    Ok(())
}

async fn run_history(
    config: &mut CoachConfig,
    token: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let credential = credential_for(config, token)?;
    let store = HttpSessionStore::new(&config.store).context("Failed to set up the session store")?;
    let entries = fetch_history(&store, credential.as_ref(), limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        OutputFormatter::new().print_history(&entries);
    }
    Ok(())
}

/// Past workouts as the store lists them, cut to `limit`
async fn fetch_history(
    store: &dyn SessionStore,
    credential: Option<&Credential>,
    limit: Option<usize>,
) -> Result<Vec<WorkoutEntry>> {
    let mut entries = store
        .list_workouts(credential)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to fetch workout history")?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    Ok(entries)
}

fn emit(
    formatter: &mut OutputFormatter,
    exercise: ExerciseKind,
    event: &WorkoutEvent,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        formatter.print_event(exercise, event);
    }
    Ok(())
}

fn outcome_json(outcome: &CompletionOutcome) -> serde_json::Value {
    match outcome {
        CompletionOutcome::Completed { session_id } => json!({
            "event": "outcome",
            "persisted": true,
            "session_id": session_id,
        }),
        CompletionOutcome::FallbackSaved { cause } => json!({
            "event": "outcome",
            "persisted": true,
            "fallback": true,
            "cause": cause.as_ref().map(|e| e.to_string()),
        }),
        CompletionOutcome::Lost { error } => json!({
            "event": "outcome",
            "persisted": false,
            "error": error.to_string(),
        }),
    }
}

/// Wait until the workout has taken every queued frame
async fn frames_drained(queue: &mpsc::Sender<PoseFrame>) {
    while queue.capacity() < queue.max_capacity() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn handle_config(
    cmd: ConfigCommand,
    loaded: formcoach_core::Result<CoachConfig>,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = loaded.context("Failed to load configuration")?;
            OutputFormatter::new().print_config(&config);
            if let Err(e) = config.validate() {
                println!(
                    "{} {}",
                    Style::new().yellow().apply_to("Warning:"),
                    e.user_message()
                );
            }
        }
        ConfigCommand::Path => match CoachConfig::find_config_file() {
            Some(path) => println!("{}", path.display()),
            None => println!("No config file found; using defaults"),
        },
        ConfigCommand::Init { force } => {
            let path = CoachConfig::user_config_path()
                .context("Could not determine the user config directory")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            CoachConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", Style::new().green().apply_to("Wrote"), path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::StoreError;

    #[test]
    fn test_outcome_json() {
        let done = outcome_json(&CompletionOutcome::Completed {
            session_id: "abc".to_string(),
        });
        assert_eq!(done["persisted"], true);
        assert_eq!(done["session_id"], "abc");

        let lost = outcome_json(&CompletionOutcome::Lost {
            error: StoreError::NotFound {
                session_id: "abc".to_string(),
            },
        });
        assert_eq!(lost["persisted"], false);
        assert!(lost["error"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_replay_counts_reps() {
        let frames = [
            r#"{"joints":{"right_shoulder":{"x":0.3,"y":0.4},"right_elbow":{"x":0.3,"y":0.6},"right_wrist":{"x":0.3,"y":0.8},"right_hip":{"x":0.6,"y":0.4},"right_ankle":{"x":0.9,"y":0.4}}}"#,
            r#"{"joints":{"right_shoulder":{"x":0.3,"y":0.4},"right_elbow":{"x":0.3,"y":0.6},"right_wrist":{"x":0.5,"y":0.5},"right_hip":{"x":0.6,"y":0.4},"right_ankle":{"x":0.9,"y":0.4}}}"#,
            r#"{"joints":{"right_shoulder":{"x":0.3,"y":0.4},"right_elbow":{"x":0.3,"y":0.6},"right_wrist":{"x":0.3,"y":0.8},"right_hip":{"x":0.6,"y":0.4},"right_ankle":{"x":0.9,"y":0.4}}}"#,
        ]
        .join("\n");

        let store = Arc::new(InMemorySessionStore::new());
        let (tx, rx) = mpsc::channel(4);
        let queue = tx.clone();
        let (workout, _events) = Workout::start(
            WorkoutConfig::new(ExerciseKind::Pushup),
            store.clone(),
            None,
            rx,
        )
        .unwrap();

        let sent = replay::pump(frames.as_bytes(), 30, tx).await.unwrap();
        assert_eq!(sent, 3);
        frames_drained(&queue).await;

        let stopped = workout.stop().await.unwrap();
        assert_eq!(stopped.summary.reps, 1);
        assert!(stopped.completion.await.unwrap().is_persisted());
        assert_eq!(store.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_history_respects_limit() {
        let store = InMemorySessionStore::new();
        for exercise in [ExerciseKind::Squat, ExerciseKind::Pushup] {
            store.create_session(exercise, None).await.unwrap();
        }

        let all = fetch_history(&store, None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].exercise.as_deref(), Some("squat"));

        let first = fetch_history(&store, None, Some(1)).await.unwrap();
        assert_eq!(first, all[..1].to_vec());
    }

    #[test]
    fn test_config_commands_tolerate_a_broken_config() {
        let mut broken = CoachConfig::default();
        broken.store.timeout_secs = 0;
        assert!(validated(Ok(broken.clone())).is_err());
        assert!(handle_config(ConfigCommand::Show, Ok(broken)).is_ok());

        let unreadable = Err(formcoach_core::CoachError::InvalidConfig {
            message: "bad toml".to_string(),
        });
        assert!(handle_config(ConfigCommand::Path, unreadable).is_ok());
    }

    #[test]
    fn test_version_line() {
        let line = version_line();
        assert!(line.contains(env!("CARGO_PKG_VERSION")));
        assert!(line.contains(env!("GIT_REVISION")));
    }
}
