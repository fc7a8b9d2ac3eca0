use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::diagnostics::{self, MappingDiagnostic};
use crate::engine::{merge_updates, MappingEngine};
use crate::meta_mapping::{MetaMapper, OverrideRequest, StaticOverrideProvider};
use crate::rule::Update;
use crate::scene::SceneParams;
use crate::signals::{SignalBundle, TimeOfDay};
use crate::value::ParamPath;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation pass and print the resulting updates as JSON
    Evaluate {
        /// Signal bundle JSON (ai, weather, evolution, optional timeOfDay)
        #[arg(long)]
        signals: PathBuf,

        /// Current scene parameters JSON. Defaults to the built-in scene defaults.
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Engine config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Parameter path to exclude from evaluation (repeatable)
        #[arg(long = "lock")]
        locks: Vec<String>,

        /// Saved reasoning-service response to merge as rule overrides
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Also print the scene with the updates applied
        #[arg(long)]
        apply: bool,
    },
    /// Print the built-in rule table
    Rules,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateOutput {
    updates: Vec<Update>,
    suppressed: Vec<Update>,
    diagnostics: Vec<MappingDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene: Option<SceneParams>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            signals,
            scene,
            config,
            locks,
            overrides,
            apply,
        } => evaluate(&signals, scene.as_deref(), config.as_deref(), &locks, overrides.as_deref(), apply),
        Commands::Rules => {
            let engine = MappingEngine::with_builtin_rules()?;
            println!("{}", serde_json::to_string_pretty(&engine.rule_summaries())?);
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file {:?}", what, path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} file {:?}", what, path))
}

fn evaluate(
    signals_path: &Path,
    scene_path: Option<&Path>,
    config_path: Option<&Path>,
    locks: &[String],
    overrides_path: Option<&Path>,
    apply: bool,
) -> Result<()> {
    let bundle: SignalBundle = read_json(signals_path, "signals")?;
    let mut scene: SceneParams = match scene_path {
        Some(path) => read_json(path, "scene")?,
        None => SceneParams::default(),
    };

    let mut engine = MappingEngine::with_builtin_rules()?;
    if let Some(path) = config_path {
        let config = EngineConfig::from_file(path).map_err(anyhow::Error::msg)?;
        engine = engine.with_config(config);
    }
    for lock in locks {
        engine.lock(ParamPath::parse(lock.as_str())?);
    }

    let report = engine.evaluate_bundle(&bundle, &scene);
    log::info!(
        "Evaluation pass: {} updates, {} held back, {} failed rules",
        report.updates.len(),
        report.suppressed.len(),
        report.errors.len()
    );

    let mut updates = report.updates;
    if let Some(path) = overrides_path {
        let response = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read overrides file {:?}", path))?;
        let time = bundle
            .time_of_day
            .unwrap_or_else(|| TimeOfDay::now(&crate::clock::SystemClock));
        let request = OverrideRequest::new(&engine, &bundle.ai, &bundle.weather, time, &bundle.evolution);
        let mapper = MetaMapper::new(StaticOverrideProvider::new(response));
        let proposed = pollster::block_on(mapper.request_updates(&engine, &request))?;
        updates = merge_updates(updates, proposed);
    }

    let mut diagnostics = diagnostics::from_errors(&report.errors);
    let applied = if apply {
        match scene.apply_all(&updates) {
            Ok(()) => Some(scene),
            Err(e) => {
                log::warn!("Scene left unchanged: {}", e);
                diagnostics.push(MappingDiagnostic::from(&e));
                None
            }
        }
    } else {
        None
    };

    let output = EvaluateOutput {
        updates,
        suppressed: report.suppressed,
        diagnostics,
        scene: applied,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
