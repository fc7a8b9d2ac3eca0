//! Rule overrides proposed by a remote reasoning service.
//!
//! This path runs independently of the synchronous pass: the caller awaits a
//! provider (which owns transport, retries and timeouts), and the returned
//! overrides become ordinary [`Update`]s. They are merged with the engine's own
//! output through [`crate::engine::merge_updates`], so the same priority
//! arbitration applies to both.

use std::sync::OnceLock;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::MappingEngine;
use crate::rule::{Source, Update, MAX_PRIORITY, MIN_PRIORITY};
use crate::rule_table::RuleSummary;
use crate::signals::{AiAnalysis, EvolutionState, TimeOfDay, WeatherReading};
use crate::value::{ParamPath, Value};

fn default_override_priority() -> u8 {
    5
}

/// Snapshot sent to the reasoning service: the signals plus the current rule table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub ai: AiAnalysis,
    pub weather: WeatherReading,
    pub time_of_day: TimeOfDay,
    pub evolution: EvolutionState,
    pub rules: Vec<RuleSummary>,
}

impl OverrideRequest {
    pub fn new(
        engine: &MappingEngine,
        ai: &AiAnalysis,
        weather: &WeatherReading,
        time_of_day: TimeOfDay,
        evolution: &EvolutionState,
    ) -> Self {
        Self {
            ai: ai.clone(),
            weather: weather.clone(),
            time_of_day,
            evolution: *evolution,
            rules: engine.rule_summaries(),
        }
    }

    /// JSON body for the service.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One proposed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOverride {
    pub path: String,
    pub value: Value,
    #[serde(default = "default_override_priority")]
    pub priority: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OverrideEnvelope {
    List(Vec<RuleOverride>),
    Wrapped { overrides: Vec<RuleOverride> },
}

fn fenced_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fence pattern is a valid regex")
    })
}

/// Extract overrides from a service response.
///
/// Accepts a bare JSON array, an object with an `overrides` array, or either
/// of those inside a fenced code block surrounded by prose.
pub fn parse_overrides(text: &str) -> anyhow::Result<Vec<RuleOverride>> {
    let body = match fenced_block().captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => text.trim(),
    };

    let envelope: OverrideEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(first_err) => {
            // Prose around an unfenced array: take the outermost brackets.
            let start = body.find('[');
            let end = body.rfind(']');
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&body[start..=end]).context("Failed to parse override list")?
                }
                _ => return Err(first_err).context("Response contains no override list"),
            }
        }
    };

    Ok(match envelope {
        OverrideEnvelope::List(list) => list,
        OverrideEnvelope::Wrapped { overrides } => overrides,
    })
}

/// Asynchronous producer of rule overrides.
#[async_trait]
pub trait OverrideProvider: Send + Sync {
    /// Send the request and return the raw response text.
    async fn propose(&self, request: &OverrideRequest) -> anyhow::Result<String>;
}

/// A provider that always returns the same response (offline runs, tests).
#[derive(Debug, Clone)]
pub struct StaticOverrideProvider {
    response: String,
}

impl StaticOverrideProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl OverrideProvider for StaticOverrideProvider {
    async fn propose(&self, _request: &OverrideRequest) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

/// Turns provider responses into engine-compatible updates.
pub struct MetaMapper<P> {
    provider: P,
}

impl<P: OverrideProvider> MetaMapper<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Ask the provider for overrides and convert them to updates.
    ///
    /// Invalid paths, locked paths, values of the wrong kind for the target rule
    /// and non-finite numbers are dropped. Numeric
    /// values are clamped through the target rule's bounds and safety limit.
    pub async fn request_updates(
        &self,
        engine: &MappingEngine,
        request: &OverrideRequest,
    ) -> anyhow::Result<Vec<Update>> {
        let response = self
            .provider
            .propose(request)
            .await
            .context("Override provider failed")?;
        let overrides = parse_overrides(&response)?;
        Ok(overrides_to_updates(engine, overrides))
    }
}

/// Validate overrides against the engine's table and convert them to updates.
pub fn overrides_to_updates(engine: &MappingEngine, overrides: Vec<RuleOverride>) -> Vec<Update> {
    let mut updates = Vec::with_capacity(overrides.len());

    for proposal in overrides {
        let path = match ParamPath::parse(proposal.path.as_str()) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Dropping override: {}", e);
                continue;
            }
        };
        if engine.is_locked(&path) {
            log::debug!("Dropping override for locked parameter {}", path);
            continue;
        }

        if let Some(expected) = engine.expected_kind(&path) {
            if proposal.value.kind() != expected {
                log::warn!(
                    "Dropping override for {}: expected {}, got {}",
                    path,
                    expected,
                    proposal.value.kind()
                );
                continue;
            }
        }

        let value = match proposal.value {
            Value::Number(n) if !n.is_finite() => {
                log::warn!("Dropping override for {}: non-finite value", path);
                continue;
            }
            Value::Number(n) => Value::Number(engine.clamp_for_path(&path, n)),
            other => other,
        };

        let reason = if proposal.reason.trim().is_empty() {
            "AI rule override".to_string()
        } else {
            proposal.reason
        };

        updates.push(Update {
            path,
            value,
            source: Source::Ai,
            priority: proposal.priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            reason,
        });
    }

    updates
}
