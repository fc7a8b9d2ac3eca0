//! The evaluation engine.
//!
//! One call to [`MappingEngine::evaluate`] runs every unlocked rule against the
//! current signals and returns the resulting parameter updates. Each rule goes
//! through the same pipeline:
//!
//! ```text
//! evaluate → clamp(rule bounds) → clamp(safety limit) → nudge(safe zone) → gate(sensitivity)
//! ```
//!
//! and the surviving candidates are reduced to one update per path by
//! [`resolve_conflicts`]. A failing rule is recorded in the report and never
//! stops the pass.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::builtin_rules::builtin_table;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{MappingError, MappingResult};
use crate::reason;
use crate::rule::{Constraints, MappingContext, Rule, RulePatch, Update};
use crate::rule_table::{RuleSummary, RuleTable};
use crate::scene::SceneSnapshot;
use crate::signals::{AiAnalysis, EvolutionState, SignalBundle, TimeOfDay, WeatherReading};
use crate::value::{ParamPath, Value, ValueKind};

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    /// Resolved updates, at most one per path.
    pub updates: Vec<Update>,
    /// Candidates the sensitivity gate held back.
    pub suppressed: Vec<Update>,
    /// Rules that failed this pass.
    pub errors: Vec<MappingError>,
}

impl EvaluationReport {
    /// The update for `path`, if one was emitted.
    pub fn update_for(&self, path: &ParamPath) -> Option<&Update> {
        self.updates.iter().find(|u| &u.path == path)
    }

    /// Whether every rule evaluated without error.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Clamp to the rule's own bounds, then to the absolute safety limit.
///
/// The safety limit is applied last so it wins whenever the two ranges disagree.
pub fn clamp_to_limits(value: f32, constraints: &Constraints, safety_limit: Option<(f32, f32)>) -> f32 {
    let value = value.clamp(constraints.min, constraints.max);
    match safety_limit {
        Some((min, max)) => value.clamp(min, max),
        None => value,
    }
}

/// Move `value` at most `step` toward `zone`. Values inside the zone are unchanged.
pub fn nudge_toward_zone(value: f32, zone: (f32, f32), step: f32) -> f32 {
    let (low, high) = zone;
    if value < low {
        low.min(value + step)
    } else if value > high {
        high.max(value - step)
    } else {
        value
    }
}

/// Sensitivity gate.
///
/// Numbers pass iff `|candidate - current| > |current| * (1 - sensitivity) + epsilon`.
/// Other values pass iff they differ from the current one. A parameter with no
/// current value always passes.
pub fn passes_gate(candidate: &Value, current: Option<&Value>, sensitivity: f32, epsilon: f32) -> bool {
    let Some(current) = current else {
        return true;
    };
    match (candidate, current) {
        (Value::Number(v), Value::Number(c)) => {
            let threshold = c.abs() * (1.0 - sensitivity) + epsilon;
            (v - c).abs() > threshold
        }
        _ => candidate != current,
    }
}

/// Keep one update per path: the highest priority wins, and on equal priority
/// the earliest candidate wins. Output keeps each path's first-appearance order.
pub fn resolve_conflicts(candidates: Vec<Update>) -> Vec<Update> {
    let mut slots: HashMap<ParamPath, usize> = HashMap::new();
    let mut resolved: Vec<Update> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match slots.get(&candidate.path) {
            Some(&slot) => {
                let current = &resolved[slot];
                if candidate.priority > current.priority {
                    log::debug!(
                        "Conflict on {}: priority {} ({}) overrides {} ({})",
                        candidate.path,
                        candidate.priority,
                        candidate.source,
                        current.priority,
                        current.source
                    );
                    resolved[slot] = candidate;
                }
            }
            None => {
                slots.insert(candidate.path.clone(), resolved.len());
                resolved.push(candidate);
            }
        }
    }

    resolved
}

/// Merge the output of independent producers with the same arbitration as a single pass.
///
/// `primary` comes first, so it wins ties.
pub fn merge_updates(primary: Vec<Update>, secondary: Vec<Update>) -> Vec<Update> {
    let mut all = primary;
    all.extend(secondary);
    resolve_conflicts(all)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// The rule-based parameter mapping engine.
///
/// Owns its rule table behind a read-write lock: evaluation passes take the read
/// side for their whole duration, so registration and lock changes wait until
/// the in-flight pass has finished.
pub struct MappingEngine {
    table: RwLock<RuleTable>,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    /// Rules whose failure has already been logged at warn level.
    warned_failures: Mutex<HashSet<ParamPath>>,
}

impl MappingEngine {
    /// Create an engine around an existing rule table.
    pub fn new(table: RuleTable) -> Self {
        Self {
            table: RwLock::new(table),
            clock: Box::new(SystemClock),
            config: EngineConfig::default(),
            warned_failures: Mutex::new(HashSet::new()),
        }
    }

    /// Create an engine with the built-in rule set and safety limits.
    pub fn with_builtin_rules() -> MappingResult<Self> {
        Ok(Self::new(builtin_table()?))
    }

    /// Replace the clock used to derive time of day.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn read_table(&self) -> RwLockReadGuard<'_, RuleTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, RuleTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn forget_failure(&self, path: &ParamPath) {
        self.warned_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    /// Log a rule failure, at warn level the first time in a row and debug after.
    fn report_failure(&self, error: &MappingError, path: &ParamPath) {
        let first = self
            .warned_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone());
        if first {
            log::warn!("{} - skipping this rule until it recovers", error);
        } else {
            log::debug!("{}", error);
        }
    }

    // === Rule table API ===

    /// Insert or replace the rule at `rule.path`.
    pub fn register_rule(&self, rule: Rule) -> MappingResult<()> {
        let path = rule.path.clone();
        self.write_table().register(rule)?;
        self.forget_failure(&path);
        Ok(())
    }

    /// Shallow-merge `patch` into the rule at `path`.
    pub fn patch_rule(&self, path: &ParamPath, patch: RulePatch) -> MappingResult<()> {
        let result = self.write_table().patch(path, patch);
        match &result {
            Ok(()) => self.forget_failure(path),
            Err(e) => log::warn!("Rule patch rejected: {}", e),
        }
        result
    }

    pub fn remove_rule(&self, path: &ParamPath) -> Option<Rule> {
        self.forget_failure(path);
        self.write_table().remove(path)
    }

    /// Exclude `path` from evaluation until unlocked. Idempotent.
    pub fn lock(&self, path: ParamPath) {
        if self.write_table().lock(path.clone()) {
            log::info!("Locked {}", path);
        }
    }

    /// Re-enable evaluation of `path`. Idempotent.
    pub fn unlock(&self, path: &ParamPath) {
        if self.write_table().unlock(path) {
            log::info!("Unlocked {}", path);
        }
    }

    pub fn is_locked(&self, path: &ParamPath) -> bool {
        self.read_table().is_locked(path)
    }

    /// Install or overwrite an absolute bound for `path`.
    pub fn set_safety_limit(&self, path: ParamPath, min: f32, max: f32) -> MappingResult<()> {
        self.write_table().set_safety_limit(path, min, max)
    }

    pub fn safety_limit(&self, path: &ParamPath) -> Option<(f32, f32)> {
        self.read_table().safety_limit(path)
    }

    /// Target paths in evaluation order.
    pub fn rule_paths(&self) -> Vec<ParamPath> {
        self.read_table().paths().cloned().collect()
    }

    pub fn rule_summaries(&self) -> Vec<RuleSummary> {
        self.read_table().summaries()
    }

    /// Clamp a numeric value for `path` through the same two tiers as a pass:
    /// the registered rule's bounds (if any), then the safety limit (if any).
    pub fn clamp_for_path(&self, path: &ParamPath, value: f32) -> f32 {
        let table = self.read_table();
        let limit = table.safety_limit(path);
        match table.get(path) {
            Some(rule) => clamp_to_limits(value, &rule.constraints, limit),
            None => match limit {
                Some((min, max)) => value.clamp(min, max),
                None => value,
            },
        }
    }

    /// Kind of value `path` accepts: the registered rule's output kind, or a
    /// number when only a safety limit is set. `None` for unmanaged paths.
    pub fn expected_kind(&self, path: &ParamPath) -> Option<ValueKind> {
        let table = self.read_table();
        match table.get(path) {
            Some(rule) => Some(rule.output),
            None => table.safety_limit(path).map(|_| ValueKind::Number),
        }
    }

    // === Evaluation ===

    /// Run one pass, deriving time of day from the engine's clock.
    pub fn evaluate(
        &self,
        ai: &AiAnalysis,
        weather: &WeatherReading,
        scene: &dyn SceneSnapshot,
        evolution: &EvolutionState,
    ) -> EvaluationReport {
        let time = TimeOfDay::now(self.clock.as_ref());
        self.evaluate_at(ai, weather, &time, scene, evolution)
    }

    /// Run one pass over a signal bundle. Uses the bundle's time of day when present.
    pub fn evaluate_bundle(&self, bundle: &SignalBundle, scene: &dyn SceneSnapshot) -> EvaluationReport {
        let time = bundle
            .time_of_day
            .unwrap_or_else(|| TimeOfDay::now(self.clock.as_ref()));
        self.evaluate_at(&bundle.ai, &bundle.weather, &time, scene, &bundle.evolution)
    }

    /// Run one pass with an explicit time of day.
    pub fn evaluate_at(
        &self,
        ai: &AiAnalysis,
        weather: &WeatherReading,
        time: &TimeOfDay,
        scene: &dyn SceneSnapshot,
        evolution: &EvolutionState,
    ) -> EvaluationReport {
        let table = self.read_table();
        let mut candidates = Vec::new();
        let mut report = EvaluationReport::default();

        for rule in table.rules() {
            if table.is_locked(&rule.path) {
                log::debug!("Skipping locked parameter {}", rule.path);
                continue;
            }

            if let Some(active) = rule
                .constraints
                .lock_when_active
                .iter()
                .find(|dep| scene.read(dep).is_some_and(|v| v.is_active()))
            {
                log::debug!("Skipping {} while {} is active", rule.path, active);
                continue;
            }

            let ctx = MappingContext {
                ai,
                weather,
                time,
                evolution,
                current_value: scene.read(&rule.path),
                scene,
            };

            let value = match self.run_rule(rule, &ctx, table.safety_limit(&rule.path)) {
                Ok(value) => value,
                Err(error) => {
                    self.report_failure(&error, &rule.path);
                    report.errors.push(error);
                    continue;
                }
            };
            self.forget_failure(&rule.path);

            let update = Update {
                path: rule.path.clone(),
                value,
                source: rule.source,
                priority: rule.priority,
                reason: reason::describe(rule.source, &ctx),
            };

            if passes_gate(
                &update.value,
                ctx.current_value.as_ref(),
                rule.sensitivity,
                self.config.gate_epsilon,
            ) {
                candidates.push(update);
            } else {
                log::debug!(
                    "Holding back {} = {} (change below sensitivity {})",
                    update.path,
                    update.value,
                    rule.sensitivity
                );
                report.suppressed.push(update);
            }
        }

        report.updates = resolve_conflicts(candidates);
        report
    }

    /// Evaluate one rule and push numeric output through clamping and safe-zone nudging.
    fn run_rule(
        &self,
        rule: &Rule,
        ctx: &MappingContext<'_>,
        safety_limit: Option<(f32, f32)>,
    ) -> MappingResult<Value> {
        let failed = |cause: String| MappingError::Evaluation {
            path: rule.path.clone(),
            cause,
        };

        let raw = match panic::catch_unwind(AssertUnwindSafe(|| (rule.evaluate)(ctx))) {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(failed(format!("{:#}", e))),
            Err(payload) => return Err(failed(panic_message(payload))),
        };

        if raw.kind() != rule.output {
            return Err(failed(format!("produced {} where {} was expected", raw.kind(), rule.output)));
        }
        let Value::Number(number) = raw else {
            return Ok(raw);
        };
        if !number.is_finite() {
            return Err(failed(format!("produced non-finite value {}", number)));
        }

        let clamped = clamp_to_limits(number, &rule.constraints, safety_limit);
        let adjusted = match rule.constraints.safe_zone {
            Some(zone) => {
                let nudged = nudge_toward_zone(clamped, zone, self.config.safe_zone_step);
                // A safety limit narrower than the zone still has the last word.
                clamp_to_limits(nudged, &rule.constraints, safety_limit)
            }
            None => clamped,
        };
        Ok(Value::Number(adjusted))
    }
}
