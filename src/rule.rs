//! Mapping rules, their constraints, and the context they evaluate against.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};
use crate::scene::SceneSnapshot;
use crate::signals::{AiAnalysis, EvolutionState, TimeOfDay, WeatherReading};
use crate::value::{ParamPath, Value, ValueKind};

/// Highest rule priority.
pub const MAX_PRIORITY: u8 = 10;
/// Lowest rule priority.
pub const MIN_PRIORITY: u8 = 1;

/// Which external producer a rule speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Ai,
    Weather,
    Time,
    Evolution,
    Hybrid,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Ai => "ai",
            Source::Weather => "weather",
            Source::Time => "time",
            Source::Evolution => "evolution",
            Source::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds and dependencies attached to a rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub min: f32,
    pub max: f32,
    /// Preferred sub-range of `[min, max]`. Values outside are nudged toward it.
    #[serde(default)]
    pub safe_zone: Option<(f32, f32)>,
    /// The rule is skipped while any of these parameters is active in the scene.
    #[serde(default)]
    pub lock_when_active: Vec<ParamPath>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            safe_zone: None,
            lock_when_active: Vec::new(),
        }
    }
}

impl Constraints {
    pub fn bounded(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn with_safe_zone(mut self, low: f32, high: f32) -> Self {
        self.safe_zone = Some((low, high));
        self
    }

    pub fn with_lock_when_active(mut self, path: ParamPath) -> Self {
        self.lock_when_active.push(path);
        self
    }

    fn check(&self) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err("bounds must be finite".to_string());
        }
        if self.min > self.max {
            return Err(format!("min {} exceeds max {}", self.min, self.max));
        }
        if let Some((low, high)) = self.safe_zone {
            if !low.is_finite() || !high.is_finite() {
                return Err("safe zone must be finite".to_string());
            }
            if low > high {
                return Err(format!("safe zone low {} exceeds high {}", low, high));
            }
            if low < self.min || high > self.max {
                return Err(format!(
                    "safe zone [{}, {}] lies outside bounds [{}, {}]",
                    low, high, self.min, self.max
                ));
            }
        }
        Ok(())
    }
}

/// Everything a rule may look at while computing its candidate value.
///
/// Borrowed for the duration of a single rule evaluation.
pub struct MappingContext<'a> {
    pub ai: &'a AiAnalysis,
    pub weather: &'a WeatherReading,
    pub time: &'a TimeOfDay,
    pub evolution: &'a EvolutionState,
    /// The tree's value at the rule's own path (`None` if the tree lacks it).
    pub current_value: Option<Value>,
    /// The whole tree, for cross-parameter checks.
    pub scene: &'a dyn SceneSnapshot,
}

impl MappingContext<'_> {
    /// Current numeric value at the rule's path, if there is one.
    pub fn current_number(&self) -> Option<f32> {
        self.current_value.as_ref().and_then(Value::as_number)
    }

    /// Read another parameter from the scene.
    pub fn read(&self, path: &ParamPath) -> Option<Value> {
        self.scene.read(path)
    }
}

/// A rule's evaluation function.
pub type EvaluateFn = Arc<dyn Fn(&MappingContext<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// One declarative mapping from the signal context to a parameter value.
#[derive(Clone)]
pub struct Rule {
    pub path: ParamPath,
    pub source: Source,
    /// 1-10, higher wins conflicts.
    pub priority: u8,
    /// Kind of value the rule produces. Only numbers are clamped.
    pub output: ValueKind,
    pub constraints: Constraints,
    /// 0-1; closer to 1 accepts smaller changes (less damping).
    pub sensitivity: f32,
    /// How fast an evolution-driven rule is expected to drift. Informational;
    /// the evaluation pass does not read it.
    pub evolution_rate: Option<f32>,
    pub evaluate: EvaluateFn,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("path", &self.path)
            .field("source", &self.source)
            .field("priority", &self.priority)
            .field("output", &self.output)
            .field("constraints", &self.constraints)
            .field("sensitivity", &self.sensitivity)
            .field("evolution_rate", &self.evolution_rate)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Start building a rule with the default source, priority, bounds and sensitivity.
    pub fn builder<F>(path: ParamPath, evaluate: F) -> RuleBuilder
    where
        F: Fn(&MappingContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        RuleBuilder::new(path, Arc::new(evaluate))
    }

    /// Check priority, sensitivity and constraints.
    pub fn validate(&self) -> MappingResult<()> {
        let invalid = |reason: String| MappingError::InvalidConstraint {
            path: self.path.clone(),
            reason,
        };

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(invalid(format!(
                "priority {} outside [{}, {}]",
                self.priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(invalid(format!("sensitivity {} outside [0, 1]", self.sensitivity)));
        }
        if let Some(rate) = self.evolution_rate {
            if !rate.is_finite() {
                return Err(invalid("evolution rate must be finite".to_string()));
            }
        }
        self.constraints.check().map_err(invalid)
    }

    /// Shallow-merge the fields set in `patch` into this rule.
    pub fn merge(&mut self, patch: RulePatch) {
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(constraints) = patch.constraints {
            self.constraints = constraints;
        }
        if let Some(sensitivity) = patch.sensitivity {
            self.sensitivity = sensitivity;
        }
        if let Some(rate) = patch.evolution_rate {
            self.evolution_rate = Some(rate);
        }
        if let Some(evaluate) = patch.evaluate {
            self.evaluate = evaluate;
        }
    }
}

/// Builder for custom rules. Unset fields take the defaults
/// `source = Hybrid`, `priority = 5`, bounds `[0, 1]`, `sensitivity = 0.5`.
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    fn new(path: ParamPath, evaluate: EvaluateFn) -> Self {
        Self {
            rule: Rule {
                path,
                source: Source::Hybrid,
                priority: 5,
                output: ValueKind::Number,
                constraints: Constraints::default(),
                sensitivity: 0.5,
                evolution_rate: None,
                evaluate,
            },
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.rule.source = source;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn output(mut self, kind: ValueKind) -> Self {
        self.rule.output = kind;
        self
    }

    pub fn bounds(mut self, min: f32, max: f32) -> Self {
        self.rule.constraints.min = min;
        self.rule.constraints.max = max;
        self
    }

    pub fn safe_zone(mut self, low: f32, high: f32) -> Self {
        self.rule.constraints.safe_zone = Some((low, high));
        self
    }

    pub fn lock_when_active(mut self, path: ParamPath) -> Self {
        self.rule.constraints.lock_when_active.push(path);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.rule.constraints = constraints;
        self
    }

    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.rule.sensitivity = sensitivity;
        self
    }

    pub fn evolution_rate(mut self, rate: f32) -> Self {
        self.rule.evolution_rate = Some(rate);
        self
    }

    /// Validate and return the rule.
    pub fn build(self) -> MappingResult<Rule> {
        self.rule.validate()?;
        Ok(self.rule)
    }
}

/// Partial rule fields for [`crate::rule_table::RuleTable::patch`].
#[derive(Clone, Default)]
pub struct RulePatch {
    pub source: Option<Source>,
    pub priority: Option<u8>,
    pub constraints: Option<Constraints>,
    pub sensitivity: Option<f32>,
    pub evolution_rate: Option<f32>,
    pub evaluate: Option<EvaluateFn>,
}

impl RulePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }

    pub fn evolution_rate(mut self, rate: f32) -> Self {
        self.evolution_rate = Some(rate);
        self
    }

    pub fn evaluate<F>(mut self, evaluate: F) -> Self
    where
        F: Fn(&MappingContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.evaluate = Some(Arc::new(evaluate));
        self
    }
}

/// One parameter change produced by an evaluation pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub path: ParamPath,
    pub value: Value,
    pub source: Source,
    pub priority: u8,
    /// Human-readable justification.
    pub reason: String,
}
