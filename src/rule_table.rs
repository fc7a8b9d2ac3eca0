//! The rule table: registered rules, locked paths, and absolute safety limits.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{MappingError, MappingResult};
use crate::rule::{Rule, RulePatch, Source};
use crate::value::{ParamPath, ValueKind};

/// Serializable description of one registered rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub path: ParamPath,
    pub source: Source,
    pub priority: u8,
    pub output: ValueKind,
    pub min: f32,
    pub max: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_zone: Option<(f32, f32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_limit: Option<(f32, f32)>,
    pub sensitivity: f32,
    pub locked: bool,
}

/// Ordered collection of rules, unique per target path.
///
/// Rules are evaluated in registration order. Re-registering a path replaces
/// the rule in place and keeps its original position.
#[derive(Debug, Default, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
    index: HashMap<ParamPath, usize>,
    locked: HashSet<ParamPath>,
    safety_limits: HashMap<ParamPath, (f32, f32)>,
}

impl RuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the rule at `rule.path`.
    ///
    /// Returns `true` if an existing rule was replaced.
    pub fn register(&mut self, rule: Rule) -> MappingResult<bool> {
        rule.validate()?;
        match self.index.get(&rule.path) {
            Some(&slot) => {
                log::info!("Replacing mapping rule for {}", rule.path);
                self.rules[slot] = rule;
                Ok(true)
            }
            None => {
                log::debug!("Registering mapping rule for {}", rule.path);
                self.index.insert(rule.path.clone(), self.rules.len());
                self.rules.push(rule);
                Ok(false)
            }
        }
    }

    /// Shallow-merge `patch` into the rule at `path`.
    ///
    /// The merged rule is validated before it replaces the old one; on any
    /// error the table is unchanged.
    pub fn patch(&mut self, path: &ParamPath, patch: RulePatch) -> MappingResult<()> {
        let slot = *self
            .index
            .get(path)
            .ok_or_else(|| MappingError::UnknownRulePatch { path: path.clone() })?;

        let mut patched = self.rules[slot].clone();
        patched.merge(patch);
        patched.validate()?;
        self.rules[slot] = patched;
        log::debug!("Patched mapping rule for {}", path);
        Ok(())
    }

    /// Remove the rule at `path`, returning it.
    pub fn remove(&mut self, path: &ParamPath) -> Option<Rule> {
        let slot = self.index.remove(path)?;
        let rule = self.rules.remove(slot);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        Some(rule)
    }

    /// Exclude `path` from evaluation. Returns `true` if it was not already locked.
    pub fn lock(&mut self, path: ParamPath) -> bool {
        self.locked.insert(path)
    }

    /// Re-enable evaluation for `path`. Returns `true` if it was locked.
    pub fn unlock(&mut self, path: &ParamPath) -> bool {
        self.locked.remove(path)
    }

    pub fn is_locked(&self, path: &ParamPath) -> bool {
        self.locked.contains(path)
    }

    /// Locked paths, in no particular order.
    pub fn locked(&self) -> impl Iterator<Item = &ParamPath> {
        self.locked.iter()
    }

    /// Install or overwrite an absolute bound for `path`, independent of any rule.
    pub fn set_safety_limit(&mut self, path: ParamPath, min: f32, max: f32) -> MappingResult<()> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(MappingError::InvalidSafetyLimit { path, min, max });
        }
        self.safety_limits.insert(path, (min, max));
        Ok(())
    }

    pub fn clear_safety_limit(&mut self, path: &ParamPath) -> Option<(f32, f32)> {
        self.safety_limits.remove(path)
    }

    pub fn safety_limit(&self, path: &ParamPath) -> Option<(f32, f32)> {
        self.safety_limits.get(path).copied()
    }

    pub fn get(&self, path: &ParamPath) -> Option<&Rule> {
        self.index.get(path).map(|&slot| &self.rules[slot])
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Target paths in evaluation order.
    pub fn paths(&self) -> impl Iterator<Item = &ParamPath> {
        self.rules.iter().map(|rule| &rule.path)
    }

    /// Describe every rule in evaluation order.
    pub fn summaries(&self) -> Vec<RuleSummary> {
        self.rules
            .iter()
            .map(|rule| RuleSummary {
                path: rule.path.clone(),
                source: rule.source,
                priority: rule.priority,
                output: rule.output,
                min: rule.constraints.min,
                max: rule.constraints.max,
                safe_zone: rule.constraints.safe_zone,
                safety_limit: self.safety_limit(&rule.path),
                sensitivity: rule.sensitivity,
                locked: self.is_locked(&rule.path),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
