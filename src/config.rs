//! Engine tuning loaded from JSON.

use serde::{Deserialize, Serialize};

/// Default slack added to the sensitivity threshold, so a parameter can leave a zero baseline.
fn default_gate_epsilon() -> f32 {
    0.01
}

/// Default distance a value outside its safe zone moves per pass.
fn default_safe_zone_step() -> f32 {
    1.0
}

/// Tunables for the evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// ε in the sensitivity gate `|v - c| > |c| * (1 - s) + ε`.
    #[serde(default = "default_gate_epsilon")]
    pub gate_epsilon: f32,

    /// Fixed step toward the safe zone for out-of-zone values.
    #[serde(default = "default_safe_zone_step")]
    pub safe_zone_step: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gate_epsilon: default_gate_epsilon(),
            safe_zone_step: default_safe_zone_step(),
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.gate_epsilon.is_finite() || self.gate_epsilon < 0.0 {
            return Err("Gate epsilon must be a non-negative number".to_string());
        }
        if !self.safe_zone_step.is_finite() || self.safe_zone_step <= 0.0 {
            return Err("Safe zone step must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!((config.gate_epsilon - 0.01).abs() < f32::EPSILON);
        assert!((config.safe_zone_step - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate() {
        let config: EngineConfig = serde_json::from_str(r#"{ "safeZoneStep": 0.5 }"#).unwrap();
        assert!(config.validate().is_ok());

        let bad = EngineConfig {
            safe_zone_step: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = EngineConfig {
            gate_epsilon: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
