//! External signal snapshots consumed by mapping rules.
//!
//! These mirror the JSON shapes produced by the analysis, weather and session
//! services. They are fetched and validated elsewhere; the engine only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of the image/theme classifier.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub theme: String,
    /// Atmosphere tags, e.g. `["serene", "dreamy"]`.
    #[serde(default)]
    pub mood: Vec<String>,
    #[serde(default)]
    pub colors: ColorPalette,
    #[serde(default)]
    pub visual: VisualCharacteristics,
    #[serde(default)]
    pub confidence: f32,
}

/// Colour palette extracted by the classifier (CSS colour strings).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    #[serde(default)]
    pub supporting: Vec<String>,
}

/// Normalized visual characteristics, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualCharacteristics {
    pub energy: f32,
    pub saturation: f32,
    pub harmony: f32,
    pub speed: f32,
}

impl Default for VisualCharacteristics {
    fn default() -> Self {
        Self {
            energy: 0.5,
            saturation: 0.5,
            harmony: 0.5,
            speed: 0.5,
        }
    }
}

/// A weather feed reading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Free-form description, e.g. `"light fog"`.
    pub condition: String,
    /// km/h.
    pub wind_speed: f32,
    /// Percent, 0-100.
    pub humidity: f32,
    #[serde(default)]
    pub time_of_day: Option<DayPeriod>,
}

impl WeatherReading {
    /// Whether the condition text mentions fog or mist.
    pub fn is_foggy(&self) -> bool {
        let condition = self.condition.to_lowercase();
        condition.contains("fog") || condition.contains("mist")
    }
}

/// Coarse period of the day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    Dawn,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            DayPeriod::Dawn => "dawn",
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Evening => "evening",
            DayPeriod::Night => "night",
        }
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Time-of-day reading, normally derived from a [`crate::clock::Clock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfDay {
    /// Hour of day, 0-23.
    pub hour: u32,
    pub period: DayPeriod,
    pub season: Season,
}

impl TimeOfDay {
    /// Whether the hour falls in the late-night window (before 06:00 or after 22:00).
    pub fn is_late_night(&self) -> bool {
        self.hour < 6 || self.hour > 22
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Calm,
    Energetic,
    Mysterious,
    Chaotic,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Calm => "calm",
            Mood::Energetic => "energetic",
            Mood::Mysterious => "mysterious",
            Mood::Chaotic => "chaotic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Intro,
    Exploration,
    Climax,
    Resolution,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Intro => "intro",
            Phase::Exploration => "exploration",
            Phase::Climax => "climax",
            Phase::Resolution => "resolution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state from the external evolution tracker.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionState {
    /// Seconds since the session started.
    pub session_time: f32,
    pub interaction_count: u32,
    pub mood: Mood,
    pub phase: Phase,
}

/// All signal snapshots for one evaluation pass, as read from a JSON file.
///
/// `time_of_day` is optional; when absent the engine derives it from its clock.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBundle {
    #[serde(default)]
    pub ai: AiAnalysis,
    #[serde(default)]
    pub weather: WeatherReading,
    #[serde(default)]
    pub evolution: EvolutionState,
    #[serde(default)]
    pub time_of_day: Option<TimeOfDay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_from_json() {
        let json = r##"{
            "ai": {
                "theme": "ocean",
                "mood": ["serene", "vast"],
                "colors": { "primary": "#0044aa", "secondary": "#88ccff", "accent": "#ffffff" },
                "visual": { "energy": 0.8, "saturation": 0.6, "harmony": 0.7, "speed": 0.3 },
                "confidence": 0.92
            },
            "weather": { "temperature": 12.5, "condition": "Light Fog", "windSpeed": 20, "humidity": 85 },
            "evolution": { "sessionTime": 120, "interactionCount": 4, "mood": "chaotic", "phase": "climax" },
            "timeOfDay": { "hour": 2, "period": "night", "season": "winter" }
        }"##;

        let bundle: SignalBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.ai.theme, "ocean");
        assert!((bundle.ai.visual.energy - 0.8).abs() < 1e-6);
        assert!(bundle.ai.colors.supporting.is_empty());
        assert!(bundle.weather.is_foggy());
        assert_eq!(bundle.evolution.mood, Mood::Chaotic);
        assert_eq!(bundle.evolution.phase, Phase::Climax);
        let time = bundle.time_of_day.unwrap();
        assert_eq!(time.period, DayPeriod::Night);
        assert!(time.is_late_night());
    }

    #[test]
    fn test_bundle_defaults_when_sections_missing() {
        let bundle: SignalBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.time_of_day.is_none());
        assert_eq!(bundle.evolution.mood, Mood::Calm);
        assert!(!bundle.weather.is_foggy());
    }

    #[test]
    fn test_late_night_window() {
        let at = |hour| TimeOfDay {
            hour,
            period: DayPeriod::Night,
            season: Season::Winter,
        };
        assert!(at(0).is_late_night());
        assert!(at(5).is_late_night());
        assert!(!at(6).is_late_night());
        assert!(!at(22).is_late_night());
        assert!(at(23).is_late_night());
    }
}
