//! Human-readable justification strings attached to each update.

use crate::rule::{MappingContext, Source};

/// Describe why a rule from `source` produced its value, from the signals it read.
pub fn describe(source: Source, ctx: &MappingContext<'_>) -> String {
    match source {
        Source::Ai => {
            let atmosphere = if ctx.ai.mood.is_empty() {
                "neutral".to_string()
            } else {
                ctx.ai.mood.join(", ")
            };
            format!("AI theme: {}, atmosphere: {}", ctx.ai.theme, atmosphere)
        }
        Source::Weather => format!(
            "Weather: {}, {:.0}°C",
            ctx.weather.condition, ctx.weather.temperature
        ),
        Source::Time => format!("Time of day: {} ({:02}:00)", ctx.time.period, ctx.time.hour),
        Source::Evolution => format!(
            "Evolution phase: {}, mood: {}",
            ctx.evolution.phase, ctx.evolution.mood
        ),
        Source::Hybrid => "Hybrid mapping".to_string(),
    }
}
