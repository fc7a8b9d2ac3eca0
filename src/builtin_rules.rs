//! The built-in rule set installed in every new engine.

use crate::error::MappingResult;
use crate::rule::{MappingContext, Rule, Source};
use crate::rule_table::RuleTable;
use crate::signals::{DayPeriod, Mood};
use crate::value::{ParamPath, Value, ValueKind};

/// Particle count before any multiplier is applied.
pub const BASE_PARTICLE_COUNT: f32 = 200.0;
/// Rainbow speed before the mood multiplier.
pub const BASE_RAINBOW_SPEED: f32 = 1.0;
/// Camera distance at neutral (0.5) energy.
pub const BASE_CAMERA_DISTANCE: f32 = 25.0;
/// Largest camera distance change allowed per evaluation pass.
pub const CAMERA_MAX_STEP: f32 = 2.0;

/// Rainbow speed multiplier for each session mood.
pub fn mood_speed_multiplier(mood: Mood) -> f32 {
    match mood {
        Mood::Calm => 0.5,
        Mood::Energetic => 2.0,
        Mood::Mysterious => 0.8,
        Mood::Chaotic => 2.5,
    }
}

/// Ambient light level for each period of the day.
pub fn ambient_for_period(period: DayPeriod) -> f32 {
    match period {
        DayPeriod::Night => 0.2,
        DayPeriod::Dawn => 0.5,
        DayPeriod::Morning => 0.8,
        DayPeriod::Afternoon => 1.0,
        DayPeriod::Evening => 0.6,
    }
}

fn particle_count(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    let energy_factor = 1.0 + 2.0 * ctx.ai.visual.energy;
    let weather_factor = if ctx.weather.wind_speed > 15.0 { 1.3 } else { 1.0 };
    let time_factor = if ctx.time.is_late_night() { 0.7 } else { 1.0 };
    let count = BASE_PARTICLE_COUNT * energy_factor * weather_factor * time_factor;
    Ok(Value::Number(count.round()))
}

fn rainbow_speed(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    Ok(Value::Number(
        BASE_RAINBOW_SPEED * mood_speed_multiplier(ctx.evolution.mood),
    ))
}

fn camera_distance(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    let suggested = BASE_CAMERA_DISTANCE + (ctx.ai.visual.energy - 0.5) * 10.0;
    let distance = match ctx.current_number() {
        Some(current) => suggested.clamp(current - CAMERA_MAX_STEP, current + CAMERA_MAX_STEP),
        None => suggested,
    };
    Ok(Value::Number(distance))
}

fn sphere_color(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    let primary = ctx.ai.colors.primary.trim();
    if primary.is_empty() {
        anyhow::bail!("analysis for theme '{}' has no primary colour", ctx.ai.theme);
    }
    Ok(Value::Text(primary.to_string()))
}

fn fog_enabled(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    Ok(Value::Bool(ctx.weather.is_foggy()))
}

fn fog_density(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    let base = (ctx.weather.humidity / 100.0) * 0.8;
    let bonus = if ctx.weather.is_foggy() { 0.2 } else { 0.0 };
    Ok(Value::Number(base + bonus))
}

fn ambient_intensity(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    Ok(Value::Number(ambient_for_period(ctx.time.period)))
}

fn bloom_intensity(ctx: &MappingContext<'_>) -> anyhow::Result<Value> {
    let visual = &ctx.ai.visual;
    Ok(Value::Number(visual.energy * visual.saturation * 2.0))
}

/// All built-in rules in evaluation order.
pub fn builtin_rules() -> MappingResult<Vec<Rule>> {
    Ok(vec![
        Rule::builder(ParamPath::PARTICLE_COUNT, particle_count)
            .source(Source::Hybrid)
            .priority(7)
            .bounds(50.0, 800.0)
            .safe_zone(100.0, 600.0)
            .sensitivity(0.6)
            .build()?,
        Rule::builder(ParamPath::RAINBOW_SPEED, rainbow_speed)
            .source(Source::Evolution)
            .priority(5)
            .bounds(0.1, 3.0)
            .safe_zone(0.5, 2.0)
            .sensitivity(0.3)
            .evolution_rate(0.1)
            .build()?,
        Rule::builder(ParamPath::CAMERA_DISTANCE, camera_distance)
            .source(Source::Hybrid)
            .priority(10)
            .bounds(10.0, 50.0)
            .safe_zone(15.0, 35.0)
            .sensitivity(0.1)
            .build()?,
        Rule::builder(ParamPath::SPHERE_COLOR, sphere_color)
            .source(Source::Ai)
            .priority(6)
            .output(ValueKind::Text)
            .sensitivity(0.8)
            .build()?,
        Rule::builder(ParamPath::FOG_ENABLED, fog_enabled)
            .source(Source::Weather)
            .priority(6)
            .output(ValueKind::Bool)
            .sensitivity(0.5)
            .build()?,
        Rule::builder(ParamPath::FOG_DENSITY, fog_density)
            .source(Source::Weather)
            .priority(5)
            .bounds(0.0, 1.0)
            .safe_zone(0.0, 0.8)
            .sensitivity(0.5)
            .build()?,
        Rule::builder(ParamPath::AMBIENT_INTENSITY, ambient_intensity)
            .source(Source::Time)
            .priority(4)
            .bounds(0.1, 1.5)
            .safe_zone(0.2, 1.2)
            .sensitivity(0.4)
            .build()?,
        Rule::builder(ParamPath::BLOOM_INTENSITY, bloom_intensity)
            .source(Source::Ai)
            .priority(5)
            .bounds(0.0, 3.0)
            .safe_zone(0.0, 2.0)
            .sensitivity(0.5)
            .lock_when_active(ParamPath::FOG_ENABLED)
            .build()?,
    ])
}

/// Absolute limits installed alongside the built-in rules.
pub fn builtin_safety_limits() -> Vec<(ParamPath, f32, f32)> {
    vec![
        (ParamPath::PARTICLE_COUNT, 0.0, 1000.0),
        (ParamPath::CAMERA_DISTANCE, 5.0, 100.0),
        (ParamPath::BLOOM_INTENSITY, 0.0, 2.5),
    ]
}

/// A rule table populated with the built-in rules and safety limits.
pub fn builtin_table() -> MappingResult<RuleTable> {
    let mut table = RuleTable::new();
    for rule in builtin_rules()? {
        table.register(rule)?;
    }
    for (path, min, max) in builtin_safety_limits() {
        table.set_safety_limit(path, min, max)?;
    }
    Ok(table)
}
