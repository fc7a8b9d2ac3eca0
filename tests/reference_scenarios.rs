//! End-to-end passes over the built-in rule set.
//!
//! Run with: cargo test --test reference_scenarios

use chrono::NaiveDate;
use scene_mapper::clock::FixedClock;
use scene_mapper::meta_mapping::{overrides_to_updates, RuleOverride};
use scene_mapper::signals::{AiAnalysis, EvolutionState, Mood, WeatherReading};
use scene_mapper::{
    merge_updates, resolve_conflicts, MappingEngine, ParamMap, ParamPath, Rule, RulePatch,
    SceneParams, Source, Update, Value,
};

/// Engine whose clock reads 02:15 on a winter night.
fn engine_at_2am() -> MappingEngine {
    let at = NaiveDate::from_ymd_opt(2024, 1, 10)
        .unwrap()
        .and_hms_opt(2, 15, 0)
        .unwrap();
    MappingEngine::with_builtin_rules()
        .unwrap()
        .with_clock(FixedClock(at))
}

fn ai_with_energy(energy: f32) -> AiAnalysis {
    let mut ai = AiAnalysis {
        theme: "aurora".to_string(),
        mood: vec!["ethereal".to_string()],
        ..Default::default()
    };
    ai.colors.primary = "#22ffaa".to_string();
    ai.visual.energy = energy;
    ai
}

fn scene_with(entries: &[(ParamPath, f32)]) -> ParamMap {
    entries
        .iter()
        .map(|(path, value)| (path.clone(), Value::Number(*value)))
        .collect()
}

#[test]
fn particle_count_combines_energy_wind_and_night() {
    let engine = engine_at_2am();
    let weather = WeatherReading {
        wind_speed: 20.0,
        condition: "clear".to_string(),
        ..Default::default()
    };
    let scene = scene_with(&[(ParamPath::PARTICLE_COUNT, 200.0)]);

    let report = engine.evaluate(&ai_with_energy(0.8), &weather, &scene, &EvolutionState::default());

    let update = report.update_for(&ParamPath::PARTICLE_COUNT).unwrap();
    assert_eq!(update.value, Value::Number(473.0));
    assert_eq!(update.source, Source::Hybrid);
    assert_eq!(update.priority, 7);
    assert_eq!(update.reason, "Hybrid mapping");
}

#[test]
fn chaotic_rainbow_speed_is_nudged_to_safe_zone_edge() {
    let engine = engine_at_2am();
    let evolution = EvolutionState {
        mood: Mood::Chaotic,
        ..Default::default()
    };
    let scene = scene_with(&[(ParamPath::RAINBOW_SPEED, 1.0)]);

    let report = engine.evaluate(&ai_with_energy(0.5), &WeatherReading::default(), &scene, &evolution);

    let update = report.update_for(&ParamPath::RAINBOW_SPEED).unwrap();
    assert_eq!(update.value, Value::Number(2.0));
    assert_eq!(update.source, Source::Evolution);
    assert_eq!(update.reason, "Evolution phase: intro, mood: chaotic");
}

#[test]
fn camera_distance_moves_at_most_two_units() {
    let engine = engine_at_2am();
    let scene = scene_with(&[(ParamPath::CAMERA_DISTANCE, 20.0)]);
    let ai = ai_with_energy(0.9);

    // With sensitivity 0.1 the 2-unit step is below the 18.01 threshold and is held back.
    let report = engine.evaluate(&ai, &WeatherReading::default(), &scene, &EvolutionState::default());
    assert!(report.update_for(&ParamPath::CAMERA_DISTANCE).is_none());
    let held = report
        .suppressed
        .iter()
        .find(|u| u.path == ParamPath::CAMERA_DISTANCE)
        .unwrap();
    assert_eq!(held.value, Value::Number(22.0));

    // Undamped, the same rate-limited candidate is emitted.
    engine
        .patch_rule(&ParamPath::CAMERA_DISTANCE, RulePatch::new().sensitivity(1.0))
        .unwrap();
    let report = engine.evaluate(&ai, &WeatherReading::default(), &scene, &EvolutionState::default());
    let update = report.update_for(&ParamPath::CAMERA_DISTANCE).unwrap();
    assert_eq!(update.value, Value::Number(22.0));
    assert_eq!(update.priority, 10);
}

#[test]
fn locked_camera_distance_is_never_evaluated() {
    let engine = engine_at_2am();
    engine
        .patch_rule(&ParamPath::CAMERA_DISTANCE, RulePatch::new().sensitivity(1.0))
        .unwrap();
    engine.lock(ParamPath::CAMERA_DISTANCE);
    engine.lock(ParamPath::CAMERA_DISTANCE);

    let scene = scene_with(&[(ParamPath::CAMERA_DISTANCE, 20.0)]);
    let report = engine.evaluate(
        &ai_with_energy(0.9),
        &WeatherReading::default(),
        &scene,
        &EvolutionState::default(),
    );

    assert!(report.update_for(&ParamPath::CAMERA_DISTANCE).is_none());
    assert!(report.suppressed.iter().all(|u| u.path != ParamPath::CAMERA_DISTANCE));

    engine.unlock(&ParamPath::CAMERA_DISTANCE);
    let report = engine.evaluate(
        &ai_with_energy(0.9),
        &WeatherReading::default(),
        &scene,
        &EvolutionState::default(),
    );
    assert!(report.update_for(&ParamPath::CAMERA_DISTANCE).is_some());
}

#[test]
fn higher_priority_producer_wins_shared_path() {
    let path = ParamPath::parse("effects.testValue").unwrap();
    let engine = engine_at_2am();
    engine
        .register_rule(
            Rule::builder(path.clone(), |_| Ok(Value::Number(10.0)))
                .source(Source::Weather)
                .priority(3)
                .bounds(0.0, 100.0)
                .build()
                .unwrap(),
        )
        .unwrap();

    let report = engine.evaluate(
        &ai_with_energy(0.5),
        &WeatherReading::default(),
        &ParamMap::new(),
        &EvolutionState::default(),
    );
    assert_eq!(report.update_for(&path).unwrap().value, Value::Number(10.0));

    let proposals = vec![RuleOverride {
        path: "effects.testValue".to_string(),
        value: Value::Number(50.0),
        priority: 9,
        reason: "brighter".to_string(),
    }];
    let merged = merge_updates(report.updates.clone(), overrides_to_updates(&engine, proposals));

    let for_path: Vec<&Update> = merged.iter().filter(|u| u.path == path).collect();
    assert_eq!(for_path.len(), 1);
    assert_eq!(for_path[0].value, Value::Number(50.0));
    assert_eq!(for_path[0].source, Source::Ai);
    assert_eq!(for_path[0].priority, 9);
}

#[test]
fn resolve_conflicts_keeps_highest_priority() {
    let path = ParamPath::parse("effects.testValue").unwrap();
    let candidate = |value: f32, source: Source, priority: u8| Update {
        path: path.clone(),
        value: Value::Number(value),
        source,
        priority,
        reason: String::new(),
    };

    let resolved = resolve_conflicts(vec![
        candidate(10.0, Source::Weather, 3),
        candidate(50.0, Source::Evolution, 9),
    ]);
    assert_eq!(resolved, vec![candidate(50.0, Source::Evolution, 9)]);
}

#[test]
fn failing_rule_does_not_block_the_pass() {
    let engine = engine_at_2am();
    engine
        .register_rule(
            Rule::builder(ParamPath::parse("effects.broken").unwrap(), |ctx| {
                anyhow::bail!("no reading for theme {}", ctx.ai.theme)
            })
            .priority(9)
            .build()
            .unwrap(),
        )
        .unwrap();

    let scene = SceneParams::default();
    let evolution = EvolutionState {
        mood: Mood::Energetic,
        ..Default::default()
    };
    let report = engine.evaluate(&ai_with_energy(0.8), &WeatherReading::default(), &scene, &evolution);

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].to_string().contains("no reading for theme aurora"));
    assert!(report.update_for(&ParamPath::RAINBOW_SPEED).is_some());
    assert!(report.update_for(&ParamPath::SPHERE_COLOR).is_some());
}

#[test]
fn updates_apply_cleanly_to_typed_scene() {
    let engine = engine_at_2am();
    let mut scene = SceneParams::default();
    let weather = WeatherReading {
        condition: "Dense fog".to_string(),
        humidity: 90.0,
        wind_speed: 5.0,
        temperature: 3.0,
        ..Default::default()
    };

    let report = engine.evaluate(&ai_with_energy(0.6), &weather, &scene, &EvolutionState::default());
    assert!(report.is_clean());
    scene.apply_all(&report.updates).unwrap();

    assert!(scene.effects.fog.enabled);
    assert_eq!(scene.geometric.spheres.color, "#22ffaa");
    let fog = report.update_for(&ParamPath::FOG_ENABLED).unwrap();
    assert_eq!(fog.reason, "Weather: Dense fog, 3°C");
    // Night-time ambient light comes from the engine clock.
    assert_eq!(scene.lighting.ambient.intensity, 0.2);

    // Fog is now active in the scene, so the bloom rule stands down.
    let report = engine.evaluate(&ai_with_energy(1.0), &weather, &scene, &EvolutionState::default());
    assert!(report.update_for(&ParamPath::BLOOM_INTENSITY).is_none());
}
