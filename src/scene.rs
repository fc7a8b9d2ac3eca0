//! Read access to the scene parameter tree.
//!
//! The engine only ever reads the tree through [`SceneSnapshot`]. Applying the
//! resulting updates is the caller's job; [`SceneParams::apply`] is provided for
//! callers that keep their parameters in the typed tree defined here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};
use crate::rule::Update;
use crate::value::{ParamPath, Value};

/// Read-only, path-addressable view of a parameter tree.
pub trait SceneSnapshot {
    /// Current value at `path`, or `None` if the tree has no such parameter.
    fn read(&self, path: &ParamPath) -> Option<Value>;
}

/// Untyped parameter tree keyed directly by path.
pub type ParamMap = HashMap<ParamPath, Value>;

impl SceneSnapshot for ParamMap {
    fn read(&self, path: &ParamPath) -> Option<Value> {
        self.get(path).cloned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SphereParams {
    pub color: String,
    pub count: f32,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            count: 12.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeometricParams {
    pub spheres: SphereParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticleParams {
    pub count: f32,
    pub speed: f32,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            count: 200.0,
            speed: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RainbowParams {
    pub speed: f32,
}

impl Default for RainbowParams {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FogParams {
    pub enabled: bool,
    pub density: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BloomParams {
    pub intensity: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self { intensity: 0.5 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectParams {
    pub rainbow: RainbowParams,
    pub fog: FogParams,
    pub bloom: BloomParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraParams {
    pub distance: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            distance: 25.0,
            fov: 45.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmbientParams {
    pub intensity: f32,
}

impl Default for AmbientParams {
    fn default() -> Self {
        Self { intensity: 0.8 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightingParams {
    pub ambient: AmbientParams,
}

/// The typed scene parameter tree read by the renderer every frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneParams {
    pub geometric: GeometricParams,
    pub particles: ParticleParams,
    pub effects: EffectParams,
    pub camera: CameraParams,
    pub lighting: LightingParams,
}

/// Mutable reference to one typed field of [`SceneParams`].
enum FieldMut<'a> {
    Number(&'a mut f32),
    Text(&'a mut String),
    Bool(&'a mut bool),
}

/// Maps each known path to its field, once, for both reads and writes.
macro_rules! scene_fields {
    ($($path:ident => $kind:ident $($field:ident).+;)*) => {
        impl SceneParams {
            fn field_mut(&mut self, path: &ParamPath) -> Option<FieldMut<'_>> {
                $(
                    if *path == ParamPath::$path {
                        return Some(FieldMut::$kind(&mut self.$($field).+));
                    }
                )*
                None
            }

            fn field(&self, path: &ParamPath) -> Option<Value> {
                $(
                    if *path == ParamPath::$path {
                        return Some(Value::$kind(self.$($field).+.clone()));
                    }
                )*
                None
            }
        }
    };
}

scene_fields! {
    SPHERE_COLOR => Text geometric.spheres.color;
    SPHERE_COUNT => Number geometric.spheres.count;
    PARTICLE_COUNT => Number particles.count;
    PARTICLE_SPEED => Number particles.speed;
    RAINBOW_SPEED => Number effects.rainbow.speed;
    FOG_ENABLED => Bool effects.fog.enabled;
    FOG_DENSITY => Number effects.fog.density;
    BLOOM_INTENSITY => Number effects.bloom.intensity;
    CAMERA_DISTANCE => Number camera.distance;
    CAMERA_FOV => Number camera.fov;
    AMBIENT_INTENSITY => Number lighting.ambient.intensity;
}

impl SceneParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `value` could be written at `path` without writing it.
    pub fn check(&self, path: &ParamPath, value: &Value) -> MappingResult<()> {
        let current = self
            .field(path)
            .ok_or_else(|| MappingError::UnknownPath(path.clone()))?;
        if current.kind() != value.kind() {
            return Err(MappingError::TypeMismatch {
                path: path.clone(),
                expected: current.kind().name(),
            });
        }
        Ok(())
    }

    /// Write `value` at `path`, checking the parameter's type.
    pub fn set(&mut self, path: &ParamPath, value: &Value) -> MappingResult<()> {
        self.check(path, value)?;
        match (self.field_mut(path), value) {
            (Some(FieldMut::Number(slot)), Value::Number(n)) => *slot = *n,
            (Some(FieldMut::Text(slot)), Value::Text(s)) => *slot = s.clone(),
            (Some(FieldMut::Bool(slot)), Value::Bool(b)) => *slot = *b,
            _ => {}
        }
        Ok(())
    }

    /// Apply one engine update to the tree.
    pub fn apply(&mut self, update: &Update) -> MappingResult<()> {
        self.set(&update.path, &update.value)
    }

    /// Apply a batch of updates. Every update is checked first; if any does not
    /// fit the tree, nothing is written and the first error is returned.
    pub fn apply_all<'a>(&mut self, updates: impl IntoIterator<Item = &'a Update>) -> MappingResult<()> {
        let updates: Vec<&Update> = updates.into_iter().collect();
        for update in &updates {
            self.check(&update.path, &update.value)?;
        }
        for update in updates {
            self.apply(update)?;
        }
        Ok(())
    }
}

impl SceneSnapshot for SceneParams {
    fn read(&self, path: &ParamPath) -> Option<Value> {
        self.field(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Source;

    #[test]
    fn test_read_known_and_unknown_paths() {
        let scene = SceneParams::default();
        assert_eq!(scene.read(&ParamPath::CAMERA_DISTANCE), Some(Value::Number(25.0)));
        assert_eq!(scene.read(&ParamPath::FOG_ENABLED), Some(Value::Bool(false)));

        let unknown = ParamPath::parse("effects.testValue").unwrap();
        assert_eq!(scene.read(&unknown), None);
    }

    #[test]
    fn test_set_checks_types() {
        let mut scene = SceneParams::default();
        scene.set(&ParamPath::CAMERA_DISTANCE, &Value::Number(30.0)).unwrap();
        assert_eq!(scene.camera.distance, 30.0);

        let err = scene
            .set(&ParamPath::CAMERA_DISTANCE, &Value::from("far"))
            .unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { expected: "number", .. }));

        let unknown = ParamPath::parse("camera.roll").unwrap();
        assert!(matches!(
            scene.set(&unknown, &Value::Number(1.0)),
            Err(MappingError::UnknownPath(_))
        ));
    }

    #[test]
    fn test_apply_update() {
        let mut scene = SceneParams::default();
        let update = Update {
            path: ParamPath::SPHERE_COLOR,
            value: Value::from("#0044aa"),
            source: Source::Ai,
            priority: 6,
            reason: "AI theme: ocean".to_string(),
        };
        scene.apply(&update).unwrap();
        assert_eq!(scene.geometric.spheres.color, "#0044aa");
    }

    #[test]
    fn test_apply_all_writes_nothing_when_one_update_misfits() {
        let mut scene = SceneParams::default();
        let update = |path: ParamPath, value: Value| Update {
            path,
            value,
            source: Source::Ai,
            priority: 9,
            reason: String::new(),
        };
        let batch = vec![
            update(ParamPath::PARTICLE_COUNT, Value::Number(300.0)),
            update(ParamPath::CAMERA_DISTANCE, Value::from("far")),
            update(ParamPath::FOG_ENABLED, Value::Bool(true)),
        ];

        let err = scene.apply_all(&batch).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { expected: "number", .. }));
        assert_eq!(scene, SceneParams::default());

        scene.apply_all(&[batch[0].clone(), batch[2].clone()]).unwrap();
        assert_eq!(scene.particles.count, 300.0);
        assert!(scene.effects.fog.enabled);
    }

    #[test]
    fn test_every_named_path_round_trips() {
        let mut scene = SceneParams::default();
        for path in [
            ParamPath::SPHERE_COUNT,
            ParamPath::PARTICLE_COUNT,
            ParamPath::PARTICLE_SPEED,
            ParamPath::RAINBOW_SPEED,
            ParamPath::FOG_DENSITY,
            ParamPath::BLOOM_INTENSITY,
            ParamPath::CAMERA_DISTANCE,
            ParamPath::CAMERA_FOV,
            ParamPath::AMBIENT_INTENSITY,
        ] {
            scene.set(&path, &Value::Number(0.25)).unwrap();
            assert_eq!(scene.read(&path), Some(Value::Number(0.25)), "{}", path);
        }
        scene.set(&ParamPath::SPHERE_COLOR, &Value::from("#abcdef")).unwrap();
        assert_eq!(scene.read(&ParamPath::SPHERE_COLOR), Some(Value::from("#abcdef")));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let scene: SceneParams =
            serde_json::from_str(r#"{ "camera": { "distance": 20 }, "effects": { "fog": { "enabled": true } } }"#)
                .unwrap();
        assert_eq!(scene.camera.distance, 20.0);
        assert_eq!(scene.camera.fov, 45.0);
        assert!(scene.effects.fog.enabled);
        assert_eq!(scene.particles.count, 200.0);
    }

    #[test]
    fn test_param_map_snapshot() {
        let mut map = ParamMap::new();
        map.insert(ParamPath::RAINBOW_SPEED, Value::Number(1.0));
        assert_eq!(map.read(&ParamPath::RAINBOW_SPEED), Some(Value::Number(1.0)));
        assert_eq!(map.read(&ParamPath::CAMERA_DISTANCE), None);
    }
}
