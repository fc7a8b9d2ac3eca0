//! Parameter values and paths.
//!
//! Every scene parameter is addressed by a [`ParamPath`] and holds a [`Value`].
//! Paths are validated on construction so a typo surfaces when the rule is
//! built, not as a silently ignored write during a frame.

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// A parameter value: number, text, or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f32),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Numeric payload, if this is a number.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the parameter counts as "active" for `lock_when_active` checks.
    ///
    /// `true`, any non-zero number and any non-empty text are active.
    pub fn is_active(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Bool,
        }
    }
}

/// The variant a parameter holds, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Number,
    Text,
    #[serde(rename = "boolean")]
    Bool,
}

impl ValueKind {
    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Bool => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("path pattern is a valid regex")
    })
}

/// Location of a parameter in the nested scene tree, e.g. `camera.distance`.
///
/// Construct with [`ParamPath::parse`] for runtime input, or use one of the
/// associated constants for the built-in parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParamPath(Cow<'static, str>);

impl ParamPath {
    pub const PARTICLE_COUNT: ParamPath = ParamPath::from_static("particles.count");
    pub const PARTICLE_SPEED: ParamPath = ParamPath::from_static("particles.speed");
    pub const RAINBOW_SPEED: ParamPath = ParamPath::from_static("effects.rainbow.speed");
    pub const CAMERA_DISTANCE: ParamPath = ParamPath::from_static("camera.distance");
    pub const CAMERA_FOV: ParamPath = ParamPath::from_static("camera.fov");
    pub const SPHERE_COLOR: ParamPath = ParamPath::from_static("geometric.spheres.color");
    pub const SPHERE_COUNT: ParamPath = ParamPath::from_static("geometric.spheres.count");
    pub const FOG_ENABLED: ParamPath = ParamPath::from_static("effects.fog.enabled");
    pub const FOG_DENSITY: ParamPath = ParamPath::from_static("effects.fog.density");
    pub const BLOOM_INTENSITY: ParamPath = ParamPath::from_static("effects.bloom.intensity");
    pub const AMBIENT_INTENSITY: ParamPath =
        ParamPath::from_static("lighting.ambient.intensity");

    /// Wrap a literal path. Only used for the constants above, which are
    /// covered by `builtin_paths_are_valid`.
    const fn from_static(path: &'static str) -> Self {
        ParamPath(Cow::Borrowed(path))
    }

    /// Parse and validate a dot-delimited path.
    pub fn parse(path: impl Into<String>) -> Result<Self, MappingError> {
        let path = path.into();
        if path_pattern().is_match(&path) {
            Ok(ParamPath(Cow::Owned(path)))
        } else {
            Err(MappingError::InvalidPath(path))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParamPath {
    type Error = MappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ParamPath::parse(value)
    }
}

impl TryFrom<&str> for ParamPath {
    type Error = MappingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ParamPath::parse(value)
    }
}

impl From<ParamPath> for String {
    fn from(path: ParamPath) -> Self {
        path.0.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_paths_are_valid() {
        for path in [
            ParamPath::PARTICLE_COUNT,
            ParamPath::PARTICLE_SPEED,
            ParamPath::RAINBOW_SPEED,
            ParamPath::CAMERA_DISTANCE,
            ParamPath::CAMERA_FOV,
            ParamPath::SPHERE_COLOR,
            ParamPath::SPHERE_COUNT,
            ParamPath::FOG_ENABLED,
            ParamPath::FOG_DENSITY,
            ParamPath::BLOOM_INTENSITY,
            ParamPath::AMBIENT_INTENSITY,
        ] {
            assert_eq!(ParamPath::parse(path.as_str()).unwrap(), path);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(ParamPath::parse("").is_err());
        assert!(ParamPath::parse("camera.").is_err());
        assert!(ParamPath::parse(".camera").is_err());
        assert!(ParamPath::parse("camera..distance").is_err());
        assert!(ParamPath::parse("camera.distance ").is_err());
        assert!(ParamPath::parse("3d.depth").is_err());
        assert!(ParamPath::parse("effects.testValue").is_ok());
    }

    #[test]
    fn test_parsed_and_static_paths_compare_equal() {
        let parsed = ParamPath::parse("camera.distance").unwrap();
        assert_eq!(parsed, ParamPath::CAMERA_DISTANCE);

        let mut set = std::collections::HashSet::new();
        set.insert(parsed);
        assert!(set.contains(&ParamPath::CAMERA_DISTANCE));
    }

    #[test]
    fn test_segments() {
        let path = ParamPath::SPHERE_COLOR;
        let segments: Vec<&str> = path.segments().collect();
        assert_eq!(segments, vec!["geometric", "spheres", "color"]);
    }

    #[test]
    fn test_value_activity() {
        assert!(Value::Bool(true).is_active());
        assert!(!Value::Bool(false).is_active());
        assert!(Value::Number(0.5).is_active());
        assert!(!Value::Number(0.0).is_active());
        assert!(!Value::Text(String::new()).is_active());
        assert!(Value::from("fog").is_active());
        assert_eq!(Value::from("fog").kind(), ValueKind::Text);
        assert_eq!(Value::Bool(false).kind().to_string(), "boolean");
    }

    #[test]
    fn test_value_json_shapes() {
        let values: Vec<Value> = serde_json::from_str(r##"[1.5, "#ff0000", true]"##).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Number(1.5),
                Value::Text("#ff0000".to_string()),
                Value::Bool(true)
            ]
        );

        let path: ParamPath = serde_json::from_str("\"effects.fog.density\"").unwrap();
        assert_eq!(path, ParamPath::FOG_DENSITY);
        assert!(serde_json::from_str::<ParamPath>("\"effects..fog\"").is_err());
    }
}
