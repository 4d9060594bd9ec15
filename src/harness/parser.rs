//! TOML scenario file parsing

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{DEFAULT_FLOAT_TOLERANCE, MAX_POLL_TIMEOUT};

use super::assertions::Comparison;
use super::log_monitor::LogExpectations;
use super::runner::ScenarioParams;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid scenario {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Complete scenario definition from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub setup: SetupDef,
    /// Free-form values handed to the scenario as params
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect_log: LogExpectations,
}

fn default_tolerance() -> f64 {
    DEFAULT_FLOAT_TOLERANCE
}

/// Level the scenario runs in
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupDef {
    pub level: Option<String>,
    pub heightmap_resolution: Option<u32>,
    pub heightmap_meters_per_pixel: Option<u32>,
    pub terrain_texture_resolution: Option<u32>,
    pub use_terrain: Option<bool>,
}

/// Entity created during setup
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDef {
    /// Name steps use to refer to this entity
    pub id: String,
    /// Editor-visible name; defaults to `id`
    pub name: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub components: Vec<String>,
    pub parent: Option<String>,
}

impl EntityDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Something that can be read from the editor and compared
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryDef {
    InstanceCount {
        center: [f32; 3],
        radius: f32,
    },
    EntityCount,
    ComponentCount {
        entity: String,
    },
    Property {
        entity: String,
        component: String,
        path: String,
    },
}

impl QueryDef {
    pub fn describe(&self) -> String {
        match self {
            QueryDef::InstanceCount { center, radius } => format!(
                "Instances within {} of ({}, {}, {})",
                radius, center[0], center[1], center[2]
            ),
            QueryDef::EntityCount => "Entity count".to_string(),
            QueryDef::ComponentCount { entity } => format!("Component count of {}", entity),
            QueryDef::Property {
                entity,
                component,
                path,
            } => format!("{} {} '{}'", entity, component, path),
        }
    }

    fn entity(&self) -> Option<&str> {
        match self {
            QueryDef::ComponentCount { entity } | QueryDef::Property { entity, .. } => {
                Some(entity.as_str())
            }
            _ => None,
        }
    }
}

/// One scripted action or expectation, run in file order
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    AddComponent {
        entity: String,
        component: String,
    },
    RemoveComponent {
        entity: String,
        component: String,
    },
    SetProperty {
        entity: String,
        component: String,
        path: String,
        value: Value,
    },
    SetParent {
        entity: String,
        parent: String,
    },
    DeleteEntity {
        entity: String,
    },
    ExpectProperty {
        entity: String,
        component: String,
        path: String,
        #[serde(default)]
        op: Comparison,
        value: Value,
        pass: Option<String>,
        fail: Option<String>,
        #[serde(default)]
        critical: bool,
    },
    ExpectEnabled {
        entity: String,
        component: String,
        #[serde(default = "enabled_by_default")]
        enabled: bool,
        pass: Option<String>,
        fail: Option<String>,
        #[serde(default)]
        critical: bool,
    },
    ExpectComponentCount {
        entity: String,
        #[serde(default)]
        op: Comparison,
        value: u64,
        pass: Option<String>,
        fail: Option<String>,
        #[serde(default)]
        critical: bool,
    },
    WaitFor {
        query: QueryDef,
        #[serde(default)]
        op: Comparison,
        value: Value,
        timeout_secs: Option<f64>,
        interval_secs: Option<f64>,
        pass: Option<String>,
        fail: Option<String>,
        #[serde(default)]
        critical: bool,
    },
    Info {
        message: String,
    },
}

fn enabled_by_default() -> bool {
    true
}

/// `{ entity = "<id>" }` in a property value names a scenario entity
pub fn entity_ref(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("entity").and_then(Value::as_str),
        _ => None,
    }
}

fn collect_entity_refs<'a>(value: &'a Value, refs: &mut Vec<&'a str>) {
    if let Some(id) = entity_ref(value) {
        refs.push(id);
    } else if let Value::Array(items) = value {
        for item in items {
            collect_entity_refs(item, refs);
        }
    }
}

impl Step {
    /// Entity ids this step refers to, including references inside values
    fn entity_refs(&self) -> Vec<&str> {
        let mut refs = match self {
            Step::AddComponent { entity, .. }
            | Step::RemoveComponent { entity, .. }
            | Step::SetProperty { entity, .. }
            | Step::DeleteEntity { entity }
            | Step::ExpectProperty { entity, .. }
            | Step::ExpectEnabled { entity, .. }
            | Step::ExpectComponentCount { entity, .. } => vec![entity.as_str()],
            Step::SetParent { entity, parent } => vec![entity.as_str(), parent.as_str()],
            Step::WaitFor { query, .. } => query.entity().into_iter().collect(),
            Step::Info { .. } => Vec::new(),
        };
        match self {
            Step::SetProperty { value, .. }
            | Step::ExpectProperty { value, .. }
            | Step::WaitFor { value, .. } => collect_entity_refs(value, &mut refs),
            _ => {}
        }
        refs
    }

    fn check_wait_times(&self) -> Result<(), String> {
        let Step::WaitFor {
            timeout_secs,
            interval_secs,
            ..
        } = self
        else {
            return Ok(());
        };
        let max = MAX_POLL_TIMEOUT.as_secs_f64();
        for (field, secs) in [("timeout_secs", timeout_secs), ("interval_secs", interval_secs)] {
            if let Some(secs) = secs {
                if !(0.0..=max).contains(secs) {
                    return Err(format!("{} must be between 0 and {}, got {}", field, max, secs));
                }
            }
        }
        Ok(())
    }
}

impl ScenarioDefinition {
    /// Parse and validate TOML text; `origin` only labels errors
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ParseError> {
        let definition: ScenarioDefinition =
            toml::from_str(content).map_err(|source| ParseError::Toml {
                path: origin.to_path_buf(),
                source,
            })?;
        definition.validate().map_err(|message| ParseError::Invalid {
            path: origin.to_path_buf(),
            message,
        })?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), String> {
        let mut ids = HashSet::new();
        for entity in &self.entities {
            if !ids.insert(entity.id.as_str()) {
                return Err(format!("duplicate entity id '{}'", entity.id));
            }
        }
        for entity in &self.entities {
            if let Some(parent) = &entity.parent {
                if !ids.contains(parent.as_str()) {
                    return Err(format!("entity '{}' has unknown parent '{}'", entity.id, parent));
                }
            }
        }
        let mut deleted = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            for entity in step.entity_refs() {
                if !ids.contains(entity) {
                    return Err(format!("step {} refers to unknown entity '{}'", i + 1, entity));
                }
                if deleted.contains(entity) {
                    return Err(format!("step {} refers to deleted entity '{}'", i + 1, entity));
                }
            }
            step.check_wait_times()
                .map_err(|message| format!("step {}: {}", i + 1, message))?;
            if let Step::DeleteEntity { entity } = step {
                deleted.insert(entity.as_str());
            }
        }
        Ok(())
    }

    /// Setup options and `[params]` merged into runner params
    pub fn params(&self) -> ScenarioParams {
        let mut params = ScenarioParams::from_map(self.params.clone());
        if let Some(level) = &self.setup.level {
            params.insert("level", level.clone());
        }
        if let Some(v) = self.setup.heightmap_resolution {
            params.insert("heightmap_resolution", v);
        }
        if let Some(v) = self.setup.heightmap_meters_per_pixel {
            params.insert("heightmap_meters_per_pixel", v);
        }
        if let Some(v) = self.setup.terrain_texture_resolution {
            params.insert("terrain_texture_resolution", v);
        }
        if let Some(v) = self.setup.use_terrain {
            params.insert("use_terrain", v);
        }
        params
    }
}

/// Parse a scenario file from path
pub fn parse_scenario_file(path: &Path) -> Result<ScenarioDefinition, ParseError> {
    let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ScenarioDefinition::from_toml(&content, path)
}
