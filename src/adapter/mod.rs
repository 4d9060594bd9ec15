//! Editor adapter - typed boundary to the application under test
//!
//! Each editor capability gets its own trait instead of a string-dispatched
//! request bus. `EditorAdapter` bundles them; scenarios only ever talk to the
//! editor through it.
//!
//! Every call returns an explicit `AdapterResult`, so a failing host call is
//! visible in the signature rather than hidden behind a caught exception.

pub mod notifications;

use bevy::math::Vec3;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use notifications::CreationListener;

/// Property values travel as JSON so vectors, ids and scalars share one type
pub type Value = serde_json::Value;

/// Editor entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Identifies one component instance attached to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId {
    pub entity: EntityId,
    pub index: u64,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.index)
    }
}

/// Options used when creating a fresh workspace (an editor level)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub name: String,
    pub heightmap_resolution: u32,
    pub heightmap_meters_per_pixel: u32,
    pub terrain_texture_resolution: u32,
    pub use_terrain: bool,
}

impl WorkspaceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            name: crate::constants::DEFAULT_LEVEL.to_string(),
            heightmap_resolution: 1024,
            heightmap_meters_per_pixel: 1,
            terrain_texture_resolution: 4096,
            use_terrain: false,
        }
    }
}

/// Handle to an open workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceHandle {
    pub id: String,
    pub name: String,
}

/// Read-only questions about editor state that has no property path
#[derive(Debug, Clone, PartialEq)]
pub enum StateQuery {
    /// Placed vegetation instances inside the square of half-size `radius`
    InstanceCount { center: Vec3, radius: f32 },
    /// Entities in the open workspace
    EntityCount,
    /// Components attached to an entity
    ComponentCount { entity: EntityId },
}

/// Errors reported by the editor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("no workspace is open")]
    NoWorkspace,

    #[error("workspace '{0}' is already open")]
    WorkspaceBusy(String),

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    #[error("entity {entity} has no '{type_name}' component")]
    MissingComponent { entity: EntityId, type_name: String },

    #[error("entity {entity} already has a '{type_name}' component")]
    DuplicateComponent { entity: EntityId, type_name: String },

    #[error("component {component} has no property '{path}'")]
    PropertyNotFound { component: ComponentId, path: String },

    #[error("property '{path}' expects {expected}, got {actual}")]
    PropertyTypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("editor connection lost: {0}")]
    Disconnected(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

pub trait WorkspaceService {
    fn create_workspace(&self, config: &WorkspaceConfig) -> AdapterResult<WorkspaceHandle>;
    fn close_workspace(&self, handle: &WorkspaceHandle) -> AdapterResult<()>;
}

pub trait EntityService {
    fn create_entity(&self, name: &str, position: Vec3) -> AdapterResult<EntityId>;
    fn delete_entity(&self, entity: EntityId) -> AdapterResult<()>;
    fn set_parent(&self, child: EntityId, parent: EntityId) -> AdapterResult<()>;
    fn find_entity(&self, name: &str) -> AdapterResult<Option<EntityId>>;
    fn entity_name(&self, entity: EntityId) -> AdapterResult<String>;
}

pub trait ComponentService {
    fn add_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<ComponentId>;
    fn remove_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<()>;
    fn components(&self, entity: EntityId) -> AdapterResult<Vec<ComponentId>>;
    fn find_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<Option<ComponentId>>;
    fn is_component_enabled(&self, component: ComponentId) -> AdapterResult<bool>;
}

pub trait PropertyService {
    fn get_property(&self, component: ComponentId, path: &str) -> AdapterResult<Value>;
    fn set_property(&self, component: ComponentId, path: &str, value: Value) -> AdapterResult<()>;
}

pub trait StateService {
    fn query_state(&self, query: &StateQuery) -> AdapterResult<Value>;
}

pub trait LogService {
    /// Lines the editor emitted since the previous call
    fn read_recent_log_lines(&self) -> AdapterResult<Vec<String>>;
}

/// The whole editor surface a scenario can drive.
///
/// Implementations are shared by every scenario in a run and give no
/// concurrency guarantees; callers run scenarios one at a time.
pub trait EditorAdapter:
    WorkspaceService + EntityService + ComponentService + PropertyService + StateService + LogService
{
    /// Register for entity-created notifications; dropping the listener unsubscribes
    fn subscribe_entity_created(&self) -> CreationListener;

    fn shutdown(&self) -> AdapterResult<()>;

    /// Look up a component by type and fail if it is missing
    fn require_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<ComponentId> {
        self.find_component(entity, type_name)?
            .ok_or_else(|| AdapterError::MissingComponent {
                entity,
                type_name: type_name.to_string(),
            })
    }
}

/// Convert a value to a `Vec3` when it is a three-number array
pub fn value_to_vec3(value: &Value) -> Option<Vec3> {
    let items = value.as_array()?;
    if items.len() != 3 {
        return None;
    }
    let x = items[0].as_f64()? as f32;
    let y = items[1].as_f64()? as f32;
    let z = items[2].as_f64()? as f32;
    Some(Vec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_value_conversion() {
        assert_eq!(
            value_to_vec3(&serde_json::json!([1.0, 2.5, -3.0])),
            Some(Vec3::new(1.0, 2.5, -3.0))
        );
        assert_eq!(value_to_vec3(&serde_json::json!([1.0, 2.0])), None);
        assert_eq!(value_to_vec3(&serde_json::json!("x")), None);
    }

    #[test]
    fn test_error_messages() {
        let err = AdapterError::PropertyNotFound {
            component: ComponentId {
                entity: EntityId(3),
                index: 7,
            },
            path: "Configuration|Altitude Min".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "component [3]#7 has no property 'Configuration|Altitude Min'"
        );
    }
}
