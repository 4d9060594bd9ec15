//! ECS components and resources of the simulated editor

use bevy::math::{Vec2, Vec3};
use bevy::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::adapter::notifications::CreationPublisher;
use crate::adapter::{ComponentId, EntityId, WorkspaceHandle};

use super::catalog::ComponentSpec;

/// Editor-visible identity of a world entity
#[derive(Component, Debug, Clone)]
pub struct EditorEntity {
    pub id: EntityId,
    pub name: String,
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Position(pub Vec3);

#[derive(Component, Debug, Clone, Copy)]
pub struct ParentLink(pub EntityId);

/// One editor component instance on an entity
#[derive(Debug, Clone)]
pub struct AttachedComponent {
    pub id: ComponentId,
    pub type_name: String,
    pub enabled: bool,
    pub properties: Map<String, Value>,
}

impl AttachedComponent {
    pub fn new(id: ComponentId, spec: &ComponentSpec) -> Self {
        Self {
            id,
            type_name: spec.name.to_string(),
            enabled: false,
            properties: spec.default_properties(),
        }
    }

    pub fn f32_property(&self, path: &str) -> Option<f32> {
        self.properties.get(path).and_then(Value::as_f64).map(|v| v as f32)
    }
}

/// Editor components attached to an entity, in attach order
#[derive(Component, Debug, Clone, Default)]
pub struct AttachedComponents(pub Vec<AttachedComponent>);

impl AttachedComponents {
    pub fn find(&self, type_name: &str) -> Option<&AttachedComponent> {
        self.0.iter().find(|c| c.type_name == type_name)
    }

    /// Component of this type, only if it is enabled
    pub fn enabled(&self, type_name: &str) -> Option<&AttachedComponent> {
        self.find(type_name).filter(|c| c.enabled)
    }

    pub fn by_id(&self, id: ComponentId) -> Option<&AttachedComponent> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn by_id_mut(&mut self, id: ComponentId) -> Option<&mut AttachedComponent> {
        self.0.iter_mut().find(|c| c.id == id)
    }
}

/// Vegetation placement state; `placed` walks toward `target.len()` over ticks
#[derive(Component, Debug, Clone, Default)]
pub struct VegetationInstances {
    pub target: Vec<Vec2>,
    pub placed: usize,
}

impl VegetationInstances {
    pub fn placed_points(&self) -> &[Vec2] {
        &self.target[..self.placed.min(self.target.len())]
    }
}

/// Editor id -> world entity
#[derive(Resource, Debug, Default)]
pub struct EntityIndex(pub HashMap<EntityId, Entity>);

#[derive(Resource, Debug, Default)]
pub struct IdAllocator {
    next_entity: u64,
    next_component: u64,
}

impl IdAllocator {
    pub fn entity(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }

    pub fn component(&mut self, entity: EntityId) -> ComponentId {
        self.next_component += 1;
        ComponentId {
            entity,
            index: self.next_component,
        }
    }
}

/// Lines the editor printed, with a read cursor for "recent" reads
#[derive(Resource, Debug, Default)]
pub struct EditorLog {
    lines: Vec<String>,
    cursor: usize,
}

impl EditorLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn take_recent(&mut self) -> Vec<String> {
        let recent = self.lines[self.cursor..].to_vec();
        self.cursor = self.lines.len();
        recent
    }
}

#[derive(Resource, Debug, Default)]
pub struct ActiveWorkspace(pub Option<WorkspaceHandle>);

/// Instances placed per area per tick; removals apply at once
#[derive(Resource, Debug, Clone, Copy)]
pub struct SettleRate(pub usize);

#[derive(Resource, Debug, Default)]
pub struct CreationSubscribers(pub CreationPublisher);
