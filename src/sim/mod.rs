//! Simulated editor
//!
//! A headless ECS world that implements every `EditorAdapter` service. Entity
//! and component edits apply immediately; vegetation placement converges over
//! schedule ticks, so scenarios must poll for it like they would against a
//! live editor.
//!
//! The world either ticks on a background thread (`spawn`) or only when the
//! caller steps it (`manual`).

pub mod catalog;
pub mod components;
pub mod systems;

use bevy::log::{debug, info};
use bevy::math::Vec3;
use bevy::prelude::*;
use crossbeam_channel::{Sender, bounded, select, tick};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use uuid::Uuid;

use crate::adapter::{
    AdapterError, AdapterResult, ComponentId, ComponentService, CreationListener, EditorAdapter,
    EntityId, EntityService, LogService, PropertyService, StateQuery, StateService, Value,
    WorkspaceConfig, WorkspaceHandle, WorkspaceService,
};
use crate::constants::{SIM_SETTLE_STEP, SIM_TICK};

use catalog::{lookup, resolve_enabled};
use components::{
    ActiveWorkspace, AttachedComponent, AttachedComponents, CreationSubscribers, EditorEntity,
    EditorLog, EntityIndex, IdAllocator, ParentLink, Position, SettleRate, VegetationInstances,
};
use systems::{compute_placement_targets, settle_instances};

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Time between schedule runs when ticking on a thread
    pub tick: Duration,
    /// Vegetation instances placed per area per tick
    pub settle_step: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick: SIM_TICK,
            settle_step: SIM_SETTLE_STEP,
        }
    }
}

struct SimWorld {
    world: World,
    schedule: Schedule,
    ticks: u64,
    connected: bool,
}

impl SimWorld {
    fn new(config: &SimConfig) -> Self {
        let mut world = World::new();
        world.init_resource::<EntityIndex>();
        world.init_resource::<IdAllocator>();
        world.init_resource::<EditorLog>();
        world.init_resource::<ActiveWorkspace>();
        world.init_resource::<CreationSubscribers>();
        world.insert_resource(SettleRate(config.settle_step.max(1)));

        let mut schedule = Schedule::default();
        schedule.add_systems((compute_placement_targets, settle_instances).chain());

        Self {
            world,
            schedule,
            ticks: 0,
            connected: true,
        }
    }

    fn tick(&mut self) {
        self.schedule.run(&mut self.world);
        self.ticks += 1;
    }

    fn log(&mut self, line: String) {
        debug!("[editor] {}", line);
        self.world.resource_mut::<EditorLog>().push(line);
    }

    fn require_workspace(&self) -> AdapterResult<&WorkspaceHandle> {
        self.world
            .resource::<ActiveWorkspace>()
            .0
            .as_ref()
            .ok_or(AdapterError::NoWorkspace)
    }

    fn entity(&self, id: EntityId) -> AdapterResult<Entity> {
        self.require_workspace()?;
        self.world
            .resource::<EntityIndex>()
            .0
            .get(&id)
            .copied()
            .ok_or(AdapterError::UnknownEntity(id))
    }

    fn attached(&self, id: EntityId) -> AdapterResult<&AttachedComponents> {
        let entity = self.entity(id)?;
        self.world
            .get::<AttachedComponents>(entity)
            .ok_or(AdapterError::UnknownEntity(id))
    }

    fn attached_mut(&mut self, id: EntityId) -> AdapterResult<Mut<'_, AttachedComponents>> {
        let entity = self.entity(id)?;
        self.world
            .get_mut::<AttachedComponents>(entity)
            .ok_or(AdapterError::UnknownEntity(id))
    }

    fn component(&self, id: ComponentId) -> AdapterResult<&AttachedComponent> {
        self.attached(id.entity)?
            .by_id(id)
            .ok_or(AdapterError::UnknownComponent(id))
    }

    fn despawn_all(&mut self) {
        let entities: Vec<Entity> = self
            .world
            .resource_mut::<EntityIndex>()
            .0
            .drain()
            .map(|(_, entity)| entity)
            .collect();
        for entity in entities {
            self.world.despawn(entity);
        }
    }
}

/// Coarse JSON kind used for property type checks
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("array of {}", items.len()),
        other => kind(other).to_string(),
    }
}

/// Unset properties (null) accept anything; otherwise kind and array length must match
fn compatible(current: &Value, new: &Value) -> bool {
    match (current, new) {
        (Value::Null, _) => true,
        (Value::Array(a), Value::Array(b)) => a.len() == b.len(),
        _ => kind(current) == kind(new),
    }
}

struct Ticker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn start(world: Arc<Mutex<SimWorld>>, period: Duration) -> Self {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = std::thread::spawn(move || {
            let ticks = tick(period);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticks) -> _ => {
                        let Ok(mut sim) = world.lock() else { break };
                        if !sim.connected {
                            break;
                        }
                        sim.tick();
                    }
                }
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.join();
    }
}

/// In-process editor used by the scenario runner and the tests
pub struct SimulatedEditor {
    inner: Arc<Mutex<SimWorld>>,
    ticker: Mutex<Option<Ticker>>,
}

impl SimulatedEditor {
    /// Editor whose world ticks on its own thread every `config.tick`
    pub fn spawn(config: SimConfig) -> Self {
        let inner = Arc::new(Mutex::new(SimWorld::new(&config)));
        let ticker = Ticker::start(Arc::clone(&inner), config.tick);
        info!("Simulated editor started (tick {:?})", config.tick);
        Self {
            inner,
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Editor that only advances on `step`
    pub fn manual(config: SimConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimWorld::new(&config))),
            ticker: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimWorld> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_world<T>(&self, f: impl FnOnce(&mut SimWorld) -> AdapterResult<T>) -> AdapterResult<T> {
        let mut sim = self
            .inner
            .lock()
            .map_err(|_| AdapterError::Disconnected("editor state poisoned".to_string()))?;
        if !sim.connected {
            return Err(AdapterError::Disconnected("editor has shut down".to_string()));
        }
        f(&mut sim)
    }

    /// Run the schedule `n` times
    pub fn step(&self, n: usize) {
        let mut sim = self.lock();
        for _ in 0..n {
            sim.tick();
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.lock().ticks
    }

    pub fn open_workspace_name(&self) -> Option<String> {
        self.lock()
            .world
            .resource::<ActiveWorkspace>()
            .0
            .as_ref()
            .map(|h| h.name.clone())
    }

    fn stop_ticker(&self) {
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }
    }
}

impl Drop for SimulatedEditor {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

impl WorkspaceService for SimulatedEditor {
    fn create_workspace(&self, config: &WorkspaceConfig) -> AdapterResult<WorkspaceHandle> {
        self.with_world(|sim| {
            if let Some(open) = &sim.world.resource::<ActiveWorkspace>().0 {
                return Err(AdapterError::WorkspaceBusy(open.name.clone()));
            }
            let handle = WorkspaceHandle {
                id: Uuid::new_v4().to_string(),
                name: config.name.clone(),
            };
            sim.world.resource_mut::<ActiveWorkspace>().0 = Some(handle.clone());
            sim.log(format!(
                "Level created: {} (heightmap {}, {} m/px, terrain {})",
                config.name,
                config.heightmap_resolution,
                config.heightmap_meters_per_pixel,
                if config.use_terrain { "on" } else { "off" },
            ));
            Ok(handle)
        })
    }

    fn close_workspace(&self, handle: &WorkspaceHandle) -> AdapterResult<()> {
        self.with_world(|sim| {
            let open = sim.require_workspace()?;
            if open.id != handle.id {
                return Err(AdapterError::NoWorkspace);
            }
            sim.despawn_all();
            sim.world.resource_mut::<ActiveWorkspace>().0 = None;
            sim.log(format!("Level closed: {}", handle.name));
            Ok(())
        })
    }
}

impl EntityService for SimulatedEditor {
    fn create_entity(&self, name: &str, position: Vec3) -> AdapterResult<EntityId> {
        self.with_world(|sim| {
            sim.require_workspace()?;
            let id = sim.world.resource_mut::<IdAllocator>().entity();
            let entity = sim
                .world
                .spawn((
                    EditorEntity {
                        id,
                        name: name.to_string(),
                    },
                    Position(position),
                    AttachedComponents::default(),
                    VegetationInstances::default(),
                ))
                .id();
            sim.world.resource_mut::<EntityIndex>().0.insert(id, entity);
            sim.log(format!("Entity created: {} {}", name, id));
            sim.world.resource_mut::<CreationSubscribers>().0.publish(id);
            Ok(id)
        })
    }

    fn delete_entity(&self, id: EntityId) -> AdapterResult<()> {
        self.with_world(|sim| {
            let entity = sim.entity(id)?;
            let orphans: Vec<Entity> = sim
                .world
                .query::<(Entity, &ParentLink)>()
                .iter(&sim.world)
                .filter(|(_, link)| link.0 == id)
                .map(|(e, _)| e)
                .collect();
            for orphan in orphans {
                sim.world.entity_mut(orphan).remove::<ParentLink>();
            }
            sim.world.despawn(entity);
            sim.world.resource_mut::<EntityIndex>().0.remove(&id);
            sim.log(format!("Entity deleted: {}", id));
            Ok(())
        })
    }

    fn set_parent(&self, child: EntityId, parent: EntityId) -> AdapterResult<()> {
        self.with_world(|sim| {
            let child_entity = sim.entity(child)?;
            sim.entity(parent)?;
            sim.world.entity_mut(child_entity).insert(ParentLink(parent));
            sim.log(format!("Entity {} parented to {}", child, parent));
            Ok(())
        })
    }

    fn find_entity(&self, name: &str) -> AdapterResult<Option<EntityId>> {
        self.with_world(|sim| {
            sim.require_workspace()?;
            Ok(sim
                .world
                .query::<&EditorEntity>()
                .iter(&sim.world)
                .filter(|e| e.name == name)
                .map(|e| e.id)
                .min())
        })
    }

    fn entity_name(&self, id: EntityId) -> AdapterResult<String> {
        self.with_world(|sim| {
            let entity = sim.entity(id)?;
            sim.world
                .get::<EditorEntity>(entity)
                .map(|e| e.name.clone())
                .ok_or(AdapterError::UnknownEntity(id))
        })
    }
}

impl ComponentService for SimulatedEditor {
    fn add_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<ComponentId> {
        self.with_world(|sim| {
            let spec = lookup(type_name)
                .ok_or_else(|| AdapterError::UnknownComponentType(type_name.to_string()))?;
            if sim.attached(entity)?.find(type_name).is_some() {
                return Err(AdapterError::DuplicateComponent {
                    entity,
                    type_name: type_name.to_string(),
                });
            }
            let id = sim.world.resource_mut::<IdAllocator>().component(entity);
            {
                let mut attached = sim.attached_mut(entity)?;
                attached.0.push(AttachedComponent::new(id, spec));
                resolve_enabled(&mut attached.0);
            }
            sim.log(format!("Component added: {} on {}", type_name, entity));
            Ok(id)
        })
    }

    fn remove_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<()> {
        self.with_world(|sim| {
            {
                let mut attached = sim.attached_mut(entity)?;
                let before = attached.0.len();
                attached.0.retain(|c| c.type_name != type_name);
                if attached.0.len() == before {
                    return Err(AdapterError::MissingComponent {
                        entity,
                        type_name: type_name.to_string(),
                    });
                }
                resolve_enabled(&mut attached.0);
            }
            sim.log(format!("Component removed: {} from {}", type_name, entity));
            Ok(())
        })
    }

    fn components(&self, entity: EntityId) -> AdapterResult<Vec<ComponentId>> {
        self.with_world(|sim| Ok(sim.attached(entity)?.0.iter().map(|c| c.id).collect()))
    }

    fn find_component(&self, entity: EntityId, type_name: &str) -> AdapterResult<Option<ComponentId>> {
        self.with_world(|sim| Ok(sim.attached(entity)?.find(type_name).map(|c| c.id)))
    }

    fn is_component_enabled(&self, component: ComponentId) -> AdapterResult<bool> {
        self.with_world(|sim| Ok(sim.component(component)?.enabled))
    }
}

impl PropertyService for SimulatedEditor {
    fn get_property(&self, component: ComponentId, path: &str) -> AdapterResult<Value> {
        self.with_world(|sim| {
            sim.component(component)?
                .properties
                .get(path)
                .cloned()
                .ok_or_else(|| AdapterError::PropertyNotFound {
                    component,
                    path: path.to_string(),
                })
        })
    }

    fn set_property(&self, component: ComponentId, path: &str, value: Value) -> AdapterResult<()> {
        self.with_world(|sim| {
            let line = format!("Property set: {} = {} on {}", path, value, component);
            {
                let mut attached = sim.attached_mut(component.entity)?;
                let target = attached
                    .by_id_mut(component)
                    .ok_or(AdapterError::UnknownComponent(component))?;
                let current = target
                    .properties
                    .get(path)
                    .ok_or_else(|| AdapterError::PropertyNotFound {
                        component,
                        path: path.to_string(),
                    })?;
                if !compatible(current, &value) {
                    return Err(AdapterError::PropertyTypeMismatch {
                        path: path.to_string(),
                        expected: describe(current),
                        actual: describe(&value),
                    });
                }
                target.properties.insert(path.to_string(), value);
            }
            sim.log(line);
            Ok(())
        })
    }
}

impl StateService for SimulatedEditor {
    fn query_state(&self, query: &StateQuery) -> AdapterResult<Value> {
        self.with_world(|sim| {
            sim.require_workspace()?;
            let count = match query {
                StateQuery::InstanceCount { center, radius } => sim
                    .world
                    .query::<&VegetationInstances>()
                    .iter(&sim.world)
                    .flat_map(|v| v.placed_points().iter())
                    .filter(|p| (p.x - center.x).abs() <= *radius && (p.y - center.y).abs() <= *radius)
                    .count(),
                StateQuery::EntityCount => sim.world.resource::<EntityIndex>().0.len(),
                StateQuery::ComponentCount { entity } => sim.attached(*entity)?.0.len(),
            };
            Ok(Value::from(count))
        })
    }
}

impl LogService for SimulatedEditor {
    fn read_recent_log_lines(&self) -> AdapterResult<Vec<String>> {
        self.with_world(|sim| Ok(sim.world.resource_mut::<EditorLog>().take_recent()))
    }
}

impl EditorAdapter for SimulatedEditor {
    fn subscribe_entity_created(&self) -> CreationListener {
        self.lock().world.resource_mut::<CreationSubscribers>().0.subscribe()
    }

    fn shutdown(&self) -> AdapterResult<()> {
        self.stop_ticker();
        let mut sim = self.lock();
        if sim.connected {
            sim.connected = false;
            info!("Simulated editor stopped after {} ticks", sim.ticks);
        }
        Ok(())
    }
}
