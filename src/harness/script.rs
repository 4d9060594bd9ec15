//! Scenarios driven by a parsed TOML definition

use bevy::log::debug;
use bevy::math::Vec3;
use serde_json::Value;
use std::collections::HashMap;

use crate::adapter::{
    AdapterError, ComponentService, EditorAdapter, EntityId, EntityService, PropertyService,
    StateQuery, StateService,
};
use crate::constants::ENTITY_NOTIFY_TIMEOUT;

use super::assertions::{AssertionError, Comparison};
use super::parser::{QueryDef, ScenarioDefinition, Step, entity_ref};
use super::poll::PollSpec;
use super::report::Label;
use super::runner::{
    Scenario, ScenarioContext, ScenarioError, ScenarioResult, default_setup, default_teardown,
};

impl From<AssertionError> for ScenarioError {
    fn from(err: AssertionError) -> Self {
        ScenarioError::Other(err.to_string())
    }
}

/// Reads one value from the editor each time it is called
type Reader = Box<dyn Fn(&dyn EditorAdapter) -> Result<Value, AdapterError>>;

/// Runs the entities and steps of one scenario file
pub struct ScriptedScenario {
    definition: ScenarioDefinition,
    entities: HashMap<String, EntityId>,
}

impl ScriptedScenario {
    pub fn new(definition: ScenarioDefinition) -> Self {
        Self {
            definition,
            entities: HashMap::new(),
        }
    }

    pub fn definition(&self) -> &ScenarioDefinition {
        &self.definition
    }

    fn entity(&self, id: &str) -> ScenarioResult<EntityId> {
        self.entities
            .get(id)
            .copied()
            .ok_or_else(|| ScenarioError::Other(format!("entity '{}' is not in the scenario", id)))
    }

    /// Replace `{ entity = "<id>" }` references with editor entity ids
    fn resolve(&self, value: &Value) -> ScenarioResult<Value> {
        if let Some(id) = entity_ref(value) {
            return Ok(Value::from(self.entity(id)?.0));
        }
        match value {
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item))
                    .collect::<ScenarioResult<_>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    fn create_entities(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        let adapter = ctx.adapter();
        let listener = adapter.subscribe_entity_created();

        for def in &self.definition.entities {
            let position = Vec3::from_array(def.position);
            let id = adapter.create_entity(def.display_name(), position)?;
            match listener.next_within(ENTITY_NOTIFY_TIMEOUT) {
                Some(announced) if announced == id => {}
                Some(announced) => {
                    return Err(ScenarioError::Other(format!(
                        "entity '{}' was created as {} but announced as {}",
                        def.id, id, announced
                    )));
                }
                None => {
                    return Err(ScenarioError::Other(format!(
                        "no creation notice for entity '{}'",
                        def.id
                    )));
                }
            }
            for component in &def.components {
                adapter.add_component(id, component)?;
            }
            self.entities.insert(def.id.clone(), id);
        }
        for def in &self.definition.entities {
            if let Some(parent) = &def.parent {
                adapter.set_parent(self.entity(&def.id)?, self.entity(parent)?)?;
            }
        }

        if let Some(stray) = listener.try_next() {
            return Err(ScenarioError::Other(format!(
                "unexpected creation notice for {}",
                stray
            )));
        }
        if !self.entities.is_empty() {
            ctx.info(format!("Created {} entities", self.entities.len()));
        }
        Ok(())
    }

    /// Build the state read a query describes
    fn reader(&self, adapter: &dyn EditorAdapter, query: &QueryDef) -> ScenarioResult<Reader> {
        Ok(match query {
            QueryDef::InstanceCount { center, radius } => {
                let query = StateQuery::InstanceCount {
                    center: Vec3::from_array(*center),
                    radius: *radius,
                };
                Box::new(move |a: &dyn EditorAdapter| a.query_state(&query))
            }
            QueryDef::EntityCount => {
                Box::new(|a: &dyn EditorAdapter| a.query_state(&StateQuery::EntityCount))
            }
            QueryDef::ComponentCount { entity } => {
                let query = StateQuery::ComponentCount {
                    entity: self.entity(entity)?,
                };
                Box::new(move |a: &dyn EditorAdapter| a.query_state(&query))
            }
            QueryDef::Property {
                entity,
                component,
                path,
            } => {
                let component = adapter.require_component(self.entity(entity)?, component)?;
                let path = path.clone();
                Box::new(move |a: &dyn EditorAdapter| a.get_property(component, &path))
            }
        })
    }

    fn run_step(&mut self, ctx: &mut ScenarioContext<'_>, step: &Step) -> ScenarioResult<()> {
        let adapter = ctx.adapter();
        match step {
            Step::AddComponent { entity, component } => {
                adapter.add_component(self.entity(entity)?, component)?;
            }
            Step::RemoveComponent { entity, component } => {
                adapter.remove_component(self.entity(entity)?, component)?;
            }
            Step::SetProperty {
                entity,
                component,
                path,
                value,
            } => {
                let id = adapter.require_component(self.entity(entity)?, component)?;
                adapter.set_property(id, path, self.resolve(value)?)?;
            }
            Step::SetParent { entity, parent } => {
                adapter.set_parent(self.entity(entity)?, self.entity(parent)?)?;
            }
            Step::DeleteEntity { entity } => {
                let id = self.entity(entity)?;
                let name = adapter.entity_name(id)?;
                adapter.delete_entity(id)?;
                self.entities.remove(entity);
                ctx.info(format!("Deleted {}", name));
            }
            Step::ExpectProperty {
                entity,
                component,
                path,
                op,
                value,
                pass,
                fail,
                critical,
            } => {
                let id = adapter.require_component(self.entity(entity)?, component)?;
                let expected = self.resolve(value)?;
                let actual = adapter.get_property(id, path)?;
                let ok = op.evaluate(&actual, &expected, self.definition.tolerance)?;
                let subject = format!("{} {} '{}'", entity, component, path);
                let label = labels(&subject, *op, &expected, &actual, pass, fail);
                record(ctx, label, ok, *critical)?;
            }
            Step::ExpectEnabled {
                entity,
                component,
                enabled,
                pass,
                fail,
                critical,
            } => {
                let id = adapter.require_component(self.entity(entity)?, component)?;
                let actual = adapter.is_component_enabled(id)?;
                let state = |on: bool| if on { "enabled" } else { "disabled" };
                let label = Label::pair(
                    pass.clone()
                        .unwrap_or_else(|| format!("{} {} is {}", entity, component, state(actual))),
                    fail.clone().unwrap_or_else(|| {
                        format!(
                            "{} {} is {}, expected {}",
                            entity,
                            component,
                            state(actual),
                            state(*enabled)
                        )
                    }),
                );
                record(ctx, label, actual == *enabled, *critical)?;
            }
            Step::ExpectComponentCount {
                entity,
                op,
                value,
                pass,
                fail,
                critical,
            } => {
                let count = adapter.components(self.entity(entity)?)?.len();
                let actual = Value::from(count);
                let expected = Value::from(*value);
                let ok = op.evaluate(&actual, &expected, 0.0)?;
                let subject = format!("{} component count", entity);
                let label = labels(&subject, *op, &expected, &actual, pass, fail);
                record(ctx, label, ok, *critical)?;
            }
            Step::WaitFor {
                query,
                op,
                value,
                timeout_secs,
                interval_secs,
                pass,
                fail,
                critical,
            } => {
                let read = self.reader(adapter, query)?;
                let expected = self.resolve(value)?;
                let tolerance = self.definition.tolerance;
                let spec = PollSpec::from_secs_f64(
                    timeout_secs.unwrap_or(ctx.poller().default_timeout().as_secs_f64()),
                    interval_secs.unwrap_or(ctx.poller().default_interval().as_secs_f64()),
                );
                debug!("Waiting up to {:?} for {} {} {}", spec.timeout, query.describe(), op, expected);

                let (satisfied, actual) =
                    wait_for_value(ctx, || read(adapter), *op, &expected, tolerance, spec)?;
                let label = labels(&query.describe(), *op, &expected, &actual, pass, fail);
                record(ctx, label, satisfied, *critical)?;
            }
            Step::Info { message } => ctx.info(message.clone()),
        }
        Ok(())
    }
}

/// Poll `read` until `op` holds; also returns the last value evaluated
fn wait_for_value(
    ctx: &ScenarioContext<'_>,
    mut read: impl FnMut() -> Result<Value, AdapterError>,
    op: Comparison,
    expected: &Value,
    tolerance: f64,
    spec: PollSpec,
) -> ScenarioResult<(bool, Value)> {
    let mut last = Value::Null;
    let satisfied = ctx.wait_for_condition_with(
        || -> ScenarioResult<bool> {
            let current = read()?;
            let ok = op.evaluate(&current, expected, tolerance)?;
            last = current;
            Ok(ok)
        },
        spec,
    )?;
    Ok((satisfied, last))
}

/// Default pass/fail messages unless the file gave its own
fn labels(
    subject: &str,
    op: Comparison,
    expected: &Value,
    actual: &Value,
    pass: &Option<String>,
    fail: &Option<String>,
) -> Label {
    Label::pair(
        pass.clone()
            .unwrap_or_else(|| format!("{} {} {}", subject, op, expected)),
        fail.clone().unwrap_or_else(|| {
            format!("{} is {}, expected {} {}", subject, actual, op, expected)
        }),
    )
}

fn record(
    ctx: &mut ScenarioContext<'_>,
    label: Label,
    condition: bool,
    critical: bool,
) -> ScenarioResult<()> {
    if critical {
        ctx.critical_result(label, condition)?;
    } else {
        ctx.result(label, condition)?;
    }
    Ok(())
}

impl Scenario for ScriptedScenario {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn setup(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        self.entities.clear();
        default_setup(ctx)?;
        self.create_entities(ctx)
    }

    fn body(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        let steps = self.definition.steps.clone();
        for step in &steps {
            self.run_step(ctx, step)?;
        }
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        self.entities.clear();
        default_teardown(ctx)
    }
}
