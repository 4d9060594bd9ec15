//! Scenario execution engine
//!
//! Drives one scenario through `Init -> Setup -> Running -> Teardown -> Done`.
//! Teardown runs exactly once on every way out of `Running`: normal return,
//! early return, critical failure, adapter error or panic.

use bevy::log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::adapter::{
    AdapterError, EditorAdapter, WorkspaceConfig, WorkspaceHandle, WorkspaceService,
};
use crate::constants::DEFAULT_LEVEL;

use super::poll::{ConditionPoller, PollSpec};
use super::report::{Label, ResultSink, TestResult};

/// Lifecycle position of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    Setup,
    Running,
    Teardown,
    Done,
}

/// Ways a scenario phase can stop early
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("critical failure: {0}")]
    CriticalFailure(String),

    #[error("scenario halted after a critical failure")]
    Halted,

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl ScenarioError {
    /// Already reflected in the result sink
    fn is_recorded(&self) -> bool {
        matches!(self, ScenarioError::CriticalFailure(_) | ScenarioError::Halted)
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Scenario-specific options; opaque to the runner apart from the workspace keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioParams(Map<String, Value>);

impl ScenarioParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn level(&self) -> &str {
        self.get_str("level").unwrap_or(DEFAULT_LEVEL)
    }

    /// Workspace options read from the `level` and heightmap keys
    pub fn workspace_config(&self) -> WorkspaceConfig {
        let defaults = WorkspaceConfig::default();
        let as_u32 = |key: &str, fallback: u32| {
            self.get_u64(key)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback)
        };
        WorkspaceConfig {
            name: self.level().to_string(),
            heightmap_resolution: as_u32("heightmap_resolution", defaults.heightmap_resolution),
            heightmap_meters_per_pixel: as_u32(
                "heightmap_meters_per_pixel",
                defaults.heightmap_meters_per_pixel,
            ),
            terrain_texture_resolution: as_u32(
                "terrain_texture_resolution",
                defaults.terrain_texture_resolution,
            ),
            use_terrain: self.get_bool("use_terrain").unwrap_or(defaults.use_terrain),
        }
    }
}

/// Everything a scenario phase can touch
pub struct ScenarioContext<'a> {
    adapter: &'a dyn EditorAdapter,
    sink: ResultSink,
    poller: ConditionPoller,
    params: ScenarioParams,
    workspace: Option<WorkspaceHandle>,
    phase: Phase,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(
        adapter: &'a dyn EditorAdapter,
        poller: ConditionPoller,
        params: ScenarioParams,
        name: &str,
    ) -> Self {
        Self {
            adapter,
            sink: ResultSink::with_prefix(name),
            poller,
            params,
            workspace: None,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn adapter(&self) -> &'a dyn EditorAdapter {
        self.adapter
    }

    pub fn params(&self) -> &ScenarioParams {
        &self.params
    }

    pub fn poller(&self) -> &ConditionPoller {
        &self.poller
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn workspace(&self) -> Option<&WorkspaceHandle> {
        self.workspace.as_ref()
    }

    /// Create a workspace and remember it so teardown can release it
    pub fn open_workspace(&mut self, config: &WorkspaceConfig) -> ScenarioResult<WorkspaceHandle> {
        let handle = self.adapter.create_workspace(config)?;
        self.workspace = Some(handle.clone());
        Ok(handle)
    }

    pub fn close_workspace(&mut self) -> ScenarioResult<()> {
        if let Some(handle) = self.workspace.take() {
            self.adapter.close_workspace(&handle)?;
        }
        Ok(())
    }

    /// After a critical failure only teardown may keep recording
    fn ensure_running(&self) -> ScenarioResult<()> {
        if self.phase != Phase::Teardown && self.sink.has_critical_failure() {
            return Err(ScenarioError::Halted);
        }
        Ok(())
    }

    /// Record an assertion; a failure does not stop the scenario
    pub fn result(&mut self, label: impl Into<Label>, condition: bool) -> ScenarioResult<bool> {
        self.ensure_running()?;
        Ok(self.sink.result(label, condition))
    }

    /// Record an assertion; a failure ends the body via `Err(CriticalFailure)`
    pub fn critical_result(
        &mut self,
        label: impl Into<Label>,
        condition: bool,
    ) -> ScenarioResult<bool> {
        self.ensure_running()?;
        let label = label.into();
        let message = label.message_for(false).to_string();
        if self.sink.critical_result(label, condition) {
            Ok(true)
        } else {
            Err(ScenarioError::CriticalFailure(message))
        }
    }

    /// Narration; allowed in every phase
    pub fn info(&mut self, message: impl Into<String>) {
        self.sink.info(message);
    }

    /// Poll with the context's default interval; `Ok(false)` on timeout
    pub fn wait_for_condition<E>(
        &self,
        predicate: impl FnMut() -> Result<bool, E>,
        timeout: Duration,
    ) -> ScenarioResult<bool>
    where
        ScenarioError: From<E>,
    {
        self.ensure_running()?;
        Ok(self.poller.wait_for_condition(predicate, timeout)?)
    }

    pub fn wait_for_condition_with<E>(
        &self,
        predicate: impl FnMut() -> Result<bool, E>,
        spec: PollSpec,
    ) -> ScenarioResult<bool>
    where
        ScenarioError: From<E>,
    {
        self.ensure_running()?;
        Ok(self.poller.wait_for_condition_with(predicate, spec)?)
    }
}

/// Open a workspace from the `level` param
pub fn default_setup(ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
    let config = ctx.params().workspace_config();
    ctx.open_workspace(&config)?;
    Ok(())
}

/// Close whatever workspace the context acquired
pub fn default_teardown(ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
    ctx.close_workspace()
}

/// One end-to-end test case
pub trait Scenario {
    fn name(&self) -> &str;

    fn setup(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        default_setup(ctx)
    }

    fn body(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()>;

    fn teardown(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        default_teardown(ctx)
    }
}

type PhaseFn<'f> = Box<dyn FnMut(&mut ScenarioContext<'_>) -> ScenarioResult<()> + 'f>;

/// Scenario assembled from closures
pub struct ClosureScenario<'f> {
    name: String,
    setup: Option<PhaseFn<'f>>,
    body: PhaseFn<'f>,
    teardown: Option<PhaseFn<'f>>,
}

impl<'f> ClosureScenario<'f> {
    pub fn new(
        name: impl Into<String>,
        body: impl FnMut(&mut ScenarioContext<'_>) -> ScenarioResult<()> + 'f,
    ) -> Self {
        Self {
            name: name.into(),
            setup: None,
            body: Box::new(body),
            teardown: None,
        }
    }

    pub fn with_setup(
        mut self,
        setup: impl FnMut(&mut ScenarioContext<'_>) -> ScenarioResult<()> + 'f,
    ) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn with_teardown(
        mut self,
        teardown: impl FnMut(&mut ScenarioContext<'_>) -> ScenarioResult<()> + 'f,
    ) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }
}

impl Scenario for ClosureScenario<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        match self.setup.as_mut() {
            Some(setup) => setup(ctx),
            None => default_setup(ctx),
        }
    }

    fn body(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        (self.body)(ctx)
    }

    fn teardown(&mut self, ctx: &mut ScenarioContext<'_>) -> ScenarioResult<()> {
        match self.teardown.as_mut() {
            Some(teardown) => teardown(ctx),
            None => default_teardown(ctx),
        }
    }
}

/// Aggregate outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Final record of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub verdict: Verdict,
    pub results: Vec<TestResult>,
    pub phases: Vec<Phase>,
    pub duration: Duration,
    /// Error that ended setup or body early, if any
    pub error: Option<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn lines(&self) -> Vec<String> {
        self.results.iter().map(ToString::to_string).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

/// Runs scenarios one at a time against a shared adapter
pub struct ScenarioRunner<'a> {
    adapter: &'a dyn EditorAdapter,
    poller: ConditionPoller,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(adapter: &'a dyn EditorAdapter) -> Self {
        Self {
            adapter,
            poller: ConditionPoller::default(),
        }
    }

    pub fn with_poller(mut self, poller: ConditionPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn run(&self, scenario: &mut dyn Scenario, params: ScenarioParams) -> ScenarioReport {
        let started = Instant::now();
        let name = scenario.name().to_string();
        let mut ctx = ScenarioContext::new(self.adapter, self.poller.clone(), params, &name);
        let mut phases = vec![Phase::Init];
        let mut error = None;

        enter(&name, &mut phases, &mut ctx, Phase::Setup);
        match guarded(|| scenario.setup(&mut ctx)) {
            Ok(()) => {
                enter(&name, &mut phases, &mut ctx, Phase::Running);
                if let Err(e) = guarded(|| scenario.body(&mut ctx)) {
                    if !e.is_recorded() {
                        let message = match &e {
                            ScenarioError::Panicked(msg) => format!("Scenario panicked: {}", msg),
                            other => format!("Unexpected error: {}", other),
                        };
                        ctx.sink.result(message, false);
                    }
                    error = Some(e.to_string());
                }
                enter(&name, &mut phases, &mut ctx, Phase::Teardown);
                run_teardown(scenario, &mut ctx);
            }
            Err(e) => {
                if !e.is_recorded() {
                    ctx.sink.result(format!("Setup failed: {}", e), false);
                }
                error = Some(e.to_string());
                // Best effort release of a partially acquired workspace
                if ctx.workspace.is_some() {
                    enter(&name, &mut phases, &mut ctx, Phase::Teardown);
                    run_teardown(scenario, &mut ctx);
                }
            }
        }
        enter(&name, &mut phases, &mut ctx, Phase::Done);

        let verdict = if ctx.sink.passed() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        info!("Scenario '{}' finished: {}", name, verdict);

        ScenarioReport {
            name,
            verdict,
            results: ctx.sink.into_records(),
            phases,
            duration: started.elapsed(),
            error,
        }
    }
}

fn enter(name: &str, phases: &mut Vec<Phase>, ctx: &mut ScenarioContext<'_>, phase: Phase) {
    debug!("Scenario '{}' -> {:?}", name, phase);
    ctx.phase = phase;
    phases.push(phase);
}

fn run_teardown(scenario: &mut dyn Scenario, ctx: &mut ScenarioContext<'_>) {
    if let Err(e) = guarded(|| scenario.teardown(&mut *ctx)) {
        warn!("Teardown of '{}' failed: {}", scenario.name(), e);
        ctx.info(format!("Teardown error: {}", e));
    }
}

/// Run a phase, turning a panic into `ScenarioError::Panicked`
fn guarded(phase: impl FnOnce() -> ScenarioResult<()>) -> ScenarioResult<()> {
    match panic::catch_unwind(AssertUnwindSafe(phase)) {
        Ok(result) => result,
        Err(payload) => Err(ScenarioError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ComponentService, EntityService, StateQuery, StateService};
    use crate::sim::{SimConfig, SimulatedEditor};
    use bevy::math::Vec3;
    use std::cell::Cell;

    fn editor() -> SimulatedEditor {
        SimulatedEditor::manual(SimConfig::default())
    }

    #[test]
    fn test_happy_path_phases() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let mut scenario = ClosureScenario::new("create_level", |ctx| {
            let open = ctx.workspace().is_some();
            ctx.result(("Level created", "Level not created"), open)?;
            Ok(())
        });

        let report = runner.run(&mut scenario, ScenarioParams::new().set("level", "unit_level"));

        assert!(report.passed());
        assert_eq!(
            report.phases,
            vec![Phase::Init, Phase::Setup, Phase::Running, Phase::Teardown, Phase::Done]
        );
        assert_eq!(report.lines(), vec!["Success: Level created"]);
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_critical_failure_skips_rest_of_body() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let teardowns = Cell::new(0);
        let reached_end = Cell::new(false);

        let mut scenario = ClosureScenario::new("fail_fast", |ctx| {
            ctx.result(("first ok", "first bad"), true)?;
            ctx.critical_result(("ok", "bad"), false)?;
            reached_end.set(true);
            ctx.result(("never", "never"), true)?;
            Ok(())
        })
        .with_teardown(|ctx| {
            teardowns.set(teardowns.get() + 1);
            default_teardown(ctx)
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert!(!reached_end.get());
        assert_eq!(teardowns.get(), 1);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.lines()[1], "Critical Failure: bad");
        assert_eq!(report.error.as_deref(), Some("critical failure: bad"));
        assert_eq!(*report.phases.last().unwrap(), Phase::Done);
    }

    #[test]
    fn test_ignored_critical_failure_still_halts() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);

        let mut scenario = ClosureScenario::new("ignores_critical", |ctx| {
            let _ = ctx.critical_result(("ok", "bad"), false);
            let later = ctx.result(("later", "later"), true);
            assert!(matches!(later, Err(ScenarioError::Halted)));
            later?;
            Ok(())
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn test_teardown_can_record_after_critical_failure() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let teardown_phase = Cell::new(Phase::Init);

        let mut scenario = ClosureScenario::new("critical_then_cleanup", |ctx| {
            ctx.critical_result(("ok", "bad"), false)?;
            Ok(())
        })
        .with_teardown(|ctx| {
            teardown_phase.set(ctx.phase());
            ctx.result(("cleanup checked", "cleanup incomplete"), true)?;
            default_teardown(ctx)
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(teardown_phase.get(), Phase::Teardown);
        assert_eq!(
            report.lines(),
            vec!["Critical Failure: bad", "Success: cleanup checked"]
        );
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_lost_connection_while_polling() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor)
            .with_poller(ConditionPoller::default().with_default_interval(Duration::from_millis(5)));
        let teardowns = Cell::new(0);
        let reached_end = Cell::new(false);

        let mut scenario = ClosureScenario::new("editor_disconnects", |ctx| {
            let mut calls = 0;
            let settled = ctx.wait_for_condition(
                || {
                    calls += 1;
                    if calls == 2 {
                        Err(AdapterError::Disconnected("socket closed".to_string()))
                    } else {
                        Ok(false)
                    }
                },
                Duration::from_secs(2),
            )?;
            reached_end.set(true);
            ctx.result("settled", settled)?;
            Ok(())
        })
        .with_teardown(|ctx| {
            teardowns.set(teardowns.get() + 1);
            default_teardown(ctx)
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert!(!reached_end.get());
        assert_eq!(teardowns.get(), 1);
        assert_eq!(
            report.lines(),
            vec!["Failure: Unexpected error: editor connection lost: socket closed"]
        );
        assert_eq!(
            report.phases,
            vec![Phase::Init, Phase::Setup, Phase::Running, Phase::Teardown, Phase::Done]
        );
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_adapter_error_recorded_and_teardown_runs() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let teardowns = Cell::new(0);

        let mut scenario = ClosureScenario::new("bad_component", |ctx| {
            let entity = ctx.adapter().create_entity("thing", Vec3::ZERO)?;
            ctx.adapter().add_component(entity, "Not A Component")?;
            ctx.result("unreachable", true)?;
            Ok(())
        })
        .with_teardown(|ctx| {
            teardowns.set(teardowns.get() + 1);
            default_teardown(ctx)
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(teardowns.get(), 1);
        assert_eq!(
            report.lines(),
            vec!["Failure: Unexpected error: unknown component type 'Not A Component'"]
        );
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_panicking_body_is_contained() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let teardowns = Cell::new(0);

        let mut scenario = ClosureScenario::new("panics", |_ctx| -> ScenarioResult<()> {
            panic!("index out of range");
        })
        .with_teardown(|ctx| {
            teardowns.set(teardowns.get() + 1);
            default_teardown(ctx)
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(teardowns.get(), 1);
        assert_eq!(report.lines(), vec!["Failure: Scenario panicked: index out of range"]);
        assert_eq!(*report.phases.last().unwrap(), Phase::Done);
    }

    #[test]
    fn test_setup_failure_skips_teardown() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);
        let teardowns = Cell::new(0);
        let bodies = Cell::new(0);

        let mut scenario = ClosureScenario::new("setup_fails", |_ctx| {
            bodies.set(bodies.get() + 1);
            Ok(())
        })
        .with_setup(|_ctx| Err(ScenarioError::Other("editor not ready".to_string())))
        .with_teardown(|_ctx| {
            teardowns.set(teardowns.get() + 1);
            Ok(())
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(bodies.get(), 0);
        assert_eq!(teardowns.get(), 0);
        assert_eq!(report.phases, vec![Phase::Init, Phase::Setup, Phase::Done]);
        assert_eq!(report.lines(), vec!["Failure: Setup failed: editor not ready"]);
    }

    #[test]
    fn test_partial_setup_gets_best_effort_teardown() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);

        let mut scenario = ClosureScenario::new("partial_setup", |_ctx| Ok(())).with_setup(|ctx| {
            default_setup(ctx)?;
            Err(ScenarioError::Other("asset missing".to_string()))
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(
            report.phases,
            vec![Phase::Init, Phase::Setup, Phase::Teardown, Phase::Done]
        );
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_critical_failure_in_setup_recorded_once() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);

        let mut scenario = ClosureScenario::new("setup_critical", |_ctx| Ok(())).with_setup(|ctx| {
            default_setup(ctx)?;
            ctx.critical_result(("level ready", "level not ready"), false)?;
            Ok(())
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.lines(), vec!["Critical Failure: level not ready"]);
        assert_eq!(report.error.as_deref(), Some("critical failure: level not ready"));
        assert_eq!(
            report.phases,
            vec![Phase::Init, Phase::Setup, Phase::Teardown, Phase::Done]
        );
        assert_eq!(editor.open_workspace_name(), None);
    }

    #[test]
    fn test_teardown_error_keeps_verdict() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);

        let mut scenario = ClosureScenario::new("teardown_fails", |ctx| {
            ctx.result("body ok", true)?;
            Ok(())
        })
        .with_teardown(|ctx| {
            default_teardown(ctx)?;
            Err(ScenarioError::Other("could not delete level".to_string()))
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());

        assert!(report.passed());
        assert_eq!(
            report.lines(),
            vec!["Success: body ok", "Info: Teardown error: could not delete level"]
        );
    }

    #[test]
    fn test_second_workspace_reuses_editor() {
        let editor = editor();
        let runner = ScenarioRunner::new(&editor);

        for level in ["level_a", "level_b"] {
            let mut scenario = ClosureScenario::new(level, |ctx| {
                let count = ctx.adapter().query_state(&StateQuery::EntityCount)?;
                ctx.result("empty level", count == serde_json::json!(0))?;
                ctx.adapter().create_entity("leftover", Vec3::ZERO)?;
                Ok(())
            });
            let report = runner.run(&mut scenario, ScenarioParams::new().set("level", level));
            assert!(report.passed(), "{:?}", report.lines());
        }
    }

    #[test]
    fn test_wait_for_condition_against_ticking_editor() {
        let editor = SimulatedEditor::spawn(SimConfig::default());
        let runner = ScenarioRunner::new(&editor)
            .with_poller(ConditionPoller::default().with_default_interval(Duration::from_millis(5)));

        let mut scenario = ClosureScenario::new("ticks", |ctx| {
            let adapter = ctx.adapter();
            let start = editor.tick_count();
            let advanced = ctx.wait_for_condition(
                || Ok::<_, AdapterError>(editor.tick_count() >= start + 3),
                Duration::from_secs(2),
            )?;
            ctx.result(("editor ticked", "editor did not tick"), advanced)?;
            let open = adapter.create_workspace(&WorkspaceConfig::named("other"));
            ctx.result("second workspace rejected", open.is_err())?;
            Ok(())
        });

        let report = runner.run(&mut scenario, ScenarioParams::new());
        editor.shutdown().unwrap();
        assert!(report.passed(), "{:?}", report.lines());
    }
}
