//! Scenario harness
//!
//! Result recording, condition polling and the scenario lifecycle, plus the
//! TOML scenario format that drives them from files.

pub mod assertions;
pub mod log_monitor;
pub mod parser;
pub mod poll;
pub mod report;
pub mod runner;
pub mod script;

pub use assertions::{AssertionError, Comparison};
pub use log_monitor::{LogExpectations, LogValidation};
pub use parser::{
    EntityDef, ParseError, QueryDef, ScenarioDefinition, SetupDef, Step, parse_scenario_file,
};
pub use poll::{Clock, ConditionPoller, PollOutcome, PollSpec, SystemClock, wait_for_condition};
pub use report::{Label, ResultSink, Severity, TestResult};
pub use runner::{
    ClosureScenario, Phase, Scenario, ScenarioContext, ScenarioError, ScenarioParams,
    ScenarioReport, ScenarioResult, ScenarioRunner, Verdict, default_setup, default_teardown,
};
pub use script::ScriptedScenario;
