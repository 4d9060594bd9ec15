//! Editor Harness - scenario-driven tests against an editor adapter
//!
//! This crate provides result recording, condition polling and the scenario
//! lifecycle, a simulated editor to run them against, and TOML scenario files.

pub mod adapter;
pub mod constants;
pub mod harness;
pub mod settings;
pub mod sim;
pub mod store;

// Re-export commonly used types for convenience
pub use adapter::{
    AdapterError, AdapterResult, ComponentId, CreationListener, EditorAdapter, EntityId,
    StateQuery, Value, WorkspaceConfig, WorkspaceHandle,
};
pub use harness::{
    ClosureScenario, ConditionPoller, Label, PollSpec, ResultSink, Scenario, ScenarioContext,
    ScenarioError, ScenarioParams, ScenarioReport, ScenarioRunner, ScriptedScenario, Verdict,
    wait_for_condition,
};
pub use settings::HarnessSettings;
pub use sim::{SimConfig, SimulatedEditor};
pub use store::{ResultStore, StoreError};
