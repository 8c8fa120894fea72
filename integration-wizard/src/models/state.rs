// Wizard state views
//
// NOTE: These are read-only snapshots produced by `WizardController::state()`. Mutating a
// view never touches the controller; hosts render from it and send changes back through
// the controller's methods.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::flows::FlowKind;
use crate::wizard::WizardPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub name: String,
    pub data: Value,
    pub valid: bool,
    pub touched: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub flow: FlowKind,
    pub phase: WizardPhase,
    /// Always within `0..steps.len()`; terminal phases report the last step.
    pub current_step_index: usize,
    pub furthest_completed: Option<usize>,
    pub edit_mode: bool,
    pub validation_in_flight: bool,
    pub steps: Vec<StepState>,
}

impl WizardState {
    pub fn current_step(&self) -> Option<&StepState> {
        self.steps.get(self.current_step_index)
    }
}
