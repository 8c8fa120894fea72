// Wizard controller
//
// Owns the step index and every step store. Validation is split into request -> run ->
// apply so hosts can await a slow validator without holding the controller; every result
// carries the ticket it was issued under and is dropped when the wizard has moved on.

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::definition::AggregateForm;
use super::step::{FormStep, StepHandle};
use crate::api::{
    FetchError, IntegrationFetcher, Notification, Notifier, Severity, SubmissionError, Submitter,
};
use crate::config::WizardSettings;
use crate::flows::{unwrap_record, FlowKind, IntegrationFlow};
use crate::form::{RowId, StoreError};
use crate::models::state::WizardState;
use crate::payload::{AssemblyError, SubmissionPayload, SubmitTarget};
use crate::validation::{FieldValidationError, StepValidation, StepValidationError, StepValidator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum WizardPhase {
    Editing { step: usize },
    Submitting,
    Submitted,
    Failed { error: SubmissionError },
}

impl WizardPhase {
    pub fn label(&self) -> &'static str {
        match self {
            WizardPhase::Editing { .. } => "editing",
            WizardPhase::Submitting => "submitting",
            WizardPhase::Submitted => "submitted",
            WizardPhase::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("wizard is not editing (phase: {0})")]
    NotEditing(&'static str),

    #[error("already at the first step")]
    AtFirstStep,

    #[error("step {index} is out of range (steps: {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot jump ahead to step {target} from step {current}")]
    JumpAhead { target: usize, current: usize },

    #[error("step {target} has not been completed yet")]
    StepNotCompleted { target: usize },

    #[error("step {index} must be valid before moving past it")]
    StepInvalid { index: usize },

    #[error("an advance is already being validated (ticket {ticket})")]
    AdvanceInFlight { ticket: u64 },

    #[error("wizard has no step named '{0}'")]
    UnknownStep(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldEditError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("cannot submit while {phase}")]
    NotSubmitting { phase: &'static str },

    #[error("payload assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Collaborator(#[from] SubmissionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("wizard definition has no steps")]
    NoSteps,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenExistingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to map existing record: {0}")]
    Hydrate(#[from] AssemblyError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationIntent {
    /// Validate, then move forward on success. At most one in flight.
    Advance,
    /// Live "can I continue" check; never navigates.
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTicket {
    pub id: u64,
    pub step: usize,
    pub generation: u64,
    pub revision: u64,
    pub intent: ValidationIntent,
    /// Revisions of the earlier steps re-checked before `Submitting`; empty otherwise.
    pub earlier_revisions: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation of step '{step}' did not finish within {after:?}")]
pub struct ValidationTimedOut {
    pub step: String,
    pub after: Duration,
}

/// A validation that has been issued but not yet run.
///
/// Owns a snapshot of the step's values, so it can be awaited (or moved to another task)
/// while the controller keeps accepting edits and navigation.
pub struct PendingValidation {
    ticket: ValidationTicket,
    step_name: String,
    validator: Arc<dyn StepValidator>,
    values: Value,
    earlier: Vec<EarlierCheck>,
}

struct EarlierCheck {
    index: usize,
    validator: Arc<dyn StepValidator>,
    values: Value,
}

impl PendingValidation {
    pub fn ticket(&self) -> &ValidationTicket {
        &self.ticket
    }

    /// Runs the step's validator, then the earlier steps' validators when the ticket
    /// leads to `Submitting`. `timeout` bounds the whole run.
    pub async fn run(self, timeout: Duration) -> ValidationOutcome {
        let PendingValidation {
            ticket,
            step_name,
            validator,
            values,
            earlier,
        } = self;

        let checks = async {
            let current = validator.validate(&values).await;
            let mut results = Vec::with_capacity(earlier.len());
            for check in &earlier {
                results.push((check.index, check.validator.validate(&check.values).await));
            }
            (current, results)
        };

        match tokio::time::timeout(timeout, checks).await {
            Ok((validation, earlier)) => ValidationOutcome {
                ticket,
                result: Ok(validation),
                earlier,
            },
            Err(_) => ValidationOutcome {
                ticket,
                result: Err(ValidationTimedOut {
                    step: step_name,
                    after: timeout,
                }),
                earlier: Vec::new(),
            },
        }
    }
}

impl fmt::Debug for PendingValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValidation")
            .field("ticket", &self.ticket)
            .field("step_name", &self.step_name)
            .field("earlier", &self.earlier.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ticket: ValidationTicket,
    pub result: Result<StepValidation, ValidationTimedOut>,
    /// `(step index, result)` for each earlier step re-checked before `Submitting`.
    pub earlier: Vec<(usize, StepValidation)>,
}

/// Why a validation outcome was dropped without touching any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The advance guard no longer belongs to this ticket.
    Superseded,
    NotEditing,
    NavigatedAway { issued: u64, current: u64 },
    StepChanged { issued: usize, current: usize },
    DataChanged { issued: u64, current: u64 },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Superseded => write!(f, "advance ticket superseded"),
            DiscardReason::NotEditing => write!(f, "wizard is no longer editing"),
            DiscardReason::NavigatedAway { issued, current } => {
                write!(f, "navigated away (generation {} -> {})", issued, current)
            }
            DiscardReason::StepChanged { issued, current } => {
                write!(f, "step changed ({} -> {})", issued, current)
            }
            DiscardReason::DataChanged { issued, current } => {
                write!(f, "step data changed (revision {} -> {})", issued, current)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationApplied {
    Advanced { from: usize, to: usize },
    /// The last step validated; the wizard is now `Submitting`.
    ReadyToSubmit,
    Passed { step: usize },
    Rejected(StepValidationError),
    TimedOut { step: usize },
    Discarded { reason: DiscardReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub validation_timeout: Duration,
    pub notification_duration_ms: u64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&WizardSettings::default())
    }
}

impl From<&WizardSettings> for ControllerOptions {
    fn from(settings: &WizardSettings) -> Self {
        Self {
            validation_timeout: Duration::from_millis(settings.validation_timeout_ms),
            notification_duration_ms: settings.notification_duration_ms,
        }
    }
}

pub struct WizardController {
    flow: Arc<dyn IntegrationFlow>,
    steps: Vec<FormStep>,
    aggregate: AggregateForm,
    phase: WizardPhase,
    furthest_completed: Option<usize>,
    edit_mode: bool,
    target: SubmitTarget,
    generation: u64,
    next_ticket: u64,
    advance_in_flight: Option<u64>,
    last_error: Option<SubmissionError>,
    last_payload: Option<SubmissionPayload>,
    options: ControllerOptions,
}

impl WizardController {
    pub fn new(flow: Arc<dyn IntegrationFlow>) -> Result<Self, BuildError> {
        Self::with_options(flow, ControllerOptions::default())
    }

    pub fn with_options(
        flow: Arc<dyn IntegrationFlow>,
        options: ControllerOptions,
    ) -> Result<Self, BuildError> {
        Self::build(flow, None, SubmitTarget::Create, options)
    }

    /// Starts from `seed` merged over the step defaults (e.g. a saved draft).
    pub fn with_form(
        flow: Arc<dyn IntegrationFlow>,
        seed: AggregateForm,
        options: ControllerOptions,
    ) -> Result<Self, BuildError> {
        Self::build(flow, Some(seed), SubmitTarget::Create, options)
    }

    /// Edit mode: fetch the record, map it onto the form, and target the update route.
    ///
    /// Every step is validated once on open, so a record that no longer passes the rules
    /// cannot be skipped past from the review links.
    pub async fn open_existing(
        flow: Arc<dyn IntegrationFlow>,
        fetcher: &dyn IntegrationFetcher,
        id: &str,
        options: ControllerOptions,
    ) -> Result<Self, OpenExistingError> {
        let kind = flow.kind();
        info!(
            "[PHASE: wizard] [STEP: open_existing] Fetching {} integration id={}",
            kind, id
        );
        let record = fetcher.fetch_existing(kind, id).await?;
        let form = flow.hydrate(unwrap_record(&record))?;
        let mut controller = Self::build(
            flow,
            Some(form),
            SubmitTarget::Update { id: id.to_string() },
            options,
        )?;
        controller.edit_mode = true;
        controller.furthest_completed = Some(controller.steps.len() - 1);
        controller.validate_all_steps().await;
        Ok(controller)
    }

    fn build(
        flow: Arc<dyn IntegrationFlow>,
        seed: Option<AggregateForm>,
        target: SubmitTarget,
        options: ControllerOptions,
    ) -> Result<Self, BuildError> {
        let definition = flow.definition();
        if definition.is_empty() {
            return Err(BuildError::NoSteps);
        }

        let mut steps = Vec::with_capacity(definition.len());
        let mut aggregate = AggregateForm::new();
        for spec in definition.steps() {
            let values = seed.as_ref().and_then(|s| s.get(&spec.name)).cloned();
            let step = FormStep::with_values(spec, values)?;
            aggregate.insert(&spec.name, step.data());
            steps.push(step);
        }

        debug!(
            "[PHASE: wizard] [STEP: init] flow={} steps={}",
            flow.kind(),
            steps.len()
        );

        Ok(Self {
            flow,
            steps,
            aggregate,
            phase: WizardPhase::Editing { step: 0 },
            furthest_completed: None,
            edit_mode: false,
            target,
            generation: 0,
            next_ticket: 0,
            advance_in_flight: None,
            last_error: None,
            last_payload: None,
            options,
        })
    }

    pub fn flow_kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.phase
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Index of the step on screen; terminal phases report the last step.
    pub fn current_step(&self) -> usize {
        match self.phase {
            WizardPhase::Editing { step } => step,
            _ => self.steps.len() - 1,
        }
    }

    pub fn step(&self, index: usize) -> Option<&FormStep> {
        self.steps.get(index)
    }

    pub fn aggregate(&self) -> &AggregateForm {
        &self.aggregate
    }

    pub fn furthest_completed(&self) -> Option<usize> {
        self.furthest_completed
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn target(&self) -> &SubmitTarget {
        &self.target
    }

    pub fn last_error(&self) -> Option<&SubmissionError> {
        self.last_error.as_ref()
    }

    pub fn last_payload(&self) -> Option<&SubmissionPayload> {
        self.last_payload.as_ref()
    }

    pub fn validation_in_flight(&self) -> bool {
        self.advance_in_flight.is_some()
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    pub fn state(&self) -> WizardState {
        WizardState {
            flow: self.flow.kind(),
            phase: self.phase.clone(),
            current_step_index: self.current_step(),
            furthest_completed: self.furthest_completed,
            edit_mode: self.edit_mode,
            validation_in_flight: self.validation_in_flight(),
            steps: self.steps.iter().map(FormStep::state).collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Issues the validation that gates moving past the current step.
    pub fn request_advance(&mut self) -> Result<PendingValidation, NavigationError> {
        let step = self.editing_step()?;
        if let Some(ticket) = self.advance_in_flight {
            return Err(NavigationError::AdvanceInFlight { ticket });
        }
        let pending = self.issue(step, ValidationIntent::Advance);
        self.advance_in_flight = Some(pending.ticket.id);
        Ok(pending)
    }

    /// Issues a non-navigating check of the current step.
    pub fn request_validation(&mut self) -> Result<PendingValidation, NavigationError> {
        let step = self.editing_step()?;
        Ok(self.issue(step, ValidationIntent::Check))
    }

    /// Releases the advance guard for a ticket that will never be applied.
    pub fn cancel_validation(&mut self, ticket: &ValidationTicket) {
        if self.advance_in_flight == Some(ticket.id) {
            self.advance_in_flight = None;
        }
    }

    pub fn apply_validation(&mut self, outcome: ValidationOutcome) -> ValidationApplied {
        let ValidationOutcome {
            ticket,
            result,
            earlier,
        } = outcome;

        if ticket.intent == ValidationIntent::Advance {
            if self.advance_in_flight != Some(ticket.id) {
                return self.discard(&ticket, DiscardReason::Superseded);
            }
            self.advance_in_flight = None;
        }

        let current = match self.phase {
            WizardPhase::Editing { step } => step,
            _ => return self.discard(&ticket, DiscardReason::NotEditing),
        };
        if ticket.generation != self.generation {
            let reason = DiscardReason::NavigatedAway {
                issued: ticket.generation,
                current: self.generation,
            };
            return self.discard(&ticket, reason);
        }
        if ticket.step != current {
            let reason = DiscardReason::StepChanged {
                issued: ticket.step,
                current,
            };
            return self.discard(&ticket, reason);
        }
        let revision = self.steps[current].revision();
        if ticket.revision != revision {
            let reason = DiscardReason::DataChanged {
                issued: ticket.revision,
                current: revision,
            };
            return self.discard(&ticket, reason);
        }
        for (index, issued) in ticket.earlier_revisions.iter().enumerate() {
            let revision = self.steps[index].revision();
            if *issued != revision {
                let reason = DiscardReason::DataChanged {
                    issued: *issued,
                    current: revision,
                };
                return self.discard(&ticket, reason);
            }
        }

        let validation = match result {
            Ok(validation) => validation,
            Err(timed_out) => {
                warn!(
                    "[PHASE: validation] [STEP: timeout] ticket={} {}",
                    ticket.id, timed_out
                );
                self.steps[current].fail_with(&timed_out.to_string());
                return ValidationApplied::TimedOut { step: current };
            }
        };

        let step = &mut self.steps[current];
        step.apply_result(&validation);
        if !validation.is_valid() {
            info!(
                "[PHASE: validation] [STEP: rejected] step={} errors={}",
                step.name(),
                validation.errors.len()
            );
            return ValidationApplied::Rejected(StepValidationError {
                step: step.name().to_string(),
                errors: validation.errors,
            });
        }

        self.furthest_completed = Some(self.furthest_completed.map_or(current, |f| f.max(current)));
        self.propagate(current);

        match ticket.intent {
            ValidationIntent::Check => ValidationApplied::Passed { step: current },
            ValidationIntent::Advance => {
                self.generation += 1;
                if current + 1 < self.steps.len() {
                    self.phase = WizardPhase::Editing { step: current + 1 };
                    info!(
                        "[PHASE: wizard] [STEP: advance] {} -> {}",
                        current,
                        current + 1
                    );
                    ValidationApplied::Advanced {
                        from: current,
                        to: current + 1,
                    }
                } else {
                    if let Some(rejected) = self.apply_earlier(earlier) {
                        return rejected;
                    }
                    self.phase = WizardPhase::Submitting;
                    info!("[PHASE: wizard] [STEP: advance] last step validated, ready to submit");
                    ValidationApplied::ReadyToSubmit
                }
            }
        }
    }

    /// Request, await and apply an advance in one call.
    pub async fn advance(&mut self) -> Result<ValidationApplied, NavigationError> {
        let pending = self.request_advance()?;
        let outcome = pending.run(self.options.validation_timeout).await;
        Ok(self.apply_validation(outcome))
    }

    /// Request, await and apply a check of the current step.
    pub async fn check_current(&mut self) -> Result<ValidationApplied, NavigationError> {
        let pending = self.request_validation()?;
        let outcome = pending.run(self.options.validation_timeout).await;
        Ok(self.apply_validation(outcome))
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    /// Goes back one step. Never validates; entered data stays as is.
    pub fn retreat(&mut self) -> Result<usize, NavigationError> {
        let step = self.editing_step()?;
        if step == 0 {
            return Err(NavigationError::AtFirstStep);
        }
        self.move_to(step - 1, "retreat");
        Ok(step - 1)
    }

    /// Step-indicator navigation: only to the current or an earlier step.
    pub fn jump_to(&mut self, target: usize) -> Result<(), NavigationError> {
        let current = self.editing_step()?;
        self.check_range(target)?;
        if target > current {
            return Err(NavigationError::JumpAhead { target, current });
        }
        self.move_to(target, "jump_to");
        Ok(())
    }

    /// Review "Edit" links: any step that has been completed.
    pub fn edit_step(&mut self, target: usize) -> Result<(), NavigationError> {
        match self.phase {
            WizardPhase::Editing { .. } => {}
            WizardPhase::Failed { .. } => self.leave_failed(),
            ref other => return Err(NavigationError::NotEditing(other.label())),
        }
        self.check_range(target)?;
        match self.furthest_completed {
            Some(furthest) if target <= furthest => {}
            _ => return Err(NavigationError::StepNotCompleted { target }),
        }
        let current = self.current_step();
        if let Some(index) = (current..target).find(|&i| !self.steps[i].is_valid()) {
            return Err(NavigationError::StepInvalid { index });
        }
        self.move_to(target, "edit_step");
        Ok(())
    }

    /// `Failed` (or an unsent `Submitting`) back to the last step, data and error kept.
    pub fn return_to_editing(&mut self) -> Result<(), NavigationError> {
        match self.phase {
            WizardPhase::Failed { .. } => self.leave_failed(),
            WizardPhase::Submitting => {}
            ref other => return Err(NavigationError::NotEditing(other.label())),
        }
        let last = self.steps.len() - 1;
        self.move_to(last, "return_to_editing");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Field changes
    // ---------------------------------------------------------------------

    pub fn set_field(
        &mut self,
        path: &str,
        value: Value,
    ) -> Result<Option<FieldValidationError>, FieldEditError> {
        let step = self.editing_step()?;
        self.set_field_at(step, path, value)
    }

    /// Writes into a named step (Review-page inline edits).
    pub fn set_step_field(
        &mut self,
        step_name: &str,
        path: &str,
        value: Value,
    ) -> Result<Option<FieldValidationError>, FieldEditError> {
        self.editing_step()?;
        let step = self.step_index(step_name)?;
        self.set_field_at(step, path, value)
    }

    pub fn append_row(&mut self, list_path: &str, row: Value) -> Result<RowId, FieldEditError> {
        let step = self.editing_step()?;
        let id = self.steps[step].append_row(list_path, row)?;
        self.propagate(step);
        Ok(id)
    }

    pub fn remove_row(
        &mut self,
        list_path: &str,
        index: usize,
    ) -> Result<(RowId, Value), FieldEditError> {
        let step = self.editing_step()?;
        let removed = self.steps[step].remove_row(list_path, index)?;
        self.propagate(step);
        Ok(removed)
    }

    /// Replaces a step's values wholesale (external rehydration). Idempotent.
    pub fn reset_step(&mut self, step_name: &str, values: Value) -> Result<(), FieldEditError> {
        self.editing_step()?;
        let step = self.step_index(step_name)?;
        self.steps[step].reset(values)?;
        self.propagate(step);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    /// Assembles the payload and hands it to `submitter` exactly once.
    ///
    /// Legal in `Submitting`, and in `Failed` as a retry with the same form data.
    pub async fn submit(
        &mut self,
        submitter: &dyn Submitter,
        notifier: &dyn Notifier,
    ) -> Result<(), SubmitError> {
        match self.phase {
            WizardPhase::Submitting | WizardPhase::Failed { .. } => {}
            ref other => {
                return Err(SubmitError::NotSubmitting {
                    phase: other.label(),
                })
            }
        }

        let correlation_id = Uuid::new_v4();
        let messages = self.flow.messages();
        let payload = match self.flow.assemble_for(&self.aggregate, self.target.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    "[PHASE: submission] [STEP: assemble] correlation_id={} {}",
                    correlation_id, e
                );
                let failure = SubmissionError::new(messages.failed.1.clone(), e.to_string());
                self.fail(failure, notifier, &messages.failed.0);
                return Err(SubmitError::Assembly(e));
            }
        };

        info!(
            "[PHASE: submission] [STEP: submit] correlation_id={} {} {} body={}",
            correlation_id,
            payload.method(),
            payload.path(),
            payload.masked_body()
        );
        self.last_payload = Some(payload.clone());

        match submitter.submit(&payload).await {
            Ok(()) => {
                self.phase = WizardPhase::Submitted;
                self.last_error = None;
                let (title, detail) = match self.target {
                    SubmitTarget::Create => messages.created,
                    SubmitTarget::Update { .. } => messages.updated,
                };
                info!(
                    "[PHASE: submission] [STEP: complete] correlation_id={} {}",
                    correlation_id, title
                );
                notifier.notify(Notification {
                    title,
                    detail,
                    severity: Severity::Success,
                    duration_ms: self.options.notification_duration_ms,
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    "[PHASE: submission] [STEP: failed] correlation_id={} {} ({})",
                    correlation_id, e.user_message, e.internal_details
                );
                self.fail(e.clone(), notifier, &messages.failed.0);
                Err(SubmitError::Collaborator(e))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn editing_step(&self) -> Result<usize, NavigationError> {
        match self.phase {
            WizardPhase::Editing { step } => Ok(step),
            ref other => Err(NavigationError::NotEditing(other.label())),
        }
    }

    fn step_index(&self, name: &str) -> Result<usize, NavigationError> {
        self.steps
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| NavigationError::UnknownStep(name.to_string()))
    }

    fn check_range(&self, index: usize) -> Result<(), NavigationError> {
        if index >= self.steps.len() {
            return Err(NavigationError::OutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        Ok(())
    }

    fn issue(&mut self, step: usize, intent: ValidationIntent) -> PendingValidation {
        self.next_ticket += 1;
        // The advance into `Submitting` re-checks every earlier step.
        let earlier_len = if intent == ValidationIntent::Advance && step + 1 == self.steps.len() {
            step
        } else {
            0
        };
        let earlier_steps = &self.steps[..earlier_len];
        let earlier: Vec<EarlierCheck> = earlier_steps
            .iter()
            .enumerate()
            .map(|(index, s)| EarlierCheck {
                index,
                validator: s.validator(),
                values: s.data(),
            })
            .collect();
        let earlier_revisions = earlier_steps.iter().map(FormStep::revision).collect();

        let form_step = &self.steps[step];
        let ticket = ValidationTicket {
            id: self.next_ticket,
            step,
            generation: self.generation,
            revision: form_step.revision(),
            intent,
            earlier_revisions,
        };
        debug!(
            "[PHASE: validation] [STEP: issue] ticket={} step={} intent={:?}",
            ticket.id, step, intent
        );
        PendingValidation {
            ticket,
            step_name: form_step.name().to_string(),
            validator: form_step.validator(),
            values: form_step.data(),
            earlier,
        }
    }

    /// Records the earlier steps' results; the first invalid one becomes the current step.
    fn apply_earlier(&mut self, results: Vec<(usize, StepValidation)>) -> Option<ValidationApplied> {
        let mut first_invalid = None;
        for (index, validation) in results {
            let step = &mut self.steps[index];
            step.apply_result(&validation);
            if first_invalid.is_none() && !validation.is_valid() {
                first_invalid = Some((
                    index,
                    StepValidationError {
                        step: step.name().to_string(),
                        errors: validation.errors,
                    },
                ));
            }
        }

        let (index, error) = first_invalid?;
        self.phase = WizardPhase::Editing { step: index };
        warn!(
            "[PHASE: validation] [STEP: recheck] step={} no longer valid, returning to it ({} errors)",
            error.step,
            error.errors.len()
        );
        Some(ValidationApplied::Rejected(error))
    }

    async fn validate_all_steps(&mut self) {
        let timeout = self.options.validation_timeout;
        let mut invalid = 0;
        for step in self.steps.iter_mut() {
            match tokio::time::timeout(timeout, step.validate()).await {
                Ok(validation) => step.apply_result(&validation),
                Err(_) => {
                    let timed_out = ValidationTimedOut {
                        step: step.name().to_string(),
                        after: timeout,
                    };
                    step.fail_with(&timed_out.to_string());
                }
            }
            if !step.is_valid() {
                invalid += 1;
            }
        }
        info!(
            "[PHASE: validation] [STEP: open_existing] {} of {} steps need attention",
            invalid,
            self.steps.len()
        );
    }

    fn discard(&self, ticket: &ValidationTicket, reason: DiscardReason) -> ValidationApplied {
        debug!(
            "[PHASE: validation] [STEP: discard] ticket={} step={} reason={}",
            ticket.id, ticket.step, reason
        );
        ValidationApplied::Discarded { reason }
    }

    fn move_to(&mut self, target: usize, action: &str) {
        let from = self.current_step();
        self.phase = WizardPhase::Editing { step: target };
        self.generation += 1;
        // Whatever advance was pending belongs to the step we just left.
        self.advance_in_flight = None;
        info!("[PHASE: wizard] [STEP: {}] {} -> {}", action, from, target);
    }

    fn leave_failed(&mut self) {
        let previous = std::mem::replace(&mut self.phase, WizardPhase::Submitting);
        if let WizardPhase::Failed { error } = previous {
            self.last_error = Some(error);
        }
    }

    fn set_field_at(
        &mut self,
        step: usize,
        path: &str,
        value: Value,
    ) -> Result<Option<FieldValidationError>, FieldEditError> {
        let error = self.steps[step].set_value(path, value)?;
        self.propagate(step);
        Ok(error)
    }

    fn propagate(&mut self, step: usize) {
        let form_step = &self.steps[step];
        self.aggregate.insert(form_step.name(), form_step.data());
    }

    fn fail(&mut self, failure: SubmissionError, notifier: &dyn Notifier, title: &str) {
        notifier.notify(Notification {
            title: title.to_string(),
            detail: failure.user_message.clone(),
            severity: Severity::Error,
            duration_ms: self.options.notification_duration_ms,
        });
        self.last_error = Some(failure.clone());
        self.phase = WizardPhase::Failed { error: failure };
    }
}

impl fmt::Debug for WizardController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardController")
            .field("flow", &self.flow.kind())
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("furthest_completed", &self.furthest_completed)
            .field("edit_mode", &self.edit_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DryRunSubmitter;
    use crate::flows::FlowMessages;
    use crate::validation::{Condition, Rule, RuleSet};
    use crate::wizard::{StepSpec, WizardDefinition};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // -------------------------------------------------------------------------
    // Test flow + stub collaborators
    // -------------------------------------------------------------------------

    /// Validator that never resolves (timeout testing).
    struct HangingValidator {
        call_count: AtomicU32,
    }

    #[async_trait]
    impl StepValidator for HangingValidator {
        fn validate_field(&self, _field: &str, _values: &Value) -> Option<FieldValidationError> {
            None
        }

        async fn validate(&self, _values: &Value) -> StepValidation {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    /// Two data steps plus review. `hang_on_confirm` swaps the confirm validator for one
    /// that never resolves.
    struct ProfileFlow {
        hang_on_confirm: bool,
    }

    impl IntegrationFlow for ProfileFlow {
        fn kind(&self) -> FlowKind {
            FlowKind::Client
        }

        fn definition(&self) -> WizardDefinition {
            let profile = StepSpec::new(
                "profile",
                "Profile",
                json!({ "name": "", "authType": "SSH Key", "sshKey": "", "password": "" }),
                RuleSet::new()
                    .field("name", [Rule::required("Name is required")])
                    .when(Condition::equals("authType", "SSH Key"), |s| {
                        s.field("sshKey", [Rule::required("SSH Key is required")])
                    })
                    .when(Condition::equals("authType", "Password"), |s| {
                        s.field("password", [Rule::required("Password is required")])
                    }),
            );
            let confirm = if self.hang_on_confirm {
                StepSpec {
                    name: "confirm".into(),
                    title: "Confirm".into(),
                    defaults: json!({ "agree": true }),
                    list_paths: Vec::new(),
                    validator: Arc::new(HangingValidator {
                        call_count: AtomicU32::new(0),
                    }),
                }
            } else {
                StepSpec::new(
                    "confirm",
                    "Confirm",
                    json!({ "agree": true }),
                    RuleSet::new().field("agree", [Rule::required("Please confirm")]),
                )
            };
            let review = StepSpec::new("review", "Review", json!({}), RuleSet::new());
            WizardDefinition::new(vec![profile, confirm, review])
        }

        fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
            let profile = form.reader("profile")?;
            Ok(json!({ "name": profile.text("name")?, "authType": profile.text("authType")? }))
        }

        fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
            let mut form = AggregateForm::new();
            form.insert("profile", json!({ "name": record["name"].clone() }));
            Ok(form)
        }

        fn messages(&self) -> FlowMessages {
            FlowMessages::default()
        }
    }

    fn controller() -> WizardController {
        WizardController::new(Arc::new(ProfileFlow {
            hang_on_confirm: false,
        }))
        .unwrap()
    }

    fn fill_profile(c: &mut WizardController) {
        c.set_field("name", json!("Acme")).unwrap();
        c.set_field("sshKey", json!("ssh-rsa AAAA")).unwrap();
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, n: Notification) {
            self.seen.lock().unwrap().push(n);
        }
    }

    struct StubFetcher {
        record: Value,
        call_count: AtomicU32,
    }

    #[async_trait]
    impl IntegrationFetcher for StubFetcher {
        async fn fetch_existing(&self, _kind: FlowKind, _id: &str) -> Result<Value, FetchError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.clone())
        }
    }

    struct MissingFetcher;

    #[async_trait]
    impl IntegrationFetcher for MissingFetcher {
        async fn fetch_existing(&self, kind: FlowKind, id: &str) -> Result<Value, FetchError> {
            Err(FetchError::NotFound {
                kind,
                id: id.to_string(),
            })
        }
    }

    // -------------------------------------------------------------------------
    // Gating
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn cannot_advance_while_step_invalid() {
        let mut c = controller();
        let applied = c.advance().await.unwrap();

        let ValidationApplied::Rejected(err) = applied else {
            panic!("expected rejection, got {applied:?}");
        };
        assert_eq!(err.step, "profile");
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "sshKey"]);
        assert_eq!(c.phase(), &WizardPhase::Editing { step: 0 });
        assert!(!c.validation_in_flight());
    }

    #[tokio::test]
    async fn discriminant_change_applies_on_next_validate() {
        let mut c = controller();
        fill_profile(&mut c);
        c.set_field("authType", json!("Password")).unwrap();

        let applied = c.advance().await.unwrap();
        let ValidationApplied::Rejected(err) = applied else {
            panic!("expected rejection, got {applied:?}");
        };
        assert_eq!(err.error_map().keys().collect::<Vec<_>>(), vec!["password"]);

        c.set_field("password", json!("hunter22")).unwrap();
        assert_eq!(
            c.advance().await.unwrap(),
            ValidationApplied::Advanced { from: 0, to: 1 }
        );
    }

    #[tokio::test]
    async fn retreat_is_always_allowed_and_keeps_invalid_data() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();

        c.set_field("agree", json!("")).unwrap();
        assert_eq!(c.retreat().unwrap(), 0);
        assert_eq!(c.step(1).unwrap().data()["agree"], json!(""));
        assert_eq!(c.aggregate().value("confirm", "agree"), Some(&json!("")));
        assert_eq!(c.retreat(), Err(NavigationError::AtFirstStep));
    }

    #[tokio::test]
    async fn every_change_propagates_to_aggregate_and_clears_valid() {
        let mut c = controller();
        fill_profile(&mut c);
        assert!(matches!(
            c.check_current().await.unwrap(),
            ValidationApplied::Passed { step: 0 }
        ));
        assert!(c.step(0).unwrap().is_valid());

        let err = c.set_field("name", json!("")).unwrap();
        assert_eq!(err.unwrap().message, "Name is required");
        assert!(!c.step(0).unwrap().is_valid());
        assert_eq!(c.aggregate().value("profile", "name"), Some(&json!("")));
    }

    // -------------------------------------------------------------------------
    // Stale results + double advance
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn late_check_for_previous_step_is_discarded() {
        let mut c = controller();
        fill_profile(&mut c);

        // Slow check issued on step 0 ...
        let slow = c.request_validation().unwrap();
        // ... the user advances before it resolves.
        assert_eq!(
            c.advance().await.unwrap(),
            ValidationApplied::Advanced { from: 0, to: 1 }
        );
        c.set_field("agree", json!("")).unwrap();
        let before = c.state();

        let late = slow.run(Duration::from_secs(1)).await;
        let applied = c.apply_validation(late);

        assert!(matches!(
            applied,
            ValidationApplied::Discarded {
                reason: DiscardReason::NavigatedAway { .. }
            }
        ));
        assert_eq!(c.state(), before);
        assert_eq!(c.current_step(), 1);
    }

    #[tokio::test]
    async fn pending_advance_dropped_by_navigation() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();

        // Advance from step 1 issued, then the user goes back and forward again.
        let stale = c.request_advance().unwrap();
        c.retreat().unwrap();
        assert_eq!(
            c.advance().await.unwrap(),
            ValidationApplied::Advanced { from: 0, to: 1 }
        );

        let applied = c.apply_validation(stale.run(Duration::from_secs(1)).await);
        assert_eq!(
            applied,
            ValidationApplied::Discarded {
                reason: DiscardReason::Superseded
            }
        );
        assert_eq!(c.phase(), &WizardPhase::Editing { step: 1 });
    }

    #[tokio::test]
    async fn double_advance_is_rejected_while_in_flight() {
        let mut c = controller();
        fill_profile(&mut c);

        let first = c.request_advance().unwrap();
        assert_eq!(
            c.request_advance().unwrap_err(),
            NavigationError::AdvanceInFlight {
                ticket: first.ticket().id
            }
        );

        let applied = c.apply_validation(first.run(Duration::from_secs(1)).await);
        assert_eq!(applied, ValidationApplied::Advanced { from: 0, to: 1 });
        // One click, one step.
        assert_eq!(c.current_step(), 1);
        assert!(!c.validation_in_flight());
    }

    #[tokio::test]
    async fn edits_during_validation_discard_the_result() {
        let mut c = controller();
        fill_profile(&mut c);

        let pending = c.request_advance().unwrap();
        c.set_field("name", json!("")).unwrap();
        let applied = c.apply_validation(pending.run(Duration::from_secs(1)).await);

        assert!(matches!(
            applied,
            ValidationApplied::Discarded {
                reason: DiscardReason::DataChanged { .. }
            }
        ));
        assert_eq!(c.current_step(), 0);
        // Guard released; the next click validates the new data.
        assert!(matches!(
            c.advance().await.unwrap(),
            ValidationApplied::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn hanging_validator_times_out_as_failure() {
        let options = ControllerOptions {
            validation_timeout: Duration::from_millis(50),
            notification_duration_ms: 5000,
        };
        let mut c = WizardController::with_options(
            Arc::new(ProfileFlow {
                hang_on_confirm: true,
            }),
            options,
        )
        .unwrap();
        fill_profile(&mut c);
        c.advance().await.unwrap();

        assert_eq!(
            c.advance().await.unwrap(),
            ValidationApplied::TimedOut { step: 1 }
        );
        assert_eq!(c.current_step(), 1);
        assert!(!c.step(1).unwrap().is_valid());
        assert!(c.step(1).unwrap().errors()["confirm"].contains("did not finish"));
    }

    // -------------------------------------------------------------------------
    // Jumping
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn jump_and_edit_rules() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();
        c.advance().await.unwrap();
        assert_eq!(c.current_step(), 2);

        c.jump_to(0).unwrap();
        assert_eq!(
            c.jump_to(2),
            Err(NavigationError::JumpAhead {
                target: 2,
                current: 0
            })
        );
        // Completed steps 0 and 1 are reachable from the review links.
        c.edit_step(1).unwrap();
        assert_eq!(
            c.edit_step(2),
            Err(NavigationError::StepNotCompleted { target: 2 })
        );
        assert_eq!(
            c.jump_to(9),
            Err(NavigationError::OutOfRange { index: 9, len: 3 })
        );
    }

    #[tokio::test]
    async fn edit_link_cannot_skip_past_an_invalidated_step() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();
        c.advance().await.unwrap();

        c.edit_step(0).unwrap();
        assert!(c.set_field("name", json!("")).unwrap().is_some());
        assert_eq!(c.edit_step(2), Err(NavigationError::StepInvalid { index: 0 }));
        assert_eq!(c.edit_step(1), Err(NavigationError::StepInvalid { index: 0 }));
        assert_eq!(c.current_step(), 0);

        c.set_field("name", json!("Acme")).unwrap();
        assert!(matches!(
            c.check_current().await.unwrap(),
            ValidationApplied::Passed { step: 0 }
        ));
        c.edit_step(2).unwrap();
    }

    #[tokio::test]
    async fn last_advance_rechecks_earlier_steps() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();
        c.advance().await.unwrap();
        assert_eq!(c.current_step(), 2);

        // Inline edit from the review page breaks the profile.
        c.set_step_field("profile", "name", json!("")).unwrap();
        let applied = c.advance().await.unwrap();
        let ValidationApplied::Rejected(err) = applied else {
            panic!("expected rejection, got {applied:?}");
        };
        assert_eq!(err.step, "profile");
        assert_eq!(err.error_map().keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(c.phase(), &WizardPhase::Editing { step: 0 });
        assert!(!c.step(0).unwrap().is_valid());

        let submitter = DryRunSubmitter::new();
        assert!(c.submit(&submitter, &RecordingNotifier::default()).await.is_err());
        assert_eq!(submitter.call_count(), 0);
    }

    #[tokio::test]
    async fn earlier_step_edit_during_final_check_discards_it() {
        let mut c = controller();
        fill_profile(&mut c);
        c.advance().await.unwrap();
        c.advance().await.unwrap();

        let pending = c.request_advance().unwrap();
        assert_eq!(pending.ticket().earlier_revisions.len(), 2);
        c.set_step_field("confirm", "agree", json!("")).unwrap();

        assert!(matches!(
            c.apply_validation(pending.run(Duration::from_secs(1)).await),
            ValidationApplied::Discarded {
                reason: DiscardReason::DataChanged { .. }
            }
        ));
        assert_eq!(c.phase(), &WizardPhase::Editing { step: 2 });
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    async fn drive_to_submitting(c: &mut WizardController) {
        fill_profile(c);
        for _ in 0..3 {
            c.advance().await.unwrap();
        }
        assert_eq!(c.phase(), &WizardPhase::Submitting);
    }

    #[tokio::test]
    async fn submit_success() {
        let mut c = controller();
        drive_to_submitting(&mut c).await;

        let submitter = DryRunSubmitter::new();
        let notifier = RecordingNotifier::default();
        c.submit(&submitter, &notifier).await.unwrap();

        assert_eq!(c.phase(), &WizardPhase::Submitted);
        assert_eq!(submitter.call_count(), 1);
        assert_eq!(
            submitter.recorded()[0].body(),
            &json!({ "name": "Acme", "authType": "SSH Key" })
        );
        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen[0].severity, Severity::Success);
        assert_eq!(seen[0].duration_ms, 5000);

        drop(seen);
        assert!(matches!(
            c.submit(&submitter, &notifier).await,
            Err(SubmitError::NotSubmitting { phase: "submitted" })
        ));
        assert_eq!(submitter.call_count(), 1);
    }

    #[tokio::test]
    async fn submit_failure_keeps_data_and_allows_retry() {
        let mut c = controller();
        drive_to_submitting(&mut c).await;
        let before = c.aggregate().clone();

        let submitter = DryRunSubmitter::failing(1);
        let notifier = RecordingNotifier::default();
        let err = c.submit(&submitter, &notifier).await.unwrap_err();
        assert!(matches!(err, SubmitError::Collaborator(_)));
        assert!(matches!(c.phase(), WizardPhase::Failed { .. }));
        assert_eq!(c.aggregate(), &before);
        assert_eq!(
            notifier.seen.lock().unwrap()[0].severity,
            Severity::Error
        );

        c.return_to_editing().unwrap();
        assert_eq!(c.phase(), &WizardPhase::Editing { step: 2 });
        assert!(c.last_error().is_some());

        assert_eq!(c.advance().await.unwrap(), ValidationApplied::ReadyToSubmit);
        c.submit(&submitter, &notifier).await.unwrap();
        assert_eq!(c.phase(), &WizardPhase::Submitted);
        assert!(c.last_error().is_none());
        assert_eq!(submitter.call_count(), 2);
    }

    #[tokio::test]
    async fn submit_requires_submitting_phase() {
        let mut c = controller();
        let submitter = DryRunSubmitter::new();
        let err = c.submit(&submitter, &RecordingNotifier::default()).await;
        assert_eq!(
            err,
            Err(SubmitError::NotSubmitting { phase: "editing" })
        );
        assert_eq!(submitter.call_count(), 0);
    }

    // -------------------------------------------------------------------------
    // Edit mode
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn open_existing_hydrates_and_targets_update() {
        let fetcher = StubFetcher {
            record: json!({ "data": { "id": "c-7", "name": "Existing Co" } }),
            call_count: AtomicU32::new(0),
        };
        let mut c = WizardController::open_existing(
            Arc::new(ProfileFlow {
                hang_on_confirm: false,
            }),
            &fetcher,
            "c-7",
            ControllerOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(fetcher.call_count.load(Ordering::SeqCst), 1);
        assert!(c.is_edit_mode());
        assert_eq!(c.current_step(), 0);
        assert_eq!(c.aggregate().value("profile", "name"), Some(&json!("Existing Co")));
        // Defaults fill what the record does not carry.
        assert_eq!(c.aggregate().value("profile", "authType"), Some(&json!("SSH Key")));
        assert_eq!(c.target(), &SubmitTarget::Update { id: "c-7".into() });

        // Steps are validated on open: the record has no SSH key, so the review
        // link cannot skip past the profile.
        assert!(!c.step(0).unwrap().is_valid());
        assert_eq!(
            c.step(0).unwrap().errors().get("sshKey").map(String::as_str),
            Some("SSH Key is required")
        );
        assert!(c.step(1).unwrap().is_valid());
        assert_eq!(c.edit_step(2), Err(NavigationError::StepInvalid { index: 0 }));

        c.set_field("sshKey", json!("ssh-rsa AAAA")).unwrap();
        assert!(matches!(
            c.check_current().await.unwrap(),
            ValidationApplied::Passed { step: 0 }
        ));
        // Every step counts as completed in edit mode.
        c.edit_step(2).unwrap();
        assert_eq!(c.advance().await.unwrap(), ValidationApplied::ReadyToSubmit);
    }

    #[tokio::test]
    async fn open_existing_surfaces_fetch_errors() {
        let result = WizardController::open_existing(
            Arc::new(ProfileFlow {
                hang_on_confirm: false,
            }),
            &MissingFetcher,
            "nope",
            ControllerOptions::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(OpenExistingError::Fetch(FetchError::NotFound { .. }))
        ));
    }

    #[test]
    fn reset_step_is_idempotent() {
        let mut c = controller();
        let values = json!({ "name": "Reset Co", "authType": "Password", "password": "x" });
        c.reset_step("profile", values.clone()).unwrap();
        let first = c.state().steps[0].data.clone();
        c.reset_step("profile", values).unwrap();
        assert_eq!(c.state().steps[0].data, first);
        assert_eq!(c.aggregate().get("profile"), Some(&first));
        assert!(matches!(
            c.reset_step("billing", json!({})),
            Err(FieldEditError::Navigation(NavigationError::UnknownStep(_)))
        ));
    }
}
