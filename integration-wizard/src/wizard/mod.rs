// Wizard orchestration: step definitions, live steps and the controller.

pub mod controller;
pub mod definition;
pub mod step;

pub use controller::{
    BuildError, ControllerOptions, DiscardReason, FieldEditError, NavigationError,
    OpenExistingError, PendingValidation, SubmitError, ValidationApplied, ValidationIntent,
    ValidationOutcome, ValidationTicket, ValidationTimedOut, WizardController, WizardPhase,
};
pub use definition::{merge_values, AggregateForm, StepSpec, WizardDefinition};
pub use step::{FormStep, StepHandle};
