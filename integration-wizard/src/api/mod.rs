// Boundary contracts: submission, edit-mode fetch, notifications.

pub mod collaborators;

pub use collaborators::{
    DryRunSubmitter, FetchError, IntegrationFetcher, LogNotifier, Notification, Notifier, Severity,
    SubmissionError, Submitter,
};
