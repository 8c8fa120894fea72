// Integration wizard engine
// Main library entry point

pub mod api;
pub mod config;
pub mod flows;
pub mod form;
pub mod models;
pub mod payload;
pub mod proof;
pub mod utils;
pub mod validation;
pub mod wizard;

use log::{error, info};
use std::future::Future;
use std::path::PathBuf;

use crate::config::WizardSettings;
use crate::flows::FlowKind;
use crate::models::responses::ApiResponse;

/// Initialize logging system with dual format (JSON + human-readable)
pub fn init_logging(settings: &WizardSettings, with_stdout: bool) -> anyhow::Result<PathBuf> {
    let log_dir = utils::path_resolver::resolve_log_folder(settings)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("integration-wizard-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("integration-wizard-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(settings.level_filter());

    if with_stdout && settings.log_to_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                // Proof-mode results go to stdout; keep log lines off it.
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        None,
                        None,
                        None,
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

/// Settings + logging for a proof mode. Falls back to defaults when the config is unreadable.
fn start_proof_mode(name: &str) -> (WizardSettings, Option<PathBuf>) {
    let settings = match WizardSettings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load settings, using defaults: {:#}", e);
            WizardSettings::default()
        }
    };

    let log_dir = match init_logging(&settings, true) {
        Ok(dir) => Some(dir),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    info!(
        "[PHASE: initialization] {} starting at {}",
        name,
        chrono::Utc::now()
    );
    (settings, log_dir)
}

fn parse_flow(flow: &str) -> FlowKind {
    match flow.parse::<FlowKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}

fn block_on_proof<F, T>(label: &str, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    match rt {
        Ok(rt) => rt.block_on(fut),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to create async runtime for {}: {}",
            label,
            e
        )),
    }
}

fn exit_with_error(phase: &str, step: &str, e: anyhow::Error) -> ! {
    error!(
        "[PHASE: {}] [STEP: {}] Proof mode exited with error: {:?}",
        phase, step, e
    );
    eprintln!("Wizard error: {:#}", e);
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => exit_with_error("output", "serialize", e.into()),
    }
}

/// Non-interactive wizard smoke (deterministic).
/// Walks every step with sample data, dry-run submits, prints the masked payload and writes
/// `wizard_smoke_<flow>_transcript.log` under the log folder. Exits 0/1.
pub fn run_smoke(flow: &str) {
    let kind = parse_flow(flow);
    let (settings, log_dir) = start_proof_mode("Wizard smoke");

    let result = block_on_proof(
        "wizard smoke",
        proof::smoke(kind, &settings, log_dir.as_deref()),
    );
    match result {
        Ok(report) => {
            let message = flows::flow_for(kind).messages().created.0;
            print_json(&ApiResponse::ok_with_message(report, message));
        }
        Err(e) => exit_with_error("smoke", "run", e),
    }
}

/// Validate every step of an aggregate form file. Exits 1 when any step is invalid.
pub fn run_validate(flow: &str, path: &str) {
    let kind = parse_flow(flow);
    let _ = start_proof_mode("Form validation");

    let result = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| proof::load_form(kind, &raw));
    let form = match result {
        Ok(form) => form,
        Err(e) => exit_with_error("validation", "load", e),
    };

    let failures = match block_on_proof("form validation", async {
        Ok(proof::validate_form(kind, &form).await)
    }) {
        Ok(failures) => failures,
        Err(e) => exit_with_error("validation", "run", e),
    };

    if failures.is_empty() {
        info!("[PHASE: validation] [STEP: validate_file] {} is valid", path);
        print_json(&ApiResponse::ok_with_message(failures, "All steps are valid"));
        return;
    }

    for (step, errors) in &failures {
        for (field, message) in errors {
            error!(
                "[PHASE: validation] [STEP: {}] {}: {}",
                step, field, message
            );
        }
    }
    let response = ApiResponse {
        success: false,
        data: Some(failures),
        error: Some("Form has invalid steps".to_string()),
        message: None,
    };
    print_json(&response);
    std::process::exit(1);
}

/// Print the request an aggregate form file would submit.
pub fn run_assemble(flow: &str, path: &str) {
    let kind = parse_flow(flow);
    let _ = start_proof_mode("Payload assembly");

    let result = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| proof::load_form(kind, &raw))
        .and_then(|form| proof::assemble_form(kind, &form));
    match result {
        Ok(payload) => print_json(&ApiResponse::ok(payload)),
        Err(e) => exit_with_error("submission", "assemble", e),
    }
}

/// Print the aggregate form edit mode would open for a backend record file.
pub fn run_hydrate(flow: &str, path: &str) {
    let kind = parse_flow(flow);
    let _ = start_proof_mode("Record hydration");

    let result = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| proof::hydrate_record(kind, &raw));
    match result {
        Ok(form) => print_json(&ApiResponse::ok(form)),
        Err(e) => exit_with_error("wizard", "hydrate", e),
    }
}
