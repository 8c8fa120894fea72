// Deterministic proof runners behind the binary's `--smoke`, `--validate`, `--assemble` and
// `--hydrate` modes. Each returns data; printing and exit codes stay in `lib.rs`.

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::api::{DryRunSubmitter, LogNotifier};
use crate::config::WizardSettings;
use crate::flows::{flow_for, unwrap_record, FlowKind};
use crate::validation::StepValidator;
use crate::wizard::{
    AggregateForm, ControllerOptions, StepHandle, ValidationApplied, WizardController,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeReport {
    pub flow: FlowKind,
    pub steps: Vec<String>,
    pub method: String,
    pub path: String,
    /// Secrets already masked.
    pub body: Value,
    pub transcript_path: Option<PathBuf>,
}

/// Drive `kind` from defaults plus sample data through every step and a dry-run submit.
/// When `log_dir` is given, a transcript is written there.
pub async fn smoke(
    kind: FlowKind,
    settings: &WizardSettings,
    log_dir: Option<&Path>,
) -> Result<SmokeReport> {
    let started = Instant::now();
    let flow = flow_for(kind);

    let mut transcript = String::new();
    let mut push = |line: String| {
        transcript.push_str(&line);
        transcript.push('\n');
    };
    push(format!("WIZARD_SMOKE begin flow={}", kind));

    let mut seed = flow.definition().default_form();
    seed.merge(flow.sample_overrides());
    let mut controller =
        WizardController::with_form(flow.clone(), seed, ControllerOptions::from(settings))?;

    let mut steps = Vec::new();
    for _ in 0..controller.step_count() {
        let current = controller.current_step();
        let name = controller
            .step(current)
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        match controller.advance().await? {
            ValidationApplied::Advanced { from, to } => {
                push(format!("EVENT advanced from={} to={} step={}", from, to, name));
            }
            ValidationApplied::ReadyToSubmit => {
                push(format!("EVENT ready_to_submit step={}", name));
            }
            ValidationApplied::Rejected(e) => {
                push(format!("EVENT rejected step={} errors={:?}", name, e.error_map()));
                bail!("{}", e);
            }
            other => bail!("Step '{}' did not pass: {:?}", name, other),
        }
        steps.push(name);
    }

    let submitter = DryRunSubmitter::new();
    controller.submit(&submitter, &LogNotifier).await?;
    let payload = controller
        .last_payload()
        .cloned()
        .ok_or_else(|| anyhow!("Submit finished without a payload"))?;

    push(format!(
        "EVENT submitted method={} path={} calls={}",
        payload.method(),
        payload.path(),
        submitter.call_count()
    ));
    push(format!("body={}", payload.masked_body()));
    push(format!(
        "WIZARD_SMOKE end elapsed_ms={}",
        started.elapsed().as_millis()
    ));
    push("ExitCode=0".to_string());

    let transcript_path = match log_dir {
        Some(dir) => {
            let path = dir.join(format!("wizard_smoke_{}_transcript.log", kind));
            tokio::fs::write(&path, transcript).await?;
            info!(
                "[PHASE: smoke] [STEP: transcript] Wrote transcript to {:?}",
                path
            );
            Some(path)
        }
        None => None,
    };

    Ok(SmokeReport {
        flow: kind,
        steps,
        method: payload.method().to_string(),
        path: payload.path(),
        body: payload.masked_body(),
        transcript_path,
    })
}

/// Parse an aggregate form file and lay it over the flow's defaults.
pub fn load_form(kind: FlowKind, raw: &str) -> Result<AggregateForm> {
    let value: Value = serde_json::from_str(raw).context("Form file is not valid JSON")?;
    let overlay = AggregateForm::from_json(unwrap_record(&value).clone())?;
    let mut form = flow_for(kind).definition().default_form();
    form.merge(overlay);
    Ok(form)
}

/// Validate every step; steps without errors are left out of the result.
pub async fn validate_form(
    kind: FlowKind,
    form: &AggregateForm,
) -> BTreeMap<String, BTreeMap<String, String>> {
    let definition = flow_for(kind).definition();
    let mut failures = BTreeMap::new();
    for step in definition.steps() {
        let values = form.get(&step.name).cloned().unwrap_or_else(|| json!({}));
        let result = step.validator.validate(&values).await;
        if !result.is_valid() {
            failures.insert(step.name.clone(), result.error_map());
        }
    }
    failures
}

pub fn assemble_form(kind: FlowKind, form: &AggregateForm) -> Result<Value> {
    let payload = flow_for(kind).assemble(form)?;
    Ok(json!({
        "method": payload.method().to_string(),
        "path": payload.path(),
        "body": payload.body()
    }))
}

/// Map a backend record (bare or `{ "data": ... }`) onto the aggregate form.
pub fn hydrate_record(kind: FlowKind, raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Record file is not valid JSON")?;
    let flow = flow_for(kind);
    let mut form = flow.definition().default_form();
    form.merge(flow.hydrate(unwrap_record(&value))?);
    Ok(form.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_flow_smokes_clean() {
        for kind in FlowKind::ALL {
            let report = smoke(kind, &WizardSettings::default(), None)
                .await
                .unwrap_or_else(|e| panic!("{} smoke failed: {:#}", kind, e));
            assert_eq!(report.method, "POST");
            assert_eq!(report.path, format!("/{}", kind.endpoint()));
            assert_eq!(
                report.steps.len(),
                flow_for(kind).definition().len(),
                "{}",
                kind
            );
        }
    }

    #[tokio::test]
    async fn smoke_writes_masked_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let report = smoke(FlowKind::RestApi, &WizardSettings::default(), Some(dir.path()))
            .await
            .unwrap();
        let path = report.transcript_path.unwrap();
        let transcript = std::fs::read_to_string(path).unwrap();
        assert!(transcript.starts_with("WIZARD_SMOKE begin flow=rest-api"));
        assert!(transcript.contains("EVENT ready_to_submit step=review"));
        assert!(transcript.trim_end().ends_with("ExitCode=0"));

        let secret = flow_for(FlowKind::RestApi)
            .sample_overrides()
            .value("authentication", "clientSecret")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap();
        assert!(!transcript.contains(&secret));
    }

    #[tokio::test]
    async fn validate_reports_only_failing_steps() {
        let form = load_form(FlowKind::ApprovalRequest, r#"{ "request": { "name": "Rel" } }"#)
            .unwrap();
        let failures = validate_form(FlowKind::ApprovalRequest, &form).await;
        assert_eq!(failures.len(), 1);
        let request = &failures["request"];
        assert_eq!(request["name"], "Request name must be at least 5 characters");
        assert!(!request.contains_key("environment"));
    }

    #[test]
    fn load_form_rejects_non_object_steps() {
        assert!(load_form(FlowKind::Client, r#"{ "company": 3 }"#).is_err());
        assert!(load_form(FlowKind::Client, "not json").is_err());
    }

    #[test]
    fn hydrate_accepts_wrapped_records() {
        let raw = r#"{ "data": {
            "id": "a-1", "name": "Release v2", "type": "API Release",
            "environment": "QA", "description": "Promote v2 endpoints",
            "changes": "pagination"
        } }"#;
        let form = hydrate_record(FlowKind::ApprovalRequest, raw).unwrap();
        assert_eq!(form["request"]["environment"], json!("QA"));
        assert_eq!(form["request"]["dependencies"], json!(""));

        let assembled = assemble_form(
            FlowKind::ApprovalRequest,
            &AggregateForm::from_json(form).unwrap(),
        )
        .unwrap();
        assert_eq!(assembled["path"], json!("/production-approval-request"));
        assert_eq!(assembled["body"]["name"], json!("Release v2"));
    }
}
