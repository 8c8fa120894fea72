const USAGE: &str = "\
Usage:
  integration-wizard --smoke=<flow>
  integration-wizard --validate=<flow> <form.json>
  integration-wizard --assemble=<flow> <form.json>
  integration-wizard --hydrate=<flow> <record.json>

Flows: file-upload, rest-api, graphql, client, approval-request";

/// Value of `--name=<value>`, when present and non-empty.
fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter()
        .find(|a| a.starts_with(&prefix))
        .and_then(|a| a.split_once('='))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// First argument that is not a flag.
fn file_argument(args: &[String]) -> Option<&str> {
    args.iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
}

fn require_file(args: &[String], mode: &str) -> String {
    match file_argument(args) {
        Some(path) => path.to_string(),
        None => {
            eprintln!("--{} needs a JSON file argument\n\n{}", mode, USAGE);
            std::process::exit(2);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    // Deterministic smoke: walks every step, dry-run submits, writes
    // `wizard_smoke_<flow>_transcript.log` under the log folder and exits 0/1.
    if let Some(flow) = flag_value(&args, "smoke") {
        integration_wizard::run_smoke(flow);
        return;
    }

    if let Some(flow) = flag_value(&args, "validate") {
        let path = require_file(&args, "validate");
        integration_wizard::run_validate(flow, &path);
        return;
    }

    if let Some(flow) = flag_value(&args, "assemble") {
        let path = require_file(&args, "assemble");
        integration_wizard::run_assemble(flow, &path);
        return;
    }

    if let Some(flow) = flag_value(&args, "hydrate") {
        let path = require_file(&args, "hydrate");
        integration_wizard::run_hydrate(flow, &path);
        return;
    }

    eprintln!("{}", USAGE);
    std::process::exit(2);
}
