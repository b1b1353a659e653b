//! `stepflow-cli`: conduce el workflow de demostración y exporta snapshots.
//!
//! Uso:
//! - `stepflow-cli run [--increments <N>]`
//! - `stepflow-cli export [--mode basic|full] [--increments <N>]`
//! - `stepflow-cli hash`
//! - `stepflow-cli import --file <PATH> [--mode basic|full]`

mod config;
mod demo;
mod errors;

use std::fs;

use config::CliConfig;
use errors::CliError;
use serde_json::{json, Value};
use stepflow_core::ExportMode;

const USAGE: &str = "Uso: stepflow-cli <run|export|hash|import> [--increments <N>] [--mode basic|full] [--file <PATH>]";

#[derive(Debug, Default)]
struct Args {
    command: String,
    increments: Option<u32>,
    mode: Option<ExportMode>,
    file: Option<String>,
}

fn parse_args(raw: &[String]) -> Result<Args, CliError> {
    let mut args = Args { command: raw.get(1).cloned().unwrap_or_default(),
                          ..Args::default() };
    let mut i = 2;
    while i < raw.len() {
        let value = raw.get(i + 1);
        match raw[i].as_str() {
            "--increments" => args.increments = value.and_then(|v| v.parse().ok()),
            "--mode" => {
                let mode = value.ok_or_else(|| CliError::Usage(USAGE.into()))?;
                args.mode = Some(mode.parse().map_err(CliError::Usage)?);
            }
            "--file" => args.file = value.cloned(),
            other => return Err(CliError::Usage(format!("argumento desconocido '{other}'. {USAGE}"))),
        }
        i += 2;
    }
    Ok(args)
}

fn run(args: &Args, cfg: &CliConfig) -> Result<Value, CliError> {
    let mode = args.mode.unwrap_or(cfg.export_mode);
    let increments = args.increments.unwrap_or(3);
    match args.command.as_str() {
        "run" => {
            let (wf, graph) = demo::build()?;
            let trace = demo::drive(&wf, &graph, increments)?;
            Ok(json!({ "trace": trace, "historyLen": wf.history_len() }))
        }
        "export" => {
            let (wf, graph) = demo::build()?;
            demo::drive(&wf, &graph, increments)?;
            Ok(wf.export_value(mode))
        }
        "hash" => {
            let (wf, _) = demo::build()?;
            Ok(json!({ "definitionHash": wf.definition_hash() }))
        }
        "import" => {
            let path = args.file.clone().ok_or_else(|| CliError::Usage(USAGE.into()))?;
            let raw = fs::read_to_string(&path).map_err(|source| CliError::Io { path: path.clone(), source })?;
            let payload: Value = serde_json::from_str(&raw).map_err(|source| CliError::Json { path, source })?;
            let (wf, _) = demo::build()?;
            wf.import(mode, &payload)?;
            Ok(json!({ "current": demo::describe(&wf), "historyLen": wf.history_len() }))
        }
        _ => Err(CliError::Usage(USAGE.into())),
    }
}

fn main() {
    let cfg = CliConfig::from_env();
    let raw: Vec<String> = std::env::args().collect();
    let outcome = parse_args(&raw).and_then(|args| run(&args, &cfg));
    match outcome {
        Ok(value) => println!("{}", cfg.render(&value)),
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("[stepflow-cli] error: {e}");
            std::process::exit(4);
        }
    }
}
