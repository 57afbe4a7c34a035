/// `figcache figure` command implementation
///
/// Runs one request through the execution gate. Script failures are also
/// appended to the exception file for the outer reporting layer.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::cli::FigureArgs;
use crate::config_discovery::load_config_with_discovery;
use crate::error::{FigureError, ScriptFailure};
use crate::figure::{
    ExecutionGate, FigureRequest, GateOutcome, ManifestStore, ShellRunner, SiblingCache,
};
use crate::merger::MergedFigureConfig;

pub fn run(args: &FigureArgs) -> Result<()> {
    let file_config = load_config_with_discovery(args.common.config.as_deref())?;
    let config = MergedFigureConfig::merge(args, file_config)?;

    let request = FigureRequest::new(bare_name(&args.script)?, bare_name(&args.figure)?)
        .with_declared_outputs(args.outputs.max(1));

    let cache = SiblingCache::new(config.cache_dir()).context("Failed to open sibling cache")?;
    let runner = ShellRunner::from_env(config.runner_settings())?;
    let gate = ExecutionGate::new(
        ManifestStore::new(&config.manifest),
        cache,
        runner,
        config.gate_settings(),
    );

    match gate.request(&request) {
        Ok(outcome) => {
            tracing::debug!("{} -> {}", request.figure, describe(&outcome));
            Ok(())
        }
        Err(err) => {
            if let Some(failure) = err.script_failure() {
                if let Err(e) = record_failure(failure, &err) {
                    tracing::warn!("Failed to record script failure: {:#}", e);
                }
            }
            Err(err.into())
        }
    }
}

fn describe(outcome: &GateOutcome) -> String {
    match outcome {
        GateOutcome::SingleOutput => "generated".to_string(),
        GateOutcome::CacheHit => "restored from sibling cache".to_string(),
        GateOutcome::CacheMiss { copied, moved } => format!(
            "generated ({} sibling(s) copied, {} moved to cache)",
            copied.len(),
            moved.len()
        ),
    }
}

fn bare_name(path: &str) -> Result<String> {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file name: {}", path))
}

/// One line of the exception file
#[derive(Debug, Serialize)]
struct ExceptionRecord<'a> {
    timestamp: String,
    script: &'a str,
    rule_name: &'a str,
    brief: &'a str,
    context: &'a str,
    message: String,
}

fn record_failure(failure: &ScriptFailure, err: &FigureError) -> Result<()> {
    let Some(path) = &failure.exception_file else {
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let record = ExceptionRecord {
        timestamp: chrono::Utc::now().to_rfc3339(),
        script: &failure.script,
        rule_name: &failure.rule_name,
        brief: &failure.brief,
        context: &failure.context,
        message: err.to_string(),
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open exception file: {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(&record)?)
        .with_context(|| format!("Failed to write exception file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bare_name() {
        assert_eq!(bare_name("src/tex/figures/a.pdf").unwrap(), "a.pdf");
        assert_eq!(bare_name("plot.py").unwrap(), "plot.py");
        assert!(bare_name("..").is_err());
    }

    #[test]
    fn test_record_failure_appends_json_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("exception.log");
        let err = FigureError::script_failed(
            "plot.py",
            "a.pdf",
            Some(path.clone()),
            std::io::Error::other("exit status: 2"),
        );
        let failure = err.script_failure().unwrap();

        record_failure(failure, &err).unwrap();
        record_failure(failure, &err).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["script"], "plot.py");
        assert_eq!(record["rule_name"], "figure");
        assert!(record["message"].as_str().unwrap().contains("exit status: 2"));
    }
}
