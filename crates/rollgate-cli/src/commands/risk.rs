use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use rollgate_risk::{
    FailureRecord, FsFreezeProbe, GuardSignals, RiskReport, RiskThresholds, classify,
};

/// Input document for `rollgate risk-check`.
#[derive(Debug, Deserialize)]
struct RiskInput {
    #[serde(default)]
    failures: Vec<FailureRecord>,
    #[serde(default)]
    signals: GuardSignals,
    /// Optional override; defaults apply when omitted.
    thresholds: Option<RiskThresholds>,
}

pub fn run(input: &Path, out: &Path, freeze_dir: &Path) -> ExitCode {
    match write_report(input, out, freeze_dir) {
        Ok(report) => {
            info!(
                new_risk = report.new_risk_count,
                human_ack = report.human_ack,
                out = %out.display(),
                "risk report written"
            );
            println!("NEW_RISK={}", report.new_risk_count);
            if let Some(note) = &report.note {
                println!("NOTE={note}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("risk-check failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn write_report(input: &Path, out: &Path, freeze_dir: &Path) -> anyhow::Result<RiskReport> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let doc: RiskInput =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", input.display()))?;

    let thresholds = doc.thresholds.unwrap_or_default();
    let probe = FsFreezeProbe::new(freeze_dir);
    let report = classify(&doc.failures, &doc.signals, &thresholds, &probe);

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    Ok(report)
}
