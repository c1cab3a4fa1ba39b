use std::path::Path;
use std::process::ExitCode;

use rollgate_policy::{MetricResults, Policy, PolicyResult, Verdict, evaluate};

/// Run the promotion gate and print one `PROMOTION=...` line.
///
/// Fails closed: a missing file, broken YAML, or unreadable results
/// all print `PROMOTION=FAIL` with the error as the reason.
pub fn run(results_path: &Path, policy_path: Option<&Path>) -> ExitCode {
    let verdict = match evaluate_files(results_path, policy_path) {
        Ok(verdict) => verdict,
        Err(e) => {
            println!("PROMOTION=FAIL | {e}");
            return ExitCode::FAILURE;
        }
    };

    let label = if verdict.pass { "PASS" } else { "FAIL" };
    println!("PROMOTION={label} | {}", verdict.reason_line());
    if verdict.pass {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn evaluate_files(results_path: &Path, policy_path: Option<&Path>) -> PolicyResult<Verdict> {
    let results = MetricResults::load(results_path)?;
    let policy = match policy_path {
        Some(path) => Policy::load(path)?,
        None => Policy::empty(),
    };
    Ok(evaluate(&results, &policy))
}
