//! Run-wide result aggregation and report rendering.

pub mod generator;

pub use generator::{generate_html_report, generate_json_report};

use crate::models::{Category, CategoryRun, CommitResult, FailureKind, RunReport};
use std::collections::BTreeMap;

/// Fold every category's failure lists and commit results into one
/// run-wide report. Pure; no I/O.
pub fn build_report(
    runs: &[CategoryRun],
    commits: BTreeMap<Category, CommitResult>,
) -> RunReport {
    let mut report = RunReport {
        commits,
        ..RunReport::default()
    };

    for run in runs {
        let collect = |kind| {
            run.failures_of(kind)
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        report.blocked.extend(collect(FailureKind::Blocked));
        report.timed_out.extend(collect(FailureKind::TimedOut));
        report
            .auth_failed
            .extend(collect(FailureKind::AuthenticationFailed));
    }

    report
}
