//! HTML and JSON report rendering.
//!
//! The HTML document is what the report sink (mail relay or a plain file
//! drop) delivers to operators: a three-column table of failed hosts with
//! guidance per failure kind, followed by the git commit status of each
//! category directory.

use crate::models::RunReport;
use anyhow::Result;
use chrono::{DateTime, Local};

/// Generate the complete HTML report.
pub fn generate_html_report(report: &RunReport, generated_at: DateTime<Local>) -> String {
    let mut output = String::new();

    output.push_str("<html>\n<body>\n<font face=\"Calibri\">\n");
    output.push_str(&format!(
        "<h1>Device Backups for {}</h1>\n",
        generated_at.format("%Y-%m-%d")
    ));
    output.push_str(&generate_failed_hosts_section(report));
    output.push_str(&generate_commits_section(report));
    output.push_str("</font>\n</body>\n</html>\n");

    output
}

/// Generate the failed-hosts table with its explanatory paragraphs.
fn generate_failed_hosts_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("<h2>Failed Backup Hosts</h2>\n");
    section.push_str(
        "<p>If a host appears under \"Blocked\", this host actively denied an SSH \
         connection. Check firewall policies and SSH access rules.</p>\n",
    );
    section.push_str(
        "<p>If a host appears under \"Timed Out\", this host was out of reach at the \
         time of execution.</p>\n",
    );
    section.push_str(
        "<p>If a host appears under \"Authentication Failed\", the backup job does \
         not have the correct credentials for the device.</p>\n",
    );

    if report.total_failures() == 0 {
        section.push_str("<p>All devices backed up successfully.</p>\n");
        return section;
    }

    section.push_str("<table style=\"border:1px solid black\">\n<tr>\n");
    for heading in ["Blocked", "Timed Out", "Authentication Failed"] {
        section.push_str(&format!(
            "<th style=\"text-align: center; border-bottom:1px solid black;\">{}</th>\n",
            heading
        ));
    }
    section.push_str("</tr>\n");

    let rows = report
        .blocked
        .len()
        .max(report.timed_out.len())
        .max(report.auth_failed.len());

    for i in 0..rows {
        section.push_str("<tr>");
        for column in [&report.blocked, &report.timed_out, &report.auth_failed] {
            match column.get(i) {
                Some(host) => section.push_str(&format!(
                    "<td style=\"text-align: center\">{}</td>",
                    html_escape(host)
                )),
                None => section.push_str("<td>&nbsp;</td>"),
            }
        }
        section.push_str("</tr>\n");
    }
    section.push_str("</table>\n");

    section
}

/// Generate the per-category commit status section.
fn generate_commits_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("<hr>\n<h2>Backup Directory Git Commit Status</h2>\n");

    if report.commits.is_empty() {
        section.push_str("<p>No commits were attempted this run.</p>\n");
        return section;
    }

    for (category, result) in &report.commits {
        section.push_str(&format!("<h3>{}</h3>\n", category));
        section.push_str(&format!("<p>{}</p>\n", html_escape(&result.to_string())));
    }

    section
}

/// Generate a JSON report for machine consumers.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
