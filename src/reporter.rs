use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;

use crate::types::{RunOutcome, RunReport};

/// How the run report is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One compact JSON line, for log scraping in CI.
    Line,
    /// Indented JSON, for a human running `--dry-run`.
    Pretty,
}

impl ReportFormat {
    pub fn for_run(dry_run: bool) -> Self {
        if dry_run { Self::Pretty } else { Self::Line }
    }
}

/// Short human summary of a run, e.g. `streamer: notified (session 42)`.
pub fn describe(report: &RunReport) -> String {
    let what = match report.outcome {
        RunOutcome::PollFailed => "could not poll Kick",
        RunOutcome::NotLive => "offline",
        RunOutcome::AlreadyNotified => "already notified",
        RunOutcome::OutsideWindow => "live, outside the notify window",
        RunOutcome::Notified => "notified",
        RunOutcome::DeliveryFailed => "notification FAILED",
        RunOutcome::DryRun => "would notify (dry run)",
    };
    let mut line = format!("{}: {what}", report.user);
    if let Some(id) = &report.session_id {
        line.push_str(&format!(" (session {id})"));
    }
    if report.marker_persisted == Some(false) {
        line.push_str("; marker not persisted");
    }
    if report.channel_renamed == Some(false) {
        line.push_str("; rename failed");
    }
    line
}

/// Write the report as JSON followed by a newline.
pub fn write_report<W: Write>(out: &mut W, report: &RunReport, format: ReportFormat) -> Result<()> {
    let json = match format {
        ReportFormat::Line => serde_json::to_string(report),
        ReportFormat::Pretty => serde_json::to_string_pretty(report),
    }
    .context("failed to serialize run report")?;
    writeln!(out, "{json}").context("failed to write run report")?;
    Ok(())
}

/// Log a one-line summary and emit the report to stdout.
pub fn report_run(report: &RunReport, format: ReportFormat) -> Result<()> {
    info!("{}", describe(report));
    write_report(&mut std::io::stdout().lock(), report, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            timestamp: "2024-01-01T00:05:00+00:00".into(),
            user: "streamer".into(),
            live: true,
            outcome,
            session_id: Some("42".into()),
            started_at: None,
            channel_renamed: None,
            marker_persisted: None,
        }
    }

    fn render(report: &RunReport, format: ReportFormat) -> String {
        let mut out = Vec::new();
        write_report(&mut out, report, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn line_format_is_one_line() {
        let out = render(&report(RunOutcome::Notified), ReportFormat::Line);
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with('\n'));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["outcome"], "notified");
        assert_eq!(v["session_id"], "42");
        assert!(v.get("started_at").is_none());
    }

    #[test]
    fn pretty_format_for_dry_run() {
        assert_eq!(ReportFormat::for_run(true), ReportFormat::Pretty);
        assert_eq!(ReportFormat::for_run(false), ReportFormat::Line);

        let out = render(&report(RunOutcome::DryRun), ReportFormat::Pretty);
        assert!(out.lines().count() > 3);
        assert!(out.contains("  \"outcome\": \"dry_run\""));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["user"], "streamer");
    }

    #[test]
    fn describe_mentions_partial_failures() {
        assert_eq!(
            describe(&report(RunOutcome::Notified)),
            "streamer: notified (session 42)"
        );

        let mut r = report(RunOutcome::Notified);
        r.marker_persisted = Some(false);
        r.channel_renamed = Some(false);
        assert_eq!(
            describe(&r),
            "streamer: notified (session 42); marker not persisted; rename failed"
        );

        let mut r = report(RunOutcome::NotLive);
        r.session_id = None;
        assert_eq!(describe(&r), "streamer: offline");
    }
}
