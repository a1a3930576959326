//! Report rendering in the three supported formats, plus error output.
//!
//! Renderers are pure: they take an [`AuditResult`] and write to any
//! [`Write`]. [`write_report`] picks the destination.
//!
//! # Formats
//!
//! - `table`: aligned columns for humans, followed by a summary line.
//! - `csv`: fixed ten-column rows with ISO-8601 timestamps.
//! - `json`: one pretty-printed document with `summary`, `inactive_days`
//!   and `guests`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use mm_guest_audit_core::model::{
    AuditResult, AuditSummary, ChannelRef, GuestRecord, GuestStatus, TeamRef,
};
use mm_guest_audit_core::time::{to_display_string, to_strict_string};
use serde::{Deserialize, Serialize};

/// Channels listed by name in table output before collapsing into `(+N more)`.
pub const TABLE_MAX_CHANNELS: usize = 2;

/// Spaces between table columns.
const COLUMN_GAP: usize = 2;

const TABLE_HEADERS: [&str; 8] = [
    "USERNAME",
    "DISPLAY NAME",
    "EMAIL",
    "TEAMS",
    "CHANNELS",
    "LAST LOGIN",
    "LAST POST",
    "STATUS",
];

const CSV_HEADERS: [&str; 10] = [
    "username",
    "display_name",
    "email",
    "created_at",
    "last_login",
    "last_post",
    "teams",
    "channels",
    "active",
    "inactive",
];

/// The supported report formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned columns with a summary line.
    #[default]
    Table,
    /// Comma-separated rows with a header.
    Csv,
    /// A single JSON document.
    Json,
}

impl OutputFormat {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to write output: {0}")]
pub struct OutputError(#[from] io::Error);

/// Render `result` to `path`, or stdout when no path is given.
///
/// If the file cannot be created a warning is logged and the report goes
/// to stdout instead.
///
/// # Errors
///
/// Returns an [`OutputError`] if writing to the chosen destination fails.
pub fn write_report(
    result: &AuditResult,
    format: OutputFormat,
    path: Option<&Path>,
) -> Result<(), OutputError> {
    let file = path.and_then(|path| match File::create(path) {
        Ok(file) => Some(file),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                "unable to write to output file, writing to stdout instead: {err}"
            );
            None
        }
    });

    match file {
        Some(file) => {
            let mut w = BufWriter::new(file);
            render(result, format, &mut w)?;
            w.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            render(result, format, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Dispatch to the renderer for `format`.
///
/// # Errors
///
/// Propagates any write error.
pub fn render(result: &AuditResult, format: OutputFormat, w: &mut dyn Write) -> io::Result<()> {
    match format {
        OutputFormat::Table => render_table(result, w),
        OutputFormat::Csv => render_csv(result, w),
        OutputFormat::Json => render_json(result, w),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Table
// ────────────────────────────────────────────────────────────────────────────

/// Render aligned columns followed by a blank line and a summary line.
///
/// # Errors
///
/// Propagates any write error.
pub fn render_table(result: &AuditResult, w: &mut dyn Write) -> io::Result<()> {
    let rows: Vec<[String; 8]> = result.guests.iter().map(table_row).collect();

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_aligned(w, TABLE_HEADERS.as_slice(), &widths)?;
    for row in &rows {
        write_aligned(w, row.as_slice(), &widths)?;
    }

    writeln!(w)?;
    writeln!(w, "{}", summary_line(&result.summary))
}

fn write_aligned<S: AsRef<str>>(w: &mut dyn Write, cells: &[S], widths: &[usize]) -> io::Result<()> {
    let mut line = String::new();
    let last = cells.len().saturating_sub(1);
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let cell = cell.as_ref();
        line.push_str(cell);
        if i < last {
            let pad = width - cell.chars().count() + COLUMN_GAP;
            line.extend(std::iter::repeat_n(' ', pad));
        }
    }
    writeln!(w, "{line}")
}

fn table_row(guest: &GuestRecord) -> [String; 8] {
    [
        guest.username.clone(),
        guest.display_name.clone(),
        guest.email.clone(),
        join_team_names(&guest.teams, ", "),
        truncated_channel_names(&guest.channels),
        to_display_string(guest.last_login),
        to_display_string(guest.last_post),
        status_word(guest).to_string(),
    ]
}

/// Status column value. Failed records fall back to their account state.
fn status_word(guest: &GuestRecord) -> &'static str {
    GuestStatus::of(guest.active, guest.inactive).as_str()
}

/// First [`TABLE_MAX_CHANNELS`] channel names, then `(+N more)`.
pub fn truncated_channel_names(channels: &[ChannelRef]) -> String {
    let shown = channels
        .iter()
        .take(TABLE_MAX_CHANNELS)
        .map(|c| c.channel_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match channels.len().checked_sub(TABLE_MAX_CHANNELS) {
        Some(hidden) if hidden > 0 => format!("{shown} (+{hidden} more)"),
        _ => shown,
    }
}

/// `Total: N guest(s)`, plus the non-zero buckets.
pub fn summary_line(summary: &AuditSummary) -> String {
    let mut line = format!("Total: {} guest(s)", summary.total_guests);
    let parts: Vec<String> = [
        (summary.active_guests, "active"),
        (summary.inactive_guests, "inactive"),
        (summary.deactivated_guests, "deactivated"),
        (summary.failed_lookups, "failed"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if !parts.is_empty() {
        line.push_str(" — ");
        line.push_str(&parts.join(", "));
    }
    line
}

fn join_team_names(teams: &[TeamRef], sep: &str) -> String {
    teams
        .iter()
        .map(|t| t.display_name.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

// ────────────────────────────────────────────────────────────────────────────
// CSV
// ────────────────────────────────────────────────────────────────────────────

/// Render a header row and one row per guest.
///
/// Teams are `|`-joined display names; channels are `|`-joined
/// `team/channel` pairs.
///
/// # Errors
///
/// Propagates any write error.
pub fn render_csv(result: &AuditResult, w: &mut dyn Write) -> io::Result<()> {
    write_csv_record(w, &CSV_HEADERS)?;
    for guest in &result.guests {
        let channels = guest
            .channels
            .iter()
            .map(|c| format!("{}/{}", c.team_name, c.channel_name))
            .collect::<Vec<_>>()
            .join("|");
        write_csv_record(
            w,
            &[
                guest.username.as_str(),
                guest.display_name.as_str(),
                guest.email.as_str(),
                &to_strict_string(guest.created_at),
                &to_strict_string(guest.last_login),
                &to_strict_string(guest.last_post),
                &join_team_names(&guest.teams, "|"),
                &channels,
                bool_str(guest.active),
                bool_str(guest.inactive),
            ],
        )?;
    }
    Ok(())
}

fn write_csv_record(w: &mut dyn Write, fields: &[&str]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(w, "{line}")
}

/// Quote a field if it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    summary: &'a AuditSummary,
    inactive_days: i64,
    guests: Vec<JsonGuest<'a>>,
}

/// Dates are strings or `null`; `channels` is always present.
#[derive(Debug, Serialize)]
struct JsonGuest<'a> {
    username: &'a str,
    display_name: &'a str,
    email: &'a str,
    created_at: Option<String>,
    last_login: Option<String>,
    last_post: Option<String>,
    teams: Vec<&'a str>,
    channels: &'a [ChannelRef],
    active: bool,
    inactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a GuestRecord> for JsonGuest<'a> {
    fn from(guest: &'a GuestRecord) -> Self {
        let date = |ts: Option<DateTime<Utc>>| ts.map(|t| to_strict_string(Some(t)));
        Self {
            username: &guest.username,
            display_name: &guest.display_name,
            email: &guest.email,
            created_at: date(guest.created_at),
            last_login: date(guest.last_login),
            last_post: date(guest.last_post),
            teams: guest
                .teams
                .iter()
                .map(|t| t.display_name.as_str())
                .collect(),
            channels: &guest.channels,
            active: guest.active,
            inactive: guest.inactive,
            error: guest.error.as_deref(),
        }
    }
}

/// Render the report as one pretty-printed JSON document.
///
/// # Errors
///
/// Propagates any write or serialization error.
pub fn render_json(result: &AuditResult, w: &mut dyn Write) -> io::Result<()> {
    let report = JsonReport {
        summary: &result.summary,
        inactive_days: result.inactive_days,
        guests: result.guests.iter().map(JsonGuest::from).collect(),
    };
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "configuration_error").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Create an error with a suggestion and error code.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

/// Write an error in the requested format.
///
/// # Errors
///
/// Propagates any write or serialization error.
pub fn write_error(format: OutputFormat, error: &CliError, w: &mut dyn Write) -> io::Result<()> {
    if format.is_json() {
        let wrapper = serde_json::json!({ "error": error });
        serde_json::to_writer_pretty(&mut *w, &wrapper)?;
        writeln!(w)
    } else {
        writeln!(w, "error: {}", error.message)?;
        if let Some(ref suggestion) = error.suggestion {
            writeln!(w, "  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(format: OutputFormat, error: &CliError) {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    if let Err(err) = write_error(format, error, &mut out) {
        tracing::error!("failed to write error output: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single()
    }

    fn channel(team: &str, name: &str) -> ChannelRef {
        ChannelRef {
            team_name: team.into(),
            channel_name: name.into(),
        }
    }

    fn team(id: &str, name: &str) -> TeamRef {
        TeamRef {
            id: id.into(),
            display_name: name.into(),
        }
    }

    fn sample_result() -> AuditResult {
        AuditResult {
            inactive_days: 30,
            guests: vec![
                GuestRecord {
                    username: "jane.doe".into(),
                    display_name: "Jane Doe".into(),
                    email: "jane.doe@external.com".into(),
                    created_at: at(2024, 3, 1, 10, 0),
                    last_login: at(2024, 11, 15, 8, 32),
                    last_post: at(2024, 11, 14, 17, 22),
                    teams: vec![team("team1", "Engineering"), team("team2", "Sales")],
                    channels: vec![
                        channel("Engineering", "General"),
                        channel("Engineering", "Dev Backend"),
                        channel("Sales", "Partner Updates"),
                    ],
                    active: true,
                    inactive: false,
                    error: None,
                },
                GuestRecord {
                    username: "bob.contractor".into(),
                    display_name: "Bob Contractor".into(),
                    email: "bob@contractor.io".into(),
                    created_at: at(2024, 3, 1, 10, 0),
                    last_login: None,
                    last_post: None,
                    teams: vec![team("team1", "Engineering")],
                    channels: vec![channel("Engineering", "General")],
                    active: true,
                    inactive: true,
                    error: None,
                },
            ],
            summary: AuditSummary {
                total_guests: 2,
                active_guests: 1,
                inactive_guests: 1,
                ..AuditSummary::default()
            },
        }
    }

    fn rendered(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render succeeds");
        String::from_utf8(buf).expect("utf-8 output")
    }

    // ── table ───────────────────────────────────────────────────────────────

    #[test]
    fn table_contains_rows_and_summary() {
        let out = rendered(|w| render_table(&sample_result(), w));
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("USERNAME  "));
        assert!(lines[0].ends_with("STATUS"));
        assert!(lines[1].starts_with("jane.doe"));
        assert!(lines[1].contains("Engineering, Sales"));
        assert!(lines[1].contains("General, Dev Backend (+1 more)"));
        assert!(lines[1].contains("2024-11-15 08:32"));
        assert!(lines[1].ends_with("Active"));
        assert!(lines[2].ends_with("Inactive"));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Total: 2 guest(s) — 1 active, 1 inactive");
    }

    #[test]
    fn table_shows_never_for_missing_dates() {
        let out = rendered(|w| render_table(&sample_result(), w));
        let bob = out
            .lines()
            .find(|l| l.starts_with("bob.contractor"))
            .expect("bob row");
        assert_eq!(bob.matches("Never").count(), 2);
    }

    #[test]
    fn table_columns_are_aligned() {
        let out = rendered(|w| render_table(&sample_result(), w));
        let lines: Vec<&str> = out.lines().take(3).collect();
        let email_col = lines[0].find("EMAIL").expect("EMAIL header");
        assert_eq!(lines[1].find("jane.doe@external.com"), Some(email_col));
        assert_eq!(lines[2].find("bob@contractor.io"), Some(email_col));
    }

    #[test]
    fn table_status_deactivated_beats_inactive() {
        let mut result = sample_result();
        result.guests[1].active = false;
        let out = rendered(|w| render_table(&result, w));
        let bob = out
            .lines()
            .find(|l| l.starts_with("bob.contractor"))
            .expect("bob row");
        assert!(bob.ends_with("Deactivated"));
    }

    #[test]
    fn channel_truncation() {
        let channels: Vec<ChannelRef> = ["General", "Random", "Dev", "Ops", "QA"]
            .iter()
            .map(|name| channel("Engineering", name))
            .collect();
        assert_eq!(truncated_channel_names(&channels), "General, Random (+3 more)");
        assert_eq!(truncated_channel_names(&channels[..2]), "General, Random");
        assert_eq!(truncated_channel_names(&[]), "");
    }

    #[test]
    fn summary_line_lists_only_non_zero_buckets() {
        let summary = AuditSummary {
            total_guests: 4,
            active_guests: 2,
            deactivated_guests: 1,
            failed_lookups: 1,
            ..AuditSummary::default()
        };
        assert_eq!(
            summary_line(&summary),
            "Total: 4 guest(s) — 2 active, 1 deactivated, 1 failed"
        );
        assert_eq!(
            summary_line(&AuditSummary::default()),
            "Total: 0 guest(s)"
        );
    }

    #[test]
    fn empty_table_has_header_and_summary() {
        let result = AuditResult {
            guests: Vec::new(),
            summary: AuditSummary::default(),
            inactive_days: 0,
        };
        let out = rendered(|w| render_table(&result, w));
        assert_eq!(out.lines().count(), 3);
        assert!(out.ends_with("Total: 0 guest(s)\n"));
    }

    // ── csv ─────────────────────────────────────────────────────────────────

    #[test]
    fn csv_rows() {
        let out = rendered(|w| render_csv(&sample_result(), w));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "username,display_name,email,created_at,last_login,last_post,teams,channels,active,inactive"
        );
        assert_eq!(
            lines[1],
            "jane.doe,Jane Doe,jane.doe@external.com,2024-03-01T10:00:00Z,2024-11-15T08:32:00Z,\
             2024-11-14T17:22:00Z,Engineering|Sales,\
             Engineering/General|Engineering/Dev Backend|Sales/Partner Updates,true,false"
        );
        assert_eq!(
            lines[2],
            "bob.contractor,Bob Contractor,bob@contractor.io,2024-03-01T10:00:00Z,,,Engineering,\
             Engineering/General,true,true"
        );
    }

    #[test]
    fn csv_empty_result_is_header_only() {
        let result = AuditResult {
            guests: Vec::new(),
            summary: AuditSummary::default(),
            inactive_days: 0,
        };
        let out = rendered(|w| render_csv(&result, w));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn csv_quotes_special_fields() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Doe, Jane"), "\"Doe, Jane\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    // ── json ────────────────────────────────────────────────────────────────

    #[test]
    fn json_document_shape() {
        let out = rendered(|w| render_json(&sample_result(), w));
        let doc: Value = serde_json::from_str(&out).expect("valid JSON");

        assert_eq!(doc["summary"]["total_guests"], 2);
        assert_eq!(doc["summary"]["active_guests"], 1);
        assert_eq!(doc["summary"]["inactive_guests"], 1);
        assert_eq!(doc["summary"]["failed_lookups"], 0);
        assert_eq!(doc["inactive_days"], 30);

        let jane = &doc["guests"][0];
        assert_eq!(jane["username"], "jane.doe");
        assert_eq!(jane["created_at"], "2024-03-01T10:00:00Z");
        assert_eq!(jane["teams"], serde_json::json!(["Engineering", "Sales"]));
        assert_eq!(jane["channels"].as_array().map(Vec::len), Some(3));
        assert_eq!(
            jane["channels"][0],
            serde_json::json!({"team": "Engineering", "channel": "General"})
        );
        assert!(jane.get("error").is_none());
    }

    #[test]
    fn json_absent_dates_are_null() {
        let out = rendered(|w| render_json(&sample_result(), w));
        let doc: Value = serde_json::from_str(&out).expect("valid JSON");
        let bob = &doc["guests"][1];
        assert!(bob["last_login"].is_null());
        assert!(bob["last_post"].is_null());
        assert!(out.contains("\"last_login\": null"));
    }

    #[test]
    fn json_channels_never_omitted() {
        let mut result = sample_result();
        result.guests[1].channels.clear();
        result.guests[1].error = Some("failed to get teams: boom".into());
        let out = rendered(|w| render_json(&result, w));
        let doc: Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(doc["guests"][1]["channels"], serde_json::json!([]));
        assert_eq!(doc["guests"][1]["error"], "failed to get teams: boom");
    }

    #[test]
    fn json_uses_two_space_indent() {
        let out = rendered(|w| render_json(&sample_result(), w));
        assert!(out.starts_with("{\n  \"summary\": {\n    \"total_guests\": 2"));
    }

    // ── file output ─────────────────────────────────────────────────────────

    #[test]
    fn write_report_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.csv");
        write_report(&sample_result(), OutputFormat::Csv, Some(&path)).expect("write succeeds");
        let content = std::fs::read_to_string(&path).expect("report written");
        assert!(content.starts_with("username,display_name"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn output_format_parses_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: OutputFormat,
        }
        let w: Wrapper = toml::from_str("format = \"json\"").expect("parses");
        assert_eq!(w.format, OutputFormat::Json);
        assert!(toml::from_str::<Wrapper>("format = \"xml\"").is_err());
    }

    // ── errors ──────────────────────────────────────────────────────────────

    #[test]
    fn error_human() {
        let err = CliError::with_details("bad input", "try again", "configuration_error");
        let out = rendered(|w| write_error(OutputFormat::Table, &err, w));
        assert_eq!(out, "error: bad input\n  suggestion: try again\n");
    }

    #[test]
    fn error_json() {
        let err = CliError::with_details("bad input", "try again", "configuration_error");
        let out = rendered(|w| write_error(OutputFormat::Json, &err, w));
        let doc: Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(doc["error"]["message"], "bad input");
        assert_eq!(doc["error"]["error_code"], "configuration_error");
    }

    #[test]
    fn error_without_suggestion() {
        let err = CliError::new("plain failure");
        let out = rendered(|w| write_error(OutputFormat::Csv, &err, w));
        assert_eq!(out, "error: plain failure\n");
    }
}
