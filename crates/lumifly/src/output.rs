//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders reports in the format selected by `--output`. Tables use `tabled`,
//! structured formats serialize the report itself, plain emits one line per
//! module (batches add a closing summary).

use std::io::{self, IsTerminal, Write};

use lumifly_core::{
    BatchReport, BatchSummary, DeviceOutcome, OutcomeStatus, ProbeOutcome, ProbeReport,
    ReadOutcome, ReadReport, Readback,
};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    color_enabled(mode, io::stdout().is_terminal())
}

/// Same decision for log lines, which go to stderr.
pub fn should_color_stderr(mode: &ColorMode) -> bool {
    color_enabled(mode, io::stderr().is_terminal())
}

fn color_enabled(mode: &ColorMode, terminal: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => terminal && std::env::var("NO_COLOR").is_err(),
    }
}

/// Batch headline, green when every module was applied.
pub fn paint_summary(summary: &BatchSummary, color: bool) -> String {
    let text = format!("{summary:#}");
    if !color {
        return text;
    }
    if summary.is_clean() {
        text.green().to_string()
    } else if summary.succeeded == 0 {
        text.red().to_string()
    } else {
        text.yellow().to_string()
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ProbeOutcome> for ProbeRow {
    fn from(o: &ProbeOutcome) -> Self {
        Self {
            index: o.index + 1,
            name: o.name.clone().unwrap_or_default(),
            endpoint: o.endpoint.clone(),
            status: if o.reachable { "reachable" } else { "unreachable" },
            detail: o.error.as_ref().map(|e| e.reason().to_owned()).unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ReadRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Dim")]
    dim: String,
    #[tabled(rename = "Front")]
    front: String,
    #[tabled(rename = "Back")]
    back: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&ReadOutcome> for ReadRow {
    fn from(o: &ReadOutcome) -> Self {
        let (dim, front, back, error) = match &o.result {
            Ok(f) => (
                f.dim.to_string(),
                on_off(f.front).into(),
                on_off(f.back).into(),
                String::new(),
            ),
            Err(e) => ("-".into(), "-".into(), "-".into(), e.to_string()),
        };
        Self {
            index: o.index + 1,
            name: o.name.clone().unwrap_or_default(),
            endpoint: o.endpoint.clone(),
            dim,
            front,
            back,
            error,
        }
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&DeviceOutcome> for OutcomeRow {
    fn from(o: &DeviceOutcome) -> Self {
        Self {
            index: o.index + 1,
            name: o.name.clone().unwrap_or_default(),
            endpoint: o.endpoint.clone(),
            result: status_word(&o.status),
            detail: status_detail(&o.status),
        }
    }
}

fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

fn status_word(status: &OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Applied { .. } => "applied".into(),
        OutcomeStatus::Failed { error } => format!("{} error", error.kind()),
        OutcomeStatus::Skipped { reason } => format!("skipped ({reason})"),
    }
}

fn status_detail(status: &OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Applied {
            readback: Readback::Confirmed(fields),
        } => fields.to_string(),
        OutcomeStatus::Applied {
            readback: Readback::Unknown { reason },
        } => format!("read-back unknown: {reason}"),
        OutcomeStatus::Failed { error } => error.reason().to_owned(),
        OutcomeStatus::Skipped { .. } => String::new(),
    }
}

// ── Report renderers ─────────────────────────────────────────────────

pub fn render_probe(format: &OutputFormat, report: &ProbeReport) -> String {
    render_single(
        format,
        report,
        |r| {
            let rows: Vec<ProbeRow> = r.outcomes.iter().map(ProbeRow::from).collect();
            format!(
                "{}\n{} of {} reachable",
                render_table(&rows),
                r.reachable().len(),
                r.outcomes.len()
            )
        },
        |r| {
            r.outcomes
                .iter()
                .map(|o| format!("{}\t{}", o.endpoint, on_off(o.reachable)))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

pub fn render_read(format: &OutputFormat, report: &ReadReport) -> String {
    render_single(
        format,
        report,
        |r| {
            let rows: Vec<ReadRow> = r.outcomes.iter().map(ReadRow::from).collect();
            format!(
                "{}\n{} read / {} failed",
                render_table(&rows),
                r.succeeded(),
                r.failed()
            )
        },
        |r| {
            r.outcomes
                .iter()
                .map(|o| match &o.result {
                    Ok(f) => format!("{}\t{}\t{}\t{}", o.endpoint, f.dim, f.front, f.back),
                    Err(e) => format!("{}\terror\t{e}", o.endpoint),
                })
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

pub fn render_batch(format: &OutputFormat, report: &BatchReport, color: bool) -> String {
    render_single(
        format,
        report,
        |r| {
            let rows: Vec<OutcomeRow> = r.outcomes.iter().map(OutcomeRow::from).collect();
            format!(
                "{} ({})\n{}\n{}",
                r.plan,
                r.policy,
                render_table(&rows),
                paint_summary(&r.summary(), color)
            )
        },
        |r| plain_batch(&r.outcomes, &r.summary()),
    )
}

/// One line per module, failures with their reason, then the summary.
fn plain_batch(outcomes: &[DeviceOutcome], summary: &BatchSummary) -> String {
    let mut lines: Vec<String> = outcomes
        .iter()
        .map(|o| {
            let word = status_word(&o.status);
            match &o.status {
                OutcomeStatus::Failed { error } => {
                    format!("{}\t{word}\t{}", o.endpoint, error.reason())
                }
                _ => format!("{}\t{word}", o.endpoint),
            }
        })
        .collect();
    lines.push(format!("{summary:#}"));
    lines.join("\n")
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, plain uses `plain_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => plain_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}\n"))
}
