//! Replay command for turning a recorded event stream into results.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use bt_core::{
    AnalyzerResult, AttachedProcessor, BuildEvent, BuildStatus, EventBus, EventProcessor,
    ProcessorOptions, ProjectPath, SessionOutcome,
};

use crate::Config;

/// Reads one event per line. Blank lines are ignored and malformed lines
/// are skipped with a warning.
pub fn load_events<R: BufRead>(reader: R) -> Result<Vec<BuildEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<BuildEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(line = idx + 1, error = %e, "skipping malformed event"),
        }
    }
    Ok(events)
}

/// Publishes `events` to a fresh processor and returns its outcome.
pub fn replay(
    events: &[BuildEvent],
    root: Option<ProjectPath>,
    options: ProcessorOptions,
) -> SessionOutcome {
    let processor = match root {
        Some(root) => EventProcessor::with_root(root, options),
        None => EventProcessor::new(options),
    };

    let bus = EventBus::new();
    let attached = AttachedProcessor::attach(&bus, processor);
    for event in events {
        bus.publish(event);
    }
    attached.finish()
}

pub fn run<W: Write>(
    writer: &mut W,
    events_path: &Path,
    root: Option<&Path>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let file = File::open(events_path)
        .with_context(|| format!("failed to open {}", events_path.display()))?;
    let events = load_events(BufReader::new(file))?;
    tracing::debug!(count = events.len(), "loaded events");

    let root = root
        .map(|path| {
            ProjectPath::new(path.to_string_lossy())
                .with_context(|| format!("invalid root project {}", path.display()))
        })
        .transpose()?;

    let outcome = replay(&events, root, config.processor.clone());

    if json || config.json {
        writeln!(writer, "{}", format_report_json(&outcome)?)?;
    } else {
        write_report(writer, &outcome)?;
    }
    Ok(())
}

/// Formats milliseconds as seconds with millisecond precision.
pub fn format_duration(ms: i64) -> String {
    let ms = ms.max(0);
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}

fn duration_ms(outcome: &SessionOutcome) -> Option<i64> {
    Some((outcome.finished_at? - outcome.started_at?).num_milliseconds())
}

/// Writes the human-readable report.
pub fn write_report<W: Write>(writer: &mut W, outcome: &SessionOutcome) -> io::Result<()> {
    match duration_ms(outcome) {
        Some(ms) => writeln!(writer, "Build: {} in {}", outcome.overall_success, format_duration(ms))?,
        None => writeln!(writer, "Build: {}", outcome.overall_success)?,
    }
    if let Some(violation) = &outcome.violation {
        writeln!(writer, "Stopped early: {violation}")?;
    }

    let mut any = false;
    for result in outcome.projects.values().flat_map(|results| results.iter()) {
        any = true;
        writeln!(writer)?;
        write_result(writer, result)?;
    }
    if !any {
        writeln!(writer, "No tracked projects.")?;
    }
    Ok(())
}

fn write_result<W: Write>(writer: &mut W, result: &AnalyzerResult) -> io::Result<()> {
    writeln!(writer, "{}: {}", result.key(), result.succeeded())?;
    writeln!(writer, "  guid: {}", result.project_guid())?;

    match (result.compiler_invocation(), result.compiler_command()) {
        (None, _) => writeln!(writer, "  compiler: none")?,
        (Some(_), Some(command)) => writeln!(
            writer,
            "  compiler: {} ({} arguments)",
            command.language,
            command.arguments.len()
        )?,
        (Some(invocation), None) => match &invocation.parsed {
            Err(e) => writeln!(writer, "  compiler: {e}")?,
            Ok(_) => writeln!(writer, "  compiler: none")?,
        },
    }

    let display = |paths: Vec<std::path::PathBuf>| -> Vec<String> {
        paths.iter().map(|p| p.display().to_string()).collect()
    };
    write_section(writer, "sources", &display(result.source_files()))?;
    write_section(writer, "references", &result.references())?;
    write_section(writer, "analyzers", &result.analyzer_references())?;
    write_section(writer, "project references", &display(result.project_references()))?;

    let packages: Vec<String> = result
        .package_references()
        .into_iter()
        .map(|(name, metadata)| {
            let version = metadata
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("Version"))
                .map(|(_, version)| version);
            match version {
                Some(version) => format!("{name} {version}"),
                None => name,
            }
        })
        .collect();
    write_section(writer, "packages", &packages)?;
    write_section(writer, "errors", result.errors())?;
    Ok(())
}

fn write_section<W: Write>(writer: &mut W, label: &str, lines: &[String]) -> io::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    writeln!(writer, "  {label}:")?;
    for line in lines {
        writeln!(writer, "    {line}")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    overall_success: BuildStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    violation: Option<String>,
    results: Vec<JsonResult<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonResult<'a> {
    project: &'a str,
    target_framework: &'a str,
    succeeded: BuildStatus,
    project_guid: String,
    command_line: Option<&'a str>,
    compiler_error: Option<String>,
    source_files: Vec<String>,
    references: Vec<String>,
    analyzer_references: Vec<String>,
    project_references: Vec<String>,
    package_references: BTreeMap<String, BTreeMap<String, String>>,
    errors: &'a [String],
}

impl<'a> JsonResult<'a> {
    fn new(result: &'a AnalyzerResult) -> Self {
        let paths = |paths: Vec<std::path::PathBuf>| -> Vec<String> {
            paths.iter().map(|p| p.display().to_string()).collect()
        };
        Self {
            project: result.project_path().as_str(),
            target_framework: &result.key().target_framework,
            succeeded: result.succeeded(),
            project_guid: result.project_guid().to_string(),
            command_line: result.command_line(),
            compiler_error: result.compiler_error().map(ToString::to_string),
            source_files: paths(result.source_files()),
            references: result.references(),
            analyzer_references: result.analyzer_references(),
            project_references: paths(result.project_references()),
            package_references: result.package_references(),
            errors: result.errors(),
        }
    }
}

/// Formats the outcome as JSON.
pub fn format_report_json(outcome: &SessionOutcome) -> Result<String> {
    let report = JsonReport {
        overall_success: outcome.overall_success,
        started_at: outcome.started_at,
        finished_at: outcome.finished_at,
        duration_ms: duration_ms(outcome),
        violation: outcome.violation.as_ref().map(ToString::to_string),
        results: outcome
            .projects
            .values()
            .flat_map(|results| results.iter())
            .map(JsonResult::new)
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
