//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its result
//! accordingly: framed key/value blocks for humans, tab-separated rows for
//! pipes, or stable JSON. Failures go to stderr in the same mode.

use boq_core::{BoqError, ErrorCode};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// Money at two decimal places, the way it is printed everywhere.
#[must_use]
pub fn money(value: Decimal) -> String {
    format!("{value:.2}")
}

/// Placeholder for absent optional columns.
#[must_use]
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output (sections and visual framing).
    Pretty,
    /// Token-efficient tab-separated text for agents and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Map the mode name produced by config resolution.
    #[must_use]
    pub fn from_resolved(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }

    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Implemented by every record the CLI prints.
pub trait Renderable: Serialize {
    /// Framed multi-line block for humans.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// One tab-separated row, columns in [`Renderable::table_headers`] order.
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Render one record in the given mode.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_item<R: Renderable>(w: &mut dyn Write, item: &R, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => item.render_human(w),
        OutputMode::Text => item.render_table(w),
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, item)?;
            writeln!(w)
        }
    }
}

/// Render a list of records. JSON mode emits one array; text mode prints a
/// header row first when there is anything to print.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_list<R: Renderable>(
    w: &mut dyn Write,
    items: &[R],
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => {
            for item in items {
                item.render_human(w)?;
                writeln!(w)?;
            }
            if items.is_empty() {
                writeln!(w, "(none)")?;
            }
        }
        OutputMode::Text => {
            let headers = R::table_headers();
            if !items.is_empty() && !headers.is_empty() {
                writeln!(w, "{}", headers.join("\t"))?;
            }
            for item in items {
                item.render_table(w)?;
            }
        }
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, items)?;
            writeln!(w)?;
        }
    }
    Ok(())
}

/// Render a single record to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> anyhow::Result<()> {
    let stdout = io::stdout();
    write_item(&mut stdout.lock(), item, mode)?;
    Ok(())
}

/// Render a list of records to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> anyhow::Result<()> {
    let stdout = io::stdout();
    write_list(&mut stdout.lock(), items, mode)?;
    Ok(())
}

/// Report a mutation that has no record to show.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn render_success(mode: OutputMode, message: &str, id: &str) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "ok": true, "id": id, "message": message });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty => writeln!(out, "✓ {message}")?,
        OutputMode::Text => writeln!(out, "{message}")?,
    }
    Ok(())
}

/// A structured failure with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Failure described entirely by its code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_code(code.message(), code)
    }

    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// Best structured description of an error bubbling out of a command.
    #[must_use]
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(cli) = err.downcast_ref::<Self>() {
            return Self {
                message: cli.message.clone(),
                suggestion: cli.suggestion.clone(),
                error_code: cli.error_code.clone(),
            };
        }
        if let Some(boq) = err.downcast_ref::<BoqError>() {
            return Self::from(boq);
        }
        Self::with_code(format!("{err:#}"), ErrorCode::InternalUnexpected)
    }
}

impl From<&BoqError> for CliError {
    fn from(err: &BoqError) -> Self {
        Self::with_code(err.to_string(), err.code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

/// Write an error in the requested format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut *w, &wrapper)?;
            writeln!(w)
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(w, "error[{code}]: {}", error.message)?,
                None => writeln!(w, "error: {}", error.message)?,
            }
            if let Some(suggestion) = &error.suggestion {
                writeln!(w, "  suggestion: {suggestion}")?;
            }
            Ok(())
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) {
    let stderr = io::stderr();
    // Nothing useful left to do if stderr itself is gone.
    let _ = write_error(&mut stderr.lock(), mode, error);
}
