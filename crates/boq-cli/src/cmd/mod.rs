pub mod bill;
pub mod collection;
pub mod completions;
pub mod init;
pub mod item;
pub mod project;
pub mod section;

use anyhow::Context as _;
use boq_core::config::{BOQ_DIR, ProjectConfig};
use boq_core::model::SortUpdate;
use boq_core::{BillTotals, Boq, CascadeListener, ErrorCode, SectionTotals};
use chrono::{DateTime, Local, Utc};
use std::path::Path;
use tracing::debug;

use crate::output::CliError;

/// Forwards committed recomputes to the log.
struct TraceListener;

impl CascadeListener for TraceListener {
    fn section_recalculated(&self, totals: &SectionTotals) {
        debug!(
            section_id = %totals.section_id,
            total = %totals.total_amount,
            item_count = totals.item_count,
            "section totals committed"
        );
    }

    fn bill_recalculated(&self, totals: &BillTotals) {
        debug!(
            bill_id = %totals.bill_id,
            subtotal = %totals.subtotal_amount,
            total = %totals.total_amount,
            "bill totals committed"
        );
    }
}

/// Open the store of an initialized project.
///
/// # Errors
///
/// Returns a `NotInitialized` [`CliError`] when `.boq/` is missing, or the
/// underlying error when the store cannot be opened.
pub fn open_store(project_root: &Path, config: &ProjectConfig) -> anyhow::Result<Boq> {
    if !project_root.join(BOQ_DIR).is_dir() {
        return Err(CliError::from_code(ErrorCode::NotInitialized).into());
    }
    let mut boq = Boq::open_with_config(project_root, config)
        .with_context(|| format!("Failed to open store under {}", project_root.display()))?;
    boq.add_listener(Box::new(TraceListener));
    Ok(boq)
}

/// Parse an `ID=SORT_ORDER` pair for the reorder commands.
pub fn parse_sort_update(raw: &str) -> Result<SortUpdate, String> {
    let (id, order) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=SORT_ORDER, got '{raw}'"))?;
    let order = order
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("invalid sort order in '{raw}': {err}"))?;
    Ok(SortUpdate::new(id.trim(), order))
}

/// Local wall-clock rendering of a stored microsecond timestamp.
#[must_use]
pub fn local_time(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us).map_or_else(
        || us.to_string(),
        |ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
