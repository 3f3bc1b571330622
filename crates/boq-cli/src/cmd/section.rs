//! `boq section`: sections and their item roll-ups.

use anyhow::Result;
use boq_core::db::query::SectionFilter;
use boq_core::model::{NewSection, Section, SectionPatch, SortUpdate};
use boq_core::{Boq, SectionStats, SectionTotals};
use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::{local_time, parse_sort_update};
use crate::output::{
    OutputMode, Renderable, money, or_dash, pretty_kv, pretty_section, render_item, render_list,
    render_success,
};

#[derive(Args, Debug)]
pub struct SectionArgs {
    #[command(subcommand)]
    pub command: SectionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SectionCommand {
    /// Create a section, optionally inside a bill.
    Create(CreateArgs),
    /// List sections by project and/or bill, in sort order.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        bill: Option<String>,
    },
    /// Show one section with its stored totals.
    Show { id: String },
    /// Change section fields. Moving to another bill recomputes both bills.
    Update(UpdateArgs),
    /// Delete a section. Its items stay behind without a section.
    Delete { id: String },
    /// Recompute the section from its items, then its bill.
    Recalc { id: String },
    /// Live totals, collection count and item-type breakdown.
    Stats { id: String },
    /// Copy the section with its items and collections into another bill.
    Copy {
        id: String,
        #[arg(long = "to-bill")]
        to_bill: String,
    },
    /// Set sort orders, e.g. `boq section reorder sec-a=0 sec-b=1`.
    Reorder {
        #[arg(required = true, value_parser = parse_sort_update)]
        updates: Vec<SortUpdate>,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub project: String,

    #[arg(long)]
    pub bill: Option<String>,

    /// Short section code, e.g. "A" or "F16".
    #[arg(long)]
    pub code: String,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub preamble: Option<String>,

    #[arg(long)]
    pub sort_order: Option<i64>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    /// Move the section into this bill.
    #[arg(long, conflicts_with = "detach")]
    pub bill: Option<String>,

    /// Take the section out of its bill.
    #[arg(long)]
    pub detach: bool,

    #[arg(long)]
    pub code: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "clear_preamble")]
    pub preamble: Option<String>,

    #[arg(long)]
    pub clear_preamble: bool,

    #[arg(long)]
    pub sort_order: Option<i64>,
}

impl UpdateArgs {
    fn patch(&self) -> SectionPatch {
        SectionPatch {
            bill_id: if self.detach {
                Some(None)
            } else {
                self.bill.clone().map(Some)
            },
            section_code: self.code.clone(),
            section_title: self.title.clone(),
            preamble: if self.clear_preamble {
                Some(None)
            } else {
                self.preamble.clone().map(Some)
            },
            sort_order: self.sort_order,
        }
    }
}

impl Renderable for Section {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("Section {}: {}", self.section_code, self.section_title))?;
        pretty_kv(w, "ID", &self.id)?;
        pretty_kv(w, "Bill", or_dash(self.bill_id.as_deref()))?;
        if let Some(preamble) = &self.preamble {
            pretty_kv(w, "Preamble", preamble)?;
        }
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Total", money(self.total_amount))?;
        pretty_kv(w, "Updated", local_time(self.updated_at_us))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            or_dash(self.bill_id.as_deref()),
            self.sort_order,
            self.section_code,
            self.section_title,
            self.item_count,
            money(self.total_amount)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "BILL", "ORDER", "CODE", "TITLE", "ITEMS", "TOTAL"]
    }
}

impl Renderable for SectionTotals {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("Section {} recalculated", self.section_id))?;
        pretty_kv(w, "Bill", or_dash(self.bill_id.as_deref()))?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Total", money(self.total_amount))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}",
            self.section_id,
            self.item_count,
            money(self.total_amount)
        )
    }
}

impl Renderable for SectionStats {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Section totals (live)")?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Collections", self.collection_count.to_string())?;
        pretty_kv(w, "Total", money(self.total_amount))?;
        for (item_type, count) in &self.item_types {
            pretty_kv(w, item_type.as_str(), count.to_string())?;
        }
        Ok(())
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let types: Vec<String> = self
            .item_types
            .iter()
            .map(|(item_type, count)| format!("{item_type}={count}"))
            .collect();
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            self.item_count,
            self.collection_count,
            money(self.total_amount),
            types.join(",")
        )
    }
}

/// Execute `boq section <command>`.
///
/// # Errors
///
/// Returns the store error (not found, validation) or an output failure.
pub fn run_section(args: &SectionArgs, boq: &Boq, output: OutputMode) -> Result<()> {
    let sections = boq.sections();
    match &args.command {
        SectionCommand::Create(create) => {
            let section = sections.create(NewSection {
                project_id: create.project.clone(),
                bill_id: create.bill.clone(),
                section_code: create.code.clone(),
                section_title: create.title.clone(),
                preamble: create.preamble.clone(),
                sort_order: create.sort_order,
            })?;
            render_item(&section, output)
        }
        SectionCommand::List { project, bill } => {
            let filter = SectionFilter {
                project_id: project.clone(),
                bill_id: bill.clone(),
            };
            render_list(&sections.list(&filter)?, output)
        }
        SectionCommand::Show { id } => render_item(&sections.get(id)?, output),
        SectionCommand::Update(update) => {
            render_item(&sections.update(&update.id, update.patch())?, output)
        }
        SectionCommand::Delete { id } => {
            sections.remove(id)?;
            render_success(output, &format!("Deleted section {id}"), id)
        }
        SectionCommand::Recalc { id } => render_item(&sections.recalculate_totals(id)?, output),
        SectionCommand::Stats { id } => render_item(&sections.calculate_stats(id)?, output),
        SectionCommand::Copy { id, to_bill } => {
            render_item(&sections.copy_to_bill(id, to_bill)?, output)
        }
        SectionCommand::Reorder { updates } => {
            sections.reorder(updates)?;
            let ids: Vec<&str> = updates.iter().map(|u| u.id.as_str()).collect();
            render_success(
                output,
                &format!("Reordered {} section(s)", updates.len()),
                &ids.join(","),
            )
        }
    }
}
