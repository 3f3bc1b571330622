//! `boq bill`: bills, their contingency and their roll-ups.

use anyhow::Result;
use boq_core::model::{Bill, BillPatch, NewBill, SortUpdate};
use boq_core::{BillStats, BillTotals, Boq};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::{self, Write};

use super::{local_time, parse_sort_update};
use crate::output::{
    OutputMode, Renderable, money, pretty_kv, pretty_section, render_item, render_list,
    render_success,
};

#[derive(Args, Debug)]
pub struct BillArgs {
    #[command(subcommand)]
    pub command: BillCommand,
}

#[derive(Subcommand, Debug)]
pub enum BillCommand {
    /// Create a bill in a project.
    Create(CreateArgs),
    /// List a project's bills in sort order.
    List {
        #[arg(long)]
        project: String,
    },
    /// Show one bill with its stored totals.
    Show { id: String },
    /// Change bill fields. A new contingency re-derives the totals.
    Update(UpdateArgs),
    /// Delete a bill with its sections and their collections.
    Delete { id: String },
    /// Recompute the bill from its sections' stored totals.
    Recalc { id: String },
    /// Set the contingency percentage (0-100).
    Contingency { id: String, percentage: Decimal },
    /// Recompute every section of the bill from its items, then the bill.
    Reconcile { id: String },
    /// Live totals straight from the sections, without writing anything.
    Stats { id: String },
    /// Deep-copy the bill into another project.
    Copy {
        id: String,
        #[arg(long = "to-project")]
        to_project: String,
    },
    /// Set sort orders, e.g. `boq bill reorder bil-a=0 bil-b=1`.
    Reorder {
        #[arg(required = true, value_parser = parse_sort_update)]
        updates: Vec<SortUpdate>,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub project: String,

    /// Bill number as printed, e.g. "2".
    #[arg(long)]
    pub number: String,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub sort_order: Option<i64>,

    /// Defaults to `[defaults] contingency_percentage` from the project config.
    #[arg(long)]
    pub contingency: Option<Decimal>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub number: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(long)]
    pub sort_order: Option<i64>,

    #[arg(long)]
    pub contingency: Option<Decimal>,
}

impl UpdateArgs {
    fn patch(&self) -> BillPatch {
        BillPatch {
            bill_number: self.number.clone(),
            bill_title: self.title.clone(),
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.clone().map(Some)
            },
            sort_order: self.sort_order,
            contingency_percentage: self.contingency,
        }
    }
}

impl Renderable for Bill {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("Bill No. {}: {}", self.bill_number, self.bill_title))?;
        pretty_kv(w, "ID", &self.id)?;
        pretty_kv(w, "Project", &self.project_id)?;
        if let Some(description) = &self.description {
            pretty_kv(w, "Description", description)?;
        }
        pretty_kv(w, "Sections", self.section_count.to_string())?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Subtotal", money(self.subtotal_amount))?;
        pretty_kv(
            w,
            "Contingency",
            format!(
                "{} ({}%)",
                money(self.contingency_amount),
                self.contingency_percentage.normalize()
            ),
        )?;
        pretty_kv(w, "Total", money(self.total_amount))?;
        pretty_kv(w, "Updated", local_time(self.updated_at_us))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.sort_order,
            self.bill_number,
            self.bill_title,
            money(self.subtotal_amount),
            self.contingency_percentage.normalize(),
            money(self.total_amount)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "ORDER", "NUMBER", "TITLE", "SUBTOTAL", "CONT%", "TOTAL"]
    }
}

impl Renderable for BillTotals {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("Bill {} recalculated", self.bill_id))?;
        pretty_kv(w, "Sections", self.section_count.to_string())?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Subtotal", money(self.subtotal_amount))?;
        pretty_kv(w, "Contingency", money(self.contingency_amount))?;
        pretty_kv(w, "Total", money(self.total_amount))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            self.bill_id,
            money(self.subtotal_amount),
            money(self.contingency_amount),
            money(self.total_amount)
        )
    }
}

impl Renderable for BillStats {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Bill totals (live)")?;
        pretty_kv(w, "Sections", self.section_count.to_string())?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Collections", self.collection_count.to_string())?;
        pretty_kv(w, "Subtotal", money(self.subtotal_amount))?;
        pretty_kv(w, "Contingency", money(self.contingency_amount))?;
        pretty_kv(w, "Total", money(self.total_amount))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.section_count,
            self.item_count,
            self.collection_count,
            money(self.subtotal_amount),
            money(self.contingency_amount),
            money(self.total_amount)
        )
    }
}

/// Execute `boq bill <command>`.
///
/// # Errors
///
/// Returns the store error (not found, validation) or an output failure.
pub fn run_bill(args: &BillArgs, boq: &Boq, output: OutputMode) -> Result<()> {
    let bills = boq.bills();
    match &args.command {
        BillCommand::Create(create) => {
            let bill = bills.create(NewBill {
                project_id: create.project.clone(),
                bill_number: create.number.clone(),
                bill_title: create.title.clone(),
                description: create.description.clone(),
                sort_order: create.sort_order,
                contingency_percentage: create.contingency,
            })?;
            render_item(&bill, output)
        }
        BillCommand::List { project } => render_list(&bills.list(project)?, output),
        BillCommand::Show { id } => render_item(&bills.get(id)?, output),
        BillCommand::Update(update) => {
            render_item(&bills.update(&update.id, update.patch())?, output)
        }
        BillCommand::Delete { id } => {
            bills.remove(id)?;
            render_success(output, &format!("Deleted bill {id}"), id)
        }
        BillCommand::Recalc { id } => render_item(&bills.recalculate_totals(id)?, output),
        BillCommand::Contingency { id, percentage } => {
            render_item(&bills.update_contingency(id, *percentage)?, output)
        }
        BillCommand::Reconcile { id } => render_item(&bills.reconcile(id)?, output),
        BillCommand::Stats { id } => render_item(&bills.calculate_stats(id)?, output),
        BillCommand::Copy { id, to_project } => {
            render_item(&bills.copy_to_project(id, to_project)?, output)
        }
        BillCommand::Reorder { updates } => {
            bills.reorder(updates)?;
            let ids: Vec<&str> = updates.iter().map(|u| u.id.as_str()).collect();
            render_success(
                output,
                &format!("Reordered {} bill(s)", updates.len()),
                &ids.join(","),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: BillCommand,
    }

    #[test]
    fn contingency_parses_decimal() {
        let w = Wrapper::parse_from(["test", "contingency", "bil-abc", "12.5"]);
        match w.command {
            BillCommand::Contingency { id, percentage } => {
                assert_eq!(id, "bil-abc");
                assert_eq!(percentage, Decimal::new(125, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reorder_requires_pairs() {
        assert!(Wrapper::try_parse_from(["test", "reorder"]).is_err());
        assert!(Wrapper::try_parse_from(["test", "reorder", "bil-a"]).is_err());
        let w = Wrapper::parse_from(["test", "reorder", "bil-a=1", "bil-b=0"]);
        assert!(matches!(w.command, BillCommand::Reorder { ref updates } if updates.len() == 2));
    }

    #[test]
    fn clear_description_becomes_explicit_null() {
        let w = Wrapper::parse_from(["test", "update", "bil-a", "--clear-description"]);
        let BillCommand::Update(update) = w.command else {
            panic!("expected update");
        };
        assert_eq!(update.patch().description, Some(None));
        assert!(update.patch().contingency_percentage.is_none());
    }
}
