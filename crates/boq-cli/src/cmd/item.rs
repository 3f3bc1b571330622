//! `boq item`: priced lines. Every write here recomputes the affected
//! section and its bill.

use anyhow::{Context as _, Result};
use boq_core::Boq;
use boq_core::db::query::{ItemFilter, SectionItemTotals};
use boq_core::model::{Item, ItemPatch, ItemType, NewItem};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::local_time;
use crate::output::{
    OutputMode, Renderable, money, or_dash, pretty_kv, pretty_section, render_item, render_list,
    render_success,
};

#[derive(Args, Debug)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub command: ItemCommand,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Create one item. `amount` defaults to quantity x rate.
    Create(CreateArgs),
    /// Create many items from a JSON array in one transaction.
    Import {
        /// JSON file holding an array of item objects.
        #[arg(long)]
        file: PathBuf,
    },
    /// List items, filtered by project, bill, section and type.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        bill: Option<String>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long = "type")]
        item_type: Option<ItemType>,
    },
    /// Show one item.
    Show { id: String },
    /// Change item fields. A new quantity or rate reprices the item.
    Update(UpdateArgs),
    /// Delete an item and recompute its section.
    Delete { id: String },
    /// Live item total and count for a section, without writing anything.
    Totals { section: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub project: String,

    #[arg(long)]
    pub section: Option<String>,

    /// measured, lump_sum, prime_cost, provisional, attendant or collection.
    #[arg(long = "type", default_value = "measured")]
    pub item_type: ItemType,

    #[arg(long)]
    pub code: Option<String>,

    #[arg(long)]
    pub description: String,

    #[arg(long)]
    pub quantity: Option<Decimal>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Explicit amount; overrides quantity x rate.
    #[arg(long)]
    pub amount: Option<Decimal>,

    #[arg(long)]
    pub sort_order: Option<i64>,
}

impl CreateArgs {
    fn input(&self) -> NewItem {
        NewItem {
            project_id: self.project.clone(),
            section_id: self.section.clone(),
            item_type: self.item_type,
            item_code: self.code.clone(),
            description: self.description.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            rate: self.rate,
            amount: self.amount,
            sort_order: self.sort_order,
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    /// Move the item into this section.
    #[arg(long, conflicts_with = "unassign")]
    pub section: Option<String>,

    /// Take the item out of its section.
    #[arg(long)]
    pub unassign: bool,

    #[arg(long = "type")]
    pub item_type: Option<ItemType>,

    #[arg(long)]
    pub code: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub quantity: Option<Decimal>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Ignored when --quantity or --rate is also given.
    #[arg(long)]
    pub amount: Option<Decimal>,

    #[arg(long)]
    pub sort_order: Option<i64>,
}

impl UpdateArgs {
    fn patch(&self) -> ItemPatch {
        ItemPatch {
            section_id: if self.unassign {
                Some(None)
            } else {
                self.section.clone().map(Some)
            },
            item_type: self.item_type,
            item_code: self.code.clone().map(Some),
            description: self.description.clone(),
            quantity: self.quantity,
            unit: self.unit.clone().map(Some),
            rate: self.rate,
            amount: self.amount,
            sort_order: self.sort_order,
        }
    }
}

fn decimal_or_dash(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.normalize().to_string())
}

impl Renderable for Item {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let heading = match &self.item_code {
            Some(code) => format!("{code}  {}", self.description),
            None => self.description.clone(),
        };
        pretty_section(w, &heading)?;
        pretty_kv(w, "ID", &self.id)?;
        pretty_kv(w, "Section", or_dash(self.section_id.as_deref()))?;
        pretty_kv(w, "Type", self.item_type.as_str())?;
        pretty_kv(
            w,
            "Quantity",
            format!(
                "{} {}",
                decimal_or_dash(self.quantity),
                or_dash(self.unit.as_deref())
            ),
        )?;
        pretty_kv(w, "Rate", decimal_or_dash(self.rate))?;
        pretty_kv(w, "Amount", money(self.amount))?;
        pretty_kv(w, "Updated", local_time(self.updated_at_us))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            or_dash(self.section_id.as_deref()),
            self.item_type,
            self.description,
            decimal_or_dash(self.quantity),
            or_dash(self.unit.as_deref()),
            decimal_or_dash(self.rate),
            money(self.amount)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "SECTION", "TYPE", "DESCRIPTION", "QTY", "UNIT", "RATE", "AMOUNT"]
    }
}

impl Renderable for SectionItemTotals {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Section items (live)")?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Total", money(self.total_amount))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}\t{}", self.item_count, money(self.total_amount))
    }
}

fn read_import(path: &Path) -> Result<Vec<NewItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse items from {}", path.display()))
}

/// Execute `boq item <command>`.
///
/// # Errors
///
/// Returns the store error (not found, validation), an import parse
/// failure, or an output failure.
pub fn run_item(args: &ItemArgs, boq: &Boq, output: OutputMode) -> Result<()> {
    let items = boq.items();
    match &args.command {
        ItemCommand::Create(create) => render_item(&items.create(create.input())?, output),
        ItemCommand::Import { file } => {
            let inputs = read_import(file)?;
            let created = items.create_bulk(inputs)?;
            if output.is_json() {
                render_list(&created, output)
            } else {
                let ids: Vec<&str> = created.iter().map(|item| item.id.as_str()).collect();
                render_success(
                    output,
                    &format!("Imported {} item(s)", created.len()),
                    &ids.join(","),
                )
            }
        }
        ItemCommand::List {
            project,
            bill,
            section,
            item_type,
        } => {
            let filter = ItemFilter {
                project_id: project.clone(),
                bill_id: bill.clone(),
                section_id: section.clone(),
                item_type: *item_type,
            };
            render_list(&items.find_all(&filter)?, output)
        }
        ItemCommand::Show { id } => render_item(&items.get(id)?, output),
        ItemCommand::Update(update) => {
            render_item(&items.update(&update.id, update.patch())?, output)
        }
        ItemCommand::Delete { id } => {
            items.remove(id)?;
            render_success(output, &format!("Deleted item {id}"), id)
        }
        ItemCommand::Totals { section } => {
            render_item(&items.calculate_section_totals(section)?, output)
        }
    }
}
