//! `boq collection`: page, drawing and specification references. Their
//! totals are whatever was last stored; nothing derives them.

use anyhow::Result;
use boq_core::Boq;
use boq_core::db::query::CollectionFilter;
use boq_core::model::{Collection, CollectionPatch, CollectionType, NewCollection};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::{self, Write};

use super::local_time;
use crate::output::{
    OutputMode, Renderable, money, or_dash, pretty_kv, pretty_section, render_item, render_list,
    render_success,
};

#[derive(Args, Debug)]
pub struct CollectionArgs {
    #[command(subcommand)]
    pub command: CollectionCommand,
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
    /// Attach a collection to a section, optionally under one of its items.
    Create(CreateArgs),
    /// List collections by project, section and/or parent item.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        parent_item: Option<String>,
    },
    /// Show one collection.
    Show { id: String },
    /// Change collection fields.
    Update(UpdateArgs),
    /// Delete a collection.
    Delete { id: String },
    /// Report the stored totals; collections are never re-derived.
    Recalc { id: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub project: String,

    #[arg(long)]
    pub section: String,

    #[arg(long)]
    pub parent_item: Option<String>,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub page: Option<String>,

    #[arg(long)]
    pub document: Option<String>,

    /// page_reference, item_collection, drawing_reference or
    /// specification_reference.
    #[arg(long = "type", default_value = "page_reference")]
    pub collection_type: CollectionType,

    #[arg(long)]
    pub total: Option<Decimal>,

    #[arg(long)]
    pub item_count: Option<u32>,

    #[arg(long)]
    pub sort_order: Option<i64>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long, conflicts_with = "detach")]
    pub parent_item: Option<String>,

    /// Unlink the collection from its parent item.
    #[arg(long)]
    pub detach: bool,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub page: Option<String>,

    #[arg(long)]
    pub document: Option<String>,

    #[arg(long = "type")]
    pub collection_type: Option<CollectionType>,

    #[arg(long)]
    pub total: Option<Decimal>,

    #[arg(long)]
    pub item_count: Option<u32>,

    #[arg(long)]
    pub sort_order: Option<i64>,

    #[arg(long)]
    pub notes: Option<String>,
}

impl UpdateArgs {
    fn patch(&self) -> CollectionPatch {
        CollectionPatch {
            parent_item_id: if self.detach {
                Some(None)
            } else {
                self.parent_item.clone().map(Some)
            },
            collection_title: self.title.clone(),
            description: self.description.clone().map(Some),
            page_reference: self.page.clone().map(Some),
            document_reference: self.document.clone().map(Some),
            collection_type: self.collection_type,
            total_amount: self.total,
            item_count: self.item_count,
            sort_order: self.sort_order,
            notes: self.notes.clone().map(Some),
        }
    }
}

impl Renderable for Collection {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &self.collection_title)?;
        pretty_kv(w, "ID", &self.id)?;
        pretty_kv(w, "Type", self.collection_type.as_str())?;
        pretty_kv(w, "Section", &self.section_id)?;
        pretty_kv(w, "Parent item", or_dash(self.parent_item_id.as_deref()))?;
        pretty_kv(w, "Page", or_dash(self.page_reference.as_deref()))?;
        pretty_kv(w, "Document", or_dash(self.document_reference.as_deref()))?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Total", money(self.total_amount))?;
        if let Some(notes) = &self.notes {
            pretty_kv(w, "Notes", notes)?;
        }
        pretty_kv(w, "Updated", local_time(self.updated_at_us))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.section_id,
            self.collection_type,
            self.collection_title,
            or_dash(self.page_reference.as_deref()),
            money(self.total_amount)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "SECTION", "TYPE", "TITLE", "PAGE", "TOTAL"]
    }
}

/// Execute `boq collection <command>`.
///
/// # Errors
///
/// Returns the store error (not found, validation) or an output failure.
pub fn run_collection(args: &CollectionArgs, boq: &Boq, output: OutputMode) -> Result<()> {
    let collections = boq.collections();
    match &args.command {
        CollectionCommand::Create(create) => {
            let collection = collections.create(NewCollection {
                project_id: create.project.clone(),
                section_id: create.section.clone(),
                parent_item_id: create.parent_item.clone(),
                collection_title: create.title.clone(),
                description: create.description.clone(),
                page_reference: create.page.clone(),
                document_reference: create.document.clone(),
                collection_type: create.collection_type,
                total_amount: create.total,
                item_count: create.item_count,
                sort_order: create.sort_order,
                notes: create.notes.clone(),
            })?;
            render_item(&collection, output)
        }
        CollectionCommand::List {
            project,
            section,
            parent_item,
        } => {
            let filter = CollectionFilter {
                project_id: project.clone(),
                section_id: section.clone(),
                parent_item_id: parent_item.clone(),
            };
            render_list(&collections.list(&filter)?, output)
        }
        CollectionCommand::Show { id } => render_item(&collections.get(id)?, output),
        CollectionCommand::Update(update) => {
            render_item(&collections.update(&update.id, update.patch())?, output)
        }
        CollectionCommand::Delete { id } => {
            collections.remove(id)?;
            render_success(output, &format!("Deleted collection {id}"), id)
        }
        CollectionCommand::Recalc { id } => {
            render_item(&collections.recalculate_totals(id)?, output)
        }
    }
}
