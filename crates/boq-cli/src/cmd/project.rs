//! `boq project`: create, inspect and roll up projects.

use anyhow::Result;
use boq_core::model::{NewProject, Project, ProjectPatch};
use boq_core::{Boq, ProjectStats};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::io::{self, Write};

use super::local_time;
use crate::output::{
    OutputMode, Renderable, money, pretty_kv, pretty_section, render_item, render_list,
    render_success,
};

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project.
    Create(CreateArgs),
    /// List all projects.
    List,
    /// Show one project.
    Show { id: String },
    /// Change project fields.
    Update(UpdateArgs),
    /// Delete a project and everything in it.
    Delete { id: String },
    /// Roll up bills, sections, items and collections against the budget.
    Stats { id: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    /// Short project code, e.g. "CL-02".
    #[arg(long)]
    pub code: String,

    #[arg(long, default_value = "0")]
    pub budget: Decimal,

    /// Defaults to `[defaults] currency` from the project config.
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub code: Option<String>,

    #[arg(long)]
    pub budget: Option<Decimal>,

    #[arg(long)]
    pub currency: Option<String>,
}

impl Renderable for Project {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("{} ({})", self.name, self.code))?;
        pretty_kv(w, "ID", &self.id)?;
        pretty_kv(w, "Budget", format!("{} {}", self.currency, money(self.budget)))?;
        pretty_kv(w, "Updated", local_time(self.updated_at_us))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id,
            self.code,
            self.name,
            self.currency,
            money(self.budget)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "CODE", "NAME", "CURRENCY", "BUDGET"]
    }
}

impl Renderable for ProjectStats {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Project totals")?;
        pretty_kv(w, "Bills", self.bill_count.to_string())?;
        pretty_kv(w, "Sections", self.section_count.to_string())?;
        pretty_kv(w, "Items", self.item_count.to_string())?;
        pretty_kv(w, "Collections", self.collection_count.to_string())?;
        pretty_kv(w, "Subtotal", money(self.subtotal_amount))?;
        pretty_kv(w, "Contingency", money(self.contingency_amount))?;
        pretty_kv(w, "Total", money(self.total_amount))?;
        pretty_kv(w, "Budget", money(self.budget))?;
        pretty_kv(w, "Remaining", money(self.budget_remaining))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.bill_count,
            self.section_count,
            self.item_count,
            money(self.total_amount),
            money(self.budget),
            money(self.budget_remaining)
        )
    }
}

/// Execute `boq project <command>`.
///
/// # Errors
///
/// Returns the store error (not found, validation) or an output failure.
pub fn run_project(args: &ProjectArgs, boq: &Boq, output: OutputMode) -> Result<()> {
    let projects = boq.projects();
    match &args.command {
        ProjectCommand::Create(create) => {
            let project = projects.create(NewProject {
                name: create.name.clone(),
                code: create.code.clone(),
                budget: create.budget,
                currency: create.currency.clone(),
            })?;
            render_item(&project, output)
        }
        ProjectCommand::List => render_list(&projects.list()?, output),
        ProjectCommand::Show { id } => render_item(&projects.get(id)?, output),
        ProjectCommand::Update(update) => {
            let project = projects.update(
                &update.id,
                ProjectPatch {
                    name: update.name.clone(),
                    code: update.code.clone(),
                    budget: update.budget,
                    currency: update.currency.clone(),
                },
            )?;
            render_item(&project, output)
        }
        ProjectCommand::Delete { id } => {
            projects.remove(id)?;
            render_success(output, &format!("Deleted project {id}"), id)
        }
        ProjectCommand::Stats { id } => render_item(&projects.stats(id)?, output),
    }
}
