use std::collections::BTreeMap;

use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::db::query::{self, SectionFilter, SortScope, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::{ItemType, NewSection, Section, SectionPatch, SortUpdate};
use crate::validate;

use super::cascade::SectionTotals;
use super::{Boq, copy, now_us, require_bill, require_project, require_section, same_project};

/// Live statistics for one section, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionStats {
    pub total_amount: Decimal,
    pub item_count: u32,
    pub collection_count: u32,
    pub item_types: BTreeMap<ItemType, u32>,
}

pub struct SectionStore<'a> {
    boq: &'a Boq,
}

impl<'a> SectionStore<'a> {
    pub(crate) const fn new(boq: &'a Boq) -> Self {
        Self { boq }
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section does not exist.
    pub fn get(&self, section_id: &str) -> Result<Section> {
        require_section(self.boq.connection(), section_id)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, filter: &SectionFilter) -> Result<Vec<Section>> {
        query::list_sections(self.boq.connection(), filter)
    }

    /// Create an empty section and recompute its bill so `section_count`
    /// includes it.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] for a missing project or bill, or
    /// [`BoqError::Validation`] for bad input or a bill in another project.
    pub fn create(&self, input: NewSection) -> Result<Section> {
        validate::new_section(&input)?;

        let section = self.boq.write("create section", |cx| {
            let conn = cx.conn();
            require_project(conn, &input.project_id)?;
            if let Some(bill_id) = input.bill_id.as_deref() {
                let bill = require_bill(conn, bill_id)?;
                same_project("bill_id", &input.project_id, &bill.project_id)?;
            }

            let sort_order = match (input.sort_order, input.bill_id.as_deref()) {
                (Some(sort_order), _) => sort_order,
                (None, Some(bill_id)) => {
                    query::next_sort_order(conn, SortScope::SectionsInBill(bill_id))?
                }
                (None, None) => query::next_sort_order(
                    conn,
                    SortScope::LooseSectionsInProject(&input.project_id),
                )?,
            };

            let now = now_us();
            let section = Section {
                id: new_id(Entity::Section),
                project_id: input.project_id,
                bill_id: input.bill_id,
                section_code: input.section_code,
                section_title: input.section_title,
                preamble: input.preamble,
                sort_order,
                total_amount: Decimal::ZERO,
                item_count: 0,
                created_at_us: now,
                updated_at_us: now,
            };
            insert_section(conn, &section)?;
            cx.recalc_section(&section.id)?;
            Ok(section)
        })?;

        info!(
            section_id = %section.id,
            bill_id = section.bill_id.as_deref().unwrap_or("-"),
            code = %section.section_code,
            "created section"
        );
        Ok(section)
    }

    /// Apply a partial update. Moving the section to another bill
    /// recomputes both the bill it left and the bill it joined.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section or target bill is
    /// missing, [`BoqError::Validation`] for bad input.
    pub fn update(&self, section_id: &str, patch: SectionPatch) -> Result<Section> {
        validate::section_patch(&patch)?;

        let section = self.boq.write("update section", |cx| {
            let conn = cx.conn();
            let mut section = require_section(conn, section_id)?;
            let previous_bill = section.bill_id.clone();

            if let Some(bill_id) = patch.bill_id {
                if let Some(target) = bill_id.as_deref() {
                    let bill = require_bill(conn, target)?;
                    same_project("bill_id", &section.project_id, &bill.project_id)?;
                }
                section.bill_id = bill_id;
            }
            if let Some(code) = patch.section_code {
                section.section_code = code;
            }
            if let Some(title) = patch.section_title {
                section.section_title = title;
            }
            if let Some(preamble) = patch.preamble {
                section.preamble = preamble;
            }
            if let Some(sort_order) = patch.sort_order {
                section.sort_order = sort_order;
            }
            section.updated_at_us = now_us();

            conn.execute(
                "UPDATE sections SET bill_id = ?2, section_code = ?3, section_title = ?4,
                     preamble = ?5, sort_order = ?6, updated_at_us = ?7
                 WHERE section_id = ?1",
                params![
                    section.id,
                    section.bill_id,
                    section.section_code,
                    section.section_title,
                    section.preamble,
                    section.sort_order,
                    section.updated_at_us,
                ],
            )
            .with_storage(|| format!("update section '{section_id}'"))?;

            if previous_bill != section.bill_id {
                if let Some(previous) = previous_bill.as_deref() {
                    cx.recalc_bill(previous)?;
                }
                if let Some(current) = section.bill_id.as_deref() {
                    cx.recalc_bill(current)?;
                }
            }
            Ok(section)
        })?;

        info!(section_id, "updated section");
        Ok(section)
    }

    /// Delete a section. Its items stay behind with no section and its
    /// collections are deleted. The former bill is only recomputed when the
    /// policy's `recalc_bill_on_section_delete` is set.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section does not exist.
    pub fn remove(&self, section_id: &str) -> Result<()> {
        let orphaned = self.boq.write("remove section", |cx| {
            let conn = cx.conn();
            let section = require_section(conn, section_id)?;
            let orphaned = query::section_item_totals(conn, section_id)?.item_count;

            conn.execute(
                "DELETE FROM sections WHERE section_id = ?1",
                params![section_id],
            )
            .with_storage(|| format!("delete section '{section_id}'"))?;

            if cx.policy().recalc_bill_on_section_delete
                && let Some(bill_id) = section.bill_id.as_deref()
            {
                cx.recalc_bill(bill_id)?;
            }
            Ok(orphaned)
        })?;

        info!(section_id, orphaned_items = orphaned, "removed section");
        Ok(())
    }

    /// Recompute the section from its items, then its bill.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section does not exist.
    pub fn recalculate_totals(&self, section_id: &str) -> Result<SectionTotals> {
        self.boq.write("recalculate section", |cx| {
            cx.recalc_section(section_id)?
                .ok_or_else(|| BoqError::not_found(Entity::Section, section_id))
        })
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section does not exist.
    pub fn calculate_stats(&self, section_id: &str) -> Result<SectionStats> {
        let conn = self.boq.connection();
        require_section(conn, section_id)?;
        let totals = query::section_item_totals(conn, section_id)?;
        Ok(SectionStats {
            total_amount: totals.total_amount,
            item_count: totals.item_count,
            collection_count: query::count_section_collections(conn, section_id)?,
            item_types: query::item_type_counts(conn, section_id)?,
        })
    }

    /// Clone the section with its items and collections into `target_bill_id`
    /// and recompute the new section (which recomputes the target bill).
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] before any write when the section or
    /// the target bill is missing.
    pub fn copy_to_bill(&self, section_id: &str, target_bill_id: &str) -> Result<Section> {
        let section = self.boq.write("copy section", |cx| {
            copy::copy_section_to_bill(cx, section_id, target_bill_id)
        })?;

        info!(
            source_section_id = section_id,
            section_id = %section.id,
            bill_id = target_bill_id,
            "copied section"
        );
        Ok(section)
    }

    /// Apply `{id, new_sort_order}` updates one at a time.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] on the first unknown id; updates
    /// before it stay applied.
    pub fn reorder(&self, updates: &[SortUpdate]) -> Result<()> {
        copy::reorder(self.boq.connection(), Entity::Section, updates)
    }
}

pub(crate) fn insert_section(conn: &Connection, section: &Section) -> Result<()> {
    conn.execute(
        "INSERT INTO sections (section_id, project_id, bill_id, section_code, section_title,
                               preamble, sort_order, total_amount, item_count,
                               created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            section.id,
            section.project_id,
            section.bill_id,
            section.section_code,
            section.section_title,
            section.preamble,
            section.sort_order,
            decimal_text(section.total_amount),
            section.item_count,
            section.created_at_us,
            section.updated_at_us,
        ],
    )
    .with_storage(|| format!("insert section '{}'", section.id))?;
    Ok(())
}
