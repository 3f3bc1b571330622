use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::db::query::{self, SectionFilter, SortScope, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::money::{contingency_amount, sum_money};
use crate::model::{Bill, BillPatch, NewBill, SortUpdate};
use crate::validate;

use super::cascade::BillTotals;
use super::{Boq, copy, now_us, require_bill, require_project};

/// Live statistics for one bill, computed from its current sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillStats {
    pub subtotal_amount: Decimal,
    pub contingency_amount: Decimal,
    pub total_amount: Decimal,
    pub section_count: u32,
    pub item_count: u32,
    pub collection_count: u32,
}

pub struct BillStore<'a> {
    boq: &'a Boq,
}

impl<'a> BillStore<'a> {
    pub(crate) const fn new(boq: &'a Boq) -> Self {
        Self { boq }
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist.
    pub fn get(&self, bill_id: &str) -> Result<Bill> {
        require_bill(self.boq.connection(), bill_id)
    }

    /// Bills of a project in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, project_id: &str) -> Result<Vec<Bill>> {
        query::list_bills(self.boq.connection(), project_id)
    }

    /// Create an empty bill. Omitted contingency falls back to the
    /// configured default.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] for a missing project and
    /// [`BoqError::Validation`] for bad input.
    pub fn create(&self, input: NewBill) -> Result<Bill> {
        validate::new_bill(&input)?;
        let contingency = input
            .contingency_percentage
            .unwrap_or(self.boq.defaults().contingency_percentage);
        validate::contingency_percentage(contingency)?;

        let bill = self.boq.write("create bill", |cx| {
            let conn = cx.conn();
            require_project(conn, &input.project_id)?;
            let sort_order = match input.sort_order {
                Some(sort_order) => sort_order,
                None => {
                    query::next_sort_order(conn, SortScope::BillsInProject(&input.project_id))?
                }
            };

            let now = now_us();
            let bill = Bill {
                id: new_id(Entity::Bill),
                project_id: input.project_id,
                bill_number: input.bill_number,
                bill_title: input.bill_title,
                description: input.description,
                sort_order,
                subtotal_amount: Decimal::ZERO,
                contingency_percentage: contingency,
                contingency_amount: Decimal::ZERO,
                total_amount: Decimal::ZERO,
                section_count: 0,
                item_count: 0,
                created_at_us: now,
                updated_at_us: now,
            };
            insert_bill(conn, &bill)?;
            Ok(bill)
        })?;

        info!(
            bill_id = %bill.id,
            project_id = %bill.project_id,
            number = %bill.bill_number,
            "created bill"
        );
        Ok(bill)
    }

    /// Apply a partial update. A contingency change re-derives the totals.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist and
    /// [`BoqError::Validation`] for bad input.
    pub fn update(&self, bill_id: &str, patch: BillPatch) -> Result<Bill> {
        validate::bill_patch(&patch)?;

        let bill = self.boq.write("update bill", |cx| {
            let conn = cx.conn();
            let mut bill = require_bill(conn, bill_id)?;
            if let Some(number) = patch.bill_number {
                bill.bill_number = number;
            }
            if let Some(title) = patch.bill_title {
                bill.bill_title = title;
            }
            if let Some(description) = patch.description {
                bill.description = description;
            }
            if let Some(sort_order) = patch.sort_order {
                bill.sort_order = sort_order;
            }

            conn.execute(
                "UPDATE bills SET bill_number = ?2, bill_title = ?3, description = ?4,
                     sort_order = ?5, updated_at_us = ?6
                 WHERE bill_id = ?1",
                params![
                    bill.id,
                    bill.bill_number,
                    bill.bill_title,
                    bill.description,
                    bill.sort_order,
                    now_us(),
                ],
            )
            .with_storage(|| format!("update bill '{bill_id}'"))?;

            if let Some(percentage) = patch.contingency_percentage {
                cx.apply_contingency(bill_id, percentage)?;
            }
            require_bill(conn, bill_id)
        })?;

        info!(bill_id, "updated bill");
        Ok(bill)
    }

    /// Delete a bill together with its sections and their collections.
    /// Items of those sections stay behind with no section.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist.
    pub fn remove(&self, bill_id: &str) -> Result<()> {
        let sections = self.boq.write("remove bill", |cx| {
            let conn = cx.conn();
            let bill = require_bill(conn, bill_id)?;
            conn.execute("DELETE FROM bills WHERE bill_id = ?1", params![bill_id])
                .with_storage(|| format!("delete bill '{bill_id}'"))?;
            Ok(bill.section_count)
        })?;

        info!(bill_id, sections, "removed bill");
        Ok(())
    }

    /// Recompute the bill from its sections' stored totals.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist.
    pub fn recalculate_totals(&self, bill_id: &str) -> Result<BillTotals> {
        self.boq.write("recalculate bill", |cx| {
            cx.recalc_bill(bill_id)?
                .ok_or_else(|| BoqError::not_found(Entity::Bill, bill_id))
        })
    }

    /// Validate and store a new contingency percentage, re-derive the
    /// contingency and total, and return the refreshed bill.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::Validation`] outside 0-100 (nothing is written)
    /// and [`BoqError::NotFound`] when the bill does not exist.
    pub fn update_contingency(&self, bill_id: &str, percentage: Decimal) -> Result<Bill> {
        validate::contingency_percentage(percentage)?;
        let bill = self.boq.write("update contingency", |cx| {
            cx.apply_contingency(bill_id, percentage)?;
            require_bill(cx.conn(), bill_id)
        })?;

        info!(
            bill_id,
            percentage = %percentage,
            total = %bill.total_amount,
            "updated contingency"
        );
        Ok(bill)
    }

    /// Re-derive every section of the bill from its items, then the bill
    /// itself. Repairs totals left stale by an interrupted cascade or a
    /// section delete.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist.
    pub fn reconcile(&self, bill_id: &str) -> Result<BillTotals> {
        let totals = self.boq.write("reconcile bill", |cx| {
            let conn = cx.conn();
            require_bill(conn, bill_id)?;
            let sections = query::list_sections(
                conn,
                &SectionFilter {
                    bill_id: Some(bill_id.to_string()),
                    ..SectionFilter::default()
                },
            )?;
            for section in &sections {
                cx.recalc_section_only(&section.id)?;
            }
            cx.recalc_bill(bill_id)?
                .ok_or_else(|| BoqError::not_found(Entity::Bill, bill_id))
        })?;

        info!(
            bill_id,
            sections = totals.section_count,
            total = %totals.total_amount,
            "reconciled bill"
        );
        Ok(totals)
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the bill does not exist.
    pub fn calculate_stats(&self, bill_id: &str) -> Result<BillStats> {
        let conn = self.boq.connection();
        let bill = require_bill(conn, bill_id)?;
        let sums = query::bill_section_totals(conn, bill_id)?;
        let contingency = contingency_amount(sums.subtotal_amount, bill.contingency_percentage)?;
        Ok(BillStats {
            subtotal_amount: sums.subtotal_amount,
            contingency_amount: contingency,
            total_amount: sum_money("total_amount", [sums.subtotal_amount, contingency])?,
            section_count: sums.section_count,
            item_count: sums.item_count,
            collection_count: query::count_bill_collections(conn, bill_id)?,
        })
    }

    /// Deep-clone the bill with its sections, items and collections into
    /// `target_project_id`, then recompute the new bill once.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] before any write when the bill or the
    /// target project is missing.
    pub fn copy_to_project(&self, bill_id: &str, target_project_id: &str) -> Result<Bill> {
        let bill = self.boq.write("copy bill", |cx| {
            copy::copy_bill_to_project(cx, bill_id, target_project_id)
        })?;

        info!(
            source_bill_id = bill_id,
            bill_id = %bill.id,
            project_id = target_project_id,
            "copied bill"
        );
        Ok(bill)
    }

    /// Apply `{id, new_sort_order}` updates one at a time.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] on the first unknown id; updates
    /// before it stay applied.
    pub fn reorder(&self, updates: &[SortUpdate]) -> Result<()> {
        copy::reorder(self.boq.connection(), Entity::Bill, updates)
    }
}

pub(crate) fn insert_bill(conn: &Connection, bill: &Bill) -> Result<()> {
    conn.execute(
        "INSERT INTO bills (bill_id, project_id, bill_number, bill_title, description,
                            sort_order, subtotal_amount, contingency_percentage,
                            contingency_amount, total_amount, section_count, item_count,
                            created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            bill.id,
            bill.project_id,
            bill.bill_number,
            bill.bill_title,
            bill.description,
            bill.sort_order,
            decimal_text(bill.subtotal_amount),
            decimal_text(bill.contingency_percentage),
            decimal_text(bill.contingency_amount),
            decimal_text(bill.total_amount),
            bill.section_count,
            bill.item_count,
            bill.created_at_us,
            bill.updated_at_us,
        ],
    )
    .with_storage(|| format!("insert bill '{}'", bill.id))?;
    Ok(())
}
