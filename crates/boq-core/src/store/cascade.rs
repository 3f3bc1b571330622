//! Bottom-up totals cascade: Item -> Section -> Bill.
//!
//! Every recompute is a full re-aggregation over the rows visible to the
//! current transaction, never a delta, so running it twice changes nothing
//! and running it after a failed write repairs the stored totals.
//!
//! Store operations never call these functions directly on a bare
//! connection; they go through [`Cascade`], which is only handed out inside
//! the write transaction opened by [`crate::Boq`]. The cascade buffers a
//! [`CascadeEvent`] per recompute and the facade forwards them to registered
//! [`CascadeListener`]s once the transaction has committed.

use std::cell::RefCell;

use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::CascadeConfig;
use crate::db::query::{self, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::model::money::{contingency_amount, sum_money};
use crate::validate;

use super::now_us;

/// Which optional cascade steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadePolicy {
    pub rescan_on_contingency_change: bool,
    pub recalc_previous_section_on_move: bool,
    pub recalc_bill_on_section_delete: bool,
}

impl Default for CascadePolicy {
    fn default() -> Self {
        Self::from_config(&CascadeConfig::default())
    }
}

impl CascadePolicy {
    #[must_use]
    pub const fn from_config(config: &CascadeConfig) -> Self {
        Self {
            rescan_on_contingency_change: config.rescan_on_contingency_change,
            recalc_previous_section_on_move: config.recalc_previous_section_on_move,
            recalc_bill_on_section_delete: config.recalc_bill_on_section_delete,
        }
    }
}

/// Totals written to a section by one recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionTotals {
    pub section_id: String,
    pub bill_id: Option<String>,
    pub total_amount: Decimal,
    pub item_count: u32,
}

/// Totals written to a bill by one recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillTotals {
    pub bill_id: String,
    pub subtotal_amount: Decimal,
    pub contingency_percentage: Decimal,
    pub contingency_amount: Decimal,
    pub total_amount: Decimal,
    pub section_count: u32,
    pub item_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeEvent {
    SectionRecalculated(SectionTotals),
    BillRecalculated(BillTotals),
}

/// Observer of committed recomputes.
///
/// Notifications arrive in the order the recomputes ran, after the write
/// transaction has committed. A rolled-back write notifies nobody.
pub trait CascadeListener {
    fn section_recalculated(&self, _totals: &SectionTotals) {}

    fn bill_recalculated(&self, _totals: &BillTotals) {}
}

pub(crate) fn notify(listeners: &[Box<dyn CascadeListener>], events: &[CascadeEvent]) {
    for event in events {
        for listener in listeners {
            match event {
                CascadeEvent::SectionRecalculated(totals) => listener.section_recalculated(totals),
                CascadeEvent::BillRecalculated(totals) => listener.bill_recalculated(totals),
            }
        }
    }
}

/// Write-transaction context handed to store operations.
pub struct Cascade<'conn> {
    conn: &'conn Connection,
    policy: CascadePolicy,
    events: RefCell<Vec<CascadeEvent>>,
}

impl<'conn> Cascade<'conn> {
    pub(crate) const fn new(conn: &'conn Connection, policy: CascadePolicy) -> Self {
        Self {
            conn,
            policy,
            events: RefCell::new(Vec::new()),
        }
    }

    /// Connection bound to the open write transaction.
    #[must_use]
    pub const fn conn(&self) -> &'conn Connection {
        self.conn
    }

    #[must_use]
    pub const fn policy(&self) -> CascadePolicy {
        self.policy
    }

    pub(crate) fn into_events(self) -> Vec<CascadeEvent> {
        self.events.into_inner()
    }

    fn record(&self, event: CascadeEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Recompute a section from its items, then its bill.
    ///
    /// Returns `None` (and writes nothing) when the section does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or write fails.
    pub fn recalc_section(&self, section_id: &str) -> Result<Option<SectionTotals>> {
        let Some(totals) = self.recalc_section_only(section_id)? else {
            return Ok(None);
        };
        if let Some(bill_id) = totals.bill_id.as_deref() {
            self.recalc_bill(bill_id)?;
        }
        Ok(Some(totals))
    }

    /// Recompute a section from its items without touching its bill.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or write fails.
    pub fn recalc_section_only(&self, section_id: &str) -> Result<Option<SectionTotals>> {
        let Some(section) = query::get_section(self.conn, section_id)? else {
            debug!(section_id, "section recompute skipped: section absent");
            return Ok(None);
        };

        let sums = query::section_item_totals(self.conn, section_id)?;
        self.conn
            .execute(
                "UPDATE sections SET total_amount = ?1, item_count = ?2, updated_at_us = ?3
                 WHERE section_id = ?4",
                params![
                    decimal_text(sums.total_amount),
                    sums.item_count,
                    now_us(),
                    section_id
                ],
            )
            .with_storage(|| format!("write totals for section '{section_id}'"))?;

        debug!(
            section_id,
            total = %sums.total_amount,
            item_count = sums.item_count,
            "section recalculated"
        );

        let totals = SectionTotals {
            section_id: section.id,
            bill_id: section.bill_id,
            total_amount: sums.total_amount,
            item_count: sums.item_count,
        };
        self.record(CascadeEvent::SectionRecalculated(totals.clone()));
        Ok(Some(totals))
    }

    /// Recompute a bill from its sections and stored contingency percentage.
    ///
    /// Returns `None` (and writes nothing) when the bill does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or write fails.
    pub fn recalc_bill(&self, bill_id: &str) -> Result<Option<BillTotals>> {
        let Some(bill) = query::get_bill(self.conn, bill_id)? else {
            debug!(bill_id, "bill recompute skipped: bill absent");
            return Ok(None);
        };

        let sums = query::bill_section_totals(self.conn, bill_id)?;
        let totals = derive_bill_totals(
            bill.id,
            sums.subtotal_amount,
            bill.contingency_percentage,
            sums.section_count,
            sums.item_count,
        )?;
        self.write_bill_totals(&totals)?;
        Ok(Some(totals))
    }

    /// Persist a new contingency percentage and re-derive the bill totals.
    ///
    /// With `rescan_on_contingency_change` off, the stored subtotal and
    /// counts are reused instead of re-reading the sections.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::Validation`] when `percentage` is outside 0-100,
    /// [`BoqError::NotFound`] when the bill is missing, or a storage error.
    pub fn apply_contingency(&self, bill_id: &str, percentage: Decimal) -> Result<BillTotals> {
        validate::contingency_percentage(percentage)?;

        let bill = query::get_bill(self.conn, bill_id)?
            .ok_or_else(|| BoqError::not_found(Entity::Bill, bill_id))?;

        self.conn
            .execute(
                "UPDATE bills SET contingency_percentage = ?1, updated_at_us = ?2
                 WHERE bill_id = ?3",
                params![decimal_text(percentage), now_us(), bill_id],
            )
            .with_storage(|| format!("write contingency for bill '{bill_id}'"))?;

        if self.policy.rescan_on_contingency_change {
            return self
                .recalc_bill(bill_id)?
                .ok_or_else(|| BoqError::not_found(Entity::Bill, bill_id));
        }

        let totals = derive_bill_totals(
            bill.id,
            bill.subtotal_amount,
            percentage,
            bill.section_count,
            bill.item_count,
        )?;
        self.write_bill_totals(&totals)?;
        Ok(totals)
    }

    fn write_bill_totals(&self, totals: &BillTotals) -> Result<()> {
        self.conn
            .execute(
                "UPDATE bills SET subtotal_amount = ?1, contingency_amount = ?2,
                     total_amount = ?3, section_count = ?4, item_count = ?5, updated_at_us = ?6
                 WHERE bill_id = ?7",
                params![
                    decimal_text(totals.subtotal_amount),
                    decimal_text(totals.contingency_amount),
                    decimal_text(totals.total_amount),
                    totals.section_count,
                    totals.item_count,
                    now_us(),
                    totals.bill_id
                ],
            )
            .with_storage(|| format!("write totals for bill '{}'", totals.bill_id))?;

        debug!(
            bill_id = %totals.bill_id,
            subtotal = %totals.subtotal_amount,
            contingency = %totals.contingency_amount,
            total = %totals.total_amount,
            section_count = totals.section_count,
            item_count = totals.item_count,
            "bill recalculated"
        );

        self.record(CascadeEvent::BillRecalculated(totals.clone()));
        Ok(())
    }
}

fn derive_bill_totals(
    bill_id: String,
    subtotal_amount: Decimal,
    contingency_percentage: Decimal,
    section_count: u32,
    item_count: u32,
) -> Result<BillTotals> {
    let contingency = contingency_amount(subtotal_amount, contingency_percentage)?;
    Ok(BillTotals {
        bill_id,
        subtotal_amount,
        contingency_percentage,
        contingency_amount: contingency,
        total_amount: sum_money("total_amount", [subtotal_amount, contingency])?,
        section_count,
        item_count,
    })
}
