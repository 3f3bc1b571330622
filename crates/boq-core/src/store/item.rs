//! Item CRUD. A thin caller of the cascade: every write recomputes the
//! section(s) it touched, which in turn recompute their bill.

use std::collections::BTreeSet;

use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tracing::info;

use crate::db::query::{self, ItemFilter, SectionItemTotals, SortScope, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::money::line_amount;
use crate::model::{Item, ItemPatch, NewItem};
use crate::validate;

use super::{
    Boq, Cascade, now_us, require_item, require_project, require_section, same_project,
};

pub struct ItemStore<'a> {
    boq: &'a Boq,
}

impl<'a> ItemStore<'a> {
    pub(crate) const fn new(boq: &'a Boq) -> Self {
        Self { boq }
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the item does not exist.
    pub fn get(&self, item_id: &str) -> Result<Item> {
        require_item(self.boq.connection(), item_id)
    }

    /// Items matching `filter`, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_all(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        query::list_items(self.boq.connection(), filter)
    }

    /// Read-only `{total_amount, item_count}` over the section's current
    /// items. Does not write the section.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the section does not exist.
    pub fn calculate_section_totals(&self, section_id: &str) -> Result<SectionItemTotals> {
        let conn = self.boq.connection();
        require_section(conn, section_id)?;
        query::section_item_totals(conn, section_id)
    }

    /// Create one item and recompute its section.
    ///
    /// `amount` is taken as given when supplied; otherwise it is
    /// `round(quantity * rate, 2)` when both operands are present, else 0.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::Validation`] for bad input, [`BoqError::NotFound`]
    /// for a missing project or section, or a storage error.
    pub fn create(&self, input: NewItem) -> Result<Item> {
        validate::new_item(&input)?;

        let item = self.boq.write("create item", |cx| {
            let item = build_item(cx.conn(), input)?;
            insert_item(cx.conn(), &item)?;
            if let Some(section_id) = item.section_id.as_deref() {
                cx.recalc_section(section_id)?;
            }
            Ok(item)
        })?;

        info!(
            item_id = %item.id,
            section_id = item.section_id.as_deref().unwrap_or("-"),
            amount = %item.amount,
            "created item"
        );
        Ok(item)
    }

    /// Create many items in one transaction, then recompute each distinct
    /// section once.
    ///
    /// # Errors
    ///
    /// Nothing is written when any input fails validation or references a
    /// missing parent.
    pub fn create_bulk(&self, inputs: Vec<NewItem>) -> Result<Vec<Item>> {
        for input in &inputs {
            validate::new_item(input)?;
        }

        let items = self.boq.write("create items", |cx| {
            let mut items = Vec::with_capacity(inputs.len());
            let mut touched: BTreeSet<String> = BTreeSet::new();

            for input in inputs {
                let item = build_item(cx.conn(), input)?;
                insert_item(cx.conn(), &item)?;
                if let Some(section_id) = &item.section_id {
                    touched.insert(section_id.clone());
                }
                items.push(item);
            }

            for section_id in &touched {
                cx.recalc_section(section_id)?;
            }
            Ok(items)
        })?;

        info!(count = items.len(), "created items in bulk");
        Ok(items)
    }

    /// Apply a partial update.
    ///
    /// When the patch carries `quantity` or `rate`, the other operand comes
    /// from the stored row (absent counts as 0) and `amount` is recomputed,
    /// overriding any `amount` in the patch. The item's current section is
    /// recomputed, and so is the section it left when `section_id` changed
    /// and the policy asks for it.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the item or a newly referenced
    /// section is missing, [`BoqError::Validation`] for bad input.
    pub fn update(&self, item_id: &str, patch: ItemPatch) -> Result<Item> {
        validate::item_patch(&patch)?;

        let (item, previous_section) = self.boq.write("update item", |cx| {
            let existing = require_item(cx.conn(), item_id)?;
            let previous_section = existing.section_id.clone();
            let item = apply_patch(cx.conn(), existing, patch)?;
            write_item(cx.conn(), &item)?;
            recalc_after_move(cx, previous_section.as_deref(), item.section_id.as_deref())?;
            Ok((item, previous_section))
        })?;

        info!(
            item_id,
            amount = %item.amount,
            moved = previous_section != item.section_id,
            "updated item"
        );
        Ok(item)
    }

    /// Delete an item and recompute the section it belonged to, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the item does not exist.
    pub fn remove(&self, item_id: &str) -> Result<()> {
        self.boq.write("remove item", |cx| {
            let section_id = require_item(cx.conn(), item_id)?.section_id;
            cx.conn()
                .execute("DELETE FROM items WHERE item_id = ?1", params![item_id])
                .with_storage(|| format!("delete item '{item_id}'"))?;
            if let Some(section_id) = section_id.as_deref() {
                cx.recalc_section(section_id)?;
            }
            Ok(())
        })?;

        info!(item_id, "removed item");
        Ok(())
    }
}

fn recalc_after_move(
    cx: &Cascade<'_>,
    previous: Option<&str>,
    current: Option<&str>,
) -> Result<()> {
    if let Some(current) = current {
        cx.recalc_section(current)?;
    }
    if cx.policy().recalc_previous_section_on_move
        && let Some(previous) = previous
        && Some(previous) != current
    {
        cx.recalc_section(previous)?;
    }
    Ok(())
}

fn build_item(conn: &Connection, input: NewItem) -> Result<Item> {
    require_project(conn, &input.project_id)?;

    if let Some(section_id) = input.section_id.as_deref() {
        let section = require_section(conn, section_id)?;
        same_project("section_id", &input.project_id, &section.project_id)?;
    }

    let sort_order = match (input.sort_order, input.section_id.as_deref()) {
        (Some(sort_order), _) => sort_order,
        (None, Some(section_id)) => {
            query::next_sort_order(conn, SortScope::ItemsInSection(section_id))?
        }
        (None, None) => {
            query::next_sort_order(conn, SortScope::LooseItemsInProject(&input.project_id))?
        }
    };

    let amount = match (input.amount, input.quantity, input.rate) {
        (Some(amount), _, _) => amount,
        (None, Some(quantity), Some(rate)) => line_amount(quantity, rate)?,
        _ => Decimal::ZERO,
    };

    let now = now_us();
    Ok(Item {
        id: new_id(Entity::Item),
        project_id: input.project_id,
        section_id: input.section_id,
        item_type: input.item_type,
        item_code: input.item_code,
        description: input.description,
        quantity: input.quantity,
        unit: input.unit,
        rate: input.rate,
        amount,
        sort_order,
        created_at_us: now,
        updated_at_us: now,
    })
}

fn apply_patch(conn: &Connection, mut item: Item, patch: ItemPatch) -> Result<Item> {
    let reprice = patch.touches_pricing();

    if let Some(section_id) = patch.section_id {
        if let Some(target) = section_id.as_deref() {
            let section = require_section(conn, target)?;
            same_project("section_id", &item.project_id, &section.project_id)?;
        }
        item.section_id = section_id;
    }
    if let Some(item_type) = patch.item_type {
        item.item_type = item_type;
    }
    if let Some(item_code) = patch.item_code {
        item.item_code = item_code;
    }
    if let Some(description) = patch.description {
        item.description = description;
    }
    if let Some(unit) = patch.unit {
        item.unit = unit;
    }
    if let Some(sort_order) = patch.sort_order {
        item.sort_order = sort_order;
    }
    if let Some(quantity) = patch.quantity {
        item.quantity = Some(quantity);
    }
    if let Some(rate) = patch.rate {
        item.rate = Some(rate);
    }

    if reprice {
        item.amount = line_amount(
            item.quantity.unwrap_or(Decimal::ZERO),
            item.rate.unwrap_or(Decimal::ZERO),
        )?;
    } else if let Some(amount) = patch.amount {
        item.amount = amount;
    }

    item.updated_at_us = now_us();
    Ok(item)
}

pub(crate) fn insert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (item_id, project_id, section_id, item_type, item_code, description,
                            quantity, unit, rate, amount, sort_order, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            item.id,
            item.project_id,
            item.section_id,
            item.item_type.as_str(),
            item.item_code,
            item.description,
            item.quantity.map(decimal_text),
            item.unit,
            item.rate.map(decimal_text),
            decimal_text(item.amount),
            item.sort_order,
            item.created_at_us,
            item.updated_at_us,
        ],
    )
    .with_storage(|| format!("insert item '{}'", item.id))?;
    Ok(())
}

fn write_item(conn: &Connection, item: &Item) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE items SET section_id = ?2, item_type = ?3, item_code = ?4, description = ?5,
                 quantity = ?6, unit = ?7, rate = ?8, amount = ?9, sort_order = ?10,
                 updated_at_us = ?11
             WHERE item_id = ?1",
            params![
                item.id,
                item.section_id,
                item.item_type.as_str(),
                item.item_code,
                item.description,
                item.quantity.map(decimal_text),
                item.unit,
                item.rate.map(decimal_text),
                decimal_text(item.amount),
                item.sort_order,
                item.updated_at_us,
            ],
        )
        .with_storage(|| format!("update item '{}'", item.id))?;
    if changed == 0 {
        return Err(BoqError::not_found(Entity::Item, &item.id));
    }
    Ok(())
}
