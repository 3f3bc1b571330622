//! Cross-entity copy and reorder.
//!
//! Copies run inside the caller's write transaction: sources and targets are
//! resolved first, so a missing id fails before any row is written, and a
//! failure midway leaves no partial clone behind. Reorders are a plain
//! sequence of single-row updates with no enclosing transaction.

use std::collections::HashMap;

use rusqlite::{Connection, params};
use tracing::debug;

use crate::db::query::{self, CollectionFilter, ItemFilter, SectionFilter, SortScope};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::{Bill, Collection, Item, Section, SortUpdate};

use super::bill::insert_bill;
use super::collection::insert_collection;
use super::item::insert_item;
use super::section::insert_section;
use super::{Cascade, now_us, require_bill, require_project, require_section};

pub(crate) fn copy_bill_to_project(
    cx: &Cascade<'_>,
    bill_id: &str,
    target_project_id: &str,
) -> Result<Bill> {
    let conn = cx.conn();
    let source = require_bill(conn, bill_id)?;
    require_project(conn, target_project_id)?;

    let sections = query::list_sections(
        conn,
        &SectionFilter {
            bill_id: Some(source.id.clone()),
            ..SectionFilter::default()
        },
    )?;

    let now = now_us();
    let bill = Bill {
        id: new_id(Entity::Bill),
        project_id: target_project_id.to_string(),
        sort_order: query::next_sort_order(conn, SortScope::BillsInProject(target_project_id))?,
        created_at_us: now,
        updated_at_us: now,
        ..source
    };
    insert_bill(conn, &bill)?;

    for section in sections {
        let sort_order = section.sort_order;
        let copied = clone_section_tree(conn, section, target_project_id, &bill.id, sort_order)?;
        cx.recalc_section_only(&copied)?;
    }

    cx.recalc_bill(&bill.id)?;
    require_bill(conn, &bill.id)
}

pub(crate) fn copy_section_to_bill(
    cx: &Cascade<'_>,
    section_id: &str,
    target_bill_id: &str,
) -> Result<Section> {
    let conn = cx.conn();
    let source = require_section(conn, section_id)?;
    let target = require_bill(conn, target_bill_id)?;

    let sort_order = query::next_sort_order(conn, SortScope::SectionsInBill(&target.id))?;
    let copied = clone_section_tree(conn, source, &target.project_id, &target.id, sort_order)?;
    cx.recalc_section(&copied)?;
    require_section(conn, &copied)
}

/// Insert a fresh copy of `source` with its items and collections under
/// `bill_id`, returning the new section id.
fn clone_section_tree(
    conn: &Connection,
    source: Section,
    project_id: &str,
    bill_id: &str,
    sort_order: i64,
) -> Result<String> {
    let items = query::list_items(
        conn,
        &ItemFilter {
            section_id: Some(source.id.clone()),
            ..ItemFilter::default()
        },
    )?;
    let collections = query::list_collections(
        conn,
        &CollectionFilter {
            section_id: Some(source.id.clone()),
            ..CollectionFilter::default()
        },
    )?;

    let now = now_us();
    let source_id = source.id.clone();
    let section = Section {
        id: new_id(Entity::Section),
        project_id: project_id.to_string(),
        bill_id: Some(bill_id.to_string()),
        sort_order,
        created_at_us: now,
        updated_at_us: now,
        ..source
    };
    insert_section(conn, &section)?;

    let mut item_ids: HashMap<String, String> = HashMap::with_capacity(items.len());
    for item in items {
        let new_item_id = new_id(Entity::Item);
        item_ids.insert(item.id.clone(), new_item_id.clone());
        insert_item(
            conn,
            &Item {
                id: new_item_id,
                project_id: project_id.to_string(),
                section_id: Some(section.id.clone()),
                created_at_us: now,
                updated_at_us: now,
                ..item
            },
        )?;
    }

    let collection_count = collections.len();
    for collection in collections {
        let parent_item_id = collection
            .parent_item_id
            .as_ref()
            .and_then(|parent| item_ids.get(parent).cloned());
        insert_collection(
            conn,
            &Collection {
                id: new_id(Entity::Collection),
                project_id: project_id.to_string(),
                section_id: section.id.clone(),
                parent_item_id,
                created_at_us: now,
                updated_at_us: now,
                ..collection
            },
        )?;
    }

    debug!(
        source_section_id = %source_id,
        section_id = %section.id,
        items = item_ids.len(),
        collections = collection_count,
        "cloned section tree"
    );
    Ok(section.id)
}

pub(crate) fn reorder(conn: &Connection, entity: Entity, updates: &[SortUpdate]) -> Result<()> {
    let sql = match entity {
        Entity::Bill => {
            "UPDATE bills SET sort_order = ?1, updated_at_us = ?2 WHERE bill_id = ?3"
        }
        Entity::Section => {
            "UPDATE sections SET sort_order = ?1, updated_at_us = ?2 WHERE section_id = ?3"
        }
        Entity::Project | Entity::Item | Entity::Collection => {
            return Err(BoqError::validation(
                "entity",
                format!("{entity} cannot be reordered"),
            ));
        }
    };

    for update in updates {
        let changed = conn
            .execute(sql, params![update.new_sort_order, now_us(), update.id])
            .with_storage(|| format!("reorder {entity} '{}'", update.id))?;
        if changed == 0 {
            return Err(BoqError::not_found(entity, &update.id));
        }
    }

    debug!(%entity, count = updates.len(), "reordered");
    Ok(())
}
