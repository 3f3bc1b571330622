//! Collection CRUD. Collections sit beside the totals cascade: their
//! `total_amount` and `item_count` are whatever the caller last stored.

use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tracing::info;

use crate::db::query::{self, CollectionFilter, SortScope, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::{Collection, CollectionPatch, NewCollection};
use crate::validate;

use super::{Boq, now_us, require_item, require_project, require_section, same_project};

pub struct CollectionStore<'a> {
    boq: &'a Boq,
}

impl<'a> CollectionStore<'a> {
    pub(crate) const fn new(boq: &'a Boq) -> Self {
        Self { boq }
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the collection does not exist.
    pub fn get(&self, collection_id: &str) -> Result<Collection> {
        require_collection(self.boq.connection(), collection_id)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, filter: &CollectionFilter) -> Result<Vec<Collection>> {
        query::list_collections(self.boq.connection(), filter)
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] for a missing project, section or
    /// parent item, and [`BoqError::Validation`] for bad input or links
    /// into another project.
    pub fn create(&self, input: NewCollection) -> Result<Collection> {
        validate::new_collection(&input)?;

        let collection = self.boq.write("create collection", |cx| {
            let conn = cx.conn();
            require_project(conn, &input.project_id)?;
            let section = require_section(conn, &input.section_id)?;
            same_project("section_id", &input.project_id, &section.project_id)?;
            if let Some(parent) = input.parent_item_id.as_deref() {
                let item = require_item(conn, parent)?;
                same_project("parent_item_id", &input.project_id, &item.project_id)?;
            }

            let sort_order = match input.sort_order {
                Some(sort_order) => sort_order,
                None => query::next_sort_order(
                    conn,
                    SortScope::CollectionsInSection(&input.section_id),
                )?,
            };

            let now = now_us();
            let collection = Collection {
                id: new_id(Entity::Collection),
                project_id: input.project_id,
                section_id: input.section_id,
                parent_item_id: input.parent_item_id,
                collection_title: input.collection_title,
                description: input.description,
                page_reference: input.page_reference,
                document_reference: input.document_reference,
                collection_type: input.collection_type,
                total_amount: input.total_amount.unwrap_or(Decimal::ZERO),
                item_count: input.item_count.unwrap_or(0),
                sort_order,
                notes: input.notes,
                created_at_us: now,
                updated_at_us: now,
            };
            insert_collection(conn, &collection)?;
            Ok(collection)
        })?;

        info!(
            collection_id = %collection.id,
            section_id = %collection.section_id,
            kind = %collection.collection_type,
            "created collection"
        );
        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the collection or a new parent
    /// item is missing.
    pub fn update(&self, collection_id: &str, patch: CollectionPatch) -> Result<Collection> {
        validate::collection_patch(&patch)?;

        let collection = self.boq.write("update collection", |cx| {
            let conn = cx.conn();
            let mut collection = require_collection(conn, collection_id)?;

            if let Some(parent) = patch.parent_item_id {
                if let Some(item_id) = parent.as_deref() {
                    let item = require_item(conn, item_id)?;
                    same_project("parent_item_id", &collection.project_id, &item.project_id)?;
                }
                collection.parent_item_id = parent;
            }
            if let Some(title) = patch.collection_title {
                collection.collection_title = title;
            }
            if let Some(description) = patch.description {
                collection.description = description;
            }
            if let Some(page_reference) = patch.page_reference {
                collection.page_reference = page_reference;
            }
            if let Some(document_reference) = patch.document_reference {
                collection.document_reference = document_reference;
            }
            if let Some(collection_type) = patch.collection_type {
                collection.collection_type = collection_type;
            }
            if let Some(total_amount) = patch.total_amount {
                collection.total_amount = total_amount;
            }
            if let Some(item_count) = patch.item_count {
                collection.item_count = item_count;
            }
            if let Some(sort_order) = patch.sort_order {
                collection.sort_order = sort_order;
            }
            if let Some(notes) = patch.notes {
                collection.notes = notes;
            }
            collection.updated_at_us = now_us();

            conn.execute(
                "UPDATE collections SET parent_item_id = ?2, collection_title = ?3,
                     description = ?4, page_reference = ?5, document_reference = ?6,
                     collection_type = ?7, total_amount = ?8, item_count = ?9,
                     sort_order = ?10, notes = ?11, updated_at_us = ?12
                 WHERE collection_id = ?1",
                params![
                    collection.id,
                    collection.parent_item_id,
                    collection.collection_title,
                    collection.description,
                    collection.page_reference,
                    collection.document_reference,
                    collection.collection_type.as_str(),
                    decimal_text(collection.total_amount),
                    collection.item_count,
                    collection.sort_order,
                    collection.notes,
                    collection.updated_at_us,
                ],
            )
            .with_storage(|| format!("update collection '{collection_id}'"))?;
            Ok(collection)
        })?;

        info!(collection_id, "updated collection");
        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the collection does not exist.
    pub fn remove(&self, collection_id: &str) -> Result<()> {
        self.boq.write("remove collection", |cx| {
            let changed = cx
                .conn()
                .execute(
                    "DELETE FROM collections WHERE collection_id = ?1",
                    params![collection_id],
                )
                .with_storage(|| format!("delete collection '{collection_id}'"))?;
            if changed == 0 {
                return Err(BoqError::not_found(Entity::Collection, collection_id));
            }
            Ok(())
        })?;

        info!(collection_id, "removed collection");
        Ok(())
    }

    /// Collection totals are carried, never derived: this logs and returns
    /// the stored row unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BoqError::NotFound`] when the collection does not exist.
    pub fn recalculate_totals(&self, collection_id: &str) -> Result<Collection> {
        let collection = self.get(collection_id)?;
        info!(
            collection_id,
            total = %collection.total_amount,
            item_count = collection.item_count,
            "collection totals are not derived; nothing recalculated"
        );
        Ok(collection)
    }
}

fn require_collection(conn: &Connection, collection_id: &str) -> Result<Collection> {
    query::get_collection(conn, collection_id)?
        .ok_or_else(|| BoqError::not_found(Entity::Collection, collection_id))
}

pub(crate) fn insert_collection(conn: &Connection, collection: &Collection) -> Result<()> {
    conn.execute(
        "INSERT INTO collections (collection_id, project_id, section_id, parent_item_id,
                                 collection_title, description, page_reference,
                                 document_reference, collection_type, total_amount, item_count,
                                 sort_order, notes, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            collection.id,
            collection.project_id,
            collection.section_id,
            collection.parent_item_id,
            collection.collection_title,
            collection.description,
            collection.page_reference,
            collection.document_reference,
            collection.collection_type.as_str(),
            decimal_text(collection.total_amount),
            collection.item_count,
            collection.sort_order,
            collection.notes,
            collection.created_at_us,
            collection.updated_at_us,
        ],
    )
    .with_storage(|| format!("insert collection '{}'", collection.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CollectionType, NewItem, NewProject, NewSection};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("valid decimal literal")
    }

    fn setup(boq: &Boq) -> (String, String, String) {
        let project = boq
            .projects()
            .create(NewProject {
                name: "Bridge".into(),
                code: "BR".into(),
                ..NewProject::default()
            })
            .expect("project");
        let section = boq
            .sections()
            .create(NewSection {
                project_id: project.id.clone(),
                section_code: "D".into(),
                section_title: "Piling".into(),
                ..NewSection::default()
            })
            .expect("section");
        let item = boq
            .items()
            .create(NewItem {
                project_id: project.id.clone(),
                section_id: Some(section.id.clone()),
                description: "Bored piles".into(),
                quantity: Some(dec("12")),
                rate: Some(dec("800")),
                ..NewItem::default()
            })
            .expect("item");
        (project.id, section.id, item.id)
    }

    fn new_collection(project_id: &str, section_id: &str) -> NewCollection {
        NewCollection {
            project_id: project_id.into(),
            section_id: section_id.into(),
            collection_title: "Carried to collection".into(),
            page_reference: Some("4/12".into()),
            total_amount: Some(dec("9600")),
            item_count: Some(1),
            ..NewCollection::default()
        }
    }

    #[test]
    fn stored_totals_are_carried_not_derived() {
        let boq = Boq::open_in_memory().expect("open");
        let (project_id, section_id, _) = setup(&boq);
        let collection = boq
            .collections()
            .create(new_collection(&project_id, &section_id))
            .expect("create");
        assert_eq!(collection.collection_type, CollectionType::PageReference);

        let after = boq
            .collections()
            .recalculate_totals(&collection.id)
            .expect("recalc");
        assert_eq!(after.total_amount, dec("9600"));
        assert_eq!(after.item_count, 1);
        assert_eq!(after, collection);
    }

    #[test]
    fn deleting_parent_item_clears_link() {
        let boq = Boq::open_in_memory().expect("open");
        let (project_id, section_id, item_id) = setup(&boq);
        let mut input = new_collection(&project_id, &section_id);
        input.parent_item_id = Some(item_id.clone());
        let collection = boq.collections().create(input).expect("create");

        boq.items().remove(&item_id).expect("remove item");

        let after = boq.collections().get(&collection.id).expect("get");
        assert!(after.parent_item_id.is_none());
    }

    #[test]
    fn update_can_clear_optional_fields() {
        let boq = Boq::open_in_memory().expect("open");
        let (project_id, section_id, _) = setup(&boq);
        let collection = boq
            .collections()
            .create(new_collection(&project_id, &section_id))
            .expect("create");

        let updated = boq
            .collections()
            .update(
                &collection.id,
                CollectionPatch {
                    page_reference: Some(None),
                    collection_type: Some(CollectionType::DrawingReference),
                    document_reference: Some(Some("DWG-104".into())),
                    ..CollectionPatch::default()
                },
            )
            .expect("update");
        assert!(updated.page_reference.is_none());
        assert_eq!(updated.document_reference.as_deref(), Some("DWG-104"));
        assert_eq!(updated.collection_type, CollectionType::DrawingReference);
    }

    #[test]
    fn missing_section_is_not_found() {
        let boq = Boq::open_in_memory().expect("open");
        let (project_id, _, _) = setup(&boq);
        let err = boq
            .collections()
            .create(new_collection(&project_id, "sec-ffffffffffff"))
            .expect_err("missing section");
        assert!(err.is_not_found());
        assert!(
            boq.collections()
                .remove("col-ffffffffffff")
                .expect_err("missing")
                .is_not_found()
        );
    }
}
