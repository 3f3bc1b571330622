//! Store facade over one BOQ database.
//!
//! [`Boq`] owns the connection, the cascade policy and the configured
//! defaults. Per-entity stores borrow it:
//!
//! ```no_run
//! # fn demo() -> anyhow::Result<()> {
//! let boq = boq_core::Boq::open(std::path::Path::new("."))?;
//! let bills = boq.bills().list("prj-0123456789ab")?;
//! # let _ = bills;
//! # Ok(())
//! # }
//! ```
//!
//! Every mutating operation runs inside one `BEGIN IMMEDIATE` transaction
//! covering the row write and the whole cascade it triggers, so a failure
//! anywhere in the chain leaves the previous committed totals in place.

mod bill;
pub mod cascade;
mod collection;
mod copy;
mod item;
mod project;
mod section;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::config::{self, DefaultsConfig, ProjectConfig};
use crate::db::{self, query};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::model::{Bill, Item, Project, Section};

pub use bill::{BillStats, BillStore};
pub use cascade::{
    BillTotals, Cascade, CascadeEvent, CascadeListener, CascadePolicy, SectionTotals,
};
pub use collection::CollectionStore;
pub use item::ItemStore;
pub use project::{ProjectStats, ProjectStore};
pub use section::{SectionStats, SectionStore};

/// Handle to one BOQ database plus the policy that governs its cascade.
pub struct Boq {
    conn: Connection,
    policy: CascadePolicy,
    defaults: DefaultsConfig,
    listeners: Vec<Box<dyn CascadeListener>>,
}

impl Boq {
    /// Wrap an already-migrated connection.
    #[must_use]
    pub fn new(conn: Connection, config: &ProjectConfig) -> Self {
        Self {
            conn,
            policy: CascadePolicy::from_config(&config.cascade),
            defaults: config.defaults.clone(),
            listeners: Vec::new(),
        }
    }

    /// Open the store under `project_root/.boq`, honouring its config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is malformed or the store cannot be
    /// opened and migrated.
    pub fn open(project_root: &Path) -> anyhow::Result<Self> {
        let config = config::load_project_config(project_root)?;
        Self::open_with_config(project_root, &config)
    }

    /// Open the store under `project_root/.boq` with an explicit config.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened and migrated.
    pub fn open_with_config(project_root: &Path, config: &ProjectConfig) -> anyhow::Result<Self> {
        let conn = db::open_store(
            &config::store_path(project_root),
            Duration::from_millis(config.store.busy_timeout_ms),
        )?;
        Ok(Self::new(conn, config))
    }

    /// Private in-memory store with default config.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(db::open_in_memory()?, &ProjectConfig::default()))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CascadePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register an observer of committed recomputes.
    pub fn add_listener(&mut self, listener: Box<dyn CascadeListener>) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub const fn policy(&self) -> CascadePolicy {
        self.policy
    }

    #[must_use]
    pub const fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    /// Read-only access for ad-hoc queries through [`crate::db::query`].
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub const fn projects(&self) -> ProjectStore<'_> {
        ProjectStore::new(self)
    }

    #[must_use]
    pub const fn bills(&self) -> BillStore<'_> {
        BillStore::new(self)
    }

    #[must_use]
    pub const fn sections(&self) -> SectionStore<'_> {
        SectionStore::new(self)
    }

    #[must_use]
    pub const fn items(&self) -> ItemStore<'_> {
        ItemStore::new(self)
    }

    #[must_use]
    pub const fn collections(&self) -> CollectionStore<'_> {
        CollectionStore::new(self)
    }

    /// Run `op` inside an immediate write transaction and notify listeners
    /// of the recomputes it performed once it has committed.
    ///
    /// The transaction rolls back when `op` fails.
    pub(crate) fn write<T>(
        &self,
        label: &str,
        op: impl FnOnce(&Cascade<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .with_storage(|| format!("begin {label}"))?;

        let cx = Cascade::new(&tx, self.policy);
        let value = match op(&cx) {
            Ok(value) => value,
            Err(err) => {
                warn!(op = label, error = %err, "write rolled back");
                return Err(err);
            }
        };
        let events = cx.into_events();

        tx.commit().with_storage(|| format!("commit {label}"))?;
        cascade::notify(&self.listeners, &events);
        Ok(value)
    }
}

pub(crate) fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

pub(crate) fn require_project(conn: &Connection, project_id: &str) -> Result<Project> {
    query::get_project(conn, project_id)?
        .ok_or_else(|| BoqError::not_found(Entity::Project, project_id))
}

pub(crate) fn require_bill(conn: &Connection, bill_id: &str) -> Result<Bill> {
    query::get_bill(conn, bill_id)?.ok_or_else(|| BoqError::not_found(Entity::Bill, bill_id))
}

pub(crate) fn require_section(conn: &Connection, section_id: &str) -> Result<Section> {
    query::get_section(conn, section_id)?
        .ok_or_else(|| BoqError::not_found(Entity::Section, section_id))
}

pub(crate) fn require_item(conn: &Connection, item_id: &str) -> Result<Item> {
    query::get_item(conn, item_id)?.ok_or_else(|| BoqError::not_found(Entity::Item, item_id))
}

/// Reject links that would cross project boundaries.
pub(crate) fn same_project(field: &'static str, expected: &str, actual: &str) -> Result<()> {
    if expected != actual {
        return Err(BoqError::validation(
            field,
            format!("belongs to project {actual}, expected {expected}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBill, NewProject};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter {
        sections: Rc<Cell<u32>>,
        bills: Rc<Cell<u32>>,
    }

    impl CascadeListener for Counter {
        fn section_recalculated(&self, _totals: &SectionTotals) {
            self.sections.set(self.sections.get() + 1);
        }

        fn bill_recalculated(&self, _totals: &BillTotals) {
            self.bills.set(self.bills.get() + 1);
        }
    }

    #[test]
    fn failed_write_rolls_back_and_notifies_nobody() {
        let mut boq = Boq::open_in_memory().expect("open");
        let counter = Counter::default();
        let bills = Rc::clone(&counter.bills);
        boq.add_listener(Box::new(counter));

        let project = boq
            .projects()
            .create(NewProject {
                name: "Warehouse".into(),
                code: "WH".into(),
                ..NewProject::default()
            })
            .expect("create project");

        let result: Result<()> = boq.write("doomed", |cx| {
            cx.conn()
                .execute(
                    "INSERT INTO bills (bill_id, project_id, bill_number, bill_title,
                                        created_at_us, updated_at_us)
                     VALUES ('bil-000000000001', ?1, '1', 'Temp', 1, 1)",
                    [&project.id],
                )
                .storage("insert bill")?;
            cx.recalc_bill("bil-000000000001")?;
            Err(BoqError::validation("bill_title", "forced failure"))
        });
        assert!(result.is_err());

        assert!(boq.bills().list(&project.id).expect("list").is_empty());
        assert_eq!(bills.get(), 0);
    }

    #[test]
    fn listeners_see_committed_recomputes() {
        let mut boq = Boq::open_in_memory().expect("open");
        let counter = Counter::default();
        let bills = Rc::clone(&counter.bills);
        let sections = Rc::clone(&counter.sections);
        boq.add_listener(Box::new(counter));

        let project = boq
            .projects()
            .create(NewProject {
                name: "Warehouse".into(),
                code: "WH".into(),
                ..NewProject::default()
            })
            .expect("create project");
        let bill = boq
            .bills()
            .create(NewBill {
                project_id: project.id,
                bill_number: "1".into(),
                bill_title: "Preliminaries".into(),
                ..NewBill::default()
            })
            .expect("create bill");

        boq.bills().recalculate_totals(&bill.id).expect("recalc");
        assert_eq!(bills.get(), 1);
        assert_eq!(sections.get(), 0);
    }

    #[test]
    fn cross_project_link_is_rejected() {
        let err = same_project("section_id", "prj-aaaaaaaaaaaa", "prj-bbbbbbbbbbbb")
            .expect_err("mismatch");
        assert!(matches!(err, BoqError::Validation { field: "section_id", .. }));
    }
}
