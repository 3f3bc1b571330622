//! Core of `boq`: the Bill-of-Quantities data model, its SQLite store, and
//! the totals cascade that keeps section and bill roll-ups consistent with
//! their items.
//!
//! Data flows strictly bottom-up. An item write recomputes its section,
//! which recomputes its bill; a contingency change recomputes only the
//! bill; moving a section between bills recomputes both bills. No level
//! ever recomputes the level below it.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod model;
pub mod store;
pub mod validate;

pub use error::{BoqError, Entity, ErrorCode, Result};
pub use store::{
    BillStats, BillStore, BillTotals, Boq, Cascade, CascadeEvent, CascadeListener,
    CascadePolicy, CollectionStore, ItemStore, ProjectStats, ProjectStore, SectionStats,
    SectionStore, SectionTotals,
};
