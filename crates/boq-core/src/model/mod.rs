//! Domain types for the Project → Bill → Section → Item/Collection hierarchy.

pub mod inputs;
pub mod kinds;
pub mod money;
pub mod records;

pub use inputs::{
    BillPatch, CollectionPatch, ItemPatch, NewBill, NewCollection, NewItem, NewProject,
    NewSection, ProjectPatch, SectionPatch, SortUpdate,
};
pub use kinds::{CollectionType, ItemType, ParseEnumError};
pub use records::{Bill, Collection, Item, Project, Section};
