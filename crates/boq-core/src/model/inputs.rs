//! Caller-supplied payloads for create and partial-update operations.
//!
//! Patch structs use `Option<T>` for "leave unchanged" and
//! `Option<Option<T>>` on nullable columns so a caller can distinguish
//! "leave unchanged" (`None`) from "clear" (`Some(None)`).

use rust_decimal::Decimal;
use serde::Deserialize;

use super::kinds::{CollectionType, ItemType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub budget: Decimal,
    /// Falls back to the configured default currency.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub budget: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewBill {
    pub project_id: String,
    pub bill_number: String,
    pub bill_title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Appended after the project's last bill when omitted.
    #[serde(default)]
    pub sort_order: Option<i64>,
    /// Falls back to the configured default contingency.
    #[serde(default)]
    pub contingency_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillPatch {
    pub bill_number: Option<String>,
    pub bill_title: Option<String>,
    pub description: Option<Option<String>>,
    pub sort_order: Option<i64>,
    pub contingency_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewSection {
    pub project_id: String,
    #[serde(default)]
    pub bill_id: Option<String>,
    pub section_code: String,
    pub section_title: String,
    #[serde(default)]
    pub preamble: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPatch {
    /// Moving a section to another bill recomputes both bills.
    pub bill_id: Option<Option<String>>,
    pub section_code: Option<String>,
    pub section_title: Option<String>,
    pub preamble: Option<Option<String>>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewItem {
    pub project_id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub item_code: Option<String>,
    pub description: String,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rate: Option<Decimal>,
    /// An explicit amount overrides `quantity * rate` on create.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub section_id: Option<Option<String>>,
    pub item_type: Option<ItemType>,
    pub item_code: Option<Option<String>>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<Option<String>>,
    pub rate: Option<Decimal>,
    /// Ignored whenever `quantity` or `rate` is also present.
    pub amount: Option<Decimal>,
    pub sort_order: Option<i64>,
}

impl ItemPatch {
    /// `true` when the patch touches an operand of `quantity * rate`.
    #[must_use]
    pub const fn touches_pricing(&self) -> bool {
        self.quantity.is_some() || self.rate.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewCollection {
    pub project_id: String,
    pub section_id: String,
    #[serde(default)]
    pub parent_item_id: Option<String>,
    pub collection_title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub page_reference: Option<String>,
    #[serde(default)]
    pub document_reference: Option<String>,
    #[serde(default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub item_count: Option<u32>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionPatch {
    pub parent_item_id: Option<Option<String>>,
    pub collection_title: Option<String>,
    pub description: Option<Option<String>>,
    pub page_reference: Option<Option<String>>,
    pub document_reference: Option<Option<String>>,
    pub collection_type: Option<CollectionType>,
    pub total_amount: Option<Decimal>,
    pub item_count: Option<u32>,
    pub sort_order: Option<i64>,
    pub notes: Option<Option<String>>,
}

/// One entry of a reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SortUpdate {
    pub id: String,
    pub new_sort_order: i64,
}

impl SortUpdate {
    pub fn new(id: impl Into<String>, new_sort_order: i64) -> Self {
        Self {
            id: id.into(),
            new_sort_order,
        }
    }
}
