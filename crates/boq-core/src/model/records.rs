//! Persisted rows, one struct per table.
//!
//! Totals fields (`total_amount`, `item_count`, the bill's subtotal and
//! contingency fields) are derived by the cascade and never written directly
//! by callers.

use rust_decimal::Decimal;
use serde::Serialize;

use super::kinds::{CollectionType, ItemType};

/// Root tenant scope. Every other record carries its project's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub code: String,
    pub budget: Decimal,
    pub currency: String,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Top-level costed grouping within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    pub id: String,
    pub project_id: String,
    pub bill_number: String,
    pub bill_title: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub subtotal_amount: Decimal,
    pub contingency_percentage: Decimal,
    pub contingency_amount: Decimal,
    pub total_amount: Decimal,
    pub section_count: u32,
    pub item_count: u32,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Grouping of items within a bill, identified by a short code ("A", "F16").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub project_id: String,
    pub bill_id: Option<String>,
    pub section_code: String,
    pub section_title: String,
    pub preamble: Option<String>,
    pub sort_order: i64,
    pub total_amount: Decimal,
    pub item_count: u32,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// A single priced line. `section_id` is `None` for orphaned items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub project_id: String,
    pub section_id: Option<String>,
    pub item_type: ItemType,
    pub item_code: Option<String>,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub rate: Option<Decimal>,
    pub amount: Decimal,
    pub sort_order: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Page/drawing/specification pointer attached to a section and optionally
/// to one of its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: String,
    pub project_id: String,
    pub section_id: String,
    pub parent_item_id: Option<String>,
    pub collection_title: String,
    pub description: Option<String>,
    pub page_reference: Option<String>,
    pub document_reference: Option<String>,
    pub collection_type: CollectionType,
    pub total_amount: Decimal,
    pub item_count: u32,
    pub sort_order: i64,
    pub notes: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}
