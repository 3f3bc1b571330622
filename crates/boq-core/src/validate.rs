//! Boundary checks run before any store write.

use rust_decimal::Decimal;

use crate::error::{BoqError, Result};
use crate::model::{
    BillPatch, CollectionPatch, ItemPatch, NewBill, NewCollection, NewItem, NewProject,
    NewSection, ProjectPatch, SectionPatch,
};

/// Reject empty or whitespace-only text.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] naming `field`.
pub fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BoqError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn optional_text(field: &'static str, value: Option<&str>) -> Result<()> {
    value.map_or(Ok(()), |value| require_text(field, value))
}

/// Quantities are strictly positive.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] for zero or negative values.
pub fn quantity(value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(BoqError::validation(
            "quantity",
            format!("must be positive, got {value}"),
        ));
    }
    Ok(())
}

/// Non-negative money value (rates, amounts, budgets).
///
/// # Errors
///
/// Returns [`BoqError::Validation`] for negative values.
pub fn non_negative(field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(BoqError::validation(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(())
}

/// Contingency percentage lies in `0..=100`.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] when outside the range.
pub fn contingency_percentage(value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(BoqError::validation(
            "contingency_percentage",
            format!("must be between 0 and 100, got {value}"),
        ));
    }
    Ok(())
}

fn pricing(
    quantity_value: Option<Decimal>,
    rate: Option<Decimal>,
    amount: Option<Decimal>,
) -> Result<()> {
    if let Some(value) = quantity_value {
        quantity(value)?;
    }
    if let Some(value) = rate {
        non_negative("rate", value)?;
    }
    if let Some(value) = amount {
        non_negative("amount", value)?;
    }
    Ok(())
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn new_project(input: &NewProject) -> Result<()> {
    require_text("name", &input.name)?;
    require_text("code", &input.code)?;
    non_negative("budget", input.budget)?;
    optional_text("currency", input.currency.as_deref())
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn project_patch(patch: &ProjectPatch) -> Result<()> {
    optional_text("name", patch.name.as_deref())?;
    optional_text("code", patch.code.as_deref())?;
    optional_text("currency", patch.currency.as_deref())?;
    patch
        .budget
        .map_or(Ok(()), |budget| non_negative("budget", budget))
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn new_bill(input: &NewBill) -> Result<()> {
    require_text("bill_number", &input.bill_number)?;
    require_text("bill_title", &input.bill_title)?;
    input
        .contingency_percentage
        .map_or(Ok(()), contingency_percentage)
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn bill_patch(patch: &BillPatch) -> Result<()> {
    optional_text("bill_number", patch.bill_number.as_deref())?;
    optional_text("bill_title", patch.bill_title.as_deref())?;
    patch
        .contingency_percentage
        .map_or(Ok(()), contingency_percentage)
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn new_section(input: &NewSection) -> Result<()> {
    require_text("section_code", &input.section_code)?;
    require_text("section_title", &input.section_title)
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn section_patch(patch: &SectionPatch) -> Result<()> {
    optional_text("section_code", patch.section_code.as_deref())?;
    optional_text("section_title", patch.section_title.as_deref())
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn new_item(input: &NewItem) -> Result<()> {
    require_text("description", &input.description)?;
    pricing(input.quantity, input.rate, input.amount)
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn item_patch(patch: &ItemPatch) -> Result<()> {
    optional_text("description", patch.description.as_deref())?;
    pricing(patch.quantity, patch.rate, patch.amount)
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn new_collection(input: &NewCollection) -> Result<()> {
    require_text("collection_title", &input.collection_title)?;
    input
        .total_amount
        .map_or(Ok(()), |total| non_negative("total_amount", total))
}

/// # Errors
///
/// Returns [`BoqError::Validation`] on the first failing field.
pub fn collection_patch(patch: &CollectionPatch) -> Result<()> {
    optional_text("collection_title", patch.collection_title.as_deref())?;
    patch
        .total_amount
        .map_or(Ok(()), |total| non_negative("total_amount", total))
}
