//! Typed read queries over the BOQ store.
//!
//! Every function takes a shared `&Connection` (a `Transaction` derefs to
//! one, so the cascade reads its own uncommitted writes) and returns typed
//! records, never raw rows. Aggregates that feed the cascade select the raw
//! decimal TEXT and sum in Rust so totals stay exact.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Entity, Result, StorageContext};
use crate::model::money::sum_money;
use crate::model::{Bill, Collection, CollectionType, Item, ItemType, Project, Section};

// ---------------------------------------------------------------------------
// Aggregate result types
// ---------------------------------------------------------------------------

/// `{total_amount, item_count}` over the items currently in one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SectionItemTotals {
    pub total_amount: Decimal,
    pub item_count: u32,
}

/// Roll-up of the sections currently attached to one bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BillSectionTotals {
    pub subtotal_amount: Decimal,
    pub section_count: u32,
    pub item_count: u32,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter for item listings. Set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub project_id: Option<String>,
    /// Items whose section belongs to this bill.
    pub bill_id: Option<String>,
    pub section_id: Option<String>,
    pub item_type: Option<ItemType>,
}

/// Filter for section listings. Set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct SectionFilter {
    pub project_id: Option<String>,
    pub bill_id: Option<String>,
}

/// Filter for collection listings. Set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    pub project_id: Option<String>,
    pub section_id: Option<String>,
    pub parent_item_id: Option<String>,
}

/// Parent scope used to append a new row after its last sibling.
#[derive(Debug, Clone, Copy)]
pub enum SortScope<'a> {
    BillsInProject(&'a str),
    SectionsInBill(&'a str),
    /// Sections not attached to any bill.
    LooseSectionsInProject(&'a str),
    ItemsInSection(&'a str),
    /// Items not attached to any section.
    LooseItemsInProject(&'a str),
    CollectionsInSection(&'a str),
}

impl<'a> SortScope<'a> {
    const fn sql(self) -> &'static str {
        match self {
            Self::BillsInProject(_) => {
                "SELECT MAX(sort_order) FROM bills WHERE project_id = ?1"
            }
            Self::SectionsInBill(_) => "SELECT MAX(sort_order) FROM sections WHERE bill_id = ?1",
            Self::LooseSectionsInProject(_) => {
                "SELECT MAX(sort_order) FROM sections WHERE project_id = ?1 AND bill_id IS NULL"
            }
            Self::ItemsInSection(_) => "SELECT MAX(sort_order) FROM items WHERE section_id = ?1",
            Self::LooseItemsInProject(_) => {
                "SELECT MAX(sort_order) FROM items WHERE project_id = ?1 AND section_id IS NULL"
            }
            Self::CollectionsInSection(_) => {
                "SELECT MAX(sort_order) FROM collections WHERE section_id = ?1"
            }
        }
    }

    const fn parent_id(self) -> &'a str {
        match self {
            Self::BillsInProject(id)
            | Self::SectionsInBill(id)
            | Self::LooseSectionsInProject(id)
            | Self::ItemsInSection(id)
            | Self::LooseItemsInProject(id)
            | Self::CollectionsInSection(id) => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Canonical TEXT form of a stored decimal.
#[must_use]
pub fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    parse_decimal(idx, &raw)
}

fn opt_decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_decimal(idx, &raw)).transpose()
}

fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn to_count(n: usize) -> rusqlite::Result<u32> {
    u32::try_from(n)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error)))
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

const PROJECT_COLUMNS: &str =
    "project_id, name, code, budget, currency, created_at_us, updated_at_us";

const BILL_COLUMNS: &str = "bill_id, project_id, bill_number, bill_title, description, \
     sort_order, subtotal_amount, contingency_percentage, contingency_amount, total_amount, \
     section_count, item_count, created_at_us, updated_at_us";

const SECTION_COLUMNS: &str = "s.section_id, s.project_id, s.bill_id, s.section_code, \
     s.section_title, s.preamble, s.sort_order, s.total_amount, s.item_count, \
     s.created_at_us, s.updated_at_us";

const ITEM_COLUMNS: &str = "i.item_id, i.project_id, i.section_id, i.item_type, i.item_code, \
     i.description, i.quantity, i.unit, i.rate, i.amount, i.sort_order, \
     i.created_at_us, i.updated_at_us";

const COLLECTION_COLUMNS: &str = "collection_id, project_id, section_id, parent_item_id, \
     collection_title, description, page_reference, document_reference, collection_type, \
     total_amount, item_count, sort_order, notes, created_at_us, updated_at_us";

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        budget: decimal_column(row, 3)?,
        currency: row.get(4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

fn row_to_bill(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: row.get(0)?,
        project_id: row.get(1)?,
        bill_number: row.get(2)?,
        bill_title: row.get(3)?,
        description: row.get(4)?,
        sort_order: row.get(5)?,
        subtotal_amount: decimal_column(row, 6)?,
        contingency_percentage: decimal_column(row, 7)?,
        contingency_amount: decimal_column(row, 8)?,
        total_amount: decimal_column(row, 9)?,
        section_count: row.get(10)?,
        item_count: row.get(11)?,
        created_at_us: row.get(12)?,
        updated_at_us: row.get(13)?,
    })
}

fn row_to_section(row: &Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        id: row.get(0)?,
        project_id: row.get(1)?,
        bill_id: row.get(2)?,
        section_code: row.get(3)?,
        section_title: row.get(4)?,
        preamble: row.get(5)?,
        sort_order: row.get(6)?,
        total_amount: decimal_column(row, 7)?,
        item_count: row.get(8)?,
        created_at_us: row.get(9)?,
        updated_at_us: row.get(10)?,
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        project_id: row.get(1)?,
        section_id: row.get(2)?,
        item_type: enum_column::<ItemType>(row, 3)?,
        item_code: row.get(4)?,
        description: row.get(5)?,
        quantity: opt_decimal_column(row, 6)?,
        unit: row.get(7)?,
        rate: opt_decimal_column(row, 8)?,
        amount: decimal_column(row, 9)?,
        sort_order: row.get(10)?,
        created_at_us: row.get(11)?,
        updated_at_us: row.get(12)?,
    })
}

fn row_to_collection(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        project_id: row.get(1)?,
        section_id: row.get(2)?,
        parent_item_id: row.get(3)?,
        collection_title: row.get(4)?,
        description: row.get(5)?,
        page_reference: row.get(6)?,
        document_reference: row.get(7)?,
        collection_type: enum_column::<CollectionType>(row, 8)?,
        total_amount: decimal_column(row, 9)?,
        item_count: row.get(10)?,
        sort_order: row.get(11)?,
        notes: row.get(12)?,
        created_at_us: row.get(13)?,
        updated_at_us: row.get(14)?,
    })
}

// ---------------------------------------------------------------------------
// Point lookups
// ---------------------------------------------------------------------------

/// Fetch a project by id, `None` when absent.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn get_project(conn: &Connection, project_id: &str) -> Result<Option<Project>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
        params![project_id],
        row_to_project,
    )
    .optional()
    .with_storage(|| format!("get project '{project_id}'"))
}

/// Fetch a bill by id, `None` when absent.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn get_bill(conn: &Connection, bill_id: &str) -> Result<Option<Bill>> {
    conn.query_row(
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE bill_id = ?1"),
        params![bill_id],
        row_to_bill,
    )
    .optional()
    .with_storage(|| format!("get bill '{bill_id}'"))
}

/// Fetch a section by id, `None` when absent.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn get_section(conn: &Connection, section_id: &str) -> Result<Option<Section>> {
    conn.query_row(
        &format!("SELECT {SECTION_COLUMNS} FROM sections s WHERE s.section_id = ?1"),
        params![section_id],
        row_to_section,
    )
    .optional()
    .with_storage(|| format!("get section '{section_id}'"))
}

/// Fetch an item by id, `None` when absent.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn get_item(conn: &Connection, item_id: &str) -> Result<Option<Item>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.item_id = ?1"),
        params![item_id],
        row_to_item,
    )
    .optional()
    .with_storage(|| format!("get item '{item_id}'"))
}

/// Fetch a collection by id, `None` when absent.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn get_collection(conn: &Connection, collection_id: &str) -> Result<Option<Collection>> {
    conn.query_row(
        &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE collection_id = ?1"),
        params![collection_id],
        row_to_collection,
    )
    .optional()
    .with_storage(|| format!("get collection '{collection_id}'"))
}

/// `true` when a row with `id` exists in the entity's table.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn exists(conn: &Connection, entity: Entity, id: &str) -> Result<bool> {
    let sql = match entity {
        Entity::Project => "SELECT EXISTS(SELECT 1 FROM projects WHERE project_id = ?1)",
        Entity::Bill => "SELECT EXISTS(SELECT 1 FROM bills WHERE bill_id = ?1)",
        Entity::Section => "SELECT EXISTS(SELECT 1 FROM sections WHERE section_id = ?1)",
        Entity::Item => "SELECT EXISTS(SELECT 1 FROM items WHERE item_id = ?1)",
        Entity::Collection => {
            "SELECT EXISTS(SELECT 1 FROM collections WHERE collection_id = ?1)"
        }
    };
    conn.query_row(sql, params![id], |row| row.get(0))
        .with_storage(|| format!("check {entity} '{id}' exists"))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// All projects ordered by name.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name ASC, project_id ASC"
        ))
        .storage("prepare list_projects query")?;
    let rows = stmt
        .query_map([], row_to_project)
        .storage("execute list_projects query")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("read list_projects row")
}

/// Bills of a project in display order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn list_bills(conn: &Connection, project_id: &str) -> Result<Vec<Bill>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE project_id = ?1 \
             ORDER BY sort_order ASC, created_at_us ASC, bill_id ASC"
        ))
        .storage("prepare list_bills query")?;
    let rows = stmt
        .query_map(params![project_id], row_to_bill)
        .storage("execute list_bills query")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .storage("read list_bills row")
}

/// Sections matching `filter` in display order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn list_sections(conn: &Connection, filter: &SectionFilter) -> Result<Vec<Section>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref project_id) = filter.project_id {
        param_values.push(Box::new(project_id.clone()));
        conditions.push(format!("s.project_id = ?{}", param_values.len()));
    }
    if let Some(ref bill_id) = filter.bill_id {
        param_values.push(Box::new(bill_id.clone()));
        conditions.push(format!("s.bill_id = ?{}", param_values.len()));
    }

    let sql = format!(
        "SELECT {SECTION_COLUMNS} FROM sections s{} \
         ORDER BY s.sort_order ASC, s.created_at_us ASC, s.section_id ASC",
        where_clause(&conditions)
    );
    query_filtered(conn, &sql, &param_values, row_to_section, "list_sections")
}

/// Items matching `filter` in display order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn list_items(conn: &Connection, filter: &ItemFilter) -> Result<Vec<Item>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
    let mut joins = String::new();

    if let Some(ref project_id) = filter.project_id {
        param_values.push(Box::new(project_id.clone()));
        conditions.push(format!("i.project_id = ?{}", param_values.len()));
    }
    if let Some(ref section_id) = filter.section_id {
        param_values.push(Box::new(section_id.clone()));
        conditions.push(format!("i.section_id = ?{}", param_values.len()));
    }
    if let Some(item_type) = filter.item_type {
        param_values.push(Box::new(item_type.as_str()));
        conditions.push(format!("i.item_type = ?{}", param_values.len()));
    }
    if let Some(ref bill_id) = filter.bill_id {
        param_values.push(Box::new(bill_id.clone()));
        let _ = write!(
            joins,
            " INNER JOIN sections s ON s.section_id = i.section_id AND s.bill_id = ?{}",
            param_values.len()
        );
    }

    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items i{joins}{} \
         ORDER BY i.sort_order ASC, i.created_at_us ASC, i.item_id ASC",
        where_clause(&conditions)
    );
    query_filtered(conn, &sql, &param_values, row_to_item, "list_items")
}

/// Collections matching `filter` in display order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored value is malformed.
pub fn list_collections(conn: &Connection, filter: &CollectionFilter) -> Result<Vec<Collection>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref project_id) = filter.project_id {
        param_values.push(Box::new(project_id.clone()));
        conditions.push(format!("project_id = ?{}", param_values.len()));
    }
    if let Some(ref section_id) = filter.section_id {
        param_values.push(Box::new(section_id.clone()));
        conditions.push(format!("section_id = ?{}", param_values.len()));
    }
    if let Some(ref parent_item_id) = filter.parent_item_id {
        param_values.push(Box::new(parent_item_id.clone()));
        conditions.push(format!("parent_item_id = ?{}", param_values.len()));
    }

    let sql = format!(
        "SELECT {COLLECTION_COLUMNS} FROM collections{} \
         ORDER BY sort_order ASC, created_at_us ASC, collection_id ASC",
        where_clause(&conditions)
    );
    query_filtered(conn, &sql, &param_values, row_to_collection, "list_collections")
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn query_filtered<T>(
    conn: &Connection,
    sql: &str,
    param_values: &[Box<dyn ToSql>],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
    label: &str,
) -> Result<Vec<T>> {
    let mut stmt = conn
        .prepare(sql)
        .with_storage(|| format!("prepare {label} query: {sql}"))?;

    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();

    let rows = stmt
        .query_map(params_from_iter(params_ref), map)
        .with_storage(|| format!("execute {label} query"))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.with_storage(|| format!("read {label} row"))?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Sum and count the items currently attached to `section_id`.
///
/// # Errors
///
/// Returns an error if the query fails or a stored amount is malformed.
pub fn section_item_totals(conn: &Connection, section_id: &str) -> Result<SectionItemTotals> {
    let mut stmt = conn
        .prepare_cached("SELECT amount FROM items WHERE section_id = ?1")
        .storage("prepare section_item_totals query")?;
    let amounts = stmt
        .query_map(params![section_id], |row| decimal_column(row, 0))
        .storage("execute section_item_totals query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_storage(|| format!("read item amounts for section '{section_id}'"))?;

    Ok(SectionItemTotals {
        total_amount: sum_money("total_amount", amounts.iter().copied())?,
        item_count: to_count(amounts.len()).storage("count section items")?,
    })
}

/// Sum section totals and item counts, and count sections, for `bill_id`.
///
/// # Errors
///
/// Returns an error if the query fails or a stored total is malformed.
pub fn bill_section_totals(conn: &Connection, bill_id: &str) -> Result<BillSectionTotals> {
    let mut stmt = conn
        .prepare_cached("SELECT total_amount, item_count FROM sections WHERE bill_id = ?1")
        .storage("prepare bill_section_totals query")?;
    let rows = stmt
        .query_map(params![bill_id], |row| {
            Ok((decimal_column(row, 0)?, row.get::<_, u32>(1)?))
        })
        .storage("execute bill_section_totals query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_storage(|| format!("read section totals for bill '{bill_id}'"))?;

    Ok(BillSectionTotals {
        section_count: to_count(rows.len()).storage("count bill sections")?,
        subtotal_amount: sum_money("subtotal_amount", rows.iter().map(|(amount, _)| *amount))?,
        item_count: rows
            .iter()
            .fold(0_u32, |count, (_, items)| count.saturating_add(*items)),
    })
}

/// Item count per item type within one section.
///
/// # Errors
///
/// Returns an error if the query fails or a stored type is unknown.
pub fn item_type_counts(conn: &Connection, section_id: &str) -> Result<BTreeMap<ItemType, u32>> {
    let mut stmt = conn
        .prepare(
            "SELECT item_type, COUNT(*) FROM items WHERE section_id = ?1 \
             GROUP BY item_type ORDER BY item_type",
        )
        .storage("prepare item_type_counts query")?;
    let rows = stmt
        .query_map(params![section_id], |row| {
            Ok((enum_column::<ItemType>(row, 0)?, row.get::<_, u32>(1)?))
        })
        .storage("execute item_type_counts query")?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (item_type, count) = row.storage("read item_type_counts row")?;
        counts.insert(item_type, count);
    }
    Ok(counts)
}

/// Number of collections attached to one section.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_section_collections(conn: &Connection, section_id: &str) -> Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM collections WHERE section_id = ?1",
        params![section_id],
        |row| row.get(0),
    )
    .with_storage(|| format!("count collections in section '{section_id}'"))
}

/// Number of collections attached to any section of one bill.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_bill_collections(conn: &Connection, bill_id: &str) -> Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM collections c \
         INNER JOIN sections s ON s.section_id = c.section_id \
         WHERE s.bill_id = ?1",
        params![bill_id],
        |row| row.get(0),
    )
    .with_storage(|| format!("count collections in bill '{bill_id}'"))
}

/// Row counts per table for one project, as
/// `(bills, sections, items, collections)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn project_counts(conn: &Connection, project_id: &str) -> Result<(u32, u32, u32, u32)> {
    conn.query_row(
        "SELECT \
           (SELECT COUNT(*) FROM bills WHERE project_id = ?1), \
           (SELECT COUNT(*) FROM sections WHERE project_id = ?1), \
           (SELECT COUNT(*) FROM items WHERE project_id = ?1), \
           (SELECT COUNT(*) FROM collections WHERE project_id = ?1)",
        params![project_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )
    .with_storage(|| format!("count rows in project '{project_id}'"))
}

/// `max(sort_order) + 1` among the siblings in `scope`, or 0 when the scope
/// is empty.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn next_sort_order(conn: &Connection, scope: SortScope<'_>) -> Result<i64> {
    let max: Option<i64> = conn
        .query_row(scope.sql(), params![scope.parent_id()], |row| row.get(0))
        .with_storage(|| format!("read max sort order for {scope:?}"))?;
    Ok(max.map_or(0, |max| max.saturating_add(1)))
}
