//! Canonical SQLite schema for the BOQ store.
//!
//! - `projects` is the tenant root; every other table carries `project_id`
//!   so listings filter without joins
//! - `bills` -> `sections` -> `items` model the costed hierarchy; derived
//!   totals live on the parent rows and are rewritten by the cascade
//! - `collections` annotate a section (and optionally one of its items)
//! - `store_meta` tracks the schema version
//!
//! Money and quantities are canonical decimal TEXT. Foreign keys carry the
//! lifecycle rules: deleting a section orphans its items (`SET NULL`) and
//! deletes its collections; deleting a bill deletes its sections.

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    code TEXT NOT NULL,
    budget TEXT NOT NULL DEFAULT '0',
    currency TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (project_id LIKE 'prj-%')
);

CREATE TABLE IF NOT EXISTS bills (
    bill_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    bill_number TEXT NOT NULL,
    bill_title TEXT NOT NULL,
    description TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    subtotal_amount TEXT NOT NULL DEFAULT '0',
    contingency_percentage TEXT NOT NULL DEFAULT '0',
    contingency_amount TEXT NOT NULL DEFAULT '0',
    total_amount TEXT NOT NULL DEFAULT '0',
    section_count INTEGER NOT NULL DEFAULT 0,
    item_count INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (bill_id LIKE 'bil-%')
);

CREATE TABLE IF NOT EXISTS sections (
    section_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    bill_id TEXT REFERENCES bills(bill_id) ON DELETE CASCADE,
    section_code TEXT NOT NULL,
    section_title TEXT NOT NULL,
    preamble TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    total_amount TEXT NOT NULL DEFAULT '0',
    item_count INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (section_id LIKE 'sec-%')
);

CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    section_id TEXT REFERENCES sections(section_id) ON DELETE SET NULL,
    item_type TEXT NOT NULL CHECK (item_type IN (
        'MEASURED', 'LUMP_SUM', 'PRIME_COST', 'PROVISIONAL', 'ATTENDANT', 'COLLECTION'
    )),
    item_code TEXT,
    description TEXT NOT NULL,
    quantity TEXT,
    unit TEXT,
    rate TEXT,
    amount TEXT NOT NULL DEFAULT '0',
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (item_id LIKE 'itm-%')
);

CREATE TABLE IF NOT EXISTS collections (
    collection_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    section_id TEXT NOT NULL REFERENCES sections(section_id) ON DELETE CASCADE,
    parent_item_id TEXT REFERENCES items(item_id) ON DELETE SET NULL,
    collection_title TEXT NOT NULL,
    description TEXT,
    page_reference TEXT,
    document_reference TEXT,
    collection_type TEXT NOT NULL CHECK (collection_type IN (
        'PAGE_REFERENCE', 'ITEM_COLLECTION', 'DRAWING_REFERENCE', 'SPECIFICATION_REFERENCE'
    )),
    total_amount TEXT NOT NULL DEFAULT '0',
    item_count INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (collection_id LIKE 'col-%')
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: foreign-key and ordered-listing indexes used by the
/// aggregate queries.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_bills_project_sort
    ON bills(project_id, sort_order);

CREATE INDEX IF NOT EXISTS idx_sections_bill_sort
    ON sections(bill_id, sort_order);

CREATE INDEX IF NOT EXISTS idx_sections_project
    ON sections(project_id);

CREATE INDEX IF NOT EXISTS idx_items_section_sort
    ON items(section_id, sort_order);

CREATE INDEX IF NOT EXISTS idx_items_project
    ON items(project_id);

CREATE INDEX IF NOT EXISTS idx_collections_section_sort
    ON collections(section_id, sort_order);

CREATE INDEX IF NOT EXISTS idx_collections_parent_item
    ON collections(parent_item_id);

CREATE INDEX IF NOT EXISTS idx_collections_project
    ON collections(project_id);
";

/// Indexes expected by the cascade and listing query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_bills_project_sort",
    "idx_sections_bill_sort",
    "idx_sections_project",
    "idx_items_section_sort",
    "idx_items_project",
    "idx_collections_section_sort",
    "idx_collections_parent_item",
    "idx_collections_project",
];
