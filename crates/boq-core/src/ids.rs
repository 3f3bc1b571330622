//! Opaque record identifiers.
//!
//! IDs look like `bil-3f9a1c2d7e4b`: an entity prefix followed by twelve hex
//! characters of a BLAKE3 digest over the wall clock, a process-local
//! counter and random entropy. The store's `CHECK` constraints reject rows
//! whose id does not carry the table's prefix.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Entity;

const SUFFIX_LEN: usize = 12;

static COUNTER: AtomicU64 = AtomicU64::new(0);

impl Entity {
    /// Id prefix used for this entity's rows (including the dash).
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Project => "prj-",
            Self::Bill => "bil-",
            Self::Section => "sec-",
            Self::Item => "itm-",
            Self::Collection => "col-",
        }
    }
}

/// Generate a fresh id for `entity`.
#[must_use]
pub fn new_id(entity: Entity) -> String {
    let now_us = chrono::Utc::now().timestamp_micros();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let entropy: u64 = rand::random();

    let mut hasher = blake3::Hasher::new();
    hasher.update(entity.id_prefix().as_bytes());
    hasher.update(&now_us.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&entropy.to_le_bytes());
    let digest = hasher.finalize().to_hex();

    format!("{}{}", entity.id_prefix(), &digest[..SUFFIX_LEN])
}

/// `true` when `id` has the shape produced by [`new_id`] for `entity`.
#[must_use]
pub fn is_valid_id(entity: Entity, id: &str) -> bool {
    id.strip_prefix(entity.id_prefix()).is_some_and(|suffix| {
        suffix.len() == SUFFIX_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit())
    })
}
