use std::fmt;

use crate::model::ParseEnumError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ProjectNotFound,
    BillNotFound,
    SectionNotFound,
    ItemNotFound,
    CollectionNotFound,
    InvalidInput,
    InvalidEnumValue,
    StoreFailure,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ProjectNotFound => "E2001",
            Self::BillNotFound => "E2002",
            Self::SectionNotFound => "E2003",
            Self::ItemNotFound => "E2004",
            Self::CollectionNotFound => "E2005",
            Self::InvalidInput => "E2101",
            Self::InvalidEnumValue => "E2102",
            Self::StoreFailure => "E3001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "BOQ workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ProjectNotFound => "Project not found",
            Self::BillNotFound => "Bill not found",
            Self::SectionNotFound => "Section not found",
            Self::ItemNotFound => "Item not found",
            Self::CollectionNotFound => "Collection not found",
            Self::InvalidInput => "Invalid input",
            Self::InvalidEnumValue => "Invalid item/collection type value",
            Self::StoreFailure => "Store operation failed",
            Self::LockContention => "Store is busy",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `boq init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .boq/config.toml and retry."),
            Self::ProjectNotFound
            | Self::BillNotFound
            | Self::SectionNotFound
            | Self::ItemNotFound
            | Self::CollectionNotFound => None,
            Self::InvalidInput => Some("Check quantities, rates and percentages and retry."),
            Self::InvalidEnumValue => Some(
                "Use one of the documented item types (measured, lump_sum, prime_cost, \
                 provisional, attendant, collection) or collection types.",
            ),
            Self::StoreFailure => {
                Some("Retry once. Totals self-heal on the next write or `boq bill reconcile`.")
            }
            Self::LockContention => Some("Retry after the other `boq` process finishes."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The five persisted entity kinds, used to name the missing record in
/// [`BoqError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Project,
    Bill,
    Section,
    Item,
    Collection,
}

impl Entity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Bill => "bill",
            Self::Section => "section",
            Self::Item => "item",
            Self::Collection => "collection",
        }
    }

    const fn not_found_code(self) -> ErrorCode {
        match self {
            Self::Project => ErrorCode::ProjectNotFound,
            Self::Bill => ErrorCode::BillNotFound,
            Self::Section => ErrorCode::SectionNotFound,
            Self::Item => ErrorCode::ItemNotFound,
            Self::Collection => ErrorCode::CollectionNotFound,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the store and the totals cascade.
#[derive(Debug, thiserror::Error)]
pub enum BoqError {
    /// A referenced record does not exist at the time of the read or write.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// Caller input failed boundary validation; nothing was written.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// An enumerated value (item type, collection type) could not be parsed.
    #[error(transparent)]
    InvalidEnum(#[from] ParseEnumError),

    /// The underlying SQLite store failed. When this happens mid-cascade the
    /// hierarchy may hold stale totals until the next recompute.
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl BoqError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { entity, .. } => entity.not_found_code(),
            Self::Validation { .. } => ErrorCode::InvalidInput,
            Self::InvalidEnum(_) => ErrorCode::InvalidEnumValue,
            Self::Storage { source, .. } if is_busy(source) => ErrorCode::LockContention,
            Self::Storage { .. } => ErrorCode::StoreFailure,
        }
    }

    /// `true` when the error names a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

pub type Result<T, E = BoqError> = std::result::Result<T, E>;

/// Attach a short description of the failed store operation to a
/// `rusqlite` error.
pub(crate) trait StorageContext<T> {
    fn storage(self, context: &str) -> Result<T>;

    fn with_storage(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn storage(self, context: &str) -> Result<T> {
        self.map_err(|source| BoqError::Storage {
            context: context.to_string(),
            source,
        })
    }

    fn with_storage(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| BoqError::Storage {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BoqError, Entity, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::ProjectNotFound,
            ErrorCode::BillNotFound,
            ErrorCode::SectionNotFound,
            ErrorCode::ItemNotFound,
            ErrorCode::CollectionNotFound,
            ErrorCode::InvalidInput,
            ErrorCode::InvalidEnumValue,
            ErrorCode::StoreFailure,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::BillNotFound.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn not_found_maps_to_entity_specific_code() {
        let err = BoqError::not_found(Entity::Section, "sec-missing");
        assert_eq!(err.code(), ErrorCode::SectionNotFound);
        assert_eq!(err.to_string(), "section not found: sec-missing");
        assert!(err.is_not_found());
    }

    #[test]
    fn validation_message_names_field() {
        let err = BoqError::validation("quantity", "must be greater than zero");
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(err.to_string(), "invalid quantity: must be greater than zero");
        assert!(!err.is_not_found());
    }
}
