use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Pricing treatment of a BOQ line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    #[default]
    Measured,
    LumpSum,
    PrimeCost,
    Provisional,
    Attendant,
    Collection,
}

impl ItemType {
    pub const ALL: [Self; 6] = [
        Self::Measured,
        Self::LumpSum,
        Self::PrimeCost,
        Self::Provisional,
        Self::Attendant,
        Self::Collection,
    ];

    /// Stored/serialized form, e.g. `LUMP_SUM`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Measured => "MEASURED",
            Self::LumpSum => "LUMP_SUM",
            Self::PrimeCost => "PRIME_COST",
            Self::Provisional => "PROVISIONAL",
            Self::Attendant => "ATTENDANT",
            Self::Collection => "COLLECTION",
        }
    }
}

/// What a collection annotation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionType {
    #[default]
    PageReference,
    ItemCollection,
    DrawingReference,
    SpecificationReference,
}

impl CollectionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageReference => "PAGE_REFERENCE",
            Self::ItemCollection => "ITEM_COLLECTION",
            Self::DrawingReference => "DRAWING_REFERENCE",
            Self::SpecificationReference => "SPECIFICATION_REFERENCE",
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept `lump_sum`, `LUMP_SUM`, `lump-sum` and ` Lump Sum ` alike.
fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "MEASURED" => Ok(Self::Measured),
            "LUMP_SUM" => Ok(Self::LumpSum),
            "PRIME_COST" | "PC" => Ok(Self::PrimeCost),
            "PROVISIONAL" => Ok(Self::Provisional),
            "ATTENDANT" => Ok(Self::Attendant),
            "COLLECTION" => Ok(Self::Collection),
            _ => Err(ParseEnumError {
                expected: "item type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for CollectionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "PAGE_REFERENCE" | "PAGE" => Ok(Self::PageReference),
            "ITEM_COLLECTION" => Ok(Self::ItemCollection),
            "DRAWING_REFERENCE" | "DRAWING" => Ok(Self::DrawingReference),
            "SPECIFICATION_REFERENCE" | "SPECIFICATION" | "SPEC" => {
                Ok(Self::SpecificationReference)
            }
            _ => Err(ParseEnumError {
                expected: "collection type",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectionType, ItemType};
    use std::str::FromStr;

    #[test]
    fn enum_json_uses_stored_names() {
        assert_eq!(
            serde_json::to_string(&ItemType::LumpSum).unwrap(),
            "\"LUMP_SUM\""
        );
        assert_eq!(
            serde_json::to_string(&CollectionType::DrawingReference).unwrap(),
            "\"DRAWING_REFERENCE\""
        );
        assert_eq!(
            serde_json::from_str::<ItemType>("\"PRIME_COST\"").unwrap(),
            ItemType::PrimeCost
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for item_type in ItemType::ALL {
            assert_eq!(ItemType::from_str(&item_type.to_string()).unwrap(), item_type);
        }
        for collection_type in [
            CollectionType::PageReference,
            CollectionType::ItemCollection,
            CollectionType::DrawingReference,
            CollectionType::SpecificationReference,
        ] {
            assert_eq!(
                CollectionType::from_str(collection_type.as_str()).unwrap(),
                collection_type
            );
        }
    }

    #[test]
    fn parse_accepts_cli_spellings() {
        assert_eq!("lump_sum".parse::<ItemType>().unwrap(), ItemType::LumpSum);
        assert_eq!("lump-sum".parse::<ItemType>().unwrap(), ItemType::LumpSum);
        assert_eq!(" Measured ".parse::<ItemType>().unwrap(), ItemType::Measured);
        assert_eq!(
            "drawing".parse::<CollectionType>().unwrap(),
            CollectionType::DrawingReference
        );
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = "daywork".parse::<ItemType>().unwrap_err();
        assert_eq!(err.expected, "item type");
        assert_eq!(err.got, "daywork");
        assert_eq!(err.to_string(), "invalid item type: 'daywork'");
    }
}
