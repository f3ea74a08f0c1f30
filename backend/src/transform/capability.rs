//! Schema capability checks.
//!
//! Some analyses only make sense when a merged table carries optional
//! columns. Instead of checking column membership ad hoc, callers ask for an
//! [`Availability`] and branch on it; an unavailable analysis is skipped by
//! the presentation layer, not reported as a failure.

use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Result of an analysis that depends on optional columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability<T> {
    Available { result: T },
    Unavailable { missing: Vec<String> },
}

impl<T> Availability<T> {
    /// The result, if the analysis could run.
    pub fn available(self) -> Option<T> {
        match self {
            Self::Available { result } => Some(result),
            Self::Unavailable { .. } => None,
        }
    }

    /// Chain a fallible computation onto an available result.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Availability<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        match self {
            Self::Available { result } => Ok(Availability::Available { result: f(result)? }),
            Self::Unavailable { missing } => Ok(Availability::Unavailable { missing }),
        }
    }
}

/// Whether `table` has every column in `required`.
pub fn require(table: &Table, required: &[&str]) -> Availability<()> {
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        Availability::Available { result: () }
    } else {
        Availability::Unavailable { missing }
    }
}

/// The first of `candidates` present in `table`.
///
/// Used for columns whose name varies between exports. When none is present,
/// every candidate is reported missing.
pub fn first_present<'a>(table: &Table, candidates: &[&'a str]) -> Availability<&'a str> {
    match candidates.iter().find(|c| table.has_column(c)) {
        Some(column) => Availability::Available { result: *column },
        None => Availability::Unavailable {
            missing: candidates.iter().map(|c| c.to_string()).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products() -> Table {
        Table::new("products", vec!["product_id", "product_description_lenght"]).unwrap()
    }

    #[test]
    fn test_require() {
        assert_eq!(
            require(&products(), &["product_id"]),
            Availability::Available { result: () }
        );
        assert_eq!(
            require(&products(), &["product_id", "product_weight_g"]),
            Availability::Unavailable {
                missing: vec!["product_weight_g".to_string()]
            }
        );
    }

    #[test]
    fn test_first_present() {
        let found = first_present(
            &products(),
            &["product_description_length", "product_description_lenght"],
        );
        assert_eq!(found.available(), Some("product_description_lenght"));

        let none = first_present(&products(), &["product_photos_qty"]);
        assert!(none.available().is_none());
    }

    #[test]
    fn test_map_and_serialize() {
        let avail: Availability<u8> = Availability::Available { result: 3 };
        let doubled: Result<_, ()> = avail.clone().try_map(|x| Ok(x * 2));
        assert_eq!(doubled.unwrap().available(), Some(6));

        let json = serde_json::to_value(&avail).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["result"], 3);

        let missing: Availability<u8> = Availability::Unavailable { missing: vec!["x".into()] };
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["status"], "unavailable");
    }
}
