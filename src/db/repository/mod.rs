//! Repository layer: entity-scoped database operations for the cohort store.
//!
//! One sub-module per entity; all public functions are re-exported here.

mod author;
mod citation;
mod contactable;
mod import;
mod meta;
mod notice;
mod paper;

use chrono::NaiveDate;

use super::DatabaseError;

pub use author::*;
pub use citation::*;
pub use contactable::*;
pub use import::*;
pub use meta::*;
pub use notice::*;
pub use paper::*;

/// Storage format for every date column.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

pub(crate) fn date_from_sql(
    field: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, DatabaseError> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| DatabaseError::InvalidDate {
                field: field.into(),
                value: s,
            }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trip_through_sql_text() {
        let d = NaiveDate::from_ymd_opt(2022, 8, 1).unwrap();
        let text = date_to_sql(Some(d));
        assert_eq!(text.as_deref(), Some("2022-08-01"));
        assert_eq!(date_from_sql("x", text).unwrap(), Some(d));
        assert_eq!(date_from_sql("x", None).unwrap(), None);
    }

    #[test]
    fn malformed_date_is_reported_with_field() {
        let err = date_from_sql("comparison_date", Some("01/08/2022".into())).unwrap_err();
        assert!(err.to_string().contains("comparison_date"));
    }
}
