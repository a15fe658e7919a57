//! Row conversion helpers.

use std::str::FromStr;

use jiff::Timestamp;
use rusqlite::types::Type;

/// Parses an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(column: usize, value: String) -> rusqlite::Result<Timestamp> {
    value
        .parse::<Timestamp>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Parses a text column through the type's `FromStr` implementation.
pub(crate) fn parse_text<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    value.parse::<T>().map_err(|message| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
        )
    })
}
