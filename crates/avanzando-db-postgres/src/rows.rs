//! Column decoding shared by the row mappers.

use std::str::FromStr;

use avanzando_core::CoreError;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::StorageResult;

/// Reads a TEXT column holding a domain enum.
pub(crate) fn text_enum<T>(row: &PgRow, column: &str) -> StorageResult<T>
where
    T: FromStr<Err = CoreError>,
{
    let raw: String = row.try_get(column)?;
    Ok(raw.parse()?)
}

/// Reads an INTEGER column holding a 1..=5 scale.
pub(crate) fn level<T>(row: &PgRow, column: &str) -> StorageResult<T>
where
    T: TryFrom<i32, Error = CoreError>,
{
    let raw: i32 = row.try_get(column)?;
    Ok(T::try_from(raw)?)
}
