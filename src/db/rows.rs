//! Conversion of result rows into JSON records.

use serde_json::{json, Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

/// Convert a database row to a JSON object keyed by column name.
///
/// Types without a dedicated mapping are rendered
/// in their PostgreSQL text form; SQL NULL becomes `null`.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();

    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();

        let is_null = row
            .try_get_raw(index)
            .map(|raw| raw.is_null())
            .unwrap_or(true);
        if is_null {
            map.insert(name.to_string(), Value::Null);
            continue;
        }

        let value: Option<Value> = match column.type_info().name() {
            "UUID" => row
                .try_get::<Uuid, _>(index)
                .ok()
                .map(|u| json!(u.to_string())),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<String, _>(index).ok().map(|s| json!(s))
            }
            "INT2" => row.try_get::<i16, _>(index).ok().map(|i| json!(i)),
            "INT4" => row.try_get::<i32, _>(index).ok().map(|i| json!(i)),
            "INT8" => row.try_get::<i64, _>(index).ok().map(|i| json!(i)),
            "FLOAT4" => row.try_get::<f32, _>(index).ok().map(|f| json!(f)),
            "FLOAT8" => row.try_get::<f64, _>(index).ok().map(|f| json!(f)),
            "NUMERIC" => row
                .try_get::<rust_decimal::Decimal, _>(index)
                .ok()
                .map(|d| json!(d.to_string())),
            "BOOL" => row.try_get::<bool, _>(index).ok().map(|b| json!(b)),
            "JSONB" | "JSON" => row.try_get::<Value, _>(index).ok(),
            "TIMESTAMPTZ" => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .ok()
                .map(|dt| json!(dt.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<chrono::NaiveDateTime, _>(index)
                .ok()
                .map(|dt| json!(dt.to_string())),
            "DATE" => row
                .try_get::<chrono::NaiveDate, _>(index)
                .ok()
                .map(|d| json!(d.to_string())),
            _ => None,
        };

        // The simple query protocol returns text-format values, so anything
        // unmapped (or that failed to decode) can still be read as a string.
        let value = value
            .or_else(|| {
                row.try_get_unchecked::<String, _>(index)
                    .ok()
                    .map(Value::String)
            })
            .unwrap_or(Value::Null);

        map.insert(name.to_string(), value);
    }

    Value::Object(map)
}
