//! Column decoding for `SELECT *` rows.
//!
//! The observation queries pass every table column through untouched, so rows
//! are decoded by inspecting each column's Postgres type rather than through a
//! fixed `FromRow` shape. `NUMERIC` is always decoded to `f64`: clients get
//! plain JSON numbers and nothing downstream needs exact decimals. Geometric
//! types and `INTERVAL` are rendered in PostgreSQL's own text form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{
    Oid, PgBox, PgCircle, PgInterval, PgLSeg, PgLine, PgPath, PgPoint, PgPolygon,
};
use sqlx::postgres::{
    PgColumn, PgHasArrayType, PgRow, PgTypeInfo, PgValueFormat, PgValueRef, Postgres,
};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

use crate::error::ObservationsError;

pub type Columns = Map<String, Value>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary wire form of a `NUMERIC` into the nearest `f64`.
///
/// Layout: `ndigits i16, weight i16, sign u16, dscale u16` followed by
/// `ndigits` base-10000 digits, most significant first. Returns `None` for
/// NaN and the infinities, which JSON cannot carry.
pub fn numeric_to_f64(bytes: &[u8]) -> Result<Option<f64>, String> {
    if bytes.len() < 8 {
        return Err(format!("NUMERIC header too short: {} bytes", bytes.len()));
    }
    let read_u16 = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);

    let ndigits = read_u16(0) as i16;
    let weight = read_u16(2) as i16;
    let sign = read_u16(4);

    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        NUMERIC_NAN | NUMERIC_PINF | NUMERIC_NINF => return Ok(None),
        other => return Err(format!("invalid NUMERIC sign 0x{:04x}", other)),
    };

    if ndigits < 0 {
        return Err(format!("invalid NUMERIC digit count {}", ndigits));
    }
    let ndigits = ndigits as usize;
    if bytes.len() != 8 + ndigits * 2 {
        return Err(format!(
            "NUMERIC length mismatch: {} digits in {} bytes",
            ndigits,
            bytes.len()
        ));
    }
    if ndigits == 0 {
        return Ok(Some(0.0));
    }

    // Rebuild as `0.<digits>e<exp>` and let the float parser do the rounding.
    let mut mantissa = String::with_capacity(ndigits * 4);
    for i in 0..ndigits {
        let digit = read_u16(8 + i * 2);
        if digit >= 10_000 {
            return Err(format!("invalid NUMERIC digit {}", digit));
        }
        mantissa.push_str(&format!("{:04}", digit));
    }
    let exponent = (weight as i32 + 1) * 4;
    let text = format!(
        "{}0.{}e{}",
        if negative { "-" } else { "" },
        mantissa,
        exponent
    );

    text.parse::<f64>()
        .map(Some)
        .map_err(|e| format!("NUMERIC {} not representable: {}", text, e))
}

/// A `NUMERIC` read straight into `f64`. `None` for NaN and the infinities.
///
/// Implements sqlx's decoding traits so that `NUMERIC[]` columns come through
/// sqlx's own array support as `Vec<Option<NumericF64>>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericF64(pub Option<f64>);

impl Type<Postgres> for NumericF64 {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name() == "NUMERIC"
    }
}

impl PgHasArrayType for NumericF64 {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_NUMERIC")
    }

    fn array_compatible(ty: &PgTypeInfo) -> bool {
        ty.name() == "NUMERIC[]"
    }
}

impl<'r> Decode<'r, Postgres> for NumericF64 {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let decoded = match value.format() {
            PgValueFormat::Binary => numeric_to_f64(value.as_bytes()?)?,
            PgValueFormat::Text => {
                let text = value.as_str()?.trim();
                text.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        };
        Ok(Self(decoded))
    }
}

/// Widen a `REAL` through its shortest decimal form, so `0.1f32` stays `0.1`.
pub fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

/// Render an `INTERVAL` the way PostgreSQL's default `postgres` style prints it.
pub fn interval_text(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    let mut negative_seen = false;
    let mut push = |n: i64, unit: &str| {
        if n != 0 {
            negative_seen |= n < 0;
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", n, unit, plural));
        }
    };
    push(i64::from(interval.months / 12), "year");
    push(i64::from(interval.months % 12), "mon");
    push(i64::from(interval.days), "day");

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 {
            "-"
        } else if negative_seen {
            "+"
        } else {
            ""
        };
        let abs = micros.unsigned_abs();
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            abs / 3_600_000_000,
            (abs / 60_000_000) % 60,
            (abs / 1_000_000) % 60
        );
        let frac = abs % 1_000_000;
        if frac != 0 {
            time.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

fn point_text(p: &PgPoint) -> String {
    format!("({},{})", p.x, p.y)
}

fn points_text(points: &[PgPoint]) -> String {
    points.iter().map(point_text).collect::<Vec<_>>().join(",")
}

pub fn box_text(b: &PgBox) -> String {
    format!(
        "({},{}),({},{})",
        b.upper_right_x, b.upper_right_y, b.lower_left_x, b.lower_left_y
    )
}

pub fn lseg_text(l: &PgLSeg) -> String {
    format!("[({},{}),({},{})]", l.start_x, l.start_y, l.end_x, l.end_y)
}

pub fn path_text(p: &PgPath) -> String {
    if p.closed {
        format!("({})", points_text(&p.points))
    } else {
        format!("[{}]", points_text(&p.points))
    }
}

fn array_value<T, F>(row: &PgRow, i: usize, convert: F) -> Result<Value, ObservationsError>
where
    Vec<Option<T>>: for<'r> Decode<'r, Postgres> + Type<Postgres>,
    F: Fn(T) -> Value,
{
    let items = row.try_get::<Vec<Option<T>>, _>(i)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map(&convert).unwrap_or(Value::Null))
            .collect(),
    ))
}

fn date_json(v: NaiveDate) -> Value {
    json!(v.format("%Y-%m-%d").to_string())
}

fn timestamp_json(v: NaiveDateTime) -> Value {
    json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn timestamptz_json(v: DateTime<Utc>) -> Value {
    json!(v.to_rfc3339())
}

/// Decode one column of a row into JSON according to its Postgres type.
///
/// A type with no mapping is an error rather than a silent `null`.
pub fn column_value(row: &PgRow, column: &PgColumn) -> Result<Value, ObservationsError> {
    let i = column.ordinal();
    if row.try_get_raw(i)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match column.type_info().name() {
        "BOOL" => json!(row.try_get::<bool, _>(i)?),
        "INT2" => json!(row.try_get::<i16, _>(i)?),
        "INT4" => json!(row.try_get::<i32, _>(i)?),
        "INT8" => json!(row.try_get::<i64, _>(i)?),
        "OID" => json!(row.try_get::<Oid, _>(i)?.0),
        "FLOAT4" => json!(widen_f32(row.try_get::<f32, _>(i)?)),
        "FLOAT8" => json!(row.try_get::<f64, _>(i)?),
        "NUMERIC" => json!(row.try_get::<NumericF64, _>(i)?.0),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => json!(row.try_get::<String, _>(i)?),
        "\"CHAR\"" => json!((row.try_get::<i8, _>(i)? as u8 as char).to_string()),
        "UUID" => json!(row.try_get::<uuid::Uuid, _>(i)?.to_string()),
        "DATE" => date_json(row.try_get::<NaiveDate, _>(i)?),
        "TIME" => json!(row.try_get::<NaiveTime, _>(i)?.format("%H:%M:%S%.f").to_string()),
        "TIMESTAMP" => timestamp_json(row.try_get::<NaiveDateTime, _>(i)?),
        "TIMESTAMPTZ" => timestamptz_json(row.try_get::<DateTime<Utc>, _>(i)?),
        "INTERVAL" => json!(interval_text(&row.try_get::<PgInterval, _>(i)?)),
        "POINT" => json!(point_text(&row.try_get::<PgPoint, _>(i)?)),
        "LINE" => {
            let l = row.try_get::<PgLine, _>(i)?;
            json!(format!("{{{},{},{}}}", l.a, l.b, l.c))
        }
        "LSEG" => json!(lseg_text(&row.try_get::<PgLSeg, _>(i)?)),
        "BOX" => json!(box_text(&row.try_get::<PgBox, _>(i)?)),
        "PATH" => json!(path_text(&row.try_get::<PgPath, _>(i)?)),
        "POLYGON" => json!(format!(
            "({})",
            points_text(&row.try_get::<PgPolygon, _>(i)?.points)
        )),
        "CIRCLE" => {
            let c = row.try_get::<PgCircle, _>(i)?;
            json!(format!("<({},{}),{}>", c.x, c.y, c.radius))
        }
        "JSON" | "JSONB" => row.try_get::<Value, _>(i)?,
        "BOOL[]" => array_value::<bool, _>(row, i, |v| json!(v))?,
        "INT2[]" => array_value::<i16, _>(row, i, |v| json!(v))?,
        "INT4[]" => array_value::<i32, _>(row, i, |v| json!(v))?,
        "INT8[]" => array_value::<i64, _>(row, i, |v| json!(v))?,
        "FLOAT4[]" => array_value::<f32, _>(row, i, |v| json!(widen_f32(v)))?,
        "FLOAT8[]" => array_value::<f64, _>(row, i, |v| json!(v))?,
        "NUMERIC[]" => array_value::<NumericF64, _>(row, i, |v| json!(v.0))?,
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            array_value::<String, _>(row, i, Value::String)?
        }
        "UUID[]" => array_value::<uuid::Uuid, _>(row, i, |v| json!(v.to_string()))?,
        "DATE[]" => array_value::<NaiveDate, _>(row, i, date_json)?,
        "TIMESTAMP[]" => array_value::<NaiveDateTime, _>(row, i, timestamp_json)?,
        "TIMESTAMPTZ[]" => array_value::<DateTime<Utc>, _>(row, i, timestamptz_json)?,
        other => {
            return Err(ObservationsError::RowShape(format!(
                "column {} has unsupported type {}",
                column.name(),
                other
            )));
        }
    };

    Ok(value)
}

/// Decode a set of columns into a name → value map, in column order.
pub fn columns_to_map<'a, I>(row: &PgRow, columns: I) -> Result<Columns, ObservationsError>
where
    I: IntoIterator<Item = &'a PgColumn>,
{
    let mut map = Columns::new();
    for column in columns {
        map.insert(column.name().to_string(), column_value(row, column)?);
    }
    Ok(map)
}
