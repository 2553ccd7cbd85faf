use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use core_dataapi::{ColumnMetadata, Field};
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use strum::{Display, EnumString};

use crate::error::{self as driver_error, DecodeResult};

/// Column name that turns 32-bit integer and double columns into timestamps.
pub const UNIX_TIME_COLUMN: &str = "time";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMPTZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Native value produced from a wire [`Field`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    String(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Time of day, normalized to UTC when the wire value carries an offset.
    Time(NaiveTime),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn native_type(&self) -> Option<NativeType> {
        Some(match self {
            Self::Null => return None,
            Self::Int16(_) => NativeType::Int16,
            Self::Int32(_) => NativeType::Int32,
            Self::Int64(_) => NativeType::Int64,
            Self::Float32(_) => NativeType::Float32,
            Self::Float64(_) => NativeType::Float64,
            Self::Bool(_) => NativeType::Bool,
            Self::String(_) => NativeType::String,
            Self::Date(_) => NativeType::Date,
            Self::Timestamp(_) => NativeType::Timestamp,
            Self::Time(_) => NativeType::Time,
        })
    }

    /// Dates are midnight UTC.
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Date(date) => Some(date.and_time(NaiveTime::MIN).and_utc()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    String,
    Date,
    Timestamp,
    Time,
}

type DecodeFn = fn(&ColumnMetadata, &str, &Field) -> DecodeResult<Value>;

/// One row of the type table: every declared name it answers to, the native
/// type it produces and how to decode a field.
pub struct TypeStrategy {
    pub names: &'static [&'static str],
    pub native: NativeType,
    pub database_type: &'static str,
    /// Whether a column named [`UNIX_TIME_COLUMN`] holds epoch seconds.
    pub unix_time_alias: bool,
    decode: DecodeFn,
}

impl TypeStrategy {
    #[must_use]
    pub fn native_type_for(&self, column_name: &str) -> NativeType {
        if self.unix_time_alias && column_name == UNIX_TIME_COLUMN {
            NativeType::Timestamp
        } else {
            self.native
        }
    }
}

static STRATEGIES: &[TypeStrategy] = &[
    TypeStrategy {
        names: &["INT2", "SMALLINT"],
        native: NativeType::Int16,
        database_type: "SMALLINT",
        unix_time_alias: false,
        decode: decode_int16,
    },
    TypeStrategy {
        names: &["INT", "INT4", "INTEGER"],
        native: NativeType::Int32,
        database_type: "INTEGER",
        unix_time_alias: true,
        decode: decode_int32,
    },
    TypeStrategy {
        names: &["INT8", "BIGINT"],
        native: NativeType::Int64,
        database_type: "BIGINT",
        unix_time_alias: false,
        decode: decode_int64,
    },
    TypeStrategy {
        names: &["NUMERIC", "DECIMAL"],
        native: NativeType::Float64,
        database_type: "DECIMAL",
        unix_time_alias: false,
        decode: decode_float64,
    },
    TypeStrategy {
        names: &["FLOAT4", "REAL"],
        native: NativeType::Float32,
        database_type: "REAL",
        unix_time_alias: false,
        decode: decode_float32,
    },
    TypeStrategy {
        names: &["FLOAT", "FLOAT8", "DOUBLE PRECISION"],
        native: NativeType::Float64,
        database_type: "DOUBLE",
        unix_time_alias: true,
        decode: decode_float64,
    },
    TypeStrategy {
        names: &["BOOL", "BOOLEAN"],
        native: NativeType::Bool,
        database_type: "BOOLEAN",
        unix_time_alias: false,
        decode: decode_bool,
    },
    TypeStrategy {
        names: &["CHARACTER", "NCHAR", "BPCHAR", "CHAR"],
        native: NativeType::String,
        database_type: "CHAR",
        unix_time_alias: false,
        decode: decode_string,
    },
    TypeStrategy {
        names: &["CHARACTER VARYING", "NVARCHAR", "TEXT", "VARCHAR", "NAME"],
        native: NativeType::String,
        database_type: "VARCHAR",
        unix_time_alias: false,
        decode: decode_string,
    },
    TypeStrategy {
        names: &["GEOMETRY"],
        native: NativeType::String,
        database_type: "GEOMETRY",
        unix_time_alias: false,
        decode: decode_string,
    },
    TypeStrategy {
        names: &["HLLSKETCH", "SUPER"],
        native: NativeType::String,
        database_type: "VARCHAR",
        unix_time_alias: false,
        decode: decode_string,
    },
    TypeStrategy {
        names: &["DATE"],
        native: NativeType::Date,
        database_type: "DATE",
        unix_time_alias: false,
        decode: decode_date,
    },
    TypeStrategy {
        names: &["TIMESTAMP", "TIMESTAMP WITHOUT TIME ZONE"],
        native: NativeType::Timestamp,
        database_type: "TIMESTAMP",
        unix_time_alias: false,
        decode: decode_timestamp,
    },
    TypeStrategy {
        names: &["TIMESTAMPTZ", "TIMESTAMP WITH TIME ZONE"],
        native: NativeType::Timestamp,
        database_type: "TIMESTAMPTZ",
        unix_time_alias: false,
        decode: decode_timestamptz,
    },
    TypeStrategy {
        names: &["TIME", "TIME WITHOUT TIME ZONE"],
        native: NativeType::Time,
        database_type: "TIME",
        unix_time_alias: false,
        decode: decode_time,
    },
    TypeStrategy {
        names: &["TIMETZ", "TIME WITH TIME ZONE"],
        native: NativeType::Time,
        database_type: "TIMETZ",
        unix_time_alias: false,
        decode: decode_timetz,
    },
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static TypeStrategy>> = LazyLock::new(|| {
    STRATEGIES
        .iter()
        .flat_map(|strategy| strategy.names.iter().map(move |name| (*name, strategy)))
        .collect()
});

/// Case-insensitive lookup of a declared type name.
#[must_use]
pub fn strategy_for(type_name: &str) -> Option<&'static TypeStrategy> {
    BY_NAME
        .get(type_name.trim().to_ascii_uppercase().as_str())
        .copied()
}

/// Native type a column decodes to. Unknown declared types report `String`.
#[must_use]
pub fn native_type_of(column: &ColumnMetadata) -> NativeType {
    match column.type_name.as_deref().and_then(strategy_for) {
        Some(strategy) => strategy.native_type_for(&column.name),
        None => {
            tracing::warn!(type_name = ?column.type_name, column = %column.name, "unexpected type, using string instead");
            NativeType::String
        }
    }
}

/// Driver-level SQL type name of a column. Unknown declared types report `VARCHAR`.
#[must_use]
pub fn database_type_name_of(column: &ColumnMetadata) -> &'static str {
    match column.type_name.as_deref().and_then(strategy_for) {
        Some(strategy) => strategy.database_type,
        None => {
            tracing::warn!(type_name = ?column.type_name, column = %column.name, "unexpected type, using VARCHAR instead");
            "VARCHAR"
        }
    }
}

/// Decodes one wire field according to its column's declared type.
pub fn decode(column: &ColumnMetadata, field: &Field) -> DecodeResult<Value> {
    if field.is_null() {
        return Ok(Value::Null);
    }
    let type_name = column
        .type_name
        .as_deref()
        .context(driver_error::MissingTypeNameSnafu {
            column: &column.name,
        })?;
    let strategy = strategy_for(type_name).context(driver_error::UnsupportedTypeSnafu {
        column: &column.name,
        type_name,
    })?;
    if strategy.unix_time_alias && column.name == UNIX_TIME_COLUMN {
        return decode_unix_time(column, type_name, field);
    }
    (strategy.decode)(column, type_name, field)
}

/// Decodes a whole row. Any failing field fails the row.
pub fn decode_row(columns: &[ColumnMetadata], fields: &[Field]) -> DecodeResult<Vec<Value>> {
    if columns.len() != fields.len() {
        return driver_error::RowWidthSnafu {
            fields: fields.len(),
            columns: columns.len(),
        }
        .fail();
    }
    columns
        .iter()
        .zip(fields)
        .map(|(column, field)| decode(column, field))
        .collect()
}

fn conversion_error<T>(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<T> {
    driver_error::ConversionSnafu {
        column: &column.name,
        type_name,
        field: field.tag(),
    }
    .fail()
}

fn long_value(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<i64> {
    match field {
        Field::LongValue(v) => Ok(*v),
        _ => conversion_error(column, type_name, field),
    }
}

fn string_value<'a>(
    column: &ColumnMetadata,
    type_name: &str,
    field: &'a Field,
) -> DecodeResult<&'a str> {
    match field {
        Field::StringValue(v) => Ok(v),
        _ => conversion_error(column, type_name, field),
    }
}

fn narrow<T: TryFrom<i64>>(column: &ColumnMetadata, type_name: &str, value: i64) -> DecodeResult<T> {
    T::try_from(value).ok().context(driver_error::IntegerOutOfRangeSnafu {
        column: &column.name,
        type_name,
        value,
    })
}

fn decode_int16(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let value = long_value(column, type_name, field)?;
    narrow(column, type_name, value).map(Value::Int16)
}

fn decode_int32(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let value = long_value(column, type_name, field)?;
    narrow(column, type_name, value).map(Value::Int32)
}

fn decode_int64(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    long_value(column, type_name, field).map(Value::Int64)
}

fn float_value(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<f64> {
    match field {
        Field::DoubleValue(v) => Ok(*v),
        Field::StringValue(s) => s.trim().parse::<f64>().context(driver_error::ParseFloatSnafu {
            column: &column.name,
            type_name,
        }),
        _ => conversion_error(column, type_name, field),
    }
}

fn decode_float32(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    match field {
        Field::StringValue(s) => s
            .trim()
            .parse::<f32>()
            .map(Value::Float32)
            .context(driver_error::ParseFloatSnafu {
                column: &column.name,
                type_name,
            }),
        #[allow(clippy::cast_possible_truncation)]
        Field::DoubleValue(v) => Ok(Value::Float32(*v as f32)),
        _ => conversion_error(column, type_name, field),
    }
}

fn decode_float64(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    float_value(column, type_name, field).map(Value::Float64)
}

fn decode_unix_time(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    #[allow(clippy::cast_possible_truncation)]
    let seconds = match field {
        Field::LongValue(v) => *v,
        _ => float_value(column, type_name, field)?.trunc() as i64,
    };
    DateTime::from_timestamp(seconds, 0)
        .map(Value::Timestamp)
        .context(driver_error::InvalidEpochSnafu {
            column: &column.name,
            seconds,
        })
}

fn decode_bool(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    match field {
        Field::BooleanValue(v) => Ok(Value::Bool(*v)),
        _ => conversion_error(column, type_name, field),
    }
}

fn decode_string(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    string_value(column, type_name, field).map(|s| Value::String(s.to_string()))
}

fn decode_date(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let s = string_value(column, type_name, field)?;
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map(Value::Date)
        .context(driver_error::ParseTemporalSnafu {
            column: &column.name,
            type_name,
        })
}

fn decode_timestamp(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let s = string_value(column, type_name, field)?;
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|ts| Value::Timestamp(ts.and_utc()))
        .context(driver_error::ParseTemporalSnafu {
            column: &column.name,
            type_name,
        })
}

fn decode_timestamptz(
    column: &ColumnMetadata,
    type_name: &str,
    field: &Field,
) -> DecodeResult<Value> {
    let s = string_value(column, type_name, field)?;
    DateTime::parse_from_str(s, TIMESTAMPTZ_FORMAT)
        .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
        .context(driver_error::ParseTemporalSnafu {
            column: &column.name,
            type_name,
        })
}

fn decode_time(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let s = string_value(column, type_name, field)?;
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map(Value::Time)
        .context(driver_error::ParseTemporalSnafu {
            column: &column.name,
            type_name,
        })
}

fn decode_timetz(column: &ColumnMetadata, type_name: &str, field: &Field) -> DecodeResult<Value> {
    let s = string_value(column, type_name, field)?;
    let Some(split) = s.rfind(['+', '-']) else {
        return decode_time(column, type_name, field);
    };
    let (time, offset) = s.split_at(split);
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).context(
        driver_error::ParseTemporalSnafu {
            column: &column.name,
            type_name,
        },
    )?;
    let offset = parse_offset(offset).context(driver_error::InvalidOffsetSnafu {
        column: &column.name,
        type_name,
        offset,
    })?;
    let (utc, _) =
        time.overflowing_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())));
    Ok(Value::Time(utc))
}

/// Parses `+HH`, `+HHMM` and `+HH:MM` offsets.
fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, rest) = match offset.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
