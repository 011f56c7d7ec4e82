//! Parameter binding and result decoding
//!
//! Parameters arrive as arbitrary JSON values. They are bound in the text
//! wire format with no declared type, so the engine infers each
//! parameter's type from the statement and parses the text itself.
//!
//! Results arrive in the binary wire format and are decoded per column
//! type into JSON values. Columns of types with no decoder here are
//! re-selected as text by the session.

use std::error::Error;
use std::fmt::Write as _;
use std::net::IpAddr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, Format, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::Row as PgRow;

use super::errors::{QueryError, QueryResult};
use super::session::Row;

type BoxError = Box<dyn Error + Sync + Send>;

// ==================
// Parameters
// ==================

/// A bind parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays and objects, bound as JSON text
    Json(Value),
}

impl SqlParam {
    /// Textual form sent to the engine, `None` for SQL NULL
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlParam::Null => None,
            SqlParam::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            SqlParam::Int(i) => Some(i.to_string()),
            SqlParam::Float(f) => Some(f.to_string()),
            SqlParam::Text(s) => Some(s.clone()),
            SqlParam::Json(v) => Some(v.to_string()),
        }
    }
}

impl From<&Value> for SqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Int(i)
                } else if n.is_f64() {
                    SqlParam::Float(n.as_f64().unwrap_or_default())
                } else {
                    // u64 beyond i64::MAX
                    SqlParam::Text(n.to_string())
                }
            }
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlParam::Json(value.clone()),
        }
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => SqlParam::Text(s),
            other => SqlParam::from(&other),
        }
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.to_text() {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

// ==================
// Result decoding
// ==================

/// NUMERIC decoded to its exact decimal string
struct PgNumeric(String);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn read_u16(raw: &[u8], at: usize) -> Result<u16, BoxError> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    let ndigits = read_u16(raw, 0)? as usize;
    let weight = read_u16(raw, 2)? as i16 as i32;
    let sign = read_u16(raw, 4)?;
    let dscale = read_u16(raw, 6)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let mut digits = Vec::with_capacity(ndigits);
    for i in 0..ndigits {
        digits.push(read_u16(raw, 8 + i * 2)?);
    }
    let digit = |i: i32| -> u16 {
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit(i));
            } else {
                let _ = write!(out, "{:04}", digit(i));
            }
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], BoxError> {
    if buf.len() < len {
        return Err("truncated value".into());
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

fn read_i32(buf: &mut &[u8]) -> Result<i32, BoxError> {
    Ok(i32::from_be_bytes(take(buf, 4)?.try_into()?))
}

fn read_i64(buf: &mut &[u8]) -> Result<i64, BoxError> {
    Ok(i64::from_be_bytes(take(buf, 8)?.try_into()?))
}

/// `HH:MM:SS` with up to six trimmed fraction digits
fn clock(micros: u64) -> String {
    let mut out = format!(
        "{:02}:{:02}:{:02}",
        micros / 3_600_000_000,
        micros / 60_000_000 % 60,
        micros / 1_000_000 % 60
    );
    let frac = micros % 1_000_000;
    if frac > 0 {
        let digits = format!("{:06}", frac);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// INTERVAL in the server's default output style, e.g. `1 year 2 mons 3 days 04:05:06`
fn decode_interval(raw: &[u8]) -> Result<String, BoxError> {
    let mut buf = raw;
    let micros = read_i64(&mut buf)?;
    let days = read_i32(&mut buf)?;
    let months = read_i32(&mut buf)?;

    let mut parts = Vec::new();
    let mut negative_seen = false;
    let mut unit = |n: i32, name: &str| {
        if n == 0 {
            return;
        }
        let sign = if n > 0 && negative_seen { "+" } else { "" };
        let plural = if n == 1 { "" } else { "s" };
        parts.push(format!("{}{} {}{}", sign, n, name, plural));
        negative_seen |= n < 0;
    };
    unit(months / 12, "year");
    unit(months % 12, "mon");
    unit(days, "day");

    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 {
            "-"
        } else if negative_seen {
            "+"
        } else {
            ""
        };
        parts.push(format!("{}{}", sign, clock(micros.unsigned_abs())));
    }
    Ok(parts.join(" "))
}

/// TIMETZ as `HH:MM:SS[.ffffff]` plus the UTC offset, e.g. `12:30:00+05:30`
fn decode_timetz(raw: &[u8]) -> Result<String, BoxError> {
    let mut buf = raw;
    let micros = read_i64(&mut buf)?;
    // Stored as seconds west of UTC
    let east = -read_i32(&mut buf)?;

    let abs = east.unsigned_abs();
    let mut out = clock(micros.unsigned_abs());
    let _ = write!(out, "{}{:02}", if east < 0 { '-' } else { '+' }, abs / 3600);
    if abs % 3600 != 0 {
        let _ = write!(out, ":{:02}", abs / 60 % 60);
    }
    if abs % 60 != 0 {
        let _ = write!(out, ":{:02}", abs % 60);
    }
    Ok(out)
}

const INET_FAMILY_V4: u8 = 2;
const INET_FAMILY_V6: u8 = 3;

/// INET and CIDR; the prefix length is shown unless it covers the whole address
fn decode_inet(raw: &[u8]) -> Result<String, BoxError> {
    let mut buf = raw;
    let header = take(&mut buf, 4)?;
    let (family, bits, is_cidr) = (header[0], header[1], header[2] != 0);

    let (addr, max_bits) = match family {
        INET_FAMILY_V4 => {
            let octets: [u8; 4] = take(&mut buf, 4)?.try_into()?;
            (IpAddr::from(octets), 32)
        }
        INET_FAMILY_V6 => {
            let octets: [u8; 16] = take(&mut buf, 16)?.try_into()?;
            (IpAddr::from(octets), 128)
        }
        other => return Err(format!("unknown address family {}", other).into()),
    };

    if is_cidr || bits != max_bits {
        Ok(format!("{}/{}", addr, bits))
    } else {
        Ok(addr.to_string())
    }
}

/// Arrays of any decodable element type, nested once per dimension
fn decode_array(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    let member = match ty.kind() {
        Kind::Array(member) => base_type(member),
        _ => return Err(format!("{} is not an array type", ty.name()).into()),
    };
    let decode = decoder(member)
        .ok_or_else(|| format!("unsupported array element type {}", member.name()))?;

    let mut buf = raw;
    let ndim = read_i32(&mut buf)?;
    let _has_nulls = read_i32(&mut buf)?;
    let _element_oid = read_i32(&mut buf)?;

    let mut dims = Vec::new();
    for _ in 0..ndim.max(0) {
        let len = read_i32(&mut buf)?;
        let _lower_bound = read_i32(&mut buf)?;
        dims.push(len.max(0) as usize);
    }

    let total = if dims.is_empty() {
        0
    } else {
        dims.iter().product()
    };
    let mut elements = Vec::with_capacity(total);
    for _ in 0..total {
        let len = read_i32(&mut buf)?;
        if len < 0 {
            elements.push(Value::Null);
        } else {
            elements.push(decode(member, take(&mut buf, len as usize)?)?);
        }
    }

    Ok(nest(&dims, &mut elements.into_iter()))
}

fn nest<I: Iterator<Item = Value>>(dims: &[usize], items: &mut I) -> Value {
    match dims.split_first() {
        None => Value::Array(Vec::new()),
        Some((&len, [])) => Value::Array(items.by_ref().take(len).collect()),
        Some((&len, rest)) => Value::Array((0..len).map(|_| nest(rest, items)).collect()),
    }
}

fn bytea_hex(bytes: &[u8]) -> Value {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    Value::String(out)
}

fn naive_timestamp(ts: NaiveDateTime) -> Value {
    Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

/// Types whose binary form is their UTF-8 text
fn text(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    Ok(Value::String(<&str as FromSql>::from_sql(ty, raw)?.to_string()))
}

/// Undecoded column bytes
struct RawValue<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawValue(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

type Decoder = fn(&Type, &[u8]) -> Result<Value, BoxError>;

/// Domains travel as their underlying type
fn base_type(ty: &Type) -> &Type {
    match ty.kind() {
        Kind::Domain(inner) => base_type(inner),
        _ => ty,
    }
}

fn decoder(ty: &Type) -> Option<Decoder> {
    let decode: Decoder = match *ty {
        Type::BOOL => |ty, raw| Ok(bool::from_sql(ty, raw)?.into()),
        Type::INT2 => |ty, raw| Ok(i16::from_sql(ty, raw)?.into()),
        Type::INT4 => |ty, raw| Ok(i32::from_sql(ty, raw)?.into()),
        Type::INT8 => |ty, raw| Ok(i64::from_sql(ty, raw)?.into()),
        Type::OID => |ty, raw| Ok(u32::from_sql(ty, raw)?.into()),
        Type::FLOAT4 => |ty, raw| Ok(f32::from_sql(ty, raw)?.into()),
        Type::FLOAT8 => |ty, raw| Ok(f64::from_sql(ty, raw)?.into()),
        Type::NUMERIC => |_, raw| Ok(Value::String(decode_numeric(raw)?)),
        Type::CHAR => |ty, raw| {
            let c = i8::from_sql(ty, raw)? as u8 as char;
            Ok(Value::String(c.to_string()))
        },
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::XML => text,
        Type::JSON | Type::JSONB => |ty, raw| Value::from_sql(ty, raw),
        Type::TIMESTAMP => |ty, raw| Ok(naive_timestamp(NaiveDateTime::from_sql(ty, raw)?)),
        Type::TIMESTAMPTZ => |ty, raw| {
            let ts = DateTime::<Utc>::from_sql(ty, raw)?;
            Ok(Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
        },
        Type::DATE => |ty, raw| Ok(Value::String(NaiveDate::from_sql(ty, raw)?.to_string())),
        Type::TIME => |ty, raw| Ok(Value::String(NaiveTime::from_sql(ty, raw)?.to_string())),
        Type::TIMETZ => |_, raw| Ok(Value::String(decode_timetz(raw)?)),
        Type::INTERVAL => |_, raw| Ok(Value::String(decode_interval(raw)?)),
        Type::UUID => |ty, raw| Ok(Value::String(uuid::Uuid::from_sql(ty, raw)?.to_string())),
        Type::BYTEA => |_, raw| Ok(bytea_hex(raw)),
        Type::INET | Type::CIDR => |_, raw| Ok(Value::String(decode_inet(raw)?)),
        _ => match ty.kind() {
            Kind::Array(member) => {
                decoder(base_type(member))?;
                decode_array
            }
            Kind::Enum(_) => text,
            _ if matches!(ty.name(), "citext" | "ltree" | "lquery" | "ltxtquery") => text,
            _ => return None,
        },
    };
    Some(decode)
}

/// Whether result columns of this type decode natively
pub(crate) fn is_supported(ty: &Type) -> bool {
    decoder(base_type(ty)).is_some()
}

/// Decode a result row into a JSON object keyed by column name.
pub(crate) fn decode_row(row: &PgRow) -> QueryResult<Row> {
    let mut out = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = base_type(column.type_());
        let decode =
            decoder(ty).ok_or_else(|| QueryError::unsupported_type(column.name(), ty.name()))?;
        let value = match row.try_get::<_, Option<RawValue>>(idx)? {
            Some(RawValue(raw)) => {
                decode(ty, raw).map_err(|e| QueryError::decode(column.name(), &*e))?
            }
            None => Value::Null,
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
