//! Script argument values in the ledger's native encoding.
use crate::{Address, ArgumentError, FIX64_DECIMALS, FIX64_SCALE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A ledger-native argument value. Fixed-point values hold the raw integer scaled by
/// [`FIX64_SCALE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Fix64(i64),
    UFix64(u64),
    Address(Address),
    String(String),
    Bool(bool),
}

impl Value {
    /// Converts a textual `value` of the named `kind` into its native encoding.
    pub fn parse(kind: &str, value: &str) -> Result<Self, ArgumentError> {
        let kind = ValueKind::from_str(kind)?;
        kind.parse(value)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Fix64(_) => ValueKind::Fix64,
            Self::UFix64(_) => ValueKind::UFix64,
            Self::Address(_) => ValueKind::Address,
            Self::String(_) => ValueKind::String,
            Self::Bool(_) => ValueKind::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Fix64,
    UFix64,
    Address,
    String,
    Bool,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Fix64 => "Fix64",
            Self::UFix64 => "UFix64",
            Self::Address => "Address",
            Self::String => "String",
            Self::Bool => "Bool",
        }
    }

    pub fn parse(&self, value: &str) -> Result<Value, ArgumentError> {
        let name = self.name();
        let raw = value.trim();
        let res = match self {
            Self::Int8 => Value::Int8(parse_int(name, raw)?),
            Self::Int16 => Value::Int16(parse_int(name, raw)?),
            Self::Int32 => Value::Int32(parse_int(name, raw)?),
            Self::Int64 => Value::Int64(parse_int(name, raw)?),
            Self::UInt8 => Value::UInt8(parse_int(name, raw)?),
            Self::UInt16 => Value::UInt16(parse_int(name, raw)?),
            Self::UInt32 => Value::UInt32(parse_int(name, raw)?),
            Self::UInt64 => Value::UInt64(parse_int(name, raw)?),
            Self::Fix64 => Value::Fix64(parse_fix64(raw)?),
            Self::UFix64 => Value::UFix64(parse_ufix64(raw)?),
            Self::Address => Value::Address(raw.parse()?),
            // NOTE: Strings are taken verbatim, including surrounding whitespace.
            Self::String => Value::String(value.to_string()),
            Self::Bool => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(ArgumentError::invalid(name, value, "expected `true` or `false`")),
            },
        };
        Ok(res)
    }
}

impl FromStr for ValueKind {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "Int8" => Self::Int8,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "UInt8" => Self::UInt8,
            "UInt16" => Self::UInt16,
            "UInt32" => Self::UInt32,
            "UInt64" => Self::UInt64,
            "Fix64" => Self::Fix64,
            "UFix64" => Self::UFix64,
            "Address" => Self::Address,
            "String" => Self::String,
            "Bool" => Self::Bool,
            other => return Err(ArgumentError::UnsupportedType(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_int<T>(kind: &'static str, raw: &str) -> Result<T, ArgumentError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ArgumentError::invalid(kind, raw, e))
}

fn parse_ufix64(raw: &str) -> Result<u64, ArgumentError> {
    if raw.starts_with('-') {
        return Err(ArgumentError::invalid("UFix64", raw, "value must not be negative"));
    }
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    scaled_fixed_point("UFix64", raw, digits)
}

fn parse_fix64(raw: &str) -> Result<i64, ArgumentError> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let magnitude = i128::from(scaled_fixed_point("Fix64", raw, digits)?);
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| ArgumentError::invalid("Fix64", raw, "value out of range"))
}

/// Parses an unsigned decimal with at most [`FIX64_DECIMALS`] fractional digits into its raw
/// scaled representation.
fn scaled_fixed_point(kind: &'static str, raw: &str, digits: &str) -> Result<u64, ArgumentError> {
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(ArgumentError::invalid(kind, raw, "expected a decimal number"));
    }
    if frac_part.len() > FIX64_DECIMALS {
        return Err(ArgumentError::invalid(
            kind,
            raw,
            format!("at most {FIX64_DECIMALS} decimal places are supported"),
        ));
    }

    let int_value: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| ArgumentError::invalid(kind, raw, "value out of range"))?
    };
    let frac_value: u64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{frac_part:0<width$}", width = FIX64_DECIMALS);
        padded
            .parse()
            .map_err(|_| ArgumentError::invalid(kind, raw, "invalid fractional part"))?
    };

    int_value
        .checked_mul(FIX64_SCALE)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| ArgumentError::invalid(kind, raw, "value out of range"))
}
