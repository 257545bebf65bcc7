//! Conversion of user-typed text into typed values.
//!
//! Used by the attribute widget when a free-text edit is confirmed and by the
//! command console when an argument is submitted.

use crate::attribute::{AttrValue, DataType};
use crate::bus::ArgType;
use crate::error::{AppResult, PanelError};

/// Parse `text` as a scalar of `data_type`.
///
/// Malformed text yields [`PanelError::ValueConversion`], integers outside
/// the type's range yield [`PanelError::OutOfRange`], and types without a
/// textual form yield [`PanelError::Unsupported`].
pub fn parse_scalar(text: &str, data_type: DataType) -> AppResult<AttrValue> {
    let trimmed = text.trim();
    match data_type {
        DataType::Boolean => parse_bool(trimmed).map(AttrValue::Bool),
        DataType::Float | DataType::Double => {
            let v: f64 = trimmed
                .parse()
                .map_err(|_| PanelError::ValueConversion(text.to_string()))?;
            if data_type == DataType::Float && v.is_finite() && v.abs() > f32::MAX as f64 {
                return Err(PanelError::OutOfRange("Out of range".into()));
            }
            Ok(AttrValue::Float(v))
        }
        DataType::Enum => trimmed
            .parse::<i64>()
            .map(AttrValue::Enum)
            .map_err(|_| PanelError::ValueConversion(text.to_string())),
        DataType::String => Ok(AttrValue::Str(text.to_string())),
        dt if dt.is_integer() => parse_integer(trimmed, dt),
        other => Err(PanelError::Unsupported(format!(
            "Dev{:?} argument not supported",
            other
        ))),
    }
}

fn parse_bool(text: &str) -> AppResult<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(PanelError::ValueConversion(text.to_string())),
    }
}

fn parse_integer(text: &str, data_type: DataType) -> AppResult<AttrValue> {
    let v: i128 = text
        .parse()
        .map_err(|_| PanelError::ValueConversion(text.to_string()))?;
    let (lo, hi) = data_type
        .integer_range()
        .ok_or_else(|| PanelError::Unsupported(format!("{:?} is not an integer type", data_type)))?;
    if v < lo || v > hi {
        return Err(PanelError::OutOfRange("Out of range".into()));
    }
    match i64::try_from(v) {
        Ok(v) => Ok(AttrValue::Int(v)),
        Err(_) => u64::try_from(v)
            .map(AttrValue::UInt)
            .map_err(|_| PanelError::OutOfRange("Out of range".into())),
    }
}

/// Parse a comma separated list, with optional surrounding brackets.
fn split_array(text: &str) -> Vec<&str> {
    let inner = text.trim();
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse the argument of a command.
///
/// Returns `Ok(None)` for void commands.
pub fn parse_command_argument(text: &str, arg_type: Option<ArgType>) -> AppResult<Option<AttrValue>> {
    let Some(arg_type) = arg_type else {
        return Ok(None);
    };
    let unsupported = || PanelError::Unsupported(format!("{} argument not supported", arg_type));
    let value = match arg_type {
        ArgType::Scalar(
            DataType::Enum | DataType::State | DataType::PipeBlob | DataType::Encoded,
        ) => return Err(unsupported()),
        ArgType::Scalar(dt) => parse_scalar(text, dt)?,
        ArgType::Array(DataType::Boolean) => AttrValue::BoolArray(
            split_array(text)
                .into_iter()
                .map(parse_bool)
                .collect::<AppResult<_>>()?,
        ),
        ArgType::Array(DataType::String) => AttrValue::StrArray(
            split_array(text).into_iter().map(str::to_string).collect(),
        ),
        ArgType::Array(dt) if dt.is_float() => AttrValue::FloatArray(
            split_array(text)
                .into_iter()
                .map(|item| {
                    parse_scalar(item, dt).and_then(|v| {
                        v.as_f64()
                            .ok_or_else(|| PanelError::ValueConversion(item.to_string()))
                    })
                })
                .collect::<AppResult<_>>()?,
        ),
        ArgType::Array(dt) if dt.is_integer() => AttrValue::IntArray(
            split_array(text)
                .into_iter()
                .map(|item| {
                    parse_scalar(item, dt).and_then(|v| match v {
                        AttrValue::Int(i) => Ok(i),
                        _ => Err(PanelError::OutOfRange("Out of range".into())),
                    })
                })
                .collect::<AppResult<_>>()?,
        ),
        ArgType::Array(_) | ArgType::MixedArray => return Err(unsupported()),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars() {
        assert_eq!(parse_scalar(" 2.5 ", DataType::Double).unwrap(), AttrValue::Float(2.5));
        assert_eq!(parse_scalar("off", DataType::Boolean).unwrap(), AttrValue::Bool(false));
        assert_eq!(parse_scalar("-3", DataType::Long).unwrap(), AttrValue::Int(-3));
        assert_eq!(parse_scalar("2", DataType::Enum).unwrap(), AttrValue::Enum(2));
        assert_eq!(
            parse_scalar(" keep spaces", DataType::String).unwrap(),
            AttrValue::Str(" keep spaces".into())
        );
        assert_eq!(
            parse_scalar("18446744073709551615", DataType::ULong64).unwrap(),
            AttrValue::UInt(u64::MAX)
        );
    }

    #[test]
    fn malformed_and_out_of_range() {
        assert!(matches!(
            parse_scalar("abc", DataType::Double),
            Err(PanelError::ValueConversion(_))
        ));
        assert!(matches!(
            parse_scalar("1.5", DataType::Short),
            Err(PanelError::ValueConversion(_))
        ));
        assert!(matches!(
            parse_scalar("40000", DataType::Short),
            Err(PanelError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_scalar("-1", DataType::UChar),
            Err(PanelError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_scalar("1e39", DataType::Float),
            Err(PanelError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_scalar("ON", DataType::State),
            Err(PanelError::Unsupported(_))
        ));
    }

    #[test]
    fn command_arguments() {
        assert_eq!(parse_command_argument("ignored", None).unwrap(), None);
        assert_eq!(
            parse_command_argument("[1, 2,3]", Some(ArgType::Array(DataType::Long))).unwrap(),
            Some(AttrValue::IntArray(vec![1, 2, 3]))
        );
        assert_eq!(
            parse_command_argument("0.5,1.5", Some(ArgType::Array(DataType::Double))).unwrap(),
            Some(AttrValue::FloatArray(vec![0.5, 1.5]))
        );
        assert_eq!(
            parse_command_argument("[a, b]", Some(ArgType::Array(DataType::String))).unwrap(),
            Some(AttrValue::StrArray(vec!["a".into(), "b".into()]))
        );
        assert!(matches!(
            parse_command_argument("1", Some(ArgType::Scalar(DataType::Enum))),
            Err(PanelError::Unsupported(_))
        ));
        assert!(matches!(
            parse_command_argument("1", Some(ArgType::MixedArray)),
            Err(PanelError::Unsupported(_))
        ));
    }
}
