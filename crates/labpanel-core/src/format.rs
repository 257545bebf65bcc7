//! printf-style display formats.
//!
//! Devices declare a display format such as `%6.3f` or `%d` for each
//! attribute. [`FormatSpec`] parses the format once and renders values with
//! it. Exponent notation follows the C convention (`1.50e+03`), which differs
//! from Rust's `{:e}` output (`1.5e3`), so it is produced by [`format_exp`].

use std::sync::LazyLock;

use regex::Regex;

use crate::attribute::AttrValue;

static DISPLAY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^%(\d*)\.?(\d*)([diufegx]+)").expect("Invalid display format regex")
});

static STEP_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%(\d*)\.(\d+)[ef]+").expect("Invalid step format regex"));

/// Float notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatStyle {
    /// `%f`
    Fixed,
    /// `%e`
    Exponent,
    /// `%g`
    General,
}

/// Parsed display format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    /// `%d`, `%i`, `%u`: integer, width ignored.
    Integer,
    /// `%f`, `%e`, `%g` with optional width and precision.
    Float {
        width: Option<usize>,
        precision: Option<usize>,
        style: FloatStyle,
    },
    /// `%x`: hexadecimal with a `0x` prefix.
    Hex,
    /// Anything else: the value's plain representation.
    Plain,
}

impl FormatSpec {
    /// Parse a printf-style format. Unrecognised formats render plainly.
    pub fn parse(format: &str) -> Self {
        let Some(caps) = DISPLAY_FORMAT.captures(format) else {
            return FormatSpec::Plain;
        };
        let width = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let precision = caps.get(2).and_then(|m| m.as_str().parse().ok());
        match caps.get(3).map(|m| m.as_str()) {
            Some("d" | "i" | "u") => FormatSpec::Integer,
            Some("f") => FormatSpec::Float {
                width,
                precision,
                style: FloatStyle::Fixed,
            },
            Some("e") => FormatSpec::Float {
                width,
                precision,
                style: FloatStyle::Exponent,
            },
            Some("g") => FormatSpec::Float {
                width,
                precision,
                style: FloatStyle::General,
            },
            Some("x") => FormatSpec::Hex,
            _ => FormatSpec::Plain,
        }
    }

    /// Render a value. Values the format cannot express render plainly.
    pub fn render(&self, value: &AttrValue) -> String {
        match *self {
            FormatSpec::Integer => value
                .as_i64()
                .map(|v| v.to_string())
                .unwrap_or_else(|| value.to_string()),
            FormatSpec::Hex => value
                .as_i64()
                .map(|v| format!("0x{:x}", v))
                .unwrap_or_else(|| value.to_string()),
            FormatSpec::Float {
                width,
                precision,
                style,
            } => match value.as_f64() {
                Some(v) => {
                    let precision = precision.unwrap_or(6);
                    let text = match style {
                        FloatStyle::Fixed => format_fixed(v, precision),
                        FloatStyle::Exponent => format_exp(v, precision, false),
                        FloatStyle::General => format_general(v, precision),
                    };
                    match width {
                        Some(w) => format!("{:>w$}", text, w = w),
                        None => text,
                    }
                }
                None => value.to_string(),
            },
            FormatSpec::Plain => value.to_string(),
        }
    }
}

/// Render `value` with the display format `format`.
pub fn render_value(format: &str, value: &AttrValue) -> String {
    FormatSpec::parse(format).render(value)
}

/// Single step of a bounded float stepper for the display format.
///
/// `%W.Pf` and `%W.Pe` give a step of `10^-P` for `P >= 1`. Every other
/// format gives 0.1.
pub fn stepper_step(format: &str) -> f64 {
    let precision = STEP_FORMAT
        .captures(format)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse::<u32>().ok());
    let mut step = 0.1;
    if let Some(mut n) = precision {
        while n > 1 {
            step /= 10.0;
            n -= 1;
        }
    }
    step
}

fn non_finite(value: f64) -> Option<String> {
    if value.is_nan() {
        Some("nan".to_string())
    } else if value.is_infinite() {
        Some(if value > 0.0 { "inf" } else { "-inf" }.to_string())
    } else {
        None
    }
}

/// Fixed-point notation with `precision` decimals.
pub fn format_fixed(value: f64, precision: usize) -> String {
    non_finite(value).unwrap_or_else(|| format!("{:.*}", precision, value))
}

/// Exponent notation with a signed, at least two digit exponent.
///
/// `format_exp(1234.5, 2, false)` gives `1.23e+03`.
pub fn format_exp(value: f64, precision: usize, upper: bool) -> String {
    if let Some(s) = non_finite(value) {
        return if upper { s.to_uppercase() } else { s };
    }
    let raw = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = match raw.split_once('e') {
        Some(parts) => parts,
        None => return raw,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, marker, sign, exponent.abs())
}

/// General notation: fixed or exponent depending on magnitude, with
/// trailing zeros removed.
pub fn format_general(value: f64, precision: usize) -> String {
    if let Some(s) = non_finite(value) {
        return s;
    }
    let precision = precision.max(1);
    if value == 0.0 {
        return "0".to_string();
    }
    let probe = format!("{:.*e}", precision - 1, value);
    let exponent: i32 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exponent >= -4 && exponent < precision as i32 {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, value))
    } else {
        let text = format_exp(value, precision - 1, false);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
            None => text,
        }
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_formats() {
        assert_eq!(FormatSpec::parse("%d"), FormatSpec::Integer);
        assert_eq!(FormatSpec::parse("%5u"), FormatSpec::Integer);
        assert_eq!(FormatSpec::parse("%x"), FormatSpec::Hex);
        assert_eq!(FormatSpec::parse(""), FormatSpec::Plain);
        assert_eq!(FormatSpec::parse("%s"), FormatSpec::Plain);
        assert_eq!(
            FormatSpec::parse("%6.3f"),
            FormatSpec::Float {
                width: Some(6),
                precision: Some(3),
                style: FloatStyle::Fixed
            }
        );
        assert_eq!(
            FormatSpec::parse("%.2e"),
            FormatSpec::Float {
                width: None,
                precision: Some(2),
                style: FloatStyle::Exponent
            }
        );
    }

    #[test]
    fn renders_numbers() {
        assert_eq!(render_value("%6.3f", &AttrValue::Float(1.5)), " 1.500");
        assert_eq!(render_value("%.2e", &AttrValue::Float(1234.5)), "1.23e+03");
        assert_eq!(render_value("%d", &AttrValue::Float(12.9)), "12");
        assert_eq!(render_value("%x", &AttrValue::Int(255)), "0xff");
        assert_eq!(render_value("%f", &AttrValue::Int(2)), "2.000000");
        assert_eq!(render_value("", &AttrValue::Float(0.25)), "0.25");
    }

    #[test]
    fn non_numeric_values_fall_back_to_plain() {
        assert_eq!(render_value("%6.3f", &AttrValue::Str("n/a".into())), "n/a");
    }

    #[test]
    fn exponent_formatting() {
        assert_eq!(format_exp(0.000123, 2, false), "1.23e-04");
        assert_eq!(format_exp(5.0e-10, 2, true), "5.00E-10");
        assert_eq!(format_exp(f64::NAN, 2, false), "nan");
    }

    #[test]
    fn general_formatting() {
        assert_eq!(format_general(1234.5, 6), "1234.5");
        assert_eq!(format_general(0.0001, 6), "0.0001");
        assert_eq!(format_general(1.0e-5, 6), "1e-05");
        assert_eq!(format_general(123456789.0, 3), "1.23e+08");
        assert_eq!(format_general(0.0, 6), "0");
    }

    #[test]
    fn format_patterns_compile() {
        assert!(DISPLAY_FORMAT.is_match("%6.3f"));
        assert!(STEP_FORMAT.is_match("%.2e"));
        assert!(!STEP_FORMAT.is_match("%d"));
    }

    #[test]
    fn stepper_steps() {
        assert!((stepper_step("%6.3f") - 0.001).abs() < 1e-12);
        assert!((stepper_step("%.1e") - 0.1).abs() < 1e-12);
        assert!((stepper_step("%d") - 0.1).abs() < 1e-12);
        assert!((stepper_step("") - 0.1).abs() < 1e-12);
    }
}
