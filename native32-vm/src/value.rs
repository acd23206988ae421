//! Stack value representation and the numeric/string coercion rules from
//! `original_source/native32/actionvm.py`'s `_str`/`_float`/`_int` helpers.
//!
//! All stack values are strings on the wire (spec.md §4.E): rather than
//! invent a typed `Int`/`Float` variant the container format doesn't have,
//! `Value` stays a one-variant wrapper and arithmetic goes through the
//! coercion helpers below, exactly as the source does.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value(String);

impl Value {
    pub fn new(s: impl Into<String>) -> Self {
        Value(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn from_number(v: f64) -> Self {
        Value(num_to_string(v))
    }

    pub fn from_bool(b: bool) -> Self {
        Value(if b { "1".to_string() } else { "0".to_string() })
    }

    pub fn to_float(&self) -> f64 {
        to_float(&self.0)
    }

    pub fn to_int(&self) -> i64 {
        to_int(&self.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value(s.to_string())
    }
}

/// `_float(x)`: empty string and unparseable strings coerce to 0, matching
/// the source's bare `try: float(x) except ValueError: 0` — never panics.
pub fn to_float(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    s.trim().parse::<f64>().unwrap_or(0.0)
}

/// `_int(x)`: `int(_float(x))` in the source, which truncates toward zero.
/// `f64 as i64` in Rust saturates on NaN/±inf instead of panicking the way
/// Python's `int()` would raise `OverflowError` — a deliberate divergence so
/// a malformed program traps via `VmError` instead of aborting the process.
pub fn to_int(s: &str) -> i64 {
    to_float(s) as i64
}

/// `_str(x)`: integer-valued floats serialize without a trailing `.0`;
/// everything else uses the default decimal text.
pub fn num_to_string(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e18 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_float_empty_and_unparseable_are_zero() {
        assert_eq!(to_float(""), 0.0);
        assert_eq!(to_float("abc"), 0.0);
        assert_eq!(to_float("12.0"), 12.0);
    }

    #[test]
    fn num_to_string_drops_integer_decimals() {
        assert_eq!(num_to_string(12.0), "12");
        assert_eq!(num_to_string(12.5), "12.5");
    }

    #[test]
    fn to_int_truncates_toward_zero() {
        assert_eq!(to_int("2.9"), 2);
        assert_eq!(to_int("-2.9"), -2);
    }

    #[test]
    fn to_int_does_not_panic_on_non_finite() {
        assert_eq!(to_int("1e400"), i64::MAX);
    }
}
