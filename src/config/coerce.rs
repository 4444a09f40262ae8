//! String-to-value coercion for configuration leaves.
//!
//! Every leaf type implements [`Coerce`]. Scalars parse the raw string
//! directly; sequences split on `,`; maps split on `,` and then on `:`.
//! Integer parsing is base-agnostic (`0x`, `0o`, `0b`, leading `0` for octal,
//! `_` between digits) and range-checked against the target width.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::duration::parse_duration;

/// Boxed error returned by custom parsing capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to convert a raw string into a typed value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoerceError {
    #[error("invalid syntax for {kind}: {raw:?}")]
    Syntax { kind: &'static str, raw: String },

    #[error("value {raw:?} out of range for {kind}")]
    OutOfRange { kind: &'static str, raw: String },

    #[error("invalid duration {raw:?}: {reason}")]
    Duration { raw: String, reason: &'static str },

    #[error("unknown status code {0:?}")]
    UnknownCode(String),

    #[error("invalid map item: {0:?}")]
    MapItem(String),

    #[error(transparent)]
    Custom(BoxError),
}

impl CoerceError {
    fn syntax(kind: &'static str, raw: &str) -> Self {
        Self::Syntax {
            kind,
            raw: raw.to_string(),
        }
    }

    fn out_of_range(kind: &'static str, raw: &str) -> Self {
        Self::OutOfRange {
            kind,
            raw: raw.to_string(),
        }
    }

    /// Describes the failure without repeating the raw value.
    pub(crate) fn summary(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "invalid syntax",
            Self::OutOfRange { .. } => "value out of range",
            Self::Duration { reason, .. } => *reason,
            Self::UnknownCode(_) => "unknown status code",
            Self::MapItem(_) => "invalid map item",
            Self::Custom(_) => "rejected by the field type",
        }
    }
}

/// A type that can be produced from a single raw configuration string.
pub trait Coerce: Sized {
    /// Parses one raw value.
    fn coerce(raw: &str) -> Result<Self, CoerceError>;

    /// Parses a `Vec<Self>`.
    ///
    /// The default splits on `,` without trimming elements; a blank string
    /// yields an empty vector. `u8` overrides this to take the raw bytes.
    fn coerce_vec(raw: &str) -> Result<Vec<Self>, CoerceError> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(Self::coerce).collect()
    }

    /// Name shown in usage tables and parse errors.
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(short_type_name(std::any::type_name::<Self>()))
    }
}

impl Coerce for String {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        Ok(raw.to_string())
    }
}

impl Coerce for PathBuf {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        Ok(PathBuf::from(raw))
    }
}

impl Coerce for bool {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        parse_bool(raw).ok_or_else(|| CoerceError::syntax("bool", raw))
    }
}

macro_rules! coerce_signed {
    ($($ty:ident),*) => {$(
        impl Coerce for $ty {
            fn coerce(raw: &str) -> Result<Self, CoerceError> {
                let value = parse_signed(raw, stringify!($ty))?;
                $ty::try_from(value).map_err(|_| CoerceError::out_of_range(stringify!($ty), raw))
            }
        }
    )*};
}

macro_rules! coerce_unsigned {
    ($($ty:ident),*) => {$(
        impl Coerce for $ty {
            fn coerce(raw: &str) -> Result<Self, CoerceError> {
                let value = parse_unsigned(raw, stringify!($ty))?;
                $ty::try_from(value).map_err(|_| CoerceError::out_of_range(stringify!($ty), raw))
            }
        }
    )*};
}

coerce_signed!(i8, i16, i32, i64, isize);
coerce_unsigned!(u16, u32, u64, usize);

impl Coerce for u8 {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        let value = parse_unsigned(raw, "u8")?;
        u8::try_from(value).map_err(|_| CoerceError::out_of_range("u8", raw))
    }

    // Byte vectors take the raw string verbatim.
    fn coerce_vec(raw: &str) -> Result<Vec<Self>, CoerceError> {
        Ok(raw.as_bytes().to_vec())
    }
}

impl Coerce for f64 {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        let value: f64 = raw.parse().map_err(|_| CoerceError::syntax("f64", raw))?;
        if value.is_infinite() && !is_infinity_literal(raw) {
            return Err(CoerceError::out_of_range("f64", raw));
        }
        Ok(value)
    }
}

impl Coerce for f32 {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        let value: f32 = raw.parse().map_err(|_| CoerceError::syntax("f32", raw))?;
        if value.is_infinite() && !is_infinity_literal(raw) {
            return Err(CoerceError::out_of_range("f32", raw));
        }
        Ok(value)
    }
}

impl Coerce for Duration {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        parse_duration(raw)
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("Duration")
    }
}

impl Coerce for tracing::Level {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        raw.parse()
            .map_err(|err| CoerceError::Custom(Box::new(err)))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("Level")
    }
}

impl<T: Coerce> Coerce for Option<T> {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        T::coerce(raw).map(Some)
    }
}

impl<T: Coerce> Coerce for Vec<T> {
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        T::coerce_vec(raw)
    }
}

impl<K, V, S> Coerce for HashMap<K, V, S>
where
    K: Coerce + Eq + Hash,
    V: Coerce,
    S: BuildHasher + Default,
{
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        coerce_pairs(raw).map(|pairs| pairs.into_iter().collect())
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("HashMap<{}, {}>", K::type_name(), V::type_name()))
    }
}

impl<K, V> Coerce for BTreeMap<K, V>
where
    K: Coerce + Ord,
    V: Coerce,
{
    fn coerce(raw: &str) -> Result<Self, CoerceError> {
        coerce_pairs(raw).map(|pairs| pairs.into_iter().collect())
    }
}

fn coerce_pairs<K: Coerce, V: Coerce>(raw: &str) -> Result<Vec<(K, V)>, CoerceError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|pair| {
            let mut parts = pair.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Ok((K::coerce(key)?, V::coerce(value)?)),
                _ => Err(CoerceError::MapItem(pair.to_string())),
            }
        })
        .collect()
}

/// Strict boolean parsing: `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn is_infinity_literal(raw: &str) -> bool {
    raw.trim_start_matches(['+', '-'])
        .to_ascii_lowercase()
        .starts_with("inf")
}

fn parse_signed(raw: &str, kind: &'static str) -> Result<i128, CoerceError> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let magnitude = parse_magnitude(digits, kind, raw)?;
    let value = i128::try_from(magnitude).map_err(|_| CoerceError::out_of_range(kind, raw))?;
    Ok(if negative { -value } else { value })
}

fn parse_unsigned(raw: &str, kind: &'static str) -> Result<u128, CoerceError> {
    if raw.starts_with(['+', '-']) {
        return Err(CoerceError::syntax(kind, raw));
    }
    parse_magnitude(raw, kind, raw)
}

/// Parses an unsigned magnitude, detecting the base from its prefix.
fn parse_magnitude(digits: &str, kind: &'static str, raw: &str) -> Result<u128, CoerceError> {
    let (radix, body, prefixed) = if let Some(rest) = strip_prefix_ci(digits, "0x") {
        (16, rest, true)
    } else if let Some(rest) = strip_prefix_ci(digits, "0o") {
        (8, rest, true)
    } else if let Some(rest) = strip_prefix_ci(digits, "0b") {
        (2, rest, true)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..], true)
    } else {
        (10, digits, false)
    };

    if body.is_empty() || !underscores_ok(body, prefixed) {
        return Err(CoerceError::syntax(kind, raw));
    }

    let mut value: u128 = 0;
    for c in body.chars().filter(|c| *c != '_') {
        let digit = c
            .to_digit(radix)
            .ok_or_else(|| CoerceError::syntax(kind, raw))?;
        value = value
            .checked_mul(u128::from(radix))
            .and_then(|v| v.checked_add(u128::from(digit)))
            .ok_or_else(|| CoerceError::out_of_range(kind, raw))?;
    }
    Ok(value)
}

fn strip_prefix_ci<'s>(s: &'s str, prefix: &str) -> Option<&'s str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// `_` may only separate digits, or follow a base prefix.
fn underscores_ok(body: &str, prefixed: bool) -> bool {
    let mut after_digit = prefixed;
    let mut last_was_underscore = false;
    for c in body.chars() {
        if c == '_' {
            if !after_digit {
                return false;
            }
            after_digit = false;
            last_was_underscore = true;
        } else {
            after_digit = true;
            last_was_underscore = false;
        }
    }
    !last_was_underscore
}

/// Strips module paths from a fully-qualified type name.
///
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            segment_start = out.len();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_slice() {
        let values = Vec::<String>::coerce("a,b,c").unwrap();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_slice_is_empty_not_missing() {
        let values = Vec::<String>::coerce("").unwrap();
        assert!(values.is_empty());
        let values = Vec::<i32>::coerce("   ").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_slice_elements_are_not_trimmed() {
        assert_eq!(Vec::<String>::coerce("a, b").unwrap(), vec!["a", " b"]);
        assert!(Vec::<i32>::coerce("1, 2").is_err());
    }

    #[test]
    fn test_byte_vec_is_verbatim() {
        let bytes = Vec::<u8>::coerce("a,b:c").unwrap();
        assert_eq!(bytes, b"a,b:c".to_vec());
    }

    #[test]
    fn test_string_to_int_map() {
        let map = HashMap::<String, i64>::coerce("a:1,b:2").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
    }

    #[test]
    fn test_map_with_missing_colon_fails() {
        let result = HashMap::<String, i64>::coerce("a:1,b");
        assert!(matches!(result, Err(CoerceError::MapItem(item)) if item == "b"));
    }

    #[test]
    fn test_map_with_extra_colon_fails() {
        let result = BTreeMap::<String, String>::coerce("a:1:2");
        assert!(matches!(result, Err(CoerceError::MapItem(_))));
    }

    #[test]
    fn test_blank_map_is_empty() {
        assert!(BTreeMap::<String, u8>::coerce(" ").unwrap().is_empty());
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(i64::coerce("42").unwrap(), 42);
        assert_eq!(i64::coerce("-42").unwrap(), -42);
        assert_eq!(i64::coerce("+7").unwrap(), 7);
        assert_eq!(u32::coerce("0x1F").unwrap(), 31);
        assert_eq!(u32::coerce("0o17").unwrap(), 15);
        assert_eq!(u32::coerce("017").unwrap(), 15);
        assert_eq!(u32::coerce("0b101").unwrap(), 5);
        assert_eq!(u32::coerce("1_000").unwrap(), 1000);
        assert_eq!(u32::coerce("0x_ff").unwrap(), 255);
        assert_eq!(u8::coerce("0").unwrap(), 0);
    }

    #[test]
    fn test_integer_syntax_errors() {
        for raw in ["", "abc", "0x", "08", "_1", "1_", "1__0", "1.5"] {
            assert!(
                matches!(i64::coerce(raw), Err(CoerceError::Syntax { .. })),
                "{raw:?} should be a syntax error"
            );
        }
        assert!(matches!(u16::coerce("-1"), Err(CoerceError::Syntax { .. })));
    }

    #[test]
    fn test_integer_width_is_enforced() {
        assert_eq!(i8::coerce("-128").unwrap(), i8::MIN);
        assert!(matches!(i8::coerce("128"), Err(CoerceError::OutOfRange { .. })));
        assert!(matches!(u8::coerce("256"), Err(CoerceError::OutOfRange { .. })));
        assert_eq!(u64::coerce("18446744073709551615").unwrap(), u64::MAX);
        assert!(u64::coerce("18446744073709551616").is_err());
    }

    #[test]
    fn test_strict_bool() {
        assert!(bool::coerce("true").unwrap());
        assert!(bool::coerce("T").unwrap());
        assert!(bool::coerce("1").unwrap());
        assert!(!bool::coerce("False").unwrap());
        assert!(bool::coerce("yes").is_err());
        assert!(bool::coerce("tRuE").is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(f64::coerce("1.5").unwrap(), 1.5);
        assert_eq!(f32::coerce("-2e3").unwrap(), -2000.0);
        assert!(f64::coerce("inf").unwrap().is_infinite());
        assert!(matches!(f32::coerce("1e40"), Err(CoerceError::OutOfRange { .. })));
        assert!(f64::coerce("one").is_err());
    }

    #[test]
    fn test_option_wraps_value() {
        assert_eq!(Option::<u16>::coerce("8080").unwrap(), Some(8080));
    }

    #[test]
    fn test_level() {
        assert_eq!(tracing::Level::coerce("debug").unwrap(), tracing::Level::DEBUG);
        assert!(tracing::Level::coerce("loud").is_err());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(
            short_type_name("alloc::vec::Vec<alloc::string::String>"),
            "Vec<String>"
        );
        assert_eq!(short_type_name("core::option::Option<u16>"), "Option<u16>");
        assert_eq!(String::type_name(), "String");
        assert_eq!(Duration::type_name(), "Duration");
        assert_eq!(HashMap::<String, i64>::type_name(), "HashMap<String, i64>");
    }
}
