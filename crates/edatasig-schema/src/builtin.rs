#![forbid(unsafe_code)]

//! Built-in XML Schema datatypes: lexical checks and whitespace handling.

use std::sync::OnceLock;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Whitespace handling applied before a value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whitespace {
    Preserve,
    Replace,
    Collapse,
}

impl Whitespace {
    pub fn apply(self, value: &str) -> String {
        match self {
            Whitespace::Preserve => value.to_owned(),
            Whitespace::Replace => value
                .chars()
                .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
                .collect(),
            Whitespace::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Numeric family of a built-in type, used by range facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    String,
    Decimal,
    Float,
    DateTime,
    Other,
}

/// Integer subtypes with their inclusive bounds.
const INTEGER_BOUNDS: &[(&str, Option<i128>, Option<i128>)] = &[
    ("integer", None, None),
    ("nonPositiveInteger", None, Some(0)),
    ("negativeInteger", None, Some(-1)),
    ("nonNegativeInteger", Some(0), None),
    ("positiveInteger", Some(1), None),
    ("long", Some(i64::MIN as i128), Some(i64::MAX as i128)),
    ("int", Some(i32::MIN as i128), Some(i32::MAX as i128)),
    ("short", Some(i16::MIN as i128), Some(i16::MAX as i128)),
    ("byte", Some(i8::MIN as i128), Some(i8::MAX as i128)),
    ("unsignedLong", Some(0), Some(u64::MAX as i128)),
    ("unsignedInt", Some(0), Some(u32::MAX as i128)),
    ("unsignedShort", Some(0), Some(u16::MAX as i128)),
    ("unsignedByte", Some(0), Some(u8::MAX as i128)),
];

const STRING_TYPES: &[&str] = &[
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "ID",
    "IDREF",
    "IDREFS",
    "ENTITY",
    "ENTITIES",
    "NMTOKEN",
    "NMTOKENS",
    "QName",
    "NOTATION",
    "anyURI",
];

const OTHER_TYPES: &[&str] = &[
    "anyType",
    "anySimpleType",
    "boolean",
    "decimal",
    "float",
    "double",
    "duration",
    "dateTime",
    "date",
    "time",
    "gYear",
    "gYearMonth",
    "gMonth",
    "gMonthDay",
    "gDay",
    "base64Binary",
    "hexBinary",
];

/// Whether `local` names a supported built-in type in the XSD namespace.
pub fn is_builtin(local: &str) -> bool {
    STRING_TYPES.contains(&local)
        || OTHER_TYPES.contains(&local)
        || INTEGER_BOUNDS.iter().any(|(n, _, _)| *n == local)
}

pub fn whitespace(local: &str) -> Whitespace {
    match local {
        "string" | "anySimpleType" | "anyType" => Whitespace::Preserve,
        "normalizedString" => Whitespace::Replace,
        _ => Whitespace::Collapse,
    }
}

pub fn family(local: &str) -> Family {
    match local {
        "decimal" => Family::Decimal,
        "float" | "double" => Family::Float,
        "dateTime" | "date" | "time" | "gYear" | "gYearMonth" => Family::DateTime,
        _ if INTEGER_BOUNDS.iter().any(|(n, _, _)| *n == local) => Family::Decimal,
        _ if STRING_TYPES.contains(&local) => Family::String,
        _ => Family::Other,
    }
}

/// Whether the type is, or derives from, `xs:ID`.
pub fn is_id(local: &str) -> bool {
    local == "ID"
}

pub fn is_idref(local: &str) -> bool {
    matches!(local, "IDREF" | "IDREFS")
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|_| never_matches()))
}

fn never_matches() -> Regex {
    // `[^\s\S]` matches nothing; it always compiles.
    Regex::new(r"[^\s\S]").unwrap_or_else(|_| unreachable!())
}

macro_rules! lexical {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            re(&CELL, $pattern)
        }
    };
}

lexical!(ncname_re, r"^[\p{L}_][\p{L}\p{N}._\-\x{B7}]*$");
lexical!(name_re, r"^[\p{L}_:][\p{L}\p{N}._:\-\x{B7}]*$");
lexical!(nmtoken_re, r"^[\p{L}\p{N}._:\-\x{B7}]+$");
lexical!(qname_re, r"^([\p{L}_][\p{L}\p{N}._\-\x{B7}]*:)?[\p{L}_][\p{L}\p{N}._\-\x{B7}]*$");
lexical!(language_re, r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$");
lexical!(decimal_re, r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$");
lexical!(integer_re, r"^[+-]?[0-9]+$");
lexical!(float_re, r"^([+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?|INF|-INF|NaN)$");
lexical!(duration_re, r"^-?P([0-9]+Y)?([0-9]+M)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$");
lexical!(tz_re, r"(Z|[+-]([0-9]{2}):([0-9]{2}))$");
lexical!(year_re, r"^-?[0-9]{4,}$");
lexical!(year_month_re, r"^-?[0-9]{4,}-[0-9]{2}$");
lexical!(month_re, r"^--[0-9]{2}$");
lexical!(month_day_re, r"^--[0-9]{2}-[0-9]{2}$");
lexical!(day_re, r"^---[0-9]{2}$");
lexical!(date_re, r"^[0-9]{4,}-[0-9]{2}-[0-9]{2}$");
lexical!(time_re, r"^[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?$");
lexical!(date_time_re, r"^[0-9]{4,}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?$");
lexical!(hex_re, r"^([0-9a-fA-F]{2})*$");

/// Split an optional timezone suffix off a date/time value.
fn strip_timezone(value: &str) -> Result<&str, String> {
    match tz_re().captures(value) {
        Some(caps) => {
            if let (Some(h), Some(m)) = (caps.get(2), caps.get(3)) {
                let h: u32 = h.as_str().parse().unwrap_or(99);
                let m: u32 = m.as_str().parse().unwrap_or(99);
                if h > 14 || m > 59 || (h == 14 && m > 0) {
                    return Err("The timezone offset is out of range.".into());
                }
            }
            let start = caps.get(0).map(|m| m.start()).unwrap_or(value.len());
            Ok(&value[..start])
        }
        None => Ok(value),
    }
}

fn check_date(value: &str) -> Result<(), String> {
    if !date_re().is_match(value) {
        return Err("The string is not a valid Date value.".into());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| "The string is not a valid Date value.".into())
}

fn check_time(value: &str) -> Result<(), String> {
    if !time_re().is_match(value) {
        return Err("The string is not a valid Time value.".into());
    }
    // 24:00:00 is allowed as end of day.
    if value.starts_with("24:00:00") && value[8..].chars().all(|c| c == '.' || c == '0') {
        return Ok(());
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .map(|_| ())
        .map_err(|_| "The string is not a valid Time value.".into())
}

fn check_date_time(value: &str) -> Result<(), String> {
    if !date_time_re().is_match(value) {
        return Err("The string is not a valid DateTime value.".into());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|_| ())
        .map_err(|_| "The string is not a valid DateTime value.".into())
}

fn check_month(month: &str) -> Result<u32, String> {
    match month.parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err("The month is out of range.".into()),
    }
}

fn check_integer(local: &str, value: &str) -> Result<(), String> {
    if !integer_re().is_match(value) {
        return Err("The string is not a valid Integer value.".into());
    }
    let Some((_, min, max)) = INTEGER_BOUNDS.iter().find(|(n, _, _)| *n == local) else {
        return Ok(());
    };
    let parsed = value.trim_start_matches('+').parse::<i128>();
    let out_of_range = match parsed {
        Ok(v) => min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m),
        // Only unbounded types accept values beyond i128.
        Err(_) => min.is_some() || max.is_some(),
    };
    if out_of_range {
        return Err(format!("Value was either too large or too small for {local}."));
    }
    Ok(())
}

/// Check a whitespace-normalized value against a built-in type.
pub fn check(local: &str, value: &str) -> Result<(), String> {
    match local {
        "anyType" | "anySimpleType" | "string" | "normalizedString" | "anyURI" => Ok(()),
        "token" => Ok(()),
        "language" => ok_if(language_re().is_match(value), "The string is not a valid language value."),
        "Name" => ok_if(name_re().is_match(value), "The string is not a valid Name."),
        "NCName" | "ID" | "IDREF" | "ENTITY" => {
            ok_if(ncname_re().is_match(value), "The string is not a valid NCName.")
        }
        "IDREFS" | "ENTITIES" => ok_if(
            !value.is_empty() && value.split(' ').all(|v| ncname_re().is_match(v)),
            "The string is not a valid list of NCNames.",
        ),
        "NMTOKEN" => ok_if(nmtoken_re().is_match(value), "The string is not a valid NmToken."),
        "NMTOKENS" => ok_if(
            !value.is_empty() && value.split(' ').all(|v| nmtoken_re().is_match(v)),
            "The string is not a valid list of NmTokens.",
        ),
        "QName" | "NOTATION" => ok_if(qname_re().is_match(value), "The string is not a valid QName."),
        "boolean" => ok_if(
            matches!(value, "true" | "false" | "1" | "0"),
            "The string is not a valid Boolean value.",
        ),
        "decimal" => ok_if(decimal_re().is_match(value), "The string is not a valid Decimal value."),
        "float" | "double" => ok_if(float_re().is_match(value), "The string is not a valid Double value."),
        "duration" => ok_if(
            duration_re().is_match(value) && !value.ends_with('P') && !value.ends_with('T'),
            "The string is not a valid TimeSpan value.",
        ),
        "dateTime" => check_date_time(strip_timezone(value)?),
        "date" => check_date(strip_timezone(value)?),
        "time" => check_time(strip_timezone(value)?),
        "gYear" => ok_if(
            year_re().is_match(strip_timezone(value)?),
            "The string is not a valid GYear value.",
        ),
        "gYearMonth" => {
            let v = strip_timezone(value)?;
            if !year_month_re().is_match(v) {
                return Err("The string is not a valid GYearMonth value.".into());
            }
            check_month(&v[v.len() - 2..]).map(|_| ())
        }
        "gMonth" => {
            let v = strip_timezone(value)?;
            if !month_re().is_match(v) {
                return Err("The string is not a valid GMonth value.".into());
            }
            check_month(&v[2..4]).map(|_| ())
        }
        "gMonthDay" => {
            let v = strip_timezone(value)?;
            if !month_day_re().is_match(v) {
                return Err("The string is not a valid GMonthDay value.".into());
            }
            check_month(&v[2..4])?;
            // 2000 is a leap year, so --02-29 is accepted.
            check_date(&format!("2000-{}", &v[2..7]))
        }
        "gDay" => {
            let v = strip_timezone(value)?;
            let ok = day_re().is_match(v) && matches!(v[3..5].parse::<u32>(), Ok(1..=31));
            ok_if(ok, "The string is not a valid GDay value.")
        }
        "base64Binary" => {
            let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(|_| ())
                .map_err(|_| "The string is not a valid Base64Binary value.".into())
        }
        "hexBinary" => ok_if(hex_re().is_match(value), "The string is not a valid HexBinary value."),
        _ if INTEGER_BOUNDS.iter().any(|(n, _, _)| *n == local) => check_integer(local, value),
        _ => Err(format!("The datatype '{local}' is not supported.")),
    }
}

fn ok_if(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        assert_eq!(Whitespace::Collapse.apply("  a \n b  "), "a b");
        assert_eq!(Whitespace::Replace.apply("a\tb\n"), "a b ");
        assert_eq!(Whitespace::Preserve.apply(" x "), " x ");
    }

    #[test]
    fn test_decimal_and_integers() {
        assert!(check("decimal", "880").is_ok());
        assert!(check("decimal", "-4.43").is_ok());
        assert!(check("decimal", ".5").is_ok());
        assert!(check("decimal", "1e3").is_err());
        assert!(check("decimal", "abc").is_err());
        assert!(check("int", "2147483648").is_err());
        assert!(check("unsignedByte", "255").is_ok());
        assert!(check("positiveInteger", "0").is_err());
        assert!(check("integer", "123456789012345678901234567890123456789012").is_ok());
    }

    #[test]
    fn test_dates() {
        assert!(check("dateTime", "2016-03-04T08:00:00+01:00").is_ok());
        assert!(check("dateTime", "2016-03-01T10:15:00Z").is_ok());
        assert!(check("dateTime", "2016-03-01T10:15:00.125").is_ok());
        assert!(check("dateTime", "2016-02-30T10:15:00Z").is_err());
        assert!(check("dateTime", "2016-03-01 10:15:00").is_err());
        assert!(check("dateTime", "2016-03-01T10:15:00+15:00").is_err());
        assert!(check("date", "2016-02-29").is_ok());
        assert!(check("date", "2015-02-29").is_err());
        assert!(check("time", "23:59:59").is_ok());
        assert!(check("time", "25:00:00").is_err());
        assert!(check("gYear", "2016").is_ok());
        assert!(check("gYearMonth", "2016-13").is_err());
        assert!(check("gMonthDay", "--02-29").is_ok());
        assert!(check("gDay", "---32").is_err());
    }

    #[test]
    fn test_digits_are_ascii_only() {
        assert!(check("decimal", "\u{96e}\u{96e}\u{966}").is_err());
        assert!(check("integer", "\u{661}\u{662}").is_err());
        assert!(check("double", "\u{96e}.5").is_err());
        assert!(check("gDay", "---\u{967}\u{968}").is_err());
        assert!(check("gMonth", "--\u{967}\u{968}").is_err());
        assert!(check("gMonthDay", "--\u{967}\u{968}-01").is_err());
        assert!(check("gYearMonth", "2016-\u{967}\u{968}").is_err());
        assert!(check("dateTime", "2016-03-01T10:15:00+\u{966}\u{967}:00").is_err());
    }

    #[test]
    fn test_names() {
        assert!(check("ID", "m1").is_ok());
        assert!(check("ID", "1m").is_err());
        assert!(check("NMTOKEN", "1m").is_ok());
        assert!(check("QName", "x:y").is_ok());
        assert!(check("QName", "x:y:z").is_err());
        assert!(check("language", "en-US").is_ok());
    }

    #[test]
    fn test_binary_and_boolean() {
        assert!(check("boolean", "true").is_ok());
        assert!(check("boolean", "yes").is_err());
        assert!(check("hexBinary", "0aFF").is_ok());
        assert!(check("hexBinary", "0aF").is_err());
        assert!(check("base64Binary", "AQID\nBA==").is_ok());
        assert!(check("base64Binary", "***").is_err());
        assert!(check("duration", "P1Y2MT3H").is_ok());
        assert!(check("duration", "P").is_err());
    }

    #[test]
    fn test_builtin_table() {
        assert!(is_builtin("token"));
        assert!(is_builtin("unsignedShort"));
        assert!(!is_builtin("FileInformationType"));
        assert_eq!(family("int"), Family::Decimal);
        assert_eq!(whitespace("token"), Whitespace::Collapse);
    }
}
