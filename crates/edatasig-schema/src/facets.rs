#![forbid(unsafe_code)]

//! Simple-type value checking: built-in lexical space plus constraining facets.

use std::cmp::Ordering;

use crate::builtin::{self, Family, Whitespace};
use crate::model::{ComplexType, Content, Facets, Schema, SimpleType, TypeDef, TypeRef, Variety};

const MAX_DERIVATION_DEPTH: usize = 32;

/// Check `raw` against a simple type, or a complex type with simple content.
///
/// Returns the local name of the built-in type at the root of the derivation,
/// so callers can track `ID`/`IDREF` values. Facets that cannot be evaluated
/// push a message into `warnings` and are treated as satisfied.
pub(crate) fn check_value(
    schema: &Schema,
    ty: &TypeRef,
    raw: &str,
    warnings: &mut Vec<String>,
) -> Result<String, String> {
    check_ref(schema, ty, raw, warnings, 0)
}

fn check_ref(
    schema: &Schema,
    ty: &TypeRef,
    raw: &str,
    warnings: &mut Vec<String>,
    depth: usize,
) -> Result<String, String> {
    if depth > MAX_DERIVATION_DEPTH {
        return Err("The type derivation is too deep.".into());
    }
    match ty {
        TypeRef::Named(q) if q.is_xsd() => {
            let value = builtin::whitespace(&q.local).apply(raw);
            builtin::check(&q.local, &value)?;
            Ok(q.local.clone())
        }
        TypeRef::Named(q) => match schema.type_def(q) {
            Some(def) => check_def(schema, def, raw, warnings, depth + 1),
            None => Err(format!("The type {q} is not declared.")),
        },
        TypeRef::Inline(def) => check_def(schema, def, raw, warnings, depth + 1),
    }
}

fn check_def(
    schema: &Schema,
    def: &TypeDef,
    raw: &str,
    warnings: &mut Vec<String>,
    depth: usize,
) -> Result<String, String> {
    match def {
        TypeDef::Simple(st) => check_simple(schema, st, raw, warnings, depth),
        TypeDef::Complex(ComplexType {
            content: Content::Simple(inner),
            ..
        }) => check_ref(schema, inner, raw, warnings, depth + 1),
        TypeDef::Complex(_) => Err("The type does not have simple content.".into()),
    }
}

fn check_simple(
    schema: &Schema,
    st: &SimpleType,
    raw: &str,
    warnings: &mut Vec<String>,
    depth: usize,
) -> Result<String, String> {
    match &st.variety {
        Variety::Atomic(base) => {
            let root = check_ref(schema, base, raw, warnings, depth + 1)?;
            let value = builtin::whitespace(&root).apply(raw);
            let length = value_length(&root, &value);
            apply_facets(&st.facets, &value, builtin::family(&root), length, warnings)?;
            Ok(root)
        }
        Variety::List(item) => {
            let value = Whitespace::Collapse.apply(raw);
            let mut root = String::from("anySimpleType");
            let mut count = 0;
            for token in value.split(' ').filter(|t| !t.is_empty()) {
                root = check_ref(schema, item, token, warnings, depth + 1)?;
                count += 1;
            }
            apply_facets(&st.facets, &value, Family::Other, count, warnings)?;
            Ok(if root == "IDREF" { "IDREFS".into() } else { "anySimpleType".into() })
        }
        Variety::Union(members) => {
            for member in members {
                let mut member_warnings = Vec::new();
                if let Ok(root) = check_ref(schema, member, raw, &mut member_warnings, depth + 1) {
                    warnings.extend(member_warnings);
                    let value = Whitespace::Collapse.apply(raw);
                    let length = value.chars().count();
                    apply_facets(&st.facets, &value, Family::Other, length, warnings)?;
                    return Ok(root);
                }
            }
            Err("The value is not valid for any member type of the union.".into())
        }
    }
}

/// Length in the unit the `length` facets use for this type.
fn value_length(root: &str, value: &str) -> usize {
    match root {
        "hexBinary" => value.len() / 2,
        "base64Binary" => {
            let chars = value.chars().filter(|c| !c.is_whitespace()).count();
            let padding = value.chars().rev().take_while(|c| *c == '=').count();
            ((chars / 4) * 3).saturating_sub(padding.min(2))
        }
        _ => value.chars().count(),
    }
}

fn apply_facets(
    facets: &Facets,
    value: &str,
    family: Family,
    length: usize,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if facets.is_empty() {
        return Ok(());
    }
    if !facets.enumeration.is_empty() && !facets.enumeration.iter().any(|e| e == value) {
        return Err("The Enumeration constraint failed.".into());
    }
    if !facets.patterns.is_empty() {
        let mut matched = false;
        for pattern in &facets.patterns {
            match &pattern.regex {
                Some(regex) => matched |= regex.is_match(value),
                None => {
                    warnings.push(format!(
                        "The pattern '{}' cannot be evaluated and was not checked.",
                        pattern.source
                    ));
                    matched = true;
                }
            }
        }
        if !matched {
            return Err("The Pattern constraint failed.".into());
        }
    }
    if facets.length.is_some_and(|l| length != l) {
        return Err("The actual length is not equal to the specified length.".into());
    }
    if facets.min_length.is_some_and(|l| length < l) {
        return Err("The actual length is less than the MinLength value.".into());
    }
    if facets.max_length.is_some_and(|l| length > l) {
        return Err("The actual length is greater than the MaxLength value.".into());
    }

    let bounds: [(&Option<String>, &[Ordering], &str); 4] = [
        (&facets.min_inclusive, &[Ordering::Greater, Ordering::Equal], "MinInclusive"),
        (&facets.max_inclusive, &[Ordering::Less, Ordering::Equal], "MaxInclusive"),
        (&facets.min_exclusive, &[Ordering::Greater], "MinExclusive"),
        (&facets.max_exclusive, &[Ordering::Less], "MaxExclusive"),
    ];
    for (bound, allowed, name) in bounds {
        let Some(bound) = bound else { continue };
        match compare(family, value, bound) {
            Some(ord) if allowed.contains(&ord) => {}
            Some(_) => return Err(format!("The {name} constraint failed.")),
            None => warnings.push(format!(
                "The {name} facet '{bound}' cannot be evaluated and was not checked."
            )),
        }
    }

    if facets.total_digits.is_some() || facets.fraction_digits.is_some() {
        match split_decimal(value) {
            Some(d) => {
                if facets.total_digits.is_some_and(|t| d.int.len() + d.frac.len() > t) {
                    return Err("The TotalDigits constraint failed.".into());
                }
                if facets.fraction_digits.is_some_and(|f| d.frac.len() > f) {
                    return Err("The FractionDigits constraint failed.".into());
                }
            }
            None => warnings.push("The digit facets apply to decimal values only.".into()),
        }
    }
    Ok(())
}

fn compare(family: Family, value: &str, bound: &str) -> Option<Ordering> {
    match family {
        Family::Decimal => compare_decimal(value, bound),
        Family::Float => {
            let a: f64 = value.parse().ok()?;
            let b: f64 = bound.parse().ok()?;
            a.partial_cmp(&b)
        }
        // Same-format lexical values order chronologically.
        Family::DateTime if value.len() == bound.len() => Some(value.cmp(bound)),
        _ => None,
    }
}

/// Decimal split into sign, integer digits without leading zeros and fraction
/// digits without trailing zeros.
struct DecimalParts<'a> {
    negative: bool,
    int: &'a str,
    frac: &'a str,
}

fn split_decimal(value: &str) -> Option<DecimalParts<'_>> {
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(DecimalParts {
        negative,
        int: int.trim_start_matches('0'),
        frac: frac.trim_end_matches('0'),
    })
}

fn compare_decimal(a: &str, b: &str) -> Option<Ordering> {
    let a = split_decimal(a)?;
    let b = split_decimal(b)?;
    let a_zero = a.int.is_empty() && a.frac.is_empty();
    let b_zero = b.int.is_empty() && b.frac.is_empty();
    let a_neg = a.negative && !a_zero;
    let b_neg = b.negative && !b_zero;
    if a_neg != b_neg {
        return Some(if a_neg { Ordering::Less } else { Ordering::Greater });
    }
    let magnitude = a
        .int
        .len()
        .cmp(&b.int.len())
        .then_with(|| a.int.cmp(b.int))
        .then_with(|| a.frac.cmp(b.frac));
    Some(if a_neg { magnitude.reverse() } else { magnitude })
}
