#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! - Text nodes: `&`, `<`, `>` and carriage return
//! - Attribute values: `&`, `<`, `"`, tab, line feed and carriage return
//! - PI data: carriage return only

fn escape_with(s: &str, table: fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match table(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    out
}

fn text_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

fn attr_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '"' => Some("&quot;"),
        '\t' => Some("&#x9;"),
        '\n' => Some("&#xA;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

/// Escape text node content.
pub fn escape_text(s: &str) -> String {
    escape_with(s, text_entity)
}

/// Escape an attribute value.
pub fn escape_attr(s: &str) -> String {
    escape_with(s, attr_entity)
}

/// Escape processing instruction data.
pub fn escape_pi(s: &str) -> String {
    s.replace('\r', "&#xD;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("MPa"), "MPa");
        assert_eq!(escape_text("a&b<c>d"), "a&amp;b&lt;c&gt;d");
        assert_eq!(escape_text("line\rend"), "line&#xD;end");
        assert_eq!(escape_text("\"quoted\"\t"), "\"quoted\"\t");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("g/cm3"), "g/cm3");
        assert_eq!(escape_attr("a&b\"c>"), "a&amp;b&quot;c>");
        assert_eq!(escape_attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
    }

    #[test]
    fn test_escape_pi() {
        assert_eq!(escape_pi("href='a&b'\r"), "href='a&b'&#xD;");
    }
}
