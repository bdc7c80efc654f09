// common/src/cookies.rs
use std::collections::HashMap;

/// Cookie name to decoded value, as found in a single `Cookie` header
pub type CookieJar = HashMap<String, String>;

/// Parse a `Cookie` header into a jar.
///
/// Parsing is best effort: pairs without `=` or with an empty name are skipped, the
/// first occurrence of a name wins, and values that fail percent-decoding are kept raw.
pub fn parse_cookie_header(header: Option<&str>) -> CookieJar {
    let mut jar = CookieJar::new();

    let header = match header {
        Some(header) => header,
        None => return jar,
    };

    for pair in header.split(';') {
        let (name, value) = match pair.split_once('=') {
            Some(parts) => parts,
            None => continue,
        };

        let name = name.trim();
        if name.is_empty() || jar.contains_key(name) {
            continue;
        }

        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        jar.insert(name.to_string(), decode_value(value));
    }

    jar
}

fn decode_value(value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }

    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_pairs() {
        let jar = parse_cookie_header(Some("foo=bar; express.sid=s%3Aabc.def;theme=dark"));
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(jar.get("express.sid").map(String::as_str), Some("s:abc.def"));
        assert_eq!(jar.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_absent_header_is_empty_jar() {
        assert!(parse_cookie_header(None).is_empty());
        assert!(parse_cookie_header(Some("")).is_empty());
    }

    #[test]
    fn test_malformed_pairs_are_dropped() {
        let jar = parse_cookie_header(Some("novalue; =orphan; good=1;;  spaced  =  two words  "));
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("good").map(String::as_str), Some("1"));
        assert_eq!(jar.get("spaced").map(String::as_str), Some("two words"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let jar = parse_cookie_header(Some("sid=first; sid=second"));
        assert_eq!(jar.get("sid").map(String::as_str), Some("first"));
    }

    #[test]
    fn test_quoted_values_and_bad_encoding() {
        let jar = parse_cookie_header(Some("q=\"quoted%20value\"; bad=%E0%A4%A"));
        assert_eq!(jar.get("q").map(String::as_str), Some("quoted value"));
        // Value that doesn't decode to UTF-8 is kept as sent
        assert_eq!(jar.get("bad").map(String::as_str), Some("%E0%A4%A"));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let jar = parse_cookie_header(Some("token=a=b=c"));
        assert_eq!(jar.get("token").map(String::as_str), Some("a=b=c"));
    }
}
