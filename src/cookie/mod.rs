//! `visited` cookie handling
//!
//! The request `Cookie` header is tokenized into `key=value` pairs separated by
//! `;`. Every value is expected to be a JSON literal, which is how the
//! `visited` marker is written back: `visited=["first-post","second-post"]`.
//!
//! Post ids are opaque, so the encoder writes any character a browser would
//! mangle inside a cookie value (`;`, `,`, whitespace, quotes, non-ASCII) as a
//! JSON `\uXXXX` escape. The resulting value is plain ASCII and decodes back
//! to the same ids.

use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use thiserror::Error;
use tracing::warn;

use crate::models::{PostId, VisitedSet};

/// Name of the cookie carrying the visited set
pub const VISITED_COOKIE: &str = "visited";

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie '{key}' has no value")]
    MissingValue { key: String },
    #[error("cookie '{key}' is not valid JSON: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cookie 'visited' must be a JSON array of strings")]
    InvalidVisited,
    #[error("cookie header is not valid UTF-8")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

/// Decoded cookies of a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieJar {
    values: HashMap<String, Value>,
}

impl CookieJar {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The visitor's visited set, if the cookie was sent.
    pub fn visited(&self) -> Result<Option<VisitedSet>, CookieError> {
        let Some(value) = self.values.get(VISITED_COOKIE) else {
            return Ok(None);
        };

        let Value::Array(items) = value else {
            return Err(CookieError::InvalidVisited);
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(id) => Ok(PostId::new(id.as_str())),
                _ => Err(CookieError::InvalidVisited),
            })
            .collect::<Result<VisitedSet, _>>()
            .map(Some)
    }
}

/// Parse a raw `Cookie` header.
///
/// Returns `Ok(None)` when the request carried no cookie header at all. A pair
/// without `=` or a value that is not valid JSON fails the whole parse.
pub fn parse(header: Option<&str>) -> Result<Option<CookieJar>, CookieError> {
    let Some(header) = header else {
        return Ok(None);
    };

    let mut values = HashMap::new();
    for pair in header.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let Some((key, raw)) = pair.split_once('=') else {
            warn!(cookie = %pair, "cookie pair has no value");
            return Err(CookieError::MissingValue {
                key: pair.to_string(),
            });
        };

        let key = key.trim().to_string();
        let value = serde_json::from_str(raw.trim()).map_err(|source| {
            CookieError::InvalidValue {
                key: key.clone(),
                source,
            }
        })?;
        values.insert(key, value);
    }

    Ok(Some(CookieJar { values }))
}

/// Decode raw `Cookie` header bytes. Clients may send UTF-8 cookie values
/// written before ids were escaped, so only invalid UTF-8 is rejected.
pub fn decode_header(bytes: &[u8]) -> Result<&str, CookieError> {
    std::str::from_utf8(bytes).map_err(|e| {
        warn!(error = %e, "cookie header is not valid UTF-8");
        CookieError::from(e)
    })
}

/// `Set-Cookie` value for the given visited set. No attributes are added, so the
/// browser treats it as a session cookie.
pub fn build_set_cookie_header(visited: &VisitedSet) -> String {
    let ids: Vec<&str> = visited.iter().map(PostId::as_str).collect();

    let mut json = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut json, CookieSafeFormatter);
    // writing a slice of &str into a Vec cannot fail
    let json = match ids.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(json).unwrap_or_else(|_| "[]".to_string()),
        Err(_) => "[]".to_string(),
    };
    format!("{VISITED_COOKIE}={json}")
}

/// Compact JSON that stays inside the cookie-value character set for string
/// contents.
struct CookieSafeFormatter;

fn is_cookie_safe(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, ';' | ',' | '"' | '\\')
}

fn write_unicode_escape<W: ?Sized + io::Write>(writer: &mut W, c: char) -> io::Result<()> {
    let mut units = [0u16; 2];
    for unit in c.encode_utf16(&mut units) {
        write!(writer, "\\u{:04x}", unit)?;
    }
    Ok(())
}

impl Formatter for CookieSafeFormatter {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if is_cookie_safe(c) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            write_unicode_escape(writer, c)?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        char_escape: CharEscape,
    ) -> io::Result<()> {
        let c = match char_escape {
            CharEscape::Quote => '"',
            CharEscape::ReverseSolidus => '\\',
            CharEscape::Solidus => '/',
            CharEscape::Backspace => '\u{8}',
            CharEscape::FormFeed => '\u{c}',
            CharEscape::LineFeed => '\n',
            CharEscape::CarriageReturn => '\r',
            CharEscape::Tab => '\t',
            CharEscape::AsciiControl(byte) => char::from(byte),
        };
        write_unicode_escape(writer, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &VisitedSet) -> Vec<&str> {
        set.iter().map(PostId::as_str).collect()
    }

    #[test]
    fn test_no_header_yields_none() {
        assert!(parse(None).unwrap().is_none());
    }

    #[test]
    fn test_parse_visited_array() {
        let jar = parse(Some(r#"visited=["a","b"]"#)).unwrap().unwrap();
        let visited = jar.visited().unwrap().unwrap();
        assert_eq!(ids(&visited), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_multiple_json_values() {
        let jar = parse(Some(r#"theme="dark"; count=3; visited=["x"]"#))
            .unwrap()
            .unwrap();
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("theme"), Some(&Value::String("dark".to_string())));
        assert_eq!(jar.get("count"), Some(&Value::from(3)));
        assert!(jar.visited().unwrap().unwrap().contains(&PostId::new("x")));
    }

    #[test]
    fn test_trailing_separator_is_ignored() {
        let jar = parse(Some(r#"visited=["a"];"#)).unwrap().unwrap();
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_pair_without_value_fails() {
        let err = parse(Some(r#"visited=["a"]; dangling"#)).unwrap_err();
        assert!(matches!(err, CookieError::MissingValue { ref key } if key == "dangling"));
    }

    #[test]
    fn test_malformed_json_fails_whole_parse() {
        let err = parse(Some(r#"visited=["a","b"]; session=abc123"#)).unwrap_err();
        assert!(matches!(err, CookieError::InvalidValue { ref key, .. } if key == "session"));
    }

    #[test]
    fn test_jar_without_visited() {
        let jar = parse(Some("count=1")).unwrap().unwrap();
        assert!(jar.visited().unwrap().is_none());
    }

    #[test]
    fn test_visited_must_be_string_array() {
        let jar = parse(Some("visited=5")).unwrap().unwrap();
        assert!(matches!(jar.visited(), Err(CookieError::InvalidVisited)));

        let jar = parse(Some("visited=[1,2]")).unwrap().unwrap();
        assert!(matches!(jar.visited(), Err(CookieError::InvalidVisited)));
    }

    #[test]
    fn test_duplicate_entries_collapse() {
        let jar = parse(Some(r#"visited=["a","a","b"]"#)).unwrap().unwrap();
        assert_eq!(jar.visited().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_set_cookie_header_format() {
        let set: VisitedSet = ["c"].into_iter().map(PostId::new).collect();
        assert_eq!(build_set_cookie_header(&set), r#"visited=["c"]"#);
        assert_eq!(build_set_cookie_header(&VisitedSet::new()), "visited=[]");
    }

    fn visited_of(header: &str) -> VisitedSet {
        parse(Some(header)).unwrap().unwrap().visited().unwrap().unwrap()
    }

    #[test]
    fn test_unsafe_ids_are_escaped_to_ascii() {
        let set: VisitedSet = ["a;b", "café", "two words", r#"q"uote"#, "x,y", "😀"]
            .into_iter()
            .map(PostId::new)
            .collect();

        let header = build_set_cookie_header(&set);
        let value = header.strip_prefix("visited=").unwrap();
        assert!(header.is_ascii(), "non-ASCII in {header}");
        assert!(!header.contains(';'), "separator in {header}");
        assert!(!header.chars().any(char::is_whitespace), "whitespace in {header}");
        assert_eq!(value.matches('"').count(), 12);
        assert!(header.contains(r"caf\u00e9"));
        assert!(header.contains(r"\ud83d\ude00"));

        assert_eq!(visited_of(&header), set);
    }

    #[test]
    fn test_escaped_cookie_survives_browser_truncation() {
        let set: VisitedSet = ["a;b", "other"].into_iter().map(PostId::new).collect();
        let header = build_set_cookie_header(&set);

        // A browser keeps the cookie value up to the first ';'
        let stored = header.split(';').next().unwrap();
        assert_eq!(stored, header);
        assert_eq!(visited_of(stored), set);
    }

    #[test]
    fn test_decode_header_accepts_raw_utf8() {
        let raw = r#"visited=["café"]"#.as_bytes();
        let header = decode_header(raw).unwrap();
        assert!(visited_of(header).contains(&PostId::new("café")));

        assert!(matches!(
            decode_header(&[b'v', b'=', 0xff]),
            Err(CookieError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_visited_survives_decode_encode_decode() {
        let header = r#"visited=["first-post","second-post","third"]"#;
        let original = parse(Some(header)).unwrap().unwrap().visited().unwrap().unwrap();

        let encoded = build_set_cookie_header(&original);
        let decoded = parse(Some(&encoded)).unwrap().unwrap().visited().unwrap().unwrap();

        assert_eq!(original, decoded);
        assert_eq!(encoded, header);
    }
}
