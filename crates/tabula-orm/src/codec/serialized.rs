//! Reader for the legacy length-prefixed serialization format.
//!
//! Older rows store compound values as `a:2:{i:0;s:3:"red";i:1;s:4:"blue";}`.
//! Only scalars and arrays are understood; anything else (object records,
//! references) is rejected and the caller keeps the raw string.

use serde_json::{Map, Number, Value};

/// Deepest array nesting accepted before the input is treated as malformed.
const MAX_DEPTH: usize = 128;

/// Parses a complete serialized value.
///
/// Returns `None` when the input is not well formed or has trailing bytes.
pub(crate) fn parse(input: &str) -> Option<Value> {
    let mut reader = Reader {
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = reader.value()?;
    (reader.pos == reader.bytes.len()).then_some(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

enum Key {
    Index(i64),
    Name(String),
}

impl Reader<'_> {
    fn value(&mut self) -> Option<Value> {
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                match raw {
                    "0" => Some(Value::Bool(false)),
                    "1" => Some(Value::Bool(true)),
                    _ => None,
                }
            }
            b'i' => {
                self.expect(b':')?;
                let n: i64 = self.until(b';')?.parse().ok()?;
                Some(Value::from(n))
            }
            b'd' => {
                self.expect(b':')?;
                let f: f64 = self.until(b';')?.parse().ok()?;
                Some(Number::from_f64(f).map_or(Value::Null, Value::Number))
            }
            b's' => {
                self.expect(b':')?;
                let s = self.string_body()?;
                self.expect(b';')?;
                Some(Value::String(s))
            }
            b'a' => self.array(),
            _ => None,
        }
    }

    fn array(&mut self) -> Option<Value> {
        self.expect(b':')?;
        let count: usize = self.until(b':')?.parse().ok()?;
        self.expect(b'{')?;
        if self.depth >= MAX_DEPTH {
            return None;
        }

        // The declared count is untrusted; every entry takes at least four bytes.
        let remaining = self.bytes.len() - self.pos;
        let mut entries = Vec::with_capacity(count.min(remaining / 4));
        self.depth += 1;
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.depth -= 1;
        self.expect(b'}')?;

        let sequential = entries
            .iter()
            .enumerate()
            .all(|(i, (key, _))| matches!(key, Key::Index(n) if usize::try_from(*n) == Ok(i)));

        if sequential {
            Some(Value::Array(entries.into_iter().map(|(_, v)| v).collect()))
        } else {
            let map: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| match key {
                    Key::Index(n) => (n.to_string(), value),
                    Key::Name(name) => (name, value),
                })
                .collect();
            Some(Value::Object(map))
        }
    }

    fn key(&mut self) -> Option<Key> {
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Some(Key::Index(self.until(b';')?.parse().ok()?))
            }
            b's' => {
                self.expect(b':')?;
                let name = self.string_body()?;
                self.expect(b';')?;
                Some(Key::Name(name))
            }
            _ => None,
        }
    }

    /// Reads `len:"bytes"`, where `len` counts bytes rather than characters.
    fn string_body(&mut self) -> Option<String> {
        let len: usize = self.until(b':')?.parse().ok()?;
        self.expect(b'"')?;
        let end = self.pos.checked_add(len)?;
        let raw = self.bytes.get(self.pos..end)?;
        let s = std::str::from_utf8(raw).ok()?.to_string();
        self.pos = end;
        self.expect(b'"')?;
        Some(s)
    }

    fn next(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        (self.next()? == byte).then_some(())
    }

    /// Returns the text up to `stop` and consumes the terminator.
    fn until(&mut self, stop: u8) -> Option<&str> {
        let rest = self.bytes.get(self.pos..)?;
        let len = rest.iter().position(|b| *b == stop)?;
        let text = std::str::from_utf8(&rest[..len]).ok()?;
        self.pos += len + 1;
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(parse("N;"), Some(Value::Null));
        assert_eq!(parse("b:1;"), Some(json!(true)));
        assert_eq!(parse("i:-12;"), Some(json!(-12)));
        assert_eq!(parse("d:1.5;"), Some(json!(1.5)));
        assert_eq!(parse(r#"s:5:"hello";"#), Some(json!("hello")));
    }

    #[test]
    fn test_string_length_counts_bytes() {
        assert_eq!(parse(r#"s:5:"héllo";"#), None);
        assert_eq!(parse(r#"s:6:"héllo";"#), Some(json!("héllo")));
    }

    #[test]
    fn test_list_and_map() {
        assert_eq!(
            parse(r#"a:2:{i:0;s:3:"red";i:1;s:4:"blue";}"#),
            Some(json!(["red", "blue"]))
        );
        assert_eq!(
            parse(r#"a:2:{s:5:"color";s:3:"red";s:4:"tags";a:1:{i:0;i:7;}}"#),
            Some(json!({"color": "red", "tags": [7]}))
        );
        assert_eq!(
            parse(r#"a:1:{i:3;s:1:"x";}"#),
            Some(json!({"3": "x"}))
        );
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(parse("hello"), None);
        assert_eq!(parse("i:1"), None);
        assert_eq!(parse("i:1;extra"), None);
        assert_eq!(parse(r#"a:2:{i:0;s:3:"red";}"#), None);
        assert_eq!(parse(r#"O:8:"stdClass":0:{}"#), None);
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        assert_eq!(parse("a:99999999999999999:{}"), None);
        assert_eq!(parse("a:100000000:{"), None);
        assert_eq!(parse("a:18446744073709551615:{i:0;N;}"), None);
    }

    fn nested(depth: usize) -> String {
        let mut s = "a:1:{i:0;".repeat(depth);
        s.push_str("N;");
        s.push_str(&"}".repeat(depth));
        s
    }

    #[test]
    fn test_nesting_limit() {
        let mut expected = Value::Null;
        for _ in 0..MAX_DEPTH {
            expected = Value::Array(vec![expected]);
        }
        assert_eq!(parse(&nested(MAX_DEPTH)), Some(expected));
        assert_eq!(parse(&nested(MAX_DEPTH + 1)), None);
        assert_eq!(parse(&nested(200_000)), None);
    }
}
