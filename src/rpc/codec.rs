/*
 * ufa
 * Copyright (C) 2020 Henrique Teofilo
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

//! A tokenizer and parser for the JSON subset the RPC dialect needs: objects,
//! arrays, strings, booleans, null, and numbers (long vs. double discriminated
//! by the presence of a `.`). Deliberately not `serde_json` — the server needs
//! to tell "valid JSON but the buffer ended mid-token" apart from "garbage",
//! which a one-shot deserializer can't report without incremental support we
//! don't otherwise need.

use crate::rpc::value::JsonValue;
use std::collections::BTreeMap;

/// Token budget before giving up, mirroring a fixed-size tokenizer's token
/// array. Struct/array open, each key, and each scalar consumes one.
const MAX_TOKENS: i64 = 20_000;

/// A full JSON-RPC request or response record (§4.5).
#[derive(Debug, Clone, Default)]
pub struct JsonRpc {
    pub method: Option<String>,
    pub id: Option<String>,
    pub params: BTreeMap<String, JsonValue>,
    pub result: BTreeMap<String, JsonValue>,
    pub error: BTreeMap<String, JsonValue>,
}

impl JsonRpc {
    pub fn request(method: &str, id: &str, params: BTreeMap<String, JsonValue>) -> JsonValue {
        let mut map = BTreeMap::new();
        map.insert("jsonrpc".to_owned(), JsonValue::String("2.0".to_owned()));
        map.insert("method".to_owned(), JsonValue::String(method.to_owned()));
        map.insert("id".to_owned(), JsonValue::String(id.to_owned()));
        map.insert("params".to_owned(), JsonValue::Map(params));
        JsonValue::Map(map)
    }

    pub fn success(id: &str, value: JsonValue) -> JsonValue {
        let mut result = BTreeMap::new();
        result.insert("value".to_owned(), value);
        let mut map = BTreeMap::new();
        map.insert("jsonrpc".to_owned(), JsonValue::String("2.0".to_owned()));
        map.insert("id".to_owned(), JsonValue::String(id.to_owned()));
        map.insert("result".to_owned(), JsonValue::Map(result));
        JsonValue::Map(map)
    }

    pub fn error(id: &str, code: i64, message: &str) -> JsonValue {
        let mut error = BTreeMap::new();
        error.insert("code".to_owned(), JsonValue::Long(code));
        error.insert("message".to_owned(), JsonValue::String(message.to_owned()));
        let mut map = BTreeMap::new();
        map.insert("jsonrpc".to_owned(), JsonValue::String("2.0".to_owned()));
        map.insert("id".to_owned(), JsonValue::String(id.to_owned()));
        map.insert("error".to_owned(), JsonValue::Map(error));
        JsonValue::Map(map)
    }
}

/// Zero-terminates a serialized value for the wire, per the framing rule.
pub fn frame(value: &JsonValue) -> Vec<u8> {
    let mut out = value.to_json_string().into_bytes();
    out.push(0);
    out
}

#[derive(Debug)]
pub enum ParseOutcome {
    /// `consumed` is how many bytes of the input made up the parsed object;
    /// callers should discard them (and any framing terminator) before the
    /// next parse.
    Ok { value: JsonRpc, consumed: usize },
    Partial,
    Invalid,
    NoMem,
}

enum ParseErr {
    Partial,
    Invalid,
    NoMem,
}

/// Parses the leading JSON object out of `buf`. Bytes after the object
/// (including a framing zero byte, if present) are not consumed.
pub fn parse(buf: &[u8]) -> ParseOutcome {
    let mut parser = Parser {
        bytes: buf,
        pos: 0,
        budget: MAX_TOKENS,
    };
    match parser.parse_value() {
        Ok(JsonValue::Map(map)) => ParseOutcome::Ok {
            value: build_jsonrpc(map),
            consumed: parser.pos,
        },
        Ok(_) => ParseOutcome::Invalid,
        Err(ParseErr::Partial) => ParseOutcome::Partial,
        Err(ParseErr::Invalid) => ParseOutcome::Invalid,
        Err(ParseErr::NoMem) => ParseOutcome::NoMem,
    }
}

fn build_jsonrpc(mut map: BTreeMap<String, JsonValue>) -> JsonRpc {
    // top-level keys other than jsonrpc/method/id/params/result/error are skipped
    let method = map.remove("method").and_then(|v| v.as_str().ok().map(str::to_owned));
    let id = map.remove("id").and_then(|v| match v {
        JsonValue::String(s) => Some(s),
        JsonValue::Long(n) => Some(n.to_string()),
        _ => None,
    });
    let params = take_map(&mut map, "params");
    let result = take_map(&mut map, "result");
    let error = take_map(&mut map, "error");
    JsonRpc {
        method,
        id,
        params,
        result,
        error,
    }
}

fn take_map(map: &mut BTreeMap<String, JsonValue>, key: &str) -> BTreeMap<String, JsonValue> {
    match map.remove(key) {
        Some(JsonValue::Map(m)) => m,
        _ => BTreeMap::new(),
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    budget: i64,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_budget(&mut self) -> Result<(), ParseErr> {
        self.budget -= 1;
        if self.budget < 0 {
            Err(ParseErr::NoMem)
        } else {
            Ok(())
        }
    }

    fn parse_value(&mut self) -> Result<JsonValue, ParseErr> {
        self.skip_ws();
        self.take_budget()?;
        match self.peek() {
            None => Err(ParseErr::Partial),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string().map(JsonValue::String),
            Some(b't') => self.parse_literal(b"true", JsonValue::Bool(true)),
            Some(b'f') => self.parse_literal(b"false", JsonValue::Bool(false)),
            Some(b'n') => self.parse_literal(b"null", JsonValue::Null),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => Err(ParseErr::Invalid),
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue, ParseErr> {
        self.pos += 1; // consume '{'
        let mut map = BTreeMap::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(JsonValue::Map(map));
        }
        loop {
            self.skip_ws();
            self.take_budget()?;
            if self.peek() != Some(b'"') {
                return Err(match self.peek() {
                    None => ParseErr::Partial,
                    _ => ParseErr::Invalid,
                });
            }
            let key = self.parse_string()?;
            self.skip_ws();
            match self.peek() {
                Some(b':') => self.pos += 1,
                None => return Err(ParseErr::Partial),
                _ => return Err(ParseErr::Invalid),
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(ParseErr::Partial),
                _ => return Err(ParseErr::Invalid),
            }
        }
        Ok(JsonValue::Map(map))
    }

    fn parse_array(&mut self) -> Result<JsonValue, ParseErr> {
        self.pos += 1; // consume '['
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JsonValue::List(items));
        }
        loop {
            let value = self.parse_value()?;
            items.push(value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(ParseErr::Partial),
                _ => return Err(ParseErr::Invalid),
            }
        }
        Ok(JsonValue::List(items))
    }

    fn parse_string(&mut self) -> Result<String, ParseErr> {
        self.pos += 1; // consume opening quote
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(ParseErr::Partial),
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(ParseErr::Partial);
                    }
                    self.pos += 1;
                }
                Some(b'"') => {
                    let s = std::str::from_utf8(&self.bytes[start..self.pos])
                        .map_err(|_| ParseErr::Invalid)?
                        .to_owned();
                    self.pos += 1;
                    return Ok(s);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_literal(&mut self, lit: &[u8], value: JsonValue) -> Result<JsonValue, ParseErr> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < lit.len() {
            if self.bytes[self.pos..] == lit[..remaining] {
                return Err(ParseErr::Partial);
            }
            return Err(ParseErr::Invalid);
        }
        if &self.bytes[self.pos..self.pos + lit.len()] == lit {
            self.pos += lit.len();
            Ok(value)
        } else {
            Err(ParseErr::Invalid)
        }
    }

    fn parse_number(&mut self) -> Result<JsonValue, ParseErr> {
        let start = self.pos;
        let mut is_double = false;

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(if self.peek().is_none() {
                ParseErr::Partial
            } else {
                ParseErr::Invalid
            });
        }
        if self.peek() == Some(b'.') {
            is_double = true;
            self.pos += 1;
            let frac_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == frac_start {
                return Err(if self.peek().is_none() {
                    ParseErr::Partial
                } else {
                    ParseErr::Invalid
                });
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_double = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == exp_start {
                return Err(if self.peek().is_none() {
                    ParseErr::Partial
                } else {
                    ParseErr::Invalid
                });
            }
        }

        // if we ran off the end of the buffer while scanning digits, a
        // well-framed request could still have more digits coming.
        if self.pos == self.bytes.len() {
            return Err(ParseErr::Partial);
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| ParseErr::Invalid)?;
        if is_double {
            text.parse::<f64>()
                .map(JsonValue::Double)
                .map_err(|_| ParseErr::Invalid)
        } else {
            text.parse::<i64>()
                .map(JsonValue::Long)
                .map_err(|_| ParseErr::Invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> (JsonRpc, usize) {
        match parse(input.as_bytes()) {
            ParseOutcome::Ok { value, consumed } => (value, consumed),
            other => panic!("expected Ok, got {:?}", other),
        }
    }

    #[test]
    fn parses_full_request() {
        let input = r#"{"jsonrpc":"2.0","id":"x","method":"inserttag","params":{"repodir":"/tmp/r","tag":"t"}}"#;
        let (rpc, consumed) = parse_ok(input);
        assert_eq!(consumed, input.len());
        assert_eq!(rpc.method.as_deref(), Some("inserttag"));
        assert_eq!(rpc.id.as_deref(), Some("x"));
        assert_eq!(rpc.params.get("repodir").unwrap().as_str().unwrap(), "/tmp/r");
        assert_eq!(rpc.params.get("tag").unwrap().as_str().unwrap(), "t");
    }

    #[test]
    fn reports_partial_on_truncated_buffer() {
        let input = r#"{"jsonrpc":"2.0","id":"x","method":"list"#;
        assert!(matches!(parse(input.as_bytes()), ParseOutcome::Partial));
    }

    #[test]
    fn reports_invalid_on_bad_structure() {
        let input = r#"{"id": }"#;
        assert!(matches!(parse(input.as_bytes()), ParseOutcome::Invalid));
    }

    #[test]
    fn ignores_unknown_top_level_keys() {
        let input = r#"{"jsonrpc":"2.0","bogus":123,"id":"x"}"#;
        let (rpc, _) = parse_ok(input);
        assert_eq!(rpc.id.as_deref(), Some("x"));
    }

    #[test]
    fn stops_at_end_of_object_leaving_trailer() {
        let input = "{\"id\":\"x\"}\0garbage-next-request";
        match parse(input.as_bytes()) {
            ParseOutcome::Ok { consumed, .. } => assert_eq!(consumed, 10),
            other => panic!("expected Ok, got {:?}", other),
        }
    }

    #[test]
    fn round_trips_every_value_shape() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a".to_owned(), JsonValue::Long(-7));
        map.insert("b".to_owned(), JsonValue::Double(3.5));
        map.insert("c".to_owned(), JsonValue::Bool(false));
        map.insert("d".to_owned(), JsonValue::Null);
        map.insert(
            "e".to_owned(),
            JsonValue::List(vec![JsonValue::String("x".to_owned()), JsonValue::Long(1)]),
        );
        let value = JsonValue::Map(map);
        let text = value.to_json_string();
        match parse(text.as_bytes()) {
            ParseOutcome::Ok { value: rpc, .. } => {
                assert_eq!(rpc.params.get("a"), None); // top-level wasn't a jsonrpc envelope key
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
