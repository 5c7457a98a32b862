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

//! The heterogeneous value tree the wire codec parses into and serializes
//! from: `string | long | double | bool | null | map | list<value>`.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<JsonValue>),
    Map(BTreeMap<String, JsonValue>),
}

/// Typed-accessor failure: a value didn't have the shape the caller expected.
#[derive(Debug, Clone)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl JsonValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "bool",
            JsonValue::Long(_) => "long",
            JsonValue::Double(_) => "double",
            JsonValue::String(_) => "string",
            JsonValue::List(_) => "list",
            JsonValue::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            JsonValue::String(s) => Ok(s),
            other => Err(TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            JsonValue::Bool(b) => Ok(*b),
            other => Err(TypeMismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_long(&self) -> Result<i64, TypeMismatch> {
        match self {
            JsonValue::Long(n) => Ok(*n),
            other => Err(TypeMismatch {
                expected: "long",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&[JsonValue], TypeMismatch> {
        match self {
            JsonValue::List(l) => Ok(l),
            other => Err(TypeMismatch {
                expected: "list",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, JsonValue>, TypeMismatch> {
        match self {
            JsonValue::Map(m) => Ok(m),
            other => Err(TypeMismatch {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Serializes this value as JSON text. Strings are passed through as
    /// UTF-8 with only the minimal escaping a parser round trip requires.
    pub fn serialize(&self, out: &mut String) {
        match self {
            JsonValue::Null => out.push_str("null"),
            JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsonValue::Long(n) => out.push_str(&n.to_string()),
            JsonValue::Double(d) => out.push_str(&format_double(*d)),
            JsonValue::String(s) => serialize_string(s, out),
            JsonValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.serialize(out);
                }
                out.push(']');
            }
            JsonValue::Map(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    serialize_string(k, out);
                    out.push(':');
                    v.serialize(out);
                }
                out.push('}');
            }
        }
    }

    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        self.serialize(&mut out);
        out
    }
}

fn format_double(d: f64) -> String {
    if d == d.trunc() && d.is_finite() {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

fn serialize_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> Self {
        JsonValue::String(s.to_owned())
    }
}

impl From<String> for JsonValue {
    fn from(s: String) -> Self {
        JsonValue::String(s)
    }
}

impl From<bool> for JsonValue {
    fn from(b: bool) -> Self {
        JsonValue::Bool(b)
    }
}

impl From<i64> for JsonValue {
    fn from(n: i64) -> Self {
        JsonValue::Long(n)
    }
}

impl From<Vec<String>> for JsonValue {
    fn from(items: Vec<String>) -> Self {
        JsonValue::List(items.into_iter().map(JsonValue::String).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(JsonValue::from("hi").as_str().unwrap(), "hi");
        assert!(JsonValue::Bool(true).as_bool().unwrap());
        assert_eq!(JsonValue::Long(5).as_long().unwrap(), 5);
    }

    #[test]
    fn accessors_fail_on_mismatch() {
        assert!(JsonValue::Long(5).as_str().is_err());
    }
}
