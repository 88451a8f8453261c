//! # Text Record Codec
//!
//! The wire format is a flat, newline-delimited text record:
//!
//! ```text
//! message_type: ATTACK_ANNOUNCE
//! move_name: Fire Attack
//! sequence_number: 7
//! ```
//!
//! ## Design
//!
//! - The first line is always `message_type`
//! - Decoding never fails: lines without `": "` are skipped
//! - Any value that parses as an `i64` decodes as an integer; typed
//!   accessors turn it back into text when a text field is requested
//! - Nested records flatten to dotted keys (`outer.inner: value`)
//! - Newlines inside text values are replaced with spaces on encode

use std::fmt;

/// Key of the mandatory first line.
pub const MESSAGE_TYPE_KEY: &str = "message_type";

const SEPARATOR: &str = ": ";
const NESTING: char = '.';

/// A decoded field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// Any value that parsed as a signed 64-bit integer.
    Integer(i64),
    /// Everything else.
    Text(String),
    /// Fields grouped under a dotted prefix.
    Nested(Fields),
}

impl FieldValue {
    /// Text view. Integers are re-stringified; nested values have none.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Integer(value) => Some(value.to_string()),
            Self::Text(text) => Some(text.clone()),
            Self::Nested(_) => None,
        }
    }

    /// Integer view. Text that happens to be numeric is accepted too.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Nested(_) => None,
        }
    }

    /// Parses a raw wire value with integer coercion. Only canonical
    /// integers are coerced, so `007` and `+5` stay text and keep their bytes.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(value) if value.to_string() == raw => Self::Integer(value),
            _ => Self::Text(raw.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Text(if value { "true" } else { "false" }.to_string())
    }
}

/// Insertion-ordered field map. Setting an existing key replaces it in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`Fields::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text view of a field.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Integer view of a field.
    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_integer)
    }

    /// Boolean view: `true`/`false` text (any case) or `1`/`0`.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            FieldValue::Integer(1) => Some(true),
            FieldValue::Integer(0) => Some(false),
            FieldValue::Text(text) if text.eq_ignore_ascii_case("true") => Some(true),
            FieldValue::Text(text) if text.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_path(&mut self, path: &str, value: FieldValue) {
        match path.split_once(NESTING) {
            None => self.set(path, value),
            Some((head, rest)) => {
                if !matches!(self.get(head), Some(FieldValue::Nested(_))) {
                    self.set(head, FieldValue::Nested(Self::new()));
                }
                if let Some((_, FieldValue::Nested(inner))) =
                    self.entries.iter_mut().find(|(k, _)| k == head)
                {
                    inner.insert_path(rest, value);
                }
            }
        }
    }

    fn write_lines(&self, prefix: &str, out: &mut String) {
        for (key, value) in &self.entries {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}{NESTING}{key}")
            };
            match value {
                FieldValue::Nested(inner) => inner.write_lines(&path, out),
                FieldValue::Integer(number) => {
                    out.push_str(&path);
                    out.push_str(SEPARATOR);
                    out.push_str(&number.to_string());
                    out.push('\n');
                }
                FieldValue::Text(text) => {
                    out.push_str(&path);
                    out.push_str(SEPARATOR);
                    out.extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
                    out.push('\n');
                }
            }
        }
    }
}

/// One wire record: a kind token plus its fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WireRecord {
    /// The `message_type` token. Empty when the line was missing.
    pub message_type: String,
    /// Every other field.
    pub fields: Fields,
}

impl WireRecord {
    /// Creates a record for the given kind token.
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            fields: Fields::new(),
        }
    }

    /// Builder form of [`Fields::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.set(key, value);
        self
    }
}

impl fmt::Display for WireRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_to_string(self))
    }
}

fn encode_to_string(record: &WireRecord) -> String {
    let mut out = String::with_capacity(64);
    out.push_str(MESSAGE_TYPE_KEY);
    out.push_str(SEPARATOR);
    out.push_str(&record.message_type);
    out.push('\n');
    record.fields.write_lines("", &mut out);
    out
}

/// Encodes a record to its wire bytes.
#[must_use]
pub fn encode(record: &WireRecord) -> Vec<u8> {
    encode_to_string(record).into_bytes()
}

/// Decodes wire bytes. Never fails; unparseable lines are dropped.
#[must_use]
pub fn decode(bytes: &[u8]) -> WireRecord {
    let text = String::from_utf8_lossy(bytes);
    let mut record = WireRecord::default();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some((key, value)) = line.split_once(SEPARATOR) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        if key == MESSAGE_TYPE_KEY {
            record.message_type = value.to_string();
        } else {
            record.fields.insert_path(key, FieldValue::coerce(value));
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let record = WireRecord::new("ATTACK_ANNOUNCE")
            .with("move_name", "Tackle")
            .with("sequence_number", 3u32);
        assert_eq!(
            String::from_utf8(encode(&record)).unwrap(),
            "message_type: ATTACK_ANNOUNCE\nmove_name: Tackle\nsequence_number: 3\n"
        );
    }

    #[test]
    fn test_decode_skips_garbage() {
        let raw = b"message_type: ACK\nnot a field\n: orphan\nack_number: 9\n\n";
        let record = decode(raw);
        assert_eq!(record.message_type, "ACK");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields.integer("ack_number"), Some(9));
    }

    #[test]
    fn test_decode_keeps_separator_inside_value() {
        let record = decode(b"message_type: CHAT_MESSAGE\nmessage_text: note: hi\n");
        assert_eq!(record.fields.text("message_text").as_deref(), Some("note: hi"));
    }

    #[test]
    fn test_integer_coercion_is_reversible_through_text_view() {
        let record = decode(b"message_type: HANDSHAKE_REQUEST\nname: 1234\n");
        assert_eq!(record.fields.get("name"), Some(&FieldValue::Integer(1234)));
        assert_eq!(record.fields.text("name").as_deref(), Some("1234"));
    }

    #[test]
    fn test_non_canonical_numbers_stay_text() {
        for raw in ["007", "+5", "-0", "00"] {
            assert_eq!(FieldValue::coerce(raw), FieldValue::Text(raw.to_string()));
        }
        assert_eq!(FieldValue::coerce("-12"), FieldValue::Integer(-12));
        assert_eq!(FieldValue::coerce("007").as_integer(), Some(7));

        let record = decode(b"message_type: HANDSHAKE_REQUEST\nname: 007\n");
        assert_eq!(record.fields.text("name").as_deref(), Some("007"));
    }

    #[test]
    fn test_nested_fields_round_trip() {
        let inner = Fields::new().with("hp", 40i64).with("name", "Pikachu");
        let record = WireRecord::new("BATTLE_SETUP").with("combatant", FieldValue::Nested(inner));
        let bytes = encode(&record);
        assert!(String::from_utf8_lossy(&bytes).contains("combatant.hp: 40\n"));
        assert_eq!(decode(&bytes), record);
    }

    #[test]
    fn test_newlines_in_text_are_flattened() {
        let record = WireRecord::new("CHAT_MESSAGE").with("message_text", "two\nlines");
        let decoded = decode(&encode(&record));
        assert_eq!(decoded.fields.text("message_text").as_deref(), Some("two lines"));
    }

    #[test]
    fn test_flags() {
        let record = decode(b"message_type: X\na: true\nb: FALSE\nc: 1\nd: maybe\n");
        assert_eq!(record.fields.flag("a"), Some(true));
        assert_eq!(record.fields.flag("b"), Some(false));
        assert_eq!(record.fields.flag("c"), Some(true));
        assert_eq!(record.fields.flag("d"), None);
        assert_eq!(record.fields.flag("e"), None);
    }

    #[test]
    fn test_crlf_tolerated() {
        let record = decode(b"message_type: ACK\r\nack_number: 4\r\n");
        assert_eq!(record.message_type, "ACK");
        assert_eq!(record.fields.integer("ack_number"), Some(4));
    }
}
