//! # Chat Side Channel
//!
//! Text and sticker lines that travel beside the turn protocol. Chat is
//! best effort: never ACKed, but sequenced so receivers can drop the
//! duplicates a relay may produce.
//!
//! ## Stickers
//!
//! A line that is exactly a known `/token` goes out as a `STICKER` with the
//! token as payload and is shown as the token's glyph on arrival. The table
//! is configuration, not process state.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use pokeproto_networking::{ChatContent, ChatMessage, SequenceNumber};

/// Built-in sticker set: `(token, glyph)`.
pub const DEFAULT_STICKERS: [(&str, &str); 24] = [
    ("/smile", ":)"),
    ("/laugh", "LOL"),
    ("/cool", "B)"),
    ("/angry", ">:("),
    ("/sad", ":("),
    ("/love", "<3"),
    ("/fire", "(~)"),
    ("/star", "*"),
    ("/thumbsup", "(Y)"),
    ("/thumbsdown", "(N)"),
    ("/hi", "o/"),
    ("/bye", "\\o"),
    ("/gg", "GG"),
    ("/nice", "Nice!"),
    ("/wow", "WOW!"),
    ("/ouch", "Ouch!"),
    ("/lucky", "Lucky!"),
    ("/unlucky", "Unlucky!"),
    ("/attack", ">>--->>"),
    ("/defend", "[SHIELD]"),
    ("/heal", "+HP+"),
    ("/critical", "***CRIT***"),
    ("/miss", "X MISS X"),
    ("/hit", "[HIT!]"),
];

/// Sticker token to glyph table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StickerTable {
    glyphs: BTreeMap<String, String>,
}

impl Default for StickerTable {
    fn default() -> Self {
        Self::from_map(default_sticker_map())
    }
}

/// The built-in table as an owned map (config default).
#[must_use]
pub fn default_sticker_map() -> BTreeMap<String, String> {
    DEFAULT_STICKERS
        .iter()
        .map(|(token, glyph)| ((*token).to_string(), (*glyph).to_string()))
        .collect()
}

impl StickerTable {
    /// Builds a table from `token -> glyph`. Tokens without a leading `/`
    /// get one.
    #[must_use]
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let glyphs = map
            .into_iter()
            .map(|(token, glyph)| {
                let token = if token.starts_with('/') { token } else { format!("/{token}") };
                (token, glyph)
            })
            .collect();
        Self { glyphs }
    }

    /// Glyph for `token`.
    #[must_use]
    pub fn glyph(&self, token: &str) -> Option<&str> {
        self.glyphs.get(token).map(String::as_str)
    }

    /// Known tokens, sorted.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.glyphs.keys().map(String::as_str)
    }

    /// Number of stickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Chooses the payload for a line the local player typed.
    #[must_use]
    pub fn compose(&self, line: &str) -> ChatContent {
        let trimmed = line.trim();
        if self.glyphs.contains_key(trimmed) {
            ChatContent::Sticker(trimmed.to_string())
        } else {
            ChatContent::Text(line.to_string())
        }
    }

    /// Display text for received content.
    #[must_use]
    pub fn render(&self, content: &ChatContent) -> String {
        match content {
            ChatContent::Text(text) => text.clone(),
            ChatContent::Sticker(token) if token.starts_with('/') => self
                .glyph(token)
                .map_or_else(|| format!("[sticker {token}]"), str::to_string),
            // File stickers from other clients are not decoded
            ChatContent::Sticker(payload) => format!("[sticker: {} bytes]", payload.len()),
        }
    }
}

/// A chat line ready for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
    /// Author.
    pub sender: String,
    /// Rendered text or glyph.
    pub text: String,
    /// Whether the line was a sticker.
    pub sticker: bool,
}

impl ChatLine {
    /// Renders `message` through `stickers`.
    #[must_use]
    pub fn from_message(message: &ChatMessage, stickers: &StickerTable) -> Self {
        Self {
            sender: message.sender_name.clone(),
            text: stickers.render(&message.content),
            sticker: matches!(message.content, ChatContent::Sticker(_)),
        }
    }
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.sender, self.text)
    }
}

/// Drops chat lines already seen, keyed on `(sender, sequence)`.
#[derive(Debug, Default)]
pub struct ChatDeduper {
    seen: HashSet<(String, SequenceNumber)>,
}

impl ChatDeduper {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a `(sender, sequence)` pair is offered.
    pub fn first_sighting(&mut self, message: &ChatMessage) -> bool {
        self.seen
            .insert((message.sender_name.clone(), message.sequence_number))
    }
}
