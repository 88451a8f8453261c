//! # Wire Protocol
//!
//! Text key/value records and the typed message catalog built on them.
//!
//! ## Layers
//!
//! ```text
//! Message (typed, one variant per kind)
//!    │  to_record / from_record
//! WireRecord (message_type + ordered fields)
//!    │  encode / decode
//! bytes ("key: value\n" lines)
//! ```

pub mod codec;
mod messages;

pub use codec::{decode, encode, FieldValue, Fields, WireRecord, MESSAGE_TYPE_KEY};
pub use messages::{
    BattleSetup, CalculationReport, ChatContent, ChatMessage, Message, MessageKind,
    ResolutionRequest, SequenceNumber,
};
