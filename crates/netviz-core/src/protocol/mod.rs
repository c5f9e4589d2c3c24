//! Protocol module containing wire message types, the JSON codec, and the
//! request sequence counter.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{decode_snapshot, encode_snapshot, ProtocolError};
pub use messages::*;
pub use sequence::SequenceCounter;
