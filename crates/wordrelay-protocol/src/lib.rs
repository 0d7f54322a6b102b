//! # wordrelay-protocol
//!
//! Wire messages exchanged between wordrelay clients and the server.
//!
//! Clients send plain text: the first message names the player, every
//! later one is a guess. The server answers with [`ServerMessage`]s:
//!
//! - `state` - a full [`Snapshot`] of the round (word length, scores,
//!   history, time left)
//! - `chat` - a single chat line fanned out to everyone
//!
//! ## Example
//!
//! ```rust
//! use wordrelay_protocol::{codec, ServerMessage, WireFormat};
//!
//! let msg = ServerMessage::chat("bob: cat");
//! let payload = codec::encode(&msg, WireFormat::Json).unwrap();
//! let decoded = codec::decode(&payload).unwrap();
//! assert_eq!(decoded, msg);
//! ```

pub mod codec;
pub mod messages;

pub use codec::{decode, decode_inbound, encode, Payload, ProtocolError, WireFormat};
pub use messages::{ClientIntent, ServerMessage, Snapshot};
