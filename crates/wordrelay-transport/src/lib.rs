//! # wordrelay-transport
//!
//! Connection plumbing for the wordrelay hub.
//!
//! - **traits** - `MessageSource` / `MessageSink`, the two halves of a
//!   client connection
//! - **websocket** - adapter over axum's WebSocket
//! - **memory** - in-process transport for tests
//! - **session** - the inbound and outbound pumps that connect a
//!   transport to the hub
//!
//! ```rust,ignore
//! use wordrelay_transport::{websocket, ClientSession, SessionOptions};
//!
//! let (source, sink) = websocket::split(socket, 4096);
//! ClientSession::new(source, sink, SessionOptions::default())
//!     .run(hub)
//!     .await?;
//! ```

pub mod memory;
pub mod session;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use session::{ClientSession, SessionOptions};
pub use traits::{MessageSink, MessageSource, TransportError};
