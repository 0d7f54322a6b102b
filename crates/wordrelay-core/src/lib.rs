//! # wordrelay-core
//!
//! The authoritative side of the wordrelay guessing game.
//!
//! - **WordSource** - picks secret words from a fixed pool
//! - **GameRound** - target word, scores, history and countdown
//! - **Registry** - live sessions and non-blocking fan-out with eviction
//! - **Hub** - single-consumer actor that applies every event in order
//! - **RoundClock** - one tick per second into the hub
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                ┌─────────────┐     ┌─────────────┐
//! │  Sessions   │──HubEvent────▶│     Hub     │────▶│  Registry   │──▶ outbound queues
//! └─────────────┘                └─────────────┘     └─────────────┘
//!                                       ▲
//! ┌─────────────┐                       │
//! │ RoundClock  │────────Tick───────────┘
//! └─────────────┘
//! ```

pub mod clock;
pub mod hub;
pub mod registry;
pub mod round;
pub mod session;
pub mod words;

pub use clock::RoundClock;
pub use hub::{GuessOutcome, Hub, HubConfig, HubError, HubEvent, HubHandle, HubState, HubStats};
pub use registry::{BroadcastReport, Delivery, Registry};
pub use round::{GameRound, History, TickOutcome};
pub use session::{DeliveryFailure, Outbound, SessionHandle, SessionId};
pub use words::{ScriptedWords, WordError, WordPool, WordSource};
