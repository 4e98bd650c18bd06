//! Implementations of the port traits.
//!
//! `live` talks to the real network, `recording` wraps a live transport and
//! captures sanitized interactions, and `replaying` answers from a cassette.
//! Time comes from `clock`, frozen for both record and replay.

pub mod clock;
pub mod live;
pub mod recording;
pub mod replaying;

pub use clock::{LiveClock, PinnedClock};
pub use live::LiveHttp;
pub use recording::RecordingHttp;
pub use replaying::ReplayingHttp;
