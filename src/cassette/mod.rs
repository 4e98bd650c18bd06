//! Cassette format, storage and replay matching.

pub mod format;
pub mod matcher;
pub mod store;

pub use format::{Cassette, CassetteMetadata, Interaction};
pub use matcher::{EndpointRule, EndpointRuleSpec, MatchKey, Matcher, NoMatch};
pub use store::InteractionStore;
