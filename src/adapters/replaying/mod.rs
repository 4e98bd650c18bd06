//! Replaying adapters that answer from a loaded cassette.

pub mod http;

pub use http::ReplayingHttp;
