//! Recording adapters that capture interactions into a cassette store.

pub mod http;

pub use http::RecordingHttp;
