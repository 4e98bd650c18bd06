//! Port traits defining external boundaries.
//!
//! The component under test sees time and the network only through these
//! traits. Implementations live in `src/adapters/`.

pub mod clock;
pub mod http;

pub use clock::Clock;
pub use http::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportError};
