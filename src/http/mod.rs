//! Request and response descriptors exchanged between the page, the
//! worker, the cache, and the network
//!
//! These are plain owned values: a `Response` can be cloned to hand one copy
//! to the caller and store the other, which is how write-back duplicates a
//! network response.

mod headers;
mod request;
mod response;

pub use headers::Headers;
pub use request::{Method, Request, RequestKey, RequestMode};
pub use response::Response;
