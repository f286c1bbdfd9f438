//! HTTP client for the download server.
//!
//! Covers the three request/response endpoints the client uses:
//! - `POST /fetch` creates a job and returns its descriptor
//! - `GET /{client}/download/{job}` starts the server-side transfer
//! - `PUT /stop/{job}` aborts an in-flight job

mod error;
mod http;

pub use error::{ClientError, ClientResult};
pub use http::ServerClient;
