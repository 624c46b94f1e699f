//! HTTP server for timewarden

pub mod http;

pub use http::{run, AppState};
