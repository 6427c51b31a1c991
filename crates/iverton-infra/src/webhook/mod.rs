//! HTTP transport for the webhook gateway.

pub mod http;

pub use http::ReqwestTransport;
